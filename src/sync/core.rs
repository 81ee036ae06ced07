//! SyncCore - the value state machine behind the controller
//!
//! Owns the bounded value and its derived slider/text representations. Every
//! entry point funnels into [`SyncCore::set_value_and_propagate`], which
//! clamps, re-derives the representations and decides the downstream effects
//! from the [`UpdateSource`] tag:
//!
//! | Source              | Settings write                 | Device push |
//! |---------------------|--------------------------------|-------------|
//! | `External`          | never                          | never       |
//! | `Slider`, `Scroll`  | only in `WriteMode::EveryChange` | debounced |
//! | `Text`, `Reset`     | always (explicit commit)       | debounced   |
//! | `Apply`             | always                         | never       |
//!
//! An `External` update also retargets a push that is already pending, so
//! the displays end on the store's value.
//!
//! Nothing here performs I/O; the actor executes the returned [`Outcome`].
//! Re-entry is impossible by construction: propagation needs `&mut self` and
//! the view sink never calls back into the core.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::{AppConfig, WriteMode};
use crate::error::{Result, SyncError};
use crate::mapper::{parse, round_to, ValueRange};

/// Which input dictates the value for one update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    /// The settings store reported a change
    External,
    /// The user dragged the slider
    Slider,
    /// The user committed the text entry
    Text,
    /// The user asked for the default value
    Reset,
    /// Scroll wheel over the panel button
    Scroll,
    /// Explicit "apply to system" request
    Apply,
}

impl UpdateSource {
    /// Whether the user asked for this value to become the system value
    pub fn is_commit(self) -> bool {
        matches!(
            self,
            UpdateSource::Text | UpdateSource::Reset | UpdateSource::Apply
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Controller behaviour that does not change at run time
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPolicy {
    pub range: ValueRange,
    pub write_mode: WriteMode,
    pub scroll_step: f64,
    pub reject_out_of_range_text: bool,
}

impl SyncPolicy {
    pub fn new(range: ValueRange) -> Self {
        Self {
            range,
            write_mode: WriteMode::default(),
            scroll_step: 10f64.powi(-(range.decimals() as i32)),
            reject_out_of_range_text: false,
        }
    }

    /// Validated policy from configuration; degenerate bounds fail here
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let range = config.value.range()?;
        if !config.value.scroll_step.is_finite() || config.value.scroll_step <= 0.0 {
            return Err(SyncError::Configuration(format!(
                "scroll_step must be positive (got {})",
                config.value.scroll_step
            )));
        }

        Ok(Self {
            range,
            write_mode: config.sync.write_mode,
            scroll_step: config.value.scroll_step,
            reject_out_of_range_text: config.value.reject_out_of_range_text,
        })
    }
}

/// Representation updates for the view
#[derive(Debug, Clone, PartialEq)]
pub struct Render {
    /// `None` when the slider already shows this position
    pub slider: Option<f64>,
    pub text: String,
    pub label: String,
    pub reset_enabled: bool,
}

/// What the actor must do after an event
#[derive(Debug, Default)]
pub struct Outcome {
    pub render: Option<Render>,
    /// Value to write to the settings store
    pub write_settings: Option<f64>,
    /// Value to hand to the debounced device push
    pub request_push: Option<f64>,
    /// Replacement for an already pending push; never opens a window
    pub retarget_push: Option<f64>,
    /// Why the event was discarded, if it was
    pub rejection: Option<SyncError>,
}

impl Outcome {
    fn rejected(render: Render, error: SyncError) -> Self {
        Self {
            render: Some(render),
            rejection: Some(error),
            ..Self::default()
        }
    }
}

/// Value state and propagation rules
#[derive(Debug, Clone)]
pub struct SyncCore {
    policy: SyncPolicy,
    value: f64,
    /// Last text rendered into the entry
    text: String,
    /// Last slider position derived from the value
    position: f64,
}

impl SyncCore {
    pub fn new(policy: SyncPolicy, initial: f64) -> Self {
        let value = policy.range.clamp(initial);
        Self {
            text: policy.range.format(value),
            position: policy.range.to_position(value),
            value,
            policy,
        }
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    pub fn range(&self) -> &ValueRange {
        &self.policy.range
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn label(&self) -> String {
        self.text.clone()
    }

    pub fn reset_enabled(&self) -> bool {
        !self.policy.range.is_default(self.value)
    }

    /// Full render of the current state
    pub fn render(&self) -> Render {
        Render {
            slider: Some(self.position),
            text: self.text.clone(),
            label: self.label(),
            reset_enabled: self.reset_enabled(),
        }
    }

    /// The settings store holds a new authoritative value.
    ///
    /// Never written back, never pushed to devices. Not snapped: the stored
    /// double stays authoritative even beyond display precision.
    pub fn external_change(&mut self, value: f64) -> Outcome {
        if !value.is_finite() {
            return Outcome::rejected(
                self.render(),
                SyncError::Settings(format!("non-finite value {} from settings store", value)),
            );
        }
        if value == self.value {
            trace!("External value {} matches current value, nothing to do", value);
            return Outcome::default();
        }
        self.set_value_and_propagate(UpdateSource::External, value, None)
    }

    /// The slider moved to `position`
    pub fn slider_changed(&mut self, position: f64) -> Outcome {
        if position.is_nan() {
            return Outcome::rejected(
                self.render(),
                SyncError::InvalidInput(format!("slider position {}", position)),
            );
        }
        let value = self.policy.range.snap(self.policy.range.from_position(position));
        self.set_value_and_propagate(UpdateSource::Slider, value, Some(position))
    }

    /// The text entry was confirmed or lost focus
    pub fn text_committed(&mut self, text: &str) -> Outcome {
        let Some(parsed) = parse(text) else {
            return Outcome::rejected(self.render(), SyncError::InvalidInput(text.to_string()));
        };

        // Judged at display precision: "3.004" reads as "3.00"
        let rounded = round_to(parsed, self.policy.range.decimals());
        if self.policy.reject_out_of_range_text && !self.policy.range.contains(rounded) {
            return Outcome::rejected(self.render(), SyncError::InvalidInput(text.to_string()));
        }

        let value = self.policy.range.clamp(rounded);
        self.set_value_and_propagate(UpdateSource::Text, value, None)
    }

    pub fn reset(&mut self) -> Outcome {
        let default = self.policy.range.default_value();
        self.set_value_and_propagate(UpdateSource::Reset, default, None)
    }

    pub fn scroll(&mut self, direction: ScrollDirection) -> Outcome {
        let step = match direction {
            ScrollDirection::Up => self.policy.scroll_step,
            ScrollDirection::Down => -self.policy.scroll_step,
        };
        let value = self.policy.range.snap(self.value + step);
        self.set_value_and_propagate(UpdateSource::Scroll, value, None)
    }

    /// Write the current value to the settings store
    pub fn apply_to_system(&mut self) -> Outcome {
        let value = self.value;
        self.set_value_and_propagate(UpdateSource::Apply, value, None)
    }

    /// The one path through which the value changes.
    ///
    /// `reported_position` is the slider position that triggered a
    /// `Slider` update; the slider is not re-rendered when it already shows
    /// a valid position.
    pub fn set_value_and_propagate(
        &mut self,
        source: UpdateSource,
        value: f64,
        reported_position: Option<f64>,
    ) -> Outcome {
        let value = self.policy.range.clamp(value);
        self.value = value;
        self.position = self.policy.range.to_position(value);
        self.text = self.policy.range.format(value);

        let slider_in_place = source == UpdateSource::Slider
            && reported_position.is_some_and(|p| (0.0..=1.0).contains(&p));

        let render = Render {
            slider: (!slider_in_place).then_some(self.position),
            text: self.text.clone(),
            label: self.label(),
            reset_enabled: self.reset_enabled(),
        };

        let write_settings = match source {
            UpdateSource::External => None,
            UpdateSource::Slider | UpdateSource::Scroll => {
                (self.policy.write_mode == WriteMode::EveryChange).then_some(value)
            }
            UpdateSource::Text | UpdateSource::Reset | UpdateSource::Apply => Some(value),
        };

        let request_push = match source {
            UpdateSource::External | UpdateSource::Apply => None,
            UpdateSource::Slider
            | UpdateSource::Scroll
            | UpdateSource::Text
            | UpdateSource::Reset => Some(value),
        };

        // A pending push must not deliver a value the store has since replaced
        let retarget_push = (source == UpdateSource::External).then_some(value);

        debug!(
            source = ?source,
            value,
            write = write_settings.is_some(),
            push = request_push.is_some(),
            "Value propagated"
        );

        Outcome {
            render: Some(render),
            write_settings,
            request_push,
            retarget_push,
            rejection: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brightness_core(initial: f64) -> SyncCore {
        let mut policy = SyncPolicy::new(ValueRange::new(0.0, 100.0, 75.0, 0).unwrap());
        policy.scroll_step = 5.0;
        SyncCore::new(policy, initial)
    }

    fn scaling_core(write_mode: WriteMode) -> SyncCore {
        let mut policy = SyncPolicy::new(ValueRange::text_scaling());
        policy.write_mode = write_mode;
        SyncCore::new(policy, 1.0)
    }

    #[test]
    fn test_initial_value_is_clamped() {
        let core = brightness_core(140.0);
        assert_eq!(core.value(), 100.0);
        assert_eq!(core.text(), "100");
        assert_eq!(core.position(), 1.0);
    }

    #[test]
    fn test_external_change_is_one_way() {
        let mut core = scaling_core(WriteMode::EveryChange);
        let outcome = core.external_change(1.5);

        assert_eq!(core.value(), 1.5);
        assert!(outcome.write_settings.is_none());
        assert!(outcome.request_push.is_none());
        assert_eq!(outcome.retarget_push, Some(1.5));

        let render = outcome.render.unwrap();
        assert_eq!(render.text, "1.50");
        assert_eq!(render.slider, Some(0.4));
    }

    #[test]
    fn test_external_change_keeps_full_precision() {
        let mut core = scaling_core(WriteMode::EveryChange);
        core.external_change(1.234567);
        assert_eq!(core.value(), 1.234567);
        assert_eq!(core.text(), "1.23");
    }

    #[test]
    fn test_external_echo_is_ignored() {
        let mut core = scaling_core(WriteMode::EveryChange);
        core.slider_changed(0.2);
        let outcome = core.external_change(core.value());
        assert!(outcome.render.is_none());
    }

    #[test]
    fn test_slider_updates_text_and_requests_push() {
        let mut core = scaling_core(WriteMode::EveryChange);
        let outcome = core.slider_changed(0.5);

        assert_eq!(core.value(), 1.75);
        let render = outcome.render.unwrap();
        assert_eq!(render.text, "1.75");
        assert_eq!(render.slider, None);
        assert_eq!(outcome.request_push, Some(1.75));
        assert_eq!(outcome.retarget_push, None);
        assert_eq!(outcome.write_settings, Some(1.75));
    }

    #[test]
    fn test_slider_write_mode_commit_only() {
        let mut core = scaling_core(WriteMode::CommitOnly);
        let outcome = core.slider_changed(0.5);
        assert_eq!(outcome.write_settings, None);
        assert_eq!(outcome.request_push, Some(1.75));

        let outcome = core.apply_to_system();
        assert_eq!(outcome.write_settings, Some(1.75));
        assert_eq!(outcome.request_push, None);
    }

    #[test]
    fn test_slider_out_of_unit_range_rerenders_knob() {
        let mut core = scaling_core(WriteMode::EveryChange);
        let outcome = core.slider_changed(1.4);
        assert_eq!(core.value(), 3.0);
        assert_eq!(outcome.render.unwrap().slider, Some(1.0));
    }

    #[test]
    fn test_invalid_text_rerenders_last_good_value() {
        let mut core = brightness_core(40.0);
        let outcome = core.text_committed("forty");

        assert_eq!(core.value(), 40.0);
        assert!(matches!(outcome.rejection, Some(SyncError::InvalidInput(_))));
        assert_eq!(outcome.render.unwrap().text, "40");
        assert!(outcome.write_settings.is_none());
        assert!(outcome.request_push.is_none());
    }

    #[test]
    fn test_text_commit_clamps_and_writes() {
        let mut core = brightness_core(40.0);
        let outcome = core.text_committed(" 250 ");

        assert_eq!(core.value(), 100.0);
        let render = outcome.render.unwrap();
        assert_eq!(render.text, "100");
        assert_eq!(render.slider, Some(1.0));
        assert_eq!(outcome.write_settings, Some(100.0));
        assert_eq!(outcome.request_push, Some(100.0));
    }

    #[test]
    fn test_text_commit_out_of_range_can_be_rejected() {
        let mut core = brightness_core(40.0);
        core.policy.reject_out_of_range_text = true;

        let outcome = core.text_committed("250");
        assert!(outcome.rejection.is_some());
        assert_eq!(core.value(), 40.0);

        let outcome = core.text_committed("60");
        assert!(outcome.rejection.is_none());
        assert_eq!(core.value(), 60.0);
    }

    #[test]
    fn test_rejection_judges_displayed_value() {
        let mut core = scaling_core(WriteMode::EveryChange);
        core.policy.reject_out_of_range_text = true;

        let outcome = core.text_committed("3.004");
        assert!(outcome.rejection.is_none());
        assert_eq!(core.value(), 3.0);
        assert_eq!(core.text(), "3.00");

        let outcome = core.text_committed("3.006");
        assert!(outcome.rejection.is_some());
        assert_eq!(core.value(), 3.0);
    }

    #[test]
    fn test_text_commit_snaps_to_display_precision() {
        let mut core = scaling_core(WriteMode::EveryChange);
        core.text_committed("1.234");
        assert_eq!(core.value(), 1.23);
        assert_eq!(core.text(), "1.23");
    }

    #[test]
    fn test_reset_and_reset_affordance() {
        let mut core = brightness_core(40.0);
        assert!(core.reset_enabled());

        let outcome = core.reset();
        assert_eq!(core.value(), 75.0);
        assert!(!outcome.render.unwrap().reset_enabled);
        assert_eq!(outcome.write_settings, Some(75.0));
        assert_eq!(outcome.request_push, Some(75.0));

        // Indistinguishable from the default at zero decimals
        core.external_change(74.6);
        assert!(!core.reset_enabled());
        core.external_change(74.4);
        assert!(core.reset_enabled());
    }

    #[test]
    fn test_scroll_steps_and_clamps() {
        let mut core = brightness_core(97.0);
        core.scroll(ScrollDirection::Up);
        assert_eq!(core.value(), 100.0);

        core.scroll(ScrollDirection::Down);
        assert_eq!(core.value(), 95.0);
    }

    #[test]
    fn test_policy_from_config() {
        let config = AppConfig::brightness();
        let policy = SyncPolicy::from_config(&config).unwrap();
        assert_eq!(policy.scroll_step, 5.0);

        let mut config = AppConfig::default();
        config.value.max = config.value.min;
        assert!(SyncPolicy::from_config(&config).unwrap_err().is_fatal());
    }
}
