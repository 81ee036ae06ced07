//! Presentation capability
//!
//! The controller never talks to a widget toolkit directly. Whatever renders
//! the panel button, slider and text entry implements [`ValueView`] and is
//! handed to the controller once, at spawn time.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Sink for representation updates produced by the controller
pub trait ValueView: Send + 'static {
    /// Move the slider knob; `position` is in `[0, 1]`
    fn set_slider(&mut self, position: f64);

    /// Replace the text entry contents
    fn set_text(&mut self, text: &str);

    /// Replace the panel status label
    fn set_label(&mut self, label: &str);

    /// Enable or disable the "reset to default" action
    fn set_reset_enabled(&mut self, enabled: bool);

    /// Show a transient warning (e.g. a monitor rejected a value)
    fn notify_warning(&mut self, _summary: &str, _details: &str) {}
}

/// View that drops every update (headless operation)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl ValueView for NullView {
    fn set_slider(&mut self, _position: f64) {}
    fn set_text(&mut self, _text: &str) {}
    fn set_label(&mut self, _label: &str) {}
    fn set_reset_enabled(&mut self, _enabled: bool) {}
}

/// One call made on a [`ValueView`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewUpdate {
    Slider { position: f64 },
    Text { text: String },
    Label { label: String },
    ResetEnabled { enabled: bool },
    Warning { summary: String, details: String },
}

/// View that records every update; clones share the log
#[derive(Debug, Default, Clone)]
pub struct RecordingView {
    updates: Arc<Mutex<Vec<ViewUpdate>>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ViewUpdate> {
        self.updates.lock().clone()
    }

    /// Remove and return everything recorded so far
    pub fn drain(&self) -> Vec<ViewUpdate> {
        std::mem::take(&mut *self.updates.lock())
    }

    pub fn last_text(&self) -> Option<String> {
        self.updates.lock().iter().rev().find_map(|u| match u {
            ViewUpdate::Text { text } => Some(text.clone()),
            _ => None,
        })
    }

    pub fn last_slider(&self) -> Option<f64> {
        self.updates.lock().iter().rev().find_map(|u| match u {
            ViewUpdate::Slider { position } => Some(*position),
            _ => None,
        })
    }

    pub fn warnings(&self) -> Vec<(String, String)> {
        self.updates
            .lock()
            .iter()
            .filter_map(|u| match u {
                ViewUpdate::Warning { summary, details } => {
                    Some((summary.clone(), details.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn push(&self, update: ViewUpdate) {
        self.updates.lock().push(update);
    }
}

impl ValueView for RecordingView {
    fn set_slider(&mut self, position: f64) {
        self.push(ViewUpdate::Slider { position });
    }

    fn set_text(&mut self, text: &str) {
        self.push(ViewUpdate::Text {
            text: text.to_string(),
        });
    }

    fn set_label(&mut self, label: &str) {
        self.push(ViewUpdate::Label {
            label: label.to_string(),
        });
    }

    fn set_reset_enabled(&mut self, enabled: bool) {
        self.push(ViewUpdate::ResetEnabled { enabled });
    }

    fn notify_warning(&mut self, summary: &str, details: &str) {
        self.push(ViewUpdate::Warning {
            summary: summary.to_string(),
            details: details.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_view_shares_log() {
        let view = RecordingView::new();
        let mut handle = view.clone();

        handle.set_text("1.25");
        handle.set_slider(0.3);
        handle.set_text("1.50");
        handle.notify_warning("Monitor", "failed");

        assert_eq!(view.last_text().as_deref(), Some("1.50"));
        assert_eq!(view.last_slider(), Some(0.3));
        assert_eq!(view.warnings().len(), 1);
        assert_eq!(view.drain().len(), 4);
        assert!(view.updates().is_empty());
    }
}
