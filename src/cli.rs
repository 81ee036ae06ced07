//! Command-line interface and REPL
//!
//! Drives a [`SyncHandle`] the way a panel widget would: each REPL command
//! maps to one UI event. [`ConsoleView`] prints what the widget would show.

use anyhow::{bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use text_scaler::devices::DeviceHandle;
use text_scaler::settings::{MemoryStore, SettingsStore};
use text_scaler::sync::{ScrollDirection, SyncHandle, SyncSnapshot};
use text_scaler::view::ValueView;

const PROMPT: &str = "text-scaler> ";
const BAR_WIDTH: usize = 30;

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Slide(f64),
    Set(String),
    Scroll(ScrollDirection),
    Reset,
    Apply,
    /// Simulate another process writing the settings key
    External(f64),
    Show,
    Json,
    Devices,
    Help,
    Quit,
}

/// Parse a REPL line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<ReplCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "slide" | "slider" => {
            let position: f64 = rest
                .parse()
                .with_context(|| format!("invalid slider position {:?}", rest))?;
            if !(0.0..=1.0).contains(&position) {
                bail!("slider position must be between 0 and 1 (got {})", position);
            }
            ReplCommand::Slide(position)
        }
        // Passed through verbatim: the controller decides what is valid
        "set" => ReplCommand::Set(rest.to_string()),
        "scroll" => match rest.to_ascii_lowercase().as_str() {
            "up" | "+" => ReplCommand::Scroll(ScrollDirection::Up),
            "down" | "-" => ReplCommand::Scroll(ScrollDirection::Down),
            other => bail!("scroll direction must be 'up' or 'down' (got {:?})", other),
        },
        "reset" => ReplCommand::Reset,
        "apply" => ReplCommand::Apply,
        "external" => {
            let value: f64 = rest
                .parse()
                .with_context(|| format!("invalid value {:?}", rest))?;
            ReplCommand::External(value)
        }
        "show" | "status" => ReplCommand::Show,
        "json" => ReplCommand::Json,
        "devices" => ReplCommand::Devices,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => bail!("unknown command {:?} (try 'help')", other),
    };

    Ok(Some(command))
}

/// Interactive loop feeding UI events into the controller
pub struct Repl {
    handle: SyncHandle,
    /// Present only with the in-memory backend
    memory: Option<MemoryStore>,
    key: String,
}

impl Repl {
    pub fn new(handle: SyncHandle, memory: Option<MemoryStore>, key: impl Into<String>) -> Self {
        Self {
            handle,
            memory,
            key: key.into(),
        }
    }

    /// Run until `quit`, end of input or Ctrl-C at the prompt
    pub async fn run(&self) -> Result<()> {
        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<(String, oneshot::Sender<()>)>();

        // rustyline blocks; a detached thread never holds up process exit
        std::thread::spawn(move || read_lines(line_tx));

        print_help();

        while let Some((line, done)) = line_rx.recv().await {
            let quit = match parse_command(&line) {
                Ok(Some(ReplCommand::Quit)) => true,
                Ok(Some(command)) => {
                    if let Err(e) = self.execute(command).await {
                        println!("{} {:#}", "error:".red().bold(), e);
                    }
                    false
                }
                Ok(None) => false,
                Err(e) => {
                    println!("{} {:#}", "error:".red().bold(), e);
                    false
                }
            };
            let _ = done.send(());
            if quit {
                break;
            }
        }

        Ok(())
    }

    async fn execute(&self, command: ReplCommand) -> Result<()> {
        match command {
            ReplCommand::Slide(position) => self.handle.slider_changed(position)?,
            ReplCommand::Set(text) => self.handle.text_committed(text)?,
            ReplCommand::Scroll(direction) => self.handle.scroll(direction)?,
            ReplCommand::Reset => self.handle.reset()?,
            ReplCommand::Apply => self.handle.apply_to_system()?,
            ReplCommand::External(value) => {
                let Some(memory) = &self.memory else {
                    bail!("'external' needs the memory settings backend");
                };
                memory.set_double(&self.key, value)?;
            }
            ReplCommand::Show => print_snapshot(&self.handle.snapshot().await?),
            ReplCommand::Json => {
                let snapshot = self.handle.snapshot().await?;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            ReplCommand::Devices => print_devices(&self.handle.snapshot().await?.devices),
            ReplCommand::Help => print_help(),
            ReplCommand::Quit => {}
        }

        // Wait for the renders of this event before showing the next prompt
        self.handle.snapshot().await?;
        Ok(())
    }
}

fn read_lines(line_tx: mpsc::UnboundedSender<(String, oneshot::Sender<()>)>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            warn!("Could not open line editor: {}", e);
            return;
        }
    };

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                let (done_tx, done_rx) = oneshot::channel();
                if line_tx.send((line, done_tx)).is_err() {
                    break;
                }
                if done_rx.blocking_recv().is_err() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                debug!("End of REPL input");
                break;
            }
            Err(e) => {
                warn!("Readline error: {}", e);
                break;
            }
        }
    }
}

pub fn print_help() {
    println!("\n{}", "Commands:".bold());
    let commands = [
        ("slide <0..1>", "move the slider"),
        ("set <value>", "type a value and press Enter"),
        ("scroll up|down", "nudge the value with the scroll wheel"),
        ("reset", "restore the default value"),
        ("apply", "write the current value to the system"),
        ("external <value>", "simulate another program changing the setting"),
        ("show", "print the current state"),
        ("json", "print the current state as JSON"),
        ("devices", "list the displays being driven"),
        ("help", "show this list"),
        ("quit", "stop the controller and exit"),
    ];
    for (usage, description) in commands {
        println!("  {:<18} {}", usage.cyan(), description);
    }
    println!();
}

pub fn print_snapshot(snapshot: &SyncSnapshot) {
    println!("\n{}", "=== Current State ===".bold().cyan());
    println!("  Value:     {}", snapshot.text.green().bold());
    println!("  Slider:    {}", slider_bar(snapshot.slider_position));
    println!("  Label:     {}", snapshot.label);
    println!(
        "  Reset:     {}",
        if snapshot.reset_enabled {
            "available".yellow()
        } else {
            "at default".dimmed()
        }
    );
    println!("  Writes:    {:?}", snapshot.write_mode);
    match snapshot.pending_apply {
        Some(value) => println!("  Pending:   {}", value.to_string().yellow()),
        None => println!("  Pending:   {}", "nothing".dimmed()),
    }
    println!("  Pushes:    {}", snapshot.pushes);
    print_devices(&snapshot.devices);
}

pub fn print_devices(devices: &[DeviceHandle]) {
    if devices.is_empty() {
        println!("  Devices:   {}", "none (settings-only mode)".dimmed());
        return;
    }
    println!("  Devices:   {}", devices.len().to_string().green());
    for device in devices {
        println!("    - {}", device.as_str().bright_white());
    }
}

/// Text rendering of a slider position in `[0, 1]`
pub fn slider_bar(position: f64) -> String {
    let filled = (position.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>3.0}%",
        "=".repeat(filled),
        " ".repeat(BAR_WIDTH - filled),
        position.clamp(0.0, 1.0) * 100.0
    )
}

/// Prints representation updates as the panel widget would show them
#[derive(Debug, Default)]
pub struct ConsoleView {
    label: String,
    reset_enabled: Option<bool>,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ValueView for ConsoleView {
    fn set_slider(&mut self, position: f64) {
        println!("  {} {}", "slider".dimmed(), slider_bar(position));
    }

    fn set_text(&mut self, text: &str) {
        println!("  {} {}", "entry ".dimmed(), text.green().bold());
    }

    fn set_label(&mut self, label: &str) {
        if self.label != label {
            label.clone_into(&mut self.label);
            println!("  {} {}", "label ".dimmed(), label.cyan());
        }
    }

    fn set_reset_enabled(&mut self, enabled: bool) {
        if self.reset_enabled != Some(enabled) {
            self.reset_enabled = Some(enabled);
            let state = if enabled { "available" } else { "at default" };
            println!("  {} {}", "reset ".dimmed(), state);
        }
    }

    fn notify_warning(&mut self, summary: &str, details: &str) {
        println!("{} {}: {}", "⚠️ ".yellow(), summary.yellow().bold(), details);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> ReplCommand {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parsed("slide 0.4"), ReplCommand::Slide(0.4));
        assert_eq!(parsed("  set 1.25 "), ReplCommand::Set("1.25".into()));
        assert_eq!(parsed("scroll up"), ReplCommand::Scroll(ScrollDirection::Up));
        assert_eq!(parsed("SCROLL Down"), ReplCommand::Scroll(ScrollDirection::Down));
        assert_eq!(parsed("reset"), ReplCommand::Reset);
        assert_eq!(parsed("apply"), ReplCommand::Apply);
        assert_eq!(parsed("external 1.5"), ReplCommand::External(1.5));
        assert_eq!(parsed("exit"), ReplCommand::Quit);
    }

    #[test]
    fn test_set_passes_text_through() {
        assert_eq!(parsed("set abc"), ReplCommand::Set("abc".into()));
        assert_eq!(parsed("set"), ReplCommand::Set(String::new()));
    }

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("slide").is_err());
        assert!(parse_command("slide 1.5").is_err());
        assert!(parse_command("scroll sideways").is_err());
        assert!(parse_command("external x").is_err());
        assert!(parse_command("frobnicate").is_err());
    }

    #[test]
    fn test_slider_bar() {
        assert_eq!(slider_bar(0.0), format!("[{}]   0%", " ".repeat(BAR_WIDTH)));
        assert_eq!(slider_bar(1.0), format!("[{}] 100%", "=".repeat(BAR_WIDTH)));
        assert!(slider_bar(0.5).starts_with(&format!("[{}{}]", "=".repeat(15), " ".repeat(15))));
        // Out-of-range positions are drawn at the nearest end
        assert_eq!(slider_bar(2.0), slider_bar(1.0));
    }
}
