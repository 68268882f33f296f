//! Output sink passed to every component.
//!
//! Components never print directly. They emit [`Event`]s to the sink they
//! were constructed with, and the sink decides how (or whether) to render
//! them. The CLI uses [`ConsoleSink`]; tests use [`RecordingSink`].

use colored::Colorize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// How much the console sink prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,   // Failures and summaries only
    #[default]
    Normal,  // One line per entry
    Verbose, // Also skipped entries and informational notes
}

/// Something a component did (or would do, in a dry run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    BackedUp { program: String, path: PathBuf },
    WouldBackUp { program: String, path: PathBuf },
    Restored { program: String, path: PathBuf },
    WouldRestore { program: String, path: PathBuf },
    Skipped { program: String, path: PathBuf, reason: String },
    Removed { path: PathBuf },
    WouldRemove { path: PathBuf },
    Migrated { from: PathBuf, to: PathBuf },
    WouldMigrate { from: PathBuf, to: PathBuf },
    Failed { path: PathBuf, error: String },
    Note(String),
    Warning(String),
}

impl Event {
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::Failed { .. })
    }
}

/// Receiver for component events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Shared handle to a sink, cloned into each component.
pub type SharedSink = Arc<dyn EventSink>;

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Renders events to stdout with colors.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    verbosity: Verbosity,
}

impl ConsoleSink {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn shared(verbosity: Verbosity) -> SharedSink {
        Arc::new(Self::new(verbosity))
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: Event) {
        let quiet = self.verbosity == Verbosity::Quiet;
        let verbose = self.verbosity == Verbosity::Verbose;

        match event {
            Event::BackedUp { program, path } if !quiet => {
                println!("  {} [{}] {}", "✓".green(), program.cyan(), path.display());
            }
            Event::WouldBackUp { program, path } if !quiet => {
                println!("  {} [{}] {}", "Would back up:".blue(), program.cyan(), path.display());
            }
            Event::Restored { program, path } if !quiet => {
                println!("  {} [{}] {}", "✓".green(), program.cyan(), path.display());
            }
            Event::WouldRestore { program, path } if !quiet => {
                println!("  {} [{}] {}", "Would restore:".blue(), program.cyan(), path.display());
            }
            Event::Skipped { program, path, reason } if verbose => {
                println!(
                    "  {} [{}] {} ({})",
                    "Skipped:".yellow(),
                    program.cyan(),
                    path.display(),
                    reason.dimmed()
                );
            }
            Event::Removed { path } if verbose => {
                println!("  {} {}", "Removed:".dimmed(), path.display());
            }
            Event::WouldRemove { path } if !quiet => {
                println!("  {} {}", "Would remove:".blue(), path.display());
            }
            Event::Migrated { from, to } => {
                println!("  {} {} -> {}", "✓".green(), from.display(), to.display());
            }
            Event::WouldMigrate { from, to } => {
                println!("  {} {} -> {}", "Would migrate:".blue(), from.display(), to.display());
            }
            Event::Failed { path, error } => {
                eprintln!("  {} {}: {}", "✗".red(), path.display(), error);
            }
            Event::Note(message) if verbose => {
                println!("{}", message.dimmed());
            }
            Event::Warning(message) => {
                println!("{} {}", "Warning:".yellow().bold(), message);
            }
            _ => {}
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn failures(&self) -> Vec<Event> {
        self.events().into_iter().filter(Event::is_failure).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(Event::Note("first".to_string()));
        sink.emit(Event::Failed {
            path: PathBuf::from("a"),
            error: "boom".to_string(),
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Event::Note("first".to_string()));
        assert_eq!(sink.failures().len(), 1);
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let sink: SharedSink = Arc::new(NullSink);
        sink.emit(Event::Warning("ignored".to_string()));
    }
}
