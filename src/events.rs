//! Event log for a scan.
//!
//! Events are appended in emission order and never changed afterwards. The log
//! is drained once, after the video ends, and rendered one line per event:
//! `[STIGMATA_SCREEN]`, `Valkyrie=<text>`, `Stigmata=<text>`, ...

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::detect::ScreenKind;

/// Text fields that can be read off a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    ValkyrieName,
    ValkyrieRank,
    Weapon,
    Stigmata,
    Elf,
    DivineKey,
}

impl FieldKind {
    /// Key used when rendering and logging the field.
    pub fn label(self) -> &'static str {
        match self {
            FieldKind::ValkyrieName => "Valkyrie",
            FieldKind::ValkyrieRank => "Rank",
            FieldKind::Weapon => "Weapon",
            FieldKind::Stigmata => "Stigmata",
            FieldKind::Elf => "Elf",
            FieldKind::DivineKey => "DivineKey",
        }
    }
}

/// What an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A screen was entered on this frame.
    ScreenEntered(ScreenKind),
    /// A text field read from the screen that was just entered.
    Field(FieldKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    kind: EventKind,
    value: Option<String>,
}

impl Event {
    pub fn screen_entered(screen: ScreenKind) -> Self {
        Self {
            kind: EventKind::ScreenEntered(screen),
            value: None,
        }
    }

    pub fn field(field: FieldKind, value: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Field(field),
            value: Some(value.into()),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Renders the event as one output line (without the newline).
    pub fn render(&self) -> String {
        match self.kind {
            EventKind::ScreenEntered(screen) => format!("[{}]", screen.tag()),
            EventKind::Field(field) => {
                format!("{}={}", field.label(), self.value.as_deref().unwrap_or_default())
            }
        }
    }
}

/// Append-only, ordered event log.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Vec<Event>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Consumes the recorder and returns every event in emission order.
    pub fn drain(self) -> Vec<Event> {
        self.events
    }
}

/// Writes one line per event.
pub fn write_events<W: Write>(mut out: W, events: &[Event]) -> Result<()> {
    for event in events {
        writeln!(out, "{}", event.render()).context("Failed to write event")?;
    }
    out.flush().context("Failed to flush events")?;
    Ok(())
}

/// Writes the rendered events to `path`, replacing any previous content.
pub fn write_events_to_file(path: &Path, events: &[Event]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create events file {}", path.display()))?;
    write_events(BufWriter::new(file), events)
}
