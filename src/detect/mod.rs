//! Screen recognition.
//!
//! This module provides:
//! - Color fingerprint matching against fixed sample points
//! - The detector bank that classifies a frame as at most one screen
//! - Per-screen transition tracking that turns matches into "entered" edges

pub mod bank;
pub mod fingerprint;
pub mod tracker;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use bank::DetectorBank;
pub use fingerprint::{Fingerprint, SamplePoint};
pub use tracker::TrackerSet;

/// Known application screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKind {
    /// Valkyrie equipment screen showing the three stigmata slots.
    Stigmata,
    /// Team lineup screen.
    Lineup,
}

impl ScreenKind {
    /// Tag used when rendering a screen-entered event.
    pub fn tag(self) -> &'static str {
        match self {
            ScreenKind::Stigmata => "STIGMATA_SCREEN",
            ScreenKind::Lineup => "LINEUP_SCREEN",
        }
    }
}

impl fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenKind::Stigmata => write!(f, "Stigmata"),
            ScreenKind::Lineup => write!(f, "Lineup"),
        }
    }
}
