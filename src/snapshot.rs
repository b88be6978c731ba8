//! Frame snapshots.
//!
//! When a screen is entered, the untouched frame can be saved as
//! `<prefix>_frame_<n>.png`, where `n` counts entries of that screen starting
//! at 0. Writing is fire-and-forget: failures are logged, never returned.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::detect::{SamplePoint, ScreenKind};
use crate::frame::{Frame, Rect, Rgb};

/// Per-screen snapshot numbering.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCounter {
    next: BTreeMap<ScreenKind, u32>,
}

impl SnapshotCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next index for `kind` and advances it.
    pub fn next(&mut self, kind: ScreenKind) -> u32 {
        let slot = self.next.entry(kind).or_insert(0);
        let index = *slot;
        *slot += 1;
        index
    }
}

/// One snapshot to persist.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub kind: ScreenKind,
    pub prefix: &'a str,
    pub index: u32,
    /// Fingerprint points that matched, for optional annotation
    pub samples: &'a [SamplePoint],
}

impl Snapshot<'_> {
    pub fn file_name(&self) -> String {
        format!("{}_frame_{}.png", self.prefix, self.index)
    }
}

/// Receives frames of newly entered screens.
pub trait FramePersistence {
    fn persist(&mut self, frame: &Frame, snapshot: &Snapshot<'_>);
}

/// Writes snapshots as PNG files into a directory.
#[derive(Debug, Clone)]
pub struct PngSnapshots {
    dir: PathBuf,
    annotate: bool,
}

impl PngSnapshots {
    pub fn new(dir: impl Into<PathBuf>, annotate: bool) -> Self {
        Self {
            dir: dir.into(),
            annotate,
        }
    }

    pub fn path_for(&self, snapshot: &Snapshot<'_>) -> PathBuf {
        self.dir.join(snapshot.file_name())
    }

    fn write(&self, frame: &Frame, snapshot: &Snapshot<'_>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let img = if self.annotate {
            let mut marked = frame.clone();
            for sample in snapshot.samples {
                draw_indicator(&mut marked, sample.x, sample.y);
            }
            marked.to_rgb_image()?
        } else {
            frame.to_rgb_image()?
        };

        let path = self.path_for(snapshot);
        img.save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        Ok(path)
    }
}

impl FramePersistence for PngSnapshots {
    fn persist(&mut self, frame: &Frame, snapshot: &Snapshot<'_>) {
        match self.write(frame, snapshot) {
            Ok(path) => crate::log(&format!("Snapshot saved to {}", path.display())),
            Err(e) => crate::log(&format!("Snapshot failed for {}: {:#}", snapshot.kind, e)),
        }
    }
}

const INDICATOR_SIZE: u32 = 32;
const INDICATOR_COLOR: Rgb = Rgb::GREEN;

/// Draws a 3px-thick green crosshair centered on (x, y), clipped to the frame.
pub fn draw_indicator(frame: &mut Frame, x: u32, y: u32) {
    let half = INDICATOR_SIZE / 2;
    let left = x.saturating_sub(half);
    let top = y.saturating_sub(half);
    frame.fill_rect(
        Rect::new(left, y.saturating_sub(1), x.saturating_add(half) - left, 3),
        INDICATOR_COLOR,
    );
    frame.fill_rect(
        Rect::new(x.saturating_sub(1), top, 3, y.saturating_add(half) - top),
        INDICATOR_COLOR,
    );
}
