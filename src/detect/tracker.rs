//! Screen transition tracking.
//!
//! A screen stays visible for many consecutive frames. Each tracker turns the
//! per-frame classification into a single "entered" edge per visit:
//! Idle → Active fires once on the first matching frame, repeated matches are
//! ignored, and any other classification re-arms the tracker.
//!
//! There is no smoothing across frames: one misclassified frame in the middle of
//! a visit produces a second "entered" edge when the screen is recognized again.

use std::collections::BTreeMap;

use crate::detect::ScreenKind;

/// Whether a screen is currently being shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionState {
    /// Not showing (initial state)
    #[default]
    Idle,
    /// Showing since an earlier frame
    Active,
}

/// Edge detector for one screen kind.
#[derive(Debug, Clone)]
pub struct TransitionTracker {
    kind: ScreenKind,
    state: TransitionState,
}

impl TransitionTracker {
    pub fn new(kind: ScreenKind) -> Self {
        Self {
            kind,
            state: TransitionState::Idle,
        }
    }

    pub fn kind(&self) -> ScreenKind {
        self.kind
    }

    #[cfg(test)]
    pub fn state(&self) -> TransitionState {
        self.state
    }

    /// Advances the tracker by one frame.
    ///
    /// Returns true exactly when this frame is the first of a run of frames
    /// classified as this tracker's screen.
    pub fn update(&mut self, classified: Option<ScreenKind>) -> bool {
        let matched = classified == Some(self.kind);
        match (self.state, matched) {
            (TransitionState::Idle, true) => {
                self.state = TransitionState::Active;
                true
            }
            (TransitionState::Active, false) => {
                self.state = TransitionState::Idle;
                false
            }
            _ => false,
        }
    }
}

/// Transition state for every configured screen kind.
#[derive(Debug, Clone, Default)]
pub struct TrackerSet {
    trackers: BTreeMap<ScreenKind, TransitionTracker>,
}

impl TrackerSet {
    pub fn new(kinds: impl IntoIterator<Item = ScreenKind>) -> Self {
        let trackers = kinds
            .into_iter()
            .map(|kind| (kind, TransitionTracker::new(kind)))
            .collect();
        Self { trackers }
    }

    /// Feeds one frame's classification to every tracker.
    ///
    /// Returns the screen that was entered on this frame, if any. Since a frame
    /// is classified as at most one screen, at most one tracker can fire.
    pub fn update(&mut self, classified: Option<ScreenKind>) -> Option<ScreenKind> {
        let mut entered = None;
        for tracker in self.trackers.values_mut() {
            if tracker.update(classified) {
                entered = Some(tracker.kind());
            }
        }
        entered
    }

    #[cfg(test)]
    pub fn state(&self, kind: ScreenKind) -> Option<TransitionState> {
        self.trackers.get(&kind).map(TransitionTracker::state)
    }
}
