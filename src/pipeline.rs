//! Frame-by-frame scan loop.
//!
//! For every decoded frame: normalize it to the working resolution, classify
//! it, feed the classification to the transition trackers, and on an
//! "entered" edge record the screen marker, hand the untouched frame to the
//! snapshot writer, then extract, OCR and record the screen's text fields.
//!
//! Everything runs on the calling thread, one frame at a time. The only
//! optional concurrency is OCR over the regions of a single frame.

use anyhow::{Context, Result};

use crate::config::ScanConfig;
use crate::detect::{DetectorBank, ScreenKind, TrackerSet};
use crate::events::{Event, EventRecorder};
use crate::frame::{Frame, FrameSource, StreamPosition};
use crate::log;
use crate::ocr::{extract, recognize_all, OcrEngine};
use crate::snapshot::{FramePersistence, Snapshot, SnapshotCounter};

/// Owns all per-run state: trackers, snapshot counters and the event log.
pub struct Scanner<O, P> {
    config: ScanConfig,
    bank: DetectorBank,
    trackers: TrackerSet,
    ocr: O,
    persistence: P,
    counter: SnapshotCounter,
    recorder: EventRecorder,
}

impl<O: OcrEngine, P: FramePersistence> Scanner<O, P> {
    pub fn new(config: &ScanConfig, ocr: O, persistence: P) -> Self {
        let bank = DetectorBank::new(
            config.width,
            config.height,
            config
                .screens
                .iter()
                .map(|s| (s.kind, s.fingerprint.clone()))
                .collect(),
        );
        let trackers = TrackerSet::new(bank.kinds());

        Self {
            config: config.clone(),
            bank,
            trackers,
            ocr,
            persistence,
            counter: SnapshotCounter::new(),
            recorder: EventRecorder::new(),
        }
    }

    /// Processes one frame. Returns the screen entered on this frame, if any.
    pub fn process_frame(&mut self, frame: Frame, position: StreamPosition) -> Option<ScreenKind> {
        let mut frame = match frame.normalized(self.config.width, self.config.height) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log(&format!("{}: skipping frame: {:#}", position, e));
                None
            }
        };

        let detection = frame.as_ref().and_then(|f| self.bank.classify(f));
        let entered = self.trackers.update(detection.map(|d| d.kind))?;
        let frame = frame.as_mut()?;
        let confidence = detection.map(|d| d.confidence).unwrap_or_default();

        let screen = self.config.screen(entered)?;
        log(&format!(
            "{}: {} screen (confidence {:.4})",
            position, screen.kind, confidence
        ));
        self.recorder.record(Event::screen_entered(screen.kind));

        if self.config.snapshots.enabled && screen.save_snapshot {
            let snapshot = Snapshot {
                kind: screen.kind,
                prefix: &screen.snapshot_prefix,
                index: self.counter.next(screen.kind),
                samples: &screen.fingerprint.samples,
            };
            self.persistence.persist(frame, &snapshot);
        }

        if screen.regions.is_empty() {
            return Some(entered);
        }

        match extract(frame, &screen.regions) {
            Ok(prepared) => {
                let texts = recognize_all(&self.ocr, &prepared, self.config.parallel_ocr);
                for ((region, (field, _)), text) in screen.regions.iter().zip(&prepared).zip(texts) {
                    match &region.label {
                        Some(label) => log(&format!("{} ({}): {}", field.label(), label, text)),
                        None => log(&format!("{}: {}", field.label(), text)),
                    }
                    self.recorder.record(Event::field(*field, text));
                }
            }
            Err(e) => log(&format!("{}: extraction failed: {:#}", position, e)),
        }

        Some(entered)
    }

    /// Pulls frames until the source is exhausted and returns the event log.
    ///
    /// A source error aborts the run; the error names the last good position.
    pub fn run<S: FrameSource>(mut self, source: &mut S) -> Result<Vec<Event>> {
        while let Some(frame) = source
            .next_frame()
            .with_context(|| format!("Decoding stopped after {}", source.position()))?
        {
            let position = source.position();
            self.process_frame(frame, position);
        }
        Ok(self.finish())
    }

    /// Ends the run and drains the event log.
    pub fn finish(self) -> Vec<Event> {
        self.recorder.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, FieldKind};
    use crate::frame::{Rect, Region, Rgb};
    use anyhow::{anyhow, Result};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers by crop size: the name box and the stigmata slots differ.
    /// Slots are told apart by the first pixel after preprocessing.
    #[derive(Default)]
    struct FakeOcr {
        calls: Mutex<usize>,
    }

    impl OcrEngine for FakeOcr {
        fn recognize(&self, image: &Region<'_>) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            match (image.width(), image.height()) {
                (484, 72) => Ok("  Fu Hua\n\n".to_string()),
                (284, 188) => {
                    let value = image.pixel(0, 0).map(|c| c.r).unwrap_or_default();
                    Ok(format!("Slot\n{}\n", value))
                }
                _ => Err(anyhow!("unexpected crop")),
            }
        }
    }

    #[derive(Default)]
    struct RecordedSnapshots {
        saved: Vec<(String, Frame)>,
    }

    impl FramePersistence for &mut RecordedSnapshots {
        fn persist(&mut self, frame: &Frame, snapshot: &Snapshot<'_>) {
            self.saved.push((snapshot.file_name(), frame.clone()));
        }
    }

    struct VecSource {
        frames: VecDeque<Frame>,
        read: u64,
        fail_after: Option<u64>,
    }

    impl VecSource {
        fn new(frames: Vec<Frame>) -> Self {
            Self {
                frames: frames.into(),
                read: 0,
                fail_after: None,
            }
        }
    }

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.fail_after == Some(self.read) {
                return Err(anyhow!("decoder broke"));
            }
            let frame = self.frames.pop_front();
            if frame.is_some() {
                self.read += 1;
            }
            Ok(frame)
        }

        fn position(&self) -> StreamPosition {
            StreamPosition {
                frame_index: self.read,
                elapsed_ms: self.read * 40,
            }
        }
    }

    fn config() -> ScanConfig {
        ScanConfig::default()
    }

    fn blank() -> Frame {
        Frame::filled(1920, 1080, Rgb::BLACK)
    }

    /// A frame matching `kind`'s fingerprint exactly.
    fn screen_frame(kind: ScreenKind) -> Frame {
        let config = config();
        let mut frame = blank();
        for s in &config.screen(kind).unwrap().fingerprint.samples {
            frame.set_pixel(s.x, s.y, s.color);
        }
        if kind == ScreenKind::Stigmata {
            // Distinct slot backgrounds; after invert + contrast(4):
            // 0 → 255, 255 → 0, 60 → 142.
            let slots = &config.screen(kind).unwrap().regions[1..];
            for (slot, value) in slots.iter().zip([0u8, 255, 60]) {
                frame.fill_rect(slot.rect, Rgb::new(value, value, value));
            }
        }
        frame
    }

    fn rendered(events: &[Event]) -> Vec<String> {
        events.iter().map(Event::render).collect()
    }

    #[test]
    fn test_stigmata_scan_end_to_end() {
        let mut snapshots = RecordedSnapshots::default();
        let scanner = Scanner::new(&config(), FakeOcr::default(), &mut snapshots);
        let mut source = VecSource::new(vec![screen_frame(ScreenKind::Stigmata), blank(), blank()]);

        let events = scanner.run(&mut source).unwrap();

        assert_eq!(
            rendered(&events),
            vec![
                "[STIGMATA_SCREEN]",
                "Valkyrie=Fu Hua",
                "Stigmata=Slot 255",
                "Stigmata=Slot 0",
                "Stigmata=Slot 142",
            ]
        );
        assert_eq!(events[0].kind(), EventKind::ScreenEntered(ScreenKind::Stigmata));
        assert_eq!(events[1].kind(), EventKind::Field(FieldKind::ValkyrieName));
        assert_eq!(events[1].value(), Some("Fu Hua"));
        assert!(events[2..].iter().all(|e| e.kind() == EventKind::Field(FieldKind::Stigmata)));
    }

    #[test]
    fn test_snapshot_is_the_untouched_frame() {
        let mut snapshots = RecordedSnapshots::default();
        {
            let mut scanner = Scanner::new(&config(), FakeOcr::default(), &mut snapshots);
            scanner.process_frame(screen_frame(ScreenKind::Stigmata), StreamPosition::default());
        }

        assert_eq!(snapshots.saved.len(), 1);
        let (name, frame) = &snapshots.saved[0];
        assert_eq!(name, "stigmata_frame_0.png");
        assert_eq!(frame, &screen_frame(ScreenKind::Stigmata));
    }

    #[test]
    fn test_repeated_frames_yield_one_entry() {
        let mut snapshots = RecordedSnapshots::default();
        let ocr = FakeOcr::default();
        let mut scanner = Scanner::new(&config(), ocr, &mut snapshots);

        let mut entered = Vec::new();
        for i in 0..6u64 {
            let frame = if i < 4 { screen_frame(ScreenKind::Stigmata) } else { blank() };
            let position = StreamPosition { frame_index: i + 1, elapsed_ms: i * 40 };
            if let Some(kind) = scanner.process_frame(frame, position) {
                entered.push((i, kind));
            }
        }

        assert_eq!(entered, vec![(0, ScreenKind::Stigmata)]);
        assert_eq!(*scanner.ocr.calls.lock().unwrap(), 4);
        assert_eq!(scanner.finish().len(), 5);
    }

    #[test]
    fn test_single_dropped_frame_records_twice() {
        let mut snapshots = RecordedSnapshots::default();
        let scanner = Scanner::new(&config(), FakeOcr::default(), &mut snapshots);
        let mut source = VecSource::new(vec![
            screen_frame(ScreenKind::Stigmata),
            screen_frame(ScreenKind::Stigmata),
            blank(),
            screen_frame(ScreenKind::Stigmata),
        ]);

        let events = scanner.run(&mut source).unwrap();

        let markers = events
            .iter()
            .filter(|e| e.kind() == EventKind::ScreenEntered(ScreenKind::Stigmata))
            .count();
        assert_eq!(markers, 2);
        assert_eq!(events.len(), 10);
        let names: Vec<&str> = snapshots.saved.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["stigmata_frame_0.png", "stigmata_frame_1.png"]);
    }

    #[test]
    fn test_lineup_has_marker_only() {
        let mut snapshots = RecordedSnapshots::default();
        let scanner = Scanner::new(&config(), FakeOcr::default(), &mut snapshots);
        let mut source = VecSource::new(vec![
            screen_frame(ScreenKind::Lineup),
            screen_frame(ScreenKind::Stigmata),
            screen_frame(ScreenKind::Lineup),
        ]);

        let events = scanner.run(&mut source).unwrap();

        assert_eq!(
            rendered(&events)
                .into_iter()
                .filter(|l| l.starts_with('['))
                .collect::<Vec<_>>(),
            vec!["[LINEUP_SCREEN]", "[STIGMATA_SCREEN]", "[LINEUP_SCREEN]"]
        );
        let names: Vec<&str> = snapshots.saved.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["lineup_frame_0.png", "stigmata_frame_0.png", "lineup_frame_1.png"]
        );
    }

    #[test]
    fn test_parallel_ocr_keeps_event_order() {
        let mut config = config();
        config.parallel_ocr = true;
        let mut snapshots = RecordedSnapshots::default();
        let scanner = Scanner::new(&config, FakeOcr::default(), &mut snapshots);
        let mut source = VecSource::new(vec![screen_frame(ScreenKind::Stigmata)]);

        let events = scanner.run(&mut source).unwrap();

        assert_eq!(
            rendered(&events),
            vec![
                "[STIGMATA_SCREEN]",
                "Valkyrie=Fu Hua",
                "Stigmata=Slot 255",
                "Stigmata=Slot 0",
                "Stigmata=Slot 142",
            ]
        );
    }

    #[test]
    fn test_snapshots_disabled() {
        let mut config = config();
        config.snapshots.enabled = false;
        let mut snapshots = RecordedSnapshots::default();
        {
            let mut scanner = Scanner::new(&config, FakeOcr::default(), &mut snapshots);
            scanner.process_frame(screen_frame(ScreenKind::Lineup), StreamPosition::default());
            assert_eq!(rendered(&scanner.finish()), vec!["[LINEUP_SCREEN]"]);
        }
        assert!(snapshots.saved.is_empty());
    }

    #[test]
    fn test_wrong_resolution_frame_is_resized() {
        let config = config();
        let mut snapshots = RecordedSnapshots::default();
        let mut scanner = Scanner::new(&config, FakeOcr::default(), &mut snapshots);

        // Half-size lineup screen with solid patches around each sample point.
        let mut half = Frame::filled(960, 540, Rgb::BLACK);
        for s in &config.screen(ScreenKind::Lineup).unwrap().fingerprint.samples {
            half.fill_rect(Rect::new(s.x / 2 - 4, s.y / 2 - 4, 9, 9), s.color);
        }

        assert_eq!(
            scanner.process_frame(half, StreamPosition::default()),
            Some(ScreenKind::Lineup)
        );
        assert_eq!(scanner.finish().len(), 1);
    }

    #[test]
    fn test_padded_frame_is_classified() {
        let mut snapshots = RecordedSnapshots::default();
        let mut scanner = Scanner::new(&config(), FakeOcr::default(), &mut snapshots);

        let packed = screen_frame(ScreenKind::Lineup);
        let stride = 1920 * 3 + 16;
        let mut data = vec![0u8; stride * 1080];
        for y in 0..1080u32 {
            for x in 0..1920u32 {
                let c = packed.pixel(x, y).unwrap();
                let i = y as usize * stride + x as usize * 3;
                data[i..i + 3].copy_from_slice(&[c.r, c.g, c.b]);
            }
        }
        let padded = Frame::new(1920, 1080, stride, data).unwrap();

        assert_eq!(
            scanner.process_frame(padded, StreamPosition::default()),
            Some(ScreenKind::Lineup)
        );
    }

    #[test]
    fn test_source_error_aborts_run() {
        let mut snapshots = RecordedSnapshots::default();
        let scanner = Scanner::new(&config(), FakeOcr::default(), &mut snapshots);
        let mut source = VecSource::new(vec![
            screen_frame(ScreenKind::Lineup),
            screen_frame(ScreenKind::Stigmata),
        ]);
        source.fail_after = Some(1);

        let err = scanner.run(&mut source).unwrap_err();

        let message = format!("{:#}", err);
        assert!(message.contains("Frame number 1"), "{}", message);
        assert!(message.contains("decoder broke"), "{}", message);
        assert_eq!(snapshots.saved.len(), 1);
    }

    #[test]
    fn test_source_error_before_first_frame() {
        let mut snapshots = RecordedSnapshots::default();
        let scanner = Scanner::new(&config(), FakeOcr::default(), &mut snapshots);
        let mut source = VecSource::new(vec![screen_frame(ScreenKind::Lineup)]);
        source.fail_after = Some(0);

        assert!(scanner.run(&mut source).is_err());
        assert_eq!(source.position().frame_index, 0);
        assert!(snapshots.saved.is_empty());
    }

    #[test]
    fn test_ocr_failure_records_empty_value() {
        let mut config = config();
        // Shrink the name box so the fake engine rejects it.
        config.screens[0].regions[0].rect.width = 100;
        let mut snapshots = RecordedSnapshots::default();
        let scanner = Scanner::new(&config, FakeOcr::default(), &mut snapshots);
        let mut source = VecSource::new(vec![screen_frame(ScreenKind::Stigmata)]);

        let events = scanner.run(&mut source).unwrap();

        assert_eq!(events.len(), 5);
        assert_eq!(events[1].render(), "Valkyrie=");
    }
}
