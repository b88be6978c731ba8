//! Screen detector bank.
//!
//! Evaluates every configured screen fingerprint against a frame and reports at
//! most one matching screen per frame.

use crate::detect::{Fingerprint, ScreenKind};
use crate::frame::Frame;

/// The screen a frame was classified as.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub kind: ScreenKind,
    pub confidence: f32,
}

/// One fingerprint per screen kind, in configuration order.
#[derive(Debug, Clone)]
pub struct DetectorBank {
    width: u32,
    height: u32,
    detectors: Vec<(ScreenKind, Fingerprint)>,
}

impl DetectorBank {
    /// Creates a bank for frames at `width` x `height`.
    pub fn new(width: u32, height: u32, detectors: Vec<(ScreenKind, Fingerprint)>) -> Self {
        Self {
            width,
            height,
            detectors,
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = ScreenKind> + '_ {
        self.detectors.iter().map(|(kind, _)| *kind)
    }

    /// Confidence of every configured screen, in configuration order.
    pub fn evaluate(&self, frame: &Frame) -> Vec<Detection> {
        self.detectors
            .iter()
            .map(|(kind, fingerprint)| Detection {
                kind: *kind,
                confidence: fingerprint.confidence(frame),
            })
            .collect()
    }

    /// Classifies a normalized frame.
    ///
    /// Every screen whose confidence reaches its threshold is a candidate; the
    /// highest confidence wins and ties go to the earlier configuration entry.
    /// Frames that are not at the bank's working resolution never match.
    pub fn classify(&self, frame: &Frame) -> Option<Detection> {
        if frame.width() != self.width || frame.height() != self.height {
            return None;
        }

        let mut best: Option<Detection> = None;
        for (detection, (_, fingerprint)) in self.evaluate(frame).into_iter().zip(&self.detectors) {
            if fingerprint.samples.is_empty() || !fingerprint.accepts(detection.confidence) {
                continue;
            }
            match best {
                Some(b) if b.confidence >= detection.confidence => {}
                _ => best = Some(detection),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::SamplePoint;
    use crate::frame::Rgb;

    const RED: Rgb = Rgb::new(255, 0, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 255);

    fn bank() -> DetectorBank {
        DetectorBank::new(
            10,
            10,
            vec![
                (
                    ScreenKind::Stigmata,
                    Fingerprint::new(0.97, vec![SamplePoint::new(1, 1, RED), SamplePoint::new(2, 2, RED)]),
                ),
                (
                    ScreenKind::Lineup,
                    Fingerprint::new(0.97, vec![SamplePoint::new(8, 8, BLUE), SamplePoint::new(7, 7, BLUE)]),
                ),
            ],
        )
    }

    #[test]
    fn test_classify_each_screen() {
        let bank = bank();

        let mut stigmata = Frame::filled(10, 10, Rgb::BLACK);
        stigmata.set_pixel(1, 1, RED);
        stigmata.set_pixel(2, 2, RED);
        let detection = bank.classify(&stigmata).unwrap();
        assert_eq!(detection.kind, ScreenKind::Stigmata);
        assert_eq!(detection.confidence, 1.0);

        let mut lineup = Frame::filled(10, 10, Rgb::BLACK);
        lineup.set_pixel(8, 8, BLUE);
        lineup.set_pixel(7, 7, BLUE);
        assert_eq!(bank.classify(&lineup).unwrap().kind, ScreenKind::Lineup);
    }

    #[test]
    fn test_classify_none() {
        assert_eq!(bank().classify(&Frame::filled(10, 10, Rgb::BLACK)), None);
    }

    #[test]
    fn test_wrong_resolution_never_matches() {
        let mut frame = Frame::filled(12, 10, Rgb::BLACK);
        frame.set_pixel(1, 1, RED);
        frame.set_pixel(2, 2, RED);
        assert_eq!(bank().classify(&frame), None);
    }

    #[test]
    fn test_tie_goes_to_earlier_entry() {
        // Both fingerprints sample the same pixel.
        let bank = DetectorBank::new(
            4,
            4,
            vec![
                (ScreenKind::Lineup, Fingerprint::new(0.9, vec![SamplePoint::new(0, 0, RED)])),
                (ScreenKind::Stigmata, Fingerprint::new(0.9, vec![SamplePoint::new(0, 0, RED)])),
            ],
        );
        let frame = Frame::filled(4, 4, RED);
        assert_eq!(bank.classify(&frame).unwrap().kind, ScreenKind::Lineup);
    }

    #[test]
    fn test_higher_confidence_beats_configuration_order() {
        let near_red = Rgb::new(235, 0, 0);
        let bank = DetectorBank::new(
            4,
            4,
            vec![
                (ScreenKind::Lineup, Fingerprint::new(0.9, vec![SamplePoint::new(0, 0, near_red)])),
                (ScreenKind::Stigmata, Fingerprint::new(0.9, vec![SamplePoint::new(0, 0, RED)])),
            ],
        );
        let frame = Frame::filled(4, 4, RED);
        let evaluated = bank.evaluate(&frame);
        assert!(evaluated[0].confidence < evaluated[1].confidence);
        assert!(evaluated.iter().all(|d| d.confidence >= 0.9));
        assert_eq!(bank.classify(&frame).unwrap().kind, ScreenKind::Stigmata);
    }
}
