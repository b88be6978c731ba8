//! Color fingerprint matching.
//!
//! A screen is recognized by a handful of UI pixels whose colors never change
//! while the screen is shown. Comparing only those points keeps the check cheap
//! and ignores unrelated content (character art, animations) elsewhere.

use serde::{Deserialize, Serialize};

use crate::frame::{Frame, Rgb};

/// A fixed coordinate (at the working resolution) and the color expected there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub x: u32,
    pub y: u32,
    pub color: Rgb,
}

impl SamplePoint {
    pub const fn new(x: u32, y: u32, color: Rgb) -> Self {
        Self { x, y, color }
    }
}

/// Sample points plus the confidence a frame must reach to count as a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub threshold: f32,
    pub samples: Vec<SamplePoint>,
}

/// Maps a channel difference in [-255, 255] to [-1, 1].
#[inline]
fn channel_delta(observed: u8, expected: u8) -> f32 {
    2.0 * (255.0 + observed as f32 - expected as f32) / 510.0 - 1.0
}

impl Fingerprint {
    pub fn new(threshold: f32, samples: Vec<SamplePoint>) -> Self {
        Self { threshold, samples }
    }

    /// Similarity between `frame` and this fingerprint, in [0, 1].
    ///
    /// For each sample point the Euclidean norm of the three normalized channel
    /// deltas is divided by `3 * N` and accumulated; the result is one minus the
    /// total. An exact color match at every point yields 1.0.
    ///
    /// The frame must already be at the working resolution. A sample point that
    /// falls outside the frame counts as the largest possible deviation.
    pub fn confidence(&self, frame: &Frame) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let scale = 3.0 * self.samples.len() as f32;

        let deviation: f32 = self
            .samples
            .iter()
            .map(|sample| {
                let norm = match frame.pixel(sample.x, sample.y) {
                    Some(observed) => {
                        let dr = channel_delta(observed.r, sample.color.r);
                        let dg = channel_delta(observed.g, sample.color.g);
                        let db = channel_delta(observed.b, sample.color.b);
                        (dr * dr + dg * dg + db * db).sqrt()
                    }
                    None => 3.0f32.sqrt(),
                };
                norm / scale
            })
            .sum();

        (1.0 - deviation).clamp(0.0, 1.0)
    }

    /// Whether `confidence` reaches this fingerprint's threshold.
    #[inline]
    pub fn accepts(&self, confidence: f32) -> bool {
        confidence >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint() -> Fingerprint {
        Fingerprint::new(
            0.97,
            vec![
                SamplePoint::new(1, 1, Rgb::new(0xee, 0x9a, 0xff)),
                SamplePoint::new(5, 2, Rgb::new(0xff, 0xdd, 0x47)),
                SamplePoint::new(7, 3, Rgb::new(0x00, 0xc9, 0xff)),
            ],
        )
    }

    fn painted(fp: &Fingerprint) -> Frame {
        let mut frame = Frame::filled(8, 4, Rgb::BLACK);
        for s in &fp.samples {
            frame.set_pixel(s.x, s.y, s.color);
        }
        frame
    }

    #[test]
    fn test_channel_delta_range() {
        assert_eq!(channel_delta(0, 255), -1.0);
        assert_eq!(channel_delta(255, 0), 1.0);
        assert_eq!(channel_delta(100, 100), 0.0);
    }

    #[test]
    fn test_exact_match_is_one() {
        let fp = fingerprint();
        assert_eq!(fp.confidence(&painted(&fp)), 1.0);
        assert!(fp.accepts(1.0));
    }

    #[test]
    fn test_confidence_stays_in_unit_range() {
        let fp = fingerprint();
        for color in [Rgb::BLACK, Rgb::new(255, 255, 255), Rgb::new(255, 0, 0), Rgb::new(0, 255, 255)] {
            let c = fp.confidence(&Frame::filled(8, 4, color));
            assert!((0.0..=1.0).contains(&c), "confidence {} out of range", c);
        }
    }

    #[test]
    fn test_single_point_deviation() {
        let fp = fingerprint();
        let mut frame = painted(&fp);
        // Off by 51 on one channel of one point: delta 0.2, scaled by 1/9.
        frame.set_pixel(1, 1, Rgb::new(0xee - 51, 0x9a, 0xff));
        let c = fp.confidence(&frame);
        assert!((c - (1.0 - 0.2 / 9.0)).abs() < 1e-5, "got {}", c);
        assert!(fp.accepts(c));
    }

    #[test]
    fn test_mismatch_falls_below_threshold() {
        let fp = fingerprint();
        let c = fp.confidence(&Frame::filled(8, 4, Rgb::BLACK));
        assert!(!fp.accepts(c), "black frame accepted with {}", c);
    }

    #[test]
    fn test_out_of_bounds_sample_is_max_deviation() {
        let fp = Fingerprint::new(0.5, vec![SamplePoint::new(100, 100, Rgb::BLACK)]);
        let c = fp.confidence(&Frame::filled(8, 4, Rgb::BLACK));
        assert!((c - (1.0 - 3.0f32.sqrt() / 3.0)).abs() < 1e-6);
    }

    #[test]
    fn test_empty_fingerprint_has_zero_confidence() {
        let fp = Fingerprint::new(0.0, vec![]);
        assert_eq!(fp.confidence(&Frame::filled(8, 4, Rgb::BLACK)), 0.0);
    }
}
