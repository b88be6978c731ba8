use serde::{Deserialize, Serialize};

use crate::frame::RegionMut;

/// One in-place pixel transform applied to a crop before OCR.
///
/// Chains are configured per region; the order matters and was picked per
/// field to maximize recognition accuracy:
/// - Name-like text: contrast(4) → invert → grayscale
/// - Icon labels: invert → contrast(4)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    /// Multiplicative contrast around white.
    Contrast { factor: f32 },
    /// `255 - value` on every channel.
    Invert,
    /// BT.601 luma replicated into all three channels.
    Grayscale,
}

impl Transform {
    pub fn apply(&self, region: &mut RegionMut<'_>) {
        match *self {
            Transform::Contrast { factor } => change_contrast(region, factor),
            Transform::Invert => invert(region),
            Transform::Grayscale => to_grayscale(region),
        }
    }
}

/// Applies `chain` to `region` in order.
///
/// The transforms are pure per pixel, so the same chain on identical input
/// gives identical output. They overwrite the crop, so running a chain twice on
/// the same buffer is not the same as running it once.
pub fn apply_chain(region: &mut RegionMut<'_>, chain: &[Transform]) {
    for transform in chain {
        transform.apply(region);
    }
}

/// Inverts every channel.
pub fn invert(region: &mut RegionMut<'_>) {
    region.for_each_channel(|v| *v = 255 - *v);
}

#[inline]
fn contrast_value(value: u8, factor: f32) -> u8 {
    let v = factor * (value as f32 / 255.0 - 1.0) + 1.0;
    ((v + 0.5) * 255.0).clamp(0.0, 255.0) as u8
}

/// Contrast transform: `clamp(255 * (factor * (in/255 - 1) + 1 + 0.5), 0, 255)`.
pub fn change_contrast(region: &mut RegionMut<'_>, factor: f32) {
    let mut lut = [0u8; 256];
    for (i, out) in lut.iter_mut().enumerate() {
        *out = contrast_value(i as u8, factor);
    }
    region.for_each_channel(|v| *v = lut[*v as usize]);
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).clamp(0.0, 255.0) as u8
}

/// Replaces each pixel with its luma on all channels.
pub fn to_grayscale(region: &mut RegionMut<'_>) {
    region.for_each_pixel(|pixel| {
        let value = luma(pixel[0], pixel[1], pixel[2]);
        pixel.fill(value);
    });
}
