use anyhow::{anyhow, Result};

use super::preprocess::apply_chain;
use crate::config::RegionConfig;
use crate::events::FieldKind;
use crate::frame::{Frame, Region};

/// Crops every configured region out of `frame` and prepares it for OCR.
///
/// Each region's transform chain runs in place on its crop, so the frame is
/// modified and this must not be called twice on the same buffer. The returned
/// views borrow the frame, keep its stride, and are in configuration order.
///
/// Fails without touching the frame if any region does not fit in it.
pub fn extract<'f>(frame: &'f mut Frame, regions: &[RegionConfig]) -> Result<Vec<(FieldKind, Region<'f>)>> {
    if let Some(bad) = regions
        .iter()
        .find(|r| !r.rect.fits_within(frame.width(), frame.height()))
    {
        return Err(anyhow!(
            "{} region {:?} does not fit in a {}x{} frame",
            bad.field.label(),
            bad.rect,
            frame.width(),
            frame.height()
        ));
    }

    for region in regions {
        if let Some(mut crop) = frame.region_mut(region.rect) {
            apply_chain(&mut crop, &region.transforms);
        }
    }

    let frame: &'f Frame = frame;
    regions
        .iter()
        .map(|region| {
            frame
                .region(region.rect)
                .map(|view| (region.field, view))
                .ok_or_else(|| anyhow!("{} region {:?} vanished", region.field.label(), region.rect))
        })
        .collect()
}

/// Cleans raw OCR output: line breaks (`\n` or `\r\n`) become spaces, then
/// surrounding whitespace is trimmed. Interior spacing is otherwise kept as
/// recognized.
pub fn normalize_text(raw: &str) -> String {
    raw.lines().collect::<Vec<_>>().join(" ").trim().to_string()
}
