pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{OcrEngine, Tesseract};
pub use extract::{extract, normalize_text};
pub use preprocess::Transform;

use crate::events::FieldKind;
use crate::frame::Region;
use crate::log;

/// Runs OCR over prepared crops and normalizes the text.
///
/// Results keep the order of `prepared`. With `parallel` set, each crop is
/// recognized on its own scoped thread. A failed recognition is logged and
/// yields an empty string.
pub fn recognize_all<O: OcrEngine>(
    engine: &O,
    prepared: &[(FieldKind, Region<'_>)],
    parallel: bool,
) -> Vec<String> {
    let run = |field: FieldKind, region: &Region<'_>| match engine.recognize(region) {
        Ok(raw) => normalize_text(&raw),
        Err(e) => {
            log(&format!("OCR failed for {}: {:#}", field.label(), e));
            String::new()
        }
    };

    if !parallel || prepared.len() < 2 {
        return prepared.iter().map(|(field, region)| run(*field, region)).collect();
    }

    let run = &run;
    std::thread::scope(|scope| {
        let handles: Vec<_> = prepared
            .iter()
            .map(|(field, region)| scope.spawn(move || run(*field, region)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_default())
            .collect()
    })
}
