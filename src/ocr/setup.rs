use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::OcrSettings;
use crate::log;

/// Resolved Tesseract installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Returns the per-user directory searched for language data.
pub fn get_tessdata_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hi3-scanner")
        .join("tessdata")
}

/// Runs `<executable> --version` and returns the reported version.
pub fn tesseract_version(executable: &Path) -> Result<String> {
    let output = Command::new(executable)
        .arg("--version")
        .output()
        .with_context(|| format!("Failed to run {}", executable.display()))?;

    if !output.status.success() {
        return Err(anyhow!("{} --version failed", executable.display()));
    }

    // Older builds print the banner on stderr.
    let mut banner = String::from_utf8_lossy(&output.stdout).to_string();
    banner.push_str(&String::from_utf8_lossy(&output.stderr));
    parse_version(&banner).ok_or_else(|| anyhow!("Unrecognized tesseract version output"))
}

fn parse_version(banner: &str) -> Option<String> {
    let re = Regex::new(r"(?im)^tesseract\s+v?(\d[\w.\-]*)").ok()?;
    re.captures(banner)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Finds a working tesseract executable.
///
/// An explicitly configured path must exist; otherwise `tesseract` on PATH is
/// used if it answers `--version`.
pub fn find_tesseract_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!("Configured tesseract not found at {}", path.display()));
    }

    let on_path = PathBuf::from("tesseract");
    match Command::new(&on_path).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(on_path),
        _ => Err(anyhow!(
            "Tesseract not found. Install it or set ocr.tesseract_path in config.json"
        )),
    }
}

/// Directories searched for language data, in priority order.
fn tessdata_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(dir) = explicit {
        return vec![dir.to_path_buf()];
    }
    let mut candidates = Vec::new();
    if let Some(prefix) = std::env::var_os("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(prefix));
    }
    candidates.push(PathBuf::from("."));
    candidates.push(get_tessdata_dir());
    candidates
}

/// Picks the first candidate directory that holds `<language>.traineddata`.
fn select_tessdata_dir(candidates: &[PathBuf], language: &str) -> Result<PathBuf> {
    let file = format!("{}.traineddata", language);
    candidates
        .iter()
        .find(|dir| dir.join(&file).is_file())
        .cloned()
        .ok_or_else(|| {
            let searched = candidates
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            anyhow!("{} not found (searched: {})", file, searched)
        })
}

/// Locates the tessdata directory for the configured language.
pub fn find_tessdata_dir(explicit: Option<&Path>, language: &str) -> Result<PathBuf> {
    select_tessdata_dir(&tessdata_candidates(explicit), language)
}

/// Resolves executable and language data. Fails fast if either is missing.
pub fn ensure_tesseract(settings: &OcrSettings) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(settings.tesseract_path.as_deref())?;
    let tessdata = find_tessdata_dir(settings.tessdata_dir.as_deref(), &settings.language)?;

    log(&format!(
        "Tesseract found at: {} (tessdata: {})",
        executable.display(),
        tessdata.display()
    ));

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}
