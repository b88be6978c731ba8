use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{ensure_tesseract, tesseract_version};
use crate::config::OcrSettings;
use crate::frame::Region;

/// Text recognition over a prepared crop.
///
/// The crop is handed over as-is: width, height, channel count and the
/// frame's row stride. An empty string is a valid result.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &Region<'_>) -> Result<String>;
}

/// Tesseract driven through its command-line interface.
///
/// Each call writes the crop to a temporary PNG and reads the recognized text
/// from tesseract's stdout.
#[derive(Debug, Clone)]
pub struct Tesseract {
    executable: PathBuf,
    tessdata: PathBuf,
    language: String,
    page_seg_mode: u8,
    dpi: u32,
    version: String,
}

impl Tesseract {
    /// Locates tesseract and its language data.
    ///
    /// Fails if the executable or `<language>.traineddata` cannot be found, so
    /// a misconfigured install stops the scan before any frame is decoded.
    pub fn init(settings: &OcrSettings) -> Result<Self> {
        let paths = ensure_tesseract(settings)?;
        let version = tesseract_version(&paths.executable)?;

        Ok(Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
            language: settings.language.clone(),
            page_seg_mode: settings.page_seg_mode,
            dpi: settings.dpi,
            version,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn command(&self, input: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(input)
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_seg_mode.to_string())
            .arg("--dpi")
            .arg(self.dpi.to_string());
        cmd
    }
}

impl OcrEngine for Tesseract {
    fn recognize(&self, image: &Region<'_>) -> Result<String> {
        // Save crop to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image
            .to_rgb_image()?
            .save(temp_input.path())
            .context("Failed to write OCR input image")?;

        let output = self
            .command(temp_input.path())
            .output()
            .context("Failed to run tesseract")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Tesseract {
        Tesseract {
            executable: PathBuf::from("tesseract"),
            tessdata: PathBuf::from("/data/tessdata"),
            language: "eng".to_string(),
            page_seg_mode: 6,
            dpi: 300,
            version: "5.3.0".to_string(),
        }
    }

    #[test]
    fn test_command_line() {
        let cmd = engine().command(std::path::Path::new("/tmp/in.png"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "/tmp/in.png", "stdout", "--tessdata-dir", "/data/tessdata", "-l", "eng",
                "--psm", "6", "--dpi", "300"
            ]
        );
    }

    #[test]
    fn test_missing_executable_reports_error() {
        let mut tess = engine();
        tess.executable = PathBuf::from("/nonexistent/tesseract");
        let frame = crate::frame::Frame::filled(4, 4, crate::frame::Rgb::BLACK);
        let region = frame.region(crate::frame::Rect::new(0, 0, 4, 4)).unwrap();
        assert!(tess.recognize(&region).is_err());
    }
}
