//! Scanner configuration.
//!
//! Loads settings from config.json at startup. Provides the working resolution,
//! OCR engine settings, snapshot settings and the screen catalogue (fingerprints
//! and text regions). Every field has a default, so a missing or partial file
//! still yields a complete configuration.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::detect::{Fingerprint, SamplePoint, ScreenKind};
use crate::events::FieldKind;
use crate::frame::{Rect, Rgb};
use crate::ocr::Transform;

/// Tesseract settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Explicit path to the tesseract executable (otherwise looked up on PATH)
    pub tesseract_path: Option<PathBuf>,
    /// Directory containing `<language>.traineddata`
    pub tessdata_dir: Option<PathBuf>,
    /// Recognition language
    pub language: String,
    /// Tesseract page segmentation mode (6 = single uniform block of text)
    pub page_seg_mode: u8,
    /// Resolution hint passed to tesseract
    pub dpi: u32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            tessdata_dir: None,
            language: "eng".to_string(),
            page_seg_mode: 6,
            dpi: 300,
        }
    }
}

/// Video decoder executables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSettings {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

/// Where and how screen snapshots are written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Master switch for snapshot writing
    pub enabled: bool,
    /// Output directory (created on first write)
    pub dir: PathBuf,
    /// Draw crosshairs over the matched sample points on the saved copy
    pub annotate: bool,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("Output"),
            annotate: false,
        }
    }
}

/// A text field location on a screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub field: FieldKind,
    /// Short tag used in diagnostics (e.g. slot "T", "M", "B")
    #[serde(default)]
    pub label: Option<String>,
    pub rect: Rect,
    /// Preprocessing applied to the crop, in order
    #[serde(default)]
    pub transforms: Vec<Transform>,
}

/// Everything needed to recognize one screen and read its fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub kind: ScreenKind,
    pub fingerprint: Fingerprint,
    #[serde(default)]
    pub regions: Vec<RegionConfig>,
    /// Whether the frame is saved when the screen is entered
    #[serde(default = "default_save_snapshot")]
    pub save_snapshot: bool,
    /// File name prefix for snapshots (`<prefix>_frame_<n>.png`)
    pub snapshot_prefix: String,
}

/// Complete scanner configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Working resolution all coordinates are defined against
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub ocr: OcrSettings,
    #[serde(default)]
    pub decoder: DecoderSettings,
    /// Run OCR for the regions of one frame on separate threads
    #[serde(default)]
    pub parallel_ocr: bool,
    #[serde(default)]
    pub snapshots: SnapshotSettings,
    /// Write rendered events here instead of stdout
    #[serde(default)]
    pub events_path: Option<PathBuf>,
    /// Screens in evaluation order
    #[serde(default = "default_screens")]
    pub screens: Vec<ScreenConfig>,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_save_snapshot() -> bool {
    true
}

const fn hex(rgb: u32) -> Rgb {
    Rgb::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
}

/// The stigmata screen: three stigmata slots with the valkyrie name below.
fn stigmata_screen() -> ScreenConfig {
    let name_chain = vec![
        Transform::Contrast { factor: 4.0 },
        Transform::Invert,
        Transform::Grayscale,
    ];
    let slot_chain = vec![Transform::Invert, Transform::Contrast { factor: 4.0 }];

    let mut regions = vec![RegionConfig {
        field: FieldKind::ValkyrieName,
        label: None,
        rect: Rect::new(188, 912, 484, 72),
        transforms: name_chain,
    }];
    for (label, x) in [("T", 872), ("M", 1232), ("B", 1592)] {
        regions.push(RegionConfig {
            field: FieldKind::Stigmata,
            label: Some(label.to_string()),
            rect: Rect::new(x, 550, 284, 188),
            transforms: slot_chain.clone(),
        });
    }

    ScreenConfig {
        kind: ScreenKind::Stigmata,
        fingerprint: Fingerprint::new(
            0.97,
            vec![
                SamplePoint::new(120, 200, hex(0xEE9AFF)),
                SamplePoint::new(990, 864, hex(0xFFDD47)),
                SamplePoint::new(1350, 864, hex(0xFFDD47)),
                SamplePoint::new(1710, 864, hex(0xFFDD47)),
                SamplePoint::new(1280, 974, hex(0x00C9FF)),
            ],
        ),
        regions,
        save_snapshot: true,
        snapshot_prefix: "stigmata".to_string(),
    }
}

/// The team lineup screen. Recorded and saved, no text fields.
fn lineup_screen() -> ScreenConfig {
    ScreenConfig {
        kind: ScreenKind::Lineup,
        fingerprint: Fingerprint::new(
            0.97,
            vec![
                SamplePoint::new(1762, 168, hex(0xFFDD47)),
                SamplePoint::new(1762, 390, hex(0xFFDD47)),
                SamplePoint::new(1762, 608, hex(0xFFDD47)),
                SamplePoint::new(181, 97, hex(0xFFDB48)),
                SamplePoint::new(1520, 986, hex(0x005A7E)),
            ],
        ),
        regions: Vec::new(),
        save_snapshot: true,
        snapshot_prefix: "lineup".to_string(),
    }
}

fn default_screens() -> Vec<ScreenConfig> {
    vec![stigmata_screen(), lineup_screen()]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            ocr: OcrSettings::default(),
            decoder: DecoderSettings::default(),
            parallel_ocr: false,
            snapshots: SnapshotSettings::default(),
            events_path: None,
            screens: default_screens(),
        }
    }
}

impl ScanConfig {
    /// Looks up the configuration of one screen kind.
    pub fn screen(&self, kind: ScreenKind) -> Option<&ScreenConfig> {
        self.screens.iter().find(|s| s.kind == kind)
    }

    /// Rejects configurations the scanner cannot run with.
    ///
    /// Every sample point and region must lie inside the working resolution,
    /// thresholds must be in [0, 1], and each screen kind may appear only once.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("working resolution {}x{} is empty", self.width, self.height));
        }

        let mut seen = HashSet::new();
        for screen in &self.screens {
            if !seen.insert(screen.kind) {
                return Err(anyhow!("screen {} is configured more than once", screen.kind));
            }

            let fp = &screen.fingerprint;
            if !(0.0..=1.0).contains(&fp.threshold) {
                return Err(anyhow!(
                    "screen {}: threshold {} is outside [0, 1]",
                    screen.kind, fp.threshold
                ));
            }
            if fp.samples.is_empty() {
                return Err(anyhow!("screen {}: fingerprint has no sample points", screen.kind));
            }
            for sample in &fp.samples {
                if sample.x >= self.width || sample.y >= self.height {
                    return Err(anyhow!(
                        "screen {}: sample point ({}, {}) is outside {}x{}",
                        screen.kind, sample.x, sample.y, self.width, self.height
                    ));
                }
            }

            for region in &screen.regions {
                if !region.rect.fits_within(self.width, self.height) {
                    return Err(anyhow!(
                        "screen {}: {} region {:?} is outside {}x{}",
                        screen.kind,
                        region.field.label(),
                        region.rect,
                        self.width,
                        self.height
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Reads and parses a configuration file.
pub fn load_config_from(path: &Path) -> Result<ScanConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Candidate config locations: next to the executable, then the working directory.
fn config_candidates() -> Vec<PathBuf> {
    vec![
        crate::paths::get_exe_dir().join("config.json"),
        PathBuf::from("config.json"),
    ]
}

/// Loads configuration from config.json or returns defaults.
pub fn load_config() -> ScanConfig {
    load_config_in(&config_candidates())
}

/// Loads the first existing file among `candidates`, or returns defaults.
///
/// A file that exists but cannot be read or parsed is logged and ignored.
pub fn load_config_in(candidates: &[PathBuf]) -> ScanConfig {
    let Some(path) = candidates.iter().find(|p| p.exists()) else {
        crate::log("config.json not found. Using default config.");
        return ScanConfig::default();
    };

    crate::log(&format!("Loading config from: {}", path.display()));
    match load_config_from(path) {
        Ok(config) => config,
        Err(e) => {
            crate::log(&format!("{:#}. Using defaults.", e));
            ScanConfig::default()
        }
    }
}
