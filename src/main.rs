//! Scans a gameplay recording for the stigmata and lineup screens and reads
//! their text fields.
//!
//! Events go to stdout (or the configured events file), one per line.
//! Diagnostics go to stderr and `logs/hi3_scanner.log` next to the executable.

mod config;
mod detect;
mod events;
mod frame;
mod ocr;
mod paths;
mod pipeline;
mod snapshot;

use anyhow::{Context, Result};
use chrono::Local;
use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::config::ScanConfig;
use crate::frame::{FfmpegSource, FrameSource};
use crate::ocr::Tesseract;
use crate::pipeline::Scanner;
use crate::snapshot::PngSnapshots;

/// Extract stigmata and lineup information from a recorded video.
#[derive(Parser, Debug)]
#[command(name = "hi3-scanner", version, about)]
struct Cli {
    /// Path to the input video
    video: PathBuf,
}

/// Logs a message to both stderr and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    eprint!("{}", line);
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(paths::get_log_file())
    {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Log line for a command line that did not parse, or `None` when clap only
/// printed help or version.
fn usage_diagnostic(error: &clap::Error, given: usize) -> Option<String> {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => None,
        _ => Some(format!("Expected 1 argument but got {}", given)),
    }
}

/// Parses the command line. On failure the diagnostic is logged, usage is
/// printed, and `None` tells the caller to exit without error.
fn parse_args<I, T>(args: I) -> Option<Cli>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    match Cli::try_parse_from(&args) {
        Ok(cli) => Some(cli),
        Err(e) => {
            if let Some(line) = usage_diagnostic(&e, args.len().saturating_sub(1)) {
                log(&line);
            }
            let _ = e.print();
            None
        }
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        log(&format!("[PANIC]{} {}", location, msg));
    }));

    if let Err(e) = paths::ensure_directories() {
        eprintln!("Could not create log directory: {}", e);
    }

    let Some(cli) = parse_args(std::env::args_os()) else {
        return Ok(());
    };

    let config = config::load_config();
    if let Err(e) = run(&cli, &config) {
        log(&format!("Fatal: {:#}", e));
        return Err(e);
    }
    Ok(())
}

fn run(cli: &Cli, config: &ScanConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let tesseract = Tesseract::init(&config.ocr).context("Could not initialize tesseract")?;
    log(&format!(
        "Initialized tesseract {} ({})",
        tesseract.version(),
        tesseract.language()
    ));

    let mut source = FfmpegSource::open(&config.decoder, &cli.video, config.width, config.height)
        .with_context(|| format!("Could not open file {}", cli.video.display()))?;
    let info = source.info();
    log(&format!("Streaming {}", cli.video.display()));
    log(&format!("Framerate: {:.3}", info.fps));
    match info.frame_count {
        Some(count) => log(&format!("Frame count: {}", count)),
        None => log("Frame count: unknown"),
    }
    for screen in &config.screens {
        log(&format!(
            "{} screen: threshold {:.2}, {} sample points, {} fields",
            screen.kind,
            screen.fingerprint.threshold,
            screen.fingerprint.samples.len(),
            screen.regions.len()
        ));
    }

    let snapshots = PngSnapshots::new(&config.snapshots.dir, config.snapshots.annotate);
    let scanner = Scanner::new(config, tesseract, snapshots);
    let events = match scanner.run(&mut source) {
        Ok(events) => events,
        Err(e) if source.position().frame_index == 0 => {
            return Err(e.context(format!("Could not open file {}", cli.video.display())));
        }
        Err(e) => return Err(e),
    };
    log(&format!(
        "Finished at {}: {} events",
        source.position(),
        events.len()
    ));

    match &config.events_path {
        Some(path) => {
            events::write_events_to_file(path, &events)?;
            log(&format!("Events written to {}", path.display()));
        }
        None => events::write_events(std::io::stdout().lock(), &events)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_video_argument() {
        let cli = parse_args(["hi3-scanner", "run.mp4"]).unwrap();
        assert_eq!(cli.video, PathBuf::from("run.mp4"));
    }

    #[test]
    fn test_wrong_argument_count_exits_quietly() {
        assert!(parse_args(["hi3-scanner"]).is_none());
        assert!(parse_args(["hi3-scanner", "a.mp4", "b.mp4"]).is_none());
    }

    #[test]
    fn test_usage_diagnostic_counts_arguments() {
        let missing = Cli::try_parse_from(["hi3-scanner"]).unwrap_err();
        assert_eq!(
            usage_diagnostic(&missing, 0).as_deref(),
            Some("Expected 1 argument but got 0")
        );

        let extra = Cli::try_parse_from(["hi3-scanner", "a.mp4", "b.mp4"]).unwrap_err();
        assert_eq!(
            usage_diagnostic(&extra, 2).as_deref(),
            Some("Expected 1 argument but got 2")
        );
    }

    #[test]
    fn test_help_is_not_a_diagnostic() {
        let help = Cli::try_parse_from(["hi3-scanner", "--help"]).unwrap_err();
        assert_eq!(usage_diagnostic(&help, 1), None);
        let version = Cli::try_parse_from(["hi3-scanner", "--version"]).unwrap_err();
        assert_eq!(usage_diagnostic(&version, 1), None);
    }
}
