//! Frame sources.
//!
//! The scanner pulls frames one at a time from a `FrameSource`. The production
//! source decodes a video file by piping raw `rgb24` frames out of an `ffmpeg`
//! child process, scaled to the working resolution.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use super::{Frame, CHANNELS};
use crate::config::DecoderSettings;

/// Where the source currently is in the stream. Only used for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamPosition {
    /// Number of frames decoded so far (the current frame's 1-based number).
    pub frame_index: u64,
    /// Presentation time of the current frame in milliseconds.
    pub elapsed_ms: u64,
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut timer = self.elapsed_ms;
        let milliseconds = timer % 1000;
        timer /= 1000;
        let seconds = timer % 60;
        timer /= 60;
        let minutes = timer % 60;
        let hours = timer / 60;
        write!(
            f,
            "Frame number {} ({}:{:02}:{:02}:{:03})",
            self.frame_index, hours, minutes, seconds, milliseconds
        )
    }
}

/// A lazy, finite, non-restartable sequence of frames in presentation order.
pub trait FrameSource {
    /// Returns the next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Position of the most recently returned frame.
    fn position(&self) -> StreamPosition;
}

/// Stream metadata reported by `ffprobe`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub fps: f64,
    pub frame_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Parses an ffprobe rational such as `30000/1001` or `25/1`.
fn parse_frame_rate(text: &str) -> Option<f64> {
    let (num, den) = match text.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (text.trim().parse::<f64>().ok()?, 1.0),
    };
    if num <= 0.0 || den <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// Extracts frame rate and frame count from `ffprobe -of json` output.
fn parse_probe_output(json: &str) -> Result<StreamInfo> {
    let output: ProbeOutput = serde_json::from_str(json).context("Failed to parse ffprobe output")?;
    let stream = output
        .streams
        .first()
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .ok_or_else(|| anyhow!("Video stream has no usable frame rate"))?;
    let frame_count = stream.nb_frames.as_deref().and_then(|n| n.trim().parse().ok());

    Ok(StreamInfo { fps, frame_count })
}

/// Runs `ffprobe` on the first video stream of `path`.
pub fn probe(ffprobe: &Path, path: &Path) -> Result<StreamInfo> {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=r_frame_rate,avg_frame_rate,nb_frames"])
        .args(["-of", "json"])
        .arg(path)
        .output()
        .with_context(|| format!("Failed to run {} (is ffmpeg installed?)", ffprobe.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ffprobe failed: {}", stderr.trim()));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Decodes a video file with `ffmpeg`, scaled to a fixed resolution.
///
/// ffmpeg's stderr is collected on a helper thread. When stdout runs dry the
/// child is reaped, and a nonzero exit turns into an error carrying that
/// output instead of a silent end of stream.
pub struct FfmpegSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    info: StreamInfo,
    frames_read: u64,
    finished: bool,
}

impl FfmpegSource {
    /// Probes and opens `path`. Fails if the file cannot be probed or the
    /// decoder cannot be started.
    pub fn open(decoder: &DecoderSettings, path: &Path, width: u32, height: u32) -> Result<Self> {
        if !path.is_file() {
            return Err(anyhow!("{} is not a file", path.display()));
        }
        let info = probe(&decoder.ffprobe_path, path)?;

        let mut child = Command::new(&decoder.ffmpeg_path)
            .args(["-v", "error", "-nostdin"])
            .arg("-i")
            .arg(path)
            .args(["-map", "0:v:0"])
            .arg("-vf")
            .arg(format!("scale={}:{}", width, height))
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", decoder.ffmpeg_path.display()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdout was not captured"))?;
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            stderr,
            width,
            height,
            info,
            frames_read: 0,
            finished: false,
        })
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }

    /// Reaps ffmpeg once its output has ended.
    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        let status = self.child.wait().context("Failed to wait for ffmpeg")?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(anyhow!("ffmpeg failed ({}): {}", status, stderr.trim()));
        }
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        let frame_bytes = self.width as usize * self.height as usize * CHANNELS;
        let mut data = vec![0u8; frame_bytes];
        match self.stdout.read_exact(&mut data) {
            Ok(()) => {}
            // A truncated trailing frame ends the stream like a clean EOF.
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.finish()?;
                return Ok(None);
            }
            Err(e) => {
                self.finished = true;
                return Err(e).context("Failed to read frame from ffmpeg");
            }
        }
        self.frames_read += 1;
        let stride = self.width as usize * CHANNELS;
        Frame::new(self.width, self.height, stride, data).map(Some)
    }

    fn position(&self) -> StreamPosition {
        let elapsed_ms = if self.frames_read == 0 {
            0
        } else {
            ((self.frames_read - 1) as f64 * 1000.0 / self.info.fps) as u64
        };
        StreamPosition {
            frame_index: self.frames_read,
            elapsed_ms,
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
