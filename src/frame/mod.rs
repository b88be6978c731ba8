//! Decoded video frames.
//!
//! A `Frame` owns a packed RGB buffer with an explicit row stride. Rows may be
//! padded (stride > width * 3), so every pixel access goes through the
//! bounds-checked offset helpers here instead of raw index arithmetic.
//!
//! Cropping hands out views (`Region` / `RegionMut`) that borrow the frame's
//! buffer and keep its stride, so preprocessing can run in place on the crop.

pub mod source;

use anyhow::{anyhow, Result};
use image::{imageops::FilterType, RgbImage};
use serde::{Deserialize, Serialize};

pub use source::{FfmpegSource, FrameSource, StreamPosition};

/// Channels per pixel. Color order is always R, G, B.
pub const CHANNELS: usize = 3;

/// An RGB color.
///
/// Serialized as a `#RRGGBB` hex string so configuration files stay readable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const GREEN: Self = Self::new(0, 255, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB` (the leading `#` is optional).
    pub fn from_hex(text: &str) -> Result<Self> {
        let hex = text.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(anyhow!("invalid color '{}': expected #RRGGBB", text));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|e| anyhow!("invalid color '{}': {}", text, e))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    #[inline]
    pub fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl TryFrom<String> for Rgb {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Returns true if the rectangle is non-empty and lies fully inside a
    /// `width` x `height` area.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// Owned RGB frame buffer with an explicit row stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Wraps a raw buffer.
    ///
    /// `stride` is the distance in bytes between the starts of two rows and must
    /// be at least `width * 3`. The buffer must hold every row; the padding
    /// after the last row may be omitted.
    pub fn new(width: u32, height: u32, stride: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("empty frame ({}x{})", width, height));
        }
        let row_bytes = width as usize * CHANNELS;
        if stride < row_bytes {
            return Err(anyhow!(
                "stride {} is smaller than a {}px row ({} bytes)",
                stride, width, row_bytes
            ));
        }
        let needed = stride * (height as usize - 1) + row_bytes;
        if data.len() < needed {
            return Err(anyhow!(
                "frame buffer too short: {} bytes, need {} for {}x{} (stride {})",
                data.len(), needed, width, height, stride
            ));
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Takes ownership of a tightly packed `image` buffer.
    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            stride: width as usize * CHANNELS,
            data: img.into_raw(),
        }
    }

    /// A contiguous frame filled with a single color.
    #[cfg(test)]
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        Self::from_rgb_image(RgbImage::from_pixel(
            width,
            height,
            image::Rgb(color.channels()),
        ))
    }

    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[cfg(test)]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// True when rows follow each other without padding.
    pub fn is_contiguous(&self) -> bool {
        self.stride == self.width as usize * CHANNELS
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.stride + x as usize * CHANNELS)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        let i = self.offset(x, y)?;
        Some(Rgb::new(self.data[i], self.data[i + 1], self.data[i + 2]))
    }

    /// Writes one pixel. Returns false if the coordinate is outside the frame.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb) -> bool {
        match self.offset(x, y) {
            Some(i) => {
                self.data[i..i + CHANNELS].copy_from_slice(&color.channels());
                true
            }
            None => false,
        }
    }

    /// Fills a rectangle (clipped to the frame) with one color.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgb) {
        let x_end = rect.x.saturating_add(rect.width).min(self.width);
        let y_end = rect.y.saturating_add(rect.height).min(self.height);
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                self.set_pixel(x, y, color);
            }
        }
    }

    /// Copies the frame into a tightly packed layout.
    pub fn to_contiguous(&self) -> Frame {
        if self.is_contiguous() {
            return self.clone();
        }
        let row_bytes = self.width as usize * CHANNELS;
        let mut data = Vec::with_capacity(row_bytes * self.height as usize);
        for y in 0..self.height as usize {
            let start = y * self.stride;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Frame {
            width: self.width,
            height: self.height,
            stride: row_bytes,
            data,
        }
    }

    /// Contiguous copy as an `image` buffer (for encoding and resizing).
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let packed = self.to_contiguous();
        RgbImage::from_raw(packed.width, packed.height, packed.data)
            .ok_or_else(|| anyhow!("RgbImage::from_raw failed for {}x{}", self.width, self.height))
    }

    /// Brings the frame into the layout the detectors expect: contiguous rows
    /// at exactly `width` x `height`.
    ///
    /// Frames already in that shape are returned untouched; others are copied
    /// and resized with a bilinear filter.
    pub fn normalized(self, width: u32, height: u32) -> Result<Frame> {
        if self.width == width && self.height == height {
            if self.is_contiguous() {
                return Ok(self);
            }
            return Ok(self.to_contiguous());
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot resize to an empty frame ({}x{})", width, height));
        }
        let img = self.to_rgb_image()?;
        let resized = image::imageops::resize(&img, width, height, FilterType::Triangle);
        Ok(Frame::from_rgb_image(resized))
    }

    /// Read-only view of a rectangle. `None` if it does not fit in the frame.
    pub fn region(&self, rect: Rect) -> Option<Region<'_>> {
        let (start, end) = self.region_bounds(rect)?;
        Some(Region {
            width: rect.width,
            height: rect.height,
            stride: self.stride,
            data: &self.data[start..end],
        })
    }

    /// Mutable view of a rectangle. `None` if it does not fit in the frame.
    pub fn region_mut(&mut self, rect: Rect) -> Option<RegionMut<'_>> {
        let (start, end) = self.region_bounds(rect)?;
        Some(RegionMut {
            width: rect.width,
            height: rect.height,
            stride: self.stride,
            data: &mut self.data[start..end],
        })
    }

    fn region_bounds(&self, rect: Rect) -> Option<(usize, usize)> {
        if !rect.fits_within(self.width, self.height) {
            return None;
        }
        let start = self.offset(rect.x, rect.y)?;
        let end = start
            + (rect.height as usize - 1) * self.stride
            + rect.width as usize * CHANNELS;
        Some((start, end))
    }
}

/// Borrowed view of a rectangle inside a `Frame`.
///
/// `data` starts at the rectangle's top-left pixel and keeps the frame's stride.
/// Rows are read through `row`, so padding never leaks into `to_rgb_image`.
#[derive(Debug, Clone, Copy)]
pub struct Region<'a> {
    width: u32,
    height: u32,
    stride: usize,
    data: &'a [u8],
}

impl<'a> Region<'a> {
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[cfg(test)]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// One row without padding.
    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        Some(&self.data[start..start + self.width as usize * CHANNELS])
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width {
            return None;
        }
        let row = self.row(y)?;
        let i = x as usize * CHANNELS;
        Some(Rgb::new(row[i], row[i + 1], row[i + 2]))
    }

    /// Packed copy of the pixels (rows without padding).
    pub fn to_packed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.width as usize * self.height as usize * CHANNELS);
        for y in 0..self.height {
            if let Some(row) = self.row(y) {
                bytes.extend_from_slice(row);
            }
        }
        bytes
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.to_packed_bytes())
            .ok_or_else(|| anyhow!("RgbImage::from_raw failed for {}x{} region", self.width, self.height))
    }
}

/// Mutable view of a rectangle inside a `Frame`.
#[derive(Debug)]
pub struct RegionMut<'a> {
    width: u32,
    height: u32,
    stride: usize,
    data: &'a mut [u8],
}

impl<'a> RegionMut<'a> {
    /// Calls `f` with every pixel's `[r, g, b]` bytes, row by row.
    pub fn for_each_pixel(&mut self, mut f: impl FnMut(&mut [u8])) {
        let row_bytes = self.width as usize * CHANNELS;
        for y in 0..self.height as usize {
            let start = y * self.stride;
            for pixel in self.data[start..start + row_bytes].chunks_exact_mut(CHANNELS) {
                f(pixel);
            }
        }
    }

    /// Calls `f` with every channel byte of every pixel.
    pub fn for_each_channel(&mut self, mut f: impl FnMut(&mut u8)) {
        self.for_each_pixel(|pixel| pixel.iter_mut().for_each(&mut f));
    }
}
