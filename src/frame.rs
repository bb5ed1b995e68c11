use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layouts a frame source may deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// 8-bit grayscale
    Gray8,
    /// RGB24 format - uncompressed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Gray8 => 1,
            FrameFormat::Rgb24 => 3,
        }
    }
}

/// Axis-aligned face box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Integer pixel rectangle `(x, y, width, height)` clipped to the frame.
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let left = self.x.max(0.0).floor();
        let top = self.y.max(0.0).floor();
        let right = (self.x + self.width).min(frame_width as f64).ceil();
        let bottom = (self.y + self.height).min(frame_height as f64).ceil();

        if !(right > left && bottom > top) {
            return None;
        }

        Some((
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// A single captured frame handed to the embedding oracle
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic frame identifier assigned by the frame source
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw pixel data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout
    pub format: FrameFormat,
}

impl Frame {
    /// Create a new frame
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Blank frame of the given size
    pub fn blank(id: u64, width: u32, height: u32, format: FrameFormat) -> Self {
        let size = width as usize * height as usize * format.bytes_per_pixel();
        Self::new(id, SystemTime::now(), vec![0; size], width, height, format)
    }

    /// Get the expected frame size
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Copy the pixels under `bbox` out of the frame.
    ///
    /// Returns the clipped `(width, height, pixels)`, or `None` if the box is
    /// outside the frame or the buffer is short.
    pub fn crop(&self, bbox: &BoundingBox) -> Option<(u32, u32, Vec<u8>)> {
        if !self.validate_size() {
            return None;
        }

        let (x, y, width, height) = bbox.clamp_to(self.width, self.height)?;
        let bpp = self.format.bytes_per_pixel();
        let stride = self.width as usize * bpp;
        let row_len = width as usize * bpp;

        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in y..y + height {
            let start = row as usize * stride + x as usize * bpp;
            pixels.extend_from_slice(&self.data[start..start + row_len]);
        }

        Some((width, height, pixels))
    }
}
