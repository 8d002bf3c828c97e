use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Pixel layout of a [`SampleBuffer`] plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit luma plane of a bi-planar 4:2:0 YCbCr color image. The chroma
    /// plane, when present, follows the luma rows in the same buffer.
    ColorYCbCr8,
    /// Depth in meters, IEEE half precision.
    DepthFloat16,
    /// Depth in meters, IEEE single precision.
    DepthFloat32,
    /// Per-pixel depth confidence level (0 = low, 2 = high).
    ConfidenceUInt8,
}

impl PixelFormat {
    /// Bytes occupied by one sample of the primary plane.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::ColorYCbCr8 | Self::ConfidenceUInt8 => 1,
            Self::DepthFloat16 => 2,
            Self::DepthFloat32 => 4,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Self::DepthFloat16 | Self::DepthFloat32)
    }

    /// Encoding label written to recording metadata.
    pub fn encoding_name(self) -> &'static str {
        match self {
            Self::ColorYCbCr8 => "ycbcr420_8",
            Self::DepthFloat16 => "float16_le",
            Self::DepthFloat32 => "float32_le",
            Self::ConfidenceUInt8 => "uint8",
        }
    }
}

/// One timestamp-free grid of samples for a single modality.
///
/// Read-only once constructed. Rows may carry trailing padding, so
/// `bytes_per_row` can exceed `width * bytes_per_pixel`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    width: u32,
    height: u32,
    bytes_per_row: u32,
    pixel_format: PixelFormat,
    bytes: Vec<u8>,
}

impl SampleBuffer {
    /// Build a buffer, checking `bytes.len() >= height * bytes_per_row` and
    /// that a row is wide enough for `width` samples.
    pub fn new(
        width: u32,
        height: u32,
        bytes_per_row: u32,
        pixel_format: PixelFormat,
        bytes: Vec<u8>,
    ) -> Result<Self, CaptureError> {
        let buffer = Self {
            width,
            height,
            bytes_per_row,
            pixel_format,
            bytes,
        };
        buffer.validate()?;
        Ok(buffer)
    }

    /// Convenience constructor for tightly packed rows.
    pub fn packed(width: u32, height: u32, pixel_format: PixelFormat, bytes: Vec<u8>) -> Result<Self, CaptureError> {
        let bytes_per_row = width * pixel_format.bytes_per_pixel();
        Self::new(width, height, bytes_per_row, pixel_format, bytes)
    }

    /// Structural check, also used by the synchronizer before fan-out.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::InvalidSample(format!(
                "empty {:?} buffer ({}x{})",
                self.pixel_format, self.width, self.height
            )));
        }
        let min_row = self.width as u64 * self.pixel_format.bytes_per_pixel() as u64;
        if (self.bytes_per_row as u64) < min_row {
            return Err(CaptureError::InvalidSample(format!(
                "row stride {} smaller than {} bytes required for width {}",
                self.bytes_per_row, min_row, self.width
            )));
        }
        let required = self.height as u64 * self.bytes_per_row as u64;
        if (self.bytes.len() as u64) < required {
            return Err(CaptureError::InvalidSample(format!(
                "buffer holds {} bytes, {} required",
                self.bytes.len(),
                required
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.bytes_per_row
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Resolution as `[height, width]`, the order recording metadata uses.
    pub fn resolution(&self) -> [u32; 2] {
        [self.height, self.width]
    }

    /// Samples of row `y` without trailing padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.bytes_per_row as usize;
        let len = self.width as usize * self.pixel_format.bytes_per_pixel() as usize;
        &self.bytes[start..start + len]
    }

    /// Primary plane with row padding stripped, row-major.
    pub fn packed_bytes(&self) -> Vec<u8> {
        if self.bytes_per_row == self.width * self.pixel_format.bytes_per_pixel() {
            let len = self.height as usize * self.bytes_per_row as usize;
            return self.bytes[..len].to_vec();
        }
        let row_len = self.width as usize * self.pixel_format.bytes_per_pixel() as usize;
        let mut out = Vec::with_capacity(row_len * self.height as usize);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }
}
