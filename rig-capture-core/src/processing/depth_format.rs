//! Side-file wire formats for depth maps and camera matrices.
//!
//! Depth file layout (all little-endian):
//! ```text
//! [0-3]    width  (i32)   ┐ only when the dimensions header is enabled
//! [4-7]    height (i32)   ┘
//! [8-..]   width * height samples, row-major, f16 or f32
//! ```
//!
//! Matrices are flat row-major f32 arrays. The shape (3x3, 4x3 or 4x4) is
//! not stored; readers know it from the file name.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::models::capture_models::{Matrix3, PoseTransform};
use crate::models::error::CaptureError;
use crate::models::sample_buffer::{PixelFormat, SampleBuffer};

/// Size of the optional width/height prefix in bytes.
pub const DEPTH_HEADER_SIZE: usize = 8;

/// Encode a depth (or confidence) buffer for a side file, stripping row padding.
pub fn encode_depth(buffer: &SampleBuffer, with_header: bool) -> Result<Vec<u8>, CaptureError> {
    buffer.validate()?;
    let payload = buffer.packed_bytes();
    let mut out = Vec::with_capacity(payload.len() + DEPTH_HEADER_SIZE);
    if with_header {
        let width = i32::try_from(buffer.width())
            .map_err(|_| CaptureError::EncodingFailed("depth width exceeds i32".into()))?;
        let height = i32::try_from(buffer.height())
            .map_err(|_| CaptureError::EncodingFailed("depth height exceeds i32".into()))?;
        out.write_i32::<LittleEndian>(width)?;
        out.write_i32::<LittleEndian>(height)?;
    }
    out.extend_from_slice(&payload);
    Ok(out)
}

/// A decoded depth side file.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl DepthMap {
    pub fn at(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }
}

/// Decode a depth side file written with a dimensions header.
pub fn decode_depth(data: &[u8], format: PixelFormat) -> Result<DepthMap, CaptureError> {
    if data.len() < DEPTH_HEADER_SIZE {
        return Err(CaptureError::InvalidSample("depth file shorter than its header".into()));
    }
    let mut cursor = Cursor::new(data);
    let width = cursor.read_i32::<LittleEndian>()?;
    let height = cursor.read_i32::<LittleEndian>()?;
    if width <= 0 || height <= 0 {
        return Err(CaptureError::InvalidSample(format!("bad depth dimensions {}x{}", width, height)));
    }
    decode_depth_payload(&data[DEPTH_HEADER_SIZE..], width as u32, height as u32, format)
}

/// Decode a headerless depth payload whose dimensions are known out-of-band.
pub fn decode_depth_payload(
    payload: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<DepthMap, CaptureError> {
    let count = width as usize * height as usize;
    let expected = count * format.bytes_per_pixel() as usize;
    if !format.is_depth() {
        return Err(CaptureError::InvalidSample(format!("{:?} is not a depth format", format)));
    }
    if payload.len() != expected {
        return Err(CaptureError::InvalidSample(format!(
            "depth payload has {} bytes, {} expected",
            payload.len(),
            expected
        )));
    }

    let mut cursor = Cursor::new(payload);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let value = match format {
            PixelFormat::DepthFloat16 => f16_bits_to_f32(cursor.read_u16::<LittleEndian>()?),
            _ => cursor.read_f32::<LittleEndian>()?,
        };
        values.push(value);
    }
    Ok(DepthMap { width, height, values })
}

/// Expand IEEE 754 half-precision bits to f32.
pub fn f16_bits_to_f32(bits: u16) -> f32 {
    let sign = ((bits >> 15) & 0x1) as u32;
    let exponent = ((bits >> 10) & 0x1f) as u32;
    let mantissa = (bits & 0x3ff) as u32;

    let out = match (exponent, mantissa) {
        (0, 0) => sign << 31,
        (0, m) => {
            // subnormal: renormalize
            let mut e: i32 = -14;
            let mut m = m;
            while m & 0x400 == 0 {
                m <<= 1;
                e -= 1;
            }
            let m = m & 0x3ff;
            (sign << 31) | (((e + 127) as u32) << 23) | (m << 13)
        }
        (0x1f, m) => (sign << 31) | (0xff << 23) | (m << 13),
        (e, m) => (sign << 31) | ((e + 127 - 15) << 23) | (m << 13),
    };
    f32::from_bits(out)
}

/// Serialize a 3x3 matrix row-major.
pub fn serialize_matrix3(matrix: &Matrix3) -> Vec<u8> {
    serialize_floats(matrix.iter().flatten().copied())
}

/// Serialize a pose transform row-major (16 or 12 floats).
pub fn serialize_transform(transform: &PoseTransform) -> Vec<u8> {
    serialize_floats(transform.to_row_major())
}

fn serialize_floats(values: impl IntoIterator<Item = f32>) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Deserialize a flat row-major matrix of `rows * cols` floats.
pub fn deserialize_matrix(data: &[u8], rows: usize, cols: usize) -> Result<Vec<Vec<f32>>, CaptureError> {
    if data.len() != rows * cols * 4 {
        return Err(CaptureError::InvalidSample(format!(
            "{}x{} matrix needs {} bytes, got {}",
            rows,
            cols,
            rows * cols * 4,
            data.len()
        )));
    }
    let mut cursor = Cursor::new(data);
    let mut matrix = Vec::with_capacity(rows);
    for _ in 0..rows {
        let mut row = Vec::with_capacity(cols);
        for _ in 0..cols {
            row.push(cursor.read_f32::<LittleEndian>()?);
        }
        matrix.push(row);
    }
    Ok(matrix)
}

pub fn deserialize_matrix3(data: &[u8]) -> Result<Matrix3, CaptureError> {
    let rows = deserialize_matrix(data, 3, 3)?;
    let mut out = [[0.0f32; 3]; 3];
    for (dst, src) in out.iter_mut().zip(rows) {
        dst.copy_from_slice(&src);
    }
    Ok(out)
}
