//! KTX2 texture container header
//!
//! Reads just enough of the fixed header to classify a file. Full decoding
//! (block transcoding, supercompression, mip chains) belongs to the external
//! `ktx` tool; the only payload this module ever extracts is a single
//! uncompressed RGBA8 level, as a last resort when the tool is unavailable.
//!
//! # Layout
//! ```text
//! 0x00: identifier [12 bytes]
//! 0x0C: vkFormat u32
//! 0x10: typeSize u32
//! 0x14: pixelWidth u32
//! 0x18: pixelHeight u32
//! 0x1C: pixelDepth u32
//! 0x20: layerCount u32
//! 0x24: faceCount u32
//! 0x28: levelCount u32
//! 0x2C: supercompressionScheme u32
//! 0x30: dfdByteOffset u32, dfdByteLength u32
//! 0x38: kvdByteOffset u32, kvdByteLength u32
//! 0x40: sgdByteOffset u64, sgdByteLength u64
//! 0x50: level 0 byteOffset u64, byteLength u64
//! ```
//! All integers are little-endian.

use thiserror::Error;

/// KTX2 identifier: «KTX 20» with the PNG-style transmission guards
pub const KTX2_MAGIC: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x32, 0x30, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

/// VK_FORMAT_R8G8B8A8_UNORM, the single pixel format the fallback handles
pub const VK_FORMAT_R8G8B8A8_UNORM: u32 = 37;

/// Header size through the first level-index entry
pub const KTX2_HEADER_SIZE: usize = 96;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Ktx2Error {
    #[error("file too small for KTX2 header")]
    TooSmall,
    #[error("invalid KTX2 identifier")]
    InvalidMagic,
    #[error("supercompression scheme {0} requires the external ktx tool")]
    Supercompressed(u32),
    #[error("vkFormat {0} is not uncompressed RGBA8")]
    UnsupportedFormat(u32),
    #[error("level 0 data out of bounds (offset {offset}, length {length})")]
    LevelOutOfBounds { offset: u64, length: u64 },
    #[error("level 0 length {got} does not match {width}x{height} RGBA8")]
    LevelSizeMismatch { got: u64, width: u32, height: u32 },
}

/// Fixed KTX2 header fields, read-only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ktx2Header {
    pub vk_format: u32,
    pub type_size: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub pixel_depth: u32,
    pub layer_count: u32,
    pub face_count: u32,
    pub level_count: u32,
    pub supercompression_scheme: u32,
    pub dfd_byte_offset: u32,
    pub dfd_byte_length: u32,
    pub kvd_byte_offset: u32,
    pub kvd_byte_length: u32,
    pub sgd_byte_offset: u64,
    pub sgd_byte_length: u64,
    pub level0_byte_offset: u64,
    pub level0_byte_length: u64,
}

impl Ktx2Header {
    /// Read the fixed header fields.
    ///
    /// Only the identifier and minimum length are validated here; a header
    /// that parses may still be rejected by [`decode_rgba8`].
    pub fn parse(bytes: &[u8]) -> Result<Self, Ktx2Error> {
        if bytes.len() < KTX2_HEADER_SIZE {
            return Err(Ktx2Error::TooSmall);
        }
        if bytes[..12] != KTX2_MAGIC {
            return Err(Ktx2Error::InvalidMagic);
        }
        Ok(Self {
            vk_format: read_u32(bytes, 12),
            type_size: read_u32(bytes, 16),
            pixel_width: read_u32(bytes, 20),
            pixel_height: read_u32(bytes, 24),
            pixel_depth: read_u32(bytes, 28),
            layer_count: read_u32(bytes, 32),
            face_count: read_u32(bytes, 36),
            level_count: read_u32(bytes, 40),
            supercompression_scheme: read_u32(bytes, 44),
            dfd_byte_offset: read_u32(bytes, 48),
            dfd_byte_length: read_u32(bytes, 52),
            kvd_byte_offset: read_u32(bytes, 56),
            kvd_byte_length: read_u32(bytes, 60),
            sgd_byte_offset: read_u64(bytes, 64),
            sgd_byte_length: read_u64(bytes, 72),
            level0_byte_offset: read_u64(bytes, 80),
            level0_byte_length: read_u64(bytes, 88),
        })
    }
}

/// One decoded RGBA8 level
///
/// Rows run bottom-to-top relative to file storage order (the header's
/// declared orientation), so the byte stream can be handed straight to an
/// image buffer with row 0 at the top of the displayed picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rgba8Level {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Extract level 0 of a trivial uncompressed RGBA8 KTX2 file.
///
/// Everything else (supercompressed payloads, any other vkFormat, a level
/// whose length disagrees with the dimensions) is a typed rejection that
/// signals "use the external tool instead".
pub fn decode_rgba8(bytes: &[u8]) -> Result<Rgba8Level, Ktx2Error> {
    let header = Ktx2Header::parse(bytes)?;

    if header.supercompression_scheme != 0 {
        return Err(Ktx2Error::Supercompressed(header.supercompression_scheme));
    }
    if header.vk_format != VK_FORMAT_R8G8B8A8_UNORM {
        return Err(Ktx2Error::UnsupportedFormat(header.vk_format));
    }

    let offset = header.level0_byte_offset;
    let length = header.level0_byte_length;
    match offset.checked_add(length) {
        Some(end) if end <= bytes.len() as u64 => {}
        _ => return Err(Ktx2Error::LevelOutOfBounds { offset, length }),
    }

    let width = header.pixel_width;
    let height = header.pixel_height;
    let expected = u64::from(width) * u64::from(height) * 4;
    if length != expected {
        return Err(Ktx2Error::LevelSizeMismatch { got: length, width, height });
    }

    let data = &bytes[offset as usize..(offset + length) as usize];
    let row_len = width as usize * 4;
    let mut pixels = Vec::with_capacity(data.len());
    for row in data.chunks_exact(row_len).rev() {
        pixels.extend_from_slice(row);
    }

    Ok(Rgba8Level { width, height, pixels })
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}
