//! glTF container formats (.glb / .gltf)
//!
//! A container is the scene-description JSON plus a single binary buffer, in
//! one of three on-disk layouts (monolithic GLB, .gltf with a sibling binary
//! file, or .gltf with the buffer inlined as a base64 data URI).
//!
//! # Monolithic layout
//! ```text
//! 0x00: magic u32 = 0x46546C67 ("glTF")
//! 0x04: version u32 = 2
//! 0x08: total length u32
//! then chunks: { length u32, type u32, data (padded to 4 bytes) }
//!   JSON chunk: type 0x4E4F534A, padded with ASCII spaces
//!   BIN chunk:  type 0x004E4942, padded with zero bytes
//! ```
//! All integers are little-endian.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// "glTF" in ASCII
pub const GLB_MAGIC: u32 = 0x4654_6C67;
pub const GLB_VERSION: u32 = 2;
/// "JSON" chunk type tag
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
/// "BIN\0" chunk type tag
pub const CHUNK_BIN: u32 = 0x004E_4942;

const GLB_HEADER_SIZE: usize = 12;
const CHUNK_HEADER_SIZE: usize = 8;

#[derive(Error, Debug)]
pub enum GlbError {
    #[error("file too small for GLB header")]
    TooSmall,
    #[error("invalid GLB magic: 0x{0:08X}")]
    InvalidMagic(u32),
    #[error("unsupported GLB version: {0}")]
    UnsupportedVersion(u32),
    #[error("chunk at offset {offset} overruns the container (length {length})")]
    TruncatedChunk { offset: usize, length: u32 },
    #[error("container has no JSON chunk")]
    MissingJson,
    #[error("scene JSON root is not an object")]
    RootNotObject,
    #[error("buffer data URI is not valid base64")]
    BadBufferUri(#[source] base64::DecodeError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the container is stored on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerLayout {
    /// Single .glb file with JSON and binary chunks
    Monolithic,
    /// .gltf text file referencing a sibling binary file
    SeparateFile { bin_path: PathBuf },
    /// .gltf text file with the buffer inlined as a base64 data URI
    EmbeddedDataUri,
}

/// In-memory glTF container: scene JSON plus the single binary buffer
///
/// The container owns both halves exclusively for the duration of a patch
/// operation; every mutation must leave `json` valid scene JSON and
/// `bin.len()` a multiple of 4.
#[derive(Debug, Clone)]
pub struct GltfContainer {
    pub json: Map<String, Value>,
    pub bin: Vec<u8>,
    pub layout: ContainerLayout,
}

impl GltfContainer {
    /// Parse a monolithic GLB byte stream.
    ///
    /// Chunk lengths are bounds-checked before slicing; malformed input
    /// yields an error, never a panic.
    pub fn from_glb_bytes(bytes: &[u8]) -> Result<Self, GlbError> {
        if bytes.len() < GLB_HEADER_SIZE {
            return Err(GlbError::TooSmall);
        }
        let magic = read_u32(bytes, 0);
        if magic != GLB_MAGIC {
            return Err(GlbError::InvalidMagic(magic));
        }
        let version = read_u32(bytes, 4);
        if version != GLB_VERSION {
            return Err(GlbError::UnsupportedVersion(version));
        }

        let mut json: Option<Map<String, Value>> = None;
        let mut bin = Vec::new();

        let mut offset = GLB_HEADER_SIZE;
        while offset + CHUNK_HEADER_SIZE <= bytes.len() {
            let length = read_u32(bytes, offset);
            let chunk_type = read_u32(bytes, offset + 4);
            let data_start = offset + CHUNK_HEADER_SIZE;
            let data_end = data_start
                .checked_add(length as usize)
                .filter(|end| *end <= bytes.len())
                .ok_or(GlbError::TruncatedChunk { offset, length })?;

            let data = &bytes[data_start..data_end];
            match chunk_type {
                CHUNK_JSON => {
                    let root: Value = serde_json::from_slice(data)?;
                    match root {
                        Value::Object(map) => json = Some(map),
                        _ => return Err(GlbError::RootNotObject),
                    }
                }
                CHUNK_BIN => bin = data.to_vec(),
                // Unknown chunk types are skipped
                _ => {}
            }

            offset = data_start + align4(length as usize);
        }

        Ok(Self {
            json: json.ok_or(GlbError::MissingJson)?,
            bin,
            layout: ContainerLayout::Monolithic,
        })
    }

    /// Serialize to monolithic GLB bytes.
    ///
    /// JSON is padded with ASCII spaces and the binary chunk with zero bytes,
    /// both to 4-byte boundaries. The BIN chunk is omitted when the buffer is
    /// empty.
    pub fn to_glb_bytes(&self) -> Result<Vec<u8>, GlbError> {
        let mut json_bytes = serde_json::to_vec(&Value::Object(self.json.clone()))?;
        json_bytes.resize(align4(json_bytes.len()), b' ');

        let mut bin_bytes = self.bin.clone();
        bin_bytes.resize(align4(bin_bytes.len()), 0);

        let mut total = GLB_HEADER_SIZE + CHUNK_HEADER_SIZE + json_bytes.len();
        if !bin_bytes.is_empty() {
            total += CHUNK_HEADER_SIZE + bin_bytes.len();
        }

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        out.extend_from_slice(&GLB_VERSION.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());

        out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        out.extend_from_slice(&json_bytes);

        if !bin_bytes.is_empty() {
            out.extend_from_slice(&(bin_bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
            out.extend_from_slice(&bin_bytes);
        }

        Ok(out)
    }

    /// Load a container from disk, detecting its layout.
    ///
    /// `.glb` files are parsed as monolithic containers. For `.gltf` files
    /// the layout is decided by `buffers[0].uri`: a data URI selects the
    /// embedded layout, anything else (or no buffer at all) selects the
    /// separate-file layout with the binary file resolved as a sibling of
    /// the JSON document.
    pub fn load(path: &Path) -> Result<Self, GlbError> {
        let is_glb = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("glb"));
        if is_glb {
            return Self::from_glb_bytes(&fs::read(path)?);
        }

        let root: Value = serde_json::from_slice(&fs::read(path)?)?;
        let json = match root {
            Value::Object(map) => map,
            _ => return Err(GlbError::RootNotObject),
        };

        let buffer_uri = json
            .get("buffers")
            .and_then(Value::as_array)
            .and_then(|buffers| buffers.first())
            .and_then(|buffer| buffer.get("uri"))
            .and_then(Value::as_str);

        match buffer_uri {
            Some(uri) if uri.starts_with("data:") => {
                let payload = split_data_uri(uri).map(|(_, payload)| payload).unwrap_or("");
                let bin = BASE64.decode(payload).map_err(GlbError::BadBufferUri)?;
                Ok(Self {
                    json,
                    bin,
                    layout: ContainerLayout::EmbeddedDataUri,
                })
            }
            uri => {
                let bin_name = uri.map(str::to_owned).unwrap_or_else(|| {
                    let stem = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "buffer".to_owned());
                    format!("{stem}.bin")
                });
                let bin_path = path
                    .parent()
                    .map(|dir| dir.join(&bin_name))
                    .unwrap_or_else(|| PathBuf::from(&bin_name));
                // An absent binary file seeds an empty buffer
                let bin = if bin_path.exists() {
                    fs::read(&bin_path)?
                } else {
                    Vec::new()
                };
                Ok(Self {
                    json,
                    bin,
                    layout: ContainerLayout::SeparateFile { bin_path },
                })
            }
        }
    }

    /// Write the container back to disk according to its layout.
    ///
    /// One rewrite per target file; callers must hold exclusive ownership of
    /// the paths for the duration of the call.
    pub fn save(&self, path: &Path) -> Result<(), GlbError> {
        match &self.layout {
            ContainerLayout::Monolithic => {
                fs::write(path, self.to_glb_bytes()?)?;
            }
            ContainerLayout::SeparateFile { bin_path } => {
                let bin_name = bin_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "buffer.bin".to_owned());
                let mut json = self.json.clone();
                let has_buffer = match first_buffer_mut(&mut json) {
                    Some(buffer) => {
                        buffer
                            .entry("uri".to_owned())
                            .or_insert_with(|| Value::String(bin_name));
                        true
                    }
                    None => false,
                };
                if has_buffer || !self.bin.is_empty() {
                    fs::write(bin_path, &self.bin)?;
                }
                fs::write(path, serialize_gltf(&json)?)?;
            }
            ContainerLayout::EmbeddedDataUri => {
                let mut json = self.json.clone();
                if let Some(buffer) = first_buffer_mut(&mut json) {
                    let uri = format!(
                        "data:application/octet-stream;base64,{}",
                        BASE64.encode(&self.bin)
                    );
                    buffer.insert("uri".to_owned(), Value::String(uri));
                }
                fs::write(path, serialize_gltf(&json)?)?;
            }
        }
        Ok(())
    }
}

/// Split a `data:<mime>;base64,<payload>` URI into its MIME type and payload.
pub fn split_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    Some((mime, payload))
}

/// Round up to the next 4-byte boundary
pub fn align4(len: usize) -> usize {
    len.div_ceil(4) * 4
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn first_buffer_mut(json: &mut Map<String, Value>) -> Option<&mut Map<String, Value>> {
    json.get_mut("buffers")
        .and_then(Value::as_array_mut)
        .and_then(|buffers| buffers.first_mut())
        .and_then(Value::as_object_mut)
}

fn serialize_gltf(json: &Map<String, Value>) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(&Value::Object(json.clone()))
}
