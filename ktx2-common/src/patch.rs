//! Inline KTX2 image relocation
//!
//! Moves `data:image/ktx2;base64,` payloads out of the scene JSON and into
//! 4-byte-aligned regions of buffer 0, appending one bufferView per image
//! and rewriting each image entry to reference it. Images with any other URI
//! form, or already referencing a bufferView, are left untouched, which also
//! makes the operation idempotent.

use crate::formats::glb::GltfContainer;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Data-URI prefix recognized by the patcher
pub const KTX2_DATA_URI_PREFIX: &str = "data:image/ktx2;base64,";

/// MIME type written into relocated image entries
pub const KTX2_MIME: &str = "image/ktx2";

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("image {index}: malformed base64 payload")]
    Decode {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },
    #[error("`{0}` is not an array")]
    NotAnArray(&'static str),
    #[error("buffers[0] is not an object")]
    BadBufferEntry,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A region of buffer 0, appended to `bufferViews[]`
///
/// Created exactly once per relocated image; views never alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: u32,
    pub byte_offset: u64,
    pub byte_length: u64,
}

/// Relocate every inline KTX2 image payload into the binary buffer.
///
/// Returns the number of images moved. All-or-nothing: every matched payload
/// is decoded before the first mutation, so a malformed one (reported with
/// its image index) leaves the container untouched. Afterwards the buffer is
/// zero-padded to a 4-byte multiple and `buffers[0].byteLength` reflects its
/// final length.
pub fn embed_ktx2_images(container: &mut GltfContainer) -> Result<usize, PatchError> {
    // Decode pass: no container mutation until every payload has decoded
    let mut decoded: Vec<(usize, Vec<u8>)> = Vec::new();
    if let Some(images) = container.json.get("images") {
        let images = images
            .as_array()
            .ok_or(PatchError::NotAnArray("images"))?;
        for (index, entry) in images.iter().enumerate() {
            let Some(uri) = entry.get("uri").and_then(Value::as_str) else {
                continue;
            };
            let Some(payload) = uri.strip_prefix(KTX2_DATA_URI_PREFIX) else {
                continue;
            };
            let bytes = BASE64
                .decode(payload)
                .map_err(|source| PatchError::Decode { index, source })?;
            decoded.push((index, bytes));
        }
    }

    if decoded.is_empty() {
        return Ok(0);
    }
    let count = decoded.len();

    // Apply pass
    for (index, bytes) in decoded {
        container.bin.resize(crate::formats::glb::align4(container.bin.len()), 0);
        let view = BufferView {
            buffer: 0,
            byte_offset: container.bin.len() as u64,
            byte_length: bytes.len() as u64,
        };
        container.bin.extend_from_slice(&bytes);

        let views = container
            .json
            .entry("bufferViews".to_owned())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or(PatchError::NotAnArray("bufferViews"))?;
        views.push(serde_json::to_value(view)?);
        let view_index = views.len() - 1;

        // The decode pass already proved images[index] exists and has a URI
        if let Some(image) = container
            .json
            .get_mut("images")
            .and_then(Value::as_array_mut)
            .and_then(|images| images.get_mut(index))
            .and_then(Value::as_object_mut)
        {
            image.insert("bufferView".to_owned(), Value::from(view_index));
            image.insert("mimeType".to_owned(), Value::from(KTX2_MIME));
            image.remove("uri");
        }
    }

    // Alignment invariant: the buffer length is a multiple of 4 after any write
    container.bin.resize(crate::formats::glb::align4(container.bin.len()), 0);

    let byte_length = container.bin.len() as u64;
    let buffers = container
        .json
        .entry("buffers".to_owned())
        .or_insert_with(|| Value::Array(vec![Value::Object(Map::new())]))
        .as_array_mut()
        .ok_or(PatchError::NotAnArray("buffers"))?;
    if buffers.is_empty() {
        buffers.push(Value::Object(Map::new()));
    }
    let buffer = buffers[0].as_object_mut().ok_or(PatchError::BadBufferEntry)?;
    buffer.insert("byteLength".to_owned(), Value::from(byte_length));

    tracing::info!(count, byte_length, "embedded inline KTX2 images into buffer 0");
    Ok(count)
}
