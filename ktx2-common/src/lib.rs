//! Shared container and texture-header formats for the glTF KTX2 pipeline
//!
//! This crate provides the binary core shared between:
//! - `gltf-ktx2` (conversion CLI)
//! - anything else that needs to rewrite glTF containers or classify KTX2 files
//!
//! # Modules
//!
//! - [`formats`] - glTF container codec (.glb/.gltf) and the KTX2 header parser
//! - [`patch`] - relocation of inline KTX2 image payloads into the binary buffer

pub mod formats;
pub mod patch;

// Re-export commonly used format items
pub use formats::{
    ContainerLayout, GlbError, GltfContainer, Ktx2Error, Ktx2Header, Rgba8Level, CHUNK_BIN,
    CHUNK_JSON, GLB_MAGIC, GLB_VERSION, KTX2_MAGIC,
};

// Re-export the patcher entry points
pub use patch::{embed_ktx2_images, BufferView, PatchError, KTX2_DATA_URI_PREFIX, KTX2_MIME};
