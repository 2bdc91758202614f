//! gltf-ktx2 library
//!
//! Provides the conversion pipelines behind the CLI: equirectangular and
//! cubemap projection, face identification, and the external KTX tool
//! boundary.

pub mod envmap;
pub mod ktx;

// Re-export the projection engine
pub use envmap::project::{equirect_to_faces, faces_to_equirect, normalize_hdr, FaceAxis, FACE_ORDER};

// Re-export face identification
pub use envmap::faces::{identify, Confidence, FaceOrdering};

// Re-export the tool boundary
pub use ktx::{Codec, EncodeOptions, KtxTools};
