//! Container and texture file formats
//!
//! Two unrelated binary layouts live here:
//! - [`glb`] - the glTF container (scene JSON plus one binary buffer, in one
//!   of three on-disk layouts)
//! - [`ktx2`] - the fixed KTX2 texture header, parsed just far enough to
//!   classify a file or reject it

pub mod glb;
pub mod ktx2;

pub use glb::*;
pub use ktx2::*;
