//! Environment-map pipelines
//!
//! Encode: normalize the HDR panorama, project it onto six faces, write the
//! face PNGs to a temp dir, and hand them to `toktx --cubemap`.
//!
//! Decode: extract the faces with `ktx extract --face all`, identify them by
//! name, and reproject to an equirectangular panorama, degrading to
//! single-image decode (and ultimately to the trivial header-parser
//! fallback) when the extraction does not produce six faces.

pub mod faces;
pub mod project;

use crate::ktx::{EncodeOptions, KtxTools};
use anyhow::{Context, Result};
use image::{Rgba32FImage, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use faces::Confidence;
use project::FACE_ORDER;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvmapError {
    #[error("panorama is {width}x{height}, expected 2:1 equirectangular")]
    BadAspect { width: u32, height: u32 },
    #[error("resolution too small")]
    ResolutionTooSmall,
    #[error("expected 6 cubemap faces, got {0}")]
    FaceCount(usize),
    #[error("face {axis} is {width}x{height}, expected {expected}x{expected}")]
    FaceSizeMismatch {
        axis: &'static str,
        width: u32,
        height: u32,
        expected: u32,
    },
}

/// Encoded cubemap plus the HDR intensity factor destined for the
/// `KHR_environment_map` extension's `intensity` field
#[derive(Debug, Clone)]
pub struct EncodedEnvmap {
    pub ktx2: Vec<u8>,
    pub intensity: f32,
}

/// Encode an equirectangular panorama file as a KTX2 cubemap.
pub fn encode_environment(
    tools: &KtxTools,
    panorama: &Path,
    face_size: u32,
    options: &EncodeOptions,
) -> Result<EncodedEnvmap> {
    let mut equirect = image::open(panorama)
        .with_context(|| format!("Failed to load panorama: {}", panorama.display()))?
        .to_rgba32f();

    let intensity = project::normalize_hdr(&mut equirect);
    if intensity > 1.0 {
        tracing::info!(intensity, "HDR input clipped, compensating with intensity factor");
    }

    let faces = project::equirect_to_faces(&equirect, face_size)?;

    let dir = tempfile::tempdir().context("Failed to create temp dir for cubemap faces")?;
    let mut face_paths = Vec::with_capacity(6);
    for (axis, face) in FACE_ORDER.iter().zip(&faces) {
        let path = dir.path().join(format!("face_{}.png", axis.file_tag()));
        to_rgba8(face)
            .save(&path)
            .with_context(|| format!("Failed to write face {}", axis.label()))?;
        face_paths.push(path);
    }

    let output = dir.path().join("envmap.ktx2");
    tools.encode_cubemap(&face_paths, &output, options)?;

    let ktx2 = fs::read(&output).context("Failed to read encoded cubemap")?;
    Ok(EncodedEnvmap { ktx2, intensity })
}

/// Decode a KTX2 cubemap file back to an equirectangular panorama.
pub fn decode_environment(
    tools: Option<&KtxTools>,
    ktx2_path: &Path,
    output_width: u32,
) -> Result<Rgba32FImage> {
    let Some(tools) = tools else {
        // No tools installed: the trivial fallback is all we have
        return decode_fallback(ktx2_path);
    };

    let dir = tempfile::tempdir().context("Failed to create temp dir for extracted faces")?;
    let face_files = match tools.extract_faces(ktx2_path, dir.path()) {
        Ok(files) => files,
        Err(error) => {
            tracing::warn!(%error, "ktx extract failed, decoding as a single image");
            return decode_texture(Some(tools), ktx2_path);
        }
    };

    match face_files.len() {
        6 => reproject_faces(&face_files, output_width),
        1 => {
            tracing::warn!("extraction produced a single image, skipping reprojection");
            let img = image::open(&face_files[0])
                .with_context(|| format!("Failed to load {}", face_files[0].display()))?;
            Ok(img.to_rgba32f())
        }
        0 => {
            tracing::warn!("extraction produced no images, decoding as a single image");
            decode_texture(Some(tools), ktx2_path)
        }
        n => {
            tracing::warn!(faces = n, "unexpected number of extracted faces, expected 6");
            decode_texture(Some(tools), ktx2_path)
        }
    }
}

/// Decode a (non-cubemap) KTX2 texture to an image, falling back to the
/// header parser's trivial uncompressed path when the tool fails.
pub fn decode_texture(tools: Option<&KtxTools>, ktx2_path: &Path) -> Result<Rgba32FImage> {
    if let Some(tools) = tools {
        let dir = tempfile::tempdir().context("Failed to create temp dir")?;
        let png = dir.path().join("texture.png");
        match tools.extract_image(ktx2_path, &png) {
            Ok(()) => {
                let img = image::open(&png).context("Failed to load extracted PNG")?;
                return Ok(img.to_rgba32f());
            }
            Err(error) => {
                tracing::warn!(%error, "ktx extract failed, trying the trivial fallback decoder");
            }
        }
    }
    decode_fallback(ktx2_path)
}

/// Last resort: the uncompressed-RGBA8 header-parser path.
fn decode_fallback(ktx2_path: &Path) -> Result<Rgba32FImage> {
    let bytes = fs::read(ktx2_path)
        .with_context(|| format!("Failed to read {}", ktx2_path.display()))?;
    let level = ktx2_common::formats::ktx2::decode_rgba8(&bytes)
        .context("Fallback decoder cannot handle this KTX2 file")?;

    let image = RgbaImage::from_raw(level.width, level.height, level.pixels)
        .context("Decoded level size mismatch")?;
    Ok(image::DynamicImage::ImageRgba8(image).to_rgba32f())
}

/// Identify extracted face files by name, load them, and reproject.
fn reproject_faces(face_files: &[PathBuf], output_width: u32) -> Result<Rgba32FImage> {
    let names: Vec<String> = face_files
        .iter()
        .map(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect();

    let ordering = faces::identify(&names)?;
    if ordering.confidence == Confidence::Lexicographic {
        tracing::warn!("could not determine cubemap face order from names, using lexicographic order");
    }

    let mut loaded: Vec<Rgba32FImage> = Vec::with_capacity(6);
    for position in ordering.order {
        let path = &face_files[position];
        let img = image::open(path)
            .with_context(|| format!("Failed to load face {}", path.display()))?;
        loaded.push(img.to_rgba32f());
    }
    let faces: [Rgba32FImage; 6] = loaded
        .try_into()
        .unwrap_or_else(|_| unreachable!("ordering is a permutation of six faces"));

    Ok(project::faces_to_equirect(&faces, output_width)?)
}

/// Convert a float raster to 8-bit for PNG interchange with the KTX tools
pub fn to_rgba8(image: &Rgba32FImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y);
        image::Rgba(pixel.0.map(|v| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8))
    })
}
