//! Equirectangular to cubemap projection and back
//!
//! Pure per-pixel math over float rasters. Both directions share one face
//! basis table; the decode path applies its closed-form inverse, so an
//! encode/decode round-trip reproduces the source panorama up to resampling
//! error near face seams.

use super::EnvmapError;
use image::Rgba32FImage;
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// One axis of the cubemap, in canonical order `[+X, -X, +Y, -Y, +Z, -Z]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceAxis {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

/// Canonical face order; encode always produces it, decode requires it
pub const FACE_ORDER: [FaceAxis; 6] = [
    FaceAxis::PosX,
    FaceAxis::NegX,
    FaceAxis::PosY,
    FaceAxis::NegY,
    FaceAxis::PosZ,
    FaceAxis::NegZ,
];

impl FaceAxis {
    /// Position in the canonical order
    pub fn index(self) -> usize {
        match self {
            FaceAxis::PosX => 0,
            FaceAxis::NegX => 1,
            FaceAxis::PosY => 2,
            FaceAxis::NegY => 3,
            FaceAxis::PosZ => 4,
            FaceAxis::NegZ => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FaceAxis::PosX => "+X",
            FaceAxis::NegX => "-X",
            FaceAxis::PosY => "+Y",
            FaceAxis::NegY => "-Y",
            FaceAxis::PosZ => "+Z",
            FaceAxis::NegZ => "-Z",
        }
    }

    /// Short tag used in generated face file names
    pub fn file_tag(self) -> &'static str {
        match self {
            FaceAxis::PosX => "px",
            FaceAxis::NegX => "nx",
            FaceAxis::PosY => "py",
            FaceAxis::NegY => "ny",
            FaceAxis::PosZ => "pz",
            FaceAxis::NegZ => "nz",
        }
    }

    /// View direction through the face at normalized `(u, v)` in `[-1, 1]²`
    fn direction(self, u: f32, v: f32) -> [f32; 3] {
        match self {
            FaceAxis::PosX => [1.0, v, -u],
            FaceAxis::NegX => [-1.0, v, u],
            FaceAxis::PosY => [u, 1.0, -v],
            FaceAxis::NegY => [u, -1.0, v],
            FaceAxis::PosZ => [u, v, 1.0],
            FaceAxis::NegZ => [-u, v, -1.0],
        }
    }

    /// Inverse of [`direction`](Self::direction): face `(u, v)` for a
    /// direction whose dominant axis selected this face.
    fn face_uv(self, [dx, dy, dz]: [f32; 3]) -> (f32, f32) {
        match self {
            FaceAxis::PosX => (-dz / dx, dy / dx),
            FaceAxis::NegX => (dz / -dx, dy / -dx),
            FaceAxis::PosY => (dx / dy, -dz / dy),
            FaceAxis::NegY => (dx / -dy, dz / -dy),
            FaceAxis::PosZ => (dx / dz, dy / dz),
            FaceAxis::NegZ => (dx / dz, dy / -dz),
        }
    }
}

/// Select the face for a view direction: largest absolute component wins,
/// ties broken X over Y over Z to match the encode convention.
fn dominant_face([dx, dy, dz]: [f32; 3]) -> FaceAxis {
    let (ax, ay, az) = (dx.abs(), dy.abs(), dz.abs());
    if ax >= ay && ax >= az {
        if dx > 0.0 { FaceAxis::PosX } else { FaceAxis::NegX }
    } else if ay >= az {
        if dy > 0.0 { FaceAxis::PosY } else { FaceAxis::NegY }
    } else if dz > 0.0 {
        FaceAxis::PosZ
    } else {
        FaceAxis::NegZ
    }
}

/// Clamp HDR pixels to [0, 1] in place and return the intensity factor that
/// compensates for the clipped energy. SDR input (no component above 1.0)
/// is untouched and reports 1.0.
pub fn normalize_hdr(image: &mut Rgba32FImage) -> f32 {
    let mut max = 0.0f32;
    let mut sum_before = 0.0f64;
    let mut sum_after = 0.0f64;
    let mut samples = 0u64;

    for pixel in image.pixels() {
        for value in &pixel.0[..3] {
            max = max.max(*value);
            sum_before += f64::from(*value);
            sum_after += f64::from(value.clamp(0.0, 1.0));
            samples += 1;
        }
    }
    if max <= 1.0 || samples == 0 {
        return 1.0;
    }

    for pixel in image.pixels_mut() {
        for value in &mut pixel.0 {
            *value = value.clamp(0.0, 1.0);
        }
    }

    let mean_before = sum_before / samples as f64;
    let mean_after = sum_after / samples as f64;
    if mean_after > 0.0 {
        // 1.3x boost compensates for compression losses downstream
        (mean_before / mean_after * 1.3) as f32
    } else {
        1.0
    }
}

/// Project an equirectangular panorama onto six square cubemap faces.
///
/// Faces come back in canonical order. Nearest-neighbor sampling with
/// clamp-to-bounds; the input must be 2:1.
pub fn equirect_to_faces(
    src: &Rgba32FImage,
    face_size: u32,
) -> Result<[Rgba32FImage; 6], EnvmapError> {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 || height != width / 2 {
        return Err(EnvmapError::BadAspect { width, height });
    }
    if face_size == 0 {
        return Err(EnvmapError::ResolutionTooSmall);
    }

    Ok(FACE_ORDER.map(|axis| {
        let mut face = Rgba32FImage::new(face_size, face_size);
        for y in 0..face_size {
            for x in 0..face_size {
                let u = 2.0 * x as f32 / face_size as f32 - 1.0;
                let v = 2.0 * y as f32 / face_size as f32 - 1.0;

                let [dx, dy, dz] = normalize(axis.direction(u, v));

                // Longitude and latitude of the view direction
                let theta = dx.atan2(dz);
                let phi = dy.asin();

                let eq_u = (theta + PI) / TAU;
                let eq_v = 1.0 - (phi + FRAC_PI_2) / PI;

                let sx = sample_coord(eq_u, width);
                let sy = sample_coord(eq_v, height);
                face.put_pixel(x, y, *src.get_pixel(sx, sy));
            }
        }
        face
    }))
}

/// Reassemble an equirectangular panorama from six cubemap faces in
/// canonical order. `output_width` must be even; the output is 2:1.
pub fn faces_to_equirect(
    faces: &[Rgba32FImage; 6],
    output_width: u32,
) -> Result<Rgba32FImage, EnvmapError> {
    let face_size = faces[0].width();
    for (axis, face) in FACE_ORDER.iter().zip(faces) {
        if face.width() != face.height() || face.width() != face_size {
            return Err(EnvmapError::FaceSizeMismatch {
                axis: axis.label(),
                width: face.width(),
                height: face.height(),
                expected: face_size,
            });
        }
    }
    if face_size < 2 || output_width < 4 {
        return Err(EnvmapError::ResolutionTooSmall);
    }

    let output_height = output_width / 2;
    let mut out = Rgba32FImage::new(output_width, output_height);

    for y in 0..output_height {
        // Latitude runs from +pi/2 at the top row to -pi/2 at the bottom
        let v_norm = y as f32 / (output_height - 1) as f32;
        let phi = (1.0 - v_norm) * PI - FRAC_PI_2;

        for x in 0..output_width {
            // Longitude runs from -pi at the left edge to +pi at the right
            let u_norm = x as f32 / (output_width - 1) as f32;
            let theta = u_norm * TAU - PI;

            let dir = [phi.cos() * theta.sin(), phi.sin(), phi.cos() * theta.cos()];
            let axis = dominant_face(dir);
            let (face_u, face_v) = axis.face_uv(dir);

            let px = sample_coord((face_u + 1.0) / 2.0, face_size);
            let py = sample_coord((face_v + 1.0) / 2.0, face_size);
            out.put_pixel(x, y, *faces[axis.index()].get_pixel(px, py));
        }
    }

    Ok(out)
}

fn normalize([x, y, z]: [f32; 3]) -> [f32; 3] {
    let length = (x * x + y * y + z * z).sqrt();
    [x / length, y / length, z / length]
}

/// Map a normalized coordinate in [0, 1] to a clamped pixel index
fn sample_coord(normalized: f32, size: u32) -> u32 {
    ((normalized * (size - 1) as f32) as u32).min(size - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn flat_panorama(width: u32, color: [f32; 4]) -> Rgba32FImage {
        Rgba32FImage::from_pixel(width, width / 2, Rgba(color))
    }

    /// Panorama whose pixel encodes its own (x, y) in the red/green channels
    fn gradient_panorama(width: u32) -> Rgba32FImage {
        Rgba32FImage::from_fn(width, width / 2, |x, y| {
            Rgba([
                x as f32 / (width - 1) as f32,
                y as f32 / (width / 2 - 1) as f32,
                0.0,
                1.0,
            ])
        })
    }

    #[test]
    fn test_flat_color_faces() {
        let color = [0.2f32, 0.5, 0.8, 1.0];
        let faces = equirect_to_faces(&flat_panorama(64, color), 16).unwrap();

        for face in &faces {
            assert_eq!(face.dimensions(), (16, 16));
            for pixel in face.pixels() {
                assert_eq!(pixel.0, color);
            }
        }
    }

    #[test]
    fn test_rejects_non_equirect_input() {
        let square = Rgba32FImage::new(32, 32);
        assert!(matches!(
            equirect_to_faces(&square, 16),
            Err(EnvmapError::BadAspect { .. })
        ));
    }

    #[test]
    fn test_face_centers_hit_cardinal_directions() {
        let width = 256u32;
        let src = gradient_panorama(width);
        let res = 64u32;
        let faces = equirect_to_faces(&src, res).unwrap();

        // +Z face center looks along theta=0: the panorama's horizontal middle
        let center = faces[FaceAxis::PosZ.index()].get_pixel(res / 2, res / 2);
        assert!((center.0[0] - 0.5).abs() < 0.02, "theta=0 maps to eq_u=0.5");
        assert!((center.0[1] - 0.5).abs() < 0.02, "phi=0 maps to eq_v=0.5");

        // +Y face center looks straight up: the panorama's top row
        let top = faces[FaceAxis::PosY.index()].get_pixel(res / 2, res / 2);
        assert!(top.0[1] < 0.02, "phi=+pi/2 maps to eq_v=0");

        // -Y face center looks straight down: the panorama's bottom row
        let bottom = faces[FaceAxis::NegY.index()].get_pixel(res / 2, res / 2);
        assert!(bottom.0[1] > 0.98, "phi=-pi/2 maps to eq_v=1");
    }

    #[test]
    fn test_dominant_face_tie_priority() {
        // Exact corner directions: X beats Y beats Z
        assert_eq!(dominant_face([1.0, 1.0, 1.0]), FaceAxis::PosX);
        assert_eq!(dominant_face([-1.0, 1.0, 1.0]), FaceAxis::NegX);
        assert_eq!(dominant_face([0.0, 1.0, 1.0]), FaceAxis::PosY);
        assert_eq!(dominant_face([0.0, -1.0, 1.0]), FaceAxis::NegY);
        assert_eq!(dominant_face([0.0, 0.0, 1.0]), FaceAxis::PosZ);
        assert_eq!(dominant_face([0.0, 0.0, -1.0]), FaceAxis::NegZ);
    }

    #[test]
    fn test_face_uv_inverts_direction() {
        // For every face and a grid of (u, v), direction -> face_uv must
        // return the original coordinates
        for axis in FACE_ORDER {
            for iu in 0..9 {
                for iv in 0..9 {
                    let u = iu as f32 / 4.0 - 1.0;
                    let v = iv as f32 / 4.0 - 1.0;
                    let (ru, rv) = axis.face_uv(axis.direction(u, v));
                    assert!(
                        (ru - u).abs() < 1e-5 && (rv - v).abs() < 1e-5,
                        "{} ({u}, {v}) -> ({ru}, {rv})",
                        axis.label()
                    );
                }
            }
        }
    }

    #[test]
    fn test_roundtrip_within_error_bound() {
        let width = 128u32;
        let src = gradient_panorama(width);
        let faces = equirect_to_faces(&src, 128).unwrap();
        let back = faces_to_equirect(&faces, width).unwrap();

        assert_eq!(back.dimensions(), src.dimensions());

        // Compare away from the poles and the longitude wrap, where nearest
        // resampling across seams is expected to differ
        let height = width / 2;
        let mut worst = 0.0f32;
        for y in height / 8..height * 7 / 8 {
            for x in width / 8..width * 7 / 8 {
                let a = src.get_pixel(x, y);
                let b = back.get_pixel(x, y);
                for c in 0..3 {
                    worst = worst.max((a.0[c] - b.0[c]).abs());
                }
            }
        }
        assert!(worst < 0.06, "round-trip error {worst} exceeds bound");
    }

    #[test]
    fn test_faces_to_equirect_rejects_mismatched_sizes() {
        let mut faces: [Rgba32FImage; 6] =
            std::array::from_fn(|_| Rgba32FImage::new(16, 16));
        faces[3] = Rgba32FImage::new(8, 8);
        assert!(matches!(
            faces_to_equirect(&faces, 64),
            Err(EnvmapError::FaceSizeMismatch { axis: "-Y", .. })
        ));
    }

    #[test]
    fn test_normalize_hdr_sdr_untouched() {
        let mut image = flat_panorama(8, [0.25, 0.5, 1.0, 1.0]);
        let factor = normalize_hdr(&mut image);
        assert_eq!(factor, 1.0);
        assert_eq!(image.get_pixel(0, 0).0, [0.25, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_normalize_hdr_clips_and_compensates() {
        // Half the pixels at 3.0, half at 1.0: mean 2.0 before, 1.0 after
        let mut image = Rgba32FImage::from_fn(8, 4, |x, _| {
            let v = if x < 4 { 3.0 } else { 1.0 };
            Rgba([v, v, v, 1.0])
        });
        let factor = normalize_hdr(&mut image);

        assert!((factor - 2.0 * 1.3).abs() < 1e-4);
        for pixel in image.pixels() {
            assert!(pixel.0.iter().all(|v| *v <= 1.0));
        }
    }
}
