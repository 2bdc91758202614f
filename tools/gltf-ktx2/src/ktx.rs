//! External KTX-Software tool boundary
//!
//! `toktx` and `ktx` are invoked as black boxes: build the argument list,
//! run, check the exit status, and surface stderr as the error text. Nothing
//! here parses tool stdout, and tool availability is an ordinary error, not
//! a panic; installing KTX-Software is the user's job.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Basis Universal codec selection for `toktx`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Smaller files, lower quality; quality level 1-255
    #[default]
    Etc1s,
    /// Larger files, higher quality; quality level 0-4
    Uastc,
}

/// Encoding options passed through to `toktx`
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub codec: Codec,
    /// 1-255 for ETC1S; mapped to 0-4 for UASTC
    pub quality: u32,
    pub mipmaps: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            codec: Codec::Etc1s,
            quality: 128,
            mipmaps: false,
        }
    }
}

impl EncodeOptions {
    fn append_to(&self, cmd: &mut Command) {
        match self.codec {
            Codec::Uastc => {
                cmd.arg("--uastc");
                cmd.args(["--uastc_quality", &self.uastc_quality().to_string()]);
                cmd.arg("--uastc_rdo");
            }
            Codec::Etc1s => {
                cmd.arg("--bcmp");
                cmd.args(["--qlevel", &self.quality.to_string()]);
            }
        }
        if self.mipmaps {
            cmd.arg("--genmipmap");
        }
    }

    /// The 1-255 quality scale collapsed to UASTC's 0-4
    fn uastc_quality(&self) -> u32 {
        (self.quality / 64).min(4)
    }
}

/// Located KTX-Software executables
#[derive(Debug, Clone)]
pub struct KtxTools {
    toktx: PathBuf,
    ktx: PathBuf,
}

impl KtxTools {
    /// Find `toktx` and `ktx` on PATH.
    pub fn locate() -> Result<Self> {
        let toktx = which::which("toktx")
            .context("toktx not found on PATH (install KTX-Software)")?;
        let ktx = which::which("ktx").context("ktx not found on PATH (install KTX-Software)")?;
        tracing::debug!(toktx = %toktx.display(), ktx = %ktx.display(), "located KTX tools");
        Ok(Self { toktx, ktx })
    }

    /// Encode a single image file to KTX2.
    pub fn encode_image(&self, input: &Path, output: &Path, options: &EncodeOptions) -> Result<()> {
        let mut cmd = Command::new(&self.toktx);
        options.append_to(&mut cmd);
        cmd.arg(output).arg(input);
        run(cmd, "toktx")
    }

    /// Encode six face images, in canonical `+X,-X,+Y,-Y,+Z,-Z` order, as a
    /// KTX2 cubemap.
    pub fn encode_cubemap(
        &self,
        face_paths: &[PathBuf],
        output: &Path,
        options: &EncodeOptions,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.toktx);
        cmd.arg("--cubemap");
        options.append_to(&mut cmd);
        cmd.arg(output);
        for face in face_paths {
            cmd.arg(face);
        }
        run(cmd, "toktx")
    }

    /// Extract and transcode a KTX2 file to a single PNG.
    pub fn extract_image(&self, input: &Path, output: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.ktx);
        cmd.arg("extract").arg(input).arg(output);
        run(cmd, "ktx extract")
    }

    /// Extract all cubemap faces of a KTX2 file into `out_dir`, returning
    /// the extracted image files.
    ///
    /// Some tool versions write the faces into a subdirectory named after
    /// the output base; a single directory entry is descended into. Only
    /// files with image extensions are returned.
    pub fn extract_faces(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut cmd = Command::new(&self.ktx);
        cmd.arg("extract")
            .args(["--face", "all"])
            .args(["--transcode", "rgba8"])
            .arg(input)
            .arg(out_dir.join("face"));
        run(cmd, "ktx extract")?;

        let mut entries = list_dir(out_dir)?;
        if entries.len() == 1 && entries[0].is_dir() {
            entries = list_dir(&entries[0])?;
        }

        let mut faces: Vec<PathBuf> = entries.into_iter().filter(|p| is_image_file(p)).collect();
        faces.sort();
        Ok(faces)
    }
}

fn run(mut cmd: Command, what: &str) -> Result<()> {
    tracing::debug!(?cmd, "running {what}");
    let output = cmd
        .output()
        .with_context(|| format!("Failed to run {what}"))?;
    if !output.status.success() {
        bail!(
            "{what} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        entries.push(entry?.path());
    }
    Ok(entries)
}

/// File extensions `ktx extract` is known to emit
fn is_image_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        ext.eq_ignore_ascii_case("png")
            || ext.eq_ignore_ascii_case("exr")
            || ext.eq_ignore_ascii_case("raw")
    })
}
