//! gltf-ktx2 - glTF KTX2 texture tool
//!
//! Patches glTF containers (inline KTX2 payloads into the binary buffer),
//! converts equirectangular panoramas to KTX2 cubemaps and back, and
//! inspects KTX2 headers. Encoding and full decoding go through the
//! KTX-Software command-line tools; only the trivial uncompressed case
//! decodes without them.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use ktx2_common::{embed_ktx2_images, GltfContainer, Ktx2Header};
use std::path::PathBuf;

use gltf_ktx2::envmap;
use gltf_ktx2::{Codec, EncodeOptions, KtxTools};

#[derive(Parser)]
#[command(name = "gltf-ktx2")]
#[command(about = "glTF KTX2 texture tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move inline KTX2 image payloads into the binary buffer of a container
    Patch {
        /// Input .glb or .gltf file
        input: PathBuf,

        /// Output file (defaults to rewriting the input in place)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encode a single image to KTX2
    Encode {
        /// Input PNG/JPG file
        input: PathBuf,

        /// Output .ktx2 file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Basis Universal codec (etc1s or uastc)
        #[arg(short, long, default_value = "etc1s")]
        codec: String,

        /// Quality: 1-255 for ETC1S, mapped to 0-4 for UASTC
        #[arg(short, long, default_value_t = 128)]
        quality: u32,

        /// Pre-generate mipmaps
        #[arg(long)]
        mipmaps: bool,
    },

    /// Convert an equirectangular panorama to a KTX2 cubemap
    EncodeEnvmap {
        /// Input panorama (2:1 aspect; PNG/JPG/HDR)
        input: PathBuf,

        /// Output .ktx2 file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Resolution of each cubemap face
        #[arg(short, long, default_value_t = 512)]
        resolution: u32,

        /// Basis Universal codec (etc1s or uastc)
        #[arg(short, long, default_value = "etc1s")]
        codec: String,

        /// Quality: 1-255 for ETC1S, mapped to 0-4 for UASTC
        #[arg(short, long, default_value_t = 128)]
        quality: u32,

        /// Pre-generate mipmaps
        #[arg(long)]
        mipmaps: bool,
    },

    /// Decode a KTX2 texture to PNG
    Decode {
        /// Input .ktx2 file
        input: PathBuf,

        /// Output .png file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a KTX2 cubemap to an equirectangular PNG
    DecodeEnvmap {
        /// Input .ktx2 cubemap
        input: PathBuf,

        /// Output .png file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Width of the equirectangular output (height is width/2)
        #[arg(short, long, default_value_t = 2048)]
        width: u32,
    },

    /// Print the header fields of a KTX2 file
    Info {
        /// Input .ktx2 file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Patch { input, output } => {
            let mut container = GltfContainer::load(&input)?;
            let moved = embed_ktx2_images(&mut container)?;
            let target = output.unwrap_or_else(|| input.clone());
            container.save(&target)?;
            tracing::info!(
                moved,
                "patched {} -> {}",
                input.display(),
                target.display()
            );
        }

        Commands::Encode {
            input,
            output,
            codec,
            quality,
            mipmaps,
        } => {
            let tools = KtxTools::locate()?;
            let options = EncodeOptions {
                codec: parse_codec(&codec)?,
                quality,
                mipmaps,
            };
            let output = output.unwrap_or_else(|| input.with_extension("ktx2"));
            tools.encode_image(&input, &output, &options)?;
            tracing::info!("encoded {} -> {}", input.display(), output.display());
        }

        Commands::EncodeEnvmap {
            input,
            output,
            resolution,
            codec,
            quality,
            mipmaps,
        } => {
            let tools = KtxTools::locate()?;
            let options = EncodeOptions {
                codec: parse_codec(&codec)?,
                quality,
                mipmaps,
            };
            let encoded = envmap::encode_environment(&tools, &input, resolution, &options)?;
            let output = output.unwrap_or_else(|| input.with_extension("ktx2"));
            std::fs::write(&output, &encoded.ktx2)?;
            tracing::info!(
                intensity = encoded.intensity,
                "encoded {} -> {}",
                input.display(),
                output.display()
            );
        }

        Commands::Decode { input, output } => {
            let tools = locate_optional();
            let image = envmap::decode_texture(tools.as_ref(), &input)?;
            let output = output.unwrap_or_else(|| input.with_extension("png"));
            envmap::to_rgba8(&image).save(&output)?;
            tracing::info!("decoded {} -> {}", input.display(), output.display());
        }

        Commands::DecodeEnvmap {
            input,
            output,
            width,
        } => {
            let tools = locate_optional();
            let image = envmap::decode_environment(tools.as_ref(), &input, width)?;
            let output = output.unwrap_or_else(|| input.with_extension("png"));
            envmap::to_rgba8(&image).save(&output)?;
            tracing::info!("decoded {} -> {}", input.display(), output.display());
        }

        Commands::Info { input } => {
            let bytes = std::fs::read(&input)?;
            let header = Ktx2Header::parse(&bytes)?;
            println!("{}:", input.display());
            println!("  vkFormat:         {}", header.vk_format);
            println!(
                "  dimensions:       {}x{}x{}",
                header.pixel_width, header.pixel_height, header.pixel_depth
            );
            println!("  layers:           {}", header.layer_count);
            println!("  faces:            {}", header.face_count);
            println!("  levels:           {}", header.level_count);
            println!("  supercompression: {}", header.supercompression_scheme);
            println!(
                "  level 0:          offset {}, {} bytes",
                header.level0_byte_offset, header.level0_byte_length
            );
        }
    }

    Ok(())
}

fn parse_codec(name: &str) -> Result<Codec> {
    match name.to_ascii_lowercase().as_str() {
        "etc1s" => Ok(Codec::Etc1s),
        "uastc" => Ok(Codec::Uastc),
        other => bail!("Unknown codec: {other:?} (use etc1s or uastc)"),
    }
}

/// Decode paths degrade to the trivial fallback when the tools are missing.
fn locate_optional() -> Option<KtxTools> {
    match KtxTools::locate() {
        Ok(tools) => Some(tools),
        Err(error) => {
            tracing::warn!(%error, "KTX tools not available, only the trivial fallback will work");
            None
        }
    }
}
