//! gsavatar-reskin: re-skin a trained avatar onto one baked mesh frame
//!
//! Usage:
//!   gsavatar-reskin --asset state_dict.json --vertices vertices.txt --out-dir out/
//!   gsavatar-reskin --asset state_dict.json --vertices vertices.txt --faces faces.txt \
//!       --config reskin.json --texture out/texture.png --out-dir out/
//!
//! Writes `positions.bin`, `other.bin` and `colors.bin` (raw little-endian
//! renderer buffers) to the output directory.

use anyhow::{bail, Context, Result};
use gsavatar_rs::avatar::{CpuReskinner, ReskinBackend};
use gsavatar_rs::config::ReskinConfig;
use gsavatar_rs::io::{load_avatar_asset, load_faces, load_vertices, save_texture_png};
use std::path::PathBuf;
use std::time::Instant;

struct Args {
    asset: PathBuf,
    vertices: PathBuf,
    faces: Option<PathBuf>,
    config: Option<PathBuf>,
    texture: Option<PathBuf>,
    out_dir: PathBuf,
    #[cfg(feature = "gpu")]
    gpu: bool,
}

fn next_path(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<PathBuf> {
    args.next()
        .map(PathBuf::from)
        .with_context(|| format!("Missing {flag} argument"))
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut asset: Option<PathBuf> = None;
    let mut vertices: Option<PathBuf> = None;
    let mut faces: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;
    let mut texture: Option<PathBuf> = None;
    let mut out_dir = PathBuf::from(".");
    #[cfg(feature = "gpu")]
    let mut gpu = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--asset" => asset = Some(next_path(&mut args, "--asset")?),
            "--vertices" => vertices = Some(next_path(&mut args, "--vertices")?),
            "--faces" => faces = Some(next_path(&mut args, "--faces")?),
            "--config" => config = Some(next_path(&mut args, "--config")?),
            "--texture" => texture = Some(next_path(&mut args, "--texture")?),
            "--out-dir" => out_dir = next_path(&mut args, "--out-dir")?,
            #[cfg(feature = "gpu")]
            "--gpu" => gpu = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => bail!("Unknown argument: {other} (see --help)"),
        }
    }

    Ok(Args {
        asset: asset.context("--asset is required")?,
        vertices: vertices.context("--vertices is required")?,
        faces,
        config,
        texture,
        out_dir,
        #[cfg(feature = "gpu")]
        gpu,
    })
}

fn print_help() {
    println!("gsavatar-reskin v{}", gsavatar_rs::VERSION);
    println!();
    println!("Options:");
    println!("  --asset <path>     Trainer state dict (JSON)");
    println!("  --vertices <path>  Baked vertex positions, one 'x y z' per line");
    println!("  --faces <path>     Face list to check against the asset's triangles");
    println!("  --config <path>    Re-skinning config (JSON)");
    println!("  --texture <path>   Save the trained texture as PNG");
    println!("  --out-dir <path>   Output directory (default: .)");
    #[cfg(feature = "gpu")]
    println!("  --gpu              Run on the GPU backend");
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    log::info!("gsavatar-reskin v{}", gsavatar_rs::VERSION);

    let config = match &args.config {
        Some(path) => ReskinConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReskinConfig::default(),
    }
    .with_env_overrides()?;

    let asset = load_avatar_asset(&args.asset)
        .with_context(|| format!("Failed to load avatar {}", args.asset.display()))?;
    let vertices = load_vertices(&args.vertices)
        .with_context(|| format!("Failed to load vertices {}", args.vertices.display()))?;

    if let Some(faces_path) = &args.faces {
        let faces = load_faces(faces_path)
            .with_context(|| format!("Failed to load faces {}", faces_path.display()))?;
        if faces.as_slice() != asset.bindings.topology().triangles() {
            bail!(
                "{} does not match the avatar's triangle list ({} vs {} triangles)",
                faces_path.display(),
                faces.len(),
                asset.bindings.triangle_count()
            );
        }
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    if let Some(path) = &args.texture {
        match &asset.texture {
            Some(texture) => {
                save_texture_png(texture, path)
                    .with_context(|| format!("Failed to save texture {}", path.display()))?;
                log::info!("Texture saved to {}", path.display());
            }
            None => log::warn!("Avatar has no trained texture; --texture ignored"),
        }
    }

    let t_start = Instant::now();
    let mut reskinner = CpuReskinner::new(asset.bindings, config.clone());

    #[cfg(feature = "gpu")]
    if args.gpu {
        use gsavatar_rs::gpu::GpuReskinner;

        let mut gpu = GpuReskinner::new(reskinner.table(), &config)?;
        gpu.reskin(&vertices)?;
        let positions = gpu.read_positions()?;
        let other = gpu.read_other_data()?;
        log::info!("GPU frame done in {:?}", t_start.elapsed());

        write_buffer(&args.out_dir, "positions.bin", bytemuck::cast_slice(&positions))?;
        write_buffer(&args.out_dir, "other.bin", bytemuck::cast_slice(&other))?;
        write_buffer(&args.out_dir, "colors.bin", reskinner.buffers().color_bytes())?;
        return Ok(());
    }

    let stats = reskinner.reskin(&vertices)?;
    log::info!(
        "Re-skinned {} splats in {:?} ({} degenerate faces)",
        stats.splats,
        t_start.elapsed(),
        stats.clamped_faces.unwrap_or(0)
    );

    let buffers = reskinner.buffers();
    write_buffer(&args.out_dir, "positions.bin", buffers.position_bytes())?;
    write_buffer(&args.out_dir, "other.bin", buffers.other_data_bytes())?;
    write_buffer(&args.out_dir, "colors.bin", buffers.color_bytes())?;

    Ok(())
}

fn write_buffer(dir: &std::path::Path, name: &str, bytes: &[u8]) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
