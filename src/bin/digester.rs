use anyhow::Context;
use clap::Parser;
use image_digester::{
    image::{ImageArgs, LayerParts},
    image_digest, Schema,
};
use std::{fs, path::PathBuf};

/// Compute the manifest digest of a container image from its parts
#[derive(Debug, Parser)]
#[clap(version)]
struct Opt {
    /// Path where the digest is written
    #[clap(long, parse(from_os_str))]
    dst: PathBuf,

    /// Image tarball, either `docker save` output or oci-archive
    #[clap(long, parse(from_os_str))]
    tarball: Option<PathBuf>,

    /// Image config JSON
    #[clap(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Manifest of the base image, used to resolve foreign layers
    #[clap(long, parse(from_os_str))]
    manifest: Option<PathBuf>,

    /// Layer as `compressed,uncompressed,digest_file,diff_id_file`, any of them may be empty.
    /// Can be repeated, in the order of layers in the image.
    #[clap(long = "layer", multiple_occurrences(true))]
    layers: Vec<String>,

    /// Schema of the manifest, Docker or OCI
    #[clap(long, default_value = "Docker")]
    format: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    let schema: Schema = opt.format.parse()?;
    let layers = opt
        .layers
        .iter()
        .map(|layer| layer.parse::<LayerParts>())
        .collect::<Result<Vec<_>, _>>()?;
    let args = ImageArgs {
        config: opt.config,
        tarball: opt.tarball,
        base_manifest: opt.manifest,
        layers,
    };

    let digest = image_digest(&args, schema)?;
    fs::write(&opt.dst, digest.to_string())
        .with_context(|| format!("Cannot write digest to {}", opt.dst.display()))?;
    Ok(())
}
