use crate::{
    error::*,
    image::{LayerDescriptor, LayerParts},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Inputs of the image as given on the command line
///
/// Repeated `--layer` flags are collected into `layers` in the order they appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageArgs {
    /// Path to the image config JSON
    pub config: Option<PathBuf>,
    /// Path to an image tarball, `docker save` output or oci-archive
    pub tarball: Option<PathBuf>,
    /// Path to the manifest of the base image, required only to resolve foreign layers
    pub base_manifest: Option<PathBuf>,
    pub layers: Vec<LayerParts>,
}

/// Where the image config (and possibly the layers) come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Raw bytes of the image config JSON
    Config(Vec<u8>),
    /// Image tarball containing config and layers
    Tarball(PathBuf),
}

/// Validated and resolved inputs of an image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageParts {
    pub source: ImageSource,
    /// Raw bytes of the base image manifest
    pub base_manifest: Option<Vec<u8>>,
    /// Locally supplied layers in declaration order
    pub layers: Vec<LayerDescriptor>,
}

/// Image source chosen by [ImageArgs::validate]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePath<'a> {
    Config(&'a Path),
    Tarball(&'a Path),
}

impl ImageArgs {
    /// Check the image source is unambiguous without touching the filesystem
    pub fn validate(&self) -> Result<SourcePath<'_>> {
        match (&self.config, &self.tarball) {
            (None, None) => Err(Error::ConfigAndTarballBothMissing),
            (Some(config), Some(tarball)) => Err(Error::ConfigAndTarballBothPresent {
                config: config.clone(),
                tarball: tarball.clone(),
            }),
            (Some(config), None) => Ok(SourcePath::Config(config)),
            (None, Some(tarball)) => Ok(SourcePath::Tarball(tarball)),
        }
    }

    /// Read config and base manifest, and resolve every layer
    pub fn resolve(&self) -> Result<ImageParts> {
        let source = match self.validate()? {
            SourcePath::Config(config) => ImageSource::Config(read_file(config)?),
            SourcePath::Tarball(tarball) => {
                ensure_file(tarball)?;
                ImageSource::Tarball(tarball.to_owned())
            }
        };
        let base_manifest = self
            .base_manifest
            .as_deref()
            .map(read_file)
            .transpose()?;
        let layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(index, layer)| layer.resolve(index))
            .collect::<Result<Vec<_>>>()?;
        Ok(ImageParts {
            source,
            base_manifest,
            layers,
        })
    }
}

fn ensure_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::NotAFile(path.to_owned()))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    ensure_file(path)?;
    Ok(fs::read(path)?)
}
