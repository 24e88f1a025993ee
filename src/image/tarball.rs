//! Read an already assembled image tarball

use crate::{
    error::*,
    image::{
        layer::{compress_and_hash, decompress_and_hash, LayerHashes},
        ImageConfig, LayerDescriptor, Manifest,
    },
    media_types, Digest,
};
use oci_spec::image::ImageIndex;
use serde::Deserialize;
use std::{
    fs,
    io::{self, Read, Seek},
    path::{Path, PathBuf},
};

/// An entry of `manifest.json` written by `docker save`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DockerSaveEntry {
    config: String,
    #[serde(default)]
    repo_tags: Option<Vec<String>>,
    layers: Vec<String>,
}

/// Config and layers read from an image tarball
#[derive(Debug, Clone, PartialEq)]
pub struct TarballImage {
    /// Raw bytes of the image config
    pub config: Vec<u8>,
    pub layers: Vec<LayerDescriptor>,
}

/// Image tarball, either `docker save` output or an oci-archive
pub struct SourceTarball {
    path: PathBuf,
    file: fs::File,
}

impl SourceTarball {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotAFile(path.to_owned()));
        }
        Ok(Self {
            path: path.to_owned(),
            file: fs::File::open(path)?,
        })
    }

    /// Read config and layers.
    ///
    /// `manifest.json` of `docker save` takes precedence over `index.json` of oci-archive
    /// since recent Docker writes both.
    pub fn read(&mut self) -> Result<TarballImage> {
        if let Some(manifest) = self.read_entry("manifest.json")? {
            return self.read_docker_save(&manifest);
        }
        if let Some(index) = self.read_entry("index.json")? {
            return self.read_oci_archive(&index);
        }
        Err(Error::MissingTarballManifest(self.path.clone()))
    }

    fn read_docker_save(&mut self, manifest: &[u8]) -> Result<TarballImage> {
        let entries: Vec<DockerSaveEntry> =
            serde_json::from_slice(manifest).map_err(Error::malformed("manifest.json"))?;
        if entries.len() != 1 {
            return Err(Error::MultipleImagesInTarball(entries.len()));
        }
        let entry = &entries[0];
        if let Some(tags) = &entry.repo_tags {
            log::info!("Read image {} from {}", tags.join(", "), self.path.display());
        }

        let config = self.expect_entry(&entry.config)?;
        let mut layers = Vec::with_capacity(entry.layers.len());
        for (index, name) in entry.layers.iter().enumerate() {
            let hashes = self
                .with_entry(name, |entry| {
                    hash_layer_entry(entry).map_err(|source| Error::HashComputation {
                        layer: index,
                        source,
                    })
                })?
                .ok_or_else(|| Error::MissingTarballEntry(name.clone()))?;
            log::debug!("Layer {} in tarball: {}", index, name);
            layers.push(LayerDescriptor {
                digest: hashes.digest,
                diff_id: hashes.diff_id,
                size: hashes.size,
                media_type: media_types::docker_layer(),
                urls: None,
            });
        }
        Ok(TarballImage { config, layers })
    }

    fn read_oci_archive(&mut self, index: &[u8]) -> Result<TarballImage> {
        let index: ImageIndex =
            serde_json::from_slice(index).map_err(Error::malformed("index.json"))?;
        let descriptors = index.manifests();
        if descriptors.len() != 1 {
            return Err(Error::MultipleImagesInTarball(descriptors.len()));
        }
        let manifest_digest = Digest::new(descriptors[0].digest())?;
        let manifest = Manifest::from_slice(&self.expect_blob(&manifest_digest)?)?;
        let config = self.expect_blob(&manifest.config.digest)?;
        let parsed = ImageConfig::from_slice(&config)?;

        let diff_ids = parsed.diff_ids();
        if diff_ids.len() != manifest.layers.len() {
            return Err(Error::LayerCountMismatch {
                expected: diff_ids.len(),
                actual: manifest.layers.len(),
            });
        }
        // Layer blobs are not read, digests in the manifest are trusted
        let layers = manifest
            .layers
            .into_iter()
            .zip(diff_ids)
            .map(|(layer, diff_id)| LayerDescriptor {
                digest: layer.digest,
                diff_id: diff_id.clone(),
                size: layer.size,
                media_type: layer.media_type,
                urls: layer.urls,
            })
            .collect();
        Ok(TarballImage { config, layers })
    }

    fn expect_blob(&mut self, digest: &Digest) -> Result<Vec<u8>> {
        self.expect_entry(&digest.as_path().to_string_lossy())
    }

    fn expect_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        self.read_entry(name)?
            .ok_or_else(|| Error::MissingTarballEntry(name.to_string()))
    }

    fn read_entry(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        self.with_entry(name, |entry| {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            Ok(buf)
        })
    }

    /// Run `f` on the entry named `name`, `None` if there is no such entry.
    fn with_entry<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut dyn Read) -> Result<T>,
    ) -> Result<Option<T>> {
        let name = strip_current_dir(Path::new(name));
        self.file.rewind()?;
        let mut ar = tar::Archive::new(&mut self.file);
        // Searched linearly since tar archive does not have offset table.
        for entry in ar.entries_with_seek()? {
            let mut entry = entry?;
            let found = strip_current_dir(&entry.path()?) == name;
            if found {
                return f(&mut entry).map(Some);
            }
        }
        Ok(None)
    }
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Hash a layer entry of `manifest.json` style tarball.
///
/// `docker save` stores uncompressed layers, while go-containerregistry stores gzip compressed ones.
/// They are distinguished by the gzip magic number.
fn hash_layer_entry(entry: &mut dyn Read) -> io::Result<LayerHashes> {
    let mut magic = Vec::with_capacity(GZIP_MAGIC.len());
    Read::take(&mut *entry, GZIP_MAGIC.len() as u64).read_to_end(&mut magic)?;
    let is_gzip = magic == GZIP_MAGIC;
    let input = io::Cursor::new(magic).chain(entry);
    if is_gzip {
        decompress_and_hash(input)
    } else {
        compress_and_hash(input)
    }
}

fn strip_current_dir(path: &Path) -> PathBuf {
    path.strip_prefix("./").unwrap_or(path).to_owned()
}
