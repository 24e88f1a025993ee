use crate::{
    digest::{Digest, DigestBuf},
    error::*,
    media_types,
};
use flate2::{write::GzEncoder, Compression};
use oci_spec::image::MediaType;
use std::{
    fmt, fs,
    io::{self, Read},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Inputs describing a single layer, any subset of them may be given.
///
/// The command line form is `compressed,uncompressed,digest_file,diff_id_file`
/// where an empty value means absent, e.g. `layer.tar.gz,layer.tar,,`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerParts {
    /// gzip compressed layer tarball
    pub compressed: Option<PathBuf>,
    /// Uncompressed layer tarball
    pub uncompressed: Option<PathBuf>,
    /// File containing the digest of the compressed tarball
    pub digest_file: Option<PathBuf>,
    /// File containing the digest of the uncompressed tarball
    pub diff_id_file: Option<PathBuf>,
}

impl FromStr for LayerParts {
    type Err = Error;
    fn from_str(input: &str) -> Result<Self> {
        let values: Vec<&str> = input.split(',').collect();
        if values.len() != 4 {
            return Err(Error::InvalidLayerSpec(input.to_string(), values.len()));
        }
        let path = |value: &str| {
            let value = value.trim();
            if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            }
        };
        Ok(LayerParts {
            compressed: path(values[0]),
            uncompressed: path(values[1]),
            digest_file: path(values[2]),
            diff_id_file: path(values[3]),
        })
    }
}

/// Which value of a layer could not be derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerField {
    Digest,
    DiffId,
    Size,
}

impl fmt::Display for LayerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerField::Digest => write!(f, "digest"),
            LayerField::DiffId => write!(f, "diff ID"),
            LayerField::Size => write!(f, "compressed size"),
        }
    }
}

/// A layer whose digest, diff ID and compressed size are all known
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    /// Digest of the compressed layer, referenced from the manifest
    pub digest: Digest,
    /// Digest of the uncompressed layer, listed in `rootfs.diff_ids` of the config
    pub diff_id: Digest,
    /// Size of the compressed layer in bytes
    pub size: u64,
    pub media_type: MediaType,
    /// Download locations, only set for foreign layers
    pub urls: Option<Vec<String>>,
}

impl LayerParts {
    /// Resolve digest, diff ID and size of the layer.
    ///
    /// Precomputed digest files are trusted as-is.
    /// Missing values are computed from the tarballs, compressing or decompressing one into the other if needed.
    /// `index` is the position of this layer in the declaration order, used in error messages.
    pub fn resolve(&self, index: usize) -> Result<LayerDescriptor> {
        for path in [
            &self.compressed,
            &self.uncompressed,
            &self.digest_file,
            &self.diff_id_file,
        ]
        .into_iter()
        .flatten()
        {
            if !path.is_file() {
                return Err(Error::NotAFile(path.clone()));
            }
        }

        let digest = self
            .digest_file
            .as_deref()
            .map(|path| read_hash_file(index, path))
            .transpose()?;
        let diff_id = self
            .diff_id_file
            .as_deref()
            .map(|path| read_hash_file(index, path))
            .transpose()?;
        let hash_err = |source: io::Error| Error::HashComputation {
            layer: index,
            source,
        };

        let (digest, diff_id, size) = match (&self.compressed, &self.uncompressed) {
            (Some(compressed), uncompressed) => {
                let size = fs::metadata(compressed)
                    .map_err(layer_io(index, compressed))?
                    .len();
                let (digest, diff_id) = match (digest, diff_id, uncompressed) {
                    (Some(digest), Some(diff_id), _) => (digest, diff_id),
                    (digest, None, None) => {
                        log::debug!("Decompress layer {} to compute its diff ID", index);
                        let hashes =
                            decompress_and_hash(open(index, compressed)?).map_err(hash_err)?;
                        (digest.unwrap_or(hashes.digest), hashes.diff_id)
                    }
                    (digest, None, Some(uncompressed)) => {
                        let digest = match digest {
                            Some(digest) => digest,
                            None => sha256_of(open(index, compressed)?).map_err(hash_err)?.0,
                        };
                        let diff_id = sha256_of(open(index, uncompressed)?)
                            .map_err(hash_err)?
                            .0;
                        (digest, diff_id)
                    }
                    (None, Some(diff_id), _) => {
                        let digest = sha256_of(open(index, compressed)?).map_err(hash_err)?.0;
                        (digest, diff_id)
                    }
                };
                (digest, diff_id, size)
            }
            (None, Some(uncompressed)) => {
                log::debug!("Compress layer {} to compute its digest and size", index);
                let hashes = compress_and_hash(open(index, uncompressed)?).map_err(hash_err)?;
                (
                    digest.unwrap_or(hashes.digest),
                    diff_id.unwrap_or(hashes.diff_id),
                    hashes.size,
                )
            }
            (None, None) => {
                let field = match (digest, diff_id) {
                    (None, _) => LayerField::Digest,
                    (_, None) => LayerField::DiffId,
                    _ => LayerField::Size,
                };
                return Err(Error::MissingInput {
                    layer: index,
                    field,
                });
            }
        };

        log::info!(
            "Layer {}: digest={}, diff_id={}, size={}",
            index,
            digest,
            diff_id,
            size
        );
        Ok(LayerDescriptor {
            digest,
            diff_id,
            size,
            media_type: media_types::docker_layer(),
            urls: None,
        })
    }
}

fn read_hash_file(index: usize, path: &Path) -> Result<Digest> {
    let content = fs::read_to_string(path).map_err(layer_io(index, path))?;
    Digest::from_hash_file_content(&content).map_err(|_| Error::InvalidHashFile {
        layer: index,
        path: path.to_owned(),
        content: content.trim().to_string(),
    })
}

fn open(index: usize, path: &Path) -> Result<fs::File> {
    fs::File::open(path).map_err(layer_io(index, path))
}

fn layer_io(index: usize, path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |source| Error::LayerIo {
        layer: index,
        path: path.to_owned(),
        source,
    }
}

/// SHA-256 digest and length of a stream
pub fn sha256_of(mut input: impl Read) -> io::Result<(Digest, u64)> {
    let mut buf = DigestBuf::new(io::sink());
    io::copy(&mut input, &mut buf)?;
    let size = buf.written();
    let (_, digest) = buf.finish();
    Ok((digest, size))
}

/// Hashes of a layer in both compressed and uncompressed form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerHashes {
    /// Digest of the compressed form
    pub digest: Digest,
    /// Digest of the uncompressed form
    pub diff_id: Digest,
    /// Length of the compressed form
    pub size: u64,
}

/// Hash an uncompressed layer stream and its gzip compressed form in one pass
pub fn compress_and_hash(mut input: impl Read) -> io::Result<LayerHashes> {
    let mut uncompressed = DigestBuf::new(GzEncoder::new(
        DigestBuf::new(io::sink()),
        Compression::default(),
    ));
    io::copy(&mut input, &mut uncompressed)?;
    let (gz, diff_id) = uncompressed.finish();
    let compressed = gz.finish()?;
    let size = compressed.written();
    let (_, digest) = compressed.finish();
    Ok(LayerHashes {
        digest,
        diff_id,
        size,
    })
}

/// Hash a gzip compressed layer stream and its decompressed form in one pass
pub fn decompress_and_hash(mut input: impl Read) -> io::Result<LayerHashes> {
    let mut compressed =
        DigestBuf::new(flate2::write::GzDecoder::new(DigestBuf::new(io::sink())));
    io::copy(&mut input, &mut compressed)?;
    let size = compressed.written();
    let (gz, digest) = compressed.finish();
    let (_, diff_id) = gz.finish()?.finish();
    Ok(LayerHashes {
        digest,
        diff_id,
        size,
    })
}
