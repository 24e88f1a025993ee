use crate::{image::LayerField, media_types::Schema, Digest};
use oci_spec::image::MediaType;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    //
    // Ambiguous image source
    //
    #[error("Neither --tarball nor --config was specified")]
    ConfigAndTarballBothMissing,
    #[error("Both --config ({config}) and --tarball ({tarball}) were specified, only one is allowed")]
    ConfigAndTarballBothPresent { config: PathBuf, tarball: PathBuf },

    //
    // Invalid user input
    //
    #[error("Invalid layer '{0}': expected 4 comma separated values (compressed tarball, uncompressed tarball, digest file, diff ID file), got {1}")]
    InvalidLayerSpec(String, usize),
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),
    #[error("Invalid image format: {0}, expected Docker or OCI")]
    InvalidFormat(String),
    #[error("Not a file, or not exist: {0}")]
    NotAFile(PathBuf),
    #[error("Layer {layer} has no input from which its {field} can be derived")]
    MissingInput { layer: usize, field: LayerField },
    #[error("Hash file {path} of layer {layer} does not contain a digest: '{content}'")]
    InvalidHashFile {
        layer: usize,
        path: PathBuf,
        content: String,
    },
    #[error("Invalid media type table: {0}")]
    InvalidMediaTypeTable(String),

    //
    // Invalid container image
    //
    #[error("Image config lists {expected} layers in rootfs.diff_ids, but {actual} layers were resolved")]
    LayerCountMismatch { expected: usize, actual: usize },
    #[error("Layer at position {position} has diff ID {actual}, but image config expects {expected}")]
    DiffIdMismatch {
        position: usize,
        expected: Digest,
        actual: Digest,
    },
    #[error("Media type {media_type} has no counterpart in the {schema} schema")]
    UnsupportedMediaType {
        media_type: MediaType,
        schema: Schema,
    },
    #[error("Malformed {document}: {source}")]
    MalformedDocument {
        document: String,
        source: serde_json::Error,
    },
    #[error("Neither manifest.json nor index.json is included in image tarball: {0}")]
    MissingTarballManifest(PathBuf),
    #[error("Entry {0} referenced by the image tarball manifest does not exist")]
    MissingTarballEntry(String),
    #[error("Image tarball must contain exactly one image, found {0}")]
    MultipleImagesInTarball(usize),

    //
    // System error
    //
    #[error("Cannot read {path} of layer {layer}: {source}")]
    LayerIo {
        layer: usize,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to hash content of layer {layer}: {source}")]
    HashComputation {
        layer: usize,
        source: std::io::Error,
    },
    #[error(transparent)]
    UnknownIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(document: impl Into<String>) -> impl FnOnce(serde_json::Error) -> Self {
        let document = document.into();
        move |source| Error::MalformedDocument { document, source }
    }
}
