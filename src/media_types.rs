//! Media types of the Docker image manifest v2 schema 2 and their OCI counterparts

use crate::error::*;
use oci_spec::image::MediaType;
use std::{fmt, str::FromStr};

/// `application/vnd.docker.distribution.manifest.v2+json`
pub fn docker_manifest() -> MediaType {
    MediaType::Other("application/vnd.docker.distribution.manifest.v2+json".to_string())
}

/// `application/vnd.docker.container.image.v1+json`
pub fn docker_config() -> MediaType {
    MediaType::Other("application/vnd.docker.container.image.v1+json".to_string())
}

/// `application/vnd.docker.image.rootfs.diff.tar.gzip`, the media type of every locally supplied layer
pub fn docker_layer() -> MediaType {
    MediaType::Other("application/vnd.docker.image.rootfs.diff.tar.gzip".to_string())
}

/// `application/vnd.docker.image.rootfs.diff.tar`
pub fn docker_uncompressed_layer() -> MediaType {
    MediaType::Other("application/vnd.docker.image.rootfs.diff.tar".to_string())
}

/// `application/vnd.docker.image.rootfs.foreign.diff.tar.gzip`
///
/// Foreign layers are not pushed to registries but downloaded from the `urls` of the descriptor,
/// e.g. the base layers of Windows images.
pub fn docker_foreign_layer() -> MediaType {
    MediaType::Other("application/vnd.docker.image.rootfs.foreign.diff.tar.gzip".to_string())
}

/// `application/vnd.docker.image.rootfs.foreign.diff.tar`
pub fn docker_uncompressed_foreign_layer() -> MediaType {
    MediaType::Other("application/vnd.docker.image.rootfs.foreign.diff.tar".to_string())
}

/// Whether a layer of this media type is referenced by URL instead of being supplied locally
#[allow(deprecated)]
pub fn is_foreign_layer(media_type: &MediaType) -> bool {
    *media_type == docker_foreign_layer()
        || *media_type == docker_uncompressed_foreign_layer()
        || matches!(
            media_type,
            MediaType::ImageLayerNonDistributable
                | MediaType::ImageLayerNonDistributableGzip
                | MediaType::ImageLayerNonDistributableZstd
        )
}

/// Family of media types a manifest is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schema {
    /// Docker image manifest v2 schema 2, `application/vnd.docker.*`
    #[default]
    Docker,
    /// OCI image manifest, `application/vnd.oci.*`
    Oci,
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Docker => write!(f, "Docker"),
            Schema::Oci => write!(f, "OCI"),
        }
    }
}

impl FromStr for Schema {
    type Err = Error;
    fn from_str(input: &str) -> Result<Self> {
        match input.to_ascii_lowercase().as_str() {
            "docker" => Ok(Schema::Docker),
            "oci" => Ok(Schema::Oci),
            _ => Err(Error::InvalidFormat(input.to_string())),
        }
    }
}

/// One-to-one mapping between Docker and OCI media types
#[derive(Debug, Clone)]
pub struct MediaTypeTable {
    /// `(docker, oci)` pairs
    pairs: Vec<(MediaType, MediaType)>,
}

lazy_static::lazy_static! {
    static ref MEDIA_TYPE_TABLE: MediaTypeTable = MediaTypeTable::new(default_pairs()).unwrap();
}

#[allow(deprecated)]
fn default_pairs() -> Vec<(MediaType, MediaType)> {
    vec![
        (docker_manifest(), MediaType::ImageManifest),
        (docker_config(), MediaType::ImageConfig),
        (docker_layer(), MediaType::ImageLayerGzip),
        (docker_uncompressed_layer(), MediaType::ImageLayer),
        (
            docker_foreign_layer(),
            MediaType::ImageLayerNonDistributableGzip,
        ),
        (
            docker_uncompressed_foreign_layer(),
            MediaType::ImageLayerNonDistributable,
        ),
    ]
}

/// Media types which the image reader can put into a Docker manifest.
/// The table must map every one of them.
pub fn assembled_media_types() -> Vec<MediaType> {
    vec![
        docker_manifest(),
        docker_config(),
        docker_layer(),
        docker_uncompressed_layer(),
        docker_foreign_layer(),
        docker_uncompressed_foreign_layer(),
    ]
}

impl MediaTypeTable {
    /// Create a table, checking it is a bijection covering [assembled_media_types]
    pub fn new(pairs: Vec<(MediaType, MediaType)>) -> Result<Self> {
        for (i, (docker, oci)) in pairs.iter().enumerate() {
            for (other_docker, other_oci) in &pairs[i + 1..] {
                if docker == other_docker || oci == other_oci {
                    return Err(Error::InvalidMediaTypeTable(format!(
                        "{} <-> {} is mapped twice",
                        docker, oci
                    )));
                }
            }
            if pairs.iter().any(|(d, _)| d == oci) || pairs.iter().any(|(_, o)| o == docker) {
                return Err(Error::InvalidMediaTypeTable(format!(
                    "{} <-> {} appears in both columns",
                    docker, oci
                )));
            }
        }
        for media_type in assembled_media_types() {
            if !pairs.iter().any(|(docker, _)| *docker == media_type) {
                return Err(Error::InvalidMediaTypeTable(format!(
                    "No OCI counterpart for {}",
                    media_type
                )));
            }
        }
        Ok(Self { pairs })
    }

    /// The table used for all schema conversions
    pub fn global() -> &'static Self {
        &MEDIA_TYPE_TABLE
    }

    /// Express `media_type` in `target` schema
    ///
    /// Media types already in the target schema are returned unchanged.
    pub fn convert(&self, media_type: &MediaType, target: Schema) -> Result<MediaType> {
        for (docker, oci) in &self.pairs {
            let (from, to) = match target {
                Schema::Docker => (oci, docker),
                Schema::Oci => (docker, oci),
            };
            if media_type == from || media_type == to {
                return Ok(to.clone());
            }
        }
        Err(Error::UnsupportedMediaType {
            media_type: media_type.clone(),
            schema: target,
        })
    }
}
