use crate::{error::*, Digest};
use serde::Deserialize;

/// Part of the image config JSON needed to assemble the manifest
///
/// Only `rootfs` is required, every other field of the config is optional and ignored here.
/// The config descriptor always refers to the raw bytes, never to a re-encoding of this struct.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageConfig {
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    pub rootfs: RootFs,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RootFs {
    #[serde(rename = "type", default)]
    pub fs_type: String,
    /// Digests of the uncompressed layers, base image first
    #[serde(default)]
    pub diff_ids: Vec<Digest>,
}

impl ImageConfig {
    pub fn from_slice(buf: &[u8]) -> Result<Self> {
        serde_json::from_slice(buf).map_err(Error::malformed("image config"))
    }

    pub fn diff_ids(&self) -> &[Digest] {
        &self.rootfs.diff_ids
    }
}
