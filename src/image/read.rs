use crate::{
    error::*,
    image::{
        Descriptor, ImageConfig, ImageParts, ImageSource, LayerDescriptor, Manifest, SourceTarball,
    },
    media_types::{self, MediaTypeTable, Schema},
    Digest,
};

/// Container image assembled from its parts
#[derive(Debug, Clone)]
pub struct Image {
    raw_config: Vec<u8>,
    config: ImageConfig,
    manifest: Manifest,
    layers: Vec<LayerDescriptor>,
    schema: Schema,
}

impl Image {
    /// Raw bytes of the config, the config descriptor refers to the digest of these bytes.
    pub fn raw_config(&self) -> &[u8] {
        &self.raw_config
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Layers in the order of the manifest, base image first
    pub fn layers(&self) -> &[LayerDescriptor] {
        &self.layers
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Digest of the image, i.e. the digest of its canonical manifest
    pub fn digest(&self) -> Result<Digest> {
        self.manifest.digest()
    }

    pub(crate) fn from_raw_parts(
        raw_config: Vec<u8>,
        config: ImageConfig,
        manifest: Manifest,
        layers: Vec<LayerDescriptor>,
        schema: Schema,
    ) -> Self {
        Image {
            raw_config,
            config,
            manifest,
            layers,
            schema,
        }
    }

    pub(crate) fn into_raw_parts(
        self,
    ) -> (Vec<u8>, ImageConfig, Manifest, Vec<LayerDescriptor>) {
        (self.raw_config, self.config, self.manifest, self.layers)
    }
}

/// Assemble an image in the Docker schema.
///
/// Layers are placed in the order of `rootfs.diff_ids` of the config:
/// foreign layers of the base manifest keep their position in the base image,
/// and the remaining positions are filled by the tarball layers and then the `--layer` entries
/// in their declaration order.
pub fn read_image(parts: ImageParts) -> Result<Image> {
    let ImageParts {
        source,
        base_manifest,
        layers: declared,
    } = parts;

    let (raw_config, mut local) = match source {
        ImageSource::Config(raw_config) => (raw_config, Vec::new()),
        ImageSource::Tarball(path) => {
            let image = SourceTarball::open(&path)?.read()?;
            (image.config, image.layers)
        }
    };
    local.extend(declared);

    let config = ImageConfig::from_slice(&raw_config)?;
    let diff_ids = config.diff_ids();

    let base_manifest = base_manifest
        .map(|buf| Manifest::from_slice(&buf))
        .transpose()?;
    let foreign = match &base_manifest {
        Some(base) => foreign_layers(base, diff_ids),
        None => Vec::new(),
    };
    let num_foreign = foreign.iter().filter(|layer| layer.is_some()).count();

    if num_foreign + local.len() != diff_ids.len() {
        return Err(Error::LayerCountMismatch {
            expected: diff_ids.len(),
            actual: num_foreign + local.len(),
        });
    }

    let table = MediaTypeTable::global();
    let mut local = local.into_iter();
    let mut layers = Vec::with_capacity(diff_ids.len());
    for (position, expected) in diff_ids.iter().enumerate() {
        let mut layer = match foreign.get(position).cloned().flatten() {
            Some(layer) => layer,
            None => {
                let layer = local.next().ok_or(Error::LayerCountMismatch {
                    expected: diff_ids.len(),
                    actual: num_foreign + position,
                })?;
                if &layer.diff_id != expected {
                    return Err(Error::DiffIdMismatch {
                        position,
                        expected: expected.clone(),
                        actual: layer.diff_id,
                    });
                }
                layer
            }
        };
        layer.media_type = table.convert(&layer.media_type, Schema::Docker)?;
        layers.push(layer);
    }

    let config_descriptor = Descriptor {
        media_type: media_types::docker_config(),
        size: raw_config.len() as u64,
        digest: Digest::from_buf_sha256(&raw_config),
        urls: None,
        annotations: None,
    };
    let manifest = Manifest::docker(
        config_descriptor,
        layers.iter().map(Descriptor::from).collect(),
    );
    log::info!(
        "Assembled image with {} layers ({} foreign)",
        layers.len(),
        num_foreign
    );
    Ok(Image::from_raw_parts(
        raw_config,
        config,
        manifest,
        layers,
        Schema::Docker,
    ))
}

/// Foreign layers of the base manifest at their position, `None` for other layers.
///
/// Foreign layers are not supplied locally, their digest, size and URLs are copied by reference
/// and the diff ID is taken from the config at the same position.
fn foreign_layers(base: &Manifest, diff_ids: &[Digest]) -> Vec<Option<LayerDescriptor>> {
    base.layers
        .iter()
        .zip(diff_ids)
        .map(|(layer, diff_id)| {
            if media_types::is_foreign_layer(&layer.media_type) {
                Some(LayerDescriptor {
                    digest: layer.digest.clone(),
                    diff_id: diff_id.clone(),
                    size: layer.size,
                    media_type: layer.media_type.clone(),
                    urls: layer.urls.clone(),
                })
            } else {
                None
            }
        })
        .collect()
}
