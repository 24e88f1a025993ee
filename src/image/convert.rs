use crate::{
    error::*,
    image::{Descriptor, Image},
    media_types::{MediaTypeTable, Schema},
};

impl Image {
    /// Express the image in `target` schema.
    ///
    /// Only media types are rewritten. Config bytes, layer order, digests, sizes and URLs are kept,
    /// since the Docker and OCI image config are compatible.
    pub fn convert(self, target: Schema) -> Result<Image> {
        if self.schema() == target {
            return Ok(self);
        }
        let table = MediaTypeTable::global();
        let (raw_config, config, mut manifest, mut layers) = self.into_raw_parts();

        if let Some(media_type) = &manifest.media_type {
            manifest.media_type = Some(table.convert(media_type, target)?);
        }
        convert_descriptor(table, &mut manifest.config, target)?;
        for descriptor in &mut manifest.layers {
            convert_descriptor(table, descriptor, target)?;
        }
        for layer in &mut layers {
            layer.media_type = table.convert(&layer.media_type, target)?;
        }
        log::debug!("Converted image manifest into {} schema", target);
        Ok(Image::from_raw_parts(
            raw_config, config, manifest, layers, target,
        ))
    }
}

fn convert_descriptor(
    table: &MediaTypeTable,
    descriptor: &mut Descriptor,
    target: Schema,
) -> Result<()> {
    descriptor.media_type = table.convert(&descriptor.media_type, target)?;
    Ok(())
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;
    use crate::{
        image::{read_image, tarball::tests::config_json, ImageArgs, LayerParts},
        media_types, Digest,
    };
    use oci_spec::image::MediaType;
    use std::fs;

    fn sample_image(dir: &std::path::Path) -> Result<Image> {
        let foreign_diff_id = Digest::new(&format!("sha256:{}", "f".repeat(64)))?;
        let content = b"local";
        let config = dir.join("config.json");
        fs::write(
            &config,
            config_json(&[foreign_diff_id, Digest::from_buf_sha256(content)]),
        )?;
        let base = dir.join("base.json");
        fs::write(
            &base,
            format!(
                r#"{{"schemaVersion":2,"config":{{"mediaType":"application/vnd.docker.container.image.v1+json","size":1,"digest":"sha256:{c}"}},
                "layers":[{{"mediaType":"application/vnd.docker.image.rootfs.foreign.diff.tar.gzip","size":10,"digest":"sha256:{e}","urls":["https://example.com/{e}"]}}]}}"#,
                c = "c".repeat(64),
                e = "e".repeat(64),
            ),
        )?;
        let layer = dir.join("layer.tar");
        fs::write(&layer, content)?;
        read_image(
            ImageArgs {
                config: Some(config),
                base_manifest: Some(base),
                layers: vec![LayerParts {
                    uncompressed: Some(layer),
                    ..Default::default()
                }],
                ..Default::default()
            }
            .resolve()?,
        )
    }

    #[test]
    fn docker_to_oci() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let docker = sample_image(dir.path())?;
        let oci = docker.clone().convert(Schema::Oci)?;

        assert_eq!(oci.schema(), Schema::Oci);
        let manifest = oci.manifest();
        assert_eq!(manifest.media_type, Some(MediaType::ImageManifest));
        assert_eq!(manifest.config.media_type, MediaType::ImageConfig);
        assert_eq!(
            manifest.layers[0].media_type,
            MediaType::ImageLayerNonDistributableGzip
        );
        assert_eq!(manifest.layers[1].media_type, MediaType::ImageLayerGzip);
        assert_eq!(oci.layers()[1].media_type, MediaType::ImageLayerGzip);

        // Everything but media types is kept
        assert_eq!(oci.raw_config(), docker.raw_config());
        assert_eq!(manifest.config.digest, docker.manifest().config.digest);
        for (converted, original) in manifest.layers.iter().zip(&docker.manifest().layers) {
            assert_eq!(converted.digest, original.digest);
            assert_eq!(converted.size, original.size);
            assert_eq!(converted.urls, original.urls);
        }
        assert_ne!(oci.digest()?, docker.digest()?);
        Ok(())
    }

    #[test]
    fn round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let docker = sample_image(dir.path())?;
        let digest = docker.digest()?;

        let oci = docker.convert(Schema::Oci)?;
        let oci_digest = oci.digest()?;
        let docker = oci.convert(Schema::Docker)?;
        assert_eq!(docker.digest()?, digest);
        assert_eq!(docker.manifest().layers[0].media_type, media_types::docker_foreign_layer());

        let oci = docker.convert(Schema::Oci)?;
        assert_eq!(oci.digest()?, oci_digest);
        Ok(())
    }

    #[test]
    fn same_schema_is_noop() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let docker = sample_image(dir.path())?;
        let digest = docker.digest()?;
        assert_eq!(docker.convert(Schema::Docker)?.digest()?, digest);
        Ok(())
    }

    #[test]
    fn unsupported_layer_media_type() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let image = sample_image(dir.path())?;
        let (raw_config, config, mut manifest, layers) = image.into_raw_parts();
        manifest.layers[1].media_type =
            MediaType::Other("application/vnd.example.layer".to_string());
        let image = Image::from_raw_parts(raw_config, config, manifest, layers, Schema::Docker);
        match image.convert(Schema::Oci) {
            Err(Error::UnsupportedMediaType { media_type, schema }) => {
                assert_eq!(
                    media_type,
                    MediaType::Other("application/vnd.example.layer".to_string())
                );
                assert_eq!(schema, Schema::Oci);
            }
            other => panic!("Unexpected result: {:?}", other.map(|i| i.schema())),
        }
        Ok(())
    }
}
