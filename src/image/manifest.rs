//! Image manifest and its canonical encoding

use crate::{error::*, image::LayerDescriptor, media_types, Digest};
use oci_spec::image::MediaType;
use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use std::{collections::BTreeMap, io};

/// Reference to a blob
///
/// Field order is the serialization order, `mediaType`, `size`, `digest`
/// as written by the Docker daemon and registries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: MediaType,
    pub size: u64,
    pub digest: Digest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl From<&LayerDescriptor> for Descriptor {
    fn from(layer: &LayerDescriptor) -> Self {
        Descriptor {
            media_type: layer.media_type.clone(),
            size: layer.size,
            digest: layer.digest.clone(),
            urls: layer.urls.clone(),
            annotations: None,
        }
    }
}

/// Image manifest shared by the Docker v2 schema 2 and the OCI schema.
///
/// Both schemas have the same structure, only the media types differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl Manifest {
    /// New Docker v2 schema 2 manifest
    pub fn docker(config: Descriptor, layers: Vec<Descriptor>) -> Self {
        Manifest {
            schema_version: 2,
            media_type: Some(media_types::docker_manifest()),
            config,
            layers,
            annotations: None,
        }
    }

    pub fn from_slice(buf: &[u8]) -> Result<Self> {
        serde_json::from_slice(buf).map_err(Error::malformed("manifest"))
    }

    /// Canonical encoding, compact JSON with fixed field order.
    ///
    /// Annotation maps are sorted by key, and absent optional fields are omitted.
    /// Strings are escaped as Go's `encoding/json` does, which registries and the Docker daemon use.
    pub fn canonical_json(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, GoFormatter);
        self.serialize(&mut ser).map_err(Error::malformed("manifest"))?;
        Ok(buf)
    }

    /// Digest of the canonical encoding
    pub fn digest(&self) -> Result<Digest> {
        Ok(Digest::from_buf_sha256(&self.canonical_json()?))
    }
}

/// Compact formatter which additionally escapes `<`, `>`, `&`, U+2028 and U+2029
struct GoFormatter;

impl Formatter for GoFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            let escaped = match c {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    fn sample() -> Result<Manifest> {
        Ok(Manifest::docker(
            Descriptor {
                media_type: media_types::docker_config(),
                size: 7023,
                digest: Digest::new(
                    "sha256:b5b2b2c507a0944348e0303114d8d93aaaa081732b86451d9bce1f432a537bc7",
                )?,
                urls: None,
                annotations: None,
            },
            vec![Descriptor {
                media_type: media_types::docker_layer(),
                size: 32654,
                digest: Digest::new(
                    "sha256:e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f",
                )?,
                urls: None,
                annotations: None,
            }],
        ))
    }

    #[test]
    fn canonical() -> Result<()> {
        let json = String::from_utf8(sample()?.canonical_json()?).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"schemaVersion":2,"mediaType":"application/vnd.docker.distribution.manifest.v2+json","#,
                r#""config":{"mediaType":"application/vnd.docker.container.image.v1+json","size":7023,"digest":"sha256:b5b2b2c507a0944348e0303114d8d93aaaa081732b86451d9bce1f432a537bc7"},"#,
                r#""layers":[{"mediaType":"application/vnd.docker.image.rootfs.diff.tar.gzip","size":32654,"digest":"sha256:e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f"}]}"#,
            )
        );
        Ok(())
    }

    #[test]
    fn formatting_does_not_change_digest() -> Result<()> {
        // Same document with different whitespace and key order
        let pretty = r#"
        {
          "layers": [
            {
              "digest": "sha256:e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f",
              "size": 32654,
              "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip"
            }
          ],
          "config": {
            "size": 7023,
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "digest": "sha256:b5b2b2c507a0944348e0303114d8d93aaaa081732b86451d9bce1f432a537bc7"
          },
          "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
          "schemaVersion": 2
        }
        "#;
        let manifest = Manifest::from_slice(pretty.as_bytes())?;
        assert_eq!(manifest, sample()?);
        assert_eq!(manifest.digest()?, sample()?.digest()?);
        assert_eq!(
            manifest.digest()?,
            Digest::from_buf_sha256(&sample()?.canonical_json()?)
        );
        Ok(())
    }

    #[test]
    fn annotations_are_sorted() -> Result<()> {
        let mut manifest = sample()?;
        manifest.annotations = Some(btreemap! {
            "org.opencontainers.image.title".to_string() => "title".to_string(),
            "com.example.key".to_string() => "value".to_string(),
        });
        let json = String::from_utf8(manifest.canonical_json()?).unwrap();
        assert!(json.ends_with(
            r#""annotations":{"com.example.key":"value","org.opencontainers.image.title":"title"}}"#
        ));
        Ok(())
    }

    #[test]
    fn foreign_layer_urls() -> Result<()> {
        let json = r#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "config": {
                "mediaType": "application/vnd.docker.container.image.v1+json",
                "size": 1,
                "digest": "sha256:b5b2b2c507a0944348e0303114d8d93aaaa081732b86451d9bce1f432a537bc7"
            },
            "layers": [{
                "mediaType": "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip",
                "size": 1,
                "digest": "sha256:e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f",
                "urls": ["https://example.com/layer"]
            }]
        }"#;
        let manifest = Manifest::from_slice(json.as_bytes())?;
        assert!(media_types::is_foreign_layer(&manifest.layers[0].media_type));
        let canonical = String::from_utf8(manifest.canonical_json()?).unwrap();
        assert!(canonical.contains(
            r#""digest":"sha256:e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f","urls":["https://example.com/layer"]}"#
        ));
        Ok(())
    }

    #[test]
    fn html_characters_are_escaped() -> Result<()> {
        let mut manifest = sample()?;
        manifest.layers[0].urls = Some(vec![
            "https://example.com/blob?a=1&b=<2>".to_string(),
            "https://example.com/\u{2028}".to_string(),
        ]);
        let json = String::from_utf8(manifest.canonical_json()?).unwrap();
        assert!(json.contains(
            r#""urls":["https://example.com/blob?a=1\u0026b=\u003c2\u003e","https://example.com/\u2028"]"#
        ));

        // Escaped form is read back to the same manifest
        let decoded = Manifest::from_slice(json.as_bytes())?;
        assert_eq!(decoded, manifest);
        assert_eq!(decoded.digest()?, manifest.digest()?);
        Ok(())
    }

    #[test]
    fn malformed() {
        assert!(matches!(
            Manifest::from_slice(b"{\"schemaVersion\": 2"),
            Err(Error::MalformedDocument { .. })
        ));
        assert!(matches!(
            Manifest::from_slice(b"{\"schemaVersion\": 2, \"layers\": []}"),
            Err(Error::MalformedDocument { .. })
        ));
    }
}
