use crate::error::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::{fmt, io, path::PathBuf, str::FromStr};

/// Digest of contents
///
/// Digest is defined in [OCI image spec](https://github.com/opencontainers/image-spec/blob/v1.0.1/descriptor.md#digests)
/// as a string satisfies following EBNF:
///
/// ```text
/// digest                ::= algorithm ":" encoded
/// algorithm             ::= algorithm-component (algorithm-separator algorithm-component)*
/// algorithm-component   ::= [a-z0-9]+
/// algorithm-separator   ::= [+._-]
/// encoded               ::= [a-zA-Z0-9=_-]+
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    pub algorithm: String,
    pub encoded: String,
}

lazy_static::lazy_static! {
    static ref ALGORITHM_RE: Regex = Regex::new(r"^[a-z0-9]+([+._-][a-z0-9]+)*$").unwrap();
    static ref ENCODED_RE: Regex = Regex::new(r"^[a-zA-Z0-9=_-]+$").unwrap();
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.encoded)
    }
}

impl FromStr for Digest {
    type Err = Error;
    fn from_str(input: &str) -> Result<Self> {
        Digest::new(input)
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Digest, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Digest::new(&s).map_err(serde::de::Error::custom)
    }
}

impl Digest {
    pub fn new(input: &str) -> Result<Self> {
        match input.split_once(':') {
            Some((algorithm, encoded))
                if ALGORITHM_RE.is_match(algorithm) && ENCODED_RE.is_match(encoded) =>
            {
                Ok(Digest {
                    algorithm: algorithm.to_string(),
                    encoded: encoded.to_string(),
                })
            }
            _ => Err(Error::InvalidDigest(input.to_string())),
        }
    }

    /// Parse the content of a precomputed hash file.
    ///
    /// Accepts both `sha256:<hex>` and a bare hex string, which is taken as SHA-256.
    pub fn from_hash_file_content(content: &str) -> Result<Self> {
        let content = content.trim();
        if content.contains(':') {
            Digest::new(content)
        } else {
            Digest::new(&format!("sha256:{}", content))
        }
    }

    /// As a path used in oci-archive
    pub fn as_path(&self) -> PathBuf {
        PathBuf::from(format!("blobs/{}/{}", self.algorithm, self.encoded))
    }

    /// Calc digest using SHA-256 algorithm
    pub fn from_buf_sha256(buf: &[u8]) -> Self {
        let hash = Sha256::digest(buf);
        Self::from_sha256_output(&hash)
    }

    fn from_sha256_output(hash: &[u8]) -> Self {
        Self {
            algorithm: "sha256".to_string(),
            encoded: base16ct::lower::encode_string(hash),
        }
    }
}

/// Writer adaptor which calculates the SHA-256 digest and the length
/// of everything written through it.
pub struct DigestBuf<W: io::Write> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: io::Write> DigestBuf<W> {
    pub fn new(inner: W) -> Self {
        DigestBuf {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Number of bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(self) -> (W, Digest) {
        let hash = self.hasher.finalize();
        (self.inner, Digest::from_sha256_output(&hash))
    }
}

impl<W: io::Write> io::Write for DigestBuf<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse() -> Result<()> {
        let digest = Digest::new(
            "sha256:e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f",
        )?;
        assert_eq!(digest.algorithm, "sha256");
        assert_eq!(
            digest.encoded,
            "e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f"
        );

        assert!(Digest::new("sha256").is_err());
        assert!(Digest::new("sha256:").is_err());
        assert!(Digest::new("SHA256:abcd").is_err());
        assert!(Digest::new("sha256:ab/cd").is_err());
        assert!(Digest::new("sha256+b64u:LCa0a2j_xo_5m0U8HTBBNBNCLXBkg7-g-YpeiGJm564").is_ok());
        Ok(())
    }

    #[test]
    fn hash_file_content() -> Result<()> {
        let hex = "e692418e4cbaf90ca69d05a66403747baa33ee08806650b51fab815ad7fc331f";
        let prefixed = Digest::from_hash_file_content(&format!("sha256:{}\n", hex))?;
        let bare = Digest::from_hash_file_content(hex)?;
        assert_eq!(prefixed, bare);
        assert_eq!(bare.to_string(), format!("sha256:{}", hex));
        assert!(Digest::from_hash_file_content("").is_err());
        Ok(())
    }

    #[test]
    fn sha256_of_empty() {
        assert_eq!(
            Digest::from_buf_sha256(b"").to_string(),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_buf() -> Result<()> {
        let mut buf = DigestBuf::new(Vec::new());
        buf.write_all(b"hello ")?;
        buf.write_all(b"world")?;
        assert_eq!(buf.written(), 11);
        let (inner, digest) = buf.finish();
        assert_eq!(inner, b"hello world");
        assert_eq!(digest, Digest::from_buf_sha256(b"hello world"));
        Ok(())
    }
}
