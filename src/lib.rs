//! image-digester
//! ===============
//!
//! Compute the manifest digest of a container image from its parts
//! without talking to any registry.

pub mod error;
pub mod image;
pub mod media_types;

mod digest;

pub use digest::{Digest, DigestBuf};
pub use media_types::Schema;

use error::*;
use image::{read_image, ImageArgs};

/// Digest of the image manifest described by `args`, expressed in `schema`
pub fn image_digest(args: &ImageArgs, schema: Schema) -> Result<Digest> {
    args.validate()?;
    let parts = args.resolve()?;
    let image = read_image(parts)?.convert(schema)?;
    let digest = image.digest()?;
    log::info!("{} manifest digest: {}", schema, digest);
    Ok(digest)
}
