//! Resolve image parts and assemble the manifest of a container image
//!
//! An image is described either by its config JSON together with individually supplied layers,
//! or by an image tarball (`docker save` output or oci-archive).
//! [ImageArgs] are resolved into [ImageParts], assembled into an [Image] by [read_image],
//! and finally converted into the requested [Schema](crate::media_types::Schema) by [Image::convert].

mod config;
mod convert;
pub mod layer;
mod manifest;
mod parts;
mod read;
pub mod tarball;

pub use config::*;
pub use layer::*;
pub use manifest::*;
pub use parts::*;
pub use read::*;
pub use tarball::*;
