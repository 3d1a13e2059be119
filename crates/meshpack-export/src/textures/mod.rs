//! Texture recompression and image source resolution
//!
//! Images are embedded, referenced, or recompressed through a
//! [`TextureCodec`] into Basis Universal payloads (optionally KTX2 wrapped).

mod pipeline;

pub use pipeline::{resolve_image, resolve_images, ImageContext, ImageSettings, ImageSource, ResolvedImage};

use thiserror::Error;

/// Texture codec errors
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

pub type TextureResult<T> = Result<T, TextureError>;

/// Texture recompression codec
pub trait TextureCodec: Sync {
    /// Encode an image file (PNG, JPEG, ...) into a Basis Universal payload
    fn encode(&self, data: &[u8], normal_map: bool, srgb: bool, quality: u8) -> TextureResult<Vec<u8>>;

    /// Re-wrap a Basis Universal payload in a KTX2 container
    fn wrap_ktx2(&self, basis: &[u8], srgb: bool) -> TextureResult<Vec<u8>>;
}
