//! Image source resolution
//!
//! Each image is resolved on its own, possibly on another thread, into an
//! [`ImageSource`] plus the warnings raised along the way. The exporter
//! appends the results to the buffer layout in image order.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rayon::prelude::*;

use meshpack_core::Image;

use super::{TextureCodec, TextureError, TextureResult};
use crate::io::{self, AssetIo};

/// Texture settings relevant to image resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSettings {
    /// Embed external images into the binary buffer
    pub embed: bool,
    /// Recompress images with the texture codec
    pub basis: bool,
    /// Wrap recompressed images in KTX2
    pub ktx2: bool,
    /// Codec quality, 1..=100
    pub quality: u8,
}

/// Everything image resolution needs besides the image itself
#[derive(Clone, Copy)]
pub struct ImageContext<'a> {
    pub io: &'a dyn AssetIo,
    pub codec: Option<&'a dyn TextureCodec>,
    /// Path of the input document; external references are relative to it
    pub input_path: &'a Path,
    /// Path of the output document; recompressed siblings are written next to it
    pub output_path: &'a Path,
    pub settings: ImageSettings,
}

/// Where an image's bytes come from in the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Stored in a dedicated buffer view
    Embed { bytes: Vec<u8>, mime_type: String },
    /// Referenced by URI
    Reference { uri: String },
    /// Not written; textures using it lose their source
    Omitted,
}

/// Resolution outcome of one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub source: ImageSource,
    pub warnings: Vec<String>,
}

impl ResolvedImage {
    fn new(source: ImageSource, warnings: Vec<String>) -> Self {
        Self { source, warnings }
    }
}

/// Resolve every image in parallel; results are in image order
pub fn resolve_images(images: &[Image], ctx: &ImageContext<'_>) -> Vec<ResolvedImage> {
    images
        .par_iter()
        .enumerate()
        .map(|(index, image)| resolve_image(image, index, ctx))
        .collect()
}

/// Split a `data:<mime>;base64,<payload>` URI into MIME type and bytes
fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    let bytes = BASE64.decode(payload.trim()).ok()?;
    Some((mime_type.to_string(), bytes))
}

/// Resolve one image source
pub fn resolve_image(image: &Image, index: usize, ctx: &ImageContext<'_>) -> ResolvedImage {
    let mut warnings = Vec::new();
    let settings = &ctx.settings;

    let mut embedded = None;

    if let Some((mime_type, bytes)) = image.uri.as_deref().and_then(parse_data_uri) {
        if bytes.is_empty() {
            warnings.push(format!("ignoring image {index} since its data URI is empty"));
            return ResolvedImage::new(ImageSource::Omitted, warnings);
        }
        embedded = Some((bytes, mime_type));
    } else if let Some(bytes) = &image.data {
        let mime_type = image
            .mime_type
            .clone()
            .or_else(|| io::sniff_mime_type(bytes));
        match mime_type {
            _ if bytes.is_empty() => warnings.push(format!("image {index} holds no data")),
            Some(mime_type) => embedded = Some((bytes.clone(), mime_type)),
            None => warnings.push(format!("image {index} holds data of unknown format")),
        }
    } else if let (Some(uri), true) = (&image.uri, settings.embed) {
        let path = io::full_path(&io::decode_uri(uri), ctx.input_path);
        match ctx.io.read(&path) {
            Ok(bytes) if bytes.is_empty() => {
                warnings.push(format!("image {uri} is empty, referencing it instead"))
            }
            Ok(bytes) => {
                let mime_type = io::infer_mime_type(uri)
                    .or_else(|| io::sniff_mime_type(&bytes))
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                embedded = Some((bytes, mime_type));
            }
            Err(err) => warnings.push(format!(
                "unable to read image {uri} ({err}), referencing it instead"
            )),
        }
    }

    if let Some((bytes, mime_type)) = embedded {
        let source = embed(bytes, mime_type, image, index, ctx, &mut warnings);
        return ResolvedImage::new(source, warnings);
    }

    if let Some(uri) = &image.uri {
        let source = reference(uri, image, ctx, &mut warnings);
        return ResolvedImage::new(source, warnings);
    }

    warnings.push(format!(
        "ignoring image {index} since it has no URI and no valid buffer data"
    ));
    ResolvedImage::new(ImageSource::Omitted, warnings)
}

/// Recompress with the configured codec
fn recompress(codec: &dyn TextureCodec, bytes: &[u8], image: &Image, settings: &ImageSettings) -> TextureResult<Vec<u8>> {
    let encoded = codec.encode(bytes, image.normal_map, image.srgb, settings.quality)?;
    if encoded.is_empty() {
        return Err(TextureError::EncodingFailed("codec produced no data".into()));
    }
    if settings.ktx2 {
        codec.wrap_ktx2(&encoded, image.srgb)
    } else {
        Ok(encoded)
    }
}

fn recompressed_mime_type(settings: &ImageSettings) -> &'static str {
    if settings.ktx2 {
        "image/ktx2"
    } else {
        "image/basis"
    }
}

fn embed(
    bytes: Vec<u8>,
    mime_type: String,
    image: &Image,
    index: usize,
    ctx: &ImageContext<'_>,
    warnings: &mut Vec<String>,
) -> ImageSource {
    let settings = &ctx.settings;

    if let (true, Some(codec)) = (settings.basis, ctx.codec) {
        match recompress(codec, &bytes, image, settings) {
            Ok(encoded) => {
                return ImageSource::Embed {
                    bytes: encoded,
                    mime_type: recompressed_mime_type(settings).to_string(),
                };
            }
            Err(err) => warnings.push(format!(
                "unable to recompress image {index} ({err}), embedding the original"
            )),
        }
    }

    ImageSource::Embed { bytes, mime_type }
}

fn reference(uri: &str, image: &Image, ctx: &ImageContext<'_>, warnings: &mut Vec<String>) -> ImageSource {
    let settings = &ctx.settings;
    let passthrough = || ImageSource::Reference { uri: uri.to_string() };

    let (true, Some(codec)) = (settings.basis, ctx.codec) else {
        return passthrough();
    };

    let decoded = io::decode_uri(uri);
    let extension = if settings.ktx2 { "ktx2" } else { "basis" };
    let sibling = format!("{}.{extension}", io::file_stem(&decoded));

    let bytes = match ctx.io.read(&io::full_path(&decoded, ctx.input_path)) {
        Ok(bytes) => bytes,
        Err(err) => {
            warnings.push(format!("unable to read image {uri} ({err}), referencing the original"));
            return passthrough();
        }
    };

    let encoded = match recompress(codec, &bytes, image, settings) {
        Ok(encoded) => encoded,
        Err(err) => {
            warnings.push(format!("unable to recompress image {uri} ({err}), referencing the original"));
            return passthrough();
        }
    };

    if let Err(err) = ctx.io.write(&io::full_path(&sibling, ctx.output_path), &encoded) {
        warnings.push(format!("unable to save image {sibling} ({err}), referencing the original"));
        return passthrough();
    }

    ImageSource::Reference { uri: sibling }
}
