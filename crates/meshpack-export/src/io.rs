//! Asset I/O and path helpers
//!
//! Image sources are read and recompressed siblings written through
//! [`AssetIo`], so callers can serve assets from somewhere other than the
//! local filesystem.

use std::io;
use std::path::{Path, PathBuf};

use image::ImageFormat;

/// Byte-level access to the files next to the input and output documents
pub trait AssetIo: Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;
}

/// [`AssetIo`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct FsIo;

impl AssetIo for FsIo {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        std::fs::write(path, data)
    }
}

/// Decode `%XX` escapes in a URI reference
pub fn decode_uri(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Resolve `relative` against the directory containing `base_file`
pub fn full_path(relative: &str, base_file: &Path) -> PathBuf {
    let relative = Path::new(relative);
    if relative.is_absolute() {
        return relative.to_path_buf();
    }

    match base_file.parent() {
        Some(dir) => dir.join(relative),
        None => relative.to_path_buf(),
    }
}

/// Final component of a slash or backslash separated path
pub fn filename(path: &str) -> &str {
    let path = path.trim_end_matches(['/', '\\']);
    match path.rfind(['/', '\\']) {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// File name without its extension
pub fn file_stem(path: &str) -> &str {
    let name = filename(path);
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

/// Extension of the final path component
pub fn extension(path: &str) -> Option<&str> {
    let name = filename(path);
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos < name.len() - 1 => Some(&name[pos + 1..]),
        _ => None,
    }
}

/// MIME type implied by a path's extension
pub fn infer_mime_type(path: &str) -> Option<String> {
    let ext = extension(path)?.to_ascii_lowercase();

    let mime = match ext.as_str() {
        "ktx2" => "image/ktx2".to_string(),
        "basis" => "image/basis".to_string(),
        _ => match ImageFormat::from_extension(&ext) {
            Some(format) => format.to_mime_type().to_string(),
            None => format!("image/{ext}"),
        },
    };

    Some(mime)
}

const KTX2_MAGIC: [u8; 12] = [0xAB, b'K', b'T', b'X', b' ', b'2', b'0', 0xBB, b'\r', b'\n', 0x1A, b'\n'];

/// MIME type recognized from the leading bytes of an image
pub fn sniff_mime_type(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&KTX2_MAGIC) {
        return Some("image/ktx2".to_string());
    }

    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}
