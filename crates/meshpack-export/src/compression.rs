//! Transport compression of buffer views (`MESHOPT_compression`)
//!
//! The codec itself lives outside this crate; the layout pool only needs to
//! hand it a view's bytes and record where the result landed.

use crate::error::ExportResult;

/// Codec mode, written as the numeric `mode` of the compression extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMode {
    Attributes = 0,
    Triangles = 1,
}

impl CompressionMode {
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

/// Generic buffer compression codec
pub trait BufferCodec: Send + Sync {
    /// Compress `data`, a sequence of `data.len() / stride` elements
    fn encode(&self, mode: CompressionMode, stride: usize, data: &[u8]) -> ExportResult<Vec<u8>>;
}

impl<F> BufferCodec for F
where
    F: Fn(CompressionMode, usize, &[u8]) -> ExportResult<Vec<u8>> + Send + Sync,
{
    fn encode(&self, mode: CompressionMode, stride: usize, data: &[u8]) -> ExportResult<Vec<u8>> {
        self(mode, stride, data)
    }
}
