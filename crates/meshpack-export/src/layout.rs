//! Binary layout pool
//!
//! Raw byte ranges are accumulated into classified buffer views. Appends with
//! the same classification share one view unless the variant is negative.
//! Once the walk is done the pool is finalized into the physical buffers:
//! buffer 0 holds uncompressed views and the compressed payloads, buffer 1
//! holds the raw bytes behind each compressed view.

use tracing::debug;

use crate::compression::{BufferCodec, CompressionMode};
use crate::error::{ExportError, ExportResult};
use crate::gltf::{
    BufferView, BufferViewExtensions, CompressedView, TARGET_ARRAY_BUFFER,
    TARGET_ELEMENT_ARRAY_BUFFER,
};

/// What a buffer view holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Time,
    Keyframe,
    Skin,
    Image,
}

impl BufferKind {
    fn target(&self) -> Option<u32> {
        match self {
            BufferKind::Vertex => Some(TARGET_ARRAY_BUFFER),
            BufferKind::Index => Some(TARGET_ELEMENT_ARRAY_BUFFER),
            _ => None,
        }
    }

    fn compression_mode(&self) -> CompressionMode {
        match self {
            BufferKind::Index => CompressionMode::Triangles,
            _ => CompressionMode::Attributes,
        }
    }
}

/// Decode filter applied to a stream after decompression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    #[default]
    None = 0,
    Octahedral = 1,
    Quaternion = 2,
    Exponential = 3,
}

impl Filter {
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

/// Classification of a buffer view; equal classes share storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewClass {
    pub kind: BufferKind,
    pub filter: Filter,
    pub variant: i32,
    pub stride: usize,
    pub compressed: bool,
}

impl ViewClass {
    fn is_shareable(&self) -> bool {
        self.variant >= 0
    }
}

#[derive(Debug)]
struct PooledView {
    class: ViewClass,
    data: Vec<u8>,
}

/// Append-only pool of buffer views
#[derive(Debug, Default)]
pub struct BufferViewPool {
    views: Vec<PooledView>,
}

/// Finalized views plus the bytes of both physical buffers
#[derive(Debug, Default)]
pub struct Layout {
    pub views: Vec<BufferView>,
    /// Buffer 0
    pub main: Vec<u8>,
    /// Buffer 1, empty when nothing was compressed
    pub fallback: Vec<u8>,
}

impl BufferViewPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a view with this classification, or start a new one
    pub fn acquire(
        &mut self,
        kind: BufferKind,
        filter: Filter,
        variant: i32,
        stride: usize,
        compressed: bool,
    ) -> usize {
        let class = ViewClass { kind, filter, variant, stride, compressed };

        if class.is_shareable() {
            if let Some(index) = self.views.iter().position(|v| v.class == class) {
                return index;
            }
        }

        self.views.push(PooledView { class, data: Vec::new() });
        self.views.len() - 1
    }

    /// Append bytes to a view, returning the offset they were placed at
    pub fn append(&mut self, view: usize, bytes: &[u8]) -> ExportResult<usize> {
        let pooled = self
            .views
            .get_mut(view)
            .ok_or_else(|| ExportError::contract(format!("buffer view {view} does not exist")))?;

        let offset = pooled.data.len();
        pooled.data.extend_from_slice(bytes);
        Ok(offset)
    }

    /// Current length of a view in bytes
    pub fn view_len(&self, view: usize) -> Option<usize> {
        self.views.get(view).map(|v| v.data.len())
    }

    /// Classification of a view
    pub fn class(&self, view: usize) -> Option<ViewClass> {
        self.views.get(view).map(|v| v.class)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Whether any view will be written through the codec
    pub fn has_compressed(&self) -> bool {
        self.views.iter().any(|v| v.class.compressed)
    }

    /// Assign offsets in creation order and build the physical buffers
    pub fn finalize(self, codec: Option<&dyn BufferCodec>) -> ExportResult<Layout> {
        let mut layout = Layout::default();

        for (index, view) in self.views.into_iter().enumerate() {
            let class = view.class;
            let length = view.data.len();

            if class.stride == 0 || length % class.stride != 0 {
                return Err(ExportError::contract(format!(
                    "buffer view {index} holds {length} bytes, not a multiple of stride {}",
                    class.stride
                )));
            }
            let count = length / class.stride;

            let mut gltf_view = BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: length,
                byte_stride: (class.kind == BufferKind::Vertex).then_some(class.stride),
                target: class.kind.target(),
                extensions: None,
            };

            if class.compressed {
                let codec = codec.ok_or_else(|| {
                    ExportError::config("compressed buffer views need a buffer codec")
                })?;
                let mode = class.kind.compression_mode();
                let encoded = codec.encode(mode, class.stride, &view.data)?;

                gltf_view.buffer = 1;
                gltf_view.byte_offset = place(&mut layout.fallback, &view.data);

                let compressed_offset = place(&mut layout.main, &encoded);
                gltf_view.extensions = Some(BufferViewExtensions {
                    compression: CompressedView {
                        buffer: 0,
                        byte_offset: compressed_offset,
                        byte_length: encoded.len(),
                        byte_stride: class.stride,
                        mode: mode.code(),
                        filter: (class.filter != Filter::None).then(|| class.filter.code()),
                        count,
                    },
                });

                debug!(view = index, raw = length, encoded = encoded.len(), "compressed buffer view");
            } else {
                gltf_view.byte_offset = place(&mut layout.main, &view.data);
            }

            layout.views.push(gltf_view);
        }

        Ok(layout)
    }
}

/// Append `bytes` to `buffer` at a 4-byte aligned offset
fn place(buffer: &mut Vec<u8>, bytes: &[u8]) -> usize {
    let offset = buffer.len();
    buffer.extend_from_slice(bytes);
    buffer.resize(align4(buffer.len()), 0);
    offset
}

pub(crate) fn align4(n: usize) -> usize {
    (n + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_shares_matching_views() {
        let mut pool = BufferViewPool::new();
        let a = pool.acquire(BufferKind::Vertex, Filter::None, 0, 12, false);
        let b = pool.acquire(BufferKind::Vertex, Filter::None, 0, 12, false);
        let c = pool.acquire(BufferKind::Vertex, Filter::None, 2, 12, false);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_negative_variant_never_shares() {
        let mut pool = BufferViewPool::new();
        let a = pool.acquire(BufferKind::Image, Filter::None, -1, 1, false);
        let b = pool.acquire(BufferKind::Image, Filter::None, -1, 1, false);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_append_returns_previous_length() {
        let mut pool = BufferViewPool::new();
        let view = pool.acquire(BufferKind::Index, Filter::None, 0, 2, false);
        assert_eq!(pool.append(view, &[1, 0, 2, 0]).unwrap(), 0);
        assert_eq!(pool.append(view, &[3, 0]).unwrap(), 4);
        assert_eq!(pool.view_len(view), Some(6));
        assert!(pool.append(9, &[0]).is_err());
    }

    #[test]
    fn test_finalize_pads_views() {
        let mut pool = BufferViewPool::new();
        let index = pool.acquire(BufferKind::Index, Filter::None, 0, 2, false);
        pool.append(index, &[0, 0, 1, 0, 2, 0]).unwrap();
        let vertex = pool.acquire(BufferKind::Vertex, Filter::None, 0, 4, false);
        pool.append(vertex, &[9; 8]).unwrap();

        let layout = pool.finalize(None).unwrap();
        assert_eq!(layout.views[0].byte_offset, 0);
        assert_eq!(layout.views[0].byte_length, 6);
        assert_eq!(layout.views[0].byte_stride, None);
        assert_eq!(layout.views[0].target, Some(TARGET_ELEMENT_ARRAY_BUFFER));
        assert_eq!(layout.views[1].byte_offset, 8);
        assert_eq!(layout.views[1].byte_stride, Some(4));
        assert_eq!(layout.main.len(), 16);
        assert_eq!(&layout.main[6..8], &[0, 0]);
        assert!(layout.fallback.is_empty());
    }

    #[test]
    fn test_finalize_rejects_partial_elements() {
        let mut pool = BufferViewPool::new();
        let view = pool.acquire(BufferKind::Vertex, Filter::None, 0, 12, false);
        pool.append(view, &[0; 10]).unwrap();

        let err = pool.finalize(None).unwrap_err();
        assert!(err.is_contract());
    }

    #[test]
    fn test_compressed_views_split_buffers() {
        let codec = |mode: CompressionMode, _stride: usize, data: &[u8]| -> ExportResult<Vec<u8>> {
            let mut out = vec![mode.code() as u8];
            out.extend_from_slice(&data[..2]);
            Ok(out)
        };

        let mut pool = BufferViewPool::new();
        let plain = pool.acquire(BufferKind::Time, Filter::None, 0, 4, false);
        pool.append(plain, &[1; 4]).unwrap();
        let packed = pool.acquire(BufferKind::Keyframe, Filter::Quaternion, 1, 8, true);
        pool.append(packed, &[2; 16]).unwrap();
        assert!(pool.has_compressed());

        let layout = pool.finalize(Some(&codec)).unwrap();
        let view = &layout.views[1];
        assert_eq!(view.buffer, 1);
        assert_eq!(view.byte_offset, 0);
        assert_eq!(view.byte_length, 16);

        let ext = &view.extensions.as_ref().unwrap().compression;
        assert_eq!(ext.byte_offset, 4);
        assert_eq!(ext.byte_length, 3);
        assert_eq!(ext.mode, 0);
        assert_eq!(ext.filter, Some(2));
        assert_eq!(ext.count, 2);
        assert_eq!(layout.main.len(), 8);
        assert_eq!(layout.fallback, vec![2; 16]);
    }

    #[test]
    fn test_compressed_without_codec_is_config_error() {
        let mut pool = BufferViewPool::new();
        let view = pool.acquire(BufferKind::Index, Filter::None, 0, 4, true);
        pool.append(view, &[0; 4]).unwrap();

        assert!(matches!(pool.finalize(None), Err(ExportError::Config(_))));
    }
}
