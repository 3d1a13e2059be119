//! meshpack Export Pipeline
//!
//! Serializes an optimized in-memory scene into glTF 2.0:
//! - buffer view pooling and accessor emission
//! - vertex, index and keyframe encoding, optionally quantized and compressed
//! - materials, textures and image embedding or recompression
//! - skins, animations, cameras and punctual lights
//! - `.gltf` + `.bin` or single-file GLB output

pub mod accessor;
pub mod animation;
pub mod camera;
pub mod compression;
pub mod error;
pub mod extensions;
pub mod gltf;
pub mod graph;
pub mod io;
pub mod layout;
pub mod light;
pub mod material;
pub mod mesh;
pub mod quantize;
pub mod retention;
pub mod stream;
pub mod textures;

pub use compression::{BufferCodec, CompressionMode};
pub use error::{ExportError, ExportResult};
pub use gltf::{ExportReport, ExportedScene, GltfExportOptions, GltfExporter};
pub use io::{AssetIo, FsIo};
pub use retention::analyze_nodes;
pub use stream::{StandardEncoder, StreamEncoder, StreamFormat};
pub use textures::{TextureCodec, TextureError};
