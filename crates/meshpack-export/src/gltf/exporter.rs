//! glTF exporter implementation

use super::*;
use std::io::Write;
use std::path::{Path, PathBuf};

use meshpack_core as core;
use meshpack_core::NodeInfo;
use tracing::{debug, info, info_span, warn};

use crate::accessor::AccessorList;
use crate::animation::{emit_animation, AnimationSettings};
use crate::camera::emit_camera;
use crate::compression::BufferCodec;
use crate::error::{ExportError, ExportResult};
use crate::extensions::{Extension, ExtensionRegistry};
use crate::graph::{attach_mesh_nodes, emit_mesh_node, emit_node, emit_skin, kept_order, scene_roots};
use crate::io::{AssetIo, FsIo};
use crate::layout::{BufferKind, BufferViewPool, Filter};
use crate::light::emit_light;
use crate::material::{emit_sampler, emit_texture, MaterialEmitter};
use crate::mesh::emit_mesh;
use crate::stream::{Encoding, StandardEncoder, StreamEncoder};
use crate::textures::{resolve_images, ImageContext, ImageSettings, ImageSource, TextureCodec};

const GENERATOR: &str = concat!("meshpack ", env!("CARGO_PKG_VERSION"));

/// glTF export options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GltfExportOptions {
    /// Export as GLB (single binary file) instead of separate JSON + BIN
    pub use_glb: bool,
    /// Pretty-print JSON
    pub pretty_json: bool,
    /// Embed external images into the binary buffer
    pub texture_embed: bool,
    /// Recompress images with the texture codec
    pub texture_basis: bool,
    /// Wrap recompressed images in KTX2
    pub texture_ktx2: bool,
    /// Texture codec quality, 1..=100
    pub texture_quality: u8,
    /// Animation resampling frequency in Hz
    pub anim_freq: f32,
    /// Keep animation tracks that never leave the rest pose
    pub anim_const: bool,
    /// Compress buffer views with the buffer codec
    pub compress: bool,
    /// Write uncompressed data to a fallback buffer file
    pub fallback: bool,
    /// Copy extras of nodes, meshes, materials and the scene
    pub keep_extras: bool,
}

impl Default for GltfExportOptions {
    fn default() -> Self {
        Self {
            use_glb: false,
            pretty_json: false,
            texture_embed: false,
            texture_basis: false,
            texture_ktx2: false,
            texture_quality: 50,
            anim_freq: 30.0,
            anim_const: false,
            compress: false,
            fallback: false,
            keep_extras: false,
        }
    }
}

impl GltfExportOptions {
    fn image_settings(&self) -> ImageSettings {
        ImageSettings {
            embed: self.texture_embed,
            basis: self.texture_basis,
            ktx2: self.texture_ktx2,
            quality: self.texture_quality,
        }
    }
}

/// Summary of an export run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Every recoverable problem, in the order it was found
    pub warnings: Vec<String>,
    pub animations: usize,
    pub cameras: usize,
    pub images: usize,
}

impl ExportReport {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// A serialized scene that has not been written yet
#[derive(Debug)]
pub struct ExportedScene {
    pub document: Gltf,
    /// Buffer 0
    pub main: Vec<u8>,
    /// Buffer 1, uncompressed counterparts of compressed views
    pub fallback: Vec<u8>,
    pub report: ExportReport,
    paths: OutputPaths,
    options: GltfExportOptions,
}

#[derive(Debug, Clone)]
struct OutputPaths {
    document: PathBuf,
    main: PathBuf,
    fallback: PathBuf,
}

impl OutputPaths {
    fn new(output_path: &Path, use_glb: bool) -> Self {
        Self {
            document: output_path.with_extension(if use_glb { "glb" } else { "gltf" }),
            main: output_path.with_extension("bin"),
            fallback: output_path.with_extension("fallback.bin"),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ExportedScene {
    /// Document path the scene will be saved to
    pub fn document_path(&self) -> &Path {
        &self.paths.document
    }

    /// Serialize the document text
    pub fn to_json(&self) -> ExportResult<String> {
        let json = if self.options.pretty_json {
            serde_json::to_string_pretty(&self.document)?
        } else {
            serde_json::to_string(&self.document)?
        };
        Ok(json)
    }

    /// Build a GLB v2 container holding the document and buffer 0
    pub fn to_glb(&self) -> ExportResult<Vec<u8>> {
        let json = serde_json::to_string(&self.document)?;
        let sizes = GlbSizes::new(json.len(), self.main.len())?;

        let mut glb = Vec::with_capacity(sizes.total as usize);

        // GLB header
        glb.write_all(b"glTF")?;
        glb.write_all(&2u32.to_le_bytes())?;
        glb.write_all(&sizes.total.to_le_bytes())?;

        // JSON chunk
        glb.write_all(&sizes.json_chunk.to_le_bytes())?;
        glb.write_all(&0x4E4F534Au32.to_le_bytes())?;
        glb.write_all(json.as_bytes())?;
        glb.resize(glb.len() + sizes.json_chunk as usize - json.len(), 0x20);

        // BIN chunk
        if let Some(bin_chunk) = sizes.bin_chunk {
            glb.write_all(&bin_chunk.to_le_bytes())?;
            glb.write_all(&0x004E4942u32.to_le_bytes())?;
            glb.write_all(&self.main)?;
            glb.resize(glb.len() + bin_chunk as usize - self.main.len(), 0);
        }

        Ok(glb)
    }

    /// Write the document and its buffers
    pub fn save(&self) -> ExportResult<()> {
        if self.options.use_glb {
            std::fs::write(&self.paths.document, self.to_glb()?)?;
        } else {
            std::fs::write(&self.paths.document, self.to_json()?)?;
            std::fs::write(&self.paths.main, &self.main)?;
        }

        if self.options.fallback && !self.fallback.is_empty() {
            std::fs::write(&self.paths.fallback, &self.fallback)?;
        }

        info!(path = %self.paths.document.display(), "saved scene");
        Ok(())
    }
}

/// Padded chunk lengths of a GLB container; every length field is 32-bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GlbSizes {
    json_chunk: u32,
    /// Absent when buffer 0 is empty
    bin_chunk: Option<u32>,
    total: u32,
}

impl GlbSizes {
    fn new(json_len: usize, bin_len: usize) -> ExportResult<Self> {
        let padded = |len: usize| (len as u64 + 3) & !3;

        let json_chunk = padded(json_len);
        let bin_chunk = (bin_len > 0).then(|| padded(bin_len));
        let total = 12 + 8 + json_chunk + bin_chunk.map_or(0, |chunk| 8 + chunk);

        let fits = |value: u64| u32::try_from(value).ok();
        match (fits(json_chunk), bin_chunk.map(fits), fits(total)) {
            (Some(json_chunk), None, Some(total)) => Ok(Self { json_chunk, bin_chunk: None, total }),
            (Some(json_chunk), Some(Some(bin_chunk)), Some(total)) => {
                Ok(Self { json_chunk, bin_chunk: Some(bin_chunk), total })
            }
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("GLB container of {total} bytes exceeds the 4 GiB limit"),
            )
            .into()),
        }
    }
}

/// glTF exporter
pub struct GltfExporter {
    options: GltfExportOptions,
    io: Box<dyn AssetIo>,
    encoder: Box<dyn StreamEncoder>,
    buffer_codec: Option<Box<dyn BufferCodec>>,
    texture_codec: Option<Box<dyn TextureCodec>>,
}

impl GltfExporter {
    /// Create a new glTF exporter reading assets from the filesystem
    pub fn new(options: GltfExportOptions) -> Self {
        Self {
            options,
            io: Box::new(FsIo),
            encoder: Box::new(StandardEncoder),
            buffer_codec: None,
            texture_codec: None,
        }
    }

    pub fn with_io(mut self, io: impl AssetIo + 'static) -> Self {
        self.io = Box::new(io);
        self
    }

    pub fn with_encoder(mut self, encoder: impl StreamEncoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    pub fn with_buffer_codec(mut self, codec: impl BufferCodec + 'static) -> Self {
        self.buffer_codec = Some(Box::new(codec));
        self
    }

    pub fn with_texture_codec(mut self, codec: impl TextureCodec + 'static) -> Self {
        self.texture_codec = Some(Box::new(codec));
        self
    }

    pub fn options(&self) -> &GltfExportOptions {
        &self.options
    }

    /// Reject option combinations the exporter cannot honor
    pub fn check_options(&self) -> ExportResult<()> {
        let options = &self.options;

        if options.compress && self.buffer_codec.is_none() {
            return Err(ExportError::config("compression requested without a buffer codec"));
        }
        if options.texture_basis && self.texture_codec.is_none() {
            return Err(ExportError::config("texture recompression requested without a texture codec"));
        }
        if options.anim_freq.is_nan() || options.anim_freq <= 0.0 {
            return Err(ExportError::config(format!(
                "animation frequency must be positive, got {}",
                options.anim_freq
            )));
        }
        if !(1..=100).contains(&options.texture_quality) {
            return Err(ExportError::config(format!(
                "texture quality must be within 1..=100, got {}",
                options.texture_quality
            )));
        }

        Ok(())
    }

    /// Serialize `scene`
    ///
    /// `nodes` holds one retention entry per scene node; its `meshes` lists
    /// are rebuilt here. Nothing is written to disk except recompressed
    /// sibling textures.
    pub fn export(
        &self,
        scene: &core::Scene,
        nodes: &mut [NodeInfo],
        input_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> ExportResult<ExportedScene> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();
        let _span = info_span!("export", output = %output_path.display()).entered();

        self.check_options()?;
        scene.validate()?;

        if nodes.len() != scene.nodes.len() {
            return Err(ExportError::contract(format!(
                "{} retention entries for {} nodes",
                nodes.len(),
                scene.nodes.len()
            )));
        }

        let order = kept_order(nodes)?;
        attach_mesh_nodes(&scene.meshes, nodes, order.len())?;
        let nodes: &[NodeInfo] = nodes;

        let options = &self.options;
        let mut report = ExportReport::default();
        let mut extensions = ExtensionRegistry::default();
        let mut pool = BufferViewPool::new();
        let mut accessors = AccessorList::new();
        let encoding = Encoding {
            encoder: self.encoder.as_ref(),
            quantization: scene.quantization.as_ref(),
            compress: options.compress,
        };

        let mut document = Gltf {
            asset: Asset {
                version: "2.0".to_string(),
                generator: Some(GENERATOR.to_string()),
            },
            ..Default::default()
        };

        // Images
        let context = ImageContext {
            io: self.io.as_ref(),
            codec: self.texture_codec.as_deref(),
            input_path,
            output_path,
            settings: options.image_settings(),
        };
        let mut image_remap = vec![None; scene.images.len()];

        for (index, (image, resolved)) in scene
            .images
            .iter()
            .zip(resolve_images(&scene.images, &context))
            .enumerate()
        {
            for warning in resolved.warnings {
                report.warn(warning);
            }

            let name = image.name.clone().filter(|n| !n.is_empty());
            let out = match resolved.source {
                ImageSource::Embed { bytes, mime_type } => {
                    let view = pool.acquire(BufferKind::Image, Filter::None, -1, 1, false);
                    pool.append(view, &bytes)?;
                    Image { name, buffer_view: Some(view), mime_type: Some(mime_type), uri: None }
                }
                ImageSource::Reference { uri } => Image { name, uri: Some(uri), ..Default::default() },
                ImageSource::Omitted => continue,
            };

            image_remap[index] = Some(document.images.len());
            document.images.push(out);
        }

        // Textures, samplers, materials
        let ktx2 = options.texture_basis && options.texture_ktx2;
        document.textures = scene
            .textures
            .iter()
            .map(|t| emit_texture(t, &image_remap, ktx2, &mut extensions))
            .collect();
        document.samplers = scene.samplers.iter().map(emit_sampler).collect();

        let qt = scene.quantization.as_ref().map(|q| &q.texture);
        let mut materials = MaterialEmitter::new(qt, options.keep_extras, &mut extensions);
        document.materials = scene.materials.iter().map(|m| materials.emit(m)).collect();

        // Meshes, skins, animations; accessor ids follow this order
        for mesh in &scene.meshes {
            let out = emit_mesh(mesh, &mut pool, &mut accessors, &encoding, options.keep_extras)?;
            document.meshes.push(out);
        }
        if scene.quantization.is_some() && !scene.meshes.is_empty() {
            extensions.mark(Extension::MeshQuantization, true);
        }

        for skin in &scene.skins {
            document.skins.push(emit_skin(skin, nodes, &mut pool, &mut accessors, &encoding)?);
        }

        let animation_settings = AnimationSettings {
            frequency: options.anim_freq,
            keep_constant: options.anim_const,
        };
        for (index, animation) in scene.animations.iter().enumerate() {
            match emit_animation(animation, nodes, &animation_settings, &mut pool, &mut accessors, &encoding)? {
                Some(out) => document.animations.push(out),
                None => report.warn(format!("ignoring animation {index} because it has no valid tracks")),
            }
        }

        // Cameras and lights
        let mut camera_remap = vec![None; scene.cameras.len()];
        for (index, camera) in scene.cameras.iter().enumerate() {
            match emit_camera(camera) {
                Some(out) => {
                    camera_remap[index] = Some(document.cameras.len());
                    document.cameras.push(out);
                }
                None => report.warn(format!("skipping camera {index} of unknown type")),
            }
        }

        if !scene.lights.is_empty() {
            extensions.mark(Extension::LightsPunctual, false);
            document.extensions = Some(RootExtensions {
                lights_punctual: Some(Lights { lights: scene.lights.iter().map(emit_light).collect() }),
            });
        }

        // Nodes: kept nodes in output order, then one node per mesh
        for &source in &order {
            let out = emit_node(&scene.nodes[source], &nodes[source], nodes, &camera_remap, options.keep_extras);
            document.nodes.push(out);
        }

        let qp = scene.quantization.as_ref().map(|q| &q.position);
        for (index, mesh) in scene.meshes.iter().enumerate() {
            document.nodes.push(emit_mesh_node(index, mesh, &scene.nodes, qp));
        }

        document.scenes = vec![Scene { nodes: scene_roots(&scene.nodes, nodes, &order, &scene.meshes) }];
        document.scene = Some(0);
        document.extras = scene.extras.clone().filter(|_| options.keep_extras);

        // Buffers
        let compressed = pool.has_compressed();
        let layout = pool.finalize(self.buffer_codec.as_deref())?;
        let paths = OutputPaths::new(output_path, options.use_glb);

        if compressed {
            extensions.mark(Extension::MeshoptCompression, !options.fallback);
        }

        if !layout.views.is_empty() {
            document.buffers.push(Buffer {
                uri: (!options.use_glb).then(|| file_name(&paths.main)),
                byte_length: layout.main.len(),
                extensions: None,
            });
        }
        if compressed {
            document.buffers.push(Buffer {
                uri: options.fallback.then(|| file_name(&paths.fallback)),
                byte_length: layout.fallback.len(),
                extensions: Some(BufferExtensions { compression: FallbackBuffer { fallback: true } }),
            });
        }

        document.buffer_views = layout.views;
        document.accessors = accessors.into_vec();
        document.extensions_used = extensions.used_names();
        document.extensions_required = extensions.required_names();

        report.animations = document.animations.len();
        report.cameras = document.cameras.len();
        report.images = document.images.len();

        debug!(
            buffer_views = document.buffer_views.len(),
            accessors = document.accessors.len(),
            "layout finalized"
        );
        info!(
            nodes = document.nodes.len(),
            meshes = document.meshes.len(),
            animations = report.animations,
            warnings = report.warnings.len(),
            bytes = layout.main.len(),
            "exported scene"
        );

        Ok(ExportedScene {
            document,
            main: layout.main,
            fallback: layout.fallback,
            report,
            paths,
            options: options.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_partial_json() {
        let options: GltfExportOptions = serde_json::from_str(r#"{"use_glb":true,"anim_freq":24}"#).unwrap();
        assert!(options.use_glb);
        assert_eq!(options.anim_freq, 24.0);
        assert_eq!(options.texture_quality, 50);
    }

    #[test]
    fn test_check_options() {
        let exporter = GltfExporter::new(GltfExportOptions { compress: true, ..Default::default() });
        assert!(matches!(exporter.check_options(), Err(ExportError::Config(_))));

        let exporter = GltfExporter::new(GltfExportOptions { anim_freq: 0.0, ..Default::default() });
        assert!(exporter.check_options().is_err());

        let exporter = GltfExporter::new(GltfExportOptions { texture_quality: 0, ..Default::default() });
        assert!(exporter.check_options().is_err());

        assert!(GltfExporter::new(GltfExportOptions::default()).check_options().is_ok());
    }

    #[test]
    fn test_empty_scene() {
        let exporter = GltfExporter::new(GltfExportOptions::default());
        let exported = exporter
            .export(&core::Scene::default(), &mut [], "in.gltf", "out.gltf")
            .unwrap();

        assert_eq!(exported.document.scene, Some(0));
        assert!(exported.document.scenes[0].nodes.is_empty());
        assert!(exported.document.buffers.is_empty());
        assert!(exported.report.warnings.is_empty());
    }

    #[test]
    fn test_glb_sizes() {
        let sizes = GlbSizes::new(5, 3).unwrap();
        assert_eq!(sizes, GlbSizes { json_chunk: 8, bin_chunk: Some(4), total: 40 });
        assert_eq!(GlbSizes::new(4, 0).unwrap().bin_chunk, None);

        let max = u32::MAX as usize;
        assert!(matches!(GlbSizes::new(max, 0), Err(ExportError::Io(_))));
        assert!(matches!(GlbSizes::new(16, max - 40), Err(ExportError::Io(_))));
        assert!(GlbSizes::new(16, max - 64).is_ok());
    }

    #[test]
    fn test_glb_layout() {
        let exporter = GltfExporter::new(GltfExportOptions { use_glb: true, ..Default::default() });
        let mut exported = exporter
            .export(&core::Scene::default(), &mut [], "in.gltf", "out.glb")
            .unwrap();
        exported.main = vec![1, 2, 3];

        let glb = exported.to_glb().unwrap();
        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(u32::from_le_bytes(glb[8..12].try_into().unwrap()) as usize, glb.len());
        assert_eq!(glb.len() % 4, 0);

        let json_len = u32::from_le_bytes(glb[12..16].try_into().unwrap()) as usize;
        let bin_header = 20 + json_len;
        assert_eq!(&glb[bin_header + 4..bin_header + 8], &0x004E4942u32.to_le_bytes());
        assert_eq!(&glb[bin_header + 8..], &[1, 2, 3, 0]);
    }
}
