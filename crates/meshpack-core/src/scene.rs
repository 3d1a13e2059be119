//! In-memory scene model
//!
//! The scene is what the upstream loader and optimization stages hand to the
//! exporter. Entities are stored in dense vectors and reference each other by
//! typed id. Every field has a serde default matching the glTF default, so a
//! partially specified scene deserializes into a fully defined one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result, ResultExt};
use crate::types::*;

/// Complete scene handed to the exporter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub samplers: Vec<Sampler>,
    pub images: Vec<Image>,
    pub skins: Vec<Skin>,
    pub animations: Vec<Animation>,
    pub cameras: Vec<Camera>,
    pub lights: Vec<Light>,
    /// Parameters the upstream quantizer used, if geometry was quantized
    pub quantization: Option<Quantization>,
    pub extras: Option<Value>,
}

/// Scene graph node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub name: Option<String>,
    pub children: Vec<NodeId>,
    pub translation: Option<[f32; 3]>,
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub matrix: Option<[f32; 16]>,
    pub camera: Option<CameraId>,
    pub light: Option<LightId>,
    /// Default morph target weights for meshes attached to this node
    pub weights: Vec<f32>,
    pub extras: Option<Value>,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    /// Numeric mode in the output document
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

/// One vertex attribute stream; every element is stored as four floats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub kind: AttributeKind,
    /// Attribute set, e.g. 1 for `TEXCOORD_1`
    #[serde(default)]
    pub index: u32,
    /// 0 for base geometry, `n` for morph target `n - 1`
    #[serde(default)]
    pub target: u32,
    pub data: Vec<[f32; 4]>,
}

/// Processed mesh, serialized as one mesh with a single primitive
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Mesh {
    pub name: Option<String>,
    /// Node the mesh instance is parented to; `None` places it at the scene root
    pub node: Option<NodeId>,
    pub skin: Option<SkinId>,
    pub material: Option<MaterialId>,
    pub mode: PrimitiveMode,
    pub streams: Vec<Stream>,
    pub indices: Vec<u32>,
    /// Number of morph targets
    pub targets: usize,
    pub target_weights: Vec<f32>,
    pub extras: Option<Value>,
}

/// Alpha blending mode of a material
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

/// Reference from a material slot to a texture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureView {
    pub texture: TextureId,
    #[serde(default)]
    pub texcoord: u32,
    #[serde(default)]
    pub transform: Option<TextureTransform>,
    /// Normal map scale or occlusion strength, depending on the slot
    #[serde(default = "one")]
    pub scale: f32,
}

impl TextureView {
    /// Plain reference with default coordinates and no transform
    pub fn new(texture: TextureId) -> Self {
        Self {
            texture,
            texcoord: 0,
            transform: None,
            scale: 1.0,
        }
    }
}

fn one() -> f32 {
    1.0
}

/// Metallic-roughness PBR parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PbrMetallicRoughness {
    pub base_color_factor: [f32; 4],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureView>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureView>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
        }
    }
}

/// Specular-glossiness PBR parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PbrSpecularGlossiness {
    pub diffuse_factor: [f32; 4],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffuse_texture: Option<TextureView>,
    pub specular_factor: [f32; 3],
    pub glossiness_factor: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specular_glossiness_texture: Option<TextureView>,
}

impl Default for PbrSpecularGlossiness {
    fn default() -> Self {
        Self {
            diffuse_factor: [1.0; 4],
            diffuse_texture: None,
            specular_factor: [1.0; 3],
            glossiness_factor: 1.0,
            specular_glossiness_texture: None,
        }
    }
}

/// Surface material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub name: Option<String>,
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    pub pbr_specular_glossiness: Option<PbrSpecularGlossiness>,
    pub normal_texture: Option<TextureView>,
    pub occlusion_texture: Option<TextureView>,
    pub emissive_texture: Option<TextureView>,
    pub emissive_factor: [f32; 3],
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    pub unlit: bool,
    pub extras: Option<Value>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            pbr_metallic_roughness: None,
            pbr_specular_glossiness: None,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: [0.0; 3],
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            unlit: false,
            extras: None,
        }
    }
}

impl Material {
    /// Every texture slot in use, in emission order
    pub fn texture_refs(&self) -> impl Iterator<Item = &TextureView> {
        let pbr = self.pbr_metallic_roughness.as_ref();
        let sg = self.pbr_specular_glossiness.as_ref();

        pbr.and_then(|p| p.base_color_texture.as_ref())
            .into_iter()
            .chain(pbr.and_then(|p| p.metallic_roughness_texture.as_ref()))
            .chain(self.normal_texture.as_ref())
            .chain(self.occlusion_texture.as_ref())
            .chain(self.emissive_texture.as_ref())
            .chain(sg.and_then(|s| s.diffuse_texture.as_ref()))
            .chain(sg.and_then(|s| s.specular_glossiness_texture.as_ref()))
    }
}

/// Texture: an image plus sampling state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Texture {
    pub image: Option<ImageId>,
    pub sampler: Option<SamplerId>,
}

/// Texture sampling state; numeric values follow the glTF enumerations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sampler {
    pub mag_filter: Option<u32>,
    pub min_filter: Option<u32>,
    pub wrap_s: u32,
    pub wrap_t: u32,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            mag_filter: None,
            min_filter: None,
            wrap_s: 10497,
            wrap_t: 10497,
        }
    }
}

/// Image source as loaded from the input document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub name: Option<String>,
    /// External reference or `data:` URI
    pub uri: Option<String>,
    pub mime_type: Option<String>,
    /// Raw bytes the loader found in a buffer view
    pub data: Option<Vec<u8>>,
    /// Image is sampled as a normal map somewhere in the scene
    pub normal_map: bool,
    /// Image holds color data
    pub srgb: bool,
}

/// Skeleton binding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Skin {
    pub name: Option<String>,
    pub joints: Vec<NodeId>,
    /// Column-major matrices, one per joint
    pub inverse_bind_matrices: Option<Vec<[f32; 16]>>,
    pub skeleton: Option<NodeId>,
}

/// Resampled animation track of one node property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub node: NodeId,
    pub path: AnimationPath,
    /// Keyframe rows; `components` rows per keyframe
    pub data: Vec<[f32; 4]>,
    /// Rows per keyframe: morph target count for weights, 1 otherwise
    #[serde(default = "one_component")]
    pub components: usize,
}

fn one_component() -> usize {
    1
}

impl Track {
    /// A track with a single keyframe
    pub fn is_constant(&self) -> bool {
        self.data.len() == self.components
    }
}

/// Animation resampled at a fixed frequency
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Animation {
    pub name: Option<String>,
    /// Time of the first frame, in seconds
    pub start: f32,
    /// Number of frames in time-varying tracks
    pub frames: usize,
    pub tracks: Vec<Track>,
}

/// Camera projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraKind {
    Perspective {
        yfov: f32,
        znear: f32,
        #[serde(default)]
        aspect_ratio: Option<f32>,
        #[serde(default)]
        zfar: Option<f32>,
    },
    Orthographic {
        xmag: f32,
        ymag: f32,
        znear: f32,
        zfar: f32,
    },
    /// Projection the loader did not recognize
    #[serde(other)]
    Unknown,
}

/// Camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: CameraKind,
}

/// Punctual light type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LightKind {
    Directional,
    Point,
    Spot {
        #[serde(default)]
        inner_cone_angle: f32,
        /// Zero or absent means unset
        #[serde(default)]
        outer_cone_angle: Option<f32>,
    },
}

/// Punctual light (`KHR_lights_punctual`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: LightKind,
    #[serde(default = "white")]
    pub color: [f32; 3],
    #[serde(default = "one")]
    pub intensity: f32,
    #[serde(default)]
    pub range: Option<f32>,
}

fn white() -> [f32; 3] {
    [1.0; 3]
}

impl Light {
    /// A light of the given kind with every optional field at its default
    pub fn new(kind: LightKind) -> Self {
        Self {
            name: None,
            kind,
            color: white(),
            intensity: 1.0,
            range: None,
        }
    }
}

fn check(kind: &'static str, index: usize, count: usize) -> Result<()> {
    if index < count {
        Ok(())
    } else {
        Err(Error::InvalidReference { kind, index, count })
    }
}

impl Scene {
    /// Check that every id in the scene refers to an existing entity
    pub fn validate(&self) -> Result<()> {
        let nodes = self.nodes.len();

        for (i, node) in self.nodes.iter().enumerate() {
            (|| {
                for child in &node.children {
                    check(NodeId::KIND, child.index(), nodes)?;
                }
                if let Some(camera) = node.camera {
                    check(CameraId::KIND, camera.index(), self.cameras.len())?;
                }
                if let Some(light) = node.light {
                    check(LightId::KIND, light.index(), self.lights.len())?;
                }
                Ok(())
            })()
            .with_context(|| format!("node {i}"))?;
        }

        for (i, mesh) in self.meshes.iter().enumerate() {
            (|| {
                if let Some(node) = mesh.node {
                    check(NodeId::KIND, node.index(), nodes)?;
                }
                if let Some(skin) = mesh.skin {
                    check(SkinId::KIND, skin.index(), self.skins.len())?;
                }
                if let Some(material) = mesh.material {
                    check(MaterialId::KIND, material.index(), self.materials.len())?;
                }
                for stream in &mesh.streams {
                    if stream.target as usize > mesh.targets {
                        return Err(Error::invalid_data(format!(
                            "stream targets morph target {} of {}",
                            stream.target, mesh.targets
                        )));
                    }
                }
                Ok(())
            })()
            .with_context(|| format!("mesh {i}"))?;
        }

        for (i, material) in self.materials.iter().enumerate() {
            for view in material.texture_refs() {
                check(TextureId::KIND, view.texture.index(), self.textures.len())
                    .with_context(|| format!("material {i}"))?;
            }
        }

        for (i, texture) in self.textures.iter().enumerate() {
            (|| {
                if let Some(image) = texture.image {
                    check(ImageId::KIND, image.index(), self.images.len())?;
                }
                if let Some(sampler) = texture.sampler {
                    check(SamplerId::KIND, sampler.index(), self.samplers.len())?;
                }
                Ok(())
            })()
            .with_context(|| format!("texture {i}"))?;
        }

        for (i, skin) in self.skins.iter().enumerate() {
            (|| {
                for joint in skin.joints.iter().chain(skin.skeleton.iter()) {
                    check(NodeId::KIND, joint.index(), nodes)?;
                }
                if let Some(matrices) = &skin.inverse_bind_matrices {
                    if matrices.len() != skin.joints.len() {
                        return Err(Error::invalid_data(format!(
                            "{} inverse bind matrices for {} joints",
                            matrices.len(),
                            skin.joints.len()
                        )));
                    }
                }
                Ok(())
            })()
            .with_context(|| format!("skin {i}"))?;
        }

        for (i, animation) in self.animations.iter().enumerate() {
            for (t, track) in animation.tracks.iter().enumerate() {
                (|| {
                    check(NodeId::KIND, track.node.index(), nodes)?;
                    check_samples(track, animation.frames)
                })()
                .with_context(|| format!("animation {i} track {t}"))?;
            }
        }

        if let Some(quantization) = &self.quantization {
            check_bits("position", quantization.position.bits)?;
            check_bits("texture", quantization.texture.bits)?;
        }

        Ok(())
    }
}

/// Bit depths a quantized stream can be stored with
pub const QUANTIZATION_BITS: std::ops::RangeInclusive<u32> = 1..=16;

fn check_bits(stream: &str, bits: u32) -> Result<()> {
    if QUANTIZATION_BITS.contains(&bits) {
        Ok(())
    } else {
        Err(Error::invalid_data(format!(
            "{stream} quantization uses {bits} bits, expected {}..={}",
            QUANTIZATION_BITS.start(),
            QUANTIZATION_BITS.end()
        )))
    }
}

/// A track holds either one pose (`components` rows) or `frames * components` rows
fn check_samples(track: &Track, frames: usize) -> Result<()> {
    if track.components == 0 {
        return Err(Error::invalid_data("track has 0 components"));
    }
    if track.is_constant() {
        return Ok(());
    }

    let expected = frames * track.components;
    if frames == 0 || track.data.len() != expected {
        return Err(Error::invalid_data(format!(
            "{} samples for {frames} frames of {} components",
            track.data.len(),
            track.components
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_material_gets_defaults() {
        let material: Material = serde_json::from_str(r#"{"double_sided":true}"#).unwrap();
        assert!(material.double_sided);
        assert_eq!(material.alpha_cutoff, 0.5);
        assert_eq!(material.alpha_mode, AlphaMode::Opaque);
        assert_eq!(material.emissive_factor, [0.0; 3]);
    }

    #[test]
    fn test_camera_kinds_deserialize() {
        let camera: Camera =
            serde_json::from_str(r#"{"type":"perspective","yfov":0.8,"znear":0.1}"#).unwrap();
        assert!(matches!(camera.kind, CameraKind::Perspective { zfar: None, .. }));

        let camera: Camera = serde_json::from_str(r#"{"type":"fisheye"}"#).unwrap();
        assert_eq!(camera.kind, CameraKind::Unknown);
    }

    #[test]
    fn test_light_defaults() {
        let light: Light = serde_json::from_str(r#"{"type":"spot"}"#).unwrap();
        assert_eq!(light.color, [1.0; 3]);
        assert_eq!(light.intensity, 1.0);
        assert_eq!(
            light.kind,
            LightKind::Spot { inner_cone_angle: 0.0, outer_cone_angle: None }
        );
    }

    #[test]
    fn test_track_constant() {
        let track = Track {
            node: NodeId(0),
            path: AnimationPath::Weights,
            data: vec![[0.0; 4]; 2],
            components: 2,
        };
        assert!(track.is_constant());
    }

    #[test]
    fn test_validate_reports_dangling_child() {
        let scene = Scene {
            nodes: vec![Node {
                children: vec![NodeId(5)],
                ..Default::default()
            }],
            ..Default::default()
        };

        let err = scene.validate().unwrap_err();
        assert!(err.is_invalid_reference());
        assert!(err.to_string().contains("node 0"));
    }

    #[test]
    fn test_validate_checks_bind_matrix_count() {
        let scene = Scene {
            nodes: vec![Node::default(), Node::default()],
            skins: vec![Skin {
                joints: vec![NodeId(0), NodeId(1)],
                inverse_bind_matrices: Some(vec![[0.0; 16]]),
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(scene.validate().is_err());
    }

    fn quantized(position_bits: u32, texture_bits: u32) -> Scene {
        Scene {
            quantization: Some(Quantization {
                position: QuantizationPosition { offset: [0.0; 3], scale: 1.0, bits: position_bits },
                texture: QuantizationTexture { offset: [0.0; 2], scale: [1.0; 2], bits: texture_bits },
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_quantization_bits() {
        assert!(quantized(14, 12).validate().is_ok());
        assert!(quantized(1, 16).validate().is_ok());

        for bits in [0, 17, 32] {
            let err = quantized(bits, 12).validate().unwrap_err();
            assert!(err.is_invalid_data(), "position bits {bits}");
            assert!(err.to_string().contains("position"));

            assert!(quantized(14, bits).validate().unwrap_err().is_invalid_data(), "texture bits {bits}");
        }
    }

    #[test]
    fn test_validate_track_samples() {
        let track = |rows: usize, components: usize| Track {
            node: NodeId(0),
            path: AnimationPath::Weights,
            data: vec![[0.0; 4]; rows],
            components,
        };
        let scene = |frames: usize, track: Track| Scene {
            nodes: vec![Node::default()],
            animations: vec![Animation { frames, tracks: vec![track], ..Default::default() }],
            ..Default::default()
        };

        assert!(scene(4, track(8, 2)).validate().is_ok());
        assert!(scene(0, track(2, 2)).validate().is_ok());

        let err = scene(4, track(6, 2)).validate().unwrap_err();
        assert!(err.is_invalid_data());
        assert!(err.to_string().contains("animation 0 track 0"));

        assert!(scene(0, track(0, 1)).validate().is_err());
        assert!(scene(3, track(3, 0)).validate().is_err());
    }

    #[test]
    fn test_texture_refs_order() {
        let material = Material {
            pbr_metallic_roughness: Some(PbrMetallicRoughness {
                base_color_texture: Some(TextureView::new(TextureId(2))),
                ..Default::default()
            }),
            normal_texture: Some(TextureView::new(TextureId(0))),
            ..Default::default()
        };

        let ids: Vec<_> = material.texture_refs().map(|t| t.texture.index()).collect();
        assert_eq!(ids, vec![2, 0]);
    }
}
