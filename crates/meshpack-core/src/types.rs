//! Common types used across meshpack
//!
//! This module provides the typed identifiers and the small value types
//! shared by the scene model and the exporter.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub usize);

        impl $name {
            /// Human readable entity kind, used in error messages
            pub const KIND: &'static str = $label;

            /// Create a new identifier
            pub fn new(index: usize) -> Self {
                Self(index)
            }

            /// Get the raw index value
            pub fn index(&self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} {}", $label, self.0)
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Index of a node in [`Scene::nodes`](crate::Scene)
    NodeId, "node"
);
define_id!(
    /// Index of a mesh in [`Scene::meshes`](crate::Scene)
    MeshId, "mesh"
);
define_id!(
    /// Index of a material in [`Scene::materials`](crate::Scene)
    MaterialId, "material"
);
define_id!(
    /// Index of a texture in [`Scene::textures`](crate::Scene)
    TextureId, "texture"
);
define_id!(
    /// Index of a sampler in [`Scene::samplers`](crate::Scene)
    SamplerId, "sampler"
);
define_id!(
    /// Index of an image in [`Scene::images`](crate::Scene)
    ImageId, "image"
);
define_id!(
    /// Index of a skin in [`Scene::skins`](crate::Scene)
    SkinId, "skin"
);
define_id!(
    /// Index of a camera in [`Scene::cameras`](crate::Scene)
    CameraId, "camera"
);
define_id!(
    /// Index of a light in [`Scene::lights`](crate::Scene)
    LightId, "light"
);

/// Semantic of a vertex stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Position,
    Normal,
    Tangent,
    Texcoord,
    Color,
    Joints,
    Weights,
    /// Application specific attribute, written as `_ATTRIBUTE_<index>`
    Custom,
}

impl AttributeKind {
    /// Attribute name prefix in the output document
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::Position => "POSITION",
            AttributeKind::Normal => "NORMAL",
            AttributeKind::Tangent => "TANGENT",
            AttributeKind::Texcoord => "TEXCOORD",
            AttributeKind::Color => "COLOR",
            AttributeKind::Joints => "JOINTS",
            AttributeKind::Weights => "WEIGHTS",
            AttributeKind::Custom => "_ATTRIBUTE",
        }
    }

    /// Whether the attribute name carries a `_<set>` suffix
    pub fn is_indexed(&self) -> bool {
        !matches!(
            self,
            AttributeKind::Position | AttributeKind::Normal | AttributeKind::Tangent
        )
    }

    /// Stable discriminant, used to classify vertex buffer views
    pub fn discriminant(&self) -> i32 {
        *self as i32
    }
}

/// Node property driven by an animation track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

impl AnimationPath {
    /// All paths, in discriminant order
    pub const ALL: [AnimationPath; 4] = [
        AnimationPath::Translation,
        AnimationPath::Rotation,
        AnimationPath::Scale,
        AnimationPath::Weights,
    ];

    /// Path name in the output document
    pub fn name(&self) -> &'static str {
        match self {
            AnimationPath::Translation => "translation",
            AnimationPath::Rotation => "rotation",
            AnimationPath::Scale => "scale",
            AnimationPath::Weights => "weights",
        }
    }

    /// Bit of this path in [`NodeInfo::animated_paths`]
    pub fn bit(&self) -> u8 {
        1 << (*self as u8)
    }

    /// Stable discriminant, used to classify keyframe buffer views
    pub fn discriminant(&self) -> i32 {
        *self as i32
    }
}

/// Per-node retention decision produced before serialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Whether the node survives into the output
    pub keep: bool,
    /// Output index of the node; only meaningful when `keep` is set
    pub remap: usize,
    /// Bitmask of [`AnimationPath::bit`] values animated away from the rest pose
    pub animated_paths: u8,
    /// Output indices of the mesh-instance nodes parented to this node
    #[serde(default)]
    pub meshes: Vec<usize>,
}

impl NodeInfo {
    /// A kept node with the given output index
    pub fn kept(remap: usize) -> Self {
        Self {
            keep: true,
            remap,
            ..Default::default()
        }
    }

    /// A dropped node
    pub fn dropped() -> Self {
        Self::default()
    }

    /// Whether the given path is animated on this node
    pub fn is_animated(&self, path: AnimationPath) -> bool {
        self.animated_paths & path.bit() != 0
    }
}

/// UV transform attached to a texture reference (`KHR_texture_transform`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureTransform {
    pub offset: [f32; 2],
    pub scale: [f32; 2],
    pub rotation: f32,
}

impl TextureTransform {
    pub const IDENTITY: Self = Self {
        offset: [0.0, 0.0],
        scale: [1.0, 1.0],
        rotation: 0.0,
    };
}

impl Default for TextureTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Mapping of positions to fixed-point integers chosen upstream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationPosition {
    pub offset: [f32; 3],
    pub scale: f32,
    pub bits: u32,
}

impl QuantizationPosition {
    /// Largest representable quantized value, `2^bits - 1`
    pub fn max_value(&self) -> f32 {
        ((1u32 << self.bits) - 1) as f32
    }

    /// Uniform scale that maps quantized integers back to model space
    pub fn node_scale(&self) -> f32 {
        self.scale / self.max_value()
    }
}

/// Mapping of texture coordinates to fixed-point integers chosen upstream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationTexture {
    pub offset: [f32; 2],
    pub scale: [f32; 2],
    pub bits: u32,
}

impl QuantizationTexture {
    /// Largest representable quantized value, `2^bits - 1`
    pub fn max_value(&self) -> f32 {
        ((1u32 << self.bits) - 1) as f32
    }
}

/// Quantization parameters applied to the whole scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantization {
    pub position: QuantizationPosition,
    pub texture: QuantizationTexture,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(NodeId::new(3).to_string(), "node 3");
        assert_eq!(ImageId::from(0).index(), 0);
        assert_eq!(SkinId::KIND, "skin");
    }

    #[test]
    fn test_id_serializes_as_number() {
        let json = serde_json::to_string(&MaterialId(12)).unwrap();
        assert_eq!(json, "12");
    }

    #[test]
    fn test_animation_path_bits() {
        let mut mask = 0u8;
        for path in AnimationPath::ALL {
            assert_eq!(mask & path.bit(), 0);
            mask |= path.bit();
        }
        assert_eq!(mask, 0b1111);

        let info = NodeInfo {
            animated_paths: AnimationPath::Rotation.bit(),
            ..NodeInfo::kept(0)
        };
        assert!(info.is_animated(AnimationPath::Rotation));
        assert!(!info.is_animated(AnimationPath::Translation));
    }

    #[test]
    fn test_attribute_names() {
        assert_eq!(AttributeKind::Position.name(), "POSITION");
        assert!(!AttributeKind::Tangent.is_indexed());
        assert!(AttributeKind::Texcoord.is_indexed());
    }

    #[test]
    fn test_quantization_node_scale() {
        let qp = QuantizationPosition { offset: [0.0; 3], scale: 2.0, bits: 14 };
        assert_eq!(qp.max_value(), 16383.0);
        assert_eq!(qp.node_scale(), 2.0 / 16383.0);
    }

    #[test]
    fn test_texture_transform_defaults() {
        let parsed: TextureTransform = serde_json::from_str(r#"{"rotation":0.5}"#).unwrap();
        assert_eq!(parsed.offset, [0.0, 0.0]);
        assert_eq!(parsed.scale, [1.0, 1.0]);
        assert_eq!(parsed.rotation, 0.5);
    }
}
