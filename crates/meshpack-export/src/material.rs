//! Material, texture and sampler emitters
//!
//! Every field is compared against [`defaults`] and written only when it
//! differs, so an all-default material comes out as `{}`.

use meshpack_core as core;
use meshpack_core::{AlphaMode, QuantizationTexture, TextureView};

use crate::extensions::{Extension, ExtensionRegistry};
use crate::gltf::defaults::{self, non_default};
use crate::gltf::{
    BasisuSource, Material, MaterialExtensions, PbrMetallicRoughness, Sampler,
    SpecularGlossiness, Texture, TextureExtensions, TextureInfo, TextureInfoExtensions,
    TextureTransform, Unlit,
};
use crate::quantize::compose_texture_transform;

/// Which material slot a texture reference fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Plain,
    Normal,
    Occlusion,
}

/// Emits materials, folding texture quantization into every reference
pub struct MaterialEmitter<'a> {
    qt: Option<&'a QuantizationTexture>,
    keep_extras: bool,
    extensions: &'a mut ExtensionRegistry,
}

impl<'a> MaterialEmitter<'a> {
    pub fn new(
        qt: Option<&'a QuantizationTexture>,
        keep_extras: bool,
        extensions: &'a mut ExtensionRegistry,
    ) -> Self {
        Self { qt, keep_extras, extensions }
    }

    fn texture_info(&mut self, view: &TextureView, slot: Slot) -> TextureInfo {
        let extensions = compose_texture_transform(view.transform.as_ref(), self.qt).map(|t| {
            self.extensions
                .mark(Extension::TextureTransform, self.qt.is_some());
            TextureInfoExtensions {
                texture_transform: TextureTransform {
                    offset: t.offset,
                    scale: t.scale,
                    rotation: non_default(t.rotation, defaults::TEXTURE_ROTATION),
                },
            }
        });

        TextureInfo {
            index: view.texture.index(),
            tex_coord: view.texcoord,
            scale: match slot {
                Slot::Normal => non_default(view.scale, defaults::NORMAL_SCALE),
                _ => None,
            },
            strength: match slot {
                Slot::Occlusion => non_default(view.scale, defaults::OCCLUSION_STRENGTH),
                _ => None,
            },
            extensions,
        }
    }

    fn optional_info(&mut self, view: Option<&TextureView>, slot: Slot) -> Option<TextureInfo> {
        view.map(|v| self.texture_info(v, slot))
    }

    /// Emit one material
    pub fn emit(&mut self, material: &core::Material) -> Material {
        let pbr = material.pbr_metallic_roughness.as_ref().map(|pbr| PbrMetallicRoughness {
            base_color_factor: non_default(pbr.base_color_factor, defaults::BASE_COLOR_FACTOR),
            base_color_texture: self.optional_info(pbr.base_color_texture.as_ref(), Slot::Plain),
            metallic_factor: non_default(pbr.metallic_factor, defaults::METALLIC_FACTOR),
            roughness_factor: non_default(pbr.roughness_factor, defaults::ROUGHNESS_FACTOR),
            metallic_roughness_texture: self
                .optional_info(pbr.metallic_roughness_texture.as_ref(), Slot::Plain),
        });

        let mut out = Material {
            name: material.name.clone().filter(|n| !n.is_empty()),
            pbr_metallic_roughness: pbr.filter(|p| !p.is_empty()),
            normal_texture: self.optional_info(material.normal_texture.as_ref(), Slot::Normal),
            occlusion_texture: self.optional_info(material.occlusion_texture.as_ref(), Slot::Occlusion),
            emissive_texture: self.optional_info(material.emissive_texture.as_ref(), Slot::Plain),
            emissive_factor: non_default(material.emissive_factor, defaults::EMISSIVE_FACTOR),
            alpha_mode: non_default(alpha_mode_name(material.alpha_mode), defaults::ALPHA_MODE)
                .map(str::to_string),
            alpha_cutoff: non_default(material.alpha_cutoff, defaults::ALPHA_CUTOFF),
            double_sided: non_default(material.double_sided, defaults::DOUBLE_SIDED),
            extensions: None,
            extras: material.extras.clone().filter(|_| self.keep_extras),
        };

        let mut extensions = MaterialExtensions::default();

        if let Some(sg) = &material.pbr_specular_glossiness {
            self.extensions.mark(Extension::SpecularGlossiness, false);
            extensions.specular_glossiness = Some(SpecularGlossiness {
                diffuse_texture: self.optional_info(sg.diffuse_texture.as_ref(), Slot::Plain),
                specular_glossiness_texture: self
                    .optional_info(sg.specular_glossiness_texture.as_ref(), Slot::Plain),
                diffuse_factor: non_default(sg.diffuse_factor, defaults::DIFFUSE_FACTOR),
                specular_factor: non_default(sg.specular_factor, defaults::SPECULAR_FACTOR),
                glossiness_factor: non_default(sg.glossiness_factor, defaults::GLOSSINESS_FACTOR),
            });
        }

        if non_default(material.unlit, defaults::UNLIT).is_some() {
            self.extensions.mark(Extension::Unlit, false);
            extensions.unlit = Some(Unlit {});
        }

        if extensions != MaterialExtensions::default() {
            out.extensions = Some(extensions);
        }

        out
    }
}

fn alpha_mode_name(mode: AlphaMode) -> &'static str {
    match mode {
        AlphaMode::Opaque => "OPAQUE",
        AlphaMode::Mask => "MASK",
        AlphaMode::Blend => "BLEND",
    }
}

/// Emit a texture; `image_remap` maps scene images to written images
pub fn emit_texture(
    texture: &core::Texture,
    image_remap: &[Option<usize>],
    ktx2: bool,
    extensions: &mut ExtensionRegistry,
) -> Texture {
    let source = texture
        .image
        .and_then(|image| image_remap.get(image.index()).copied().flatten());

    let mut out = Texture {
        sampler: texture.sampler.map(|s| s.index()),
        ..Default::default()
    };

    match source {
        Some(source) if ktx2 => {
            extensions.mark(Extension::TextureBasisu, true);
            out.extensions = Some(TextureExtensions { basisu: BasisuSource { source } });
        }
        Some(source) => out.source = Some(source),
        None => {}
    }

    out
}

/// Emit a sampler
pub fn emit_sampler(sampler: &core::Sampler) -> Sampler {
    Sampler {
        mag_filter: sampler.mag_filter,
        min_filter: sampler.min_filter,
        wrap_s: non_default(sampler.wrap_s, defaults::SAMPLER_WRAP),
        wrap_t: non_default(sampler.wrap_t, defaults::SAMPLER_WRAP),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshpack_core::{ImageId, PbrMetallicRoughness as CorePbr, TextureId};
    use serde_json::json;

    fn emit(material: &core::Material, qt: Option<&QuantizationTexture>) -> (serde_json::Value, ExtensionRegistry) {
        let mut registry = ExtensionRegistry::default();
        let out = MaterialEmitter::new(qt, false, &mut registry).emit(material);
        (serde_json::to_value(out).unwrap(), registry)
    }

    #[test]
    fn test_default_material_is_empty() {
        let (value, registry) = emit(&core::Material::default(), None);
        assert_eq!(value, json!({}));
        assert!(registry.used_names().is_empty());
    }

    #[test]
    fn test_single_field_changes_single_key() {
        let cases = [
            (core::Material { alpha_cutoff: 0.3, ..Default::default() }, "alphaCutoff"),
            (core::Material { double_sided: true, ..Default::default() }, "doubleSided"),
            (core::Material { alpha_mode: AlphaMode::Blend, ..Default::default() }, "alphaMode"),
            (core::Material { emissive_factor: [1.0, 0.0, 0.0], ..Default::default() }, "emissiveFactor"),
            (core::Material { unlit: true, ..Default::default() }, "extensions"),
        ];

        for (material, key) in cases {
            let (value, _) = emit(&material, None);
            let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
            assert_eq!(keys, vec![key.to_string()]);
        }
    }

    #[test]
    fn test_default_pbr_block_is_elided() {
        let material = core::Material {
            pbr_metallic_roughness: Some(CorePbr::default()),
            ..Default::default()
        };
        assert_eq!(emit(&material, None).0, json!({}));

        let material = core::Material {
            pbr_metallic_roughness: Some(CorePbr { metallic_factor: 0.0, ..Default::default() }),
            ..Default::default()
        };
        assert_eq!(
            emit(&material, None).0,
            json!({"pbrMetallicRoughness": {"metallicFactor": 0.0}})
        );
    }

    #[test]
    fn test_quantized_texture_reference() {
        let qt = QuantizationTexture { offset: [0.1, 0.2], scale: [2.0, 2.0], bits: 8 };
        let material = core::Material {
            normal_texture: Some(TextureView { scale: 0.5, ..TextureView::new(TextureId(1)) }),
            ..Default::default()
        };

        let (value, registry) = emit(&material, Some(&qt));
        let normal = &value["normalTexture"];
        assert_eq!(normal["index"], 1);
        assert_eq!(normal["texCoord"], 0);
        assert_eq!(normal["scale"], 0.5);

        let transform = &normal["extensions"]["KHR_texture_transform"];
        assert_eq!(transform["offset"], json!([0.1f32, 0.2f32]));
        assert_eq!(transform["scale"], json!([2.0f32 / 255.0, 2.0f32 / 255.0]));
        assert!(transform.get("rotation").is_none());
        assert_eq!(registry.required_names(), vec!["KHR_texture_transform".to_string()]);
    }

    #[test]
    fn test_unquantized_transform_is_optional() {
        let material = core::Material {
            emissive_texture: Some(TextureView {
                transform: Some(meshpack_core::TextureTransform { rotation: 1.0, ..Default::default() }),
                ..TextureView::new(TextureId(0))
            }),
            ..Default::default()
        };

        let (value, registry) = emit(&material, None);
        assert_eq!(value["emissiveTexture"]["extensions"]["KHR_texture_transform"]["rotation"], 1.0);
        assert_eq!(registry.used_names(), vec!["KHR_texture_transform".to_string()]);
        assert!(registry.required_names().is_empty());
    }

    #[test]
    fn test_texture_source_and_basisu() {
        let texture = core::Texture { image: Some(ImageId(1)), sampler: None };
        let remap = [Some(0), None];
        let mut registry = ExtensionRegistry::default();

        let plain = emit_texture(&texture, &[None, Some(4)], false, &mut registry);
        assert_eq!(plain.source, Some(4));

        let omitted = emit_texture(&texture, &remap, false, &mut registry);
        assert_eq!(serde_json::to_value(omitted).unwrap(), json!({}));

        let basisu = emit_texture(&texture, &[None, Some(2)], true, &mut registry);
        assert_eq!(
            serde_json::to_value(basisu).unwrap(),
            json!({"extensions": {"KHR_texture_basisu": {"source": 2}}})
        );
        assert_eq!(registry.required_names(), vec!["KHR_texture_basisu".to_string()]);
    }

    #[test]
    fn test_sampler_defaults() {
        assert_eq!(serde_json::to_value(emit_sampler(&core::Sampler::default())).unwrap(), json!({}));

        let clamp = core::Sampler { wrap_s: 33071, mag_filter: Some(9729), ..Default::default() };
        assert_eq!(
            serde_json::to_value(emit_sampler(&clamp)).unwrap(),
            json!({"magFilter": 9729, "wrapS": 33071})
        );
    }
}
