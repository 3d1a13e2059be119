//! Extension usage registry
//!
//! Emitters mark the extensions they rely on while the scene is walked; the
//! document's `extensionsUsed` and `extensionsRequired` lists are read back
//! from the registry once at the end, in a fixed order.

/// Extensions the exporter can emit, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    MeshQuantization,
    MeshoptCompression,
    TextureTransform,
    SpecularGlossiness,
    Unlit,
    LightsPunctual,
    TextureBasisu,
}

impl Extension {
    pub const ALL: [Extension; 7] = [
        Extension::MeshQuantization,
        Extension::MeshoptCompression,
        Extension::TextureTransform,
        Extension::SpecularGlossiness,
        Extension::Unlit,
        Extension::LightsPunctual,
        Extension::TextureBasisu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Extension::MeshQuantization => "KHR_mesh_quantization",
            Extension::MeshoptCompression => "MESHOPT_compression",
            Extension::TextureTransform => "KHR_texture_transform",
            Extension::SpecularGlossiness => "KHR_materials_pbrSpecularGlossiness",
            Extension::Unlit => "KHR_materials_unlit",
            Extension::LightsPunctual => "KHR_lights_punctual",
            Extension::TextureBasisu => "KHR_texture_basisu",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub used: bool,
    pub required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    entries: [ExtensionInfo; 7],
}

impl ExtensionRegistry {
    /// Record a use; `required` sticks once any use requires the extension
    pub fn mark(&mut self, extension: Extension, required: bool) {
        let entry = &mut self.entries[extension as usize];
        entry.used = true;
        entry.required |= required;
    }

    pub fn info(&self, extension: Extension) -> ExtensionInfo {
        self.entries[extension as usize]
    }

    pub fn used_names(&self) -> Vec<String> {
        self.names(|info| info.used)
    }

    pub fn required_names(&self) -> Vec<String> {
        self.names(|info| info.used && info.required)
    }

    fn names(&self, filter: impl Fn(&ExtensionInfo) -> bool) -> Vec<String> {
        Extension::ALL
            .iter()
            .filter(|ext| filter(&self.entries[**ext as usize]))
            .map(|ext| ext.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_and_requirement() {
        let mut registry = ExtensionRegistry::default();
        registry.mark(Extension::LightsPunctual, false);
        registry.mark(Extension::MeshQuantization, true);
        registry.mark(Extension::TextureTransform, false);
        registry.mark(Extension::TextureTransform, true);
        registry.mark(Extension::TextureTransform, false);

        assert_eq!(
            registry.used_names(),
            vec!["KHR_mesh_quantization", "KHR_texture_transform", "KHR_lights_punctual"]
        );
        assert_eq!(
            registry.required_names(),
            vec!["KHR_mesh_quantization", "KHR_texture_transform"]
        );
        assert!(!registry.info(Extension::Unlit).used);
    }
}
