//! Default values of elidable glTF fields
//!
//! A field is written only when its value differs from the entry here.

pub const BASE_COLOR_FACTOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
pub const DIFFUSE_FACTOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
pub const METALLIC_FACTOR: f32 = 1.0;
pub const ROUGHNESS_FACTOR: f32 = 1.0;
pub const SPECULAR_FACTOR: [f32; 3] = [1.0, 1.0, 1.0];
pub const GLOSSINESS_FACTOR: f32 = 1.0;
pub const EMISSIVE_FACTOR: [f32; 3] = [0.0, 0.0, 0.0];
pub const ALPHA_MODE: &str = "OPAQUE";
pub const ALPHA_CUTOFF: f32 = 0.5;
pub const DOUBLE_SIDED: bool = false;
pub const UNLIT: bool = false;
pub const NORMAL_SCALE: f32 = 1.0;
pub const OCCLUSION_STRENGTH: f32 = 1.0;

pub const LIGHT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
pub const LIGHT_INTENSITY: f32 = 1.0;
pub const LIGHT_RANGE: f32 = 0.0;
pub const SPOT_INNER_CONE_ANGLE: f32 = 0.0;
/// Outer cone angle used when a spot light leaves it unset
pub const SPOT_OUTER_CONE_ANGLE: f32 = std::f32::consts::FRAC_PI_4;

/// REPEAT
pub const SAMPLER_WRAP: u32 = 10497;

pub const TEXTURE_ROTATION: f32 = 0.0;

/// `Some(value)` when `value` differs from `default`
pub fn non_default<T: PartialEq>(value: T, default: T) -> Option<T> {
    if value == default {
        None
    } else {
        Some(value)
    }
}

/// `Some(value)` when set and non-zero
pub fn non_zero(value: Option<f32>) -> Option<f32> {
    value.filter(|v| *v != 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_default() {
        assert_eq!(non_default(0.5, ALPHA_CUTOFF), None);
        assert_eq!(non_default(0.25, ALPHA_CUTOFF), Some(0.25));
        assert_eq!(non_default([1.0; 4], BASE_COLOR_FACTOR), None);
    }

    #[test]
    fn test_non_zero() {
        assert_eq!(non_zero(None), None);
        assert_eq!(non_zero(Some(0.0)), None);
        assert_eq!(non_zero(Some(100.0)), Some(100.0));
    }
}
