//! Punctual light emitter (`KHR_lights_punctual`)

use meshpack_core as core;
use meshpack_core::LightKind;

use crate::gltf::defaults::{self, non_default, non_zero};
use crate::gltf::{Light, Spot};

pub fn emit_light(light: &core::Light) -> Light {
    let (light_type, spot) = match light.kind {
        LightKind::Directional => ("directional", None),
        LightKind::Point => ("point", None),
        LightKind::Spot { inner_cone_angle, outer_cone_angle } => (
            "spot",
            Some(Spot {
                inner_cone_angle: non_default(inner_cone_angle, defaults::SPOT_INNER_CONE_ANGLE),
                outer_cone_angle: non_zero(outer_cone_angle).unwrap_or(defaults::SPOT_OUTER_CONE_ANGLE),
            }),
        ),
    };

    Light {
        name: light.name.clone().filter(|n| !n.is_empty()),
        light_type: light_type.to_string(),
        color: non_default(light.color, defaults::LIGHT_COLOR),
        intensity: non_default(light.intensity, defaults::LIGHT_INTENSITY),
        range: light.range.and_then(|r| non_default(r, defaults::LIGHT_RANGE)),
        spot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_point_light() {
        let light = core::Light::new(LightKind::Point);
        assert_eq!(serde_json::to_value(emit_light(&light)).unwrap(), json!({"type": "point"}));
    }

    #[test]
    fn test_spot_light_cone_defaults() {
        let light = core::Light::new(LightKind::Spot { inner_cone_angle: 0.0, outer_cone_angle: None });
        let out = emit_light(&light);
        let spot = out.spot.unwrap();
        assert_eq!(spot.inner_cone_angle, None);
        assert_eq!(spot.outer_cone_angle, std::f32::consts::FRAC_PI_4);

        let light = core::Light::new(LightKind::Spot { inner_cone_angle: 0.1, outer_cone_angle: Some(0.5) });
        let spot = emit_light(&light).spot.unwrap();
        assert_eq!(spot.inner_cone_angle, Some(0.1));
        assert_eq!(spot.outer_cone_angle, 0.5);
    }

    #[test]
    fn test_non_default_fields() {
        let light = core::Light {
            color: [1.0, 0.5, 0.0],
            intensity: 3.0,
            range: Some(10.0),
            ..core::Light::new(LightKind::Directional)
        };

        assert_eq!(
            serde_json::to_value(emit_light(&light)).unwrap(),
            json!({"type": "directional", "color": [1.0, 0.5, 0.0], "intensity": 3.0, "range": 10.0})
        );
    }
}
