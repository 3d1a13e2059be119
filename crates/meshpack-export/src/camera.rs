//! Camera emitter

use meshpack_core as core;
use meshpack_core::CameraKind;

use crate::gltf::defaults::non_zero;
use crate::gltf::{Camera, Orthographic, Perspective};

/// Emit a camera; `None` for a projection the exporter cannot express
pub fn emit_camera(camera: &core::Camera) -> Option<Camera> {
    let name = camera.name.clone().filter(|n| !n.is_empty());

    match camera.kind {
        CameraKind::Perspective { yfov, znear, aspect_ratio, zfar } => Some(Camera {
            name,
            camera_type: "perspective".to_string(),
            perspective: Some(Perspective {
                yfov,
                znear,
                aspect_ratio: non_zero(aspect_ratio),
                zfar: non_zero(zfar),
            }),
            orthographic: None,
        }),
        CameraKind::Orthographic { xmag, ymag, znear, zfar } => Some(Camera {
            name,
            camera_type: "orthographic".to_string(),
            perspective: None,
            orthographic: Some(Orthographic { xmag, ymag, znear, zfar }),
        }),
        CameraKind::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_perspective_elides_unset_fields() {
        let camera = core::Camera {
            name: None,
            kind: CameraKind::Perspective { yfov: 0.5, znear: 0.25, aspect_ratio: Some(0.0), zfar: None },
        };

        assert_eq!(
            serde_json::to_value(emit_camera(&camera).unwrap()).unwrap(),
            json!({"type": "perspective", "perspective": {"yfov": 0.5, "znear": 0.25}})
        );
    }

    #[test]
    fn test_orthographic() {
        let camera = core::Camera {
            name: Some("top".into()),
            kind: CameraKind::Orthographic { xmag: 1.0, ymag: 2.0, znear: 0.0, zfar: 100.0 },
        };

        let out = emit_camera(&camera).unwrap();
        assert_eq!(out.camera_type, "orthographic");
        assert!(out.perspective.is_none());
        assert_eq!(out.orthographic.unwrap().zfar, 100.0);
    }

    #[test]
    fn test_unknown_camera_is_skipped() {
        let camera = core::Camera { name: None, kind: CameraKind::Unknown };
        assert!(emit_camera(&camera).is_none());
    }
}
