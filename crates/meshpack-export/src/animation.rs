//! Animation consolidation
//!
//! Tracks of dropped or never animated nodes are filtered out. The remaining
//! tracks share at most two time accessors: a single-sample pose time for
//! constant tracks and a full time range for the rest.

use meshpack_core as core;
use meshpack_core::{AnimationPath, NodeInfo, Track};

use crate::accessor::{AccessorList, Bounds};
use crate::error::{ExportError, ExportResult};
use crate::gltf::{Animation, AnimationSampler, Channel, ChannelTarget, Shape};
use crate::layout::{BufferKind, BufferViewPool, Filter};
use crate::stream::Encoding;

/// Sampling settings shared by every animation
#[derive(Debug, Clone, Copy)]
pub struct AnimationSettings {
    /// Resampling frequency in Hz
    pub frequency: f32,
    /// Keep tracks whose path never leaves the rest pose
    pub keep_constant: bool,
}

/// Tracks of `animation` that survive into the output
pub fn live_tracks<'a>(
    animation: &'a core::Animation,
    nodes: &[NodeInfo],
    settings: &AnimationSettings,
) -> Vec<&'a Track> {
    animation
        .tracks
        .iter()
        .filter(|track| {
            nodes.get(track.node.index()).is_some_and(|info| {
                info.keep && (settings.keep_constant || info.is_animated(track.path))
            })
        })
        .collect()
}

fn write_time(
    start: f32,
    frames: usize,
    frequency: f32,
    pool: &mut BufferViewPool,
    accessors: &mut AccessorList,
    encoding: &Encoding<'_>,
) -> ExportResult<usize> {
    let times: Vec<f32> = (0..frames).map(|j| start + j as f32 / frequency).collect();

    let mut scratch = Vec::new();
    let format = encoding.encoder.encode_time(&times, &mut scratch);

    let view = pool.acquire(BufferKind::Time, Filter::None, 0, format.stride, encoding.compress);
    let offset = pool.append(view, &scratch)?;

    accessors.write(
        pool,
        view,
        offset,
        Shape::Scalar,
        format.component,
        format.normalized,
        frames,
        Bounds::of_scalars(&times),
    )
}

/// Emit one animation; `None` when no track survives
pub fn emit_animation(
    animation: &core::Animation,
    nodes: &[NodeInfo],
    settings: &AnimationSettings,
    pool: &mut BufferViewPool,
    accessors: &mut AccessorList,
    encoding: &Encoding<'_>,
) -> ExportResult<Option<Animation>> {
    let tracks = live_tracks(animation, nodes, settings);
    if tracks.is_empty() {
        return Ok(None);
    }

    let needs_time = tracks.iter().any(|t| !t.is_constant());
    let needs_pose = tracks.iter().any(|t| t.is_constant());

    let time = if needs_time {
        Some(write_time(animation.start, animation.frames, settings.frequency, pool, accessors, encoding)?)
    } else {
        None
    };
    let pose = if needs_pose {
        Some(write_time(animation.start, 1, settings.frequency, pool, accessors, encoding)?)
    } else {
        None
    };

    let mut samplers = Vec::with_capacity(tracks.len());
    let mut channels = Vec::with_capacity(tracks.len());

    for track in tracks {
        let mut scratch = Vec::new();
        let format = encoding.encoder.encode_keyframe(track, encoding.quantization, &mut scratch);

        let compressed = encoding.compress && track.path != AnimationPath::Weights;
        let view = pool.acquire(
            BufferKind::Keyframe,
            format.filter,
            track.path.discriminant(),
            format.stride,
            compressed,
        );
        let offset = pool.append(view, &scratch)?;

        let output = accessors.write(
            pool,
            view,
            offset,
            format.shape,
            format.component,
            format.normalized,
            track.data.len(),
            None,
        )?;

        let input = if track.is_constant() { pose } else { time };
        let input = input.ok_or_else(|| ExportError::contract("time accessor missing for track"))?;

        let info = &nodes[track.node.index()];
        let node = if track.path == AnimationPath::Weights {
            match info.meshes.as_slice() {
                [mesh_node] => *mesh_node,
                other => {
                    return Err(ExportError::contract(format!(
                        "weights track on {} which has {} mesh instances",
                        track.node,
                        other.len()
                    )))
                }
            }
        } else {
            info.remap
        };

        channels.push(Channel {
            sampler: samplers.len(),
            target: ChannelTarget { node, path: track.path.name().to_string() },
        });
        samplers.push(AnimationSampler { input, output });
    }

    Ok(Some(Animation {
        name: animation.name.clone().filter(|n| !n.is_empty()),
        samplers,
        channels,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StandardEncoder;
    use meshpack_core::NodeId;

    fn encoding() -> Encoding<'static> {
        Encoding { encoder: &StandardEncoder, quantization: None, compress: false }
    }

    fn settings() -> AnimationSettings {
        AnimationSettings { frequency: 30.0, keep_constant: false }
    }

    fn animated(remap: usize, path: AnimationPath) -> NodeInfo {
        NodeInfo { animated_paths: path.bit(), ..NodeInfo::kept(remap) }
    }

    fn track(node: usize, path: AnimationPath, frames: usize) -> Track {
        Track { node: NodeId(node), path, data: vec![[0.0, 0.0, 0.0, 1.0]; frames], components: 1 }
    }

    #[test]
    fn test_dead_tracks_are_filtered() {
        let nodes = vec![
            animated(0, AnimationPath::Rotation),
            NodeInfo::dropped(),
            NodeInfo::kept(1),
        ];
        let animation = core::Animation {
            tracks: vec![
                track(0, AnimationPath::Rotation, 3),
                track(0, AnimationPath::Translation, 3),
                track(1, AnimationPath::Rotation, 3),
                track(2, AnimationPath::Scale, 1),
            ],
            ..Default::default()
        };

        assert_eq!(live_tracks(&animation, &nodes, &settings()).len(), 1);

        let keep_all = AnimationSettings { keep_constant: true, ..settings() };
        assert_eq!(live_tracks(&animation, &nodes, &keep_all).len(), 3);
    }

    #[test]
    fn test_empty_animation_consumes_no_ids() {
        let nodes = vec![NodeInfo::kept(0)];
        let animation = core::Animation {
            tracks: vec![track(0, AnimationPath::Rotation, 4)],
            frames: 4,
            ..Default::default()
        };

        let mut pool = BufferViewPool::new();
        let mut accessors = AccessorList::new();
        let out = emit_animation(&animation, &nodes, &settings(), &mut pool, &mut accessors, &encoding()).unwrap();

        assert!(out.is_none());
        assert!(accessors.is_empty());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_weights_target_mesh_instance() {
        let mut info = animated(0, AnimationPath::Weights);
        info.meshes = vec![5];
        let animation = core::Animation {
            tracks: vec![Track {
                node: NodeId(0),
                path: AnimationPath::Weights,
                data: vec![[0.5, 0.0, 0.0, 0.0]; 6],
                components: 2,
            }],
            frames: 3,
            ..Default::default()
        };

        let mut pool = BufferViewPool::new();
        let mut accessors = AccessorList::new();
        let out = emit_animation(&animation, &[info.clone()], &settings(), &mut pool, &mut accessors, &encoding())
            .unwrap()
            .unwrap();
        assert_eq!(out.channels[0].target, ChannelTarget { node: 5, path: "weights".into() });
        assert_eq!(accessors.get(1).unwrap().count, 6);

        info.meshes.push(6);
        let mut accessors = AccessorList::new();
        let err = emit_animation(&animation, &[info], &settings(), &mut pool, &mut accessors, &encoding())
            .unwrap_err();
        assert!(err.is_contract());
    }
}
