//! Default node retention pass
//!
//! Keeps every node in source order and records which paths are animated
//! away from the node's rest pose.

use meshpack_core::{AnimationPath, Node, NodeInfo, Scene, Track};

fn rest_value(node: &Node, path: AnimationPath, row: usize, components: usize) -> [f32; 4] {
    match path {
        AnimationPath::Translation => {
            let [x, y, z] = node.translation.unwrap_or([0.0; 3]);
            [x, y, z, 0.0]
        }
        AnimationPath::Rotation => node.rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]),
        AnimationPath::Scale => {
            let [x, y, z] = node.scale.unwrap_or([1.0; 3]);
            [x, y, z, 0.0]
        }
        AnimationPath::Weights => {
            let target = row % components.max(1);
            [node.weights.get(target).copied().unwrap_or(0.0), 0.0, 0.0, 0.0]
        }
    }
}

fn lanes(path: AnimationPath) -> usize {
    match path {
        AnimationPath::Translation | AnimationPath::Scale => 3,
        AnimationPath::Rotation => 4,
        AnimationPath::Weights => 1,
    }
}

/// Whether any sample of `track` differs from the node's rest value
pub fn leaves_rest_pose(node: &Node, track: &Track) -> bool {
    if node.matrix.is_some() {
        return true;
    }

    let lanes = lanes(track.path);
    track.data.iter().enumerate().any(|(row, sample)| {
        let rest = rest_value(node, track.path, row, track.components);
        sample[..lanes] != rest[..lanes]
    })
}

/// Keep every node and derive animated paths from the scene's tracks
pub fn analyze_nodes(scene: &Scene) -> Vec<NodeInfo> {
    let mut nodes: Vec<NodeInfo> = (0..scene.nodes.len()).map(NodeInfo::kept).collect();

    for track in scene.animations.iter().flat_map(|a| &a.tracks) {
        let index = track.node.index();
        let Some(node) = scene.nodes.get(index) else {
            continue;
        };

        if leaves_rest_pose(node, track) {
            nodes[index].animated_paths |= track.path.bit();
        }
    }

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshpack_core::{Animation, NodeId};

    fn track(node: usize, path: AnimationPath, data: Vec<[f32; 4]>) -> Track {
        Track { node: NodeId(node), path, data, components: 1 }
    }

    #[test]
    fn test_rest_pose_tracks_are_not_animated() {
        let scene = Scene {
            nodes: vec![
                Node { translation: Some([1.0, 2.0, 3.0]), ..Default::default() },
                Node::default(),
            ],
            animations: vec![Animation {
                tracks: vec![
                    track(0, AnimationPath::Translation, vec![[1.0, 2.0, 3.0, 9.0]; 2]),
                    track(0, AnimationPath::Rotation, vec![[0.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 0.0]]),
                    track(1, AnimationPath::Scale, vec![[1.0, 1.0, 1.0, 0.0]]),
                ],
                ..Default::default()
            }],
            ..Default::default()
        };

        let nodes = analyze_nodes(&scene);
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().enumerate().all(|(i, n)| n.keep && n.remap == i));
        assert!(!nodes[0].is_animated(AnimationPath::Translation));
        assert!(nodes[0].is_animated(AnimationPath::Rotation));
        assert_eq!(nodes[1].animated_paths, 0);
    }

    #[test]
    fn test_matrix_nodes_are_always_animated() {
        let node = Node { matrix: Some([0.0; 16]), ..Default::default() };
        let t = track(0, AnimationPath::Scale, vec![[1.0, 1.0, 1.0, 0.0]]);
        assert!(leaves_rest_pose(&node, &t));
    }

    #[test]
    fn test_weights_compare_per_target() {
        let node = Node { weights: vec![0.0, 0.5], ..Default::default() };
        let mut t = Track {
            node: NodeId(0),
            path: AnimationPath::Weights,
            data: vec![[0.0; 4], [0.5, 0.0, 0.0, 0.0]],
            components: 2,
        };
        assert!(!leaves_rest_pose(&node, &t));

        t.data[1][0] = 0.7;
        assert!(leaves_rest_pose(&node, &t));
    }
}
