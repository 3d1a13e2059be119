//! Scene graph emitters: nodes, mesh-instance nodes, skins and scene roots

use meshpack_core as core;
use meshpack_core::{NodeId, NodeInfo, QuantizationPosition};

use crate::accessor::AccessorList;
use crate::error::{ExportError, ExportResult};
use crate::gltf::{ComponentType, LightRef, Node, NodeExtensions, Shape, Skin};
use crate::layout::{BufferKind, BufferViewPool, Filter};
use crate::quantize::{adjust_bind_matrix, position_transform, IDENTITY_MATRIX};
use crate::stream::Encoding;

/// Output index of a kept node
pub fn remap_node(nodes: &[NodeInfo], id: NodeId) -> ExportResult<usize> {
    match nodes.get(id.index()) {
        Some(info) if info.keep => Ok(info.remap),
        Some(_) => Err(ExportError::contract(format!("reference to dropped {id}"))),
        None => Err(ExportError::contract(format!("reference to missing {id}"))),
    }
}

/// Source node indices in output order; remaps of kept nodes must be `0..kept`
pub fn kept_order(nodes: &[NodeInfo]) -> ExportResult<Vec<usize>> {
    let kept = nodes.iter().filter(|n| n.keep).count();
    let mut order = vec![usize::MAX; kept];

    for (index, info) in nodes.iter().enumerate().filter(|(_, n)| n.keep) {
        match order.get_mut(info.remap) {
            Some(slot) if *slot == usize::MAX => *slot = index,
            _ => {
                return Err(ExportError::contract(format!(
                    "node {index} remaps to {} which is outside 0..{kept} or taken",
                    info.remap
                )))
            }
        }
    }

    Ok(order)
}

/// Record mesh-instance node indices on their parents
///
/// Mesh nodes follow the kept nodes, one per mesh in mesh order.
pub fn attach_mesh_nodes(meshes: &[core::Mesh], nodes: &mut [NodeInfo], kept: usize) -> ExportResult<()> {
    for info in nodes.iter_mut() {
        info.meshes.clear();
    }

    for (index, mesh) in meshes.iter().enumerate() {
        if let Some(parent) = mesh.node {
            remap_node(nodes, parent)?;
            nodes[parent.index()].meshes.push(kept + index);
        }
    }

    Ok(())
}

/// Node that instantiates mesh `mesh_index`
pub fn emit_mesh_node(
    mesh_index: usize,
    mesh: &core::Mesh,
    scene_nodes: &[core::Node],
    qp: Option<&QuantizationPosition>,
) -> Node {
    let mut node = Node {
        mesh: Some(mesh_index),
        skin: mesh.skin.map(|s| s.index()),
        ..Default::default()
    };

    if let Some(qp) = qp {
        let (translation, scale) = position_transform(qp);
        node.translation = Some(translation);
        node.scale = Some([scale; 3]);
    }

    if let Some(parent) = mesh.node.and_then(|id| scene_nodes.get(id.index())) {
        node.weights = parent.weights.clone();
    }

    node
}

/// Emit a kept node
pub fn emit_node(
    node: &core::Node,
    info: &NodeInfo,
    nodes: &[NodeInfo],
    camera_remap: &[Option<usize>],
    keep_extras: bool,
) -> Node {
    let children = node
        .children
        .iter()
        .filter_map(|child| nodes.get(child.index()).filter(|c| c.keep).map(|c| c.remap))
        .chain(info.meshes.iter().copied())
        .collect();

    Node {
        name: node.name.clone().filter(|n| !n.is_empty()),
        translation: node.translation,
        rotation: node.rotation,
        scale: node.scale,
        matrix: node.matrix,
        children,
        camera: node
            .camera
            .and_then(|c| camera_remap.get(c.index()).copied().flatten()),
        extensions: node.light.map(|light| NodeExtensions {
            lights_punctual: Some(LightRef { light: light.index() }),
        }),
        extras: node.extras.clone().filter(|_| keep_extras),
        ..Default::default()
    }
}

/// Emit a skin and its inverse bind matrix accessor
pub fn emit_skin(
    skin: &core::Skin,
    nodes: &[NodeInfo],
    pool: &mut BufferViewPool,
    accessors: &mut AccessorList,
    encoding: &Encoding<'_>,
) -> ExportResult<Skin> {
    let joints = skin
        .joints
        .iter()
        .map(|&joint| remap_node(nodes, joint))
        .collect::<ExportResult<Vec<_>>>()?;

    let qp = encoding.quantization.map(|q| &q.position);
    let mut scratch: Vec<u8> = Vec::with_capacity(joints.len() * 64);

    for j in 0..skin.joints.len() {
        let mut matrix = skin
            .inverse_bind_matrices
            .as_ref()
            .and_then(|m| m.get(j).copied())
            .unwrap_or(IDENTITY_MATRIX);

        if let Some(qp) = qp {
            adjust_bind_matrix(&mut matrix, qp);
        }

        scratch.extend_from_slice(bytemuck::cast_slice(&matrix));
    }

    let view = pool.acquire(BufferKind::Skin, Filter::None, 0, 64, encoding.compress);
    let offset = pool.append(view, &scratch)?;
    let matrices = accessors.write(
        pool,
        view,
        offset,
        Shape::Mat4,
        ComponentType::F32,
        false,
        joints.len(),
        None,
    )?;

    Ok(Skin {
        name: skin.name.clone().filter(|n| !n.is_empty()),
        joints,
        inverse_bind_matrices: matrices,
        skeleton: skin.skeleton.map(|s| remap_node(nodes, s)).transpose()?,
    })
}

/// Root nodes of the single scene
///
/// Kept nodes that are no kept node's child, in output order, followed by
/// mesh nodes without a parent.
pub fn scene_roots(
    scene_nodes: &[core::Node],
    nodes: &[NodeInfo],
    order: &[usize],
    meshes: &[core::Mesh],
) -> Vec<usize> {
    let mut is_child = vec![false; scene_nodes.len()];
    for (node, info) in scene_nodes.iter().zip(nodes) {
        if info.keep {
            for child in &node.children {
                if let Some(flag) = is_child.get_mut(child.index()) {
                    *flag = true;
                }
            }
        }
    }

    let kept = order.len();
    order
        .iter()
        .enumerate()
        .filter(|&(_, &source)| !is_child[source])
        .map(|(remap, _)| remap)
        .chain(
            meshes
                .iter()
                .enumerate()
                .filter(|(_, mesh)| mesh.node.is_none())
                .map(|(index, _)| kept + index),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StandardEncoder;
    use meshpack_core::{CameraId, LightId, SkinId};

    fn encoding() -> Encoding<'static> {
        Encoding { encoder: &StandardEncoder, quantization: None, compress: false }
    }

    #[test]
    fn test_kept_order() {
        let nodes = vec![NodeInfo::kept(1), NodeInfo::dropped(), NodeInfo::kept(0)];
        assert_eq!(kept_order(&nodes).unwrap(), vec![2, 0]);

        let sparse = vec![NodeInfo::kept(0), NodeInfo::kept(2)];
        assert!(kept_order(&sparse).unwrap_err().is_contract());

        let duplicate = vec![NodeInfo::kept(0), NodeInfo::kept(0)];
        assert!(kept_order(&duplicate).is_err());
    }

    #[test]
    fn test_remap_rejects_dropped_nodes() {
        let nodes = vec![NodeInfo::kept(0), NodeInfo::dropped()];
        assert_eq!(remap_node(&nodes, NodeId(0)).unwrap(), 0);
        assert!(remap_node(&nodes, NodeId(1)).is_err());
        assert!(remap_node(&nodes, NodeId(2)).is_err());
    }

    #[test]
    fn test_node_children_and_references() {
        let scene_node = core::Node {
            name: Some("root".into()),
            children: vec![NodeId(1), NodeId(2)],
            camera: Some(CameraId(1)),
            light: Some(LightId(0)),
            ..Default::default()
        };
        let mut info = NodeInfo::kept(0);
        info.meshes = vec![7];
        let nodes = vec![info.clone(), NodeInfo::dropped(), NodeInfo::kept(1)];

        let out = emit_node(&scene_node, &info, &nodes, &[Some(0), None], false);
        assert_eq!(out.children, vec![1, 7]);
        assert_eq!(out.camera, None);
        assert_eq!(out.extensions.unwrap().lights_punctual.unwrap().light, 0);

        let out = emit_node(&scene_node, &info, &nodes, &[Some(0), Some(0)], false);
        assert_eq!(out.camera, Some(0));
    }

    #[test]
    fn test_mesh_node_transform_and_weights() {
        let scene_nodes = vec![core::Node { weights: vec![0.25], ..Default::default() }];
        let mesh = core::Mesh { node: Some(NodeId(0)), skin: Some(SkinId(2)), ..Default::default() };
        let qp = QuantizationPosition { offset: [1.0, 2.0, 3.0], scale: 3.0, bits: 2 };

        let out = emit_mesh_node(4, &mesh, &scene_nodes, Some(&qp));
        assert_eq!(out.mesh, Some(4));
        assert_eq!(out.skin, Some(2));
        assert_eq!(out.translation, Some([1.0, 2.0, 3.0]));
        assert_eq!(out.scale, Some([1.0; 3]));
        assert_eq!(out.weights, vec![0.25]);
    }

    #[test]
    fn test_attach_mesh_nodes() {
        let meshes = vec![
            core::Mesh { node: Some(NodeId(1)), ..Default::default() },
            core::Mesh::default(),
            core::Mesh { node: Some(NodeId(1)), ..Default::default() },
        ];
        let mut nodes = vec![NodeInfo::kept(0), NodeInfo::kept(1)];
        attach_mesh_nodes(&meshes, &mut nodes, 2).unwrap();
        assert_eq!(nodes[1].meshes, vec![2, 4]);

        let mut dropped = vec![NodeInfo::kept(0), NodeInfo::dropped()];
        assert!(attach_mesh_nodes(&meshes, &mut dropped, 1).is_err());
    }

    #[test]
    fn test_skin_defaults_to_identity() {
        let skin = core::Skin {
            joints: vec![NodeId(0), NodeId(1)],
            skeleton: Some(NodeId(1)),
            ..Default::default()
        };
        let nodes = vec![NodeInfo::kept(1), NodeInfo::kept(0)];

        let mut pool = BufferViewPool::new();
        let mut accessors = AccessorList::new();
        let out = emit_skin(&skin, &nodes, &mut pool, &mut accessors, &encoding()).unwrap();

        assert_eq!(out.joints, vec![1, 0]);
        assert_eq!(out.skeleton, Some(0));
        assert_eq!(out.inverse_bind_matrices, 0);
        assert_eq!(pool.view_len(0), Some(128));
        assert_eq!(accessors.get(0).unwrap().accessor_type, "MAT4");
    }

    #[test]
    fn test_scene_roots() {
        let scene_nodes = vec![
            core::Node { children: vec![NodeId(1)], ..Default::default() },
            core::Node::default(),
            core::Node::default(),
        ];
        let nodes = vec![NodeInfo::kept(0), NodeInfo::kept(1), NodeInfo::kept(2)];
        let order = kept_order(&nodes).unwrap();
        let meshes = vec![
            core::Mesh { node: Some(NodeId(0)), ..Default::default() },
            core::Mesh::default(),
        ];

        assert_eq!(scene_roots(&scene_nodes, &nodes, &order, &meshes), vec![0, 2, 4]);
    }
}
