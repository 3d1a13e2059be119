//! Mesh emitter
//!
//! Every scene mesh becomes one glTF mesh with a single primitive. Vertex
//! streams go to vertex views keyed by attribute kind, morph targets are
//! written target by target after the base attributes, indices last.

use std::collections::BTreeMap;

use meshpack_core as core;
use meshpack_core::{AttributeKind, PrimitiveMode, Stream};

use crate::accessor::AccessorList;
use crate::error::ExportResult;
use crate::gltf::{Mesh, Primitive};
use crate::layout::{BufferKind, BufferViewPool};
use crate::quantize::position_bounds;
use crate::stream::Encoding;

/// Attribute name of a stream, e.g. `POSITION` or `TEXCOORD_1`
pub fn attribute_name(stream: &Stream) -> String {
    if stream.kind.is_indexed() {
        format!("{}_{}", stream.kind.name(), stream.index)
    } else {
        stream.kind.name().to_string()
    }
}

fn write_attributes(
    mesh: &core::Mesh,
    target: u32,
    pool: &mut BufferViewPool,
    accessors: &mut AccessorList,
    encoding: &Encoding<'_>,
) -> ExportResult<BTreeMap<String, usize>> {
    let mut attributes = BTreeMap::new();
    let mut scratch = Vec::new();

    for stream in mesh.streams.iter().filter(|s| s.target == target) {
        scratch.clear();
        let format = encoding.encoder.encode_vertex(stream, encoding.quantization, &mut scratch);

        let view = pool.acquire(
            BufferKind::Vertex,
            format.filter,
            stream.kind.discriminant(),
            format.stride,
            encoding.compress,
        );
        let offset = pool.append(view, &scratch)?;

        let bounds = if stream.kind == AttributeKind::Position {
            position_bounds(stream, encoding.quantization.map(|q| &q.position))
        } else {
            None
        };

        let accessor = accessors.write(
            pool,
            view,
            offset,
            format.shape,
            format.component,
            format.normalized,
            stream.data.len(),
            bounds,
        )?;

        attributes.insert(attribute_name(stream), accessor);
    }

    Ok(attributes)
}

fn write_indices(
    indices: &[u32],
    pool: &mut BufferViewPool,
    accessors: &mut AccessorList,
    encoding: &Encoding<'_>,
) -> ExportResult<usize> {
    let mut scratch = Vec::new();
    let format = encoding.encoder.encode_index(indices, &mut scratch);

    let view = pool.acquire(BufferKind::Index, format.filter, 0, format.stride, encoding.compress);
    let offset = pool.append(view, &scratch)?;

    accessors.write(
        pool,
        view,
        offset,
        format.shape,
        format.component,
        format.normalized,
        indices.len(),
        None,
    )
}

/// Emit one mesh
pub fn emit_mesh(
    mesh: &core::Mesh,
    pool: &mut BufferViewPool,
    accessors: &mut AccessorList,
    encoding: &Encoding<'_>,
    keep_extras: bool,
) -> ExportResult<Mesh> {
    let attributes = write_attributes(mesh, 0, pool, accessors, encoding)?;

    let mut targets = Vec::with_capacity(mesh.targets);
    for target in 1..=mesh.targets {
        targets.push(write_attributes(mesh, target as u32, pool, accessors, encoding)?);
    }

    let indices = if mesh.indices.is_empty() {
        None
    } else {
        Some(write_indices(&mesh.indices, pool, accessors, encoding)?)
    };

    let primitive = Primitive {
        attributes,
        targets,
        indices,
        material: mesh.material.map(|m| m.index()),
        mode: (mesh.mode != PrimitiveMode::Triangles).then(|| mesh.mode.code()),
    };

    let weights = if mesh.target_weights.iter().any(|&w| w != 0.0) {
        mesh.target_weights.clone()
    } else {
        Vec::new()
    };

    Ok(Mesh {
        name: mesh.name.clone().filter(|n| !n.is_empty()),
        primitives: vec![primitive],
        weights,
        extras: mesh.extras.clone().filter(|_| keep_extras),
    })
}
