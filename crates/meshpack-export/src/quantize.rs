//! Composition of quantization parameters with existing transforms
//!
//! Quantized positions are decoded by a node transform; quantized texture
//! coordinates by a `KHR_texture_transform` block. Both are folded together
//! with whatever transform the scene already carries.

use meshpack_core::{QuantizationPosition, QuantizationTexture, Stream, TextureTransform};

use crate::accessor::Bounds;
use crate::stream::encode_delta;

/// `floor(clamp(v, 0, 1) * (2^bits - 1) + 0.5)`
pub fn quantize_unorm(v: f32, bits: u32) -> u32 {
    let max = ((1u32 << bits) - 1) as f32;
    (v.clamp(0.0, 1.0) * max + 0.5).floor() as u32
}

/// Quantize one model-space coordinate component
pub fn quantize_position(v: f32, offset: f32, qp: &QuantizationPosition) -> u32 {
    quantize_unorm((v - offset) / qp.scale, qp.bits)
}

/// Model-space value decoded from a quantized component, as a renderer would
pub fn dequantize_position(q: u32, offset: f32, qp: &QuantizationPosition) -> f32 {
    offset + q as f32 * qp.node_scale()
}

/// Translation and uniform scale of the node that decodes quantized positions
pub fn position_transform(qp: &QuantizationPosition) -> ([f32; 3], f32) {
    (qp.offset, qp.node_scale())
}

/// Fold the position decode transform into a column-major inverse bind matrix
///
/// The offset is applied first, so it enters the translation column rotated
/// by the linear part; the node scale then multiplies the three linear columns.
pub fn adjust_bind_matrix(matrix: &mut [f32; 16], qp: &QuantizationPosition) {
    let [ox, oy, oz] = qp.offset;

    for row in 0..3 {
        matrix[12 + row] += ox * matrix[row] + oy * matrix[4 + row] + oz * matrix[8 + row];
    }

    let scale = qp.node_scale();
    for value in &mut matrix[..12] {
        *value *= scale;
    }
}

/// Bounds of a position stream in the units it is stored in
///
/// Base positions are bounded by their quantized integers, morph target
/// deltas by the encoded deltas. Without quantization the float bounds are
/// used as is.
pub fn position_bounds(stream: &Stream, qp: Option<&QuantizationPosition>) -> Option<Bounds> {
    let Some(qp) = qp else {
        return Bounds::of_rows(&stream.data, 3);
    };

    let encoded: Vec<[f32; 4]> = stream
        .data
        .iter()
        .map(|row| {
            let mut out = [0.0; 4];
            for c in 0..3 {
                out[c] = if stream.target == 0 {
                    quantize_position(row[c], qp.offset[c], qp) as f32
                } else {
                    encode_delta(row[c], qp.node_scale()) as f32
                };
            }
            out
        })
        .collect();

    Bounds::of_rows(&encoded, 3)
}

/// Transform to emit on a texture reference, if any
pub fn compose_texture_transform(
    existing: Option<&TextureTransform>,
    qt: Option<&QuantizationTexture>,
) -> Option<TextureTransform> {
    if existing.is_none() && qt.is_none() {
        return None;
    }

    let mut transform = existing.copied().unwrap_or_default();

    if let Some(qt) = qt {
        let max = qt.max_value();
        transform.offset[0] += qt.offset[0];
        transform.offset[1] += qt.offset[1];
        transform.scale[0] *= qt.scale[0] / max;
        transform.scale[1] *= qt.scale[1] / max;
    }

    Some(transform)
}

pub const IDENTITY_MATRIX: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];
