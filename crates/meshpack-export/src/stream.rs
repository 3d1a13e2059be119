//! Stream encoding
//!
//! Converts vertex streams, index lists, keyframe times and track samples
//! into the raw element bytes stored in buffer views. The exporter decides
//! where the bytes go; the encoder decides how they look.

use meshpack_core::{AnimationPath, AttributeKind, Quantization, Stream, Track};

use crate::gltf::{ComponentType, Shape};
use crate::layout::Filter;
use crate::quantize::{quantize_position, quantize_unorm};

/// Element layout produced by an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub shape: Shape,
    pub component: ComponentType,
    pub normalized: bool,
    /// Bytes per element, a multiple of 4 for vertex data
    pub stride: usize,
    pub filter: Filter,
}

impl StreamFormat {
    const fn new(shape: Shape, component: ComponentType, normalized: bool, stride: usize) -> Self {
        Self { shape, component, normalized, stride, filter: Filter::None }
    }
}

/// Encoder for every kind of stream the exporter writes
pub trait StreamEncoder {
    /// Encode one vertex attribute stream into `out`
    fn encode_vertex(&self, stream: &Stream, quantization: Option<&Quantization>, out: &mut Vec<u8>) -> StreamFormat;

    /// Encode a triangle or line index list into `out`
    fn encode_index(&self, indices: &[u32], out: &mut Vec<u8>) -> StreamFormat;

    /// Encode keyframe times into `out`
    fn encode_time(&self, times: &[f32], out: &mut Vec<u8>) -> StreamFormat;

    /// Encode the samples of one track into `out`
    fn encode_keyframe(&self, track: &Track, quantization: Option<&Quantization>, out: &mut Vec<u8>) -> StreamFormat;
}

/// Encoder plus the settings every stream write needs
#[derive(Clone, Copy)]
pub struct Encoding<'a> {
    pub encoder: &'a dyn StreamEncoder,
    pub quantization: Option<&'a Quantization>,
    /// Route vertex, index, time, skin and non-weight keyframe views through the codec
    pub compress: bool,
}

/// Float streams, or fixed-point streams when quantization parameters exist
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEncoder;

impl StandardEncoder {
    fn encode_float(rows: &[[f32; 4]], components: usize, out: &mut Vec<u8>) {
        for row in rows {
            out.extend_from_slice(bytemuck::cast_slice(&row[..components]));
        }
    }

    fn encode_snorm8(rows: &[[f32; 4]], components: usize, out: &mut Vec<u8>) {
        for row in rows {
            let mut packed = [0i8; 4];
            for (slot, v) in packed.iter_mut().zip(&row[..components]) {
                *slot = (v.clamp(-1.0, 1.0) * 127.0).round() as i8;
            }
            out.extend_from_slice(bytemuck::cast_slice(&packed));
        }
    }

    fn encode_unorm8(rows: &[[f32; 4]], out: &mut Vec<u8>) {
        for row in rows {
            let packed = row.map(|v| quantize_unorm(v, 8) as u8);
            out.extend_from_slice(&packed);
        }
    }

    fn encode_joints(rows: &[[f32; 4]], out: &mut Vec<u8>) -> StreamFormat {
        let wide = rows.iter().flatten().any(|&j| j > 255.0);

        if wide {
            for row in rows {
                let packed = row.map(|j| j as u16);
                out.extend_from_slice(bytemuck::cast_slice(&packed));
            }
            StreamFormat::new(Shape::Vec4, ComponentType::U16, false, 8)
        } else {
            for row in rows {
                out.extend_from_slice(&row.map(|j| j as u8));
            }
            StreamFormat::new(Shape::Vec4, ComponentType::U8, false, 4)
        }
    }

    fn encode_positions(stream: &Stream, q: &Quantization, out: &mut Vec<u8>) -> StreamFormat {
        let qp = &q.position;

        if stream.target == 0 {
            for row in &stream.data {
                let packed = [
                    quantize_position(row[0], qp.offset[0], qp) as u16,
                    quantize_position(row[1], qp.offset[1], qp) as u16,
                    quantize_position(row[2], qp.offset[2], qp) as u16,
                    0,
                ];
                out.extend_from_slice(bytemuck::cast_slice(&packed));
            }
            StreamFormat::new(Shape::Vec3, ComponentType::U16, false, 8)
        } else {
            for row in &stream.data {
                let packed = [
                    encode_delta(row[0], qp.node_scale()),
                    encode_delta(row[1], qp.node_scale()),
                    encode_delta(row[2], qp.node_scale()),
                    0,
                ];
                out.extend_from_slice(bytemuck::cast_slice(&packed));
            }
            StreamFormat::new(Shape::Vec3, ComponentType::I16, false, 8)
        }
    }

    fn encode_texcoords(stream: &Stream, q: &Quantization, out: &mut Vec<u8>) -> StreamFormat {
        let qt = &q.texture;

        if stream.target == 0 {
            for row in &stream.data {
                let packed = [
                    quantize_unorm((row[0] - qt.offset[0]) / qt.scale[0], qt.bits) as u16,
                    quantize_unorm((row[1] - qt.offset[1]) / qt.scale[1], qt.bits) as u16,
                ];
                out.extend_from_slice(bytemuck::cast_slice(&packed));
            }
            StreamFormat::new(Shape::Vec2, ComponentType::U16, false, 4)
        } else {
            // deltas stay float, expressed in quantized units
            let max = qt.max_value();
            for row in &stream.data {
                let packed = [row[0] * max / qt.scale[0], row[1] * max / qt.scale[1]];
                out.extend_from_slice(bytemuck::cast_slice(&packed));
            }
            StreamFormat::new(Shape::Vec2, ComponentType::F32, false, 8)
        }
    }
}

/// Morph target position delta in units of the position decode scale
pub fn encode_delta(delta: f32, node_scale: f32) -> i16 {
    (delta / node_scale)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

impl StreamEncoder for StandardEncoder {
    fn encode_vertex(&self, stream: &Stream, quantization: Option<&Quantization>, out: &mut Vec<u8>) -> StreamFormat {
        let rows = &stream.data;
        let morph = stream.target > 0;

        match (stream.kind, quantization) {
            (AttributeKind::Joints, _) => Self::encode_joints(rows, out),
            (AttributeKind::Position, Some(q)) => Self::encode_positions(stream, q, out),
            (AttributeKind::Texcoord, Some(q)) => Self::encode_texcoords(stream, q, out),
            (AttributeKind::Normal, Some(_)) => {
                Self::encode_snorm8(rows, 3, out);
                StreamFormat::new(Shape::Vec3, ComponentType::I8, true, 4)
            }
            (AttributeKind::Tangent, Some(_)) => {
                let components = if morph { 3 } else { 4 };
                Self::encode_snorm8(rows, components, out);
                let shape = if morph { Shape::Vec3 } else { Shape::Vec4 };
                StreamFormat::new(shape, ComponentType::I8, true, 4)
            }
            (AttributeKind::Color | AttributeKind::Weights, Some(_)) if !morph => {
                Self::encode_unorm8(rows, out);
                StreamFormat::new(Shape::Vec4, ComponentType::U8, true, 4)
            }
            (AttributeKind::Position | AttributeKind::Normal, _) => {
                Self::encode_float(rows, 3, out);
                StreamFormat::new(Shape::Vec3, ComponentType::F32, false, 12)
            }
            (AttributeKind::Tangent, _) if morph => {
                Self::encode_float(rows, 3, out);
                StreamFormat::new(Shape::Vec3, ComponentType::F32, false, 12)
            }
            (AttributeKind::Texcoord, _) => {
                Self::encode_float(rows, 2, out);
                StreamFormat::new(Shape::Vec2, ComponentType::F32, false, 8)
            }
            _ => {
                Self::encode_float(rows, 4, out);
                StreamFormat::new(Shape::Vec4, ComponentType::F32, false, 16)
            }
        }
    }

    fn encode_index(&self, indices: &[u32], out: &mut Vec<u8>) -> StreamFormat {
        let wide = indices.iter().any(|&i| i > u16::MAX as u32);

        if wide {
            out.extend_from_slice(bytemuck::cast_slice(indices));
            StreamFormat::new(Shape::Scalar, ComponentType::U32, false, 4)
        } else {
            let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
            out.extend_from_slice(bytemuck::cast_slice(&narrow));
            StreamFormat::new(Shape::Scalar, ComponentType::U16, false, 2)
        }
    }

    fn encode_time(&self, times: &[f32], out: &mut Vec<u8>) -> StreamFormat {
        out.extend_from_slice(bytemuck::cast_slice(times));
        StreamFormat::new(Shape::Scalar, ComponentType::F32, false, 4)
    }

    fn encode_keyframe(&self, track: &Track, quantization: Option<&Quantization>, out: &mut Vec<u8>) -> StreamFormat {
        match track.path {
            AnimationPath::Translation | AnimationPath::Scale => {
                Self::encode_float(&track.data, 3, out);
                StreamFormat::new(Shape::Vec3, ComponentType::F32, false, 12)
            }
            AnimationPath::Rotation if quantization.is_some() => {
                for row in &track.data {
                    let packed = row.map(|v| (v.clamp(-1.0, 1.0) * 32767.0).round() as i16);
                    out.extend_from_slice(bytemuck::cast_slice(&packed));
                }
                StreamFormat::new(Shape::Vec4, ComponentType::I16, true, 8)
            }
            AnimationPath::Rotation => {
                Self::encode_float(&track.data, 4, out);
                StreamFormat::new(Shape::Vec4, ComponentType::F32, false, 16)
            }
            AnimationPath::Weights => {
                Self::encode_float(&track.data, 1, out);
                StreamFormat::new(Shape::Scalar, ComponentType::F32, false, 4)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshpack_core::{NodeId, QuantizationPosition, QuantizationTexture};

    fn quantization() -> Quantization {
        Quantization {
            position: QuantizationPosition { offset: [-1.0; 3], scale: 2.0, bits: 14 },
            texture: QuantizationTexture { offset: [0.0; 2], scale: [1.0; 2], bits: 12 },
        }
    }

    fn stream(kind: AttributeKind, target: u32, data: Vec<[f32; 4]>) -> Stream {
        Stream { kind, index: 0, target, data }
    }

    #[test]
    fn test_float_positions() {
        let mut out = Vec::new();
        let s = stream(AttributeKind::Position, 0, vec![[1.0, 2.0, 3.0, 0.0]; 2]);
        let format = StandardEncoder.encode_vertex(&s, None, &mut out);

        assert_eq!(format.stride, 12);
        assert_eq!(format.component, ComponentType::F32);
        assert_eq!(out.len(), 24);
    }

    #[test]
    fn test_quantized_positions() {
        let mut out = Vec::new();
        let s = stream(AttributeKind::Position, 0, vec![[-1.0, 0.0, 1.0, 0.0]]);
        let format = StandardEncoder.encode_vertex(&s, Some(&quantization()), &mut out);

        assert_eq!(format.component, ComponentType::U16);
        assert_eq!(format.stride, 8);
        let values: Vec<u16> = out.chunks(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        assert_eq!(values, vec![0, 8192, 16383, 0]);
    }

    #[test]
    fn test_every_vertex_stride_is_aligned() {
        let q = quantization();
        let kinds = [
            AttributeKind::Position,
            AttributeKind::Normal,
            AttributeKind::Tangent,
            AttributeKind::Texcoord,
            AttributeKind::Color,
            AttributeKind::Joints,
            AttributeKind::Weights,
            AttributeKind::Custom,
        ];

        for kind in kinds {
            for target in [0, 1] {
                for quantization in [None, Some(&q)] {
                    let mut out = Vec::new();
                    let s = stream(kind, target, vec![[0.5; 4]; 3]);
                    let format = StandardEncoder.encode_vertex(&s, quantization, &mut out);
                    assert_eq!(format.stride % 4, 0, "{kind:?}");
                    assert_eq!(out.len(), format.stride * 3, "{kind:?}");
                }
            }
        }
    }

    #[test]
    fn test_index_width() {
        let mut out = Vec::new();
        assert_eq!(StandardEncoder.encode_index(&[0, 1, 2], &mut out).stride, 2);
        assert_eq!(out.len(), 6);

        let mut out = Vec::new();
        let format = StandardEncoder.encode_index(&[0, 70000, 2], &mut out);
        assert_eq!(format.component, ComponentType::U32);
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn test_weight_keyframes_are_scalar() {
        let track = Track {
            node: NodeId(0),
            path: AnimationPath::Weights,
            data: vec![[0.25, 0.0, 0.0, 0.0]; 4],
            components: 2,
        };
        let mut out = Vec::new();
        let format = StandardEncoder.encode_keyframe(&track, None, &mut out);
        assert_eq!(format.shape, Shape::Scalar);
        assert_eq!(out.len(), 16);
    }

    #[test]
    fn test_encode_delta() {
        assert_eq!(encode_delta(0.5, 0.25), 2);
        assert_eq!(encode_delta(-1.0e9, 1.0), i16::MIN);
    }
}
