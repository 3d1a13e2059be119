//! Accessor encoder
//!
//! Accessor ids are handed out by [`AccessorList`] in emission order; every
//! function that creates accessors takes the list by `&mut`.

use crate::error::{ExportError, ExportResult};
use crate::gltf::{Accessor, ComponentType, Shape};
use crate::layout::BufferViewPool;

/// Per-component bounds of an accessor
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

impl Bounds {
    /// Bounds over the first `components` lanes of each row; `None` when empty
    pub fn of_rows(rows: &[[f32; 4]], components: usize) -> Option<Self> {
        let components = components.min(4);
        let first = rows.first()?;

        let mut min = first[..components].to_vec();
        let mut max = min.clone();
        for row in &rows[1..] {
            for c in 0..components {
                min[c] = min[c].min(row[c]);
                max[c] = max[c].max(row[c]);
            }
        }

        Some(Self { min, max })
    }

    /// Bounds of a scalar sequence
    pub fn of_scalars(values: &[f32]) -> Option<Self> {
        let first = *values.first()?;
        let (min, max) = values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Some(Self { min: vec![min], max: vec![max] })
    }
}

/// Ordered accessor table
#[derive(Debug, Default)]
pub struct AccessorList {
    accessors: Vec<Accessor>,
}

impl AccessorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next written accessor will receive
    pub fn next_id(&self) -> usize {
        self.accessors.len()
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Accessor> {
        self.accessors.get(id)
    }

    /// Record an accessor over `count` elements of `view` starting at `offset`
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &mut self,
        pool: &BufferViewPool,
        view: usize,
        offset: usize,
        shape: Shape,
        component: ComponentType,
        normalized: bool,
        count: usize,
        bounds: Option<Bounds>,
    ) -> ExportResult<usize> {
        let class = pool
            .class(view)
            .ok_or_else(|| ExportError::contract(format!("accessor refers to missing buffer view {view}")))?;
        let view_len = pool.view_len(view).unwrap_or(0);

        let end = offset + count * class.stride;
        if end > view_len {
            return Err(ExportError::contract(format!(
                "accessor of {count} elements at offset {offset} overruns buffer view {view} ({view_len} bytes)"
            )));
        }

        if let Some(bounds) = &bounds {
            let expected = shape.components();
            if bounds.min.len() != expected || bounds.max.len() != expected {
                return Err(ExportError::contract(format!(
                    "accessor bounds have {}/{} entries, expected {expected}",
                    bounds.min.len(),
                    bounds.max.len()
                )));
            }
        }

        let (min, max) = match bounds {
            Some(Bounds { min, max }) => (Some(min), Some(max)),
            None => (None, None),
        };

        let id = self.accessors.len();
        self.accessors.push(Accessor {
            buffer_view: view,
            byte_offset: offset,
            component_type: component.code(),
            count,
            accessor_type: shape.name().to_string(),
            normalized,
            min,
            max,
        });
        Ok(id)
    }

    pub fn into_vec(self) -> Vec<Accessor> {
        self.accessors
    }
}
