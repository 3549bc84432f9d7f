//! UV sets.

use std::collections::HashMap;

use dson_math::DVec2;

use super::library::LibraryEntry;
use super::raw::RawUvSet;

/// A UV set with its per-polygon-vertex override table.
#[derive(Clone, Debug, Default)]
pub struct UvSet {
    pub id: String,
    pub uvs: Vec<DVec2>,

    /// `(face, vertex) -> uv index`
    overrides: HashMap<(usize, usize), usize>,
}

impl UvSet {
    pub fn from_raw(raw: RawUvSet) -> Self {
        let overrides = raw
            .polygon_vertex_indices
            .iter()
            .map(|&[face, vertex, uv]| ((face, vertex), uv))
            .collect();
        Self {
            id: raw.id,
            uvs: raw.uvs.values.iter().map(|&[u, v]| DVec2::new(u, v)).collect(),
            overrides,
        }
    }

    /// UV index used by `vertex` when it appears in polygon `face`.
    pub fn uv_index(&self, face: usize, vertex: usize) -> usize {
        self.overrides.get(&(face, vertex)).copied().unwrap_or(vertex)
    }

    /// UVs for each corner of a polygon, in corner order.
    ///
    /// Indices outside the UV list yield `(0, 0)`.
    pub fn uvs_for_face(&self, face: usize, vertices: &[usize]) -> Vec<DVec2> {
        vertices
            .iter()
            .map(|&v| {
                self.uvs
                    .get(self.uv_index(face, v))
                    .copied()
                    .unwrap_or(DVec2::ZERO)
            })
            .collect()
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }
}

impl LibraryEntry for UvSet {
    fn id(&self) -> &str {
        &self.id
    }
}
