//! Geometry templates.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use dson_math::{point_to_output, DVec3};

use super::library::LibraryEntry;
use super::raw::RawGeometry;
use super::uv_set::UvSet;

/// One polylist entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    pub poly_group: Option<usize>,
    pub material_group: Option<usize>,
    pub vertices: Vec<usize>,
}

impl Polygon {
    /// At least three distinct vertices.
    pub fn is_valid(&self) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        let unique: BTreeSet<_> = self.vertices.iter().collect();
        unique.len() == self.vertices.len()
    }
}

/// A named set of vertex indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexSet {
    pub name: String,
    pub vertices: BTreeSet<usize>,
}

#[derive(Clone, Debug)]
pub struct Geometry {
    pub id: String,

    /// Document this geometry was defined in.
    pub source_path: PathBuf,

    /// Output-space vertex positions.
    pub vertices: Vec<DVec3>,

    pub polygons: Vec<Polygon>,
    pub poly_group_names: Vec<String>,
    pub material_group_names: Vec<String>,
    pub default_uv_set: Option<Rc<UvSet>>,
}

impl Geometry {
    pub fn from_raw(raw: RawGeometry, source_path: &Path, default_uv_set: Option<Rc<UvSet>>) -> Self {
        let vertices = raw
            .vertices
            .values
            .iter()
            .map(|&[x, y, z]| point_to_output(DVec3::new(x, y, z)))
            .collect();

        let polygons = raw
            .polylist
            .values
            .into_iter()
            .map(|entry| match entry.as_slice() {
                [poly, mat, verts @ ..] => Polygon {
                    poly_group: Some(*poly),
                    material_group: Some(*mat),
                    vertices: verts.to_vec(),
                },
                _ => Polygon::default(),
            })
            .collect();

        Self {
            id: raw.id,
            source_path: source_path.to_path_buf(),
            vertices,
            polygons,
            poly_group_names: raw.polygon_groups.values,
            material_group_names: raw.polygon_material_groups.values,
            default_uv_set,
        }
    }

    /// Vertex sets of all polygon groups, in declaration order.
    pub fn poly_groups(&self) -> Vec<VertexSet> {
        self.group_sets(&self.poly_group_names, |p| p.poly_group)
    }

    /// Vertex sets of all material groups, in declaration order.
    pub fn material_groups(&self) -> Vec<VertexSet> {
        self.group_sets(&self.material_group_names, |p| p.material_group)
    }

    /// Indices of the polygons assigned to a material group.
    pub fn material_group_faces(&self, name: &str) -> BTreeSet<usize> {
        let Some(group) = self.material_group_names.iter().position(|n| n == name) else {
            return BTreeSet::new();
        };
        self.polygons
            .iter()
            .enumerate()
            .filter(|(_, p)| p.material_group == Some(group))
            .map(|(i, _)| i)
            .collect()
    }

    fn group_sets(&self, names: &[String], group_of: impl Fn(&Polygon) -> Option<usize>) -> Vec<VertexSet> {
        let mut sets: Vec<VertexSet> = names
            .iter()
            .map(|name| VertexSet {
                name: name.clone(),
                vertices: BTreeSet::new(),
            })
            .collect();
        for polygon in &self.polygons {
            let Some(set) = group_of(polygon).and_then(|g| sets.get_mut(g)) else {
                continue;
            };
            set.vertices.extend(polygon.vertices.iter().copied());
        }
        sets
    }

    /// Directory the geometry's document lives in.
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_path.parent()
    }
}

impl LibraryEntry for Geometry {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_and_tri() -> Geometry {
        let raw: RawGeometry = serde_json::from_str(
            r#"{
                "id": "plane",
                "polygon_groups": { "values": ["Head", "Body"] },
                "polygon_material_groups": { "values": ["Skin", "Nails"] },
                "vertices": { "values": [[0,0,0],[100,0,0],[100,100,0],[0,100,0],[50,150,0]] },
                "polylist": { "values": [[0, 0, 0, 1, 2, 3], [1, 1, 3, 2, 4], [1]] }
            }"#,
        )
        .unwrap();
        Geometry::from_raw(raw, Path::new("/lib/data/plane.dsf"), None)
    }

    #[test]
    fn test_vertices_in_output_space() {
        let geom = quad_and_tri();
        assert_eq!(geom.vertices[1], DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(geom.vertices[3], DVec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_polygons_keep_order_and_malformed_slots() {
        let geom = quad_and_tri();
        assert_eq!(geom.polygons.len(), 3);
        assert_eq!(geom.polygons[0].vertices, vec![0, 1, 2, 3]);
        assert!(geom.polygons[1].is_valid());
        assert!(!geom.polygons[2].is_valid());
    }

    #[test]
    fn test_groups() {
        let geom = quad_and_tri();
        let polys = geom.poly_groups();
        assert_eq!(polys[0].name, "Head");
        assert_eq!(polys[1].vertices.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);

        assert_eq!(geom.material_group_faces("Nails").into_iter().collect::<Vec<_>>(), vec![1]);
        assert!(geom.material_group_faces("Missing").is_empty());
        assert_eq!(geom.source_dir(), Some(Path::new("/lib/data")));
    }

    #[test]
    fn test_repeated_vertex_is_invalid() {
        let p = Polygon {
            poly_group: Some(0),
            material_group: Some(0),
            vertices: vec![1, 2, 1],
        };
        assert!(!p.is_valid());
    }
}
