//! Mesh geometry extracted from a DSON geometry.
//!
//! Faces keep the indices of the source polylist so material and smoothing
//! assignments made by face index stay valid. Malformed faces remain in the
//! list as empty slots.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use dson_math::{DVec2, DVec3};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::document::{Geometry, UvSet, VertexDelta};

/// Name of the shape key holding the undeformed positions.
pub const BASIS_SHAPE_KEY: &str = "base";

/// Per-vertex weights under a name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexGroup {
    pub name: String,
    pub weights: BTreeMap<usize, f64>,
}

/// Per-face-corner UVs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UvLayer {
    pub name: String,
    /// One entry per face, one UV per face corner.
    pub uvs: Vec<Vec<DVec2>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShapeKey {
    pub name: String,
    pub positions: Vec<DVec3>,
    /// Blend weight.
    pub value: f64,
}

/// An undirected edge, lower index first.
pub type EdgeKey = (usize, usize);

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Name of the geometry the mesh was built from.
    pub name: String,

    /// Vertex positions relative to the object origin.
    pub positions: Vec<DVec3>,

    /// Vertex indices per face; malformed faces are empty.
    pub faces: Vec<Vec<usize>>,

    /// Material slot per face.
    pub face_materials: Vec<Option<usize>>,

    pub face_smooth: Vec<bool>,
    pub sharp_edges: BTreeSet<EdgeKey>,
    pub material_slots: Vec<String>,
    pub uv_layers: Vec<UvLayer>,
    pub vertex_groups: Vec<VertexGroup>,
    pub shape_keys: Vec<ShapeKey>,

    /// Vertex normals (optional - computed on request)
    pub normals: Option<Vec<DVec3>>,
}

impl Mesh {
    /// Create a mesh from positions and faces.
    pub fn new(name: impl Into<String>, positions: Vec<DVec3>, faces: Vec<Vec<usize>>) -> Self {
        let face_count = faces.len();
        Self {
            name: name.into(),
            positions,
            faces,
            face_materials: vec![None; face_count],
            face_smooth: vec![false; face_count],
            ..Default::default()
        }
    }

    /// Build a mesh from a geometry with its origin moved to `origin`.
    ///
    /// Polygon and material groups become vertex groups with weight 1.0 and
    /// the geometry's default UV set becomes the first UV layer.
    pub fn from_geometry(geometry: &Geometry, origin: DVec3, diagnostics: &mut Diagnostics) -> Self {
        let positions = geometry.vertices.iter().map(|v| *v - origin).collect();
        let vertex_count = geometry.vertices.len();

        let faces = geometry
            .polygons
            .iter()
            .enumerate()
            .map(|(i, polygon)| {
                let in_range = polygon.vertices.iter().all(|&v| v < vertex_count);
                if polygon.is_valid() && in_range {
                    polygon.vertices.clone()
                } else {
                    diagnostics.push(Diagnostic::MalformedFace {
                        geometry: geometry.id.clone(),
                        face: i,
                    });
                    Vec::new()
                }
            })
            .collect();

        let mut mesh = Mesh::new(geometry.id.clone(), positions, faces);
        for set in geometry.poly_groups().into_iter().chain(geometry.material_groups()) {
            let weights = set.vertices.into_iter().map(|v| (v, 1.0)).collect();
            mesh.add_vertex_group(set.name, weights);
        }
        if let Some(uv_set) = &geometry.default_uv_set {
            mesh.add_uv_layer(uv_set);
        }
        mesh
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Add a UV layer named after the set, unless one already exists.
    /// Returns the layer name.
    pub fn add_uv_layer(&mut self, uv_set: &UvSet) -> String {
        if self.uv_layer(&uv_set.id).is_none() {
            let uvs = self
                .faces
                .iter()
                .enumerate()
                .map(|(i, face)| uv_set.uvs_for_face(i, face))
                .collect();
            self.uv_layers.push(UvLayer {
                name: uv_set.id.clone(),
                uvs,
            });
        }
        uv_set.id.clone()
    }

    pub fn uv_layer(&self, name: &str) -> Option<&UvLayer> {
        self.uv_layers.iter().find(|l| l.name == name)
    }

    /// Add a vertex group, keeping any existing group of the same name.
    pub fn add_vertex_group(&mut self, name: impl Into<String>, weights: BTreeMap<usize, f64>) {
        self.vertex_groups.push(VertexGroup {
            name: name.into(),
            weights,
        });
    }

    /// Replace the vertex group of this name (or add it).
    pub fn set_vertex_group(&mut self, name: &str, weights: BTreeMap<usize, f64>) {
        self.vertex_groups.retain(|g| g.name != name);
        self.add_vertex_group(name, weights);
    }

    pub fn vertex_group(&self, name: &str) -> Option<&VertexGroup> {
        self.vertex_groups.iter().find(|g| g.name == name)
    }

    /// Add a shape key holding the base positions moved by `deltas`
    /// (source-space offsets). The basis key is created on first use.
    pub fn add_shape_key(&mut self, name: &str, deltas: &[VertexDelta]) {
        if self.shape_keys.is_empty() {
            self.shape_keys.push(ShapeKey {
                name: BASIS_SHAPE_KEY.to_string(),
                positions: self.positions.clone(),
                value: 0.0,
            });
        }

        let mut positions = self.positions.clone();
        for delta in deltas {
            match positions.get_mut(delta.index) {
                Some(p) => *p += delta.output_delta(),
                None => log::debug!("{}: shape key {} delta for missing vertex {}", self.name, name, delta.index),
            }
        }

        self.shape_keys.retain(|k| k.name != name);
        self.shape_keys.push(ShapeKey {
            name: name.to_string(),
            positions,
            value: 0.0,
        });
    }

    pub fn shape_key(&self, name: &str) -> Option<&ShapeKey> {
        self.shape_keys.iter().find(|k| k.name == name)
    }

    /// Set a shape key's blend weight. Returns `false` when there is none.
    pub fn set_shape_key_value(&mut self, name: &str, value: f64) -> bool {
        match self.shape_keys.iter_mut().find(|k| k.name == name) {
            Some(key) => {
                key.value = value;
                true
            }
            None => false,
        }
    }

    /// Positions with every shape key blended in.
    pub fn deformed_positions(&self) -> Vec<DVec3> {
        let mut out = self.positions.clone();
        for key in self.shape_keys.iter().filter(|k| k.value != 0.0) {
            for ((o, k), base) in out.iter_mut().zip(&key.positions).zip(&self.positions) {
                *o += (*k - *base) * key.value;
            }
        }
        out
    }

    /// Append a material slot and return its index.
    pub fn add_material_slot(&mut self, name: impl Into<String>) -> usize {
        self.material_slots.push(name.into());
        self.material_slots.len() - 1
    }

    /// Newell normal of a face, zero for empty or degenerate faces.
    pub fn face_normal(&self, face: usize) -> DVec3 {
        let Some(verts) = self.faces.get(face) else {
            return DVec3::ZERO;
        };
        let mut normal = DVec3::ZERO;
        for (i, &a) in verts.iter().enumerate() {
            let b = verts[(i + 1) % verts.len()];
            let (p, q) = (self.positions[a], self.positions[b]);
            normal += DVec3::new(
                (p.y - q.y) * (p.z + q.z),
                (p.z - q.z) * (p.x + q.x),
                (p.x - q.x) * (p.y + q.y),
            );
        }
        normal.normalize_or_zero()
    }

    /// Edges of a face in corner order.
    pub fn face_edges(&self, face: usize) -> Vec<EdgeKey> {
        let Some(verts) = self.faces.get(face) else {
            return Vec::new();
        };
        (0..verts.len())
            .map(|i| edge_key(verts[i], verts[(i + 1) % verts.len()]))
            .collect()
    }

    /// Map from each edge to the faces using it.
    pub fn edge_faces(&self) -> HashMap<EdgeKey, Vec<usize>> {
        let mut map: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
        for face in 0..self.faces.len() {
            for edge in self.face_edges(face) {
                map.entry(edge).or_default().push(face);
            }
        }
        map
    }

    /// Mark the edges of `face` sharp where the two adjacent faces meet at
    /// `angle_degrees` or more.
    pub fn mark_sharp_edges(&mut self, face: usize, angle_degrees: f64, edge_faces: &HashMap<EdgeKey, Vec<usize>>) {
        for edge in self.face_edges(face) {
            let Some(&[f0, f1]) = edge_faces.get(&edge).map(Vec::as_slice) else {
                continue;
            };
            let (n0, n1) = (self.face_normal(f0), self.face_normal(f1));
            if n0 == DVec3::ZERO || n1 == DVec3::ZERO {
                continue;
            }
            if n0.angle_between(n1).to_degrees() >= angle_degrees {
                self.sharp_edges.insert(edge);
            }
        }
    }

    /// Compute smooth vertex normals by averaging face normals.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![DVec3::ZERO; self.positions.len()];
        for face in 0..self.faces.len() {
            let n = self.face_normal(face);
            for &v in &self.faces[face] {
                normals[v] += n;
            }
        }
        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(DVec3::Y);
        }
        self.normals = Some(normals);
    }

    /// Fan-triangulate all faces.
    ///
    /// For a polygon with vertices `[0, 1, 2, 3, ...n-1]` this creates
    /// `(0,1,2), (0,2,3), ... (0,n-2,n-1)`. Empty faces produce nothing.
    pub fn triangulate(&self) -> Vec<u32> {
        let mut indices = Vec::new();
        for face in &self.faces {
            if face.len() < 3 {
                continue;
            }
            for i in 1..(face.len() - 1) {
                indices.push(face[0] as u32);
                indices.push(face[i] as u32);
                indices.push(face[i + 1] as u32);
            }
        }
        indices
    }

    /// Positions as packed `f32` triples for upload to a vertex buffer.
    pub fn position_bytes(&self) -> Vec<u8> {
        let packed: Vec<[f32; 3]> = self
            .deformed_positions()
            .iter()
            .map(|p| p.as_vec3().to_array())
            .collect();
        bytemuck::cast_slice(&packed).to_vec()
    }

    /// Triangle indices as bytes.
    pub fn index_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.triangulate()).to_vec()
    }
}

pub fn edge_key(a: usize, b: usize) -> EdgeKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::rc::Rc;

    use super::*;
    use crate::document::raw::{RawGeometry, RawUvSet};

    const EPS: f64 = 1e-9;

    /// A unit square split into two triangles folded 90 degrees along the
    /// diagonal, plus one broken face.
    fn geometry() -> Geometry {
        let raw: RawGeometry = serde_json::from_str(
            r#"{
                "id": "folded",
                "polygon_groups": { "values": ["a", "b"] },
                "polygon_material_groups": { "values": ["m"] },
                "vertices": { "values": [[0,0,0],[100,0,0],[100,100,0],[0,100,100]] },
                "polylist": { "values": [[0,0,0,1,2],[1,0,0,2,3],[1,0,3,3,0]] }
            }"#,
        )
        .unwrap();
        let uv: RawUvSet = serde_json::from_str(
            r#"{ "id": "uv", "uvs": { "values": [[0,0],[1,0],[1,1],[0,1]] } }"#,
        )
        .unwrap();
        Geometry::from_raw(raw, Path::new("/f.dsf"), Some(Rc::new(UvSet::from_raw(uv))))
    }

    #[test]
    fn test_from_geometry() {
        let mut diagnostics = Diagnostics::new();
        let mesh = Mesh::from_geometry(&geometry(), DVec3::new(1.0, 0.0, 0.0), &mut diagnostics);

        assert_eq!(mesh.vertex_count(), 4);
        assert!((mesh.positions[0] - DVec3::new(-1.0, 0.0, 0.0)).length() < EPS);
        assert_eq!(mesh.face_count(), 3);
        assert!(mesh.faces[2].is_empty());
        assert_eq!(diagnostics.len(), 1);

        assert_eq!(mesh.vertex_groups.len(), 3);
        assert_eq!(mesh.vertex_group("b").unwrap().weights.len(), 3);
        assert_eq!(mesh.vertex_group("m").unwrap().weights.len(), 4);

        let layer = mesh.uv_layer("uv").unwrap();
        assert_eq!(layer.uvs[1], vec![DVec2::new(0.0, 0.0), DVec2::new(1.0, 1.0), DVec2::new(0.0, 1.0)]);
        assert!(layer.uvs[2].is_empty());
    }

    #[test]
    fn test_triangulate_skips_empty_faces() {
        let mesh = Mesh::new(
            "quad",
            vec![DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::Y],
            vec![vec![0, 1, 2, 3], vec![]],
        );
        assert_eq!(mesh.triangulate(), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.index_bytes().len(), 6 * 4);
        assert_eq!(mesh.position_bytes().len(), 4 * 12);
    }

    #[test]
    fn test_sharp_edges_by_angle() {
        let mut mesh = Mesh::from_geometry(&geometry(), DVec3::ZERO, &mut Diagnostics::new());
        let edge_faces = mesh.edge_faces();

        // The two faces meet at about 54.7 degrees.
        mesh.mark_sharp_edges(0, 45.0, &edge_faces);
        assert_eq!(mesh.sharp_edges.len(), 1);
        assert!(mesh.sharp_edges.contains(&(0, 2)));

        let mut flat = Mesh::from_geometry(&geometry(), DVec3::ZERO, &mut Diagnostics::new());
        flat.mark_sharp_edges(0, 60.0, &edge_faces);
        assert!(flat.sharp_edges.is_empty());
    }

    #[test]
    fn test_shape_keys() {
        let mut mesh = Mesh::new("m", vec![DVec3::ZERO, DVec3::X], vec![]);
        mesh.add_shape_key(
            "Smile",
            &[VertexDelta {
                index: 1,
                delta: DVec3::new(0.0, 0.0, 100.0),
            }],
        );
        assert_eq!(mesh.shape_keys[0].name, BASIS_SHAPE_KEY);
        assert!((mesh.shape_key("Smile").unwrap().positions[1] - DVec3::new(1.0, -1.0, 0.0)).length() < EPS);

        assert!(mesh.set_shape_key_value("Smile", 0.5));
        assert!(!mesh.set_shape_key_value("Frown", 0.5));
        assert!((mesh.deformed_positions()[1] - DVec3::new(1.0, -0.5, 0.0)).length() < EPS);
    }

    #[test]
    fn test_vertex_group_replace() {
        let mut mesh = Mesh::new("m", vec![DVec3::ZERO], vec![]);
        mesh.set_vertex_group("hip", BTreeMap::from([(0, 0.5)]));
        mesh.set_vertex_group("hip", BTreeMap::from([(0, 1.0)]));
        assert_eq!(mesh.vertex_groups.len(), 1);
        assert_eq!(mesh.vertex_group("hip").unwrap().weights[&0], 1.0);
    }

    #[test]
    fn test_compute_normals() {
        let mut mesh = Mesh::new("tri", vec![DVec3::ZERO, DVec3::X, DVec3::Y], vec![vec![0, 1, 2]]);
        mesh.compute_normals();
        for n in mesh.normals.as_ref().unwrap() {
            assert!((n.z - 1.0).abs() < EPS);
        }
    }
}
