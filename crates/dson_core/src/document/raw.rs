//! Raw DSON records for intermediate representation.
//!
//! These types mirror the JSON layout of a `.duf`/`.dsf` file and are
//! converted into library entries and scene instances right after parsing.
//! Unknown fields are ignored.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A whole DSON file.
#[derive(Clone, Debug, Deserialize)]
pub struct RawDocument {
    pub asset_info: RawAssetInfo,

    #[serde(default)]
    pub uv_set_library: Vec<RawUvSet>,

    #[serde(default)]
    pub geometry_library: Vec<RawGeometry>,

    #[serde(default)]
    pub material_library: Vec<RawMaterial>,

    #[serde(default)]
    pub image_library: Vec<RawImage>,

    #[serde(default)]
    pub node_library: Vec<RawNode>,

    #[serde(default)]
    pub modifier_library: Vec<RawModifier>,

    #[serde(default)]
    pub scene: RawScene,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawAssetInfo {
    pub id: String,
}

/// The common `{ "count": n, "values": [...] }` wrapper.
#[derive(Clone, Debug, Deserialize)]
pub struct RawValues<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

impl<T> Default for RawValues<T> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawUvSet {
    pub id: String,

    #[serde(default)]
    pub uvs: RawValues<[f64; 2]>,

    /// `(face, vertex, uv_index)` overrides
    #[serde(default)]
    pub polygon_vertex_indices: Vec<[usize; 3]>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawGeometry {
    pub id: String,

    #[serde(default)]
    pub polygon_groups: RawValues<String>,

    #[serde(default)]
    pub polygon_material_groups: RawValues<String>,

    #[serde(default)]
    pub vertices: RawValues<[f64; 3]>,

    /// `[poly_group, material_group, v0, v1, ...]` per polygon
    #[serde(default)]
    pub polylist: RawValues<Vec<usize>>,

    #[serde(default)]
    pub default_uv_set: Option<String>,
}

/// One entry of a node's `center_point`/`rotation`/... arrays.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawAxisChannel {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub value: Option<f64>,

    #[serde(default)]
    pub current_value: Option<f64>,
}

/// A single float channel such as `general_scale`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawScalarChannel {
    #[serde(default)]
    pub value: Option<f64>,

    #[serde(default)]
    pub current_value: Option<f64>,
}

/// A `node_library` entry or a `scene.nodes` instance.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawNode {
    pub id: String,

    /// Template reference (scene instances only)
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub parent: Option<String>,

    #[serde(default)]
    pub conform_target: Option<String>,

    #[serde(default)]
    pub rotation_order: Option<String>,

    #[serde(default)]
    pub inherits_scale: Option<bool>,

    #[serde(default)]
    pub center_point: Vec<RawAxisChannel>,

    #[serde(default)]
    pub end_point: Vec<RawAxisChannel>,

    #[serde(default)]
    pub orientation: Vec<RawAxisChannel>,

    #[serde(default)]
    pub rotation: Vec<RawAxisChannel>,

    #[serde(default)]
    pub translation: Vec<RawAxisChannel>,

    #[serde(default)]
    pub scale: Vec<RawAxisChannel>,

    #[serde(default)]
    pub general_scale: Option<RawScalarChannel>,

    #[serde(default)]
    pub geometries: Vec<RawGeometryRef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawGeometryRef {
    pub url: String,

    #[serde(default)]
    pub id: Option<String>,
}

/// A `{ "channel": {...}, "group": "..." }` wrapper.
#[derive(Clone, Debug, Deserialize)]
pub struct RawChannelEntry {
    pub channel: RawChannel,

    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawChannel {
    pub id: String,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub value: Option<Value>,

    #[serde(default)]
    pub current_value: Option<Value>,

    #[serde(default)]
    pub visible: Option<bool>,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub image_file: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawExtra {
    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub channels: Vec<RawChannelEntry>,
}

/// A `material_library` entry or a `scene.materials` instance.
///
/// Standard channels (`diffuse`, `bump`, ...) sit at the top level next to
/// the bookkeeping fields, so they are collected through `fields`.
#[derive(Clone, Debug, Deserialize)]
pub struct RawMaterial {
    pub id: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub uv_set: Option<String>,

    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub geometry: Option<String>,

    #[serde(default)]
    pub extra: Vec<RawExtra>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawImage {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub map_gamma: Option<f64>,

    #[serde(default)]
    pub map: Vec<RawImageMap>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawImageMap {
    #[serde(default)]
    pub url: Option<String>,
}

/// A `modifier_library` entry or a `scene.modifiers` instance.
#[derive(Clone, Debug, Deserialize)]
pub struct RawModifier {
    pub id: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub parent: Option<String>,

    #[serde(default)]
    pub channel: Option<RawChannel>,

    #[serde(default)]
    pub group: Option<String>,

    #[serde(default)]
    pub morph: Option<RawMorph>,

    #[serde(default)]
    pub formulas: Option<Vec<RawFormula>>,

    #[serde(default)]
    pub skin: Option<RawSkin>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawMorph {
    #[serde(default)]
    pub vertex_count: Option<usize>,

    /// `[vertex_index, dx, dy, dz]` in source units
    #[serde(default)]
    pub deltas: RawValues<[f64; 4]>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawFormula {
    pub output: String,

    #[serde(default)]
    pub operations: Vec<RawOperation>,

    #[serde(default)]
    pub stage: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawOperation {
    pub op: String,

    /// A number for `push`; other operations may carry arrays.
    #[serde(default)]
    pub val: Option<Value>,

    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawSkin {
    #[serde(default)]
    pub node: Option<String>,

    #[serde(default)]
    pub geometry: Option<String>,

    #[serde(default)]
    pub joints: Vec<RawJoint>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawJoint {
    pub id: String,

    pub node: String,

    #[serde(default)]
    pub local_weights: Option<RawLocalWeights>,

    #[serde(default)]
    pub node_weights: Option<RawValues<(usize, f64)>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawLocalWeights {
    #[serde(default)]
    pub x: Option<RawValues<(usize, f64)>>,

    #[serde(default)]
    pub y: Option<RawValues<(usize, f64)>>,

    #[serde(default)]
    pub z: Option<RawValues<(usize, f64)>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawScene {
    #[serde(default)]
    pub nodes: Vec<RawNode>,

    #[serde(default)]
    pub materials: Vec<RawMaterial>,

    #[serde(default)]
    pub modifiers: Vec<RawModifier>,

    #[serde(default)]
    pub animations: Vec<RawAnimation>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawAnimation {
    pub url: String,

    /// `[time, value]` pairs
    #[serde(default)]
    pub keys: Vec<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document() {
        let doc: RawDocument = serde_json::from_str(r#"{ "asset_info": { "id": "/a.dsf" } }"#).unwrap();
        assert_eq!(doc.asset_info.id, "/a.dsf");
        assert!(doc.node_library.is_empty());
        assert!(doc.scene.nodes.is_empty());
    }

    #[test]
    fn test_material_collects_standard_channels() {
        let mat: RawMaterial = serde_json::from_str(
            r#"{
                "id": "skin",
                "diffuse": { "channel": { "id": "diffuse_color", "type": "color", "value": [1, 0.5, 0.25] } },
                "extra": [ { "type": "studio_material_channels", "channels": [] } ]
            }"#,
        )
        .unwrap();
        assert!(mat.fields.contains_key("diffuse"));
        assert!(!mat.fields.contains_key("id"));
        assert_eq!(mat.extra[0].kind, "studio_material_channels");
    }

    #[test]
    fn test_joint_weights_as_pairs() {
        let joint: RawJoint = serde_json::from_str(
            r##"{ "id": "hip", "node": "#hip", "node_weights": { "count": 2, "values": [[0, 1.0], [4, 0.25]] } }"##,
        )
        .unwrap();
        assert_eq!(joint.node_weights.unwrap().values, vec![(0, 1.0), (4, 0.25)]);
    }
}
