//! Node templates.
//!
//! Values are stored as authored (source space, centimeters, degrees) and
//! converted on access.

use dson_math::{
    point_to_output, rotation_to_output, scale_to_output, DVec3, RotationOrder,
};

use super::library::LibraryEntry;
use super::raw::{RawAxisChannel, RawNode};

/// Kind of scene node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum NodeKind {
    #[default]
    Node,
    Bone,
    Figure,
    Other(String),
}

impl NodeKind {
    pub fn parse(s: &str) -> NodeKind {
        match s {
            "node" => NodeKind::Node,
            "bone" => NodeKind::Bone,
            "figure" => NodeKind::Figure,
            other => NodeKind::Other(other.to_string()),
        }
    }

    /// Figures and bones both become armature bones.
    pub fn is_skeletal(&self) -> bool {
        matches!(self, NodeKind::Bone | NodeKind::Figure)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub label: String,
    pub kind: NodeKind,
    pub parent: Option<String>,
    pub inherits_scale: bool,
    pub general_scale: f64,

    source_rotation_order: RotationOrder,
    source_center_point: DVec3,
    source_end_point: DVec3,
    source_orientation: DVec3,
    source_rotation: DVec3,
    source_translation: DVec3,
    source_scale: DVec3,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            label: id.clone(),
            id,
            kind: NodeKind::Node,
            parent: None,
            inherits_scale: true,
            general_scale: 1.0,
            source_rotation_order: RotationOrder::XYZ,
            source_center_point: DVec3::ZERO,
            source_end_point: DVec3::ZERO,
            source_orientation: DVec3::ZERO,
            source_rotation: DVec3::ZERO,
            source_translation: DVec3::ZERO,
            source_scale: DVec3::ONE,
        }
    }

    /// Build a template from a `node_library` entry.
    pub fn from_raw(raw: &RawNode) -> Self {
        let mut node = Node::new(raw.id.clone());
        if let Some(name) = &raw.name {
            node.name = name.clone();
        }
        node.label = raw.label.clone().unwrap_or_else(|| node.name.clone());
        node.apply(raw);
        node
    }

    /// Overlay the fields present in `raw`. Scene instances use this to
    /// override their template.
    pub fn apply(&mut self, raw: &RawNode) {
        if let Some(kind) = &raw.kind {
            self.kind = NodeKind::parse(kind);
        }
        if let Some(parent) = &raw.parent {
            self.parent = Some(parent.clone());
        }
        if let Some(order) = &raw.rotation_order {
            match order.parse() {
                Ok(order) => self.source_rotation_order = order,
                Err(e) => log::warn!("Node {}: {}", self.id, e),
            }
        }
        if let Some(inherits) = raw.inherits_scale {
            self.inherits_scale = inherits;
        }
        merge_axes(&mut self.source_center_point, &raw.center_point);
        merge_axes(&mut self.source_end_point, &raw.end_point);
        merge_axes(&mut self.source_orientation, &raw.orientation);
        merge_axes(&mut self.source_rotation, &raw.rotation);
        merge_axes(&mut self.source_translation, &raw.translation);
        merge_axes(&mut self.source_scale, &raw.scale);
        if let Some(general) = &raw.general_scale {
            if let Some(v) = general.current_value.or(general.value) {
                self.general_scale = v;
            }
        }
    }

    /// Rotation order in the output frame.
    pub fn rotation_order(&self) -> RotationOrder {
        self.source_rotation_order.to_output()
    }

    /// Rotation order as authored.
    pub fn source_rotation_order(&self) -> RotationOrder {
        self.source_rotation_order
    }

    pub fn center_point(&self) -> DVec3 {
        point_to_output(self.source_center_point)
    }

    pub fn end_point(&self) -> DVec3 {
        point_to_output(self.source_end_point)
    }

    /// Orientation in radians, output axes.
    pub fn orientation(&self) -> DVec3 {
        rotation_to_output(self.source_orientation)
    }

    /// Rotation in radians, output axes.
    pub fn rotation(&self) -> DVec3 {
        rotation_to_output(self.source_rotation)
    }

    /// Rotation in degrees, source axes.
    pub fn source_rotation(&self) -> DVec3 {
        self.source_rotation
    }

    pub fn translation(&self) -> DVec3 {
        point_to_output(self.source_translation)
    }

    pub fn scale(&self) -> DVec3 {
        scale_to_output(self.source_scale)
    }

    pub fn is_bone(&self) -> bool {
        self.kind == NodeKind::Bone
    }

    pub fn is_figure(&self) -> bool {
        self.kind == NodeKind::Figure
    }
}

impl LibraryEntry for Node {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Fold `[{id, value, current_value}]` entries into a vector. The current
/// value wins over the authored one; entries without either are ignored.
fn merge_axes(target: &mut DVec3, channels: &[RawAxisChannel]) {
    for channel in channels {
        let index = match channel.id.as_deref() {
            Some("x") => 0,
            Some("y") => 1,
            Some("z") => 2,
            _ => continue,
        };
        if let Some(v) = channel.current_value.or(channel.value) {
            target[index] = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn raw(json: &str) -> RawNode {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let node = Node::from_raw(&raw(r#"{ "id": "hip" }"#));
        assert_eq!(node.name, "hip");
        assert_eq!(node.label, "hip");
        assert_eq!(node.kind, NodeKind::Node);
        assert!(node.inherits_scale);
        assert_eq!(node.scale(), DVec3::ONE);
        assert_eq!(node.general_scale, 1.0);
        assert_eq!(node.rotation_order().to_string(), "XZY");
    }

    #[test]
    fn test_output_space_accessors() {
        let node = Node::from_raw(&raw(
            r#"{
                "id": "lThigh", "name": "lThigh", "label": "Left Thigh", "type": "bone",
                "rotation_order": "YZX",
                "center_point": [ {"id": "x", "value": 10}, {"id": "y", "value": 90}, {"id": "z", "value": 5} ],
                "rotation": [ {"id": "x", "value": 90}, {"id": "y", "value": 0, "current_value": 180} ],
                "scale": [ {"id": "y", "value": 2} ]
            }"#,
        ));
        assert!(node.is_bone());
        assert_eq!(node.label, "Left Thigh");
        assert_eq!(node.rotation_order().to_string(), "ZYX");
        assert!((node.center_point() - DVec3::new(0.1, -0.05, 0.9)).length() < EPS);

        let rot = node.rotation();
        assert!((rot.x - std::f64::consts::FRAC_PI_2).abs() < EPS);
        assert!((rot.z - std::f64::consts::PI).abs() < EPS);
        assert_eq!(node.scale(), DVec3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn test_instance_overrides_template() {
        let mut node = Node::from_raw(&raw(
            r#"{ "id": "hip", "type": "bone", "translation": [ {"id": "x", "value": 1} ] }"#,
        ));
        node.apply(&raw(
            r##"{ "id": "hip-1", "parent": "#Genesis", "translation": [ {"id": "z", "value": 3} ],
                 "general_scale": { "value": 1, "current_value": 0.5 } }"##,
        ));
        assert!(node.is_bone());
        assert_eq!(node.parent.as_deref(), Some("#Genesis"));
        assert!((node.translation() - DVec3::new(0.01, -0.03, 0.0)).length() < EPS);
        assert_eq!(node.general_scale, 0.5);
    }

    #[test]
    fn test_bad_rotation_order_keeps_previous() {
        let node = Node::from_raw(&raw(r#"{ "id": "a", "rotation_order": "XXY" }"#));
        assert_eq!(node.source_rotation_order(), RotationOrder::XYZ);
    }
}
