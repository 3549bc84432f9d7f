//! Modifier templates: morphs and skins.

use dson_math::{point_to_output, DVec3};

use super::channel::Channel;
use super::library::LibraryEntry;
use super::raw::{RawJoint, RawModifier, RawSkin};
use crate::formula::Formula;

/// One `[index, dx, dy, dz]` morph delta.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexDelta {
    pub index: usize,
    /// Offset in source space.
    pub delta: DVec3,
}

impl VertexDelta {
    pub fn output_delta(&self) -> DVec3 {
        point_to_output(self.delta)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Morph {
    /// Present when the modifier carries a `morph` block (shape key data).
    pub deltas: Option<Vec<VertexDelta>>,
    pub formulas: Vec<Formula>,
}

/// Per-axis weights of a joint. `y` holds the source `z` list and `z` the
/// source `y` list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalWeights {
    pub x: Vec<(usize, f64)>,
    pub y: Vec<(usize, f64)>,
    pub z: Vec<(usize, f64)>,
}

impl LocalWeights {
    pub fn axis(&self, index: usize) -> &[(usize, f64)] {
        match index {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Joint {
    pub id: String,
    /// Reference to the bone node, e.g. `#lThigh`.
    pub node: String,
    pub local_weights: Option<LocalWeights>,
    pub node_weights: Option<Vec<(usize, f64)>>,
}

impl Joint {
    pub fn from_raw(raw: RawJoint) -> Joint {
        let local_weights = raw.local_weights.map(|lw| LocalWeights {
            x: lw.x.map(|v| v.values).unwrap_or_default(),
            y: lw.z.map(|v| v.values).unwrap_or_default(),
            z: lw.y.map(|v| v.values).unwrap_or_default(),
        });
        Joint {
            id: raw.id,
            node: raw.node,
            local_weights,
            node_weights: raw.node_weights.map(|v| v.values),
        }
    }

    /// Node id without the leading `#`.
    pub fn bone_id(&self) -> &str {
        self.node.strip_prefix('#').unwrap_or(&self.node)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Skin {
    pub node: Option<String>,
    pub geometry: Option<String>,
    /// One joint per node, last entry wins.
    pub joints: Vec<Joint>,
}

impl Skin {
    pub fn from_raw(raw: RawSkin) -> Skin {
        let mut joints: Vec<Joint> = Vec::with_capacity(raw.joints.len());
        for joint in raw.joints.into_iter().map(Joint::from_raw) {
            match joints.iter_mut().find(|j| j.node == joint.node) {
                Some(prev) => *prev = joint,
                None => joints.push(joint),
            }
        }
        Skin {
            node: raw.node,
            geometry: raw.geometry,
            joints,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum ModifierKind {
    Morph(Morph),
    Skin(Skin),
    #[default]
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Modifier {
    pub id: String,
    pub name: String,
    pub parent: Option<String>,
    pub channel: Option<Channel>,
    pub kind: ModifierKind,
}

impl Modifier {
    pub fn from_raw(raw: RawModifier) -> Modifier {
        let channel = raw.channel.map(|c| Channel::from_raw(c, raw.group.clone()));

        let kind = if let Some(skin) = raw.skin {
            ModifierKind::Skin(Skin::from_raw(skin))
        } else if raw.morph.is_some() || raw.formulas.is_some() {
            let deltas = raw.morph.map(|m| {
                m.deltas
                    .values
                    .iter()
                    .map(|&[index, x, y, z]| VertexDelta {
                        index: index as usize,
                        delta: DVec3::new(x, y, z),
                    })
                    .collect()
            });
            let formulas = raw
                .formulas
                .unwrap_or_default()
                .iter()
                .map(Formula::from_raw)
                .collect();
            ModifierKind::Morph(Morph { deltas, formulas })
        } else {
            ModifierKind::Unknown
        };

        Modifier {
            name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            parent: raw.parent,
            channel,
            kind,
        }
    }

    pub fn morph(&self) -> Option<&Morph> {
        match &self.kind {
            ModifierKind::Morph(m) => Some(m),
            _ => None,
        }
    }

    pub fn skin(&self) -> Option<&Skin> {
        match &self.kind {
            ModifierKind::Skin(s) => Some(s),
            _ => None,
        }
    }
}

impl LibraryEntry for Modifier {
    fn id(&self) -> &str {
        &self.id
    }
}
