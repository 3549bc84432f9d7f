//! Material templates.

use std::collections::BTreeMap;

use super::channel::Channel;
use super::library::LibraryEntry;
use super::raw::{RawExtra, RawMaterial};

/// Channels a material may carry at its top level.
pub const STANDARD_CHANNELS: &[&str] = &[
    "diffuse",
    "diffuse_strength",
    "specular",
    "specular_strength",
    "glossiness",
    "ambient",
    "ambient_strength",
    "reflection",
    "reflection_strength",
    "refraction",
    "refraction_strength",
    "ior",
    "bump",
    "bump_min",
    "bump_max",
    "displacement",
    "displacement_min",
    "displacement_max",
    "transparency",
    "normal",
    "u_offset",
    "v_offset",
    "v_scale",
];

/// Extra channel block (`studio_material_channels` and the like).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extra {
    pub kind: String,
    pub channels: BTreeMap<String, Channel>,
}

impl Extra {
    pub fn from_raw(raw: RawExtra) -> Self {
        let channels = raw
            .channels
            .into_iter()
            .map(Channel::from_entry)
            .map(|c| (c.id.clone(), c))
            .collect();
        Self {
            kind: raw.kind,
            channels,
        }
    }

    /// Merge matching channels, add the rest.
    pub fn merge(&mut self, other: Extra) {
        for (id, channel) in other.channels {
            match self.channels.get_mut(&id) {
                Some(mine) => mine.merge(&channel),
                None => {
                    self.channels.insert(id, channel);
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub id: String,
    pub kind: String,
    pub channels: BTreeMap<String, Channel>,
    pub extras: Vec<Extra>,
    pub uv_set: Option<String>,
    pub groups: Vec<String>,
    pub geometry: Option<String>,
}

impl Material {
    pub fn from_raw(raw: RawMaterial) -> Self {
        let mut material = Material {
            id: raw.id.clone(),
            kind: raw.kind.clone().unwrap_or_else(|| "unknown".to_string()),
            ..Default::default()
        };
        material.parse_channels(&raw);
        material.parse_extras(raw.extra);
        material.uv_set = raw.uv_set;
        material.groups = raw.groups;
        material.geometry = raw.geometry;
        material
    }

    /// Apply a scene instance on top of this template.
    pub fn update(&mut self, raw: RawMaterial) {
        self.groups = raw.groups.clone();
        if raw.geometry.is_some() {
            self.geometry = raw.geometry.clone();
        }
        self.parse_channels(&raw);
        self.parse_extras(raw.extra);
        if raw.uv_set.is_some() {
            self.uv_set = raw.uv_set;
        }
    }

    fn parse_channels(&mut self, raw: &RawMaterial) {
        for name in STANDARD_CHANNELS {
            let Some(value) = raw.fields.get(*name) else {
                continue;
            };
            match serde_json::from_value(value.clone()) {
                Ok(entry) => {
                    self.channels.insert(name.to_string(), Channel::from_entry(entry));
                }
                Err(e) => log::warn!("Material {}: bad channel {}: {}", self.id, name, e),
            }
        }
    }

    fn parse_extras(&mut self, extras: Vec<RawExtra>) {
        for raw in extras {
            let extra = Extra::from_raw(raw);
            match self.extras.iter_mut().find(|e| e.kind == extra.kind) {
                Some(prev) => prev.merge(extra),
                None => self.extras.push(extra),
            }
        }
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn find_extra(&self, kind: &str) -> Option<&Extra> {
        self.extras.iter().find(|e| e.kind == kind)
    }

    /// First extra channel with the given id, across all extras.
    pub fn find_extra_channel(&self, id: &str) -> Option<&Channel> {
        self.extras.iter().find_map(|e| e.channels.get(id))
    }
}

impl LibraryEntry for Material {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawMaterial {
        serde_json::from_str(json).unwrap()
    }

    fn template() -> Material {
        Material::from_raw(raw(
            r#"{
                "id": "Torso", "type": "studio/material/uber_iray", "uv_set": "/data/uv.dsf#Base",
                "diffuse": { "channel": { "id": "diffuse", "type": "color", "value": [1, 1, 1], "image_file": "/a.jpg" } },
                "extra": [ { "type": "studio_material_channels", "channels": [
                    { "channel": { "id": "Smooth On", "type": "bool", "value": false } },
                    { "channel": { "id": "Bump Strength", "type": "float", "value": 0.2 } }
                ] } ]
            }"#,
        ))
    }

    #[test]
    fn test_template_channels() {
        let mat = template();
        assert_eq!(mat.kind, "studio/material/uber_iray");
        assert_eq!(mat.channel("diffuse").unwrap().image_file.as_deref(), Some("/a.jpg"));
        assert_eq!(mat.find_extra_channel("Bump Strength").unwrap().current_f64(), Some(0.2));
        assert!(mat.channel("normal").is_none());
    }

    #[test]
    fn test_instance_update() {
        let mut mat = template();
        mat.update(raw(
            r##"{
                "id": "Torso-1", "url": "/data/fig.dsf#Torso", "groups": ["Torso"], "geometry": "#geom",
                "extra": [ { "type": "studio_material_channels", "channels": [
                    { "channel": { "id": "Smooth On", "type": "bool", "current_value": true } },
                    { "channel": { "id": "Smooth Angle", "type": "float", "value": 60 } }
                ] } ]
            }"##,
        ));
        assert_eq!(mat.groups, vec!["Torso"]);
        assert_eq!(mat.geometry.as_deref(), Some("#geom"));
        assert_eq!(mat.uv_set.as_deref(), Some("/data/uv.dsf#Base"));
        assert_eq!(mat.extras.len(), 1);

        let extra = mat.find_extra("studio_material_channels").unwrap();
        assert_eq!(extra.channels["Smooth On"].current_bool(), Some(true));
        assert_eq!(extra.channels["Smooth Angle"].current_f64(), Some(60.0));
        assert_eq!(extra.channels["Bump Strength"].current_f64(), Some(0.2));
    }
}
