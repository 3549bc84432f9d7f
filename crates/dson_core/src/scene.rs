//! Scene instances.
//!
//! A document's `scene` section instantiates library templates. Node,
//! material and modifier instances reference their template and carry their
//! own overrides on top of it.

use std::rc::Rc;

use dson_math::DVec3;
use serde_json::Value;

use crate::document::channel::Channel;
use crate::document::geometry::Geometry;
use crate::document::material::Material;
use crate::document::modifier::Modifier;
use crate::document::node::Node;
use crate::document::raw::{RawAnimation, RawMaterial, RawModifier, RawNode, RawScene};
use crate::document::resolver::Resolver;
use crate::document::Libraries;
use crate::error::{DsonError, DsonResult};

/// A geometry attached to a node instance.
#[derive(Clone, Debug)]
pub struct GeometryInstance {
    pub id: String,
    pub url: String,
    pub geometry: Rc<Geometry>,
}

#[derive(Clone, Debug)]
pub struct NodeInstance {
    pub id: String,
    pub url: String,
    pub name: String,
    pub label: String,
    pub conform_target: Option<String>,
    pub template: Rc<Node>,
    /// The template with this instance's overrides applied.
    pub node: Node,
    pub geometries: Vec<GeometryInstance>,
}

impl NodeInstance {
    pub(crate) fn build(raw: &RawNode, resolver: &Resolver, libraries: &Libraries) -> DsonResult<Self> {
        let url = require_url(&raw.id, raw.url.as_deref())?;
        let template = resolver.find(libraries, url, |l| &l.nodes)?;

        let mut node = (*template).clone();
        node.apply(raw);

        let geometries = raw
            .geometries
            .iter()
            .map(|g| {
                let geometry = resolver.find(libraries, &g.url, |l| &l.geometries)?;
                Ok(GeometryInstance {
                    id: g.id.clone().unwrap_or_else(|| geometry.id.clone()),
                    url: g.url.clone(),
                    geometry,
                })
            })
            .collect::<DsonResult<Vec<_>>>()?;

        let name = raw.name.clone().unwrap_or_else(|| raw.id.clone());
        Ok(Self {
            id: raw.id.clone(),
            url: url.to_string(),
            label: raw.label.clone().unwrap_or_else(|| template.label.clone()),
            name,
            conform_target: raw.conform_target.clone(),
            template,
            node,
            geometries,
        })
    }

    /// Id of the template node.
    pub fn template_id(&self) -> &str {
        &self.template.id
    }

    pub fn parent(&self) -> Option<&str> {
        self.node.parent.as_deref()
    }
}

#[derive(Clone, Debug)]
pub struct MaterialInstance {
    pub id: String,
    pub url: String,
    /// Deep copy of the template with the instance applied.
    pub material: Material,
}

impl MaterialInstance {
    pub(crate) fn build(raw: &RawMaterial, resolver: &Resolver, libraries: &Libraries) -> DsonResult<Self> {
        let url = require_url(&raw.id, raw.url.as_deref())?;
        let template = resolver.find(libraries, url, |l| &l.materials)?;
        let mut material = (*template).clone();
        material.update(raw.clone());
        Ok(Self {
            id: raw.id.clone(),
            url: url.to_string(),
            material,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ModifierInstance {
    pub id: String,
    pub url: String,
    pub parent: Option<String>,
    pub channel: Option<Channel>,
    /// Shared template.
    pub modifier: Rc<Modifier>,
}

impl ModifierInstance {
    pub(crate) fn build(raw: &RawModifier, resolver: &Resolver, libraries: &Libraries) -> DsonResult<Self> {
        let url = require_url(&raw.id, raw.url.as_deref())?;
        let modifier = resolver.find(libraries, url, |l| &l.modifiers)?;
        Ok(Self {
            id: raw.id.clone(),
            url: url.to_string(),
            parent: raw.parent.clone(),
            channel: raw
                .channel
                .clone()
                .map(|c| Channel::from_raw(c, raw.group.clone())),
            modifier,
        })
    }
}

/// One animated property with its first key.
#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    pub url: String,
    /// Bone the animation targets, when the url has the expected shape.
    pub bone: Option<String>,
    pub first_value: Option<f64>,
}

impl Animation {
    fn from_raw(raw: &RawAnimation) -> Self {
        let bone = raw
            .url
            .split('/')
            .nth(3)
            .map(|segment| segment.split(':').next().unwrap_or(segment).to_string());
        let first_value = raw
            .keys
            .first()
            .and_then(|key| key.get(1))
            .and_then(Value::as_f64);
        Self {
            url: raw.url.clone(),
            bone,
            first_value,
        }
    }
}

/// Source-space rotation (degrees) recorded for a bone by a pose file.
#[derive(Clone, Debug, PartialEq)]
pub struct BoneRotation {
    pub bone: String,
    pub rotation: DVec3,
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub nodes: Vec<NodeInstance>,
    pub materials: Vec<MaterialInstance>,
    pub modifiers: Vec<ModifierInstance>,
    pub animations: Vec<Animation>,
    /// Bone rotations from animations, in first-seen bone order.
    pub bone_rotations: Vec<BoneRotation>,
}

impl Scene {
    pub(crate) fn build(raw: &RawScene, resolver: &Resolver, libraries: &Libraries) -> DsonResult<Self> {
        let mut scene = Scene::default();
        for node in &raw.nodes {
            scene.nodes.push(NodeInstance::build(node, resolver, libraries)?);
        }
        for material in &raw.materials {
            scene.materials.push(MaterialInstance::build(material, resolver, libraries)?);
        }
        for modifier in &raw.modifiers {
            scene.modifiers.push(ModifierInstance::build(modifier, resolver, libraries)?);
        }
        for animation in &raw.animations {
            scene.add_animation(Animation::from_raw(animation));
        }
        Ok(scene)
    }

    fn add_animation(&mut self, animation: Animation) {
        if let Some(bone) = &animation.bone {
            let index = match self.bone_rotations.iter().position(|r| &r.bone == bone) {
                Some(i) => i,
                None => {
                    self.bone_rotations.push(BoneRotation {
                        bone: bone.clone(),
                        rotation: DVec3::ZERO,
                    });
                    self.bone_rotations.len() - 1
                }
            };
            let value = animation.first_value.unwrap_or(0.0);
            for (axis, i) in [("rotation/x/value", 0), ("rotation/y/value", 1), ("rotation/z/value", 2)] {
                if animation.url.contains(axis) {
                    self.bone_rotations[index].rotation[i] = value;
                }
            }
        }
        self.animations.push(animation);
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Geometry instance by id, across all nodes.
    pub fn find_geometry_instance(&self, id: &str) -> Option<(&NodeInstance, &GeometryInstance)> {
        self.nodes
            .iter()
            .find_map(|n| n.geometries.iter().find(|g| g.id == id).map(|g| (n, g)))
    }
}

fn require_url<'a>(id: &str, url: Option<&'a str>) -> DsonResult<&'a str> {
    url.ok_or_else(|| DsonError::ReferenceNotFound(format!("instance {} has no url", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animation(url: &str, value: f64) -> Animation {
        Animation::from_raw(&RawAnimation {
            url: url.to_string(),
            keys: vec![vec![Value::from(0), Value::from(value)]],
        })
    }

    #[test]
    fn test_bone_rotation_table() {
        let mut scene = Scene::default();
        scene.add_animation(animation("name://@selection/lShldr:?rotation/z/value", -40.0));
        scene.add_animation(animation("name://@selection/hip:?translation/x/value", 3.0));
        scene.add_animation(animation("name://@selection/lShldr:?rotation/x/value", 12.5));
        scene.add_animation(animation("short", 1.0));

        assert_eq!(scene.animations.len(), 4);
        assert_eq!(scene.bone_rotations.len(), 2);
        assert_eq!(scene.bone_rotations[0].bone, "lShldr");
        assert_eq!(scene.bone_rotations[0].rotation, DVec3::new(12.5, 0.0, -40.0));
        assert_eq!(scene.bone_rotations[1].bone, "hip");
        assert_eq!(scene.bone_rotations[1].rotation, DVec3::ZERO);
    }
}
