//! Building a complete scene from a document.
//!
//! The result holds one object per node geometry (or an empty for group
//! nodes), an armature built from the figure and bone nodes, renderer-ready
//! materials and the morphs found next to each geometry. Morph values can be
//! changed afterwards through [`ImportedScene::set_morph_value`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use dson_math::DVec3;

use crate::armature::{Armature, BoneSource};
use crate::config::ImportConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::document::{Document, NodeKind};
use crate::error::{DsonError, DsonResult};
use crate::io::AssetSource;
use crate::mesh::{EdgeKey, Mesh};
use crate::morph::{MorphContext, MorphRig};
use crate::pose::apply_rotation;
use crate::scene::NodeInstance;
use crate::shading::{assign_material, uv_map_for, ShadingMaterial};
use crate::skin::weight_group;
use crate::uri::percent_decode;

/// Marker for virtual node groupings that never act as parents.
const SELECTION_MARKER: &str = "@selection";

/// Object-level transform. Rotation is an XYZ Euler in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectTransform {
    pub location: DVec3,
    pub rotation: DVec3,
    pub scale: DVec3,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            location: DVec3::ZERO,
            rotation: DVec3::ZERO,
            scale: DVec3::ONE,
        }
    }
}

impl ObjectTransform {
    /// Add a node's translation and take over its rotation and scale.
    fn apply_node(&mut self, instance: &NodeInstance) {
        let node = &instance.node;
        self.location += node.translation();
        self.rotation = node.rotation();
        self.scale = node.scale() * node.general_scale;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ObjectParent {
    Object(String),
    Armature,
    /// Parented to a bone of the armature, keeping its transform.
    Bone(String),
}

#[derive(Clone, Debug)]
pub enum ObjectData {
    Empty,
    Mesh(Mesh),
}

#[derive(Clone, Debug)]
pub struct SceneObject {
    /// Id of the node instance the object was created for.
    pub name: String,
    pub kind: NodeKind,
    pub data: ObjectData,
    pub parent: Option<ObjectParent>,
    pub transform: ObjectTransform,
    pub morphs: MorphRig,
    /// Deformed by the armature.
    pub deform: bool,
}

impl SceneObject {
    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            ObjectData::Empty => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            ObjectData::Empty => None,
        }
    }
}

/// Everything an import produced.
#[derive(Debug)]
pub struct ImportedScene {
    pub objects: Vec<SceneObject>,
    pub armature: Option<Armature>,
    pub armature_transform: ObjectTransform,
    pub materials: Vec<ShadingMaterial>,
    pub diagnostics: Diagnostics,
    config: ImportConfig,
}

/// Load a document and import it.
pub fn import_file<P: AsRef<Path>>(path: P, config: &ImportConfig) -> DsonResult<ImportedScene> {
    let document = Document::load(path, config)?;
    import_document(&document, config)
}

/// Import a loaded document.
pub fn import_document(document: &Document, config: &ImportConfig) -> DsonResult<ImportedScene> {
    let start = Instant::now();
    let mut scene = ImportedScene {
        objects: Vec::new(),
        armature: None,
        armature_transform: ObjectTransform::default(),
        materials: Vec::new(),
        diagnostics: Diagnostics::new(),
        config: config.clone(),
    };

    let mut bones: Vec<&NodeInstance> = Vec::new();
    let mut armature_children: Vec<usize> = Vec::new();
    for instance in &document.scene.nodes {
        let created = scene.create_objects(instance, document);

        let node = &instance.node;
        let standalone_figure = node.is_figure()
            && instance
                .parent()
                .map_or(true, |p| p.contains(SELECTION_MARKER));
        if standalone_figure {
            bones.push(instance);
            armature_children.extend(created);
        } else if node.is_bone() && !bones.iter().any(|b| b.template_id() == instance.template_id()) {
            // A second bone with a known template usually belongs to clothing
            // and would override the figure's own bone.
            bones.push(instance);
        }
    }

    scene.assign_materials(document);

    let sources: Vec<BoneSource<'_>> = bones
        .iter()
        .map(|b| BoneSource {
            instance_id: &b.id,
            template_id: b.template_id(),
            parent: b.parent(),
            node: &b.node,
        })
        .collect();
    scene.armature = Armature::build(&sources, &mut scene.diagnostics)?;
    if scene.armature.is_some() {
        if let Some(&first) = armature_children.first() {
            scene.objects[first].parent = Some(ObjectParent::Armature);
        }
    }

    scene.link_parents(document);
    scene.apply_transforms(document);
    scene.apply_rest_pose(&bones);
    scene.apply_modifiers(document, &bones)?;
    scene.mark_deformed();

    log::info!(
        "Imported {} objects ({} bones, {} materials) from {} in {:.2?}",
        scene.objects.len(),
        scene.armature.as_ref().map_or(0, Armature::bone_count),
        scene.materials.len(),
        document.path.display(),
        start.elapsed()
    );
    Ok(scene)
}

impl ImportedScene {
    pub fn find_object(&self, name: &str) -> Option<&SceneObject> {
        self.object_index(name).map(|i| &self.objects[i])
    }

    pub fn find_object_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.object_index(name).map(move |i| &mut self.objects[i])
    }

    fn object_index(&self, name: &str) -> Option<usize> {
        let name = strip_reference(name);
        self.objects.iter().position(|o| o.name == name)
    }

    /// Object whose mesh was built from the geometry instance `id`.
    fn object_for_geometry(&self, id: &str) -> Option<usize> {
        let id = strip_reference(id);
        self.objects
            .iter()
            .position(|o| o.mesh().is_some_and(|m| m.name == id))
    }

    /// Value of a morph on an object.
    pub fn morph_value(&self, object: &str, morph: &str) -> Option<f64> {
        self.find_object(object)?.morphs.value(morph)
    }

    /// Set a morph on an object and propagate it through its formulas to
    /// other morphs, shape keys and the armature. Returns `false` when the
    /// change was too small to apply.
    pub fn set_morph_value(&mut self, object: &str, morph: &str, value: f64) -> DsonResult<bool> {
        let i = self
            .object_index(object)
            .ok_or_else(|| DsonError::UnknownObject(object.to_string()))?;

        let SceneObject { data, morphs, .. } = &mut self.objects[i];
        let ObjectData::Mesh(mesh) = data else {
            return Err(DsonError::UnknownMorph(morph.to_string()));
        };
        let mut ctx = MorphContext {
            mesh,
            armature: self.armature.as_mut(),
            config: &self.config,
            diagnostics: &mut self.diagnostics,
        };
        morphs.set_value(morph, value, &mut ctx)
    }

    /// Create the objects of one node instance and return their indices.
    fn create_objects(&mut self, instance: &NodeInstance, document: &Document) -> Vec<usize> {
        let mut created = Vec::new();
        for geometry in &instance.geometries {
            let origin = instance.node.center_point();
            let mut mesh = Mesh::from_geometry(&geometry.geometry, origin, &mut self.diagnostics);
            mesh.name = geometry.id.clone();

            let mut morphs = MorphRig::new();
            if self.config.load_morphs {
                if let Some(dir) = geometry.geometry.source_dir() {
                    let dir = dir.join(&self.config.morph_directory);
                    self.load_morphs(&dir, document, &mut morphs, &mut mesh);
                }
            }

            log::debug!("Object {} from geometry {}", instance.id, geometry.id);
            created.push(self.objects.len());
            self.objects.push(SceneObject {
                name: instance.id.clone(),
                kind: instance.node.kind.clone(),
                data: ObjectData::Mesh(mesh),
                parent: None,
                transform: ObjectTransform {
                    location: origin,
                    ..Default::default()
                },
                morphs,
                deform: false,
            });
        }

        if instance.node.kind == NodeKind::Node && instance.geometries.is_empty() {
            created.push(self.objects.len());
            self.objects.push(SceneObject {
                name: instance.id.clone(),
                kind: NodeKind::Node,
                data: ObjectData::Empty,
                parent: None,
                transform: ObjectTransform::default(),
                morphs: MorphRig::new(),
                deform: false,
            });
        }
        created
    }

    /// Register every morph found under `dir` on a mesh.
    fn load_morphs(&mut self, dir: &Path, document: &Document, morphs: &mut MorphRig, mesh: &mut Mesh) {
        let source = document.source();
        if !source.is_dir(dir) {
            return;
        }
        let start = Instant::now();
        let files = collect_morph_files(source.as_ref(), dir, &self.config);
        for file in &files {
            let morph_document = match Document::load_with_source(file, document.content_root(), Rc::clone(source)) {
                Ok(d) => d,
                Err(e) => {
                    log::warn!("Skipping morph file {}: {}", file.display(), e);
                    continue;
                }
            };
            for modifier in morph_document.libraries.modifiers.iter() {
                morphs.register(modifier, mesh, &mut self.diagnostics);
            }
        }
        log::info!(
            "Loaded {} morphs from {} files for {} in {:.2?}",
            morphs.len(),
            files.len(),
            mesh.name,
            start.elapsed()
        );
    }

    fn assign_materials(&mut self, document: &Document) {
        let mut edge_faces: HashMap<usize, HashMap<EdgeKey, Vec<usize>>> = HashMap::new();

        for instance in &document.scene.materials {
            let material = &instance.material;
            let mut shading = ShadingMaterial::new(material, document);

            let geometry_id = material.geometry.as_deref().map(strip_reference);
            let target = geometry_id.and_then(|id| {
                let object = self.object_for_geometry(&id)?;
                let (_, geometry) = document.scene.find_geometry_instance(&id)?;
                Some((object, Rc::clone(&geometry.geometry)))
            });
            let Some((object, geometry)) = target else {
                log::warn!(
                    "Material {}: no object for geometry {}",
                    instance.id,
                    material.geometry.as_deref().unwrap_or("-")
                );
                self.materials.push(shading);
                continue;
            };

            let Some(mesh) = self.objects[object].mesh_mut() else {
                continue;
            };
            let edges = edge_faces.entry(object).or_insert_with(|| mesh.edge_faces());
            shading.uv_map = uv_map_for(material, document, mesh);
            let slot = mesh.add_material_slot(&material.id);
            assign_material(mesh, material, &geometry, slot, edges);

            shading.object = Some(self.objects[object].name.clone());
            shading.slot = Some(slot);
            self.materials.push(shading);
        }
    }

    /// Parent objects of `node`/`figure` instances. Selections never act as
    /// parents; a conform target stands in for a missing parent.
    fn link_parents(&mut self, document: &Document) {
        for instance in geometry_nodes(document) {
            let mut parent = instance.parent();
            if parent.is_some_and(|p| p.contains(SELECTION_MARKER)) {
                continue;
            }
            if parent.is_none() {
                parent = instance.conform_target.as_deref();
            }
            let Some(parent) = parent else {
                continue;
            };

            let link = match self
                .object_for_geometry(parent)
                .or_else(|| self.object_index(parent))
            {
                Some(p) => ObjectParent::Object(self.objects[p].name.clone()),
                None => match &self.armature {
                    Some(armature) => match armature.find_bone(&strip_reference(parent)) {
                        Some(bone) => ObjectParent::Bone(bone.name.clone()),
                        None => ObjectParent::Armature,
                    },
                    None => continue,
                },
            };

            match self.find_object_mut(&instance.id) {
                Some(object) => {
                    log::debug!("Parenting {} to {:?}", instance.id, link);
                    object.parent = Some(link);
                }
                None => log::debug!("No object for node {}", instance.id),
            }
        }
    }

    /// Objects parented straight to the armature move the armature instead;
    /// conforming descendants of the armature keep their place.
    fn apply_transforms(&mut self, document: &Document) {
        let has_armature = self.armature.is_some();
        for instance in geometry_nodes(document) {
            let Some(i) = self.object_index(&instance.id) else {
                continue;
            };
            let object = &self.objects[i];
            let on_armature = matches!(object.parent, Some(ObjectParent::Armature | ObjectParent::Bone(_)));

            if has_armature && on_armature && instance.node.kind != NodeKind::Node {
                self.armature_transform.apply_node(instance);
            } else if has_armature && self.rooted_at_armature(i) && instance.conform_target.is_some() {
                continue;
            } else {
                self.objects[i].transform.apply_node(instance);
            }
        }
    }

    fn rooted_at_armature(&self, mut i: usize) -> bool {
        let mut seen = 0;
        loop {
            match &self.objects[i].parent {
                Some(ObjectParent::Armature | ObjectParent::Bone(_)) => return true,
                Some(ObjectParent::Object(name)) if seen < self.objects.len() => match self.object_index(name) {
                    Some(p) => {
                        i = p;
                        seen += 1;
                    }
                    None => return false,
                },
                _ => return false,
            }
        }
    }

    /// Pose every bone with its node's rotation.
    fn apply_rest_pose(&mut self, bones: &[&NodeInstance]) {
        let Some(armature) = self.armature.as_mut() else {
            return;
        };
        for bone in bones {
            let r = bone.node.source_rotation();
            if !apply_rotation(armature,bone.template_id(), [Some(r.x), Some(r.y), Some(r.z)]) {
                self.diagnostics.push(Diagnostic::MissingBone {
                    bone: bone.template_id().to_string(),
                });
            }
        }
    }

    /// Skin modifiers become weight groups; morph modifiers with a channel
    /// set their morph's value.
    fn apply_modifiers(&mut self, document: &Document, bones: &[&NodeInstance]) -> DsonResult<()> {
        for instance in &document.scene.modifiers {
            let Some(parent) = instance.parent.as_deref() else {
                continue;
            };

            if let Some(skin) = instance.modifier.skin() {
                let Some(i) = self.object_for_geometry(parent).or_else(|| self.object_index(parent)) else {
                    log::warn!("Skin {}: no object for {}", instance.id, parent);
                    continue;
                };
                let min_weight = self.config.min_weight;
                let Some(mesh) = self.objects[i].mesh_mut() else {
                    continue;
                };
                for joint in &skin.joints {
                    let Some(bone) = bones.iter().find(|b| b.id == joint.id) else {
                        self.diagnostics.push(Diagnostic::UnknownBone {
                            joint: joint.id.clone(),
                        });
                        continue;
                    };
                    let (head, tail) = (bone.node.center_point(), bone.node.end_point());
                    mesh.set_vertex_group(bone.template_id(), weight_group(joint, head, tail, min_weight));
                }
                log::debug!("Skin {}: {} joints on {}", instance.id, skin.joints.len(), mesh.name);
            } else if instance.modifier.morph().is_some() {
                let Some(channel) = &instance.channel else {
                    continue;
                };
                let Some(i) = self.object_index(parent) else {
                    continue;
                };
                let name = instance.modifier.id.clone();
                let object = &mut self.objects[i];
                if object.morphs.find(&name).is_none() {
                    if let ObjectData::Mesh(mesh) = &mut object.data {
                        object.morphs.register(&instance.modifier, mesh, &mut self.diagnostics);
                    }
                }
                if object.morphs.find(&name).is_some() {
                    let value = channel.current_f64().unwrap_or(0.0);
                    let object = object.name.clone();
                    match self.set_morph_value(&object, &name, value) {
                        Ok(_) => {}
                        Err(DsonError::FormulaCycle(morph)) => {
                            self.diagnostics.push(Diagnostic::FormulaCycle { morph });
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(())
    }

    /// Every descendant of the armature deforms with it.
    fn mark_deformed(&mut self) {
        if self.armature.is_none() {
            return;
        }
        for i in 0..self.objects.len() {
            if self.rooted_at_armature(i) {
                self.objects[i].deform = true;
            }
        }
    }
}

fn geometry_nodes(document: &Document) -> impl Iterator<Item = &NodeInstance> {
    document
        .scene
        .nodes
        .iter()
        .filter(|n| matches!(n.node.kind, NodeKind::Node | NodeKind::Figure))
}

/// `#id` (possibly percent-encoded) to `id`.
fn strip_reference(reference: &str) -> String {
    let decoded = percent_decode(reference);
    match decoded.strip_prefix('#') {
        Some(id) => id.to_string(),
        None => decoded,
    }
}

/// `.dsf` files below `dir`, recursively, minus excluded names.
pub fn collect_morph_files(source: &dyn AssetSource, dir: &Path, config: &ImportConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let entries = match source.read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot list {}: {}", dir.display(), e);
            return files;
        }
    };
    for entry in entries {
        if source.is_dir(&entry) {
            files.extend(collect_morph_files(source, &entry, config));
            continue;
        }
        let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(".dsf") && !config.is_excluded_morph(name) {
            log::debug!("Morph file {}", name);
            files.push(entry);
        }
    }
    files
}
