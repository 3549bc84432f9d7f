//! Skeleton construction.
//!
//! Bones are inserted breadth first starting from the bones without a
//! parent. Each bone keeps the center point, end point and orientation it
//! was built from together with its signed axis, so later edits and pose
//! values can be expressed relative to them.
//!
//! Structural edits are only valid while the armature is in
//! [`ArmatureMode::Edit`]; [`Armature::edit`] hands out a guard that enters
//! edit mode and restores the previous mode when dropped.

use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};

use dson_math::{BoneAxis, BoneSegment, DMat4, DQuat, DVec3, RotationOrder, DEGENERATE_NUDGE};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::document::Node;
use crate::error::{DsonError, DsonResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArmatureMode {
    #[default]
    Object,
    Edit,
}

/// Runtime transform of a bone on top of its rest pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseTransform {
    /// Euler angles in radians, one slot per bone-local axis.
    pub rotation: DVec3,
    pub location: DVec3,
    pub scale: DVec3,
    pub rotation_order: RotationOrder,
}

impl Default for PoseTransform {
    fn default() -> Self {
        Self {
            rotation: DVec3::ZERO,
            location: DVec3::ZERO,
            scale: DVec3::ONE,
            rotation_order: RotationOrder::XYZ,
        }
    }
}

impl PoseTransform {
    pub fn matrix(&self) -> DMat4 {
        let rotation = DQuat::from_mat3(&self.rotation_order.matrix(self.rotation));
        DMat4::from_scale_rotation_translation(self.scale, rotation, self.location)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Id of the scene node instance the bone was created from.
    pub instance_id: String,
    pub template_id: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub axis: BoneAxis,

    /// Output-space values the rest pose was built from.
    pub center_point: DVec3,
    pub end_point: DVec3,
    pub orientation: DVec3,

    /// Skeletal segments from root to leaf; never empty.
    segments: Vec<BoneSegment>,
    /// Set when the bone is laid out as a chain of segments.
    pub multi_segment: bool,
    /// Segment of the parent bone this bone's root segment hangs from.
    pub parent_segment: Option<usize>,
    pub pose: PoseTransform,
}

impl Bone {
    pub fn segments(&self) -> &[BoneSegment] {
        &self.segments
    }

    /// Root segment, the one pose transforms act on.
    pub fn segment(&self) -> &BoneSegment {
        &self.segments[0]
    }

    /// Last segment of the chain; children attach here.
    pub fn leaf(&self) -> &BoneSegment {
        &self.segments[self.segments.len() - 1]
    }

    fn leaf_index(&self) -> usize {
        self.segments.len() - 1
    }

    /// Rest transform in armature space.
    pub fn rest_matrix(&self) -> DMat4 {
        let root = self.segment();
        DMat4::from_rotation_translation(DQuat::from_mat3(&root.rest), root.head)
    }
}

/// Input for one bone.
#[derive(Clone, Copy, Debug)]
pub struct BoneSource<'a> {
    pub instance_id: &'a str,
    pub template_id: &'a str,
    /// Raw parent reference, e.g. `#hip`.
    pub parent: Option<&'a str>,
    pub node: &'a Node,
}

#[derive(Clone, Debug, Default)]
pub struct Armature {
    pub name: String,
    bones: Vec<Bone>,
    index: HashMap<String, usize>,
    mode: ArmatureMode,
}

impl Armature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Build an armature named `rig-<first bone id>`. Returns `None` when
    /// there are no bones.
    pub fn build(sources: &[BoneSource<'_>], diagnostics: &mut Diagnostics) -> DsonResult<Option<Armature>> {
        let Some(first) = sources.first() else {
            return Ok(None);
        };
        let mut armature = Armature::new(format!("rig-{}", first.instance_id));
        armature.edit().insert_hierarchy(sources, diagnostics)?;
        armature.finalize();
        log::info!("Built armature {} with {} bones", armature.name, armature.bones.len());
        Ok(Some(armature))
    }

    pub fn mode(&self) -> ArmatureMode {
        self.mode
    }

    /// Enter edit mode until the returned guard is dropped.
    pub fn edit(&mut self) -> EditGuard<'_> {
        let previous = self.mode;
        self.mode = ArmatureMode::Edit;
        EditGuard {
            armature: self,
            previous,
        }
    }

    fn require_edit_mode(&self) -> DsonResult<()> {
        match self.mode {
            ArmatureMode::Edit => Ok(()),
            ArmatureMode::Object => Err(DsonError::NotInEditMode),
        }
    }

    /// Breadth-first insertion: children of a bone are the sources whose
    /// parent reference is `#<bone id>`; roots have no parent reference.
    pub fn insert_hierarchy(&mut self, sources: &[BoneSource<'_>], diagnostics: &mut Diagnostics) -> DsonResult<()> {
        self.require_edit_mode()?;

        let mut queue: VecDeque<Option<String>> = VecDeque::from([None]);
        while let Some(parent) = queue.pop_front() {
            let wanted = parent.as_ref().map(|id| format!("#{}", id));
            log::debug!("Inserting children of {}", parent.as_deref().unwrap_or("<root>"));

            for source in sources.iter().filter(|s| s.parent == wanted.as_deref()) {
                if self.index.contains_key(source.instance_id) {
                    log::debug!("Bone {} already inserted", source.instance_id);
                    continue;
                }
                self.insert_bone(source, parent.as_deref(), diagnostics)?;
                queue.push_back(Some(source.instance_id.to_string()));
            }
        }

        for source in sources.iter().filter(|s| !self.index.contains_key(s.instance_id)) {
            log::warn!(
                "Bone {} is not connected to a root (parent {})",
                source.instance_id,
                source.parent.unwrap_or("-")
            );
        }
        Ok(())
    }

    /// Create one bone under `parent`.
    pub fn insert_bone(
        &mut self,
        source: &BoneSource<'_>,
        parent: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> DsonResult<()> {
        self.require_edit_mode()?;

        let node = source.node;
        let center = node.center_point();
        let orientation = node.orientation();
        let axis = BoneAxis::derive(center, node.end_point(), node.rotation_order());
        let segment = BoneSegment::build(center, node.end_point(), orientation, axis.sign);

        let mut end = node.end_point();
        if segment.degenerate {
            end.z += DEGENERATE_NUDGE;
            diagnostics.push(Diagnostic::DegenerateBone {
                bone: source.instance_id.to_string(),
            });
        }

        let name = source.instance_id.to_string();
        let mut parent_segment = None;
        if let Some(&p) = parent.and_then(|p| self.index.get(p)) {
            let parent = &mut self.bones[p];
            parent.children.push(name.clone());
            parent_segment = Some(parent.leaf_index());
        }
        log::debug!("Bone {} along {} (length {:.4})", name, axis.sign, segment.length());

        self.index.insert(name.clone(), self.bones.len());
        self.bones.push(Bone {
            name: name.clone(),
            instance_id: name,
            template_id: source.template_id.to_string(),
            parent: parent.map(str::to_string),
            children: Vec::new(),
            axis,
            center_point: center,
            end_point: end,
            orientation,
            segments: vec![segment],
            multi_segment: false,
            parent_segment,
            pose: PoseTransform::default(),
        });
        Ok(())
    }

    /// Rebuild a bone's rest segment from its stored center, end point and
    /// orientation plus the given output-space deltas. The bone's signed axis
    /// stays as created and the stored values are left untouched.
    pub fn transform_edit_bone(
        &mut self,
        name: &str,
        center_delta: DVec3,
        end_delta: DVec3,
        orientation_delta: DVec3,
    ) -> DsonResult<()> {
        self.require_edit_mode()?;
        let bone = self
            .find_bone_mut(name)
            .ok_or_else(|| DsonError::UnknownObject(name.to_string()))?;

        let center = bone.center_point + center_delta;
        let end = bone.end_point + end_delta;
        let orientation = bone.orientation + orientation_delta;
        bone.segments[0] = BoneSegment::build(center, end, orientation, bone.axis.sign);
        Ok(())
    }

    /// Copy each bone's pose rotation order from its axis metadata.
    fn finalize(&mut self) {
        for bone in &mut self.bones {
            bone.pose.rotation_order = bone.axis.pose_order;
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.index
            .get(name)
            .copied()
            .or_else(|| self.bones.iter().position(|b| b.instance_id == name))
            .or_else(|| self.bones.iter().position(|b| b.template_id == name))
    }

    /// Look a bone up by name, then by node instance id, then by template id.
    pub fn find_bone(&self, name: &str) -> Option<&Bone> {
        self.position(name).map(|i| &self.bones[i])
    }

    pub fn find_bone_mut(&mut self, name: &str) -> Option<&mut Bone> {
        self.position(name).map(move |i| &mut self.bones[i])
    }

    /// Bones in insertion order (parents before children).
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter().filter(|b| b.parent.is_none())
    }

    /// Armature-space transform of a bone in its current pose.
    pub fn posed_matrix(&self, name: &str) -> Option<DMat4> {
        let bone = self.find_bone(name)?;
        let local = bone.rest_matrix() * bone.pose.matrix();
        match bone.parent.as_deref().and_then(|p| self.find_bone(p)) {
            Some(parent) => {
                let parent_rest = parent.rest_matrix();
                let parent_posed = self.posed_matrix(&parent.name)?;
                Some(parent_posed * parent_rest.inverse() * local)
            }
            None => Some(local),
        }
    }
}

/// Keeps an armature in edit mode while alive.
pub struct EditGuard<'a> {
    armature: &'a mut Armature,
    previous: ArmatureMode,
}

impl Deref for EditGuard<'_> {
    type Target = Armature;

    fn deref(&self) -> &Armature {
        self.armature
    }
}

impl DerefMut for EditGuard<'_> {
    fn deref_mut(&mut self) -> &mut Armature {
        self.armature
    }
}

impl Drop for EditGuard<'_> {
    fn drop(&mut self) {
        self.armature.mode = self.previous;
    }
}
