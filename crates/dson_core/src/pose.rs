//! Pose application.
//!
//! Pose values arrive as per-axis triples in source semantics (degrees,
//! centimeters) and are mapped onto the bone-local Euler slots using the
//! bone's signed axis. Absent components leave the current value alone.

use dson_math::{Axis, AxisSign, CENTIMETERS_PER_METER, DVec3};

use crate::armature::Armature;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::document::Document;

/// An optional value per source axis.
pub type AxisValues = [Option<f64>; 3];

/// Map a source-axis triple onto a bone's local slots.
///
/// Bones along X read `(z, x, y)` and negate x and z when pointing down
/// the axis; bones along Y read `(x, z, y)` and negate x; bones along Z read
/// `(x, y, z)` and negate y and z.
pub fn remap_axes(sign: AxisSign, [x, y, z]: AxisValues) -> AxisValues {
    let neg = |v: Option<f64>| if sign.positive { v } else { v.map(|v| -v) };
    match sign.axis {
        Axis::X => [neg(z), neg(x), y],
        Axis::Y => [neg(x), z, y],
        Axis::Z => [x, neg(y), neg(z)],
    }
}

fn merge(current: DVec3, values: AxisValues, convert: impl Fn(f64) -> f64) -> DVec3 {
    let mut out = current;
    for (i, v) in values.into_iter().enumerate() {
        if let Some(v) = v {
            out[i] = convert(v);
        }
    }
    out
}

/// Set a bone's pose rotation from source-space degrees. Returns `false`
/// when the bone does not exist.
pub fn apply_rotation(armature: &mut Armature, bone: &str, values: AxisValues) -> bool {
    let Some(bone) = armature.find_bone_mut(bone) else {
        return false;
    };
    let local = remap_axes(bone.axis.sign, values);
    bone.pose.rotation = merge(bone.pose.rotation, local, f64::to_radians);
    true
}

/// Set a bone's pose location from source-space centimeters.
pub fn apply_translation(armature: &mut Armature, bone: &str, values: AxisValues) -> bool {
    let Some(bone) = armature.find_bone_mut(bone) else {
        return false;
    };
    let local = remap_axes(bone.axis.sign, values);
    bone.pose.location = merge(bone.pose.location, local, |v| v / CENTIMETERS_PER_METER);
    true
}

/// Add source-space scale offsets to a bone's pose scale. The Y and Z
/// offsets are exchanged for the output frame.
pub fn apply_scale(armature: &mut Armature, bone: &str, [x, y, z]: AxisValues) -> bool {
    let Some(bone) = armature.find_bone_mut(bone) else {
        return false;
    };
    let scale = &mut bone.pose.scale;
    for (i, v) in [x, z, y].into_iter().enumerate() {
        if let Some(v) = v {
            scale[i] += v;
        }
    }
    true
}

/// Apply the bone rotations recorded in a pose document.
pub fn apply_scene_pose(document: &Document, armature: &mut Armature, diagnostics: &mut Diagnostics) -> usize {
    let mut applied = 0;
    for entry in &document.scene.bone_rotations {
        let r = entry.rotation;
        log::debug!("{}: x={:.3} y={:.3} z={:.3}", entry.bone, r.x, r.y, r.z);
        if apply_rotation(armature, &entry.bone, [Some(r.x), Some(r.y), Some(r.z)]) {
            applied += 1;
        } else {
            diagnostics.push(Diagnostic::MissingBone {
                bone: entry.bone.clone(),
            });
        }
    }
    log::info!(
        "Applied {} of {} bone rotations from {}",
        applied,
        document.scene.bone_rotations.len(),
        document.path.display()
    );
    applied
}
