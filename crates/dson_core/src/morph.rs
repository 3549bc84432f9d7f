//! Morph registration and evaluation.
//!
//! A [`MorphRig`] holds the morphs loaded onto one mesh. Setting a morph's
//! value blends its shape key, runs its formulas and propagates the results:
//! outputs naming another morph set that morph and apply it in turn, outputs
//! naming the morph itself only touch its shape key, and everything else is
//! combined per output and committed to the armature in one edit pass.

use std::collections::HashMap;

use dson_math::{point_to_output, rotation_to_output, DVec3};

use crate::armature::Armature;
use crate::config::ImportConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::document::Modifier;
use crate::error::{DsonError, DsonResult};
use crate::formula::{Formula, Stage};
use crate::mesh::Mesh;
use crate::pose::{apply_rotation, apply_scale, apply_translation, AxisValues};
use crate::uri::Uri;

/// A morph loaded onto a mesh.
#[derive(Clone, Debug)]
pub struct MorphState {
    pub name: String,
    /// Hidden morphs (correctives, controllers) are driven by formulas only.
    pub visible: bool,
    pub formulas: Vec<Formula>,
    pub has_shape_key: bool,
    value: Option<f64>,
}

impl MorphState {
    /// Current value, 0 until first set.
    pub fn value(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }
}

/// The result of one formula, waiting to be combined.
#[derive(Clone, Debug, PartialEq)]
pub struct FormulaOutput {
    pub output: String,
    pub stage: Stage,
    pub value: f64,
}

/// What a morph application may touch besides the rig itself.
pub struct MorphContext<'a> {
    pub mesh: &'a mut Mesh,
    pub armature: Option<&'a mut Armature>,
    pub config: &'a ImportConfig,
    pub diagnostics: &'a mut Diagnostics,
}

#[derive(Clone, Debug, Default)]
pub struct MorphRig {
    morphs: Vec<MorphState>,
    index: HashMap<String, usize>,
}

impl MorphRig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a morph modifier. Morphs with vertex deltas get a shape key on
    /// `mesh`; formulas using unsupported operations are dropped. Returns
    /// `false` for modifiers that are not morphs.
    pub fn register(&mut self, modifier: &Modifier, mesh: &mut Mesh, diagnostics: &mut Diagnostics) -> bool {
        let Some(morph) = modifier.morph() else {
            return false;
        };

        let has_shape_key = match &morph.deltas {
            Some(deltas) => {
                mesh.add_shape_key(&modifier.id, deltas);
                true
            }
            None => false,
        };

        let formulas = morph
            .formulas
            .iter()
            .filter(|formula| match formula.unsupported_operation() {
                Some(op) => {
                    log::debug!("{}: skipping formula with '{}'", modifier.id, op);
                    diagnostics.push(Diagnostic::UnsupportedFormula {
                        morph: modifier.id.clone(),
                        output: formula.output.clone(),
                    });
                    false
                }
                None => true,
            })
            .cloned()
            .collect();

        let state = MorphState {
            name: modifier.id.clone(),
            visible: modifier.channel.as_ref().map_or(true, |c| c.visible),
            formulas,
            has_shape_key,
            value: None,
        };

        match self.index.get(&state.name) {
            Some(&i) => self.morphs[i] = state,
            None => {
                self.index.insert(state.name.clone(), self.morphs.len());
                self.morphs.push(state);
            }
        }
        true
    }

    pub fn find(&self, name: &str) -> Option<&MorphState> {
        self.index.get(name).map(|&i| &self.morphs[i])
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.find(name).map(MorphState::value)
    }

    pub fn morphs(&self) -> impl Iterator<Item = &MorphState> {
        self.morphs.iter()
    }

    pub fn len(&self) -> usize {
        self.morphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.morphs.is_empty()
    }

    /// Set a morph's value and apply it. Changes within the configured
    /// epsilon of a value already set are ignored; returns whether the morph
    /// was applied.
    pub fn set_value(&mut self, name: &str, value: f64, ctx: &mut MorphContext<'_>) -> DsonResult<bool> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| DsonError::UnknownMorph(name.to_string()))?;

        if let Some(current) = self.morphs[i].value {
            if (value - current).abs() <= ctx.config.morph_epsilon {
                return Ok(false);
            }
        }

        log::debug!("Setting {} to {:.3}", name, value);
        let values: Vec<Option<f64>> = self.morphs.iter().map(|m| m.value).collect();
        let weights: Vec<f64> = ctx.mesh.shape_keys.iter().map(|k| k.value).collect();

        let mut applying = Vec::new();
        let outputs = match self.apply(i, value, &mut applying, ctx) {
            Ok(outputs) => outputs,
            Err(e) => {
                // Nothing reaches the armature before commit; undo the rest.
                for (morph, value) in self.morphs.iter_mut().zip(values) {
                    morph.value = value;
                }
                for (key, weight) in ctx.mesh.shape_keys.iter_mut().zip(weights) {
                    key.value = weight;
                }
                return Err(e);
            }
        };
        commit(name, &combine(outputs), ctx);
        Ok(true)
    }

    /// Apply morph `i` and every morph it drives. Returns the outputs that
    /// target something other than a morph.
    fn apply(
        &mut self,
        i: usize,
        value: f64,
        applying: &mut Vec<usize>,
        ctx: &mut MorphContext<'_>,
    ) -> DsonResult<Vec<FormulaOutput>> {
        if applying.contains(&i) || applying.len() >= ctx.config.max_morph_depth {
            return Err(DsonError::FormulaCycle(self.morphs[i].name.clone()));
        }
        applying.push(i);

        self.morphs[i].value = Some(value);
        if self.morphs[i].has_shape_key {
            ctx.mesh.set_shape_key_value(&self.morphs[i].name, value);
        }

        let results = self.evaluate(i, ctx.diagnostics);

        let mut non_morph = Vec::new();
        for result in results {
            let target = Uri::parse(&result.output)
                .ok()
                .and_then(|uri| self.index.get(&uri.asset_id).copied());
            match target {
                Some(t) if t != i => {
                    non_morph.extend(self.apply(t, result.value, applying, ctx)?);
                }
                Some(_) => {
                    if self.morphs[i].has_shape_key {
                        ctx.mesh.set_shape_key_value(&self.morphs[i].name, result.value);
                    }
                }
                None => non_morph.push(result),
            }
        }

        applying.pop();
        Ok(non_morph)
    }

    /// Run the formulas of morph `i` against the current morph values.
    fn evaluate(&self, i: usize, diagnostics: &mut Diagnostics) -> Vec<FormulaOutput> {
        let morph = &self.morphs[i];
        let mut results = Vec::with_capacity(morph.formulas.len());

        for formula in &morph.formulas {
            let evaluation = formula.evaluate(|url| {
                let uri = Uri::parse(url).ok()?;
                self.value(&uri.asset_id)
            });
            match evaluation {
                Ok(evaluation) => {
                    for url in evaluation.unresolved {
                        diagnostics.push(Diagnostic::UnresolvedFormulaOperand {
                            morph: morph.name.clone(),
                            url,
                        });
                    }
                    log::debug!("{}: {:.3}", formula.output, evaluation.value);
                    results.push(FormulaOutput {
                        output: formula.output.clone(),
                        stage: formula.stage,
                        value: evaluation.value,
                    });
                }
                Err(e) => diagnostics.push(Diagnostic::MalformedFormula {
                    morph: morph.name.clone(),
                    output: formula.output.clone(),
                    reason: e.to_string(),
                }),
            }
        }
        results
    }
}

/// Combine results per output in encounter order. Each later result folds in
/// with its own stage.
pub fn combine(outputs: Vec<FormulaOutput>) -> Vec<FormulaOutput> {
    let mut combined: Vec<FormulaOutput> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for result in outputs {
        match index.get(&result.output) {
            Some(&i) => {
                let entry = &mut combined[i];
                entry.value = result.stage.combine(entry.value, result.value);
            }
            None => {
                index.insert(result.output.clone(), combined.len());
                combined.push(result);
            }
        }
    }
    combined
}

/// Pending changes for one bone.
#[derive(Clone, Debug)]
struct BoneTransformation {
    bone: String,
    rotation: AxisValues,
    translation: [f64; 3],
    scale: [f64; 3],
    center_point: DVec3,
    end_point: DVec3,
    orientation: DVec3,
}

impl BoneTransformation {
    fn new(bone: &str) -> Self {
        Self {
            bone: bone.to_string(),
            rotation: [None; 3],
            translation: [0.0; 3],
            scale: [0.0; 3],
            center_point: DVec3::ZERO,
            end_point: DVec3::ZERO,
            orientation: DVec3::ZERO,
        }
    }

    fn update(&mut self, property: BoneProperty, axis: Option<usize>, value: f64) {
        let Some(axis) = axis else {
            if property == BoneProperty::Scale {
                self.scale = [value; 3];
            }
            return;
        };
        match property {
            BoneProperty::Rotation => self.rotation[axis] = Some(value),
            BoneProperty::Translation => self.translation[axis] = value,
            BoneProperty::Scale => self.scale[axis] = value,
            BoneProperty::CenterPoint => self.center_point[axis] = value,
            BoneProperty::EndPoint => self.end_point[axis] = value,
            BoneProperty::Orientation => self.orientation[axis] = value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BoneProperty {
    Rotation,
    Translation,
    Scale,
    CenterPoint,
    EndPoint,
    Orientation,
}

impl BoneProperty {
    fn parse(s: &str) -> Option<BoneProperty> {
        Some(match s {
            "rotation" => BoneProperty::Rotation,
            "translation" => BoneProperty::Translation,
            "scale" => BoneProperty::Scale,
            "center_point" => BoneProperty::CenterPoint,
            "end_point" => BoneProperty::EndPoint,
            "orientation" => BoneProperty::Orientation,
            _ => return None,
        })
    }

    fn is_edit(self) -> bool {
        matches!(
            self,
            BoneProperty::CenterPoint | BoneProperty::EndPoint | BoneProperty::Orientation
        )
    }
}

/// Split `rotation/x` (optionally followed by `/value`) into the property
/// and axis index. `scale/general` yields no axis.
fn parse_property_path(path: &str) -> Option<(BoneProperty, Option<usize>)> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.last() == Some(&"value") && segments.len() > 2 {
        segments.pop();
    }
    let [.., property, axis] = segments.as_slice() else {
        return None;
    };
    let property = BoneProperty::parse(property)?;
    let axis = match *axis {
        "x" => Some(0),
        "y" => Some(1),
        "z" => Some(2),
        "general" if property == BoneProperty::Scale => None,
        _ => return None,
    };
    Some((property, axis))
}

/// Bone and property path an output addresses. Outputs written without an
/// id, such as `thigh:rotation/x/value`, name the bone by node path.
fn output_target(uri: &Uri) -> (&str, &str) {
    if uri.has_asset_id() {
        (uri.asset_id.as_str(), uri.property_path.as_str())
    } else {
        (uri.node_path.as_str(), uri.file_path.as_str())
    }
}

fn pending<'a>(
    list: &'a mut Vec<BoneTransformation>,
    bone: &str,
) -> &'a mut BoneTransformation {
    match list.iter().position(|t| t.bone == bone) {
        Some(i) => &mut list[i],
        None => {
            list.push(BoneTransformation::new(bone));
            let last = list.len() - 1;
            &mut list[last]
        }
    }
}

/// Commit combined outputs to the armature: pose changes first, then rest
/// changes, all inside one edit pass.
fn commit(morph: &str, outputs: &[FormulaOutput], ctx: &mut MorphContext<'_>) {
    let mut pose: Vec<BoneTransformation> = Vec::new();
    let mut edit: Vec<BoneTransformation> = Vec::new();

    for result in outputs {
        let Ok(uri) = Uri::parse(&result.output) else {
            ctx.diagnostics.push(Diagnostic::MalformedFormula {
                morph: morph.to_string(),
                output: result.output.clone(),
                reason: "invalid output reference".to_string(),
            });
            continue;
        };
        let (bone, path) = output_target(&uri);
        let Some((property, axis)) = parse_property_path(path) else {
            log::debug!("{}: ignoring output {}", morph, result.output);
            continue;
        };

        let known = ctx
            .armature
            .as_deref()
            .is_some_and(|a| a.find_bone(bone).is_some());
        if !known {
            ctx.diagnostics.push(Diagnostic::MissingBone {
                bone: bone.to_string(),
            });
            continue;
        }

        let list = if property.is_edit() { &mut edit } else { &mut pose };
        pending(list, bone).update(property, axis, result.value);
    }

    if pose.is_empty() && edit.is_empty() {
        return;
    }
    let Some(armature) = ctx.armature.as_deref_mut() else {
        return;
    };

    let mut armature = armature.edit();
    for t in &pose {
        log::debug!(
            "Pose {} rotation={:?} translation={:?} scale={:?}",
            t.bone,
            t.rotation,
            t.translation,
            t.scale
        );
        apply_rotation(&mut armature, &t.bone, t.rotation);
        apply_scale(&mut armature, &t.bone, t.scale.map(Some));
        apply_translation(&mut armature, &t.bone, t.translation.map(Some));
    }
    for t in &edit {
        log::debug!(
            "Edit {} center={} end={} orientation={}",
            t.bone,
            t.center_point,
            t.end_point,
            t.orientation
        );
        let result = armature.transform_edit_bone(
            &t.bone,
            point_to_output(t.center_point),
            point_to_output(t.end_point),
            rotation_to_output(t.orientation),
        );
        if result.is_err() {
            ctx.diagnostics.push(Diagnostic::MissingBone { bone: t.bone.clone() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::armature::{ArmatureMode, BoneSource};
    use crate::document::raw::{RawModifier, RawNode};
    use crate::document::Node;

    const EPS: f64 = 1e-9;

    fn modifier(json: &str) -> Modifier {
        Modifier::from_raw(serde_json::from_str::<RawModifier>(json).unwrap())
    }

    fn rig(modifiers: &[&str], mesh: &mut Mesh) -> MorphRig {
        let mut rig = MorphRig::new();
        let mut diagnostics = Diagnostics::new();
        for json in modifiers {
            assert!(rig.register(&modifier(json), mesh, &mut diagnostics));
        }
        rig
    }

    /// "thigh" runs along -Z (center above end in the source frame).
    fn armature() -> Armature {
        let node = Node::from_raw(
            &serde_json::from_str::<RawNode>(
                r#"{ "id": "thigh", "rotation_order": "YZX",
                     "center_point": [ {"id": "y", "value": 90} ],
                     "end_point": [ {"id": "y", "value": 50} ] }"#,
            )
            .unwrap(),
        );
        let sources = [BoneSource {
            instance_id: "thigh",
            template_id: "thigh",
            parent: None,
            node: &node,
        }];
        Armature::build(&sources, &mut Diagnostics::new()).unwrap().unwrap()
    }

    #[test]
    fn test_combine_by_stage() {
        let out = |value, stage| FormulaOutput {
            output: "thigh:#thigh?rotation/x".to_string(),
            stage,
            value,
        };
        let sum = combine(vec![out(0.1, Stage::Sum), out(0.2, Stage::Sum)]);
        assert_eq!(sum.len(), 1);
        assert!((sum[0].value - 0.3).abs() < EPS);

        let mult = combine(vec![out(2.0, Stage::Mult), out(3.0, Stage::Mult)]);
        assert!((mult[0].value - 6.0).abs() < EPS);
    }

    #[test]
    fn test_parse_property_path() {
        assert_eq!(parse_property_path("rotation/x"), Some((BoneProperty::Rotation, Some(0))));
        assert_eq!(parse_property_path("rotation/z/value"), Some((BoneProperty::Rotation, Some(2))));
        assert_eq!(parse_property_path("scale/general"), Some((BoneProperty::Scale, None)));
        assert_eq!(parse_property_path("end_point/y"), Some((BoneProperty::EndPoint, Some(1))));
        assert_eq!(parse_property_path("value"), None);
        assert_eq!(parse_property_path("rotation/general"), None);
    }

    #[test]
    fn test_output_without_asset_id() {
        let uri = Uri::parse("thigh:rotation/x/value").unwrap();
        assert_eq!(output_target(&uri), ("thigh", "rotation/x/value"));
        let uri = Uri::parse("thigh:#thigh?end_point/y").unwrap();
        assert_eq!(output_target(&uri), ("thigh", "end_point/y"));
    }

    #[test]
    fn test_hip_thigh_kick() {
        let hip = Node::from_raw(
            &serde_json::from_str::<RawNode>(
                r#"{ "id": "hip", "type": "figure",
                     "center_point": [ {"id": "y", "value": 100} ],
                     "end_point": [ {"id": "y", "value": 110} ] }"#,
            )
            .unwrap(),
        );
        let thigh = Node::from_raw(
            &serde_json::from_str::<RawNode>(
                r#"{ "id": "thigh", "type": "bone", "rotation_order": "YZX",
                     "center_point": [ {"id": "y", "value": 90} ],
                     "end_point": [ {"id": "y", "value": 50} ] }"#,
            )
            .unwrap(),
        );
        let sources = [
            BoneSource { instance_id: "hip", template_id: "hip", parent: None, node: &hip },
            BoneSource { instance_id: "thigh", template_id: "thigh", parent: Some("#hip"), node: &thigh },
        ];
        let mut armature = Armature::build(&sources, &mut Diagnostics::new()).unwrap().unwrap();

        let mut mesh = Mesh::default();
        let mut rig = rig(
            &[r#"{ "id": "Kick", "formulas": [ { "output": "thigh:rotation/x/value", "stage": "sum",
                   "operations": [ {"op": "push", "val": 15} ] } ] }"#],
            &mut mesh,
        );
        let config = ImportConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut ctx = MorphContext {
            mesh: &mut mesh,
            armature: Some(&mut armature),
            config: &config,
            diagnostics: &mut diagnostics,
        };
        assert!(rig.set_value("Kick", 1.0, &mut ctx).unwrap());

        let bone = armature.find_bone("thigh").unwrap();
        assert!((bone.pose.rotation.x - 15f64.to_radians()).abs() < EPS);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_self_reference_only_blends_shape_key() {
        let mut mesh = Mesh::new("body", vec![DVec3::ZERO], vec![]);
        let mut rig = rig(
            &[r#"{ "id": "Smile",
                   "morph": { "vertex_count": 1, "deltas": { "values": [[0, 0, 0, 1]] } },
                   "formulas": [ { "output": "body:#Smile?value",
                                   "operations": [ {"op": "push", "val": 0.25} ] } ] }"#],
            &mut mesh,
        );
        let config = ImportConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut ctx = MorphContext {
            mesh: &mut mesh,
            armature: None,
            config: &config,
            diagnostics: &mut diagnostics,
        };

        assert!(rig.set_value("Smile", 1.0, &mut ctx).unwrap());
        assert_eq!(rig.value("Smile"), Some(1.0));
        assert!((mesh.shape_key("Smile").unwrap().value - 0.25).abs() < EPS);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_driven_morph_and_epsilon() {
        let mut mesh = Mesh::new("body", vec![DVec3::ZERO], vec![]);
        let mut rig = rig(
            &[
                r#"{ "id": "Driver", "formulas": [ { "output": "body:#Driven?value",
                     "operations": [ {"op": "push", "url": "body:#Driver?value"},
                                     {"op": "push", "val": 2}, {"op": "mult"} ] } ] }"#,
                r#"{ "id": "Driven", "channel": { "id": "value", "visible": false },
                     "morph": { "deltas": { "values": [] } } }"#,
            ],
            &mut mesh,
        );
        assert!(!rig.find("Driven").unwrap().visible);

        let config = ImportConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut ctx = MorphContext {
            mesh: &mut mesh,
            armature: None,
            config: &config,
            diagnostics: &mut diagnostics,
        };

        assert!(rig.set_value("Driver", 0.4, &mut ctx).unwrap());
        assert!((rig.value("Driven").unwrap() - 0.8).abs() < EPS);
        assert!(!rig.set_value("Driver", 0.4005, &mut ctx).unwrap());
        assert!(rig.set_value("Driver", 0.5, &mut ctx).unwrap());
        assert!((rig.value("Driven").unwrap() - 1.0).abs() < EPS);
        assert!((mesh.shape_key("Driven").unwrap().value - 1.0).abs() < EPS);
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut mesh = Mesh::new("body", vec![], vec![]);
        let mut rig = rig(
            &[
                r#"{ "id": "A", "formulas": [ { "output": "body:#B?value",
                     "operations": [ {"op": "push", "val": 1} ] } ] }"#,
                r#"{ "id": "B", "formulas": [ { "output": "body:#A?value",
                     "operations": [ {"op": "push", "val": 1} ] } ] }"#,
            ],
            &mut mesh,
        );
        let config = ImportConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut ctx = MorphContext {
            mesh: &mut mesh,
            armature: None,
            config: &config,
            diagnostics: &mut diagnostics,
        };

        let err = rig.set_value("A", 1.0, &mut ctx).unwrap_err();
        assert!(matches!(err, DsonError::FormulaCycle(ref m) if m == "A"));
    }

    #[test]
    fn test_cycle_leaves_rig_untouched() {
        let mut mesh = Mesh::new("body", vec![DVec3::ZERO], vec![]);
        let mut rig = rig(
            &[
                r#"{ "id": "A", "morph": { "deltas": { "values": [[0, 0, 0, 1]] } },
                     "formulas": [ { "output": "body:#B?value",
                                     "operations": [ {"op": "push", "val": 1} ] } ] }"#,
                r#"{ "id": "B", "morph": { "deltas": { "values": [[0, 1, 0, 0]] } },
                     "formulas": [ { "output": "body:#A?value",
                                     "operations": [ {"op": "push", "val": 1} ] } ] }"#,
            ],
            &mut mesh,
        );
        let config = ImportConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut ctx = MorphContext {
            mesh: &mut mesh,
            armature: None,
            config: &config,
            diagnostics: &mut diagnostics,
        };

        assert!(rig.set_value("A", 1.0, &mut ctx).is_err());
        assert_eq!(rig.find("A").unwrap().value, None);
        assert_eq!(rig.find("B").unwrap().value, None);
        assert_eq!(ctx.mesh.shape_key("A").unwrap().value, 0.0);
        assert_eq!(ctx.mesh.shape_key("B").unwrap().value, 0.0);

        // A retry is not swallowed by the epsilon check.
        assert!(matches!(
            rig.set_value("A", 1.0, &mut ctx),
            Err(DsonError::FormulaCycle(_))
        ));
    }

    #[test]
    fn test_unknown_morph() {
        let mut mesh = Mesh::default();
        let mut rig = MorphRig::new();
        let config = ImportConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut ctx = MorphContext {
            mesh: &mut mesh,
            armature: None,
            config: &config,
            diagnostics: &mut diagnostics,
        };
        assert!(matches!(
            rig.set_value("Nope", 1.0, &mut ctx),
            Err(DsonError::UnknownMorph(_))
        ));
    }

    #[test]
    fn test_unsupported_formula_is_skipped() {
        let mut mesh = Mesh::default();
        let mut rig = MorphRig::new();
        let mut diagnostics = Diagnostics::new();
        rig.register(
            &modifier(
                r##"{ "id": "Bend", "formulas": [
                     { "output": "#thigh?rotation/x",
                       "operations": [ {"op": "push", "val": 1}, {"op": "spline_tcb"} ] },
                     { "output": "#thigh?rotation/y", "operations": [ {"op": "push", "val": 1} ] } ] }"##,
            ),
            &mut mesh,
            &mut diagnostics,
        );
        assert_eq!(rig.find("Bend").unwrap().formulas.len(), 1);
        assert!(matches!(
            diagnostics.iter().next(),
            Some(Diagnostic::UnsupportedFormula { .. })
        ));
    }

    #[test]
    fn test_commit_pose_and_edit() {
        let mut mesh = Mesh::default();
        let mut armature = armature();
        let rest_before = *armature.find_bone("thigh").unwrap().segment();
        let mut rig = rig(
            &[r#"{ "id": "Kick", "formulas": [
                   { "output": "thigh:#thigh?rotation/x", "operations": [ {"op": "push", "val": 10} ] },
                   { "output": "thigh:#thigh?rotation/x", "operations": [ {"op": "push", "val": 5} ] },
                   { "output": "thigh:#thigh?end_point/y", "operations": [ {"op": "push", "val": -10} ] },
                   { "output": "calf:#calf?rotation/x", "operations": [ {"op": "push", "val": 1} ] } ] }"#],
            &mut mesh,
        );
        let config = ImportConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut ctx = MorphContext {
            mesh: &mut mesh,
            armature: Some(&mut armature),
            config: &config,
            diagnostics: &mut diagnostics,
        };
        rig.set_value("Kick", 1.0, &mut ctx).unwrap();

        let bone = armature.find_bone("thigh").unwrap();
        // -Z bone: source x lands in slot x unchanged.
        assert!((bone.pose.rotation.x - 15f64.to_radians()).abs() < EPS);
        assert!((bone.segment().tail - rest_before.tail).length() > 0.05);
        assert_eq!(armature.mode(), ArmatureMode::Object);
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::MissingBone { bone } if bone == "calf")));
    }
}
