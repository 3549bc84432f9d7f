//! Material inputs for the renderer and material-to-face assignment.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde_json::Value;

use crate::document::{Channel, Document, Geometry, Material};
use crate::io::resolve_case_insensitive;
use crate::mesh::{EdgeKey, Mesh};
use crate::uri::percent_decode;

/// Extra block whose channels feed a few standard inputs.
pub const STUDIO_EXTRA: &str = "studio_material_channels";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    Color,
    Scalar,
}

/// Standard material channels and the input each one drives.
pub const MATERIAL_INPUTS: &[(&str, InputKind)] = &[
    ("diffuse", InputKind::Color),
    ("diffuse_strength", InputKind::Scalar),
    ("specular", InputKind::Color),
    ("specular_strength", InputKind::Scalar),
    ("glossiness", InputKind::Scalar),
    ("ambient", InputKind::Color),
    ("ambient_strength", InputKind::Scalar),
    ("reflection", InputKind::Color),
    ("reflection_strength", InputKind::Scalar),
    ("refraction", InputKind::Color),
    ("refraction_strength", InputKind::Scalar),
    ("ior", InputKind::Scalar),
    ("bump", InputKind::Scalar),
    ("bump_min", InputKind::Scalar),
    ("bump_max", InputKind::Scalar),
    ("displacement", InputKind::Scalar),
    ("displacement_min", InputKind::Scalar),
    ("displacement_max", InputKind::Scalar),
    ("transparency", InputKind::Scalar),
    ("normal", InputKind::Color),
];

/// `(extra channel, input)` pairs taken from the studio extra block.
pub const STUDIO_INPUTS: &[(&str, &str, InputKind)] = &[
    ("Bump Strength", "bump", InputKind::Scalar),
    ("Displacement Strength", "displacement", InputKind::Scalar),
    ("Specular Color", "specular", InputKind::Color),
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputValue {
    /// RGBA, alpha always 1.
    Color([f64; 4]),
    Scalar(f64),
}

impl InputValue {
    fn from_json(value: &Value, kind: InputKind) -> Option<InputValue> {
        match kind {
            InputKind::Scalar => value.as_f64().map(InputValue::Scalar),
            InputKind::Color => {
                let rgb = value.as_array()?;
                let [r, g, b] = [rgb.first()?, rgb.get(1)?, rgb.get(2)?].map(|c| c.as_f64());
                Some(InputValue::Color([r?, g?, b?, 1.0]))
            }
        }
    }
}

/// One renderer input: a value, an image, or both.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialInput {
    pub value: Option<InputValue>,
    pub image: Option<PathBuf>,
}

/// A scene material ready for the renderer.
#[derive(Clone, Debug, Default)]
pub struct ShadingMaterial {
    pub name: String,
    pub kind: String,
    /// Object the material was assigned to.
    pub object: Option<String>,
    /// Material slot on that object's mesh.
    pub slot: Option<usize>,
    /// UV layer textures sample from.
    pub uv_map: Option<String>,
    pub inputs: BTreeMap<String, MaterialInput>,
}

impl ShadingMaterial {
    pub fn new(material: &Material, document: &Document) -> Self {
        Self {
            name: material.id.clone(),
            kind: material.kind.clone(),
            inputs: material_inputs(material, document),
            ..Default::default()
        }
    }

    /// True when any input samples an image.
    pub fn has_textures(&self) -> bool {
        self.inputs.values().any(|i| i.image.is_some())
    }
}

/// Collect the renderer inputs of a material. Studio extra channels override
/// the standard channel of the same input.
pub fn material_inputs(material: &Material, document: &Document) -> BTreeMap<String, MaterialInput> {
    let mut inputs = BTreeMap::new();
    for &(name, kind) in MATERIAL_INPUTS {
        if let Some(channel) = material.channel(name) {
            merge_input(&mut inputs, name, channel_input(channel, kind, document));
        }
    }
    if let Some(extra) = material.find_extra(STUDIO_EXTRA) {
        for &(channel_name, input, kind) in STUDIO_INPUTS {
            if let Some(channel) = extra.channels.get(channel_name) {
                merge_input(&mut inputs, input, channel_input(channel, kind, document));
            }
        }
    }
    inputs
}

fn merge_input(inputs: &mut BTreeMap<String, MaterialInput>, name: &str, input: MaterialInput) {
    let entry = inputs.entry(name.to_string()).or_default();
    if input.value.is_some() {
        entry.value = input.value;
    }
    if input.image.is_some() {
        entry.image = input.image;
    }
}

fn channel_input(channel: &Channel, kind: InputKind, document: &Document) -> MaterialInput {
    MaterialInput {
        value: channel
            .current_value()
            .and_then(|v| InputValue::from_json(v, kind)),
        image: channel_image(channel, document),
    }
}

/// Absolute image path of a channel. `image_file` wins over an image
/// library reference.
pub fn channel_image(channel: &Channel, document: &Document) -> Option<PathBuf> {
    let relative = match (&channel.image_file, &channel.image) {
        (Some(file), _) => percent_decode(file),
        (None, Some(reference)) => match document.find_image(reference) {
            Ok(image) => percent_decode(image.url.as_deref()?),
            Err(e) => {
                log::warn!("{}: image {} not found: {}", channel.id, reference, e);
                return None;
            }
        },
        (None, None) => return None,
    };

    let path = document.content_path(&relative);
    if path.exists() {
        Some(path)
    } else {
        Some(resolve_case_insensitive(&path))
    }
}

/// UV layer a material's textures use: its own UV set when that resolves
/// (added to the mesh if missing), else the mesh's first layer.
pub fn uv_map_for(material: &Material, document: &Document, mesh: &mut Mesh) -> Option<String> {
    if let Some(url) = &material.uv_set {
        match document.find_uv_set(url) {
            Ok(uv_set) => return Some(mesh.add_uv_layer(&uv_set)),
            Err(e) => log::debug!("{}: uv set {} not used: {}", material.id, url, e),
        }
    }
    mesh.uv_layers.first().map(|l| l.name.clone())
}

/// Assign a material slot to the faces of the material's groups, set their
/// smooth flag from `Smooth On` and mark sharp edges per `Smooth Angle`.
/// Returns the number of faces assigned.
pub fn assign_material(
    mesh: &mut Mesh,
    material: &Material,
    geometry: &Geometry,
    slot: usize,
    edge_faces: &HashMap<EdgeKey, Vec<usize>>,
) -> usize {
    let smooth = material
        .find_extra_channel("Smooth On")
        .and_then(Channel::current_bool)
        .unwrap_or(false);
    let smooth_angle = material
        .find_extra_channel("Smooth Angle")
        .and_then(Channel::current_f64)
        .unwrap_or(-1.0);

    let mut assigned = 0;
    for group in &material.groups {
        for face in geometry.material_group_faces(group) {
            if face >= mesh.face_count() {
                continue;
            }
            mesh.face_materials[face] = Some(slot);
            mesh.face_smooth[face] = smooth;
            if smooth_angle >= 0.0 {
                mesh.mark_sharp_edges(face, smooth_angle, edge_faces);
            }
            assigned += 1;
        }
    }
    log::debug!("{}: {} faces in slot {} of {}", material.id, assigned, slot, mesh.name);
    assigned
}
