//! Import configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DsonResult;

/// Environment variable consulted by [`ImportConfig::from_env`].
pub const CONTENT_ROOT_ENV: &str = "DSON_CONTENT_ROOT";

/// Settings for loading documents and building a scene from them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Directory that cross-file references are resolved against (the folder
    /// holding `data/`, `Runtime/`, `People/`, ...).
    pub content_root: PathBuf,

    /// Load morph files found next to each geometry's source file.
    pub load_morphs: bool,

    /// Name of the morph directory next to a geometry's source file.
    pub morph_directory: String,

    /// Morph files whose name contains any of these are ignored.
    pub morph_exclude: Vec<String>,

    /// Skin weights below this are dropped when vertex groups are built.
    pub min_weight: f64,

    /// Slider changes smaller than this do not re-evaluate a morph.
    pub morph_epsilon: f64,

    /// Upper bound on nested morph applications.
    pub max_morph_depth: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::new(),
            load_morphs: true,
            morph_directory: "Morphs".to_string(),
            morph_exclude: vec!["CTRLRIG".to_string()],
            min_weight: 0.001,
            morph_epsilon: 0.001,
            max_morph_depth: 64,
        }
    }
}

impl ImportConfig {
    /// Configuration with the given content root and defaults otherwise.
    pub fn with_content_root(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
            ..Default::default()
        }
    }

    /// Defaults, with the content root taken from `DSON_CONTENT_ROOT` if set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(root) = std::env::var_os(CONTENT_ROOT_ENV) {
            config.content_root = PathBuf::from(root);
        }
        config
    }

    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> DsonResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// True when a morph file name is on the exclusion list.
    pub fn is_excluded_morph(&self, file_name: &str) -> bool {
        self.morph_exclude.iter().any(|pattern| file_name.contains(pattern.as_str()))
    }
}
