//! DSON Core - DAZ Studio asset loading and scene import.
//!
//! This crate provides:
//!
//! - **Documents**: `.duf`/`.dsf` parsing, reference resolution and caching
//! - **Formulas**: the stack machine that drives morphs and joint corrections
//! - **Import**: meshes, armature, skin weights, shading and live morphs
//!
//! # Example
//!
//! ```ignore
//! use dson_core::{import_file, ImportConfig};
//!
//! let config = ImportConfig::with_content_root("/opt/daz/content");
//! let mut scene = import_file("/opt/daz/content/People/scene.duf", &config)?;
//! scene.set_morph_value("Body", "PBMBelly", 0.5)?;
//! println!("Imported {} objects with {} diagnostics",
//!     scene.objects.len(),
//!     scene.diagnostics.len());
//! ```

pub mod armature;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod formula;
pub mod import;
pub mod io;
pub mod mesh;
pub mod morph;
pub mod pose;
pub mod scene;
pub mod shading;
pub mod skin;
pub mod uri;

// Re-export commonly used types
pub use armature::{Armature, ArmatureMode, Bone};
pub use config::ImportConfig;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use document::Document;
pub use error::{DsonError, DsonResult};
pub use import::{import_document, import_file, ImportedScene, ObjectParent, SceneObject};
pub use io::{AssetSource, FsSource, MemorySource};
pub use mesh::Mesh;
pub use morph::MorphRig;
pub use shading::ShadingMaterial;
pub use uri::Uri;
