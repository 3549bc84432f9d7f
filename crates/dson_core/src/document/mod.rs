//! DSON documents and their asset libraries.
//!
//! A [`Document`] is one parsed `.duf`/`.dsf` file: its libraries of
//! templates and its scene of instances. References to other files are
//! loaded on demand relative to the content root and cached for the
//! document's lifetime.
//!
//! # Example
//!
//! ```ignore
//! use dson_core::config::ImportConfig;
//! use dson_core::document::Document;
//!
//! let config = ImportConfig::with_content_root("/opt/daz/content");
//! let document = Document::load("/opt/daz/content/People/scene.duf", &config)?;
//! println!("{} nodes", document.scene.nodes.len());
//! ```

pub mod channel;
pub mod geometry;
pub mod image;
pub mod library;
pub mod material;
pub mod modifier;
pub mod node;
pub mod raw;
pub(crate) mod resolver;
pub mod uv_set;

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use crate::config::ImportConfig;
use crate::error::DsonResult;
use crate::io::{decode_text, AssetSource, FsSource};
use crate::scene::Scene;

pub use channel::Channel;
pub use geometry::{Geometry, Polygon, VertexSet};
pub use image::Image;
pub use library::{Library, LibraryEntry};
pub use material::{Extra, Material};
pub use modifier::{Joint, LocalWeights, Modifier, ModifierKind, Morph, Skin, VertexDelta};
pub use node::{Node, NodeKind};
pub use uv_set::UvSet;

use raw::RawDocument;
use resolver::Resolver;

/// All libraries of one document.
#[derive(Debug, Default)]
pub struct Libraries {
    pub uv_sets: Library<UvSet>,
    pub geometries: Library<Geometry>,
    pub materials: Library<Material>,
    pub images: Library<Image>,
    pub nodes: Library<Node>,
    pub modifiers: Library<Modifier>,
}

pub struct Document {
    /// File the document was read from.
    pub path: PathBuf,
    pub asset_id: String,
    pub libraries: Libraries,
    pub scene: Scene,
    resolver: Resolver,
}

impl Document {
    /// Load a document from disk.
    pub fn load<P: AsRef<Path>>(path: P, config: &ImportConfig) -> DsonResult<Document> {
        Self::load_with_source(path, &config.content_root, Rc::new(FsSource))
    }

    /// Load a document through a custom [`AssetSource`].
    pub fn load_with_source<P: AsRef<Path>>(
        path: P,
        content_root: impl Into<PathBuf>,
        source: Rc<dyn AssetSource>,
    ) -> DsonResult<Document> {
        Self::load_with_resolver(path.as_ref(), Resolver::new(content_root, source))
    }

    /// Parse a document from text (useful for testing).
    pub fn from_str(
        text: &str,
        path: impl Into<PathBuf>,
        content_root: impl Into<PathBuf>,
        source: Rc<dyn AssetSource>,
    ) -> DsonResult<Document> {
        Self::parse(text, path.into(), Resolver::new(content_root, source))
    }

    pub(crate) fn load_with_resolver(path: &Path, resolver: Resolver) -> DsonResult<Document> {
        let start = Instant::now();
        let bytes = resolver.source().read(path)?;
        let text = decode_text(&bytes)?;
        let document = Self::parse(&text, path.to_path_buf(), resolver)?;
        log::info!(
            "Loaded {} ({} nodes, {} geometries, {} modifiers) in {:.1?}",
            path.display(),
            document.libraries.nodes.len(),
            document.libraries.geometries.len(),
            document.libraries.modifiers.len(),
            start.elapsed()
        );
        Ok(document)
    }

    fn parse(text: &str, path: PathBuf, resolver: Resolver) -> DsonResult<Document> {
        let raw: RawDocument = serde_json::from_str(text)?;
        let mut libraries = Libraries::default();

        for uv_set in raw.uv_set_library {
            libraries.uv_sets.insert(UvSet::from_raw(uv_set));
        }
        for geometry in raw.geometry_library {
            let uv_set = match &geometry.default_uv_set {
                Some(url) => Some(resolver.find(&libraries, url, |l| &l.uv_sets)?),
                None => None,
            };
            libraries
                .geometries
                .insert(Geometry::from_raw(geometry, &path, uv_set));
        }
        for material in raw.material_library {
            libraries.materials.insert(Material::from_raw(material));
        }
        for image in raw.image_library {
            libraries.images.insert(Image::from_raw(image));
        }
        for node in &raw.node_library {
            libraries.nodes.insert(Node::from_raw(node));
        }
        for modifier in raw.modifier_library {
            libraries.modifiers.insert(Modifier::from_raw(modifier));
        }

        let scene = Scene::build(&raw.scene, &resolver, &libraries)?;
        Ok(Document {
            path,
            asset_id: raw.asset_info.id,
            libraries,
            scene,
            resolver,
        })
    }

    pub fn find_uv_set(&self, url: &str) -> DsonResult<Rc<UvSet>> {
        self.resolver.find(&self.libraries, url, |l| &l.uv_sets)
    }

    pub fn find_geometry(&self, url: &str) -> DsonResult<Rc<Geometry>> {
        self.resolver.find(&self.libraries, url, |l| &l.geometries)
    }

    pub fn find_material(&self, url: &str) -> DsonResult<Rc<Material>> {
        self.resolver.find(&self.libraries, url, |l| &l.materials)
    }

    pub fn find_image(&self, url: &str) -> DsonResult<Rc<Image>> {
        self.resolver.find(&self.libraries, url, |l| &l.images)
    }

    pub fn find_node(&self, url: &str) -> DsonResult<Rc<Node>> {
        self.resolver.find(&self.libraries, url, |l| &l.nodes)
    }

    pub fn find_modifier(&self, url: &str) -> DsonResult<Rc<Modifier>> {
        self.resolver.find(&self.libraries, url, |l| &l.modifiers)
    }

    pub fn content_root(&self) -> &Path {
        self.resolver.content_root()
    }

    /// Absolute path of a content-relative path.
    pub fn content_path(&self, relative: &str) -> PathBuf {
        self.resolver.content_path(relative)
    }

    pub fn source(&self) -> &Rc<dyn AssetSource> {
        self.resolver.source()
    }

    /// Number of referenced documents loaded so far.
    pub fn supporting_document_count(&self) -> usize {
        self.resolver.cached_document_count()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("path", &self.path)
            .field("asset_id", &self.asset_id)
            .field("nodes", &self.libraries.nodes.len())
            .field("scene_nodes", &self.scene.nodes.len())
            .finish()
    }
}
