//! Reference resolution across documents.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::library::{Library, LibraryEntry};
use super::{Document, Libraries};
use crate::error::{DsonError, DsonResult};
use crate::io::AssetSource;
use crate::uri::Uri;

/// Resolves references for one document.
///
/// References with a file path load the named document relative to the
/// content root. Loaded documents are cached for the lifetime of the
/// referencing document, so every file is read at most once per resolver.
pub(crate) struct Resolver {
    content_root: PathBuf,
    source: Rc<dyn AssetSource>,
    /// Documents loaded for external references, keyed by content path
    reference_cache: RefCell<HashMap<String, Rc<Document>>>,
    /// Content paths being loaded along the current chain of references
    loading: Rc<RefCell<Vec<String>>>,
}

impl Resolver {
    pub fn new(content_root: impl Into<PathBuf>, source: Rc<dyn AssetSource>) -> Self {
        Self {
            content_root: content_root.into(),
            source,
            reference_cache: RefCell::new(HashMap::new()),
            loading: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Resolver for a document loaded on behalf of this one.
    fn child(&self) -> Self {
        Self {
            content_root: self.content_root.clone(),
            source: Rc::clone(&self.source),
            reference_cache: RefCell::new(HashMap::new()),
            loading: Rc::clone(&self.loading),
        }
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    pub fn source(&self) -> &Rc<dyn AssetSource> {
        &self.source
    }

    /// Absolute path of a content-relative path such as `/data/a.dsf`.
    pub fn content_path(&self, relative: &str) -> PathBuf {
        self.content_root.join(relative.trim_start_matches('/'))
    }

    /// Look up `url` in the library chosen by `select`, either in `local`
    /// (no file path) or in the referenced document.
    pub fn find<T: LibraryEntry>(
        &self,
        local: &Libraries,
        url: &str,
        select: fn(&Libraries) -> &Library<T>,
    ) -> DsonResult<Rc<T>> {
        let uri = Uri::parse(url)?;
        if !uri.has_asset_id() {
            return Err(DsonError::ReferenceNotFound(format!("{} (no asset id)", url)));
        }

        let found = if uri.is_external() {
            let document = self.document(&uri.file_path)?;
            select(&document.libraries).find(&uri.asset_id)
        } else {
            select(local).find(&uri.asset_id)
        };
        found.ok_or_else(|| DsonError::ReferenceNotFound(url.to_string()))
    }

    /// Load (or fetch from the cache) the document at a content path.
    pub fn document(&self, file_path: &str) -> DsonResult<Rc<Document>> {
        if let Some(document) = self.reference_cache.borrow().get(file_path) {
            return Ok(Rc::clone(document));
        }
        if !self.source.is_dir(&self.content_root) {
            return Err(DsonError::ContentRootMissing(self.content_root.clone()));
        }
        if self.loading.borrow().iter().any(|p| p == file_path) {
            return Err(DsonError::ReferenceNotFound(format!("{} (circular reference)", file_path)));
        }

        let path = self.content_path(file_path);
        log::debug!("Loading referenced document {}", path.display());

        self.loading.borrow_mut().push(file_path.to_string());
        let loaded = Document::load_with_resolver(&path, self.child());
        self.loading.borrow_mut().pop();

        let document = Rc::new(loaded.map_err(|e| match e {
            DsonError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                DsonError::ReferenceNotFound(format!("{} ({})", file_path, path.display()))
            }
            other => other,
        })?);
        self.reference_cache
            .borrow_mut()
            .insert(file_path.to_string(), Rc::clone(&document));
        Ok(document)
    }

    pub fn cached_document_count(&self) -> usize {
        self.reference_cache.borrow().len()
    }
}
