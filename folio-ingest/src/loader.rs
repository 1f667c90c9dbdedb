//! The `Loader` contract (component C8): `supports(input) -> bool` and
//! `load(input) -> LoadedDocument`.

use std::path::{Path, PathBuf};

use folio_model::LoadedDocument;

use crate::error::Result;

/// A file on disk to be loaded. Capability is decided by extension.
#[derive(Debug, Clone)]
pub struct LoadInput {
    pub path: PathBuf,
}

impl LoadInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }
}

pub trait Loader: Send + Sync {
    fn supports(&self, input: &LoadInput) -> bool;
    fn load(&self, input: &LoadInput) -> Result<LoadedDocument>;
}

/// Picks the first loader among `loaders` whose `supports` predicate
/// accepts `input`.
pub fn dispatch<'a>(loaders: &'a [Box<dyn Loader>], input: &LoadInput) -> Option<&'a dyn Loader> {
    loaders
        .iter()
        .find(|loader| loader.supports(input))
        .map(|b| b.as_ref())
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string()
}
