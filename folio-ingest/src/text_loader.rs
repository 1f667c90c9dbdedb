//! Plain-text loader: the whole file becomes a single unpaged page.

use std::fs;

use folio_model::{LoadedDocument, LoadedPage};
use tracing::debug;

use crate::error::{LoadError, Result};
use crate::loader::{display_name, LoadInput, Loader};

#[derive(Debug, Default)]
pub struct TextLoader;

impl Loader for TextLoader {
    fn supports(&self, input: &LoadInput) -> bool {
        matches!(input.extension(), Some(ext) if ext.eq_ignore_ascii_case("txt"))
    }

    fn load(&self, input: &LoadInput) -> Result<LoadedDocument> {
        let bytes = fs::read(&input.path)
            .map_err(|err| LoadError::Decode(format!("{}: {err}", input.path.display())))?;
        let text = String::from_utf8_lossy(&bytes).replace('\r', "");

        debug!(path = %input.path.display(), bytes = bytes.len(), "loaded plain text document");

        Ok(LoadedDocument {
            name: display_name(&input.path),
            pages: vec![LoadedPage { index: 0, text }],
        })
    }
}
