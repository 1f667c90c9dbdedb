//! PDF loader: extracts digital text per page via `lopdf`. PDF
//! rasterization and OCR are out of scope — pages with no extractable
//! text come back empty and are left to the chunker/caller.

use lopdf::Document;
use tracing::{debug, warn};

use folio_model::{LoadedDocument, LoadedPage};

use crate::error::{LoadError, Result};
use crate::loader::{display_name, LoadInput, Loader};

#[derive(Debug, Default)]
pub struct PdfLoader;

impl Loader for PdfLoader {
    fn supports(&self, input: &LoadInput) -> bool {
        matches!(input.extension(), Some(ext) if ext.eq_ignore_ascii_case("pdf"))
    }

    fn load(&self, input: &LoadInput) -> Result<LoadedDocument> {
        let doc = Document::load(&input.path)
            .map_err(|err| LoadError::Decode(format!("{}: {err}", input.path.display())))?;

        let page_numbers: Vec<u32> = doc.get_pages().into_keys().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());
        for (index, page_num) in page_numbers.into_iter().enumerate() {
            let text = doc.extract_text(&[page_num]).unwrap_or_else(|err| {
                warn!(page = page_num, %err, "no extractable digital text on page");
                String::new()
            });
            pages.push(LoadedPage {
                index: index as i64,
                text,
            });
        }

        debug!(path = %input.path.display(), pages = pages.len(), "loaded pdf document");

        Ok(LoadedDocument {
            name: display_name(&input.path),
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_support_non_pdf_extension() {
        let loader = PdfLoader;
        let input = LoadInput::new("/tmp/file.txt");
        assert!(!loader.supports(&input));
    }

    #[test]
    fn supports_pdf_extension_case_insensitively() {
        let loader = PdfLoader;
        assert!(loader.supports(&LoadInput::new("/tmp/file.PDF")));
    }
}
