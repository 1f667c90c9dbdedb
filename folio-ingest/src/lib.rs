//! Document loading, header/footer filtering, and chunking (component C8's
//! `Loader`/`Chunker` contracts, plus working default implementations).

pub mod chunker;
pub mod error;
pub mod header_footer;
pub mod loader;
pub mod pdf_loader;
pub mod text_loader;

pub use chunker::{Chunker, ChunkerConfig, DefaultChunker};
pub use error::{LoadError, Result};
pub use header_footer::strip_headers_and_footers;
pub use loader::{dispatch, LoadInput, Loader};
pub use pdf_loader::PdfLoader;
pub use text_loader::TextLoader;
