//! The `PrefixFn` contract: a caller-provided, optionally slow prefix
//! generator (an LLM call, in the typical deployment). The engine has no
//! async runtime of its own, so suspension is modeled by letting the
//! implementation block its calling thread, which is acceptable under
//! the serialized-write contract the store already enforces.

/// `(documentName, page, chunkText) -> prefix`. Failure triggers fallback
/// to the heuristic contextualizer.
pub trait PrefixFn: Send + Sync {
    fn call(&self, document_name: &str, page: Option<i64>, chunk_text: &str) -> Result<String, String>;
}

impl<F> PrefixFn for F
where
    F: Fn(&str, Option<i64>, &str) -> Result<String, String> + Send + Sync,
{
    fn call(&self, document_name: &str, page: Option<i64>, chunk_text: &str) -> Result<String, String> {
        self(document_name, page, chunk_text)
    }
}
