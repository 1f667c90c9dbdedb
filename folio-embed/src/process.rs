//! Process-pluggable embedder: shells out to an external command standing
//! in for an embedding model backend. The child is expected to read one
//! text per line on stdin (JSON-encoded string) and write one JSON array
//! of floats per line on stdout, in the same order.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{error, warn};

use crate::error::{EmbedError, Result};
use crate::{Embedder, EmbedderInfo};

#[derive(Debug, Clone)]
pub struct ProcessEmbedderConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub dimension: usize,
    pub provider_name: String,
}

#[derive(Debug, Clone)]
pub struct ProcessEmbedder {
    info: EmbedderInfo,
    command: PathBuf,
    args: Vec<String>,
}

impl ProcessEmbedder {
    pub fn new(config: ProcessEmbedderConfig) -> Result<Self> {
        if config.dimension == 0 {
            return Err(EmbedError::Provider("dimension must be greater than zero".into()));
        }
        Ok(Self {
            info: EmbedderInfo {
                provider: config.provider_name,
                dimension: config.dimension,
            },
            command: config.command,
            args: config.args,
        })
    }

    fn run_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                error!(command = %self.command.display(), %err, "failed to spawn embedder process");
                EmbedError::Provider(format!("failed to spawn embedder process: {err}"))
            })?;

        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| EmbedError::Provider("embedder process closed stdin".into()))?;
            for text in texts {
                let line = serde_json::to_string(text)
                    .map_err(|err| EmbedError::Provider(format!("failed to encode input: {err}")))?;
                writeln!(stdin, "{line}").map_err(|err| {
                    error!(%err, "failed to write to embedder stdin");
                    EmbedError::Provider(format!("failed to write to embedder stdin: {err}"))
                })?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|err| EmbedError::Provider(format!("embedder process failed: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(status = %output.status, %stderr, "embedder process exited with non-zero status");
            return Err(EmbedError::Provider(format!(
                "embedder process exited with {}: {stderr}",
                output.status
            )));
        }

        let reader = BufReader::new(output.stdout.as_slice());
        let mut vectors = Vec::with_capacity(texts.len());
        for line in reader.lines() {
            let line = line.map_err(|err| EmbedError::Provider(format!("failed to read embedder stdout: {err}")))?;
            let vector: Vec<f32> = serde_json::from_str(&line).map_err(|err| {
                error!(%line, %err, "failed to decode embedder output");
                EmbedError::Provider(format!("failed to decode embedder output `{line}`: {err}"))
            })?;
            if vector.len() != self.info.dimension {
                warn!(expected = self.info.dimension, actual = vector.len(), "embedder returned unexpected vector dimension");
                return Err(EmbedError::DimensionMismatch {
                    expected: self.info.dimension,
                    actual: vector.len(),
                });
            }
            vectors.push(vector);
        }

        if vectors.len() != texts.len() {
            warn!(expected = texts.len(), actual = vectors.len(), "embedder returned a different vector count than texts sent");
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        Ok(vectors)
    }
}

impl Embedder for ProcessEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run_batch(&[text]).map(|mut v| v.remove(0))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.run_batch(texts)
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}
