//! Document ingestion into the vector store.
//!
//! Guides are read from text or markdown files, split into overlapping
//! chunks, embedded as documents and written into a collection. Catalog
//! products are indexed one record per passage without splitting.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use brocha_core::error::BrochaError;
use brocha_llm::EmbeddingProvider;

use crate::splitter::TextSplitter;
use crate::store::VectorStore;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Passages embedded and stored.
    pub chunks: usize,
    /// Passages skipped because they were empty.
    pub skipped: usize,
}

impl IngestReport {
    fn absorb(&mut self, other: IngestReport) {
        self.chunks += other.chunks;
        self.skipped += other.skipped;
    }
}

pub struct DocumentIngester {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<VectorStore>,
    splitter: TextSplitter,
}

impl DocumentIngester {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<VectorStore>,
        splitter: TextSplitter,
    ) -> Self {
        Self {
            embedder,
            store,
            splitter,
        }
    }

    /// Ingest a `.txt` or `.md` file into `collection`.
    pub async fn ingest_file(
        &self,
        path: &Path,
        collection: &str,
    ) -> Result<IngestReport, BrochaError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !matches!(extension.as_str(), "txt" | "md" | "markdown") {
            return Err(BrochaError::Ingestion(format!(
                "unsupported file type: {}",
                path.display()
            )));
        }

        let text = std::fs::read_to_string(path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let report = self.ingest_text(&text, &source, collection).await?;
        info!(
            file = %path.display(),
            collection,
            chunks = report.chunks,
            skipped = report.skipped,
            "Document ingested"
        );
        Ok(report)
    }

    /// Ingest several files, stopping at the first failure.
    pub async fn ingest_files(
        &self,
        paths: &[impl AsRef<Path>],
        collection: &str,
    ) -> Result<IngestReport, BrochaError> {
        let mut total = IngestReport::default();
        for path in paths {
            total.absorb(self.ingest_file(path.as_ref(), collection).await?);
        }
        Ok(total)
    }

    /// Split, embed and store a block of text.
    pub async fn ingest_text(
        &self,
        text: &str,
        source: &str,
        collection: &str,
    ) -> Result<IngestReport, BrochaError> {
        let chunks = self.splitter.split(text);
        self.store_passages(chunks.iter().map(String::as_str), source, collection)
            .await
    }

    /// Store each text as its own passage, no splitting.
    pub async fn index_records<'a>(
        &self,
        texts: impl IntoIterator<Item = &'a str>,
        source: &str,
        collection: &str,
    ) -> Result<IngestReport, BrochaError> {
        self.store_passages(texts, source, collection).await
    }

    async fn store_passages<'a>(
        &self,
        passages: impl IntoIterator<Item = &'a str>,
        source: &str,
        collection: &str,
    ) -> Result<IngestReport, BrochaError> {
        let mut report = IngestReport::default();
        for passage in passages {
            if passage.trim().is_empty() {
                debug!(source, "Skipping empty passage");
                report.skipped += 1;
                continue;
            }
            let embedding = self
                .embedder
                .embed_document(passage)
                .await
                .map_err(|e| {
                    warn!(source, error = %e, "Embedding failed during ingestion");
                    BrochaError::from(e)
                })?;
            self.store.insert(collection, passage, embedding, source)?;
            report.chunks += 1;
        }
        Ok(report)
    }
}
