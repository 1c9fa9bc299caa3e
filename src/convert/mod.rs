//! Conversion of stored labels to markdown.
//!
//! The stage reads every `*.pdf` in the document store and writes
//! `<stem>.md` into an output store. A document whose output already exists is
//! skipped, so an interrupted conversion resumes where it stopped. Documents are
//! converted one at a time to stay inside the parsing service's rate limits.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use harvester_core::convert::{ConversionStage, LlamaParseConverter, DEFAULT_LLAMA_PARSE_BASE_URL};
//! use harvester_core::store::DocumentStore;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = LlamaParseConverter::from_env(Url::parse(DEFAULT_LLAMA_PARSE_BASE_URL)?)?;
//! let stage = ConversionStage::new(
//!     DocumentStore::open("data/labels").await?,
//!     DocumentStore::open("data/parsed").await?,
//!     Arc::new(converter),
//! );
//! let summary = stage.run().await?;
//! println!("converted {} of {}", summary.converted, summary.found);
//! # Ok(())
//! # }
//! ```

mod error;
mod llama;

pub use error::ConvertError;
pub use llama::{API_KEY_VAR, DEFAULT_LLAMA_PARSE_BASE_URL, LlamaParseConverter};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::store::{CommitOutcome, DocumentStore};

/// Extension of documents picked up for conversion.
pub const DOCUMENT_EXTENSION: &str = "pdf";

/// Extension of conversion output.
pub const OUTPUT_EXTENSION: &str = "md";

/// Turns one document into markdown text.
///
/// This trait uses `async_trait` so stages can hold an `Arc<dyn Converter>`.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Converts the document at `document`.
    async fn convert(&self, document: &Path) -> Result<String, ConvertError>;
}

/// Counts for one conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    /// Documents found in the store.
    pub found: usize,
    /// Documents converted in this run.
    pub converted: usize,
    /// Documents whose output already existed.
    pub already_converted: usize,
    /// Documents that could not be converted.
    pub failed: usize,
}

/// Output file name for a document: `ABC123.pdf` becomes `ABC123.md`.
#[must_use]
pub fn output_name(document_name: &str) -> Option<String> {
    let stem = Path::new(document_name).file_stem()?.to_str()?;
    if stem.is_empty() {
        return None;
    }
    Some(format!("{stem}.{OUTPUT_EXTENSION}"))
}

/// Converts every unconverted document in a store.
pub struct ConversionStage {
    documents: DocumentStore,
    output: DocumentStore,
    converter: Arc<dyn Converter>,
}

impl ConversionStage {
    /// Stage reading from `documents` and writing into `output`.
    #[must_use]
    pub fn new(
        documents: DocumentStore,
        output: DocumentStore,
        converter: Arc<dyn Converter>,
    ) -> Self {
        Self {
            documents,
            output,
            converter,
        }
    }

    /// Converts each document lacking output. Per-document failures are
    /// logged and counted.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Store`] if the document store cannot be listed.
    #[instrument(skip(self), fields(converter = self.converter.name(), documents = %self.documents.root().display()))]
    pub async fn run(&self) -> Result<ConversionSummary, ConvertError> {
        let names = self.documents.list_with_extension(DOCUMENT_EXTENSION).await?;
        let mut summary = ConversionSummary {
            found: names.len(),
            ..ConversionSummary::default()
        };
        info!(found = summary.found, "documents to consider");

        for name in &names {
            let Some(output_name) = output_name(name) else {
                warn!(document = %name, "no output name for document");
                summary.failed += 1;
                continue;
            };
            match self.convert_one(name, &output_name).await {
                Ok(true) => summary.converted += 1,
                Ok(false) => summary.already_converted += 1,
                Err(e) => {
                    warn!(document = %name, error = %e, "conversion failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            found = summary.found,
            converted = summary.converted,
            already_converted = summary.already_converted,
            failed = summary.failed,
            "conversion complete"
        );
        Ok(summary)
    }

    /// Returns `Ok(false)` when output already existed.
    async fn convert_one(&self, name: &str, output_name: &str) -> Result<bool, ConvertError> {
        if self.output.contains(output_name).await? {
            debug!(document = %name, "already converted");
            return Ok(false);
        }
        let path = self.documents.path_for(name)?;
        let markdown = self.converter.convert(&path).await?;
        match self
            .output
            .write_if_absent(output_name, markdown.as_bytes())
            .await?
        {
            CommitOutcome::Stored(path) => {
                debug!(output = %path.display(), "markdown written");
                Ok(true)
            }
            CommitOutcome::AlreadyPresent(_) => Ok(false),
        }
    }
}
