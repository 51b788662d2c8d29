use serde::Serialize;

use crate::extract::{ExtractError, Extractor};
use crate::summary::Summarizer;

/// Everything needed to persist a link, minus the server-assigned fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedLinkDraft {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("{0}")]
    InvalidUrl(String),

    #[error("Failed to extract article content: {0}")]
    FetchFailed(String),
}

impl From<ExtractError> for IngestError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Rejected(rejection) => IngestError::InvalidUrl(rejection.to_string()),
            ExtractError::Fetch(fetch) => IngestError::FetchFailed(fetch.to_string()),
        }
    }
}

/// Validate → extract → summarize for one submitted URL.
#[derive(Clone)]
pub struct Pipeline {
    extractor: Extractor,
    summarizer: Summarizer,
}

impl Pipeline {
    pub fn new(extractor: Extractor, summarizer: Summarizer) -> Self {
        Self {
            extractor,
            summarizer,
        }
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    #[tracing::instrument(skip(self))]
    pub async fn ingest(&self, url: &str) -> Result<SavedLinkDraft, IngestError> {
        let started = std::time::Instant::now();

        let article = self.extractor.try_extract(url).await.map_err(|e| {
            tracing::info!(error = %e, "ingestion aborted");
            IngestError::from(e)
        })?;
        tracing::debug!(title = %article.title, chars = article.body.chars().count(), "article extracted");

        let summary = self.summarizer.summarize(&article.body, &article.title).await;
        tracing::info!(elapsed = ?started.elapsed(), tags = summary.tags.len(), "ingestion complete");

        Ok(SavedLinkDraft {
            url: url.to_string(),
            title: article.title,
            summary: summary.summary,
            tags: summary.tags,
        })
    }
}
