#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

use link_summarizer::extract::Extractor;
use link_summarizer::fetch::{FetchError, PageFetcher};
use link_summarizer::llm::{LlmError, SummaryBackend};
use link_summarizer::pipeline::Pipeline;
use link_summarizer::summary::Summarizer;

/// Serves one canned page and counts how often it was asked to.
pub struct StubFetcher {
    html: Result<String, u16>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn page(html: &str) -> Arc<Self> {
        Arc::new(Self {
            html: Ok(html.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn status(code: u16) -> Arc<Self> {
        Arc::new(Self {
            html: Err(code),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, _url: &Url) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.html {
            Ok(html) => Ok(html.clone()),
            Err(code) => Err(FetchError::Status(
                reqwest::StatusCode::from_u16(*code).unwrap(),
            )),
        }
    }
}

/// Returns a fixed reply, or fails when built with `failing`.
pub struct StubBackend {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl StubBackend {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryBackend for StubBackend {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or(LlmError::Api {
            status: 503,
            body: "unavailable".into(),
        })
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

pub fn pipeline(fetcher: Arc<StubFetcher>, backend: Option<Arc<StubBackend>>) -> Pipeline {
    let backend = backend.map(|b| b as Arc<dyn SummaryBackend>);
    Pipeline::new(Extractor::new(fetcher), Summarizer::new(backend))
}
