pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod llm;
pub mod pipeline;
pub mod safety;
pub mod store;
pub mod summary;
pub mod telemetry;

use std::sync::Arc;

use auth::{IdentityVerifier, StaticTokenVerifier};
use config::Config;
use error::{AppError, Result};
use extract::Extractor;
use fetch::HttpFetcher;
use llm::{OpenRouterClient, SummaryBackend};
use pipeline::Pipeline;
use store::{InMemoryLinkStore, LinkStore};
use summary::Summarizer;

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Pipeline,
    pub store: Arc<dyn LinkStore>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(
        config: Config,
        pipeline: Pipeline,
        store: Arc<dyn LinkStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
            store,
            verifier,
        }
    }

    /// Wire the production collaborators described by `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let backend: Option<Arc<dyn SummaryBackend>> = match &config.llm {
            Some(settings) => {
                let client = OpenRouterClient::new(settings.api_key.clone(), settings.model.clone())
                    .with_base_url(settings.base_url.clone())
                    .with_site(settings.site_url.clone(), settings.site_name.clone())
                    .with_timeout(config.summary_timeout)
                    .map_err(|e| AppError::ConfigError(format!("LLM client: {}", e)))?;
                Some(Arc::new(client) as Arc<dyn SummaryBackend>)
            }
            None => {
                tracing::warn!("OPENROUTER_API_KEY not set, links will get fallback summaries");
                None
            }
        };

        let extractor = Extractor::new(Arc::new(HttpFetcher::new(config.fetch_timeout)));
        let summarizer = Summarizer::new(backend).with_timeout(config.summary_timeout);

        let verifier = StaticTokenVerifier::parse(&config.auth_tokens);
        if verifier.is_empty() {
            tracing::warn!("AUTH_TOKENS is empty, every authenticated request will be rejected");
        }

        Ok(Self::new(
            config,
            Pipeline::new(extractor, summarizer),
            Arc::new(InMemoryLinkStore::new()),
            Arc::new(verifier),
        ))
    }
}
