//! Turns extracted article text into a short summary and topical tags.
//!
//! The model is asked for bare JSON but routinely wraps it in code fences or
//! surrounds it with prose. Parsing is a best-effort decode whose failure is
//! an ordinary outcome: [`Summarizer::summarize`] answers with a fallback
//! summary instead of an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::llm::SummaryBackend;

pub const MAX_PROMPT_CHARS: usize = 3000;
pub const MAX_TAGS: usize = 5;
pub const DEFAULT_SUMMARY_TIMEOUT: Duration = Duration::from_secs(20);
pub const FALLBACK_TAG: &str = "saved";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    pub tags: Vec<String>,
}

impl SummaryResult {
    pub fn fallback(title: &str) -> Self {
        Self {
            summary: format!("Article: {}", title),
            tags: vec![FALLBACK_TAG.to_string()],
        }
    }
}

/// Why the fallback was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degraded {
    Unconfigured,
    Backend(String),
    TimedOut,
    Unparseable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Generated(SummaryResult),
    Fallback(SummaryResult, Degraded),
}

#[derive(Clone)]
pub struct Summarizer {
    backend: Option<Arc<dyn SummaryBackend>>,
    timeout: Duration,
}

impl Summarizer {
    pub fn new(backend: Option<Arc<dyn SummaryBackend>>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_SUMMARY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn summarize(&self, body: &str, title: &str) -> SummaryResult {
        match self.summarize_outcome(body, title).await {
            SummaryOutcome::Generated(result) => result,
            SummaryOutcome::Fallback(result, reason) => {
                tracing::warn!(title, ?reason, "summarization degraded, using fallback");
                result
            }
        }
    }

    pub async fn summarize_outcome(&self, body: &str, title: &str) -> SummaryOutcome {
        let Some(backend) = &self.backend else {
            return SummaryOutcome::Fallback(SummaryResult::fallback(title), Degraded::Unconfigured);
        };

        let prompt = build_prompt(body, title);
        let started = std::time::Instant::now();
        let reply = match tokio::time::timeout(self.timeout, backend.complete(&prompt)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                return SummaryOutcome::Fallback(
                    SummaryResult::fallback(title),
                    Degraded::Backend(e.to_string()),
                );
            }
            Err(_) => return SummaryOutcome::Fallback(SummaryResult::fallback(title), Degraded::TimedOut),
        };
        tracing::debug!(model = backend.model_name(), elapsed = ?started.elapsed(), "backend replied");

        match parse_response(&reply) {
            Some(result) => SummaryOutcome::Generated(result),
            None => {
                tracing::debug!(reply = %reply, "unparseable backend reply");
                SummaryOutcome::Fallback(SummaryResult::fallback(title), Degraded::Unparseable)
            }
        }
    }
}

pub fn build_prompt(body: &str, title: &str) -> String {
    let content: String = body.chars().take(MAX_PROMPT_CHARS).collect();
    format!(
        r#"Analyze this article and provide:
1. A concise 2-3 sentence summary
2. 3-5 relevant tags (single words, camelCase if needed)

Title: {title}
Content: {content}

Examples of good tags: ["AI", "Technology", "Security", "GoogleCloud", "OpenSource"]
Examples of bad tags: ["Machine Learning", "Cloud Computing", "Web Development"]

Respond ONLY with valid JSON in this exact format (no markdown, no code blocks):
{{"summary": "...", "tags": ["tag1", "tag2"]}}"#
    )
}

/// Decode a model reply into a validated [`SummaryResult`].
pub fn parse_response(reply: &str) -> Option<SummaryResult> {
    let cleaned = strip_code_fence(reply);
    let value = first_json_object(cleaned)?;

    let summary = value.get("summary")?.as_str()?.trim();
    if summary.is_empty() {
        return None;
    }

    let tags: Vec<String> = value
        .get("tags")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .take(MAX_TAGS)
        .map(str::to_string)
        .collect();
    if tags.is_empty() {
        return None;
    }

    Some(SummaryResult {
        summary: summary.to_string(),
        tags,
    })
}

fn strip_code_fence(reply: &str) -> &str {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c == ' ' || c == '\t');
        text = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Decode the first balanced `{...}` that is valid JSON. A brace that never
/// closes, or a candidate that fails to decode, moves the scan to the next `{`.
fn first_json_object(text: &str) -> Option<Value> {
    text.match_indices('{')
        .filter_map(|(start, _)| balanced_object_at(text, start))
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
}

/// Substring opening at `start` and closing on its matching `}`, ignoring
/// braces inside JSON strings.
fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
