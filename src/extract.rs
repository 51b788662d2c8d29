use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::sync::Arc;

use crate::fetch::{FetchError, PageFetcher};
use crate::safety::{validate_url, UrlRejection};

pub const MAX_BODY_CHARS: usize = 5000;

static NOISE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script, style, nav, header, footer, aside").expect("Failed to parse noise selector")
});
static ARTICLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("article").expect("Failed to parse article selector")
});
static MAIN_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("main").expect("Failed to parse main selector")
});
static BLOCK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div, section").expect("Failed to parse block selector")
});
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to parse body selector")
});
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("title").expect("Failed to parse title selector")
});
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a").expect("Failed to parse link selector")
});

/// Outcome of [`Extractor::extract`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub title: String,
    pub body: String,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

impl ExtractionResult {
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            body: String::new(),
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

impl From<Article> for ExtractionResult {
    fn from(article: Article) -> Self {
        Self {
            title: article.title,
            body: article.body,
            succeeded: true,
            error_detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Rejected(#[from] UrlRejection),

    #[error("Failed to fetch page: {0}")]
    Fetch(FetchError),
}

impl From<FetchError> for ExtractError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Blocked(rejection) => ExtractError::Rejected(rejection),
            other => ExtractError::Fetch(other),
        }
    }
}

/// Scores `<div>`/`<section>` candidates when a page has no semantic
/// `<article>` or `<main>`. Higher wins; ties go to the earlier element.
pub trait ContentScorer: Send + Sync {
    fn score(&self, element: ElementRef<'_>) -> f64;
}

/// Plain content density: the length of the element's stripped text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLengthScorer;

impl ContentScorer for TextLengthScorer {
    fn score(&self, element: ElementRef<'_>) -> f64 {
        stripped_text_len(element) as f64
    }
}

/// Text length discounted by the share of it that sits inside links, so
/// navigation-heavy blocks lose to prose.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkDensityScorer;

impl ContentScorer for LinkDensityScorer {
    fn score(&self, element: ElementRef<'_>) -> f64 {
        let total = stripped_text_len(element);
        if total == 0 {
            return 0.0;
        }
        let linked: usize = element.select(&LINK_SELECTOR).map(stripped_text_len).sum();
        let density = linked.min(total) as f64 / total as f64;
        total as f64 * (1.0 - density)
    }
}

fn stripped_text_len(element: ElementRef<'_>) -> usize {
    element.text().map(|t| t.trim().chars().count()).sum()
}

fn visible_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn remove_noise(document: &mut Html) {
    let noise: Vec<_> = document.select(&NOISE_SELECTOR).map(|el| el.id()).collect();
    for id in noise {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn select_main<'a>(document: &'a Html, scorer: &dyn ContentScorer) -> Option<ElementRef<'a>> {
    if let Some(article) = document.select(&ARTICLE_SELECTOR).next() {
        return Some(article);
    }
    if let Some(main) = document.select(&MAIN_SELECTOR).next() {
        return Some(main);
    }

    let mut best: Option<(ElementRef<'a>, f64)> = None;
    for candidate in document.select(&BLOCK_SELECTOR) {
        let score = scorer.score(candidate);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((candidate, score)),
        }
    }

    best.map(|(el, _)| el)
        .or_else(|| document.select(&BODY_SELECTOR).next())
}

fn extract_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|raw| raw.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|title| !title.is_empty())
}

/// Derive the title and the bounded main-content text of an HTML page.
pub fn extract_article(html: &str, source_url: &str, scorer: &dyn ContentScorer) -> Article {
    let mut document = Html::parse_document(html);
    remove_noise(&mut document);

    let title = extract_title(&document).unwrap_or_else(|| source_url.to_string());
    let body = select_main(&document, scorer)
        .map(visible_text)
        .map(|text| truncate_chars(&text, MAX_BODY_CHARS))
        .unwrap_or_default();

    Article { title, body }
}

/// Validates, fetches and extracts a single page.
#[derive(Clone)]
pub struct Extractor {
    fetcher: Arc<dyn PageFetcher>,
    scorer: Arc<dyn ContentScorer>,
}

impl Extractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            scorer: Arc::new(TextLengthScorer),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn ContentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub async fn try_extract(&self, url: &str) -> Result<Article, ExtractError> {
        let parsed = validate_url(url)?;
        let html = self.fetcher.fetch(&parsed).await?;
        Ok(extract_article(&html, url, self.scorer.as_ref()))
    }

    pub async fn extract(&self, url: &str) -> ExtractionResult {
        match self.try_extract(url).await {
            Ok(article) => article.into(),
            Err(e) => {
                tracing::info!(url, error = %e, "extraction failed");
                ExtractionResult::failed(e.to_string())
            }
        }
    }
}
