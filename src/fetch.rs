use async_trait::async_trait;
use reqwest::{header, redirect, Client, StatusCode};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use url::{Host, Url};

use crate::safety::{check_resolved, validate_url, UrlRejection};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REDIRECTS: usize = 5;
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Blocked(#[from] UrlRejection),

    #[error("HTTP error: {0}")]
    Status(StatusCode),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),

    #[error("Network error: {0}")]
    Network(String),
}

/// Issues the single outbound GET for a page that already passed
/// [`validate_url`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Production fetcher. Every hop is resolved once, validated, and the
/// connection is pinned to the validated address.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
    user_agent: String,
    allow_loopback: bool,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            user_agent: BROWSER_USER_AGENT.to_string(),
            allow_loopback: false,
        }
    }

    /// Lets redirect hops land on loopback so a local mock server can serve
    /// the whole chain. Every other rejection still applies.
    #[cfg(test)]
    pub(crate) fn with_loopback_allowed(mut self) -> Self {
        self.allow_loopback = true;
        self
    }

    fn validate_hop(&self, next: Url) -> Result<Url, UrlRejection> {
        match validate_url(next.as_str()) {
            Err(UrlRejection::Loopback) if self.allow_loopback => Ok(next),
            other => other,
        }
    }

    async fn resolve_pinned(&self, url: &Url) -> Result<Option<(String, SocketAddr)>, FetchError> {
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            // IP literals were classified by validate_url; nothing to resolve.
            Some(_) => return Ok(None),
            None => return Err(UrlRejection::MissingHost.into()),
        };
        let port = url.port_or_known_default().unwrap_or(443);

        let addrs = lookup_host((host.as_str(), port))
            .await
            .map_err(|e| FetchError::Network(format!("DNS lookup failed for '{}': {}", host, e)))?;
        let pinned = check_resolved(&host, addrs)?;

        Ok(Some((host, pinned)))
    }

    fn client_for(&self, pinned: Option<(String, SocketAddr)>) -> Result<Client, FetchError> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .redirect(redirect::Policy::none())
            .no_proxy()
            .user_agent(self.user_agent.as_str());
        if let Some((host, addr)) = pinned {
            builder = builder.resolve(&host, addr);
        }
        builder
            .build()
            .map_err(|e| FetchError::Network(format!("HTTP client error: {}", e)))
    }

    fn map_send_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let mut current = url.clone();

        for hop in 0..=MAX_REDIRECTS {
            let pinned = self.resolve_pinned(&current).await?;
            let client = self.client_for(pinned)?;

            tracing::debug!(url = %current, hop, "fetching page");
            let response = client
                .get(current.clone())
                .header(header::ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
                .send()
                .await
                .map_err(|e| self.map_send_error(e))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(FetchError::Status(status))?;
                let next = current
                    .join(location)
                    .map_err(|e| UrlRejection::Malformed(e.to_string()))?;
                current = self.validate_hop(next)?;
                tracing::debug!(to = %current, "following redirect");
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status(status));
            }

            return read_body_limited(response, MAX_BODY_BYTES)
                .await
                .map_err(|e| self.map_send_error(e));
        }

        Err(FetchError::TooManyRedirects(MAX_REDIRECTS))
    }
}

async fn read_body_limited(
    mut response: reqwest::Response,
    max_bytes: usize,
) -> Result<String, reqwest::Error> {
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = response.chunk().await? {
        let remaining = max_bytes.saturating_sub(buf.len());
        let take = chunk.len().min(remaining);
        buf.extend_from_slice(&chunk[..take]);
        if buf.len() >= max_bytes {
            tracing::debug!(max_bytes, "response body truncated");
            break;
        }
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    // Both values contain commas, which the stock header matcher splits on.
    fn header_is(req: &Request, name: &str, expected: &str) -> bool {
        req.headers.get(name).and_then(|v| v.to_str().ok()) == Some(expected)
    }

    #[tokio::test]
    async fn refuses_loopback_server_without_sending_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(0)
            .mount(&server)
            .await;

        // Bypass validate_url to prove the fetcher refuses on its own when the
        // name resolves to loopback.
        let port = server.address().port();
        let url = Url::parse(&format!("http://localhost:{}/page", port)).unwrap();
        let err = HttpFetcher::default().fetch(&url).await.unwrap_err();

        assert!(
            matches!(err, FetchError::Blocked(UrlRejection::ResolvedToReserved { .. })),
            "got {err:?}"
        );
        server.verify().await;
    }

    fn local_fetcher() -> HttpFetcher {
        HttpFetcher::default().with_loopback_allowed()
    }

    fn local_url(server: &MockServer, path: &str) -> Url {
        Url::parse(&format!("http://127.0.0.1:{}{}", server.address().port(), path)).unwrap()
    }

    #[tokio::test]
    async fn redirect_into_private_network_is_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "http://10.0.0.1/"))
            .expect(1)
            .mount(&server)
            .await;

        let err = local_fetcher()
            .fetch(&local_url(&server, "/start"))
            .await
            .unwrap_err();

        assert!(
            matches!(err, FetchError::Blocked(UrlRejection::ReservedAddress(_))),
            "got {err:?}"
        );
        server.verify().await;
    }

    #[tokio::test]
    async fn redirect_chain_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
            .expect(MAX_REDIRECTS as u64 + 1)
            .mount(&server)
            .await;

        let err = local_fetcher()
            .fetch(&local_url(&server, "/loop"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TooManyRedirects(MAX_REDIRECTS)), "got {err:?}");
        server.verify().await;
    }

    #[tokio::test]
    async fn follows_redirect_to_final_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>moved</p>"))
            .mount(&server)
            .await;

        let body = local_fetcher().fetch(&local_url(&server, "/old")).await.unwrap();
        assert_eq!(body, "<p>moved</p>");
    }

    #[tokio::test]
    async fn oversized_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(MAX_BODY_BYTES + 1024)))
            .mount(&server)
            .await;

        let body = local_fetcher().fetch(&local_url(&server, "/big")).await.unwrap();
        assert_eq!(body.len(), MAX_BODY_BYTES);
    }

    #[tokio::test]
    async fn sends_browser_user_agent_and_html_accept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(|req: &Request| header_is(req, "user-agent", BROWSER_USER_AGENT))
            .and(|req: &Request| header_is(req, "accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let body = local_fetcher().fetch(&local_url(&server, "/")).await.unwrap();
        assert_eq!(body, "ok");
        server.verify().await;
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = local_fetcher()
            .fetch(&local_url(&server, "/missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(StatusCode::NOT_FOUND)), "got {err:?}");
    }

    #[tokio::test]
    async fn ip_literal_skips_resolution() {
        let url = Url::parse("https://93.184.216.34/").unwrap();
        let pinned = HttpFetcher::default().resolve_pinned(&url).await.unwrap();
        assert!(pinned.is_none());
    }
}
