use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use log::debug;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use thiserror::Error;

use crate::models::{PageToken, ResultPage, SearchResponse};

const SEARCH_URL: &str = "https://api.github.com/search/users";
const PAGE_SIZE: u32 = 30;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a page fetch failed. Callers abort the fetch and keep prior
/// state on any of these.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network failure talking to the search API")]
    Network(#[source] reqwest::Error),
    #[error("malformed search response")]
    Decode(#[source] reqwest::Error),
    #[error("search API quota exhausted")]
    RateLimited,
}

/// A source of search result pages.
pub trait SearchClient {
    /// Fetches one page of users matching `query`. `page` absent means
    /// the first page. An empty query resolves to an empty page with no
    /// continuation and must not touch the network.
    fn fetch_page(
        &self,
        query: &str,
        page: Option<&PageToken>,
    ) -> impl Future<Output = Result<ResultPage, FetchError>>;
}

/// GitHub-backed search client. Cheap to clone; all clones share one
/// connection pool.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
}

impl GithubClient {
    /// Creates a client preconfigured with the headers GitHub expects.
    /// A token raises the authenticated quota; searches work without one.
    pub fn new(token: Option<&str>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("github-user-search"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        if let Some(token) = token {
            let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("Invalid token value")?;
            auth.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, auth);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }
}

impl SearchClient for GithubClient {
    async fn fetch_page(
        &self,
        query: &str,
        page: Option<&PageToken>,
    ) -> Result<ResultPage, FetchError> {
        // Cleared search: nothing to fetch.
        if query.is_empty() {
            return Ok(ResultPage::default());
        }

        let url = match page {
            Some(token) => token.as_str().to_string(),
            None => format!(
                "{SEARCH_URL}?q={}&per_page={PAGE_SIZE}",
                percent_encode(query)
            ),
        };
        debug!("GET {url}");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(FetchError::Network)?;

        if is_rate_limited(&response) {
            return Err(FetchError::RateLimited);
        }
        let response = response.error_for_status().map_err(FetchError::Network)?;

        // The continuation lives in the Link header, not the body.
        let next_page = next_page_token(response.headers());
        let body: SearchResponse = response.json().await.map_err(FetchError::Decode)?;

        Ok(ResultPage {
            users: body.items,
            next_page,
        })
    }
}

/// GitHub signals quota exhaustion as 429, or as 403 once the
/// rate-limit allowance hits zero.
fn is_rate_limited(response: &reqwest::Response) -> bool {
    match response.status() {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::FORBIDDEN => response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "0"),
        _ => false,
    }
}

/// Pulls the `rel="next"` URL out of an RFC 5988 `Link` header, if any.
fn next_page_token(headers: &HeaderMap) -> Option<PageToken> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        let url = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(PageToken::new(url))
    })
}

/// Percent-encoding for the query parameter.
fn percent_encode(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' => "+".to_string(),
            c if c.is_ascii_alphanumeric() || "-._~".contains(c) => c.to_string(),
            c => {
                let mut buf = [0u8; 4];
                c.encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{b:02X}"))
                    .collect()
            }
        })
        .collect()
}
