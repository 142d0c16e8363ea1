use serde::Deserialize;

/// A single user from the search results.
///
/// Immutable once decoded; `login`/`id` identify the user. Profile
/// fields GitHub may omit decode to `None` instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub login: String,
    pub id: u64,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

/// Response body from the GitHub Search Users API (`/search/users`).
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub items: Vec<User>,
}

/// Opaque continuation token for the next page of a search.
///
/// Produced by the client from the API's pagination metadata and
/// handed back verbatim to fetch the following page. Callers only
/// test for its presence; absence means the results are exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken(String);

impl PageToken {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

/// One decoded page of search results.
#[derive(Debug, Clone, Default)]
pub struct ResultPage {
    pub users: Vec<User>,
    pub next_page: Option<PageToken>,
}
