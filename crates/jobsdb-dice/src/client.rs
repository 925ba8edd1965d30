//! HTTP client for the Dice job-search API.
//!
//! One call to [`DiceClient::fetch_page`] is one GET and one envelope decode.
//! Retries and pagination live in [`crate::walker`].

use std::time::Duration;

use jobsdb_core::SourceQuery;
use reqwest::{Client, Url};

use crate::error::FetchError;
use crate::types::Envelope;

pub struct DiceClient {
    client: Client,
    base_url: Url,
}

impl DiceClient {
    /// Creates a client for the search endpoint at `base_url`
    /// (e.g. `http://service.dice.com/api/rest/jobsearch/v1/simple.json`, or a
    /// wiremock server URI in tests).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`FetchError::InvalidUrl`] if `base_url` does
    /// not parse.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let base_url = Url::parse(base_url).map_err(|e| FetchError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self { client, base_url })
    }

    /// Builds `<base>?text=<text>&city=<city>` with percent-encoded values.
    #[must_use]
    pub fn first_page_url(&self, query: &SourceQuery) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("text", &query.text)
            .append_pair("city", &query.city);
        url
    }

    /// Resolves a `nextUrl` from an envelope against the base URL.
    ///
    /// Dice returns a path relative to the service origin; absolute URLs are
    /// accepted unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if the value cannot be joined.
    pub fn resolve(&self, next_url: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(next_url)
            .map_err(|e| FetchError::InvalidUrl {
                url: next_url.to_owned(),
                reason: e.to_string(),
            })
    }

    /// Performs one GET against `url` and decodes the page envelope.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Transport`] on network failure.
    /// - [`FetchError::HttpStatus`] on any non-2xx status.
    /// - [`FetchError::Decode`] if the body is not a valid envelope.
    pub async fn fetch_page(&self, url: &Url) -> Result<Envelope, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str::<Envelope>(&body).map_err(|e| FetchError::Decode {
            context: url.to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
