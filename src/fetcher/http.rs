//! HTTP fetcher for the tag search and artwork detail endpoints.

use crate::config::FetcherConfig;
use crate::error::{Error, Result};
use crate::types::{ItemKey, ItemKind};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{FetchOutcome, Fetcher, classify_response};

/// [`Fetcher`] backed by a shared `reqwest` client
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
    kind: ItemKind,
    language: String,
}

impl HttpFetcher {
    /// Build the client from configuration
    ///
    /// # Errors
    /// Returns error if the base URL or cookie is invalid, or the client cannot be created
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        // A base without trailing slash would lose its last segment on join
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        if let Some(cookie) = &config.cookie {
            let value = reqwest::header::HeaderValue::from_str(cookie)
                .map_err(|e| Error::config("cookie", format!("invalid cookie header: {e}")))?;
            headers.insert(reqwest::header::COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url,
            kind: config.kind,
            language: config.language.clone(),
        })
    }

    /// Endpoint URL for `key`
    pub fn endpoint(&self, key: &ItemKey) -> Result<Url> {
        let encoded = urlencoding::encode(key.as_str());
        let path = match self.kind {
            ItemKind::Tag => format!("ajax/search/tags/{encoded}"),
            ItemKind::Artwork => format!("ajax/illust/{encoded}"),
        };
        Ok(self.base_url.join(&path)?)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, key: &ItemKey, cancel: &CancellationToken) -> FetchOutcome {
        let url = match self.endpoint(key) {
            Ok(url) => url,
            Err(e) => return FetchOutcome::ItemError(format!("invalid item key: {e}")),
        };

        let request = async {
            let response = self.client.get(url).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        tokio::select! {
            _ = cancel.cancelled() => FetchOutcome::Cancelled,
            result = request => match result {
                Ok((status, body)) => {
                    let outcome = classify_response(self.kind, key, status, &body, &self.language);
                    tracing::debug!(key = %key, status, ?outcome, "Fetched item");
                    outcome
                }
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Request failed");
                    FetchOutcome::ItemError(e.to_string())
                }
            },
        }
    }
}
