//! Fetcher adapter: wraps the remote API and classifies every response.
//!
//! - [`http`] - reqwest-backed [`HttpFetcher`] for the tag and artwork endpoints
//!
//! Classification is the only contract the scheduler relies on:
//! HTTP 429 is [`FetchOutcome::RateLimited`] whatever the body says, any other
//! non-2xx status or an application-level error body is
//! [`FetchOutcome::ItemError`], and a well-formed 2xx body is
//! [`FetchOutcome::Success`].

mod http;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use http::HttpFetcher;

use crate::types::{ArtworkMetadata, ItemKey, ItemKind, Payload, TagMetadata};
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Classified result of fetching one item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Well-formed response with the extracted payload
    Success(Payload),
    /// Server-side rate limit (HTTP 429)
    RateLimited,
    /// Terminal per-item failure
    ItemError(String),
    /// Aborted through the shared cancellation token
    Cancelled,
}

/// Network capability used by the scheduler.
///
/// Implementations must return promptly with [`FetchOutcome::Cancelled`]
/// once `cancel` fires.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch and classify one item
    async fn fetch(&self, key: &ItemKey, cancel: &CancellationToken) -> FetchOutcome;
}

/// Classify a raw HTTP response for `key`.
pub fn classify_response(
    kind: ItemKind,
    key: &ItemKey,
    status: u16,
    body: &str,
    language: &str,
) -> FetchOutcome {
    if status == 429 {
        return FetchOutcome::RateLimited;
    }
    if !(200..300).contains(&status) {
        return FetchOutcome::ItemError(format!("HTTP {status}"));
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => return FetchOutcome::ItemError(format!("invalid response body: {e}")),
    };

    if value.get("error").and_then(Value::as_bool) == Some(true) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("API reported an error");
        return FetchOutcome::ItemError(message.to_string());
    }

    let Some(body) = value.get("body").filter(|b| b.is_object()) else {
        return FetchOutcome::ItemError("response is missing a body object".to_string());
    };

    let payload = match kind {
        ItemKind::Tag => Payload::Tag(parse_tag(key, body, language)),
        ItemKind::Artwork => Payload::Artwork(parse_artwork(body)),
    };
    FetchOutcome::Success(payload)
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_tag(key: &ItemKey, body: &Value, language: &str) -> TagMetadata {
    // tagTranslation is `[]` rather than `{}` when the tag has none
    let translation = body
        .get("tagTranslation")
        .and_then(|t| t.get(key.as_str()))
        .and_then(|t| t.get(language));
    let pixpedia = body.get("pixpedia");

    TagMetadata {
        translation: non_empty(translation),
        abstract_text: non_empty(pixpedia.and_then(|p| p.get("abstract"))),
        image: non_empty(pixpedia.and_then(|p| p.get("image"))),
    }
}

fn parse_artwork(body: &Value) -> ArtworkMetadata {
    let tags = body
        .get("tags")
        .and_then(|t| t.get("tags"))
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| non_empty(t.get("tag")))
                .collect()
        })
        .unwrap_or_default();

    ArtworkMetadata {
        title: non_empty(body.get("title")),
        artist: non_empty(body.get("userName")),
        tags,
        image_url: non_empty(body.get("urls").and_then(|u| u.get("original"))),
    }
}
