//! Core types and events

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifier of one unit of work: a tag name or a numeric artwork id.
///
/// Comparison is exact string equality; no normalization is applied.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(pub String);

impl ItemKey {
    /// Create a new item key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ItemKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Which remote endpoint family the item keys refer to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Tag names; payload carries translation, abstract and image
    #[default]
    Tag,
    /// Numeric artwork ids; payload carries title, artist, tags and image
    Artwork,
}

/// Metadata extracted for a tag
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMetadata {
    /// Translation in the configured language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    /// Encyclopedia abstract
    #[serde(
        default,
        rename = "abstract",
        skip_serializing_if = "Option::is_none"
    )]
    pub abstract_text: Option<String>,
    /// Representative image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Metadata extracted for an artwork
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkMetadata {
    /// Artwork title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Artist display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Tag names attached to the artwork
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Original image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Successful fetch payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Tag metadata
    Tag(TagMetadata),
    /// Artwork metadata
    Artwork(ArtworkMetadata),
}

impl Payload {
    /// Non-empty `(column, value)` pairs, in a stable column order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        fn push(out: &mut Vec<(&'static str, String)>, column: &'static str, value: &Option<String>) {
            if let Some(v) = value.as_deref().map(str::trim)
                && !v.is_empty()
            {
                out.push((column, v.to_string()));
            }
        }

        let mut out = Vec::new();
        match self {
            Payload::Tag(tag) => {
                push(&mut out, "translation", &tag.translation);
                push(&mut out, "abstract", &tag.abstract_text);
                push(&mut out, "image", &tag.image);
            }
            Payload::Artwork(art) => {
                push(&mut out, "title", &art.title);
                push(&mut out, "artist", &art.artist);
                let tags = art
                    .tags
                    .iter()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                push(&mut out, "tags", &Some(tags));
                push(&mut out, "image_url", &art.image_url);
            }
        }
        out
    }

    /// Remote asset reference, if the payload carries one
    pub fn asset_ref(&self) -> Option<&str> {
        let asset = match self {
            Payload::Tag(tag) => tag.image.as_deref(),
            Payload::Artwork(art) => art.image_url.as_deref(),
        };
        asset.map(str::trim).filter(|a| !a.is_empty())
    }
}

/// Persisted result of processing one item key.
///
/// Presence of a record means the key is committed and will not be fetched
/// again on resume, whatever its status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeRecord {
    /// Item fetched and parsed
    Success {
        /// Extracted metadata
        payload: Payload,
    },
    /// Item failed terminally
    Failure {
        /// Human-readable failure message
        message: String,
    },
}

impl OutcomeRecord {
    /// Status discriminant of this record
    pub fn status(&self) -> OutcomeStatus {
        match self {
            OutcomeRecord::Success { .. } => OutcomeStatus::Success,
            OutcomeRecord::Failure { .. } => OutcomeStatus::Failure,
        }
    }

    /// Failure message, if this is a failure record
    pub fn error_message(&self) -> Option<&str> {
        match self {
            OutcomeRecord::Failure { message } => Some(message),
            OutcomeRecord::Success { .. } => None,
        }
    }

    /// Payload, if this is a success record
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            OutcomeRecord::Success { payload } => Some(payload),
            OutcomeRecord::Failure { .. } => None,
        }
    }
}

/// Outcome status discriminant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Success record
    Success,
    /// Failure record
    Failure,
}

/// In-memory run state of a scheduler (never persisted)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No run active
    #[default]
    Idle,
    /// Run loop is executing
    Running,
    /// Run stopped at a batch boundary on request
    Paused,
}

/// How a call to `start`/`resume` ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Pending set became empty
    Completed,
    /// Pause observed between batches
    Paused,
    /// Cancelled; the in-flight batch was not committed
    Cancelled,
}

/// Snapshot returned by `status()`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Current run state
    pub state: RunState,
    /// Keys in the work set
    pub total: usize,
    /// Work set keys with an outcome record
    pub committed: usize,
    /// Committed keys with a success record
    pub successful: usize,
    /// Committed keys with a failure record
    pub failed: usize,
    /// Work set keys without an outcome record
    pub pending: usize,
}

/// Event emitted while a run progresses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run loop started
    Started {
        /// Keys pending when the run started
        pending: usize,
    },

    /// A batch was handed to the fetcher
    BatchDispatched {
        /// Keys in the batch
        keys: Vec<ItemKey>,
    },

    /// A batch contained a rate-limited item and was discarded
    RateLimited {
        /// Size of the discarded batch
        discarded: usize,
        /// Backoff before the batch is retried
        #[serde(with = "crate::config::duration_ms_serde")]
        wait: Duration,
    },

    /// An outcome record was committed
    ItemCommitted {
        /// Committed key
        key: ItemKey,
        /// Committed status
        status: OutcomeStatus,
    },

    /// Run stopped at a batch boundary
    Paused {
        /// Keys still pending
        pending: usize,
    },

    /// Pending set is empty
    Completed {
        /// Keys in the work set
        total: usize,
    },

    /// Run was cancelled
    Cancelled,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_record_json_shape() {
        let record = OutcomeRecord::Success {
            payload: Payload::Tag(TagMetadata {
                translation: Some("cat ears".into()),
                ..Default::default()
            }),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["payload"]["kind"], "tag");
        assert_eq!(json["payload"]["translation"], "cat ears");
        assert!(json["payload"].get("image").is_none());

        let failure: OutcomeRecord =
            serde_json::from_str(r#"{"status":"failure","message":"HTTP 404"}"#).unwrap();
        assert_eq!(failure.status(), OutcomeStatus::Failure);
        assert_eq!(failure.error_message(), Some("HTTP 404"));
    }

    #[test]
    fn test_payload_fields_skip_blank_values() {
        let payload = Payload::Tag(TagMetadata {
            translation: Some("t".into()),
            abstract_text: Some("   ".into()),
            image: None,
        });
        assert_eq!(payload.fields(), vec![("translation", "t".to_string())]);
        assert_eq!(payload.asset_ref(), None);
    }

    #[test]
    fn test_artwork_fields_join_tags() {
        let payload = Payload::Artwork(ArtworkMetadata {
            title: Some("Sunset".into()),
            artist: None,
            tags: vec!["sky".into(), "".into(), "orange".into()],
            image_url: Some("https://i.example.net/1_p0.png".into()),
        });
        let fields = payload.fields();
        assert_eq!(fields[0], ("title", "Sunset".to_string()));
        assert_eq!(fields[1], ("tags", "sky orange".to_string()));
        assert_eq!(payload.asset_ref(), Some("https://i.example.net/1_p0.png"));
    }

    #[test]
    fn test_rate_limited_event_wait_in_millis() {
        let event = Event::RateLimited {
            discarded: 3,
            wait: Duration::from_secs(60),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["wait"], 60_000);

        let back: Event = serde_json::from_value(json).unwrap();
        assert!(matches!(back, Event::RateLimited { discarded: 3, wait } if wait == Duration::from_secs(60)));
    }
}
