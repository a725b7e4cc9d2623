//! Export of successful outcome records
//!
//! Success records are folded into one of two artifact shapes:
//! - sparse `UPDATE` statements, one per key, setting only non-empty fields
//! - a download manifest pairing each remote asset with a local file name
//!
//! Zero usable records yield [`ExportPayload::Empty`] so callers can skip the
//! artifact entirely. How the artifact reaches the user is the job of an
//! [`ExportSink`].

use crate::config::{ExportConfig, ExportFormat};
use crate::error::{Error, Result};
use crate::progress::ProgressStore;
use crate::types::{ItemKey, OutcomeRecord, Payload};
use crate::work_set::WorkSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Parameterized statement with `?` placeholders
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlStatement {
    /// Statement text
    pub sql: String,
    /// Bound values, in placeholder order
    pub params: Vec<String>,
}

impl SqlStatement {
    /// Inline every parameter as a single-quoted literal.
    pub fn render(&self) -> String {
        let mut params = self.params.iter().peekable();
        let mut out = String::with_capacity(self.sql.len() + 16 * self.params.len());
        for c in self.sql.chars() {
            match (c, params.next_if(|_| c == '?')) {
                ('?', Some(value)) => {
                    out.push('\'');
                    out.push_str(&value.replace('\'', "''"));
                    out.push('\'');
                }
                (c, _) => out.push(c),
            }
        }
        out
    }
}

/// Remote asset paired with the file name it should be saved as
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Remote asset reference
    pub source_ref: String,
    /// Destination file name
    pub destination_name: String,
}

/// Result of folding success records
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportPayload {
    /// No successful record produced any output
    Empty,
    /// One sparse update per key
    Sql(Vec<SqlStatement>),
    /// One entry per distinct asset
    Manifest(Vec<ManifestEntry>),
}

impl ExportPayload {
    /// True for [`ExportPayload::Empty`]
    pub fn is_empty(&self) -> bool {
        matches!(self, ExportPayload::Empty)
    }

    /// Number of statements or manifest entries
    pub fn len(&self) -> usize {
        match self {
            ExportPayload::Empty => 0,
            ExportPayload::Sql(statements) => statements.len(),
            ExportPayload::Manifest(entries) => entries.len(),
        }
    }

    /// Render statements as one transactional script.
    ///
    /// Returns `None` unless this is a SQL payload.
    pub fn to_sql_script(&self) -> Option<String> {
        let ExportPayload::Sql(statements) = self else {
            return None;
        };
        let mut script = String::from("BEGIN;\n");
        for statement in statements {
            script.push_str(&statement.render());
            script.push_str(";\n");
        }
        script.push_str("COMMIT;\n");
        Some(script)
    }
}

/// Read every success record of the job and fold it into a payload.
///
/// Keys are visited in work set order, then any committed keys missing from
/// the work set in sorted order. Fails with a configuration error before
/// reading anything if the table or key column is not a plain identifier.
pub async fn build_export_payload(
    work_set: &WorkSet,
    progress: &ProgressStore,
    config: &ExportConfig,
) -> Result<ExportPayload> {
    config.validate()?;
    let order = work_set.all().await?;
    let mut records = progress.get_all().await?;

    let mut successes: Vec<(ItemKey, Payload)> = Vec::with_capacity(records.len());
    for key in order {
        if let Some(record) = records.remove(&key) {
            push_success(&mut successes, key, record);
        }
    }
    let mut leftover: Vec<_> = records.into_iter().collect();
    leftover.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, record) in leftover {
        push_success(&mut successes, key, record);
    }

    let payload = fold_payloads(&successes, config);
    tracing::info!(
        format = ?config.format,
        successes = successes.len(),
        entries = payload.len(),
        "Export payload built"
    );
    Ok(payload)
}

fn push_success(out: &mut Vec<(ItemKey, Payload)>, key: ItemKey, record: OutcomeRecord) {
    if let OutcomeRecord::Success { payload } = record {
        out.push((key, payload));
    }
}

/// Fold `(key, payload)` pairs into the configured artifact shape
pub fn fold_payloads(successes: &[(ItemKey, Payload)], config: &ExportConfig) -> ExportPayload {
    match config.format {
        ExportFormat::Sql => {
            let statements: Vec<SqlStatement> = successes
                .iter()
                .filter_map(|(key, payload)| update_statement(key, payload, config))
                .collect();
            if statements.is_empty() {
                ExportPayload::Empty
            } else {
                ExportPayload::Sql(statements)
            }
        }
        ExportFormat::Manifest => {
            let mut seen = HashSet::new();
            let mut taken = HashSet::new();
            let entries: Vec<ManifestEntry> = successes
                .iter()
                .filter_map(|(key, payload)| {
                    let source = payload.asset_ref()?;
                    seen.insert(source.to_string()).then(|| ManifestEntry {
                        source_ref: source.to_string(),
                        destination_name: destination_name(key, source, &mut taken),
                    })
                })
                .collect();
            if entries.is_empty() {
                ExportPayload::Empty
            } else {
                ExportPayload::Manifest(entries)
            }
        }
    }
}

fn update_statement(key: &ItemKey, payload: &Payload, config: &ExportConfig) -> Option<SqlStatement> {
    let fields = payload.fields();
    if fields.is_empty() {
        return None;
    }

    let assignments = fields
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut params: Vec<String> = fields.into_iter().map(|(_, value)| value).collect();
    params.push(key.as_str().to_string());

    Some(SqlStatement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = ?",
            config.table, assignments, config.key_column
        ),
        params,
    })
}

/// `<sanitized key>[-N].<extension of the asset path>`, unique within `taken`.
///
/// Names are compared case-insensitively. An empty key falls back to `item`.
fn destination_name(key: &ItemKey, source: &str, taken: &mut HashSet<String>) -> String {
    let mut stem: String = key
        .as_str()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        stem = "item".to_string();
    }

    let path = match url::Url::parse(source) {
        Ok(url) => url.path().to_string(),
        Err(_) => source.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let file = path.rsplit('/').next().unwrap_or_default();
    let ext = file
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    let with_ext = |stem: &str| match ext {
        Some(ext) => format!("{stem}.{}", ext.to_ascii_lowercase()),
        None => stem.to_string(),
    };

    let mut name = with_ext(&stem);
    let mut n = 2;
    while !taken.insert(name.to_lowercase()) {
        name = with_ext(&format!("{stem}-{n}"));
        n += 1;
    }
    name
}

/// Destination that materializes an export payload
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Write `payload`; returns where it was written, or `None` if nothing was.
    async fn write(&self, payload: &ExportPayload) -> Result<Option<PathBuf>>;
}

/// Writes artifacts into a directory, named after the job
#[derive(Clone, Debug)]
pub struct FileSink {
    output_dir: PathBuf,
    job: String,
}

impl FileSink {
    /// Create a sink writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>, job: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            job: job.into(),
        }
    }

    /// Artifact path for `payload`; `None` for an empty payload
    pub fn path_for(&self, payload: &ExportPayload) -> Option<PathBuf> {
        let name = match payload {
            ExportPayload::Empty => return None,
            ExportPayload::Sql(_) => format!("{}.sql", self.job),
            ExportPayload::Manifest(_) => format!("{}.manifest.json", self.job),
        };
        Some(self.output_dir.join(name))
    }
}

#[async_trait]
impl ExportSink for FileSink {
    async fn write(&self, payload: &ExportPayload) -> Result<Option<PathBuf>> {
        let Some(path) = self.path_for(payload) else {
            tracing::info!("Nothing to export");
            return Ok(None);
        };

        let contents = match payload {
            ExportPayload::Sql(_) => payload.to_sql_script().unwrap_or_default(),
            ExportPayload::Manifest(entries) => serde_json::to_string_pretty(entries)?,
            ExportPayload::Empty => return Ok(None),
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create export directory '{}': {}",
                        self.output_dir.display(),
                        e
                    ),
                ))
            })?;
        tokio::fs::write(&path, contents).await?;

        tracing::info!(path = %path.display(), entries = payload.len(), "Export written");
        Ok(Some(path))
    }
}
