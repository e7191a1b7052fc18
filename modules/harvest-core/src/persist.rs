// Persistence adapter: fan new reviews out to both sinks independently.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::place::PlaceId;
use crate::review::Review;
use crate::snapshot::decode_snapshot;
use crate::store::{FlatSink, StructuredSink};

/// What happened to one sink during a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SinkOutcome {
    Written { records: usize },
    Skipped,
    Failed { error: String },
}

impl SinkOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SinkOutcome::Failed { .. })
    }
}

impl fmt::Display for SinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkOutcome::Written { records } => write!(f, "wrote {records}"),
            SinkOutcome::Skipped => write!(f, "skipped"),
            SinkOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub snapshot: SinkOutcome,
    pub database: SinkOutcome,
}

impl CommitReport {
    fn skipped() -> Self {
        Self {
            snapshot: SinkOutcome::Skipped,
            database: SinkOutcome::Skipped,
        }
    }

    /// Human-readable warnings for failed sinks.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let SinkOutcome::Failed { error } = &self.snapshot {
            out.push(format!("snapshot write failed: {error}"));
        }
        if let SinkOutcome::Failed { error } = &self.database {
            out.push(format!("database write failed: {error}"));
        }
        out
    }
}

pub struct Persistence {
    flat: Arc<dyn FlatSink>,
    structured: Option<Arc<dyn StructuredSink>>,
}

impl Persistence {
    pub fn new(flat: Arc<dyn FlatSink>, structured: Option<Arc<dyn StructuredSink>>) -> Self {
        Self { flat, structured }
    }

    pub fn flat(&self) -> &dyn FlatSink {
        self.flat.as_ref()
    }

    /// Append `records` to both sinks. Neither sink's failure stops the
    /// other; failures are reported, never returned as errors.
    pub async fn commit(&self, records: &[Review], place: &PlaceId) -> CommitReport {
        if records.is_empty() {
            info!(place = %place, "No new reviews to save");
            return CommitReport::skipped();
        }

        let snapshot = match self.append_snapshot(records, place).await {
            Ok(total) => {
                info!(place = %place, new = records.len(), total, "Snapshot updated");
                SinkOutcome::Written {
                    records: records.len(),
                }
            }
            Err(e) => {
                warn!(place = %place, error = %e, "Snapshot write failed");
                SinkOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let database = match &self.structured {
            None => SinkOutcome::Skipped,
            Some(sink) => match append_rows(sink.as_ref(), records, place).await {
                Ok(written) => {
                    info!(place = %place, rows = written, "Rows inserted");
                    SinkOutcome::Written {
                        records: written as usize,
                    }
                }
                Err(e) => {
                    warn!(place = %place, error = %e, "Database write failed");
                    SinkOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            },
        };

        CommitReport { snapshot, database }
    }

    /// Read-modify-write of the whole snapshot. Not atomic: concurrent runs
    /// on one place can drop each other's records.
    ///
    /// Absent or malformed content is replaced, but a failed read aborts the
    /// write: the existing history may still be there.
    async fn append_snapshot(&self, records: &[Review], place: &PlaceId) -> Result<usize> {
        let mut all = match self.flat.read_all(place.as_str()).await? {
            Some(bytes) => decode_snapshot(place.as_str(), &bytes),
            None => Vec::new(),
        };
        all.extend_from_slice(records);
        let bytes = serde_json::to_vec_pretty(&all)?;
        self.flat.write_all(place.as_str(), &bytes).await?;
        Ok(all.len())
    }
}

async fn append_rows(sink: &dyn StructuredSink, records: &[Review], place: &PlaceId) -> Result<u64> {
    sink.ensure_container(place).await?;
    sink.append_rows(place, records).await
}
