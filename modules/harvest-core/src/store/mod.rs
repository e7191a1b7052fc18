//! Storage seams: a flat whole-document sink holding the snapshot, and a
//! structured insert-only sink with one table per place.

pub mod flat;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::place::PlaceId;
use crate::review::Review;

pub use flat::FsFlatSink;
pub use postgres::PgReviewStore;

/// Whole-document storage keyed by place.
#[async_trait]
pub trait FlatSink: Send + Sync {
    /// Full stored content, or `None` if nothing is stored under `key`.
    async fn read_all(&self, key: &str) -> Result<Option<Vec<u8>>>;
    /// Replace the stored content under `key`.
    async fn write_all(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// Append-only row storage, one container per place.
#[async_trait]
pub trait StructuredSink: Send + Sync {
    async fn ensure_container(&self, place: &PlaceId) -> Result<()>;
    /// Insert rows; returns how many were written.
    async fn append_rows(&self, place: &PlaceId, rows: &[Review]) -> Result<u64>;
}
