// Reading the flat snapshot and rebuilding the identity set from it.

use tracing::{info, warn};

use crate::identity::ExistingIdentitySet;
use crate::review::Review;
use crate::store::FlatSink;

/// Every review stored under `key`. Absent, unreadable or malformed
/// content reads as an empty snapshot.
pub async fn read_snapshot(sink: &dyn FlatSink, key: &str) -> Vec<Review> {
    let bytes = match sink.read_all(key).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            warn!(key, "No snapshot found, starting empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(key, error = %e, "Snapshot unreadable, starting empty");
            return Vec::new();
        }
    };

    decode_snapshot(key, &bytes)
}

/// Parse stored snapshot bytes. Malformed content reads as empty.
pub fn decode_snapshot(key: &str, bytes: &[u8]) -> Vec<Review> {
    match serde_json::from_slice::<Vec<Review>>(bytes) {
        Ok(reviews) => reviews,
        Err(e) => {
            warn!(key, error = %e, "Snapshot malformed, starting empty");
            Vec::new()
        }
    }
}

/// Fingerprints of every previously saved review. Empty means this place
/// has never been collected (or its snapshot is unusable) and selects the
/// cold path.
pub async fn load_existing(sink: &dyn FlatSink, key: &str) -> ExistingIdentitySet {
    let reviews = read_snapshot(sink, key).await;
    let set = ExistingIdentitySet::from_reviews(&reviews);
    info!(key, stored = reviews.len(), known = set.len(), "Loaded existing identities");
    set
}
