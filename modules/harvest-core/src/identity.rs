use std::collections::HashSet;

use crate::fingerprint::{self, Fingerprint};
use crate::review::Review;

/// Fingerprints known to this run: everything in the persisted snapshot
/// plus everything examined so far. Only grows; rebuilt from storage on
/// the next run.
#[derive(Debug, Default, Clone)]
pub struct ExistingIdentitySet {
    seen: HashSet<Fingerprint>,
}

impl ExistingIdentitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_reviews<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Self {
        Self {
            seen: reviews.into_iter().map(fingerprint::generate).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.seen.contains(fp)
    }

    /// Record a fingerprint. Returns `true` if it was not known before.
    pub fn insert(&mut self, fp: Fingerprint) -> bool {
        self.seen.insert(fp)
    }

    /// Fingerprint `review` and record it. Returns `true` if the review is new.
    pub fn observe(&mut self, review: &Review) -> bool {
        self.insert(fingerprint::generate(review))
    }
}
