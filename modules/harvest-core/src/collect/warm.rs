// Repeat-encounter collection: interleave reveal and extraction, stop at
// the first review that is already known.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Collected, CollectionPath};
use crate::config::CollectionConfig;
use crate::error::Result;
use crate::fingerprint;
use crate::identity::ExistingIdentitySet;
use crate::surface::{NewestFirst, ReviewSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmStop {
    /// Reached a review collected by an earlier run.
    KnownReview,
    /// Size stopped changing before any known review appeared.
    Exhausted,
    /// Hit the reveal step cap.
    StepLimit,
}

/// Because the listing is newest-first, everything after the first known
/// review was collected by an earlier run, so the pass stops there.
///
/// Each pass only examines reviews rendered since the previous pass; the
/// ones before were already examined (and recorded) in this run.
pub async fn collect_warm(
    surface: &dyn ReviewSurface,
    identities: &mut ExistingIdentitySet,
    _order: NewestFirst,
    opts: &CollectionConfig,
) -> Result<(Collected, WarmStop)> {
    let mut fresh = Vec::new();
    let mut examined = 0;
    let mut steps = 0;
    let mut last_size = surface.measure().await?;

    let stop = loop {
        surface.reveal_step().await?;
        surface.expand_truncated().await?;
        steps += 1;

        let batch = surface.extract_visible(examined).await?;
        examined = examined.max(batch.seen);

        let mut hit_known = false;
        for review in batch.reviews {
            let fp = fingerprint::generate(&review);
            if !identities.insert(fp) {
                debug!(fingerprint = %fp, "Known review reached");
                hit_known = true;
                break;
            }
            fresh.push(review);
        }
        if hit_known {
            break WarmStop::KnownReview;
        }

        let size = surface.measure().await?;
        if size == last_size {
            break WarmStop::Exhausted;
        }
        last_size = size;

        if steps >= opts.max_reveal_steps {
            warn!(steps, "Reveal step cap reached before a known review");
            break WarmStop::StepLimit;
        }
    };

    info!(new = fresh.len(), reveal_steps = steps, stop = ?stop, "Warm collection complete");
    Ok((
        Collected {
            path: CollectionPath::Warm,
            reviews: fresh,
            reveal_steps: steps,
        },
        stop,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::Review;
    use crate::testing::{review, SimulatedListing};

    fn newest_first(names: &[&str]) -> Vec<Review> {
        names.iter().map(|n| review(n)).collect()
    }

    async fn run(
        listing: &SimulatedListing,
        identities: &mut ExistingIdentitySet,
    ) -> (Collected, WarmStop) {
        collect_warm(
            listing,
            identities,
            NewestFirst::inherent(),
            &CollectionConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn returns_only_reviews_newer_than_snapshot() {
        let live = newest_first(&["E", "D", "C", "B", "A"]);
        let mut identities = ExistingIdentitySet::from_reviews(&live[1..]);
        let listing = SimulatedListing::new(live.clone());

        let (out, stop) = run(&listing, &mut identities).await;
        assert_eq!(out.reviews, vec![live[0].clone()]);
        assert_eq!(stop, WarmStop::KnownReview);
        assert_eq!(listing.reveal_steps(), 1);
    }

    #[tokio::test]
    async fn early_stop_is_exact_across_pages() {
        // k = 13: positions 1..=12 new, 13 known. With 5 per page the 13th
        // review is first rendered by the second reveal step.
        let live: Vec<_> = (0..40).map(|i| review(&format!("R{i}"))).collect();
        let mut identities = ExistingIdentitySet::from_reviews(&live[12..]);
        let listing = SimulatedListing::new(live.clone()).page_size(5);

        let (out, stop) = run(&listing, &mut identities).await;
        assert_eq!(stop, WarmStop::KnownReview);
        assert_eq!(out.reviews, live[..12].to_vec());
        assert_eq!(listing.reveal_steps(), 2);
        assert_eq!(out.reveal_steps, 2);
    }

    #[tokio::test]
    async fn rerun_on_unchanged_source_finds_nothing() {
        let live = newest_first(&["C", "B", "A"]);
        let mut identities = ExistingIdentitySet::from_reviews(&live);
        let listing = SimulatedListing::new(live);

        let (out, stop) = run(&listing, &mut identities).await;
        assert!(out.reviews.is_empty());
        assert_eq!(stop, WarmStop::KnownReview);
    }

    #[tokio::test]
    async fn reviews_from_earlier_passes_are_not_mistaken_for_known() {
        // Nothing known is on the page; the listing is re-read each step.
        let live: Vec<_> = (0..12).map(|i| review(&format!("N{i}"))).collect();
        let mut identities = ExistingIdentitySet::from_reviews([&review("old")]);
        let listing = SimulatedListing::new(live.clone()).page_size(4);

        let (out, stop) = run(&listing, &mut identities).await;
        assert_eq!(stop, WarmStop::Exhausted);
        assert_eq!(out.reviews, live);
    }

    #[tokio::test]
    async fn duplicate_within_pass_stops() {
        let live = newest_first(&["C", "B", "C", "A"]);
        let mut identities = ExistingIdentitySet::from_reviews([&review("A")]);
        let listing = SimulatedListing::new(live);

        let (out, _) = run(&listing, &mut identities).await;
        let names: Vec<_> = out.reviews.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B"]);
    }

    #[tokio::test]
    async fn step_cap_applies() {
        let listing = SimulatedListing::endless();
        let mut identities = ExistingIdentitySet::from_reviews([&review("never shown")]);
        let opts = CollectionConfig {
            stability_threshold: 3,
            max_reveal_steps: 4,
        };
        let (_, stop) = collect_warm(&listing, &mut identities, NewestFirst::inherent(), &opts)
            .await
            .unwrap();
        assert_eq!(stop, WarmStop::StepLimit);
        assert_eq!(listing.reveal_steps(), 4);
    }
}
