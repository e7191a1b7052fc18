//! Collection strategies. Which one runs depends on whether the place has
//! been collected before and whether the listing could be sorted.

pub mod cold;
pub mod warm;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::CollectionConfig;
use crate::error::Result;
use crate::identity::ExistingIdentitySet;
use crate::review::Review;
use crate::surface::ReviewSurface;

pub use cold::collect_cold;
pub use warm::{collect_warm, WarmStop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionPath {
    /// First encounter: reveal everything, extract once.
    Cold,
    /// Repeat encounter on a newest-first listing: stop at the first known review.
    Warm,
    /// Repeat encounter without a guaranteed order: reveal everything and filter.
    Unsorted,
}

impl std::fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionPath::Cold => write!(f, "cold"),
            CollectionPath::Warm => write!(f, "warm"),
            CollectionPath::Unsorted => write!(f, "unsorted"),
        }
    }
}

/// Reviews gathered by one strategy.
#[derive(Debug)]
pub struct Collected {
    pub path: CollectionPath,
    pub reviews: Vec<Review>,
    pub reveal_steps: usize,
}

/// Reveal until the size metric holds still for `stability_threshold`
/// consecutive checks (or the step cap is hit). Returns steps taken.
pub(crate) async fn reveal_until_stable(
    surface: &dyn ReviewSurface,
    opts: &CollectionConfig,
) -> Result<usize> {
    let threshold = opts.stability_threshold.max(1);
    let mut last_size = surface.measure().await?;
    let mut unchanged = 0;
    let mut steps = 0;

    loop {
        surface.reveal_step().await?;
        surface.expand_truncated().await?;
        steps += 1;

        let size = surface.measure().await?;
        if size == last_size {
            unchanged += 1;
            if unchanged >= threshold {
                info!(steps, size, "Listing fully revealed");
                return Ok(steps);
            }
        } else {
            unchanged = 0;
        }
        last_size = size;

        if steps >= opts.max_reveal_steps {
            warn!(steps, size, "Reveal step cap reached, extracting what is loaded");
            return Ok(steps);
        }
    }
}

/// Repeat encounter where newest-first ordering could not be established.
/// Reveals everything, then keeps only reviews not already known.
pub async fn collect_unordered(
    surface: &dyn ReviewSurface,
    identities: &mut ExistingIdentitySet,
    opts: &CollectionConfig,
) -> Result<Collected> {
    let reveal_steps = reveal_until_stable(surface, opts).await?;
    let batch = surface.extract_visible(0).await?;
    let total = batch.reviews.len();
    let reviews: Vec<Review> = batch
        .reviews
        .into_iter()
        .filter(|r| identities.observe(r))
        .collect();

    info!(total, new = reviews.len(), "Filtered unordered listing");
    Ok(Collected {
        path: CollectionPath::Unsorted,
        reviews,
        reveal_steps,
    })
}
