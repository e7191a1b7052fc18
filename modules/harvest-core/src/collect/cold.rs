// First-encounter collection: reveal the whole list, then extract once.

use tracing::info;

use super::{reveal_until_stable, Collected, CollectionPath};
use crate::config::CollectionConfig;
use crate::error::Result;
use crate::identity::ExistingIdentitySet;
use crate::surface::ReviewSurface;

/// Runs only when nothing is known about the place, so nothing on the page
/// can be a duplicate and the extraction is returned unfiltered. Each
/// review is still recorded in `identities`.
pub async fn collect_cold(
    surface: &dyn ReviewSurface,
    identities: &mut ExistingIdentitySet,
    opts: &CollectionConfig,
) -> Result<Collected> {
    let reveal_steps = reveal_until_stable(surface, opts).await?;
    let batch = surface.extract_visible(0).await?;

    for review in &batch.reviews {
        identities.observe(review);
    }

    info!(
        rendered = batch.seen,
        collected = batch.reviews.len(),
        reveal_steps,
        "Cold collection complete"
    );
    Ok(Collected {
        path: CollectionPath::Cold,
        reviews: batch.reviews,
        reveal_steps,
    })
}
