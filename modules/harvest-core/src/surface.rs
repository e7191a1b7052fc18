//! The review listing as the collectors see it: something that can reveal
//! more items, report how much content it holds, and hand back the reviews
//! currently rendered.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{SelectorSet, TimingConfig};
use crate::error::{HarvestError, Result};
use crate::review::Review;
use crate::session::{ContentSession, ElementHandle, ScriptArg};

const CLICK_SCRIPT: &str = "arguments[0].click();";
const SCROLL_TO_END_SCRIPT: &str = "arguments[0].scrollTop = arguments[0].scrollHeight;";
const SCROLL_HEIGHT_SCRIPT: &str = "return arguments[0].scrollHeight;";

/// Evidence that the listing is ordered most-recent-first. The warm
/// collector's early stop is only sound under that ordering, so it takes
/// one of these by value.
#[derive(Debug)]
pub struct NewestFirst(());

impl NewestFirst {
    /// For simulated sources that are newest-first without any sort action.
    #[cfg(any(test, feature = "test-support"))]
    pub fn inherent() -> Self {
        NewestFirst(())
    }
}

/// Reviews rendered at extraction time. `seen` counts every rendered item,
/// including skipped ones, so the next pass can resume after them.
#[derive(Debug, Default)]
pub struct VisibleBatch {
    pub seen: usize,
    pub reviews: Vec<Review>,
}

#[async_trait]
pub trait ReviewSurface: Send + Sync {
    /// Load the place page and open its review list.
    async fn open(&self, url: &str) -> Result<()>;

    /// Re-order the list most-recent-first.
    async fn sort_newest_first(&self) -> Result<NewestFirst>;

    /// Expose more of the list and let it settle.
    async fn reveal_step(&self) -> Result<()>;

    /// Expand truncated comments currently rendered.
    async fn expand_truncated(&self) -> Result<()>;

    /// Size metric of the rendered list. Unchanged size means nothing new
    /// was loaded.
    async fn measure(&self) -> Result<u64>;

    /// Extract rendered reviews in display order, skipping the first `skip`.
    async fn extract_visible(&self, skip: usize) -> Result<VisibleBatch>;
}

/// [`ReviewSurface`] driven through a [`ContentSession`] with configurable
/// selectors.
pub struct SessionSurface<'a> {
    session: &'a dyn ContentSession,
    selectors: &'a SelectorSet,
    timing: &'a TimingConfig,
}

impl<'a> SessionSurface<'a> {
    pub fn new(
        session: &'a dyn ContentSession,
        selectors: &'a SelectorSet,
        timing: &'a TimingConfig,
    ) -> Self {
        Self {
            session,
            selectors,
            timing,
        }
    }

    async fn click_control(&self, selector: &str) -> Result<()> {
        let control = self
            .session
            .wait_until_actionable(selector, self.timing.control_timeout())
            .await?;
        self.session
            .run_script(CLICK_SCRIPT, &[ScriptArg::Element(control)])
            .await
            .map_err(|e| HarvestError::Navigation {
                selector: selector.to_string(),
                reason: e.to_string(),
            })?;
        tokio::time::sleep(self.timing.settle_after_click()).await;
        Ok(())
    }

    async fn container(&self) -> Result<ElementHandle> {
        let selector = &self.selectors.scroll_container;
        self.session
            .find_all(selector)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HarvestError::Navigation {
                selector: selector.clone(),
                reason: "scroll container not found".to_string(),
            })
    }

    async fn required_text(&self, review: &ElementHandle, selector: &str) -> Result<String> {
        let el = self
            .session
            .find_within(review, selector)
            .await?
            .ok_or_else(|| HarvestError::Extraction(format!("missing {selector}")))?;
        Ok(self.session.text(&el).await?.trim().to_string())
    }

    async fn extract_one(&self, review: &ElementHandle) -> Result<Review> {
        let s = self.selectors;
        let name = self.required_text(review, &s.author).await?;

        let rating_el = self
            .session
            .find_within(review, &s.rating)
            .await?
            .ok_or_else(|| HarvestError::Extraction(format!("missing {}", s.rating)))?;
        let rating = self
            .session
            .attribute(&rating_el, &s.rating_attribute)
            .await?
            .unwrap_or_default()
            .trim()
            .to_string();

        let time_ago = self.required_text(review, &s.time_ago).await?;

        // Reviews without a comment are normal; any failure here yields "".
        let comment = match self.session.find_within(review, &s.comment).await {
            Ok(Some(el)) => match self.session.text(&el).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    debug!(error = %e, "Comment unreadable, using empty text");
                    String::new()
                }
            },
            Ok(None) => String::new(),
            Err(e) => {
                debug!(error = %e, "Comment lookup failed, using empty text");
                String::new()
            }
        };

        Ok(Review {
            name,
            rating,
            time_ago,
            comment,
        })
    }
}

#[async_trait]
impl ReviewSurface for SessionSurface<'_> {
    async fn open(&self, url: &str) -> Result<()> {
        self.session.navigate(url).await?;
        self.click_control(&self.selectors.reviews_tab).await
    }

    async fn sort_newest_first(&self) -> Result<NewestFirst> {
        self.click_control(&self.selectors.sort_menu).await?;
        self.click_control(&self.selectors.sort_newest).await?;
        Ok(NewestFirst(()))
    }

    async fn reveal_step(&self) -> Result<()> {
        let container = self.container().await?;
        self.session
            .run_script(SCROLL_TO_END_SCRIPT, &[ScriptArg::Element(container)])
            .await?;
        tokio::time::sleep(self.timing.settle_after_reveal()).await;
        Ok(())
    }

    async fn expand_truncated(&self) -> Result<()> {
        let buttons = match self.session.find_all(&self.selectors.expand_comment).await {
            Ok(buttons) => buttons,
            Err(e) => {
                warn!(error = %e, "Could not look up truncated comments");
                return Ok(());
            }
        };

        for button in buttons {
            if !self.session.is_displayed(&button).await.unwrap_or(false) {
                continue;
            }
            if let Err(e) = self
                .session
                .run_script(CLICK_SCRIPT, &[ScriptArg::Element(button)])
                .await
            {
                debug!(error = %e, "Expand click failed");
                continue;
            }
            tokio::time::sleep(self.timing.settle_after_expand()).await;
        }
        Ok(())
    }

    async fn measure(&self) -> Result<u64> {
        let container = self.container().await?;
        let value = self
            .session
            .run_script(SCROLL_HEIGHT_SCRIPT, &[ScriptArg::Element(container)])
            .await?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h as u64))
            .ok_or_else(|| HarvestError::Extraction(format!("scrollHeight not numeric: {value}")))
    }

    async fn extract_visible(&self, skip: usize) -> Result<VisibleBatch> {
        let elements = self.session.find_all(&self.selectors.review).await?;
        let mut reviews = Vec::with_capacity(elements.len().saturating_sub(skip));

        for (index, element) in elements.iter().enumerate().skip(skip) {
            match self.extract_one(element).await {
                Ok(review) => reviews.push(review),
                Err(e) => warn!(index, error = %e, "Skipping unreadable review"),
            }
        }

        Ok(VisibleBatch {
            seen: elements.len(),
            reviews,
        })
    }
}
