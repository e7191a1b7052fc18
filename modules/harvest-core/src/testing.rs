// Test doubles for the harvest pipeline.
//
// One per trait boundary:
// - SimulatedListing (ReviewSurface): paged in-memory listing with counters
// - MockSession (ContentSession): fake DOM for a review listing
// - MockSessionFactory (SessionFactory): hands out one MockSession
// - MemoryFlatSink (FlatSink): HashMap of documents
// - MemoryStructuredSink (StructuredSink): HashMap of tables

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::SelectorSet;
use crate::error::{HarvestError, Result};
use crate::place::PlaceId;
use crate::review::Review;
use crate::session::{ContentSession, ElementHandle, ScriptArg, SessionFactory};
use crate::store::{FlatSink, StructuredSink};
use crate::surface::{NewestFirst, ReviewSurface, VisibleBatch};

/// Pixel height of one rendered review in the simulated listings.
const ROW_HEIGHT: u64 = 120;

/// A review with a realistic shape, identified by `name`.
pub fn review(name: &str) -> Review {
    Review::new(
        name,
        "5 estrelas",
        "há 1 semana",
        format!("Comentário de {name}"),
    )
}

// ---------------------------------------------------------------------------
// SimulatedListing
// ---------------------------------------------------------------------------

/// In-memory listing that renders `page_size` more reviews per reveal step.
/// Records how many reveal steps and extractions were made.
pub struct SimulatedListing {
    state: Mutex<ListingState>,
}

struct ListingState {
    reviews: Vec<Review>,
    endless: bool,
    initial: Option<usize>,
    page_size: usize,
    revealed: usize,
    stall_on: HashSet<usize>,
    reveal_steps: usize,
    extractions: usize,
}

impl ListingState {
    fn visible(&self) -> usize {
        let shown = self.initial.unwrap_or(self.page_size) + self.revealed;
        if self.endless {
            shown
        } else {
            shown.min(self.reviews.len())
        }
    }

    fn review_at(&self, index: usize) -> Review {
        if self.endless {
            review(&format!("E{index}"))
        } else {
            self.reviews[index].clone()
        }
    }
}

impl SimulatedListing {
    pub fn new(reviews: Vec<Review>) -> Self {
        Self {
            state: Mutex::new(ListingState {
                reviews,
                endless: false,
                initial: None,
                page_size: 10,
                revealed: 0,
                stall_on: HashSet::new(),
                reveal_steps: 0,
                extractions: 0,
            }),
        }
    }

    /// A listing that grows on every reveal step, forever.
    pub fn endless() -> Self {
        let listing = Self::new(Vec::new());
        listing.state.lock().unwrap().endless = true;
        listing
    }

    /// Reviews rendered before the first reveal step. Defaults to `page_size`.
    pub fn initial(self, n: usize) -> Self {
        self.state.lock().unwrap().initial = Some(n);
        self
    }

    pub fn page_size(self, n: usize) -> Self {
        self.state.lock().unwrap().page_size = n;
        self
    }

    /// Reveal steps (1-based) that load nothing, like a slow network.
    pub fn stall_on(self, steps: &[usize]) -> Self {
        self.state.lock().unwrap().stall_on = steps.iter().copied().collect();
        self
    }

    pub fn reveal_steps(&self) -> usize {
        self.state.lock().unwrap().reveal_steps
    }

    pub fn extractions(&self) -> usize {
        self.state.lock().unwrap().extractions
    }
}

#[async_trait]
impl ReviewSurface for SimulatedListing {
    async fn open(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn sort_newest_first(&self) -> Result<NewestFirst> {
        Ok(NewestFirst::inherent())
    }

    async fn reveal_step(&self) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.reveal_steps += 1;
        if !s.stall_on.contains(&s.reveal_steps) {
            s.revealed += s.page_size;
        }
        Ok(())
    }

    async fn expand_truncated(&self) -> Result<()> {
        Ok(())
    }

    async fn measure(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().visible() as u64 * ROW_HEIGHT)
    }

    async fn extract_visible(&self, skip: usize) -> Result<VisibleBatch> {
        let mut s = self.state.lock().unwrap();
        s.extractions += 1;
        let seen = s.visible();
        let reviews = (skip..seen).map(|i| s.review_at(i)).collect();
        Ok(VisibleBatch { seen, reviews })
    }
}

// ---------------------------------------------------------------------------
// MockSession
// ---------------------------------------------------------------------------

/// A review as rendered in the fake DOM.
#[derive(Debug, Clone)]
pub struct MockReview {
    author: Option<String>,
    rating: String,
    time_ago: String,
    comment: Option<String>,
    truncated: bool,
}

impl MockReview {
    pub fn new(author: impl Into<String>, rating: impl Into<String>, time_ago: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            rating: rating.into(),
            time_ago: time_ago.into(),
            comment: None,
            truncated: false,
        }
    }

    pub fn from_review(r: &Review) -> Self {
        let m = Self::new(&r.name, &r.rating, &r.time_ago);
        if r.comment.is_empty() {
            m
        } else {
            m.comment(&r.comment)
        }
    }

    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.comment = Some(text.into());
        self
    }

    /// Comment shows a short preview until its "more" button is clicked.
    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    /// Author element missing from the markup.
    pub fn without_author(mut self) -> Self {
        self.author = None;
        self
    }
}

/// What a [`MockSession`] was asked to do.
#[derive(Debug, Default)]
pub struct SessionLog {
    navigated: Mutex<Vec<String>>,
    clicked: Mutex<Vec<String>>,
    reveals: Mutex<usize>,
    closed: AtomicBool,
}

impl SessionLog {
    pub fn navigated(&self) -> Vec<String> {
        self.navigated.lock().unwrap().clone()
    }

    /// Selectors of controls clicked, in order.
    pub fn clicked_controls(&self) -> Vec<String> {
        self.clicked.lock().unwrap().clone()
    }

    pub fn reveals(&self) -> usize {
        *self.reveals.lock().unwrap()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct DomState {
    reviews: Vec<MockReview>,
    expanded: HashSet<usize>,
    visible: usize,
    page_size: usize,
    controls: Vec<String>,
    panic_on_reveal: bool,
}

/// Fake DOM of a review listing, addressed through the configured selectors.
/// Scrolling the container renders `page_size` more reviews.
pub struct MockSession {
    selectors: SelectorSet,
    dom: Mutex<DomState>,
    log: Arc<SessionLog>,
}

impl MockSession {
    pub fn listing(selectors: &SelectorSet, reviews: Vec<MockReview>) -> Self {
        let visible = reviews.len();
        Self {
            selectors: selectors.clone(),
            dom: Mutex::new(DomState {
                reviews,
                expanded: HashSet::new(),
                visible,
                page_size: visible.max(1),
                controls: vec![
                    selectors.reviews_tab.clone(),
                    selectors.sort_menu.clone(),
                    selectors.sort_newest.clone(),
                ],
                panic_on_reveal: false,
            }),
            log: Arc::new(SessionLog::default()),
        }
    }

    /// Listing built from plain reviews, newest first.
    pub fn from_reviews(selectors: &SelectorSet, reviews: &[Review]) -> Self {
        Self::listing(selectors, reviews.iter().map(MockReview::from_review).collect())
    }

    /// Render only `n` reviews at first and `n` more per scroll.
    pub fn page_size(self, n: usize) -> Self {
        {
            let mut dom = self.dom.lock().unwrap();
            dom.page_size = n;
            dom.visible = n.min(dom.reviews.len());
        }
        self
    }

    /// Remove a control from the page; waiting on it times out.
    pub fn without_control(self, selector: &str) -> Self {
        self.dom.lock().unwrap().controls.retain(|c| c != selector);
        self
    }

    /// Panic when the container is scrolled, to exercise release on unwind.
    pub fn panic_on_reveal(self) -> Self {
        self.dom.lock().unwrap().panic_on_reveal = true;
        self
    }

    pub fn log(&self) -> Arc<SessionLog> {
        self.log.clone()
    }

    fn review_index(id: &str) -> Option<(usize, &str)> {
        let rest = id.strip_prefix("review-")?;
        match rest.split_once('/') {
            Some((i, field)) => Some((i.parse().ok()?, field)),
            None => Some((rest.parse().ok()?, "")),
        }
    }
}

#[async_trait]
impl ContentSession for MockSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.log.navigated.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let dom = self.dom.lock().unwrap();
        let s = &self.selectors;
        let ids: Vec<String> = if selector == s.review {
            (0..dom.visible).map(|i| format!("review-{i}")).collect()
        } else if selector == s.scroll_container {
            vec!["container".to_string()]
        } else if selector == s.expand_comment {
            (0..dom.visible)
                .filter(|i| dom.reviews[*i].truncated && !dom.expanded.contains(i))
                .map(|i| format!("more-{i}"))
                .collect()
        } else if let Some(pos) = dom.controls.iter().position(|c| c == selector) {
            vec![format!("control-{pos}")]
        } else {
            Vec::new()
        };
        Ok(ids.into_iter().map(ElementHandle).collect())
    }

    async fn find_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>> {
        let dom = self.dom.lock().unwrap();
        let Some((i, _)) = Self::review_index(&parent.0) else {
            return Ok(None);
        };
        let Some(r) = dom.reviews.get(i) else {
            return Ok(None);
        };
        let s = &self.selectors;
        let field = if selector == s.author && r.author.is_some() {
            "author"
        } else if selector == s.rating {
            "rating"
        } else if selector == s.time_ago {
            "time"
        } else if selector == s.comment && r.comment.is_some() {
            "comment"
        } else {
            return Ok(None);
        };
        Ok(Some(ElementHandle(format!("review-{i}/{field}"))))
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        let dom = self.dom.lock().unwrap();
        let (i, field) = Self::review_index(&element.0)
            .ok_or_else(|| HarvestError::Session(format!("stale element {}", element.0)))?;
        let r = &dom.reviews[i];
        let text = match field {
            "author" => r.author.clone().unwrap_or_default(),
            "time" => r.time_ago.clone(),
            "comment" => {
                let full = r.comment.clone().unwrap_or_default();
                if r.truncated && !dom.expanded.contains(&i) {
                    format!("{}…", full.chars().take(10).collect::<String>())
                } else {
                    full
                }
            }
            _ => String::new(),
        };
        Ok(text)
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let dom = self.dom.lock().unwrap();
        match Self::review_index(&element.0) {
            Some((i, "rating")) if name == self.selectors.rating_attribute => {
                Ok(Some(dom.reviews[i].rating.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn is_displayed(&self, _element: &ElementHandle) -> Result<bool> {
        Ok(true)
    }

    async fn run_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value> {
        let target = match args.first() {
            Some(ScriptArg::Element(el)) => el.0.clone(),
            _ => return Ok(Value::Null),
        };
        let mut dom = self.dom.lock().unwrap();

        if script.starts_with("return") && script.contains("scrollHeight") {
            return Ok(json!(dom.visible as u64 * ROW_HEIGHT));
        }
        if script.contains("scrollTop") {
            if dom.panic_on_reveal {
                panic!("renderer crashed");
            }
            *self.log.reveals.lock().unwrap() += 1;
            dom.visible = (dom.visible + dom.page_size).min(dom.reviews.len());
            return Ok(Value::Null);
        }
        if script.contains("click") {
            if let Some(i) = target.strip_prefix("more-").and_then(|i| i.parse().ok()) {
                dom.expanded.insert(i);
            } else if let Some(pos) = target
                .strip_prefix("control-")
                .and_then(|p| p.parse::<usize>().ok())
            {
                let selector = dom.controls[pos].clone();
                self.log.clicked.lock().unwrap().push(selector);
            }
        }
        Ok(Value::Null)
    }

    async fn wait_until_actionable(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<ElementHandle> {
        let dom = self.dom.lock().unwrap();
        match dom.controls.iter().position(|c| c == selector) {
            Some(pos) => Ok(ElementHandle(format!("control-{pos}"))),
            None => Err(HarvestError::Navigation {
                selector: selector.to_string(),
                reason: "timed out".to_string(),
            }),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out a single prepared [`MockSession`].
pub struct MockSessionFactory {
    session: Mutex<Option<MockSession>>,
    log: Arc<SessionLog>,
}

impl MockSessionFactory {
    pub fn new(session: MockSession) -> Self {
        let log = session.log();
        Self {
            session: Mutex::new(Some(session)),
            log,
        }
    }

    /// A factory whose browser never starts.
    pub fn unavailable() -> Self {
        Self {
            session: Mutex::new(None),
            log: Arc::new(SessionLog::default()),
        }
    }

    pub fn log(&self) -> Arc<SessionLog> {
        self.log.clone()
    }

    pub fn was_opened(&self) -> bool {
        self.session.lock().unwrap().is_none()
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn open(&self) -> Result<Box<dyn ContentSession>> {
        match self.session.lock().unwrap().take() {
            Some(session) => Ok(Box::new(session)),
            None => Err(HarvestError::Session("browser unavailable".to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Memory sinks
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryFlatSink {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryFlatSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, bytes: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        self
    }

    /// Seed `key` with a JSON snapshot of `reviews`.
    pub fn with_reviews(self, key: &str, reviews: &[Review]) -> Self {
        let bytes = serde_json::to_vec(reviews).unwrap();
        self.with(key, &bytes)
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(key).cloned()
    }

    /// Stored snapshot under `key`, decoded.
    pub fn reviews(&self, key: &str) -> Vec<Review> {
        self.get(key)
            .map(|b| serde_json::from_slice(&b).unwrap())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FlatSink for MemoryFlatSink {
    async fn read_all(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_reads {
            return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read denied").into());
        }
        Ok(self.get(key))
    }

    async fn write_all(&self, key: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_writes {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
        }
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStructuredSink {
    tables: Mutex<HashMap<String, Vec<Review>>>,
    fail: bool,
}

impl MemoryStructuredSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.lock().unwrap().contains_key(name)
    }

    pub fn rows(&self, name: &str) -> Vec<Review> {
        self.tables
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl StructuredSink for MemoryStructuredSink {
    async fn ensure_container(&self, place: &PlaceId) -> Result<()> {
        if self.fail {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        self.tables
            .lock()
            .unwrap()
            .entry(place.as_str().to_string())
            .or_default();
        Ok(())
    }

    async fn append_rows(&self, place: &PlaceId, rows: &[Review]) -> Result<u64> {
        if self.fail {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .get_mut(place.as_str())
            .ok_or_else(|| HarvestError::Session(format!("no table {place}")))?;
        table.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }
}
