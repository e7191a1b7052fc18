//! Whole-run scenarios against a fake browser session and in-memory sinks.

use std::sync::Arc;

use harvest_core::config::{HarvestConfig, SelectorSet, TimingConfig};
use harvest_core::testing::{
    review, MemoryFlatSink, MemoryStructuredSink, MockReview, MockSession, MockSessionFactory,
};
use harvest_core::{CollectionPath, Harvester, JobRequest, Persistence, Review, SinkOutcome};

const URL: &str = "https://www.google.com/maps/place/MERCADO+BACELAR/@-25.4958129,-49.3532736,16z";
const PLACE: &str = "mercado_bacelar";

struct Rig {
    harvester: Arc<Harvester>,
    factory: Arc<MockSessionFactory>,
    flat: Arc<MemoryFlatSink>,
    db: Arc<MemoryStructuredSink>,
}

fn config() -> HarvestConfig {
    HarvestConfig {
        timing: TimingConfig::immediate(),
        ..HarvestConfig::default()
    }
}

fn rig(session: MockSession, flat: Arc<MemoryFlatSink>, db: Arc<MemoryStructuredSink>) -> Rig {
    let factory = Arc::new(MockSessionFactory::new(session));
    let harvester = Arc::new(Harvester::new(
        Arc::new(config()),
        factory.clone(),
        Persistence::new(flat.clone(), Some(db.clone())),
    ));
    Rig {
        harvester,
        factory,
        flat,
        db,
    }
}

fn names(reviews: &[Review]) -> Vec<&str> {
    reviews.iter().map(|r| r.name.as_str()).collect()
}

fn listing(names: &[&str]) -> Vec<Review> {
    names.iter().map(|n| review(n)).collect()
}

#[tokio::test]
async fn first_encounter_collects_everything() {
    let live: Vec<_> = (0..23).map(|i| review(&format!("R{i:02}"))).collect();
    let session = MockSession::from_reviews(&SelectorSet::default(), &live).page_size(10);
    let r = rig(
        session,
        Arc::new(MemoryFlatSink::new()),
        Arc::new(MemoryStructuredSink::new()),
    );

    let outcome = r.harvester.run(URL).await.unwrap();
    assert_eq!(outcome.path, CollectionPath::Cold);
    assert_eq!(outcome.new_reviews, 23);
    assert_eq!(outcome.place.as_str(), PLACE);
    // 10 → 20 → 23, then three unchanged checks.
    assert_eq!(outcome.reveal_steps, 5);

    assert_eq!(r.flat.reviews(PLACE), live);
    assert_eq!(r.db.rows(PLACE).len(), 23);
    assert_eq!(r.factory.log().reveals(), 5);
    assert!(r.factory.log().is_closed());
}

#[tokio::test]
async fn repeat_encounter_returns_only_newer_reviews() {
    let flat = Arc::new(MemoryFlatSink::new().with_reviews(PLACE, &listing(&["A", "B", "C", "D"])));
    let live = listing(&["E", "D", "C", "B", "A"]);
    let r = rig(
        MockSession::from_reviews(&SelectorSet::default(), &live),
        flat,
        Arc::new(MemoryStructuredSink::new()),
    );

    let outcome = r.harvester.run(URL).await.unwrap();
    assert_eq!(outcome.path, CollectionPath::Warm);
    assert_eq!(outcome.new_reviews, 1);

    let stored = r.flat.reviews(PLACE);
    assert_eq!(names(&stored), vec!["A", "B", "C", "D", "E"]);
    assert_eq!(names(&r.db.rows(PLACE)), vec!["E"]);
}

#[tokio::test]
async fn cold_then_warm_then_idempotent() {
    let flat = Arc::new(MemoryFlatSink::new());
    let db = Arc::new(MemoryStructuredSink::new());
    let selectors = SelectorSet::default();

    let first = listing(&["C", "B", "A"]);
    let r = rig(MockSession::from_reviews(&selectors, &first), flat.clone(), db.clone());
    assert_eq!(r.harvester.run(URL).await.unwrap().new_reviews, 3);

    let second = listing(&["E", "D", "C", "B", "A"]);
    let r = rig(MockSession::from_reviews(&selectors, &second), flat.clone(), db.clone());
    let outcome = r.harvester.run(URL).await.unwrap();
    assert_eq!(outcome.path, CollectionPath::Warm);
    assert_eq!(outcome.new_reviews, 2);

    let r = rig(MockSession::from_reviews(&selectors, &second), flat.clone(), db.clone());
    let outcome = r.harvester.run(URL).await.unwrap();
    assert_eq!(outcome.new_reviews, 0);
    assert_eq!(outcome.commit.snapshot, SinkOutcome::Skipped);

    assert_eq!(names(&flat.reviews(PLACE)), vec!["C", "B", "A", "E", "D"]);
    assert_eq!(db.rows(PLACE).len(), 5);
}

#[tokio::test]
async fn corrupt_snapshot_falls_back_to_cold_path() {
    let flat = Arc::new(MemoryFlatSink::new().with(PLACE, b"[{\"name\": \"trunc"));
    let live = listing(&["B", "A"]);
    let r = rig(
        MockSession::from_reviews(&SelectorSet::default(), &live),
        flat,
        Arc::new(MemoryStructuredSink::new()),
    );

    let outcome = r.harvester.run(URL).await.unwrap();
    assert_eq!(outcome.path, CollectionPath::Cold);
    assert_eq!(r.flat.reviews(PLACE), live);
}

#[tokio::test]
async fn legacy_snapshot_keys_select_warm_path() {
    let legacy = r#"[{"nome": "A", "nota": "5 estrelas", "tempo": "há 1 semana", "comentario": "Comentário de A"}]"#.as_bytes();
    let flat = Arc::new(MemoryFlatSink::new().with(PLACE, legacy));
    let r = rig(
        MockSession::from_reviews(&SelectorSet::default(), &listing(&["B", "A"])),
        flat,
        Arc::new(MemoryStructuredSink::new()),
    );

    let outcome = r.harvester.run(URL).await.unwrap();
    assert_eq!(outcome.path, CollectionPath::Warm);
    assert_eq!(outcome.new_reviews, 1);
}

#[tokio::test]
async fn truncated_comments_are_stored_in_full() {
    let full = "Ótimo lugar, atendimento excelente e preços justos";
    let session = MockSession::listing(
        &SelectorSet::default(),
        vec![MockReview::new("Ana", "5 estrelas", "há 1 dia").comment(full).truncated()],
    );
    let r = rig(
        session,
        Arc::new(MemoryFlatSink::new()),
        Arc::new(MemoryStructuredSink::new()),
    );

    r.harvester.run(URL).await.unwrap();
    assert_eq!(r.flat.reviews(PLACE)[0].comment, full);
}

#[tokio::test]
async fn unsortable_listing_filters_full_list() {
    let selectors = SelectorSet::default();
    let flat = Arc::new(MemoryFlatSink::new().with_reviews(PLACE, &listing(&["B", "D"])));
    // Relevance order: known reviews are not at the tail.
    let live = listing(&["B", "E", "D", "A"]);
    let session = MockSession::from_reviews(&selectors, &live).without_control(&selectors.sort_menu);
    let r = rig(session, flat, Arc::new(MemoryStructuredSink::new()));

    let response = r.harvester.handle(JobRequest::new(URL)).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.path, Some(CollectionPath::Unsorted));
    assert_eq!(response.new_reviews, Some(2));
    assert_eq!(response.warnings.len(), 1);
    assert_eq!(names(&r.flat.reviews(PLACE)), vec!["B", "D", "E", "A"]);
}

#[tokio::test]
async fn missing_reviews_tab_is_500_and_releases_session() {
    let selectors = SelectorSet::default();
    let session = MockSession::from_reviews(&selectors, &listing(&["A"]))
        .without_control(&selectors.reviews_tab);
    let r = rig(
        session,
        Arc::new(MemoryFlatSink::new()),
        Arc::new(MemoryStructuredSink::new()),
    );

    let response = r.harvester.handle(JobRequest::new(URL)).await;
    assert_eq!(response.status, 500);
    assert!(response.message.contains("Avaliações"), "{}", response.message);
    assert!(r.factory.log().is_closed());
    assert_eq!(r.factory.log().navigated(), vec![URL.to_string()]);
    assert!(r.flat.get(PLACE).is_none());
}

#[tokio::test]
async fn missing_url_is_400_without_a_session() {
    let r = rig(
        MockSession::from_reviews(&SelectorSet::default(), &[]),
        Arc::new(MemoryFlatSink::new()),
        Arc::new(MemoryStructuredSink::new()),
    );

    let response = r.harvester.handle(JobRequest::default()).await;
    assert_eq!(response.status, 400);
    assert!(!r.factory.was_opened());

    let response = r.harvester.handle(JobRequest::new("  ")).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn database_outage_is_a_warning_only() {
    let r = rig(
        MockSession::from_reviews(&SelectorSet::default(), &listing(&["A"])),
        Arc::new(MemoryFlatSink::new()),
        Arc::new(MemoryStructuredSink::new().failing()),
    );

    let response = r.harvester.handle(JobRequest::new(URL)).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.new_reviews, Some(1));
    assert_eq!(response.warnings.len(), 1);
    assert_eq!(r.flat.reviews(PLACE).len(), 1);
}

#[tokio::test]
async fn session_released_when_collection_panics() {
    let session = MockSession::from_reviews(&SelectorSet::default(), &listing(&["A"])).panic_on_reveal();
    let r = rig(
        session,
        Arc::new(MemoryFlatSink::new()),
        Arc::new(MemoryStructuredSink::new()),
    );

    let harvester = r.harvester.clone();
    let result = tokio::spawn(async move { harvester.run(URL).await }).await;
    assert!(result.unwrap_err().is_panic());
    assert!(r.factory.log().is_closed());
}
