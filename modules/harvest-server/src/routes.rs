use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use harvest_core::{Harvester, JobRequest};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub harvester: Arc<Harvester>,
}

pub fn build_router(harvester: Arc<Harvester>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/harvest", post(harvest))
        .with_state(AppState { harvester })
        // Method, path, status and latency only; request bodies stay out of logs.
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}

async fn health() -> &'static str {
    "ok"
}

/// Runs the job inline; the response arrives once the harvest finishes.
async fn harvest(
    State(state): State<AppState>,
    body: Result<Json<JobRequest>, JsonRejection>,
) -> Response {
    // A body that is not a JSON object is treated like a missing url.
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Unreadable job request");
            JobRequest::default()
        }
    };

    let response = state.harvester.handle(request).await;
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use harvest_core::config::{HarvestConfig, SelectorSet, TimingConfig};
    use harvest_core::testing::{review, MemoryFlatSink, MockSession, MockSessionFactory};
    use harvest_core::Persistence;
    use serde_json::Value;
    use tower::ServiceExt;

    fn router(session: MockSession) -> (Router, Arc<MockSessionFactory>) {
        let factory = Arc::new(MockSessionFactory::new(session));
        let config = HarvestConfig {
            timing: TimingConfig::immediate(),
            ..HarvestConfig::default()
        };
        let harvester = Harvester::new(
            Arc::new(config),
            factory.clone(),
            Persistence::new(Arc::new(MemoryFlatSink::new()), None),
        );
        (build_router(Arc::new(harvester)), factory)
    }

    async fn post_json(app: Router, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post("/harvest")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_check() {
        let (app, _) = router(MockSession::listing(&SelectorSet::default(), vec![]));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_url_is_400() {
        let (app, factory) = router(MockSession::listing(&SelectorSet::default(), vec![]));
        let (status, body) = post_json(app, "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert!(!factory.was_opened());
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let (app, _) = router(MockSession::listing(&SelectorSet::default(), vec![]));
        let (status, _) = post_json(app, "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn successful_harvest_reports_count() {
        let selectors = SelectorSet::default();
        let session = MockSession::from_reviews(&selectors, &[review("B"), review("A")]);
        let (app, factory) = router(session);

        let (status, body) = post_json(
            app,
            r#"{"url": "https://www.google.com/maps/place/Nema+Padaria/@1,2"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["new_reviews"], 2);
        assert_eq!(body["place"], "nema_padaria");
        assert_eq!(body["path"], "cold");
        assert!(factory.log().is_closed());
    }

    #[tokio::test]
    async fn navigation_failure_is_500() {
        let selectors = SelectorSet::default();
        let session = MockSession::listing(&selectors, vec![]).without_control(&selectors.reviews_tab);
        let (app, _) = router(session);

        let (status, body) =
            post_json(app, r#"{"url": "https://www.google.com/maps/place/Nema/"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 500);
    }
}
