// Job request/response shapes shared by the HTTP endpoint and the CLI.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::collect::CollectionPath;
use crate::error::HarvestError;
use crate::harvester::{HarvestOutcome, Harvester};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub url: Option<String>,
}

impl JobRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_reviews: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<CollectionPath>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl JobResponse {
    pub fn failed(err: &HarvestError) -> Self {
        Self {
            status: err.status_code(),
            message: err.to_string(),
            new_reviews: None,
            place: None,
            path: None,
            warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

impl From<HarvestOutcome> for JobResponse {
    fn from(outcome: HarvestOutcome) -> Self {
        Self {
            status: 200,
            message: format!("{} new reviews collected and saved", outcome.new_reviews),
            new_reviews: Some(outcome.new_reviews),
            warnings: outcome.warnings(),
            place: Some(outcome.place.to_string()),
            path: Some(outcome.path),
        }
    }
}

impl Harvester {
    /// Run a job request and map the result to a response. Never fails;
    /// errors become 400/500 responses.
    pub async fn handle(&self, request: JobRequest) -> JobResponse {
        let Some(url) = request.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            return JobResponse::failed(&HarvestError::InvalidInput(
                "url not provided".to_string(),
            ));
        };

        match self.run(url).await {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                error!(url, error = %e, "Harvest failed");
                JobResponse::failed(&e)
            }
        }
    }
}
