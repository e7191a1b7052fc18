pub mod error;
pub mod types;

pub use error::{Result, WebDriverError};
pub use types::{Capabilities, ElementId, ELEMENT_KEY};

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use types::{Envelope, ErrorValue, Locator, NewSession};

/// Poll interval for `wait_until_actionable`.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Timeout for a single WebDriver command. Script execution on a long
/// listing can take a while, so this is generous.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

pub struct WebDriverClient {
    client: reqwest::Client,
    base_url: String,
}

impl WebDriverClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(COMMAND_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Start a new browser session.
    pub async fn new_session(&self, capabilities: &Capabilities) -> Result<Session> {
        let endpoint = format!("{}/session", self.base_url);
        let created: NewSession = execute(
            self.client
                .post(&endpoint)
                .json(&capabilities.to_request()),
        )
        .await?;

        debug!(session_id = %created.session_id, "WebDriver session created");

        Ok(Session {
            client: self.client.clone(),
            session_url: format!("{}/session/{}", self.base_url, created.session_id),
            id: created.session_id,
            released: false,
        })
    }
}

/// A live browser session. Call [`Session::quit`] to release it; if the
/// session is dropped without quitting, the delete is issued in the background.
pub struct Session {
    client: reqwest::Client,
    session_url: String,
    id: String,
    released: bool,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        let _: Value = execute(
            self.client
                .post(format!("{}/url", self.session_url))
                .json(&json!({ "url": url })),
        )
        .await?;
        Ok(())
    }

    pub async fn find_all(&self, selector: &str) -> Result<Vec<ElementId>> {
        let values: Vec<Value> = execute(
            self.client
                .post(format!("{}/elements", self.session_url))
                .json(&Locator::css(selector)),
        )
        .await?;
        Ok(values.iter().filter_map(ElementId::from_value).collect())
    }

    /// First descendant of `parent` matching `selector`, or `None`.
    pub async fn find_within(&self, parent: &ElementId, selector: &str) -> Result<Option<ElementId>> {
        let result: Result<Value> = execute(
            self.client
                .post(format!("{}/element/{}/element", self.session_url, parent.0))
                .json(&Locator::css(selector)),
        )
        .await;

        match result {
            Ok(value) => Ok(ElementId::from_value(&value)),
            Err(WebDriverError::Api { ref error, .. }) if error == "no such element" => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn text(&self, element: &ElementId) -> Result<String> {
        execute(
            self.client
                .get(format!("{}/element/{}/text", self.session_url, element.0)),
        )
        .await
    }

    pub async fn attribute(&self, element: &ElementId, name: &str) -> Result<Option<String>> {
        execute(self.client.get(format!(
            "{}/element/{}/attribute/{}",
            self.session_url, element.0, name
        )))
        .await
    }

    pub async fn is_displayed(&self, element: &ElementId) -> Result<bool> {
        execute(
            self.client
                .get(format!("{}/element/{}/displayed", self.session_url, element.0)),
        )
        .await
    }

    pub async fn is_enabled(&self, element: &ElementId) -> Result<bool> {
        execute(
            self.client
                .get(format!("{}/element/{}/enabled", self.session_url, element.0)),
        )
        .await
    }

    /// Run a synchronous script. Element arguments must already be in
    /// their JSON form (see [`ElementId::to_script_arg`]).
    pub async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        execute(
            self.client
                .post(format!("{}/execute/sync", self.session_url))
                .json(&json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Poll until the first element matching `selector` is displayed and enabled.
    pub async fn wait_until_actionable(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementId> {
        let started = Instant::now();
        loop {
            if let Some(element) = self.first_actionable(selector).await? {
                return Ok(element);
            }
            if started.elapsed() >= timeout {
                return Err(WebDriverError::Timeout {
                    selector: selector.to_string(),
                    waited_ms: started.elapsed().as_millis(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn first_actionable(&self, selector: &str) -> Result<Option<ElementId>> {
        for element in self.find_all(selector).await? {
            // Elements can go stale between lookup and check; treat as not ready.
            let displayed = self.is_displayed(&element).await.unwrap_or(false);
            if displayed && self.is_enabled(&element).await.unwrap_or(false) {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// End the session and close the browser.
    pub async fn quit(mut self) -> Result<()> {
        self.released = true;
        let _: Value = execute(self.client.delete(&self.session_url)).await?;
        debug!(session_id = %self.id, "WebDriver session closed");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(session_id = %self.id, "WebDriver session dropped outside a runtime; browser left running");
            return;
        };
        warn!(session_id = %self.id, "WebDriver session dropped without quit, closing in background");
        let client = self.client.clone();
        let url = self.session_url.clone();
        handle.spawn(async move {
            if let Err(e) = client.delete(&url).send().await {
                warn!(error = %e, "Background WebDriver session close failed");
            }
        });
    }
}

/// Send a command and unwrap the `{"value": ...}` envelope.
async fn execute<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
    let resp = request.send().await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Envelope<ErrorValue>>(&body)
            .map(|e| e.value)
            .unwrap_or(ErrorValue {
                error: "unknown error".to_string(),
                message: body,
            });
        return Err(WebDriverError::Api {
            status: status.as_u16(),
            error: detail.error,
            message: detail.message,
        });
    }

    let envelope: Envelope<T> = resp.json().await?;
    Ok(envelope.value)
}
