// ContentSession backed by a W3C WebDriver endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use webdriver_client::{Capabilities, ElementId, Session, WebDriverClient, WebDriverError};

use super::{ContentSession, ElementHandle, ScriptArg, SessionFactory};
use crate::config::WebDriverConfig;
use crate::error::{HarvestError, Result};

pub struct WebDriverSessionFactory {
    client: WebDriverClient,
    capabilities: Capabilities,
}

impl WebDriverSessionFactory {
    pub fn new(config: &WebDriverConfig) -> Result<Self> {
        Ok(Self {
            client: WebDriverClient::new(&config.url)?,
            capabilities: Capabilities {
                browser_name: config.browser_name.clone(),
                headless: config.headless,
                binary: config.browser_binary.clone(),
                args: config.args.clone(),
            },
        })
    }
}

#[async_trait]
impl SessionFactory for WebDriverSessionFactory {
    async fn open(&self) -> Result<Box<dyn ContentSession>> {
        let session = self.client.new_session(&self.capabilities).await?;
        Ok(Box::new(WebDriverSession { session }))
    }
}

pub struct WebDriverSession {
    session: Session,
}

fn element_id(handle: &ElementHandle) -> ElementId {
    ElementId(handle.0.clone())
}

fn handle(id: ElementId) -> ElementHandle {
    ElementHandle(id.0)
}

#[async_trait]
impl ContentSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        Ok(self.session.navigate(url).await?)
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let found = self.session.find_all(selector).await?;
        Ok(found.into_iter().map(handle).collect())
    }

    async fn find_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>> {
        let found = self
            .session
            .find_within(&element_id(parent), selector)
            .await?;
        Ok(found.map(handle))
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        Ok(self.session.text(&element_id(element)).await?)
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        Ok(self.session.attribute(&element_id(element), name).await?)
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool> {
        Ok(self.session.is_displayed(&element_id(element)).await?)
    }

    async fn run_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value> {
        let args = args
            .iter()
            .map(|arg| match arg {
                ScriptArg::Element(el) => element_id(el).to_script_arg(),
                ScriptArg::Value(v) => v.clone(),
            })
            .collect();
        Ok(self.session.execute_script(script, args).await?)
    }

    async fn wait_until_actionable(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle> {
        match self.session.wait_until_actionable(selector, timeout).await {
            Ok(id) => Ok(handle(id)),
            Err(e @ WebDriverError::Timeout { .. }) => Err(HarvestError::Navigation {
                selector: selector.to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(self.session.quit().await?)
    }
}
