//! Content-driving session: the browser seam. Collection code never sees
//! a concrete driver, only this trait.

pub mod webdriver;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use webdriver::{WebDriverSession, WebDriverSessionFactory};

/// Opaque handle to an element inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

/// Argument passed to an injected script.
#[derive(Debug, Clone)]
pub enum ScriptArg {
    Element(ElementHandle),
    Value(Value),
}

#[async_trait]
pub trait ContentSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// First descendant of `parent` matching `selector`, if any.
    async fn find_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>>;

    async fn text(&self, element: &ElementHandle) -> Result<String>;

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>>;

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool>;

    async fn run_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value>;

    /// Wait until an element matching `selector` can be interacted with.
    async fn wait_until_actionable(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle>;

    /// Release the session. Consumes it so it cannot be used afterwards.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens one session per run.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ContentSession>>;
}
