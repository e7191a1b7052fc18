use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Key under which the W3C protocol carries web element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Every WebDriver response wraps its payload in `{"value": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub value: T,
}

/// Error payload returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorValue {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewSession {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Opaque reference to an element inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

impl ElementId {
    /// The JSON shape used to pass an element as a script argument.
    pub fn to_script_arg(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }

    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementId(id.to_string()))
    }
}

/// Locator strategy + value for element lookups.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Locator<'a> {
    pub using: &'static str,
    pub value: &'a str,
}

impl<'a> Locator<'a> {
    pub fn css(selector: &'a str) -> Self {
        Self {
            using: "css selector",
            value: selector,
        }
    }
}

/// Session capabilities. Only the options a headless Chromium run needs.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub browser_name: String,
    pub headless: bool,
    pub binary: Option<String>,
    pub args: Vec<String>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            browser_name: "chrome".to_string(),
            headless: true,
            binary: None,
            args: vec![
                "--disable-gpu".to_string(),
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

impl Capabilities {
    pub(crate) fn to_request(&self) -> Value {
        let mut args = self.args.clone();
        if self.headless && !args.iter().any(|a| a.starts_with("--headless")) {
            args.insert(0, "--headless".to_string());
        }

        let mut chrome_options = json!({ "args": args });
        if let Some(ref binary) = self.binary {
            chrome_options["binary"] = Value::String(binary.clone());
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": self.browser_name,
                    "goog:chromeOptions": chrome_options,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_arg_uses_w3c_key() {
        let el = ElementId("abc".into());
        assert_eq!(el.to_script_arg(), json!({ ELEMENT_KEY: "abc" }));
        assert_eq!(ElementId::from_value(&el.to_script_arg()), Some(el));
    }

    #[test]
    fn headless_flag_added_once() {
        let caps = Capabilities::default();
        let req = caps.to_request();
        let args = req["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert_eq!(args.iter().filter(|a| *a == "--headless").count(), 1);

        let caps = Capabilities {
            args: vec!["--headless=new".into()],
            ..Capabilities::default()
        };
        let req = caps.to_request();
        let args = req["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn binary_is_optional() {
        let caps = Capabilities {
            binary: Some("/usr/bin/chromium-browser".into()),
            ..Capabilities::default()
        };
        let req = caps.to_request();
        assert_eq!(
            req["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["binary"],
            "/usr/bin/chromium-browser"
        );
        let req = Capabilities::default().to_request();
        assert!(req["capabilities"]["alwaysMatch"]["goog:chromeOptions"]
            .get("binary")
            .is_none());
    }
}
