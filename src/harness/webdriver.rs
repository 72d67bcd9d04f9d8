use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Minimal W3C WebDriver client.
pub struct WebDriver {
    client: reqwest::Client,
    session_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(String);

impl ElementId {
    /// Web element reference, usable as a script argument.
    pub fn to_json(&self) -> Value {
        let mut reference = serde_json::Map::new();
        reference.insert(ELEMENT_KEY.to_owned(), Value::String(self.0.clone()));
        Value::Object(reference)
    }
}

#[derive(Debug, Copy, Clone)]
pub enum By<'a> {
    Css(&'a str),
    XPath(&'a str),
}

impl<'a> By<'a> {
    /// XPath for selectors starting with `/` or `(`, CSS otherwise.
    pub fn selector(selector: &'a str) -> Self {
        if selector.starts_with('/') || selector.starts_with('(') {
            Self::XPath(selector)
        } else {
            Self::Css(selector)
        }
    }

    fn to_json(self) -> Value {
        let (using, value) = match self {
            Self::Css(selector) => ("css selector", selector),
            Self::XPath(selector) => ("xpath", selector),
        };
        serde_json::json!({ "using": using, "value": value })
    }
}

impl WebDriver {
    pub async fn new_session(server: &Url, capabilities: Value) -> Result<Self, WebDriverError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct NewSession {
            session_id: String,
        }

        let client = reqwest::Client::new();
        let base = server.as_str().trim_end_matches('/').to_owned();

        let body = serde_json::json!({ "capabilities": { "alwaysMatch": capabilities } });
        let NewSession { session_id } =
            send(&client, Method::POST, format!("{base}/session"), Some(body)).await?;

        tracing::debug!(%session_id, "webdriver session created");

        Ok(Self {
            client,
            session_url: format!("{base}/session/{session_id}"),
        })
    }

    pub async fn goto(&self, url: &str) -> Result<(), WebDriverError> {
        self.command(Method::POST, "url", serde_json::json!({ "url": url }))
            .await
    }

    pub async fn current_url(&self) -> Result<String, WebDriverError> {
        self.query(Method::GET, "url", None).await
    }

    pub async fn refresh(&self) -> Result<(), WebDriverError> {
        self.command(Method::POST, "refresh", serde_json::json!({}))
            .await
    }

    pub async fn find(&self, by: By<'_>) -> Result<ElementId, WebDriverError> {
        let element: Value = self.query(Method::POST, "element", Some(by.to_json())).await?;
        element
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementId(id.to_owned()))
            .ok_or(WebDriverError::InvalidResponse)
    }

    pub async fn find_all(&self, by: By<'_>) -> Result<Vec<ElementId>, WebDriverError> {
        let elements: Vec<Value> = self.query(Method::POST, "elements", Some(by.to_json())).await?;
        elements
            .iter()
            .map(|element| {
                element
                    .get(ELEMENT_KEY)
                    .and_then(Value::as_str)
                    .map(|id| ElementId(id.to_owned()))
                    .ok_or(WebDriverError::InvalidResponse)
            })
            .collect()
    }

    /// Polls until the element appears or the timeout expires.
    pub async fn wait_for(&self, by: By<'_>, timeout: Duration) -> Result<ElementId, WebDriverError> {
        let wait = async {
            loop {
                match self.find(by).await {
                    Ok(element) => return Ok(element),
                    Err(e) if e.is_no_such_element() => {
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(res) => res,
            Err(_) => Err(WebDriverError::ElementTimeout(format!("{by:?}"))),
        }
    }

    pub async fn click(&self, element: &ElementId) -> Result<(), WebDriverError> {
        self.command(
            Method::POST,
            &format!("element/{}/click", element.0),
            serde_json::json!({}),
        )
        .await
    }

    pub async fn send_keys(&self, element: &ElementId, text: &str) -> Result<(), WebDriverError> {
        self.command(
            Method::POST,
            &format!("element/{}/value", element.0),
            serde_json::json!({ "text": text }),
        )
        .await
    }

    pub async fn text(&self, element: &ElementId) -> Result<String, WebDriverError> {
        self.query(Method::GET, &format!("element/{}/text", element.0), None)
            .await
    }

    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, WebDriverError> {
        let body = serde_json::json!({ "script": script, "args": args });
        self.query(Method::POST, "execute/sync", Some(body)).await
    }

    /// Script receives a callback as its last argument.
    pub async fn execute_async(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<Value, WebDriverError> {
        let body = serde_json::json!({ "script": script, "args": args });
        self.query(Method::POST, "execute/async", Some(body)).await
    }

    pub async fn window_handle(&self) -> Result<String, WebDriverError> {
        self.query(Method::GET, "window", None).await
    }

    pub async fn window_handles(&self) -> Result<Vec<String>, WebDriverError> {
        self.query(Method::GET, "window/handles", None).await
    }

    pub async fn switch_to_window(&self, handle: &str) -> Result<(), WebDriverError> {
        self.command(
            Method::POST,
            "window",
            serde_json::json!({ "handle": handle }),
        )
        .await
    }

    /// Waits for a window that is not in `known` to open.
    pub async fn wait_for_new_window(
        &self,
        known: &[String],
        timeout: Duration,
    ) -> Result<String, WebDriverError> {
        let wait = async {
            loop {
                let handles = self.window_handles().await?;
                if let Some(handle) = handles.into_iter().find(|h| !known.contains(h)) {
                    return Ok::<_, WebDriverError>(handle);
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(res) => res,
            Err(_) => Err(WebDriverError::ElementTimeout("new window".to_owned())),
        }
    }

    pub async fn quit(self) -> Result<(), WebDriverError> {
        let _: Value = send(&self.client, Method::DELETE, self.session_url, None).await?;
        Ok(())
    }

    async fn command(&self, method: Method, path: &str, body: Value) -> Result<(), WebDriverError> {
        let _: Value = self.query(method, path, Some(body)).await?;
        Ok(())
    }

    async fn query<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, WebDriverError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.session_url);
        send(&self.client, method, url, body).await
    }
}

async fn send<T>(
    client: &reqwest::Client,
    method: Method,
    url: String,
    body: Option<Value>,
) -> Result<T, WebDriverError>
where
    T: DeserializeOwned,
{
    #[derive(Deserialize)]
    struct Response<V> {
        value: V,
    }

    #[derive(Deserialize)]
    struct ErrorValue {
        error: String,
        #[serde(default)]
        message: String,
    }

    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let data = response.bytes().await?;

    if !status.is_success() {
        return Err(match serde_json::from_slice::<Response<ErrorValue>>(&data) {
            Ok(Response { value }) => WebDriverError::Command {
                error: value.error,
                message: value.message,
            },
            Err(_) => WebDriverError::Status(status.as_u16()),
        });
    }

    let Response { value } = serde_json::from_slice(&data)?;
    Ok(value)
}

#[derive(Debug, thiserror::Error)]
pub enum WebDriverError {
    #[error("webdriver request failed")]
    Http(#[from] reqwest::Error),
    #[error("webdriver returned status {0}")]
    Status(u16),
    #[error("{error}: {message}")]
    Command { error: String, message: String },
    #[error("invalid webdriver response")]
    InvalidResponse,
    #[error("failed to parse webdriver response")]
    Json(#[from] serde_json::Error),
    #[error("timed out waiting for {0}")]
    ElementTimeout(String),
}

impl WebDriverError {
    pub fn is_no_such_element(&self) -> bool {
        matches!(self, Self::Command { error, .. } if error == "no such element")
    }
}
