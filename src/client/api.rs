use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {status}")]
    Rejected { status: StatusCode, body: Option<Value> },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiClientError {
    /// `message` field of a rejected response's JSON body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiClientError::Rejected { body: Some(body), .. } => body.get("message").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Thin JSON client for the app's REST API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiClientError> {
        self.send(self.http.post(self.url(path)).json(body), None).await
    }

    pub async fn get_json(&self, path: &str, bearer: Option<&str>) -> Result<Value, ApiClientError> {
        self.send(self.http.get(self.url(path)), bearer).await
    }

    pub async fn put_json(&self, path: &str, bearer: Option<&str>) -> Result<Value, ApiClientError> {
        self.send(self.http.put(self.url(path)), bearer).await
    }

    async fn send(&self, req: RequestBuilder, bearer: Option<&str>) -> Result<Value, ApiClientError> {
        let req = match bearer {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        let parsed = serde_json::from_slice::<Value>(&bytes);
        if !status.is_success() {
            return Err(ApiClientError::Rejected { status, body: parsed.ok() });
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        parsed.map_err(|e| ApiClientError::Decode(e.to_string()))
    }
}
