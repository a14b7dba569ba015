//! `reqwest` implementation of the backend API.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::types::{
    ChatRequest, ChatResponse, ContentPreview, CreatePageRequest, CreatedPage, ModelsResponse,
    SaveRequest, SaveResult, Schema, SchemaResponse, Target, TargetsResponse,
};
use super::{ApiError, BackendApi};

/// Backend client over HTTP.
///
/// No timeout is configured: a request that never resolves keeps the caller
/// waiting, and the front end keeps its in-progress indicator.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from path segments. Segments are percent-encoded,
    /// so ids can be passed as-is.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport_error)?;

        decode(url, response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        decode(url, response).await
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    tracing::warn!("Backend request failed: {}", err);
    ApiError::network(
        err.status().map(|s| s.as_u16()),
        format!("Could not reach the server: {}", err),
    )
}

async fn decode<T: DeserializeOwned>(url: Url, response: Response) -> Result<T, ApiError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(status.as_u16(), &body);
        tracing::warn!("{} returned {}: {}", url.path(), status.as_u16(), message);
        return Err(ApiError::network(Some(status.as_u16()), message));
    }

    let text = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode {
        endpoint: url.path().to_string(),
        message: e.to_string(),
    })
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"detail": "..."}`, `{"detail": {"message": ...}}`,
/// `{"detail": {"error": ...}}` and top-level `message`/`error` strings.
/// Anything else becomes a generic message carrying the status code.
pub fn extract_error_message(status: u16, body: &str) -> String {
    fn from_object(value: &Value) -> Option<String> {
        ["message", "error"]
            .iter()
            .find_map(|k| value.get(*k).and_then(Value::as_str))
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    }

    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let extracted = parsed.as_ref().and_then(|json| match json.get("detail") {
        Some(Value::String(detail)) if !detail.trim().is_empty() => Some(detail.clone()),
        Some(detail @ Value::Object(_)) => from_object(detail),
        _ => from_object(json),
    });

    extracted.unwrap_or_else(|| format!("Request failed with status {}", status))
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn list_targets(&self) -> Result<Vec<Target>, ApiError> {
        let response: TargetsResponse = self.get_json(&["api", "targets"]).await?;
        Ok(response.targets)
    }

    async fn get_schema(&self, target_id: &str) -> Result<Schema, ApiError> {
        let response: SchemaResponse = self.get_json(&["api", "schema", target_id]).await?;
        Ok(response.schema)
    }

    async fn get_content(&self, target: &Target) -> Result<ContentPreview, ApiError> {
        self.get_json(&["api", "content", target.target_type.as_str(), target.id.as_str()])
            .await
    }

    async fn list_models(&self) -> Result<ModelsResponse, ApiError> {
        self.get_json(&["api", "models"]).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        self.post_json(&["api", "chat"], request).await
    }

    async fn save(&self, request: &SaveRequest) -> Result<SaveResult, ApiError> {
        self.post_json(&["api", "save"], request).await
    }

    async fn create_page(&self, page_name: &str) -> Result<CreatedPage, ApiError> {
        self.post_json(&["api", "pages", "create"], &CreatePageRequest { page_name })
            .await
    }
}
