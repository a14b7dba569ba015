//! Backend API access.
//!
//! Every backend capability is an opaque JSON-over-HTTP call. The rest of the
//! crate talks to the `BackendApi` trait; `HttpBackend` is the production
//! implementation and tests substitute their own.

pub mod http;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpBackend;
pub use types::{
    ChatRequest, ChatResponse, ContentPreview, CreatedPage, ModelDefaults, ModelDescriptor,
    ModelsResponse, PreviewBlock, PropertyDef, SaveRequest, SaveResult, Schema, SchemaOption,
    Target, TargetType, TokenUsage,
};

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent, or the server answered with a
    /// non-success status. `status` is `None` for transport failures.
    #[error("{message}")]
    Network { status: Option<u16>, message: String },

    /// The server answered successfully but the body was not what we expect
    #[error("Unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn network(status: Option<u16>, message: impl Into<String>) -> Self {
        ApiError::Network {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of the failed response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// True when the server could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ApiError::Network { status: None, .. })
    }
}

/// Backend capabilities used by the client.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `GET /api/targets`
    async fn list_targets(&self) -> Result<Vec<Target>, ApiError>;

    /// `GET /api/schema/{id}`
    async fn get_schema(&self, target_id: &str) -> Result<Schema, ApiError>;

    /// `GET /api/content/{database|page}/{id}`
    async fn get_content(&self, target: &Target) -> Result<ContentPreview, ApiError>;

    /// `GET /api/models`
    async fn list_models(&self) -> Result<ModelsResponse, ApiError>;

    /// `POST /api/chat`
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;

    /// `POST /api/save`
    async fn save(&self, request: &SaveRequest) -> Result<SaveResult, ApiError>;

    /// `POST /api/pages/create`
    async fn create_page(&self, page_name: &str) -> Result<CreatedPage, ApiError>;
}
