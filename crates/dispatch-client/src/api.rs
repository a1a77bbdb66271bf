use async_trait::async_trait;
use dispatch_core::{ActionResponse, DispatchMeta, FinalizeResponse, ItemRow};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Relay { status: u16, message: String },
    #[error("invalid relay URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The relay's fixed set of calls, as seen by a scanning session.
#[async_trait]
pub trait DispatchApi: Send + Sync {
    async fn meta(&self, dispatch_id: &str) -> Result<DispatchMeta, ApiError>;

    /// Authoritative item list used for every full reload.
    async fn items(&self, dispatch_id: &str) -> Result<Vec<ItemRow>, ApiError>;

    /// Scan list from `/api/list`; older deployments only have this one.
    async fn list(&self, dispatch_id: &str) -> Result<Vec<ItemRow>, ApiError>;

    async fn scan(&self, dispatch_id: &str, barcode: &str) -> Result<ActionResponse, ApiError>;

    async fn unscan(&self, dispatch_id: &str, barcode: &str) -> Result<ActionResponse, ApiError>;

    async fn return_item(
        &self,
        dispatch_id: &str,
        barcode: &str,
    ) -> Result<ActionResponse, ApiError>;

    async fn finalize(
        &self,
        dispatch_id: &str,
        dispatch_date: &str,
    ) -> Result<FinalizeResponse, ApiError>;
}
