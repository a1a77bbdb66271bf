//! Outbound calls to the backend's `/rest/v1/rpc/{procedure}` endpoint.

use async_trait::async_trait;
use dispatch_core::Procedure;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RPC {procedure} failed: {status} {body}")]
    Remote {
        procedure: Procedure,
        status: u16,
        body: String,
    },
}

/// The remote procedure interface, addressed by name with a JSON object of
/// named parameters. Results are either one object or an array of rows.
#[async_trait]
pub trait RpcBackend: Send + Sync {
    async fn call(&self, procedure: Procedure, params: Value) -> Result<Value, RpcError>;
}

/// PostgREST-style RPC client holding the service credential.
pub struct PostgrestClient {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl PostgrestClient {
    /// `base_url` should be like `https://xyz.supabase.co` (a trailing slash is trimmed).
    pub fn new(base_url: &str, service_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    fn url(&self, procedure: Procedure) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, procedure.name())
    }
}

#[async_trait]
impl RpcBackend for PostgrestClient {
    async fn call(&self, procedure: Procedure, params: Value) -> Result<Value, RpcError> {
        let url = self.url(procedure);

        info!(%procedure, "calling rpc");
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%procedure, status = status.as_u16(), "rpc failed");
            return Err(RpcError::Remote {
                procedure,
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| RpcError::Remote {
            procedure,
            status: status.as_u16(),
            body: format!("invalid JSON body: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_targets_rpc_path() {
        let client = PostgrestClient::new("https://db.example.com/", "key");
        assert_eq!(
            client.url(Procedure::ScanItem),
            "https://db.example.com/rest/v1/rpc/scan_dispatch_item"
        );
    }

    #[test]
    fn remote_error_text_matches_relay_contract() {
        let err = RpcError::Remote {
            procedure: Procedure::UnscanItem,
            status: 503,
            body: "upstream down".into(),
        };
        assert_eq!(
            err.to_string(),
            "RPC unscan_dispatch_item failed: 503 upstream down"
        );
    }
}
