//! HTTP client for the dispatch relay.

use async_trait::async_trait;
use dispatch_core::{
    ActionResponse, DispatchMeta, ErrorBody, FinalizeRequest, FinalizeResponse, ItemRequest,
    ItemRow, MessageResponse, MetaResponse, RowsResponse, rows_from_value_lossy,
};
use reqwest::Url;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{ApiError, DispatchApi};

pub struct RelayClient {
    client: reqwest::Client,
    base_url: Url,
}

impl RelayClient {
    /// `base_url` is like `http://127.0.0.1:8787`; a trailing slash is ignored.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let invalid = |message: String| ApiError::InvalidUrl {
            url: base_url.to_string(),
            message,
        };
        let url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(invalid("not an http base URL".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: url,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub async fn ping(&self) -> Result<MessageResponse, ApiError> {
        self.get(self.endpoint(["api", "ping"]), &[]).await
    }

    /// Base URL plus `segments`, each percent-encoded as one path segment.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        debug!(url = %url, "GET relay");
        let resp = self.client.get(url).query(query).send().await?;
        decode(resp).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(url = %url, "POST relay");
        let resp = self.client.post(url).json(body).send().await?;
        decode(resp).await
    }

    async fn item_action(
        &self,
        path: &str,
        dispatch_id: &str,
        barcode: &str,
    ) -> Result<ActionResponse, ApiError> {
        let body = ItemRequest {
            dispatch_id: dispatch_id.to_string(),
            barcode: barcode.to_string(),
        };
        let resp: ActionResponse = self.post(self.endpoint(["api", path]), &body).await?;
        info!(action = path, barcode, ok = resp.ok, msg = %resp.msg, "relay answered");
        Ok(resp)
    }
}

/// Non-2xx responses become [`ApiError::Relay`] carrying the relay's own
/// message when the body is an [`ErrorBody`], else the raw text.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.text().to_string(),
            Err(_) if text.trim().is_empty() => status.to_string(),
            Err(_) => text,
        };
        return Err(ApiError::Relay {
            status: status.as_u16(),
            message,
        });
    }
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl DispatchApi for RelayClient {
    async fn meta(&self, dispatch_id: &str) -> Result<DispatchMeta, ApiError> {
        let url = self.endpoint(["api", "dispatch", dispatch_id, "meta"]);
        let resp: MetaResponse = self.get(url, &[]).await?;
        Ok(resp.meta)
    }

    async fn items(&self, dispatch_id: &str) -> Result<Vec<ItemRow>, ApiError> {
        let url = self.endpoint(["api", "dispatch", dispatch_id, "items"]);
        let resp: RowsResponse = self.get(url, &[]).await?;
        Ok(resp.rows)
    }

    /// Scan-list rows come through unvalidated; rows without a barcode are
    /// left out.
    async fn list(&self, dispatch_id: &str) -> Result<Vec<ItemRow>, ApiError> {
        let url = self.endpoint(["api", "list"]);
        let resp: RowsResponse<Value> = self.get(url, &[("dispatch_id", dispatch_id)]).await?;
        let (rows, skipped) = rows_from_value_lossy(Value::Array(resp.rows));
        if !skipped.is_empty() {
            warn!(dispatch_id, skipped = skipped.len(), "scan list rows without a barcode");
        }
        Ok(rows)
    }

    async fn scan(&self, dispatch_id: &str, barcode: &str) -> Result<ActionResponse, ApiError> {
        self.item_action("scan", dispatch_id, barcode).await
    }

    async fn unscan(&self, dispatch_id: &str, barcode: &str) -> Result<ActionResponse, ApiError> {
        self.item_action("unscan", dispatch_id, barcode).await
    }

    async fn return_item(
        &self,
        dispatch_id: &str,
        barcode: &str,
    ) -> Result<ActionResponse, ApiError> {
        self.item_action("return", dispatch_id, barcode).await
    }

    async fn finalize(
        &self,
        dispatch_id: &str,
        dispatch_date: &str,
    ) -> Result<FinalizeResponse, ApiError> {
        let body = FinalizeRequest {
            dispatch_id: dispatch_id.to_string(),
            dispatch_date: dispatch_date.to_string(),
        };
        info!(dispatch_id, dispatch_date, "finalizing dispatch");
        self.post(self.endpoint(["api", "finalize"]), &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relay_client_trims_trailing_slash() {
        let client = RelayClient::new("http://localhost:8787/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8787");
        let url = client.endpoint(["api", "ping"]);
        assert_eq!(url.as_str(), "http://localhost:8787/api/ping");
    }

    #[test]
    fn dispatch_id_is_one_path_segment() {
        let client = RelayClient::new("http://localhost:8787").unwrap();
        let url = client.endpoint(["api", "dispatch", "D 1/x?#", "meta"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8787/api/dispatch/D%201%2Fx%3F%23/meta"
        );
        assert_eq!(url.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn base_path_is_kept() {
        let client = RelayClient::new("https://edge.example/relay/").unwrap();
        let url = client.endpoint(["api", "list"]);
        assert_eq!(url.as_str(), "https://edge.example/relay/api/list");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            RelayClient::new("not a url"),
            Err(ApiError::InvalidUrl { .. })
        ));
        assert!(RelayClient::new("mailto:ops@example.com").is_err());
    }

    #[test]
    fn action_response_parses_relay_shape() {
        let body = json!({
            "ok": true,
            "msg": "Reserved",
            "item": {"was_inserted": true, "sku_code": "SKU1", "brand": "Acme"},
            "rows": [{"was_inserted": true, "sku_code": "SKU1"}]
        });
        let resp: ActionResponse = serde_json::from_value(body).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.sku_code(), Some("SKU1"));
        assert_eq!(resp.brand(), Some("Acme"));
    }

    #[test]
    fn nothing_to_remove_parses_with_null_item() {
        let body = json!({"ok": false, "msg": "Nothing to remove", "item": null, "rows": []});
        let resp: ActionResponse = serde_json::from_value(body).unwrap();
        assert!(!resp.ok);
        assert!(resp.item.is_none());
    }

    #[test]
    fn relay_error_display() {
        let err = ApiError::Relay {
            status: 500,
            message: "RPC scan_dispatch_item failed: 503 upstream down".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 500: RPC scan_dispatch_item failed: 503 upstream down"
        );
    }
}
