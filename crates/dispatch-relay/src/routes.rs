use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use dispatch_core::{
    ActionResponse, DispatchMeta, FinalizeResponse, ItemRow, MessageResponse, MetaResponse,
    Procedure, RowsResponse, ScanRow, rows_from_value, rows_from_value_lossy, wire::FINALIZE_MSG,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::{error::RelayError, rpc::RpcBackend};

/// Shared by every handler. Holds no per-request state.
pub struct RelayState {
    rpc: Arc<dyn RpcBackend>,
}

impl RelayState {
    pub fn new(rpc: Arc<dyn RpcBackend>) -> Arc<Self> {
        Arc::new(Self { rpc })
    }

    async fn call_raw(&self, procedure: Procedure, params: Value) -> Result<Value, RelayError> {
        Ok(self.rpc.call(procedure, params).await?)
    }

    async fn call_rows<T: DeserializeOwned>(
        &self,
        procedure: Procedure,
        params: Value,
    ) -> Result<Vec<T>, RelayError> {
        let value = self.call_raw(procedure, params).await?;
        rows_from_value(value).map_err(|source| RelayError::Shape { procedure, source })
    }
}

/// Named fields of a JSON request body.
///
/// A body that is not a JSON object reads as empty, so it fails field
/// validation rather than JSON extraction.
struct RequestFields(Map<String, Value>);

impl RequestFields {
    fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self(Map::new()),
        }
    }

    /// Present means a non-empty string or a non-zero number. Numbers keep
    /// their JSON text.
    fn get(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            _ => None,
        }
    }

    fn item(&self) -> Result<(String, String), RelayError> {
        match (self.get("dispatch_id"), self.get("barcode")) {
            (Some(dispatch_id), Some(barcode)) => Ok((dispatch_id, barcode)),
            _ => Err(RelayError::BadRequest("dispatch_id and barcode required")),
        }
    }
}

fn item_params(dispatch_id: &str, barcode: &str) -> Value {
    json!({ "p_dispatch_id": dispatch_id, "p_barcode": barcode })
}

pub async fn ping() -> Json<MessageResponse> {
    Json(MessageResponse::ready())
}

pub async fn scan(
    State(state): State<Arc<RelayState>>,
    body: Bytes,
) -> Result<Json<ActionResponse>, RelayError> {
    let (dispatch_id, barcode) = RequestFields::parse(&body).item()?;
    let rows: Vec<ScanRow> = state
        .call_rows(Procedure::ScanItem, item_params(&dispatch_id, &barcode))
        .await?;

    ActionResponse::from_scan_rows(rows)
        .map(Json)
        .ok_or(RelayError::NotFound)
}

pub async fn unscan(
    State(state): State<Arc<RelayState>>,
    body: Bytes,
) -> Result<Json<ActionResponse>, RelayError> {
    let (dispatch_id, barcode) = RequestFields::parse(&body).item()?;
    let rows: Vec<ScanRow> = state
        .call_rows(Procedure::UnscanItem, item_params(&dispatch_id, &barcode))
        .await?;

    Ok(Json(ActionResponse::from_unscan_rows(rows)))
}

pub async fn return_item(
    State(state): State<Arc<RelayState>>,
    body: Bytes,
) -> Result<Json<ActionResponse>, RelayError> {
    let (dispatch_id, barcode) = RequestFields::parse(&body).item()?;
    let rows: Vec<ScanRow> = state
        .call_rows(Procedure::ReturnItem, item_params(&dispatch_id, &barcode))
        .await?;

    ActionResponse::from_return_rows(rows)
        .map(Json)
        .ok_or(RelayError::NotFound)
}

#[derive(Deserialize)]
pub struct ListQuery {
    dispatch_id: Option<String>,
}

pub async fn list(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RowsResponse<Value>>, RelayError> {
    let Some(dispatch_id) = query.dispatch_id.filter(|id| !id.is_empty()) else {
        return Err(RelayError::BadRequest("dispatch_id required"));
    };
    let rows: Vec<Value> = state
        .call_rows(Procedure::ListScans, json!({ "p_dispatch_id": dispatch_id }))
        .await?;

    Ok(Json(RowsResponse { ok: true, rows }))
}

pub async fn finalize(
    State(state): State<Arc<RelayState>>,
    body: Bytes,
) -> Result<Json<FinalizeResponse>, RelayError> {
    let fields = RequestFields::parse(&body);
    let (Some(dispatch_id), Some(dispatch_date)) =
        (fields.get("dispatch_id"), fields.get("dispatch_date"))
    else {
        return Err(RelayError::BadRequest(
            "dispatch_id and dispatch_date required",
        ));
    };

    let data = state
        .call_raw(
            Procedure::Finalize,
            json!({ "p_dispatch_id": dispatch_id, "p_dispatch_date": dispatch_date }),
        )
        .await?;

    Ok(Json(FinalizeResponse {
        ok: true,
        msg: FINALIZE_MSG.to_string(),
        data,
    }))
}

pub async fn meta(
    State(state): State<Arc<RelayState>>,
    Path(dispatch_id): Path<String>,
) -> Result<Json<MetaResponse>, RelayError> {
    let rows: Vec<DispatchMeta> = state
        .call_rows(Procedure::Meta, json!({ "p_dispatch_id": dispatch_id }))
        .await?;
    let meta = rows.into_iter().next().ok_or(RelayError::NotFound)?;

    Ok(Json(MetaResponse { ok: true, meta }))
}

pub async fn items(
    State(state): State<Arc<RelayState>>,
    Path(dispatch_id): Path<String>,
) -> Result<Json<RowsResponse>, RelayError> {
    let value = state
        .call_raw(Procedure::ListItems, json!({ "p_dispatch_id": &dispatch_id }))
        .await?;
    let (rows, skipped) = rows_from_value_lossy::<ItemRow>(value);
    if let Some(first) = skipped.first() {
        warn!(
            dispatch_id = %dispatch_id,
            skipped = skipped.len(),
            error = %first,
            "dropped undecodable item rows"
        );
    }

    Ok(Json(RowsResponse { ok: true, rows }))
}
