//! JSON bodies exchanged between the scanning station and the relay.
//!
//! Every response carries an `ok` flag. Item actions (scan, unscan, return)
//! share [`ActionResponse`]; the relay decides `ok` and `msg` from a tagged
//! outcome so clients never inspect raw procedure rows to find out what
//! happened.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rows::{DispatchMeta, ItemRow, ScanRow, scalar_text};

pub const READY_MSG: &str = "Dispatch Worker ready";
pub const FINALIZE_MSG: &str = "Finalize complete";
pub const NO_ROW_MSG: &str = "No row returned";

/// Body of `POST /api/scan`, `/api/unscan` and `/api/return`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub dispatch_id: String,
    pub barcode: String,
}

/// Body of `POST /api/finalize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub dispatch_id: String,
    /// `YYYY-MM-DD`.
    pub dispatch_date: String,
}

/// `{ok, msg}` used by ping and the default route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub ok: bool,
    pub msg: String,
}

impl MessageResponse {
    pub fn ready() -> Self {
        Self {
            ok: true,
            msg: READY_MSG.to_string(),
        }
    }
}

/// Response to scan, unscan and return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub msg: String,
    #[serde(default)]
    pub item: Option<ScanRow>,
    #[serde(default)]
    pub rows: Vec<ScanRow>,
}

impl ActionResponse {
    /// `None` when the reserve procedure returned no row at all.
    pub fn from_scan_rows(rows: Vec<ScanRow>) -> Option<Self> {
        let item = rows.first()?.clone();
        let outcome = ScanOutcome::from_row(&item);
        Some(Self {
            ok: outcome.is_reserved(),
            msg: outcome.message(),
            item: Some(item),
            rows,
        })
    }

    pub fn from_unscan_rows(rows: Vec<ScanRow>) -> Self {
        let item = rows.first().cloned();
        let outcome = UnscanOutcome::from_row(item.as_ref());
        Self {
            ok: outcome.is_removed(),
            msg: outcome.message().to_string(),
            item,
            rows,
        }
    }

    pub fn from_return_rows(rows: Vec<ScanRow>) -> Option<Self> {
        let item = rows.first()?.clone();
        let outcome = ReturnOutcome::from_row(&item);
        Some(Self {
            ok: outcome == ReturnOutcome::Returned,
            msg: outcome.message().to_string(),
            item: Some(item),
            rows,
        })
    }

    /// SKU reported by the procedure for the affected item.
    pub fn sku_code(&self) -> Option<&str> {
        self.item.as_ref().and_then(|i| i.sku_code.as_deref())
    }

    pub fn brand(&self) -> Option<&str> {
        self.item.as_ref().and_then(|i| i.brand.as_deref())
    }
}

/// `{ok, rows}` for the item list, and with raw rows for the scan list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowsResponse<T = ItemRow> {
    pub ok: bool,
    #[serde(default = "Vec::new")]
    pub rows: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaResponse {
    pub ok: bool,
    pub meta: DispatchMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub ok: bool,
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    NotFound,
    ServerError,
}

/// Body of every 4xx/5xx response from the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            code: ErrorCode::BadRequest,
            msg: Some(msg.into()),
            error: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            ok: false,
            code: ErrorCode::NotFound,
            msg: Some(NO_ROW_MSG.to_string()),
            error: None,
        }
    }

    pub fn server_error(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            code: ErrorCode::ServerError,
            msg: None,
            error: Some(error.into()),
        }
    }

    /// The human-readable part, whichever field carries it.
    pub fn text(&self) -> &str {
        self.msg
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("request failed")
    }
}

/// What the reserve procedure decided for a barcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Reserved,
    Ineligible {
        inventory_status: Option<String>,
        batch_rank: Option<String>,
    },
}

impl ScanOutcome {
    pub fn from_row(row: &ScanRow) -> Self {
        if row.was_inserted {
            ScanOutcome::Reserved
        } else {
            ScanOutcome::Ineligible {
                inventory_status: row.inventory_status.clone(),
                batch_rank: row.batch_rank.as_ref().and_then(scalar_text),
            }
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, ScanOutcome::Reserved)
    }

    pub fn message(&self) -> String {
        match self {
            ScanOutcome::Reserved => "Reserved".to_string(),
            ScanOutcome::Ineligible {
                inventory_status,
                batch_rank,
            } => {
                let status = inventory_status.as_deref().unwrap_or("N/A");
                let rank = batch_rank.as_deref().unwrap_or("N/A");
                format!("Not eligible: {status} (rank {rank})")
            }
        }
    }
}

/// What the release procedure did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnscanOutcome {
    Removed { reverted: bool },
    NothingToRemove,
}

impl UnscanOutcome {
    pub fn from_row(row: Option<&ScanRow>) -> Self {
        match row {
            Some(row) if row.removed => UnscanOutcome::Removed {
                reverted: row.reverted,
            },
            _ => UnscanOutcome::NothingToRemove,
        }
    }

    pub fn is_removed(self) -> bool {
        matches!(self, UnscanOutcome::Removed { .. })
    }

    pub fn message(self) -> &'static str {
        match self {
            UnscanOutcome::Removed { reverted: true } => "Removed and reverted to Available",
            UnscanOutcome::Removed { reverted: false } => "Removed",
            UnscanOutcome::NothingToRemove => "Nothing to remove",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    Returned,
    NotReturnable,
}

impl ReturnOutcome {
    pub fn from_row(row: &ScanRow) -> Self {
        if row.returned {
            ReturnOutcome::Returned
        } else {
            ReturnOutcome::NotReturnable
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ReturnOutcome::Returned => "Returned",
            ReturnOutcome::NotReturnable => "Not returnable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> ScanRow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn scan_reserved_when_inserted() {
        let resp = ActionResponse::from_scan_rows(vec![row(json!({
            "was_inserted": true,
            "sku_code": "SKU1"
        }))])
        .unwrap();
        assert!(resp.ok);
        assert_eq!(resp.msg, "Reserved");
        assert_eq!(resp.sku_code(), Some("SKU1"));
        assert_eq!(resp.rows.len(), 1);
    }

    #[test]
    fn scan_ineligible_message_includes_status_and_rank() {
        let resp = ActionResponse::from_scan_rows(vec![row(json!({
            "was_inserted": false,
            "inventory_status": "hold",
            "batch_rank": 3
        }))])
        .unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.msg, "Not eligible: hold (rank 3)");
    }

    #[test]
    fn scan_ineligible_with_odd_column_types() {
        let resp = ActionResponse::from_scan_rows(vec![row(json!({
            "was_inserted": null,
            "inventory_status": "hold",
            "batch_rank": "3"
        }))])
        .unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.msg, "Not eligible: hold (rank 3)");
        assert_eq!(resp.rows[0].batch_rank, Some(json!("3")));
    }

    #[test]
    fn scan_ineligible_without_details() {
        let outcome = ScanOutcome::from_row(&ScanRow::default());
        assert_eq!(outcome.message(), "Not eligible: N/A (rank N/A)");
    }

    #[test]
    fn scan_without_rows_is_none() {
        assert!(ActionResponse::from_scan_rows(Vec::new()).is_none());
    }

    #[test]
    fn unscan_messages() {
        let removed = ActionResponse::from_unscan_rows(vec![row(json!({"removed": true}))]);
        assert!(removed.ok);
        assert_eq!(removed.msg, "Removed");

        let reverted = ActionResponse::from_unscan_rows(vec![row(json!({
            "removed": true,
            "reverted": true
        }))]);
        assert_eq!(reverted.msg, "Removed and reverted to Available");

        let nothing = ActionResponse::from_unscan_rows(Vec::new());
        assert!(!nothing.ok);
        assert!(nothing.item.is_none());
        assert_eq!(nothing.msg, "Nothing to remove");
    }

    #[test]
    fn return_messages() {
        let ok = ActionResponse::from_return_rows(vec![row(json!({"returned": true}))]).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.msg, "Returned");
        let no = ActionResponse::from_return_rows(vec![row(json!({}))]).unwrap();
        assert_eq!(no.msg, "Not returnable");
    }

    #[test]
    fn error_body_codes_serialize_screaming() {
        let body = serde_json::to_value(ErrorBody::bad_request("dispatch_id required")).unwrap();
        assert_eq!(body["code"], "BAD_REQUEST");
        assert_eq!(body["ok"], false);
        assert!(body.get("error").is_none());

        let body = serde_json::to_value(ErrorBody::server_error("boom")).unwrap();
        assert_eq!(body["code"], "SERVER_ERROR");
        assert_eq!(body["error"], "boom");
    }

    #[test]
    fn error_body_text_prefers_msg() {
        assert_eq!(ErrorBody::not_found().text(), "No row returned");
        assert_eq!(ErrorBody::server_error("RPC x failed").text(), "RPC x failed");
    }
}
