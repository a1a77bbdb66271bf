//! Row types returned by the dispatch stored procedures.
//!
//! The procedures are owned by the backend database, so every row keeps the
//! fields it does not model in `extra` and re-emits them unchanged. Column
//! types are not trusted: flags read like truthiness checks and text
//! columns accept any scalar.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Status value that leaves a dispatch open for mutation.
pub const STATUS_OPEN: &str = "open";

/// A row returned by the reserve, release and return procedures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub sku_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Set by the reserve procedure when a new reservation row was written.
    #[serde(default, deserialize_with = "lenient::flag")]
    pub was_inserted: bool,
    /// Set by the release procedure when a reservation was deleted.
    #[serde(default, deserialize_with = "lenient::flag")]
    pub removed: bool,
    /// Set alongside `removed` when the item went back to `Available`.
    #[serde(default, deserialize_with = "lenient::flag")]
    pub reverted: bool,
    /// Set by the return procedure when the item was marked returned.
    #[serde(default, deserialize_with = "lenient::flag")]
    pub returned: bool,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub inventory_status: Option<String>,
    /// Kept as sent; only ever displayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_rank: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of the authoritative item list for a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    #[serde(deserialize_with = "lenient::required_text")]
    pub barcode: String,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub sku_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub returned: bool,
    /// ISO 8601 timestamp string.
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub scanned_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemRow {
    pub fn new(barcode: impl Into<String>, sku_code: Option<&str>, brand: Option<&str>) -> Self {
        Self {
            barcode: barcode.into(),
            sku_code: sku_code.map(str::to_string),
            brand: brand.map(str::to_string),
            ..Self::default()
        }
    }
}

/// Dispatch header fields; only `status` drives behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchMeta {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub dispatch_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub dispatch_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DispatchMeta {
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    /// Whether the dispatch still accepts scans, unscans and returns.
    pub fn is_open(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(STATUS_OPEN)
    }
}

/// `null`, `false`, `0` and `""` are false; any other value is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Display text of a column: strings as they are, `null` as `None`, anything
/// else as its JSON text.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer, de::Error};
    use serde_json::Value;

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(super::truthy(&Value::deserialize(d)?))
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(super::scalar_text(&Value::deserialize(d)?))
    }

    pub fn text_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(text(d)?.unwrap_or_default())
    }

    pub fn required_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        text(d)?.ok_or_else(|| D::Error::custom("expected a value, found null"))
    }
}

/// Decode a raw procedure result into typed rows.
///
/// An array decodes row by row, a single object is one row, and `null` is
/// no rows. The first row that fails reports its own error.
pub fn rows_from_value<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, serde_json::Error> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(rows) => rows.into_iter().map(serde_json::from_value).collect(),
        row => serde_json::from_value(row).map(|row| vec![row]),
    }
}

/// Like [`rows_from_value`], but rows that fail to decode are left out and
/// handed back as errors next to the rows that decoded.
pub fn rows_from_value_lossy<T: DeserializeOwned>(
    value: Value,
) -> (Vec<T>, Vec<serde_json::Error>) {
    let rows = match value {
        Value::Null => Vec::new(),
        Value::Array(rows) => rows,
        row => vec![row],
    };
    let mut decoded = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for row in rows {
        match serde_json::from_value(row) {
            Ok(row) => decoded.push(row),
            Err(e) => errors.push(e),
        }
    }
    (decoded, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_becomes_one_row() {
        let rows: Vec<ScanRow> =
            rows_from_value(json!({"was_inserted": true, "sku_code": "SKU1"})).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].was_inserted);
        assert_eq!(rows[0].sku_code.as_deref(), Some("SKU1"));
    }

    #[test]
    fn array_and_null_results() {
        let rows: Vec<ScanRow> =
            rows_from_value(json!([{"removed": true}, {"removed": false}])).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].removed);

        let none: Vec<ScanRow> = rows_from_value(Value::Null).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn unknown_fields_survive_reserialization() {
        let row: ScanRow = serde_json::from_value(json!({
            "barcode": "A100",
            "was_inserted": false,
            "inventory_status": "hold",
            "batch_rank": 3,
            "warehouse": "W2"
        }))
        .unwrap();
        assert_eq!(row.batch_rank, Some(json!(3)));
        let back = serde_json::to_value(&row).unwrap();
        assert_eq!(back["warehouse"], "W2");
        assert_eq!(back["inventory_status"], "hold");
    }

    #[test]
    fn item_row_defaults() {
        let row: ItemRow = serde_json::from_value(json!({"barcode": "B1"})).unwrap();
        assert!(!row.returned);
        assert!(row.sku_code.is_none());
    }

    #[test]
    fn meta_open_status_is_lenient_about_case() {
        assert!(DispatchMeta::with_status("open").is_open());
        assert!(DispatchMeta::with_status(" Open ").is_open());
        assert!(!DispatchMeta::with_status("finalized").is_open());
        assert!(!DispatchMeta::default().is_open());
    }

    #[test]
    fn null_flags_read_false() {
        let row: ScanRow = serde_json::from_value(json!({
            "was_inserted": null,
            "removed": 0,
            "reverted": "",
            "returned": 1,
            "batch_rank": null
        }))
        .unwrap();
        assert!(!row.was_inserted);
        assert!(!row.removed);
        assert!(!row.reverted);
        assert!(row.returned);
        assert!(row.batch_rank.is_none());
    }

    #[test]
    fn scalar_columns_accept_any_type() {
        let row: ScanRow = serde_json::from_value(json!({
            "barcode": 100200,
            "sku_code": "SKU1",
            "inventory_status": null,
            "batch_rank": "3"
        }))
        .unwrap();
        assert_eq!(row.barcode.as_deref(), Some("100200"));
        assert!(row.inventory_status.is_none());
        assert_eq!(row.batch_rank, Some(json!("3")));

        let item: ItemRow = serde_json::from_value(json!({"barcode": 42, "returned": null})).unwrap();
        assert_eq!(item.barcode, "42");
        assert!(!item.returned);

        let meta: DispatchMeta = serde_json::from_value(json!({"status": null})).unwrap();
        assert_eq!(meta.status, "");
    }

    #[test]
    fn row_errors_name_the_field() {
        let err = rows_from_value::<ItemRow>(json!([{"barcode": "A1"}, {"sku_code": "SKU2"}]))
            .unwrap_err();
        assert!(err.to_string().contains("barcode"), "{err}");

        let err = rows_from_value::<ItemRow>(json!([{"barcode": null}])).unwrap_err();
        assert!(err.to_string().contains("null"), "{err}");
    }

    #[test]
    fn lossy_decode_keeps_good_rows() {
        let (rows, errors) = rows_from_value_lossy::<ItemRow>(json!([
            {"barcode": "A100", "sku_code": "SKU1"},
            {"sku_code": "SKU2", "count": 4},
            {"barcode": "A101"}
        ]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].barcode, "A101");
        assert_eq!(errors.len(), 1);

        let (rows, errors) = rows_from_value_lossy::<ItemRow>(Value::Null);
        assert!(rows.is_empty() && errors.is_empty());
    }
}
