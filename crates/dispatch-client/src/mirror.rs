//! Local mirror of what is scanned for one dispatch.
//!
//! The mirror is never authoritative. It is rebuilt wholesale from the item
//! list on every reload and only patched in between by single optimistic
//! inserts or removals.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use dispatch_core::ItemRow;

/// Number of log entries shown to the operator.
pub const RECENT_LIMIT: usize = 30;

/// SKU bucket for barcodes the backend reported without a SKU.
pub const UNKNOWN_SKU: &str = "UNKNOWN";

/// Message recorded for rows that arrive through a reload.
pub const RESERVED_MSG: &str = "Reserved";

/// One user-visible scan attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub barcode: String,
    pub accepted: bool,
    pub message: String,
    pub sku_code: Option<String>,
}

impl ScanEntry {
    pub fn accepted(barcode: &str, sku_code: Option<&str>, message: &str) -> Self {
        Self {
            barcode: barcode.to_string(),
            accepted: true,
            message: message.to_string(),
            sku_code: sku_code.map(str::to_string),
        }
    }

    pub fn failed(barcode: &str, message: &str) -> Self {
        Self {
            barcode: barcode.to_string(),
            accepted: false,
            message: message.to_string(),
            sku_code: None,
        }
    }

    /// One-line operator feedback, e.g. `✅ A100 reserved · SKU1`.
    pub fn feedback(&self) -> String {
        match (self.accepted, self.sku_code.as_deref()) {
            (true, Some(sku)) => format!("✅ {} reserved · {sku}", self.barcode),
            (true, None) => format!("✅ {} reserved", self.barcode),
            (false, _) => format!("❌ {} · {}", self.barcode, self.message),
        }
    }
}

fn sku_key(sku_code: Option<&str>) -> &str {
    match sku_code.map(str::trim) {
        Some(sku) if !sku.is_empty() => sku,
        _ => UNKNOWN_SKU,
    }
}

/// SKU → reserved barcodes. Counts are always the set sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkuAggregates {
    by_sku: BTreeMap<String, BTreeSet<String>>,
}

impl SkuAggregates {
    /// Returns `true` if the barcode was not already reserved under `sku`.
    /// A barcode lives under one SKU only, so it leaves any other bucket.
    pub fn insert(&mut self, sku: &str, barcode: &str) -> bool {
        if let Some(current) = self.sku_of(barcode)
            && current != sku
        {
            let current = current.to_string();
            self.remove_from(&current, barcode);
        }
        self.by_sku
            .entry(sku.to_string())
            .or_default()
            .insert(barcode.to_string())
    }

    /// Remove a barcode wherever it is. Returns the SKU it was under.
    pub fn remove(&mut self, barcode: &str) -> Option<String> {
        let sku = self.sku_of(barcode)?.to_string();
        self.remove_from(&sku, barcode);
        Some(sku)
    }

    fn remove_from(&mut self, sku: &str, barcode: &str) {
        if let Some(set) = self.by_sku.get_mut(sku) {
            set.remove(barcode);
            if set.is_empty() {
                self.by_sku.remove(sku);
            }
        }
    }

    pub fn sku_of(&self, barcode: &str) -> Option<&str> {
        self.by_sku
            .iter()
            .find(|(_, set)| set.contains(barcode))
            .map(|(sku, _)| sku.as_str())
    }

    pub fn count(&self, sku: &str) -> usize {
        self.by_sku.get(sku).map_or(0, BTreeSet::len)
    }

    pub fn total(&self) -> usize {
        self.by_sku.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sku.is_empty()
    }

    pub fn contains(&self, barcode: &str) -> bool {
        self.sku_of(barcode).is_some()
    }

    /// In SKU order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.by_sku.iter().map(|(sku, set)| (sku.as_str(), set))
    }
}

/// Display-only brand lookups. Never sent back to the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandAnnotations {
    by_barcode: HashMap<String, String>,
    by_sku: HashMap<String, String>,
}

impl BrandAnnotations {
    pub fn upsert(&mut self, barcode: &str, sku: &str, brand: Option<&str>) {
        let Some(brand) = brand.map(str::trim).filter(|b| !b.is_empty()) else {
            return;
        };
        self.by_barcode.insert(barcode.to_string(), brand.to_string());
        self.by_sku.insert(sku.to_string(), brand.to_string());
    }

    /// Per-barcode brand, falling back to the SKU's brand.
    pub fn brand_for(&self, barcode: &str, sku: &str) -> Option<&str> {
        self.by_barcode
            .get(barcode)
            .or_else(|| self.by_sku.get(sku))
            .map(String::as_str)
    }

    pub fn sku_brand(&self, sku: &str) -> Option<&str> {
        self.by_sku.get(sku).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_barcode.is_empty() && self.by_sku.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mirror {
    log: Vec<ScanEntry>,
    skus: SkuAggregates,
    brands: BrandAnnotations,
    returned: Vec<ItemRow>,
}

impl Mirror {
    /// Build the mirror exactly from one item list.
    pub fn from_rows(rows: &[ItemRow]) -> Self {
        let mut mirror = Self::default();
        for row in rows {
            let sku = sku_key(row.sku_code.as_deref());
            mirror.brands.upsert(&row.barcode, sku, row.brand.as_deref());
            if row.returned {
                mirror.returned.push(row.clone());
                continue;
            }
            mirror.skus.insert(sku, &row.barcode);
            mirror.log.push(ScanEntry::accepted(
                &row.barcode,
                Some(sku),
                RESERVED_MSG,
            ));
        }
        mirror
    }

    /// Full overwrite. Nothing from before survives.
    pub fn replace(&mut self, rows: &[ItemRow]) {
        *self = Self::from_rows(rows);
    }

    /// Optimistic reservation. Returns `true` if the SKU count grew.
    pub fn apply_reserved(
        &mut self,
        barcode: &str,
        sku_code: Option<&str>,
        brand: Option<&str>,
        message: &str,
    ) -> bool {
        let sku = sku_key(sku_code);
        self.log.push(ScanEntry::accepted(barcode, Some(sku), message));
        self.brands.upsert(barcode, sku, brand);
        self.skus.insert(sku, barcode)
    }

    /// Record a rejected attempt. Aggregates and brands are untouched.
    pub fn apply_failure(&mut self, barcode: &str, reason: &str) {
        self.log.push(ScanEntry::failed(barcode, reason));
    }

    /// Optimistic release. Returns the SKU the barcode was under.
    pub fn apply_removed(&mut self, barcode: &str) -> Option<String> {
        self.skus.remove(barcode)
    }

    /// Optimistic return: the barcode leaves its SKU and joins the returned list.
    pub fn apply_returned(&mut self, barcode: &str) {
        let sku = self.skus.remove(barcode);
        if self.returned.iter().any(|r| r.barcode == barcode) {
            return;
        }
        let brand = sku
            .as_deref()
            .and_then(|sku| self.brands.brand_for(barcode, sku));
        let mut row = ItemRow::new(barcode, sku.as_deref(), brand);
        row.returned = true;
        self.returned.push(row);
    }

    pub fn log(&self) -> &[ScanEntry] {
        &self.log
    }

    /// The last [`RECENT_LIMIT`] entries, oldest first.
    pub fn recent(&self) -> &[ScanEntry] {
        let start = self.log.len().saturating_sub(RECENT_LIMIT);
        &self.log[start..]
    }

    pub fn skus(&self) -> &SkuAggregates {
        &self.skus
    }

    pub fn brands(&self) -> &BrandAnnotations {
        &self.brands
    }

    pub fn returned(&self) -> &[ItemRow] {
        &self.returned
    }
}
