//! Spreadsheet export built from the mirror alone.
//!
//! Sheets: `Summary` (one row per SKU plus a `TOTAL` row), `Details` (one row
//! per reserved barcode), and `Returned Items` when anything was returned.

use std::path::Path;

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use thiserror::Error;
use tracing::info;

use crate::mirror::Mirror;

pub const SUMMARY_SHEET: &str = "Summary";
pub const DETAILS_SHEET: &str = "Details";
pub const RETURNED_SHEET: &str = "Returned Items";
pub const TOTAL_LABEL: &str = "TOTAL";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
}

/// `dispatch_{id}_{YYYY-MM-DD}.xlsx`
pub fn default_file_name(dispatch_id: &str, date: NaiveDate) -> String {
    format!("dispatch_{dispatch_id}_{}.xlsx", date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub sku: String,
    pub brand: Option<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRow {
    pub sku: String,
    pub barcode: String,
    pub brand: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnedRow {
    pub barcode: String,
    pub sku: Option<String>,
    pub brand: Option<String>,
}

/// Workbook contents, separate from the file format so they can be checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportBook {
    pub summary: Vec<SummaryRow>,
    pub details: Vec<DetailRow>,
    pub returned: Vec<ReturnedRow>,
}

impl ExportBook {
    pub fn from_mirror(mirror: &Mirror) -> Self {
        let brands = mirror.brands();
        let mut book = Self::default();
        for (sku, barcodes) in mirror.skus().iter() {
            book.summary.push(SummaryRow {
                sku: sku.to_string(),
                brand: brands.sku_brand(sku).map(str::to_string),
                count: barcodes.len(),
            });
            for barcode in barcodes {
                book.details.push(DetailRow {
                    sku: sku.to_string(),
                    barcode: barcode.clone(),
                    brand: brands.brand_for(barcode, sku).map(str::to_string),
                });
            }
        }
        book.returned = mirror
            .returned()
            .iter()
            .map(|row| ReturnedRow {
                barcode: row.barcode.clone(),
                sku: row.sku_code.clone(),
                brand: row.brand.clone(),
            })
            .collect();
        book
    }

    /// Value of the `TOTAL` row.
    pub fn total(&self) -> usize {
        self.summary.iter().map(|r| r.count).sum()
    }

    pub fn to_workbook(&self) -> Result<Workbook, ExportError> {
        let header = Format::new().set_bold();
        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet();
        sheet.set_name(SUMMARY_SHEET)?;
        write_header(sheet, &["SKU", "Brand", "Count"], &header)?;
        let mut row = 1;
        for entry in &self.summary {
            sheet.write_string(row, 0, &entry.sku)?;
            sheet.write_string(row, 1, entry.brand.as_deref().unwrap_or_default())?;
            sheet.write_number(row, 2, entry.count as f64)?;
            row += 1;
        }
        sheet.write_string_with_format(row, 0, TOTAL_LABEL, &header)?;
        sheet.write_number_with_format(row, 2, self.total() as f64, &header)?;

        let sheet = workbook.add_worksheet();
        sheet.set_name(DETAILS_SHEET)?;
        write_header(sheet, &["SKU", "Barcode", "Brand"], &header)?;
        for (i, entry) in self.details.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_string(row, 0, &entry.sku)?;
            sheet.write_string(row, 1, &entry.barcode)?;
            sheet.write_string(row, 2, entry.brand.as_deref().unwrap_or_default())?;
        }

        if !self.returned.is_empty() {
            let sheet = workbook.add_worksheet();
            sheet.set_name(RETURNED_SHEET)?;
            write_header(sheet, &["Barcode", "SKU", "Brand"], &header)?;
            for (i, entry) in self.returned.iter().enumerate() {
                let row = i as u32 + 1;
                sheet.write_string(row, 0, &entry.barcode)?;
                sheet.write_string(row, 1, entry.sku.as_deref().unwrap_or_default())?;
                sheet.write_string(row, 2, entry.brand.as_deref().unwrap_or_default())?;
            }
        }

        Ok(workbook)
    }

    pub fn write_xlsx(&self, path: &Path) -> Result<(), ExportError> {
        let mut workbook = self.to_workbook()?;
        workbook.save(path)?;
        info!(
            path = %path.display(),
            skus = self.summary.len(),
            items = self.details.len(),
            returned = self.returned.len(),
            "workbook written"
        );
        Ok(())
    }
}

fn write_header(sheet: &mut Worksheet, titles: &[&str], format: &Format) -> Result<(), XlsxError> {
    for (col, title) in titles.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, format)?;
        sheet.set_column_width(col as u16, 18)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::ItemRow;
    use std::collections::HashSet;

    fn mirror() -> Mirror {
        let mut returned = ItemRow::new("R1", Some("SKU3"), Some("Zeta"));
        returned.returned = true;
        Mirror::from_rows(&[
            ItemRow::new("A1", Some("SKU1"), Some("Acme")),
            ItemRow::new("A2", Some("SKU1"), None),
            ItemRow::new("B1", Some("SKU2"), Some("Bolt")),
            ItemRow::new("C1", None, None),
            returned,
        ])
    }

    #[test]
    fn total_matches_details() {
        let book = ExportBook::from_mirror(&mirror());
        assert_eq!(book.total(), book.details.len());
        assert_eq!(book.total(), 4);
        for summary in &book.summary {
            let detail_count = book.details.iter().filter(|d| d.sku == summary.sku).count();
            assert_eq!(summary.count, detail_count);
        }
    }

    #[test]
    fn every_barcode_once_in_details() {
        let mirror = mirror();
        let book = ExportBook::from_mirror(&mirror);
        let barcodes: HashSet<_> = book.details.iter().map(|d| d.barcode.as_str()).collect();
        assert_eq!(barcodes.len(), book.details.len());
        assert_eq!(barcodes.len(), mirror.skus().total());
        assert!(!barcodes.contains("R1"));
    }

    #[test]
    fn brands_fall_back_to_sku_brand() {
        let book = ExportBook::from_mirror(&mirror());
        let a2 = book.details.iter().find(|d| d.barcode == "A2").unwrap();
        assert_eq!(a2.brand.as_deref(), Some("Acme"));
        let unknown = book.summary.iter().find(|s| s.sku == "UNKNOWN").unwrap();
        assert_eq!(unknown.brand, None);
        assert_eq!(book.returned.len(), 1);
        assert_eq!(book.returned[0].sku.as_deref(), Some("SKU3"));
    }

    #[test]
    fn summary_is_in_sku_order() {
        let book = ExportBook::from_mirror(&mirror());
        let skus: Vec<_> = book.summary.iter().map(|s| s.sku.as_str()).collect();
        assert_eq!(skus, vec!["SKU1", "SKU2", "UNKNOWN"]);
    }

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(default_file_name("D42", date), "dispatch_D42_2025-03-07.xlsx");
    }

    #[test]
    fn workbook_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        ExportBook::from_mirror(&mirror()).write_xlsx(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn empty_mirror_still_exports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let book = ExportBook::from_mirror(&Mirror::default());
        assert_eq!(book.total(), 0);
        book.write_xlsx(&path).unwrap();
        assert!(path.exists());
    }
}
