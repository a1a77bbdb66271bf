//! Terminal rendering of a scanning session.
//!
//! Renders the status header, the recent scan log and the per-SKU counts
//! as plain text blocks.

use std::fmt::Write;

use dispatch_client::{Mirror, RECENT_LIMIT};
use dispatch_core::DispatchMeta;

const PAD: usize = 24;

// ── Public API ──

pub fn print_status(dispatch_id: &str, meta: Option<&DispatchMeta>, mirror: &Mirror) {
    print!("{}", render_status(dispatch_id, meta, mirror));
}

pub fn print_session(mirror: &Mirror) {
    print!("{}", render_recent(mirror));
    print!("{}", render_skus(mirror));
}

// ── Blocks ──

pub fn render_status(dispatch_id: &str, meta: Option<&DispatchMeta>, mirror: &Mirror) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Dispatch {dispatch_id} ===");
    let status = meta.map_or("unknown", |m| m.status.as_str());
    let _ = writeln!(out, "  {:<PAD$} {status}", "status");
    if let Some(date) = meta.and_then(|m| m.dispatch_date.as_deref()) {
        let _ = writeln!(out, "  {:<PAD$} {date}", "dispatch_date");
    }
    if meta.is_some_and(|m| !m.is_open()) {
        let _ = writeln!(out, "  {:<PAD$} yes", "read_only");
    }
    let _ = writeln!(out, "  {:<PAD$} {}", "reserved", mirror.skus().total());
    let _ = writeln!(out, "  {:<PAD$} {}", "returned", mirror.returned().len());
    out
}

/// Newest entry first, at most [`RECENT_LIMIT`] lines.
pub fn render_recent(mirror: &Mirror) -> String {
    let mut out = String::new();
    let recent = mirror.recent();
    if recent.is_empty() {
        return out;
    }
    let _ = writeln!(out, "Recent (last {RECENT_LIMIT})");
    for entry in recent.iter().rev() {
        let _ = writeln!(out, "  {}", entry.feedback());
    }
    out.push('\n');
    out
}

pub fn render_skus(mirror: &Mirror) -> String {
    let mut out = String::new();
    let skus = mirror.skus();
    if skus.is_empty() {
        out.push_str("No items reserved\n");
        return out;
    }
    let _ = writeln!(out, "{:<PAD$} {:<PAD$} {:>6}", "SKU", "Brand", "Count");
    for (sku, barcodes) in skus.iter() {
        let brand = mirror.brands().sku_brand(sku).unwrap_or("-");
        let _ = writeln!(out, "{sku:<PAD$} {brand:<PAD$} {:>6}", barcodes.len());
    }
    let _ = writeln!(out, "{:<PAD$} {:<PAD$} {:>6}", "TOTAL", "", skus.total());
    out
}
