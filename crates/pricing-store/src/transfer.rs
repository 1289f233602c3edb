//! Export and import of the price table as a portable JSON document.

use crate::error::{ImportError, StoreError};
use chrono::NaiveDate;
use pricing_core::{Overlay, PriceTable};
use serde_json::Value;

/// Pretty-printed category/key/value tree, without envelope metadata.
pub fn export_table(table: &PriceTable) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec_pretty(table).map_err(|e| StoreError::Encode(e.to_string()))
}

/// Descriptive file name for an export taken on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("adu-pricing-{}.json", date.format("%Y-%m-%d"))
}

/// Parse an exported document (or a stored envelope) and overlay it onto
/// the defaults. Only unparseable input is an error.
pub fn import_table(bytes: &[u8]) -> Result<Overlay, ImportError> {
    let doc: Value =
        serde_json::from_slice(bytes).map_err(|e| ImportError::Parse(e.to_string()))?;
    let Value::Object(fields) = &doc else {
        return Err(ImportError::Parse(
            "expected a JSON object of price categories".to_string(),
        ));
    };
    let tree = match (fields.get("schemaVersion"), fields.get("data")) {
        (Some(_), Some(data)) => data,
        _ => &doc,
    };
    Ok(PriceTable::overlay(tree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricing_core::{HvacSystem, Setting};
    use rust_decimal::Decimal;

    #[test]
    fn export_is_the_bare_tree() {
        let bytes = export_table(&PriceTable::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\n"));
        assert!(text.contains("\"basePrices\""));
        assert!(!text.contains("schemaVersion"));
    }

    #[test]
    fn file_name_carries_date() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(export_file_name(d), "adu-pricing-2026-10-18.json");
    }

    #[test]
    fn envelope_is_unwrapped() {
        let doc = br#"{
            "schemaVersion": "adu-pricing/1",
            "lastUpdated": "2024-01-01T00:00:00Z",
            "data": { "hvac": { "miniSplit": 7100 } }
        }"#;
        let o = import_table(doc).unwrap();
        assert_eq!(o.table.hvac[&HvacSystem::MiniSplit], Decimal::new(7_100, 0));
        assert!(o.ignored.is_empty(), "{:?}", o.ignored);
    }

    #[test]
    fn partial_documents_fill_from_defaults() {
        let o = import_table(br#"{"settings": {"salesTax": 0.0825}}"#).unwrap();
        let mut expected = PriceTable::default();
        expected
            .settings
            .insert(Setting::SalesTax, Decimal::new(825, 4));
        assert_eq!(o.table, expected);
    }

    #[test]
    fn unparseable_input_fails() {
        assert!(matches!(import_table(b"{ nope"), Err(ImportError::Parse(_))));
        assert!(matches!(import_table(b"[1, 2]"), Err(ImportError::Parse(_))));
        assert!(matches!(import_table(b""), Err(ImportError::Parse(_))));
    }
}
