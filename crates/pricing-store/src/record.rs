//! The envelope a price table is persisted in.

use crate::config::StoreConfig;
use crate::medium::KeyValueStore;
use chrono::{DateTime, Utc};
use pricing_core::PriceTable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Persisted configuration: `{ schemaVersion, data, lastUpdated, updatedBy? }`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub schema_version: String,
    pub data: PriceTable,
    pub last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    schema_version: String,
    data: Value,
    last_updated: DateTime<Utc>,
    #[serde(default)]
    updated_by: Option<String>,
}

/// Outcome of reading a stored envelope.
#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// Same schema; `ignored` lists stored cells the running build does not know.
    Current {
        record: StoredRecord,
        ignored: Vec<String>,
    },
    /// Written by an incompatible build; holds the version found.
    SchemaMismatch(String),
}

/// Parse a stored envelope, overlaying its data onto the defaults.
pub fn decode(text: &str, expected_version: &str) -> Result<Decoded, serde_json::Error> {
    let raw: RawRecord = serde_json::from_str(text)?;
    if raw.schema_version != expected_version {
        return Ok(Decoded::SchemaMismatch(raw.schema_version));
    }
    let overlay = PriceTable::overlay(&raw.data);
    Ok(Decoded::Current {
        record: StoredRecord {
            schema_version: raw.schema_version,
            data: overlay.table,
            last_updated: raw.last_updated,
            updated_by: raw.updated_by,
        },
        ignored: overlay.ignored,
    })
}

/// Read the configured record from `medium`, or `None` when it is absent,
/// unreadable, corrupt or written under another schema version. Cells outside
/// the configured bounds are brought back in range. Never migrates.
pub(crate) fn read(medium: &dyn KeyValueStore, config: &StoreConfig) -> Option<StoredRecord> {
    let key = &config.storage_key;
    let text = match medium.read(key) {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!(key = %key, "no stored price table");
            return None;
        }
        Err(e) => {
            warn!(key = %key, error = %e, "price table unreadable, using defaults");
            return None;
        }
    };
    match decode(&text, &config.schema_version) {
        Ok(Decoded::Current {
            mut record,
            ignored,
        }) => {
            if !ignored.is_empty() {
                warn!(?ignored, "stored price table has entries this build ignores");
            }
            let reset = config.bounds.sanitize(&mut record.data);
            if !reset.is_empty() {
                warn!(?reset, "stored price table had out-of-range entries, reset them");
            }
            Some(record)
        }
        Ok(Decoded::SchemaMismatch(found)) => {
            warn!(
                found = %found,
                expected = %config.schema_version,
                "stored price table has another schema version, using defaults"
            );
            None
        }
        Err(e) => {
            warn!(error = %e, "stored price table is corrupt, using defaults");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pricing_core::{AddOn, SCHEMA_VERSION};
    use rust_decimal::Decimal;

    fn record() -> StoredRecord {
        let mut data = PriceTable::default();
        data.add_ons.insert(AddOn::Deck, Decimal::new(7_250, 0));
        StoredRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            data,
            last_updated: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
            updated_by: Some("office".to_string()),
        }
    }

    #[test]
    fn envelope_roundtrip() {
        let rec = record();
        let text = serde_json::to_string_pretty(&rec).unwrap();
        assert!(text.contains("\"schemaVersion\""));
        assert!(text.contains("\"lastUpdated\": \"2026-03-14T09:30:00Z\""));
        match decode(&text, SCHEMA_VERSION).unwrap() {
            Decoded::Current { record, ignored } => {
                assert_eq!(record, rec);
                assert!(ignored.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn anonymous_saves_omit_updated_by() {
        let mut rec = record();
        rec.updated_by = None;
        let text = serde_json::to_string(&rec).unwrap();
        assert!(!text.contains("updatedBy"));
        assert!(matches!(
            decode(&text, SCHEMA_VERSION).unwrap(),
            Decoded::Current { record: StoredRecord { updated_by: None, .. }, .. }
        ));
    }

    #[test]
    fn other_schema_versions_are_reported() {
        let mut rec = record();
        rec.schema_version = "adu-pricing/2".to_string();
        let text = serde_json::to_string(&rec).unwrap();
        assert_eq!(
            decode(&text, SCHEMA_VERSION).unwrap(),
            Decoded::SchemaMismatch("adu-pricing/2".to_string())
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode("not json", SCHEMA_VERSION).is_err());
        assert!(decode("{\"data\": {}}", SCHEMA_VERSION).is_err());
    }
}
