#![deny(warnings)]

//! Persistence layer for the price table: durable media, the versioned
//! record envelope, change broadcast and export/import.

pub mod config;
pub mod error;
pub mod medium;
pub mod notify;
pub mod record;
pub mod transfer;
pub mod watch;

pub use config::{StoreConfig, DEFAULT_STORAGE_KEY};
pub use error::{ImportError, StoreError};
pub use medium::{FileStore, KeyValueStore, MemoryStore};
pub use notify::{ChangeHandler, ChangeNotifier, LocalBroadcast, SubscriptionId, TableChanged};
pub use record::StoredRecord;
pub use transfer::export_file_name;
pub use watch::MediumWatch;

use chrono::Utc;
use pricing_core::{PriceBounds, PriceEntry, PriceError, PriceTable};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Explicit answer to an irreversible operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirm {
    Yes,
    No,
}

/// Loads, validates and saves the price table against one durable medium,
/// announcing every successful save on the notifier.
#[derive(Clone)]
pub struct PriceStore {
    medium: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn ChangeNotifier>,
    config: StoreConfig,
}

impl PriceStore {
    pub fn new(
        medium: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn ChangeNotifier>,
        config: StoreConfig,
    ) -> Self {
        Self {
            medium,
            notifier,
            config,
        }
    }

    /// Store over the medium named by `config`. Changes are announced through
    /// a [`MediumWatch`], so stores opened separately on the same medium see
    /// each other's saves on their next poll.
    pub fn open(config: StoreConfig) -> Self {
        let medium = config.open_medium();
        let watch = MediumWatch::new(Arc::clone(&medium), config.clone());
        Self::new(medium, Arc::new(watch), config)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn bounds(&self) -> &PriceBounds {
        &self.config.bounds
    }

    pub fn notifier(&self) -> &Arc<dyn ChangeNotifier> {
        &self.notifier
    }

    /// The stored record, or `None` when it is absent, unreadable, corrupt or
    /// written under another schema version. Out-of-range cells are reset.
    pub fn load_record(&self) -> Option<StoredRecord> {
        record::read(self.medium.as_ref(), &self.config)
    }

    /// Stored table overlaid on defaults, or the defaults alone.
    pub fn load(&self) -> PriceTable {
        self.load_record()
            .map(|r| r.data)
            .unwrap_or_default()
    }

    /// Validate one edit and apply it to a copy of `table`.
    pub fn prepare_edit(
        &self,
        table: &PriceTable,
        entry: PriceEntry,
        value: Decimal,
    ) -> Result<PriceTable, PriceError> {
        self.config.bounds.check(&entry, value)?;
        let next = table.with_value(entry, value);
        self.config.bounds.check_rates(&next)?;
        Ok(next)
    }

    /// Persist the whole table, then broadcast it.
    ///
    /// The table is bounds-checked first; nothing is written if any cell is
    /// out of range.
    pub fn save(
        &self,
        table: &PriceTable,
        actor: Option<&str>,
    ) -> Result<StoredRecord, StoreError> {
        self.config.bounds.check_table(table)?;
        let record = StoredRecord {
            schema_version: self.config.schema_version.clone(),
            data: table.clone(),
            last_updated: Utc::now(),
            updated_by: actor.map(str::to_string),
        };
        let text =
            serde_json::to_string(&record).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.medium.write(&self.config.storage_key, &text)?;
        info!(updated_by = ?record.updated_by, "price table saved");
        self.notifier.publish(&TableChanged {
            table: record.data.clone(),
            last_updated: record.last_updated,
            updated_by: record.updated_by.clone(),
        });
        Ok(record)
    }

    /// Bounds-check, apply and save one edit. On error nothing is written.
    pub fn update(
        &self,
        table: &PriceTable,
        entry: PriceEntry,
        value: Decimal,
        actor: Option<&str>,
    ) -> Result<StoredRecord, StoreError> {
        let next = self.prepare_edit(table, entry, value)?;
        self.save(&next, actor)
    }

    /// Overwrite any customization with the defaults.
    pub fn reset(&self, confirm: Confirm, actor: Option<&str>) -> Result<PriceTable, StoreError> {
        if confirm != Confirm::Yes {
            return Err(StoreError::NotConfirmed);
        }
        let defaults = PriceTable::default();
        self.save(&defaults, actor)?;
        info!("price table reset to defaults");
        Ok(defaults)
    }

    pub fn export(&self, table: &PriceTable) -> Result<Vec<u8>, StoreError> {
        transfer::export_table(table)
    }

    /// Parse a backup onto the defaults. The merged table must satisfy the
    /// bounds as a whole.
    pub fn import(&self, bytes: &[u8]) -> Result<PriceTable, ImportError> {
        let overlay = transfer::import_table(bytes)?;
        if !overlay.ignored.is_empty() {
            warn!(ignored = ?overlay.ignored, "import skipped unrecognized entries");
        }
        self.config.bounds.check_table(&overlay.table)?;
        Ok(overlay.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricing_core::{
        AddOn, BoundViolation, Discount, HvacSystem, Setting, SizeBracket, StructureType,
    };
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn stored_text(data: serde_json::Value) -> String {
        json!({
            "schemaVersion": pricing_core::SCHEMA_VERSION,
            "lastUpdated": "2025-06-01T12:00:00Z",
            "data": data,
        })
        .to_string()
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "adu_pricing_store_{}_{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn store() -> (PriceStore, MemoryStore) {
        let medium = MemoryStore::new();
        let store = PriceStore::new(
            Arc::new(medium.clone()),
            Arc::new(LocalBroadcast::new()),
            StoreConfig::default(),
        );
        (store, medium)
    }

    #[test]
    fn empty_medium_loads_defaults() {
        let (s, _) = store();
        assert!(s.load_record().is_none());
        assert_eq!(s.load(), PriceTable::default());
    }

    #[test]
    fn save_then_load() {
        let (s, _) = store();
        let t = PriceTable::default().with_value(
            PriceEntry::AddOn(AddOn::Deck),
            Decimal::new(7_000, 0),
        );
        let before = Utc::now();
        let rec = s.save(&t, Some("estimator")).unwrap();
        assert!(rec.last_updated >= before);
        let loaded = s.load_record().unwrap();
        assert_eq!(loaded.data, t);
        assert_eq!(loaded.updated_by.as_deref(), Some("estimator"));
        assert_eq!(loaded.schema_version, pricing_core::SCHEMA_VERSION);
    }

    #[test]
    fn stored_table_missing_new_keys_gets_defaults() {
        let (s, medium) = store();
        let text = stored_text(json!({ "hvac": { "miniSplit": "7000" } }));
        medium.write(DEFAULT_STORAGE_KEY, &text).unwrap();
        let t = s.load();
        assert_eq!(t.hvac[&HvacSystem::MiniSplit], Decimal::new(7_000, 0));
        assert_eq!(t.add_ons, PriceTable::default().add_ons);
    }

    #[test]
    fn schema_mismatch_falls_back_to_defaults() {
        let (s, medium) = store();
        let text = json!({
            "schemaVersion": "adu-pricing/1",
            "lastUpdated": "2024-01-01T00:00:00Z",
            "data": { "hvac": { "miniSplit": "9999" } }
        })
        .to_string();
        medium.write(DEFAULT_STORAGE_KEY, &text).unwrap();
        assert!(s.load_record().is_none());
        assert_eq!(s.load(), PriceTable::default());
    }

    #[test]
    fn corrupt_or_unavailable_medium_falls_back_to_defaults() {
        let (s, medium) = store();
        medium.write(DEFAULT_STORAGE_KEY, "{{{{").unwrap();
        assert_eq!(s.load(), PriceTable::default());
        medium.set_unavailable(true);
        assert_eq!(s.load(), PriceTable::default());
    }

    #[test]
    fn out_of_range_edit_is_not_applied() {
        let (s, medium) = store();
        let t = PriceTable::default();
        s.save(&t, None).unwrap();
        let stored_before = medium.read(DEFAULT_STORAGE_KEY).unwrap();

        let entry = PriceEntry::BasePrice(StructureType::DetachedOneStory);
        let err = s.update(&t, entry, Decimal::new(60_000, 0), None).unwrap_err();
        match err {
            StoreError::Price(PriceError::OutOfRange { violation, .. }) => {
                assert_eq!(violation, BoundViolation::AboveMax(Decimal::new(50_000, 0)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(medium.read(DEFAULT_STORAGE_KEY).unwrap(), stored_before);
        assert_eq!(s.load(), t);
    }

    #[test]
    fn save_refuses_out_of_range_tables() {
        let (s, medium) = store();
        let mut t = PriceTable::default();
        t.hvac.insert(HvacSystem::CentralAc, Decimal::new(5, 0));
        assert!(matches!(s.save(&t, None), Err(StoreError::Price(_))));
        assert_eq!(medium.read(DEFAULT_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn save_publishes_full_table() {
        let (s, _) = store();
        let seen: Arc<Mutex<Vec<TableChanged>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        s.notifier().subscribe(Box::new(move |ev| {
            sink.lock().unwrap().push(ev.clone());
        }));
        let rec = s
            .update(
                &PriceTable::default(),
                PriceEntry::Setting(Setting::SalesTax),
                Decimal::new(8, 2),
                Some("owner"),
            )
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].table, rec.data);
        assert_eq!(seen[0].last_updated, rec.last_updated);
        assert_eq!(seen[0].updated_by.as_deref(), Some("owner"));
    }

    #[test]
    fn failed_save_does_not_publish() {
        let (s, medium) = store();
        let hits = Arc::new(Mutex::new(0));
        let h = Arc::clone(&hits);
        s.notifier().subscribe(Box::new(move |_| *h.lock().unwrap() += 1));
        medium.set_unavailable(true);
        let err = s.save(&PriceTable::default(), None).unwrap_err();
        assert!(matches!(err, StoreError::PersistenceUnavailable(_)));
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn reset_requires_confirmation() {
        let (s, _) = store();
        let custom = PriceTable::default().with_value(
            PriceEntry::AddOn(AddOn::ExtraBathroom),
            Decimal::new(9_000, 0),
        );
        s.save(&custom, None).unwrap();
        assert!(matches!(s.reset(Confirm::No, None), Err(StoreError::NotConfirmed)));
        assert_eq!(s.load(), custom);
        assert_eq!(s.reset(Confirm::Yes, Some("owner")).unwrap(), PriceTable::default());
        assert_eq!(s.load(), PriceTable::default());
    }

    #[test]
    fn open_uses_configured_file_medium() {
        let dir = temp_dir("open");
        let cfg = StoreConfig {
            storage_dir: Some(dir.clone()),
            ..StoreConfig::default()
        };
        let t = PriceTable::default().with_value(
            PriceEntry::Hvac(HvacSystem::HeatPump),
            Decimal::new(15_000, 0),
        );
        PriceStore::open(cfg.clone()).save(&t, None).unwrap();
        assert_eq!(PriceStore::open(cfg).load(), t);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn out_of_range_stored_cells_are_reset_on_load() {
        let (s, medium) = store();
        let text = stored_text(json!({
            "hvac": { "miniSplit": "5", "heatPump": "15000" },
            "discounts": { "cash": "-3" },
            "settings": { "standardMarkup": "1e27" },
            "sizeAdjustments": { "under400": "-5000" },
        }));
        medium.write(DEFAULT_STORAGE_KEY, &text).unwrap();

        let t = s.load();
        let defaults = PriceTable::default();
        assert_eq!(t.hvac[&HvacSystem::MiniSplit], defaults.hvac[&HvacSystem::MiniSplit]);
        assert_eq!(t.hvac[&HvacSystem::HeatPump], Decimal::new(15_000, 0));
        assert_eq!(t.discounts[&Discount::Cash], defaults.discounts[&Discount::Cash]);
        assert_eq!(
            t.settings[&Setting::StandardMarkup],
            defaults.settings[&Setting::StandardMarkup]
        );
        assert_eq!(
            t.size_adjustments[&SizeBracket::Under400],
            defaults.size_adjustments[&SizeBracket::Under400]
        );
        assert!(s.bounds().check_table(&t).is_ok());

        let entry = PriceEntry::AddOn(AddOn::Deck);
        let rec = s.update(&t, entry, Decimal::new(7_500, 0), None).unwrap();
        assert_eq!(rec.data.add_ons[&AddOn::Deck], Decimal::new(7_500, 0));
    }

    #[test]
    fn import_out_of_range_is_rejected() {
        let (s, _) = store();
        for doc in [
            json!({ "addOns": { "deck": "60000" } }),
            json!({ "settings": { "salesTax": "1.5" } }),
            json!({ "regionalMultipliers": { "sanFrancisco": "40" } }),
            json!({ "sizeAdjustments": { "under400": "-5000" } }),
        ] {
            let res = s.import(doc.to_string().as_bytes());
            let is_out_of_range = matches!(
                res,
                Err(ImportError::Price(PriceError::OutOfRange { .. }))
            );
            assert!(is_out_of_range, "{doc} gave {res:?}");
        }
    }

    #[test]
    fn separately_opened_stores_see_each_others_saves() {
        let dir = temp_dir("shared");
        let cfg = StoreConfig {
            storage_dir: Some(dir.clone()),
            ..StoreConfig::default()
        };
        let a = PriceStore::open(cfg.clone());
        let b = PriceStore::open(cfg);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        b.notifier()
            .subscribe(Box::new(move |ev: &TableChanged| sink.lock().unwrap().push(ev.clone())));

        let t = PriceTable::default().with_value(
            PriceEntry::AddOn(AddOn::SolarPanels),
            Decimal::new(21_000, 0),
        );
        let rec = a.save(&t, Some("office")).unwrap();
        b.notifier().poll();
        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].table, t);
            assert_eq!(seen[0].last_updated, rec.last_updated);
        }
        b.notifier().poll();
        assert_eq!(seen.lock().unwrap().len(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    fn dollar_entry() -> impl Strategy<Value = PriceEntry> {
        let dollars: Vec<PriceEntry> = PriceTable::default()
            .entries()
            .into_iter()
            .map(|(entry, _)| entry)
            .filter(|entry| entry.category().is_dollar())
            .collect();
        prop::sample::select(dollars)
    }

    fn rejected_fraction_or_delta() -> impl Strategy<Value = (PriceEntry, Decimal)> {
        let setting = prop::sample::select(Setting::ALL.to_vec()).prop_map(PriceEntry::Setting);
        let discount = prop::sample::select(Discount::ALL.to_vec()).prop_map(PriceEntry::Discount);
        let bracket =
            prop::sample::select(SizeBracket::ALL.to_vec()).prop_map(PriceEntry::SizeAdjustment);
        let region = prop::sample::select(vec!["default", "sanFrancisco", "fresno"])
            .prop_map(|r| PriceEntry::RegionalMultiplier(r.to_string()));
        prop_oneof![
            (setting, 101i64..1_000_000).prop_map(|(e, v)| (e, Decimal::new(v, 2))),
            (discount, 1i64..1_000_000).prop_map(|(e, v)| (e, -Decimal::new(v, 2))),
            (region, 301i64..1_000_000).prop_map(|(e, v)| (e, Decimal::new(v, 2))),
            (bracket, 1_000i64..1_000_000).prop_map(|(e, v)| (e, -Decimal::new(v, 0))),
        ]
    }

    fn table_strategy() -> impl Strategy<Value = PriceTable> {
        let n = PriceTable::default().entries().len();
        proptest::collection::vec(100i64..50_000, n).prop_map(|values| {
            let mut t = PriceTable::default();
            for ((entry, _), v) in PriceTable::default().entries().into_iter().zip(values) {
                let value = if entry.category().is_dollar() {
                    Decimal::new(v, 0)
                } else {
                    Decimal::new(v, 5)
                };
                t.set(entry, value);
            }
            t
        })
    }

    proptest! {
        #[test]
        fn export_import_roundtrip(t in table_strategy()) {
            let (s, _) = store();
            let bytes = s.export(&t).unwrap();
            prop_assert_eq!(s.import(&bytes).unwrap(), t);
        }

        #[test]
        fn out_of_bounds_dollar_values_never_stored(
            entry in dollar_entry(),
            v in prop_oneof![0i64..100, 50_001i64..1_000_000],
        ) {
            let (s, medium) = store();
            let t = PriceTable::default();
            s.save(&t, None).unwrap();
            let stored_before = medium.read(DEFAULT_STORAGE_KEY).unwrap();
            let res = s.update(&t, entry, Decimal::new(v, 0), None);
            let is_out_of_range = matches!(
                res,
                Err(StoreError::Price(PriceError::OutOfRange { .. }))
            );
            prop_assert!(is_out_of_range);
            prop_assert_eq!(medium.read(DEFAULT_STORAGE_KEY).unwrap(), stored_before);
            prop_assert_eq!(s.load(), t);
        }

        #[test]
        fn out_of_bounds_fractions_and_deltas_never_stored(
            (entry, value) in rejected_fraction_or_delta(),
        ) {
            let (s, medium) = store();
            let t = PriceTable::default();
            s.save(&t, None).unwrap();
            let stored_before = medium.read(DEFAULT_STORAGE_KEY).unwrap();
            let res = s.update(&t, entry, value, None);
            let is_out_of_range = matches!(
                res,
                Err(StoreError::Price(PriceError::OutOfRange { .. }))
            );
            prop_assert!(is_out_of_range);
            prop_assert_eq!(medium.read(DEFAULT_STORAGE_KEY).unwrap(), stored_before);
            prop_assert_eq!(s.load(), t);
        }
    }
}
