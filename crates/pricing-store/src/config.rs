//! Store configuration, read from YAML.

use crate::error::StoreError;
use crate::medium::{FileStore, KeyValueStore, MemoryStore};
use pricing_core::{PriceBounds, SCHEMA_VERSION};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_STORAGE_KEY: &str = "adu-pricing-config";

/// Where and how the price table is stored. Every field is optional in YAML:
///
/// ```yaml
/// storage_key: adu-pricing-config
/// storage_dir: /var/lib/adu-quote
/// bounds:
///   min_price: 100
///   max_price: 50000
///   max_multiplier: 3
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Schema tag written with every save; stored records with another tag are ignored.
    pub schema_version: String,
    pub storage_key: String,
    pub bounds: PriceBounds,
    /// Directory for the file-backed medium; in-memory when unset.
    pub storage_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            bounds: PriceBounds::default(),
            storage_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, StoreError> {
        let cfg: StoreConfig =
            serde_yaml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            StoreError::Config(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_yaml_str(&text)
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.storage_key.trim().is_empty() {
            return Err(StoreError::Config("storage_key cannot be empty".to_string()));
        }
        if self.schema_version.trim().is_empty() {
            return Err(StoreError::Config("schema_version cannot be empty".to_string()));
        }
        if self.bounds.min_price < Decimal::ZERO {
            return Err(StoreError::Config(format!(
                "min_price {} cannot be negative",
                self.bounds.min_price
            )));
        }
        if self.bounds.max_multiplier < Decimal::ONE {
            return Err(StoreError::Config(format!(
                "max_multiplier {} must be at least 1",
                self.bounds.max_multiplier
            )));
        }
        if self.bounds.min_price > self.bounds.max_price {
            return Err(StoreError::Config(format!(
                "min_price {} exceeds max_price {}",
                self.bounds.min_price, self.bounds.max_price
            )));
        }
        Ok(())
    }

    /// The medium this configuration points at.
    pub fn open_medium(&self) -> Arc<dyn KeyValueStore> {
        match &self.storage_dir {
            Some(dir) => Arc::new(FileStore::new(dir)),
            None => Arc::new(MemoryStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_is_all_defaults() {
        let cfg = StoreConfig::from_yaml_str("{}").unwrap();
        assert_eq!(cfg, StoreConfig::default());
        assert_eq!(cfg.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn partial_yaml_overrides() {
        let cfg = StoreConfig::from_yaml_str(
            "storage_key: tenant-7\nbounds:\n  min_price: 0\n  max_price: 100000\n",
        )
        .unwrap();
        assert_eq!(cfg.storage_key, "tenant-7");
        assert_eq!(cfg.bounds.min_price, Decimal::ZERO);
        assert_eq!(cfg.bounds.max_price, Decimal::new(100_000, 0));
        assert!(cfg.storage_dir.is_none());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = StoreConfig::from_yaml_str("bounds:\n  min_price: 500\n  max_price: 100\n")
            .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)), "{err}");
    }

    #[test]
    fn negative_floor_and_small_multiplier_cap_are_rejected() {
        for yaml in [
            "bounds:\n  min_price: -1\n",
            "bounds:\n  max_multiplier: 0.5\n",
        ] {
            let err = StoreConfig::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, StoreError::Config(_)), "{yaml}: {err}");
        }
        let cfg = StoreConfig::from_yaml_str("bounds:\n  max_multiplier: 2\n").unwrap();
        assert_eq!(cfg.bounds.max_multiplier, Decimal::new(2, 0));
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        assert!(matches!(
            StoreConfig::from_yaml_str("bounds: [1, 2"),
            Err(StoreError::Config(_))
        ));
        assert!(matches!(
            StoreConfig::load("/nonexistent/adu-pricing.yaml"),
            Err(StoreError::Config(_))
        ));
    }
}
