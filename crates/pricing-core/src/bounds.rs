//! Edit-boundary validation: parsing raw amounts and enforcing price bounds.

use crate::category::{Category, PriceEntry, StructureType};
use crate::table::PriceTable;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while addressing or editing the price table.
#[derive(Debug, Error, PartialEq)]
pub enum PriceError {
    #[error("unknown price category: {0}")]
    UnknownCategory(String),
    #[error("unknown key {key:?} in category {category}")]
    UnknownKey { category: Category, key: String },
    /// Raw input could not be read as a finite number.
    #[error("not a valid amount: {0:?}")]
    InvalidNumber(String),
    /// Value violates the bound of its category; the edit is not applied.
    #[error("{entry} = {value} is out of range: {violation}")]
    OutOfRange {
        entry: String,
        value: Decimal,
        violation: BoundViolation,
    },
}

/// Which bound an out-of-range value violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundViolation {
    BelowMin(Decimal),
    AboveMax(Decimal),
    /// Fractions and multipliers cannot be negative.
    Negative,
    /// A size-bracket delta would push this structure's per-sqft rate below zero.
    NegativeRate(StructureType),
}

impl fmt::Display for BoundViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundViolation::BelowMin(min) => write!(f, "below the minimum of {min}"),
            BoundViolation::AboveMax(max) => write!(f, "above the maximum of {max}"),
            BoundViolation::Negative => f.write_str("negative"),
            BoundViolation::NegativeRate(s) => write!(f, "making the {s} rate negative"),
        }
    }
}

/// Accepted ranges for every category of the price table.
///
/// Dollar categories stay within `[min_price, max_price]`, size-bracket
/// deltas within `[-max_price, max_price]`, regional multipliers within
/// `[0, max_multiplier]` and every other fraction within `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceBounds {
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub max_multiplier: Decimal,
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self {
            min_price: Decimal::new(100, 0),
            max_price: Decimal::new(50_000, 0),
            max_multiplier: Decimal::new(3, 0),
        }
    }
}

impl PriceBounds {
    /// Inclusive `(min, max)` for values of `category`.
    pub fn limits(&self, category: Category) -> (Decimal, Decimal) {
        match category {
            c if c.is_dollar() => (self.min_price, self.max_price),
            Category::SizeAdjustments => (-self.max_price, self.max_price),
            Category::RegionalMultipliers => (Decimal::ZERO, self.max_multiplier),
            _ => (Decimal::ZERO, Decimal::ONE),
        }
    }

    /// Check one value against the bound of its entry's category.
    pub fn check(&self, entry: &PriceEntry, value: Decimal) -> Result<(), PriceError> {
        let (min, max) = self.limits(entry.category());
        let violation = if value < min {
            if min.is_zero() {
                BoundViolation::Negative
            } else {
                BoundViolation::BelowMin(min)
            }
        } else if value > max {
            BoundViolation::AboveMax(max)
        } else {
            return Ok(());
        };
        Err(PriceError::OutOfRange {
            entry: entry.to_string(),
            value,
            violation,
        })
    }

    /// Every size-bracket delta must keep the cheapest structure's rate at or
    /// above zero.
    pub fn check_rates(&self, table: &PriceTable) -> Result<(), PriceError> {
        let Some((structure, base)) = cheapest_structure(table) else {
            return Ok(());
        };
        for (bracket, delta) in &table.size_adjustments {
            if !rate_stays_positive(base, *delta) {
                return Err(PriceError::OutOfRange {
                    entry: PriceEntry::SizeAdjustment(*bracket).to_string(),
                    value: *delta,
                    violation: BoundViolation::NegativeRate(structure),
                });
            }
        }
        Ok(())
    }

    /// Check every cell of a table, reporting the first violation.
    pub fn check_table(&self, table: &PriceTable) -> Result<(), PriceError> {
        for (entry, value) in table.entries() {
            self.check(&entry, value)?;
        }
        self.check_rates(table)
    }

    /// Bring `table` within bounds in place. Offending cells go back to their
    /// default when that is in range and are clamped otherwise; regions with no
    /// default are dropped. Returns the `category.key` of every changed cell.
    pub fn sanitize(&self, table: &mut PriceTable) -> Vec<String> {
        let defaults = PriceTable::default();
        let mut changed = Vec::new();
        for (entry, value) in table.entries() {
            if self.check(&entry, value).is_ok() {
                continue;
            }
            changed.push(entry.to_string());
            match defaults.get(&entry) {
                Some(d) if self.check(&entry, d).is_ok() => table.set(entry, d),
                Some(_) => {
                    let (min, max) = self.limits(entry.category());
                    table.set(entry, value.clamp(min, max));
                }
                None => {
                    if let PriceEntry::RegionalMultiplier(region) = &entry {
                        table.regional_multipliers.remove(region);
                    }
                }
            }
        }
        if let Some((_, base)) = cheapest_structure(table) {
            for (bracket, delta) in table.size_adjustments.iter_mut() {
                if rate_stays_positive(base, *delta) {
                    continue;
                }
                changed.push(PriceEntry::SizeAdjustment(*bracket).to_string());
                let fallback = defaults
                    .size_adjustments
                    .get(bracket)
                    .copied()
                    .filter(|d| rate_stays_positive(base, *d));
                *delta = fallback.unwrap_or(Decimal::ZERO);
            }
        }
        changed
    }
}

fn cheapest_structure(table: &PriceTable) -> Option<(StructureType, Decimal)> {
    table
        .base_prices
        .iter()
        .min_by_key(|(_, base)| **base)
        .map(|(s, base)| (*s, *base))
}

fn rate_stays_positive(base: Decimal, delta: Decimal) -> bool {
    matches!(base.checked_add(delta), Some(rate) if rate >= Decimal::ZERO)
}

/// Parse a user-entered amount such as `"1250"`, `"$1,250.50"`, `"0.0775"` or `"1.5e3"`.
pub fn parse_amount(raw: &str) -> Result<Decimal, PriceError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '_' | ' '))
        .collect();
    if cleaned.is_empty() {
        return Err(PriceError::InvalidNumber(raw.to_string()));
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map(|d| d.normalize())
        .map_err(|_| PriceError::InvalidNumber(raw.to_string()))
}
