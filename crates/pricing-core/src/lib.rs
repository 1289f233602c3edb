#![deny(warnings)]

//! Core pricing model for the ADU quoting tool.
//!
//! This crate defines the versioned price table, the typed category/key
//! vocabulary used to address it, bounds validation for edits, and the
//! serializable project and calculation shapes exchanged with the form UI.

pub mod bounds;
pub mod calculation;
pub mod category;
pub mod project;
pub mod table;

pub use bounds::{parse_amount, BoundViolation, PriceBounds, PriceError};
pub use calculation::{Adjustment, AdjustmentKind, Calculation, LineCategory, LineItem};
pub use category::{
    AddOn, Category, DesignService, Discount, Finish, HvacSystem, KitchenPackage, Milestone,
    PriceEntry, Setting, SizeBracket, StructureType, Unit, Utility,
};
pub use project::{ProjectSpec, UtilityChoice, DEFAULT_REGION};
pub use table::{Overlay, PriceTable};

/// Identifier of the persisted price table layout. Stored tables tagged with
/// any other value are treated as absent.
pub const SCHEMA_VERSION: &str = "adu-pricing/3";
