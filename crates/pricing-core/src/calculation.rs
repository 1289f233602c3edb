//! Itemized calculation returned to the form UI and the proposal renderer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Grouping label of a line item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LineCategory {
    BaseConstruction,
    DesignServices,
    Permits,
    Utilities,
    Hvac,
    AddOns,
    Kitchen,
    Finishes,
    Contingency,
    Tax,
}

impl LineCategory {
    pub fn label(self) -> &'static str {
        match self {
            LineCategory::BaseConstruction => "Base construction",
            LineCategory::DesignServices => "Design services",
            LineCategory::Permits => "Permits & fees",
            LineCategory::Utilities => "Utilities",
            LineCategory::Hvac => "HVAC",
            LineCategory::AddOns => "Add-ons",
            LineCategory::Kitchen => "Kitchen",
            LineCategory::Finishes => "Finishes",
            LineCategory::Contingency => "Contingency",
            LineCategory::Tax => "Sales tax",
        }
    }
}

/// One priced entry: `amount = quantity * unit_price`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub category: LineCategory,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

impl LineItem {
    pub fn new(
        category: LineCategory,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            category,
            description: description.into(),
            quantity,
            unit_price,
            amount: quantity * unit_price,
        }
    }

    /// A single flat charge.
    pub fn flat(category: LineCategory, description: impl Into<String>, price: Decimal) -> Self {
        Self::new(category, description, Decimal::ONE, price)
    }
}

/// Multiplicative step applied to the running total after the subtotal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdjustmentKind {
    Discount,
    StandardMarkup,
    RushMarkup,
    ComplexSiteMarkup,
    Regional,
}

/// Audit record of one adjustment: `after = before * factor`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub description: String,
    pub factor: Decimal,
    pub before: Decimal,
    pub after: Decimal,
}

/// Full price breakdown for one project against one price table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub square_footage: u32,
    /// Configured per-sqft rate for the structure type.
    pub base_rate: Decimal,
    /// Base rate plus any size-bracket delta.
    pub adjusted_rate: Decimal,
    pub line_items: Vec<LineItem>,
    pub adjustments: Vec<Adjustment>,
    pub base_construction: Decimal,
    /// Design services and permits.
    pub services_subtotal: Decimal,
    pub utilities_subtotal: Decimal,
    /// HVAC, add-ons, kitchen and finishes.
    pub add_ons_subtotal: Decimal,
    /// Sum of every line before discounts, markups and region.
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    /// Subtotal after discounts, markups and region, rounded to cents.
    pub adjusted_total: Decimal,
    pub contingency: Decimal,
    pub pre_tax_total: Decimal,
    pub tax: Decimal,
    pub grand_total: Decimal,
    /// Grand total per square foot, rounded to whole dollars.
    pub price_per_sqft: Decimal,
}

impl Calculation {
    pub fn lines(&self, category: LineCategory) -> impl Iterator<Item = &LineItem> {
        self.line_items
            .iter()
            .filter(move |l| l.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_amount_is_extended() {
        let l = LineItem::new(
            LineCategory::Finishes,
            "Recessed lighting",
            Decimal::new(12, 0),
            Decimal::new(175, 0),
        );
        assert_eq!(l.amount, Decimal::new(2100, 0));
        let f = LineItem::flat(LineCategory::AddOns, "Deck", Decimal::new(6500, 0));
        assert_eq!(f.quantity, Decimal::ONE);
        assert_eq!(f.amount, Decimal::new(6500, 0));
    }

    #[test]
    fn line_category_serializes_camel_case() {
        let s = serde_json::to_string(&LineCategory::BaseConstruction).unwrap();
        assert_eq!(s, "\"baseConstruction\"");
    }
}
