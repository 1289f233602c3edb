#![deny(warnings)]

//! Price calculation for ADU projects.
//!
//! [`calculate`] turns a [`PriceTable`] and a [`ProjectSpec`] into an itemized
//! [`Calculation`]. The order of operations is fixed:
//! - base rate plus size-bracket delta, times square footage
//! - optional line items (services, permits, utilities, HVAC, add-ons, kitchen, finishes)
//! - selected discounts (summed, capped at 100%)
//! - compounding markups, then the regional multiplier
//! - contingency and sales tax as separate lines
//!
//! Arithmetic is checked throughout, so a table that was never bounds-checked
//! yields an [`EngineError`] rather than a panic.

use pricing_core::{
    Adjustment, AdjustmentKind, Calculation, Discount, LineCategory, LineItem, Milestone,
    PriceTable, ProjectSpec, Setting, SizeBracket, Unit, UtilityChoice, DEFAULT_REGION,
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

/// Errors produced by the engine.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    /// Project input cannot be priced: non-positive footage or unknown structure type.
    #[error("invalid project: {0}")]
    InvalidSpec(String),
    /// Table values would price the project below zero.
    #[error("invalid price table: {0}")]
    InvalidTable(String),
    /// Table values too large to represent; never raised for a bounds-checked table.
    #[error("price overflow while computing {step}")]
    Overflow { step: &'static str },
    /// Payment milestones do not add up to the full contract amount.
    #[error("milestones sum to {sum}, expected 1")]
    MilestoneSum { sum: Decimal },
}

fn cents(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn mul(a: Decimal, b: Decimal, step: &'static str) -> Result<Decimal, EngineError> {
    a.checked_mul(b).ok_or(EngineError::Overflow { step })
}

fn add(a: Decimal, b: Decimal, step: &'static str) -> Result<Decimal, EngineError> {
    a.checked_add(b).ok_or(EngineError::Overflow { step })
}

fn total<I>(amounts: I, step: &'static str) -> Result<Decimal, EngineError>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, a| add(acc, a, step))
}

fn setting(table: &PriceTable, key: Setting) -> Decimal {
    table.settings.get(&key).copied().unwrap_or(Decimal::ZERO)
}

fn line(
    category: LineCategory,
    description: impl Into<String>,
    quantity: Decimal,
    unit_price: Decimal,
) -> Result<LineItem, EngineError> {
    Ok(LineItem {
        category,
        description: description.into(),
        quantity,
        unit_price,
        amount: mul(quantity, unit_price, category.label())?,
    })
}

/// The bracket containing `square_footage` and its per-sqft delta, if any.
pub fn size_adjustment(
    table: &PriceTable,
    square_footage: u32,
) -> Option<(SizeBracket, Decimal)> {
    table
        .size_adjustments
        .iter()
        .find(|(bracket, _)| bracket.contains(square_footage))
        .map(|(bracket, delta)| (*bracket, *delta))
}

/// Sum of the selected discount fractions, capped to [0, 1].
///
/// Example:
/// let t = PriceTable::default();
/// let all: BTreeSet<_> = Discount::ALL.iter().copied().collect();
/// assert_eq!(discount_fraction(&t, &all), Decimal::new(25, 2));
pub fn discount_fraction(table: &PriceTable, selected: &BTreeSet<Discount>) -> Decimal {
    selected
        .iter()
        .filter_map(|d| table.discounts.get(d))
        .fold(Decimal::ZERO, |acc, d| acc.saturating_add(*d))
        .clamp(Decimal::ZERO, Decimal::ONE)
}

/// Compounded markup factor: standard, then rush, then complex site.
///
/// Markups multiply rather than add, so 10% standard with a 20% rush
/// markup is 1.10 * 1.20 = 1.32.
pub fn markup_factor(table: &PriceTable, rush: bool, complex_site: bool) -> Decimal {
    markup_steps(table, rush, complex_site)
        .iter()
        .fold(Decimal::ONE, |acc, (_, f)| acc.saturating_mul(*f))
}

fn markup_steps(
    table: &PriceTable,
    rush: bool,
    complex_site: bool,
) -> Vec<(AdjustmentKind, Decimal)> {
    let mut steps = vec![(AdjustmentKind::StandardMarkup, Setting::StandardMarkup)];
    if rush {
        steps.push((AdjustmentKind::RushMarkup, Setting::RushJobMarkup));
    }
    if complex_site {
        steps.push((AdjustmentKind::ComplexSiteMarkup, Setting::ComplexSiteMarkup));
    }
    steps
        .into_iter()
        .map(|(kind, key)| (kind, Decimal::ONE.saturating_add(setting(table, key))))
        .collect()
}

/// Multiplier for `region`, falling back to the `default` region and then 1.
pub fn regional_multiplier(table: &PriceTable, region: &str) -> Decimal {
    if let Some(m) = table.regional_multipliers.get(region) {
        return *m;
    }
    debug!(region, "region not configured, using default multiplier");
    table
        .regional_multipliers
        .get(DEFAULT_REGION)
        .copied()
        .unwrap_or(Decimal::ONE)
}

fn optional_items(
    table: &PriceTable,
    spec: &ProjectSpec,
    base_construction: Decimal,
) -> Result<Vec<LineItem>, EngineError> {
    let mut lines = Vec::new();

    for svc in &spec.design_services {
        match table.design_services.get(svc) {
            Some(p) => lines.push(LineItem::flat(LineCategory::DesignServices, svc.label(), *p)),
            None => debug!(key = svc.as_str(), "design service not priced, skipped"),
        }
    }

    let permits = setting(table, Setting::PermitCostMultiplier);
    if !permits.is_zero() {
        lines.push(LineItem::flat(
            LineCategory::Permits,
            Setting::PermitCostMultiplier.label(),
            cents(mul(base_construction, permits, "permits")?),
        ));
    }

    for (utility, choice) in &spec.utilities {
        match choice {
            UtilityChoice::Shared => lines.push(LineItem::flat(
                LineCategory::Utilities,
                format!("{} (shared)", utility.label()),
                Decimal::ZERO,
            )),
            UtilityChoice::Separate => match table.utilities.get(utility) {
                Some(p) => lines.push(LineItem::flat(
                    LineCategory::Utilities,
                    format!("{} (separate meter)", utility.label()),
                    *p,
                )),
                None => debug!(key = utility.as_str(), "utility not priced, skipped"),
            },
        }
    }

    if let Some(hvac) = spec.hvac {
        match table.hvac.get(&hvac) {
            Some(p) => lines.push(LineItem::flat(LineCategory::Hvac, hvac.label(), *p)),
            None => debug!(key = hvac.as_str(), "hvac system not priced, skipped"),
        }
    }

    for add_on in &spec.add_ons {
        match table.add_ons.get(add_on) {
            Some(p) => lines.push(LineItem::flat(LineCategory::AddOns, add_on.label(), *p)),
            None => debug!(key = add_on.as_str(), "add-on not priced, skipped"),
        }
    }

    if let Some(kitchen) = spec.kitchen {
        match table.kitchen.get(&kitchen) {
            Some(p) => lines.push(LineItem::flat(LineCategory::Kitchen, kitchen.label(), *p)),
            None => debug!(key = kitchen.as_str(), "kitchen package not priced, skipped"),
        }
    }

    for (finish, count) in &spec.finishes {
        let Some(price) = table.finishes.get(finish).copied() else {
            debug!(key = finish.as_str(), "finish not priced, skipped");
            continue;
        };
        match finish.unit() {
            Unit::Flat => lines.push(LineItem::flat(LineCategory::Finishes, finish.label(), price)),
            Unit::PerCount if *count > 0 => lines.push(line(
                LineCategory::Finishes,
                finish.label(),
                Decimal::from(*count),
                price,
            )?),
            Unit::PerCount => {}
        }
    }

    Ok(lines)
}

fn sum_of(lines: &[LineItem], categories: &[LineCategory]) -> Result<Decimal, EngineError> {
    total(
        lines
            .iter()
            .filter(|l| categories.contains(&l.category))
            .map(|l| l.amount),
        "subtotals",
    )
}

/// Price `spec` against `table`.
///
/// Deterministic and side-effect free. Fails when the project itself cannot
/// be priced or the table would price it below zero; missing optional prices
/// and unknown regions fall back silently.
pub fn calculate(table: &PriceTable, spec: &ProjectSpec) -> Result<Calculation, EngineError> {
    if spec.square_footage == 0 {
        return Err(EngineError::InvalidSpec(
            "square footage must be positive".to_string(),
        ));
    }
    let base_rate = table
        .base_prices
        .get(&spec.structure_type)
        .copied()
        .ok_or_else(|| {
            EngineError::InvalidSpec(format!(
                "no base price for structure type {}",
                spec.structure_type
            ))
        })?;

    let sqft = Decimal::from(spec.square_footage);
    let bracket = size_adjustment(table, spec.square_footage);
    let delta = bracket.map(|(_, delta)| delta).unwrap_or(Decimal::ZERO);
    let adjusted_rate = add(base_rate, delta, "adjusted rate")?;
    if adjusted_rate < Decimal::ZERO {
        return Err(EngineError::InvalidTable(format!(
            "{} rate {adjusted_rate}/sqft is negative after the size adjustment",
            spec.structure_type
        )));
    }
    let description = match bracket {
        Some((b, _)) => format!("{} ({})", spec.structure_type.label(), b.label()),
        None => spec.structure_type.label().to_string(),
    };
    let base_line = line(LineCategory::BaseConstruction, description, sqft, adjusted_rate)?;
    let base_construction = base_line.amount;

    let mut line_items = vec![base_line];
    line_items.extend(optional_items(table, spec, base_construction)?);

    let services_subtotal = sum_of(
        &line_items,
        &[LineCategory::DesignServices, LineCategory::Permits],
    )?;
    let utilities_subtotal = sum_of(&line_items, &[LineCategory::Utilities])?;
    let add_ons_subtotal = sum_of(
        &line_items,
        &[
            LineCategory::Hvac,
            LineCategory::AddOns,
            LineCategory::Kitchen,
            LineCategory::Finishes,
        ],
    )?;
    let subtotal = total(line_items.iter().map(|l| l.amount), "subtotal")?;

    let discount = discount_fraction(table, &spec.discounts);
    let discount_amount = cents(mul(subtotal, discount, "discounts")?);

    let mut steps = vec![(
        AdjustmentKind::Discount,
        "Discounts".to_string(),
        Decimal::ONE - discount,
    )];
    for (kind, factor) in markup_steps(table, spec.rush, spec.complex_site) {
        let label = match kind {
            AdjustmentKind::RushMarkup => Setting::RushJobMarkup.label(),
            AdjustmentKind::ComplexSiteMarkup => Setting::ComplexSiteMarkup.label(),
            _ => Setting::StandardMarkup.label(),
        };
        steps.push((kind, label.to_string(), factor));
    }
    steps.push((
        AdjustmentKind::Regional,
        format!("Regional multiplier ({})", spec.region),
        regional_multiplier(table, &spec.region),
    ));

    let mut adjustments = Vec::new();
    let mut running = subtotal;
    for (kind, description, factor) in steps {
        let before = running;
        running = mul(running, factor, "adjustments")?;
        if factor != Decimal::ONE {
            adjustments.push(Adjustment {
                kind,
                description,
                factor,
                before,
                after: running,
            });
        }
    }
    let adjusted_total = cents(running);

    let contingency = cents(mul(
        adjusted_total,
        setting(table, Setting::Contingency),
        "contingency",
    )?);
    line_items.push(LineItem::flat(
        LineCategory::Contingency,
        Setting::Contingency.label(),
        contingency,
    ));
    let pre_tax_total = add(adjusted_total, contingency, "pre-tax total")?;

    let tax = cents(mul(pre_tax_total, setting(table, Setting::SalesTax), "tax")?);
    line_items.push(LineItem::flat(LineCategory::Tax, Setting::SalesTax.label(), tax));
    let grand_total = add(pre_tax_total, tax, "grand total")?;

    let price_per_sqft = grand_total
        .checked_div(sqft)
        .ok_or(EngineError::Overflow {
            step: "price per sqft",
        })?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    debug!(
        structure = spec.structure_type.as_str(),
        square_footage = spec.square_footage,
        %grand_total,
        "calculated project price"
    );

    Ok(Calculation {
        square_footage: spec.square_footage,
        base_rate,
        adjusted_rate,
        line_items,
        adjustments,
        base_construction,
        services_subtotal,
        utilities_subtotal,
        add_ons_subtotal,
        subtotal,
        discount_amount,
        adjusted_total,
        contingency,
        pre_tax_total,
        tax,
        grand_total,
        price_per_sqft,
    })
}

/// Sum of the payment milestone fractions.
pub fn milestone_sum(table: &PriceTable) -> Decimal {
    table
        .milestones
        .values()
        .fold(Decimal::ZERO, |acc, f| acc.saturating_add(*f))
}

/// Diagnostic check that milestones cover exactly the full contract amount.
pub fn check_milestones(table: &PriceTable) -> Result<(), EngineError> {
    let sum = milestone_sum(table);
    if (sum - Decimal::ONE).abs() > Decimal::new(1, 9) {
        return Err(EngineError::MilestoneSum { sum });
    }
    Ok(())
}

/// One scheduled payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    pub milestone: Milestone,
    pub fraction: Decimal,
    pub amount: Decimal,
}

/// Split the grand total across milestones in contract order.
///
/// Each installment is rounded to cents; the last one absorbs the rounding
/// remainder so the schedule always adds up to the grand total.
pub fn payment_schedule(table: &PriceTable, calculation: &Calculation) -> Vec<Installment> {
    let mut out: Vec<Installment> = table
        .milestones
        .iter()
        .map(|(m, f)| Installment {
            milestone: *m,
            fraction: *f,
            amount: cents(calculation.grand_total.saturating_mul(*f)),
        })
        .collect();
    let scheduled = out
        .iter()
        .fold(Decimal::ZERO, |acc, i| acc.saturating_add(i.amount));
    if let Some(last) = out.last_mut() {
        let remainder = calculation.grand_total.saturating_sub(scheduled);
        last.amount = last.amount.saturating_add(remainder);
    }
    out
}
