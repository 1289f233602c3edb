//! The versioned price table and its hard-coded defaults.

use crate::bounds::parse_amount;
use crate::category::{
    AddOn, Category, DesignService, Discount, Finish, HvacSystem, KitchenPackage, Milestone,
    PriceEntry, Setting, SizeBracket, StructureType, Utility,
};
use crate::project::DEFAULT_REGION;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// All editable prices, organized by category.
///
/// Dollar categories hold whole-dollar or per-unit amounts; `discounts`,
/// `settings` and `milestones` hold fractions; `regionalMultipliers` holds
/// multiplicative factors keyed by region and always carries `default`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTable {
    pub base_prices: BTreeMap<StructureType, Decimal>,
    pub design_services: BTreeMap<DesignService, Decimal>,
    pub utilities: BTreeMap<Utility, Decimal>,
    pub hvac: BTreeMap<HvacSystem, Decimal>,
    pub add_ons: BTreeMap<AddOn, Decimal>,
    pub kitchen: BTreeMap<KitchenPackage, Decimal>,
    pub finishes: BTreeMap<Finish, Decimal>,
    pub size_adjustments: BTreeMap<SizeBracket, Decimal>,
    pub discounts: BTreeMap<Discount, Decimal>,
    pub settings: BTreeMap<Setting, Decimal>,
    pub milestones: BTreeMap<Milestone, Decimal>,
    pub regional_multipliers: BTreeMap<String, Decimal>,
}

/// Result of overlaying a stored or imported document onto the defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub table: PriceTable,
    /// `category` or `category.key` paths that were present but not applied.
    pub ignored: Vec<String>,
}

fn dollars<K: Ord + Copy>(pairs: &[(K, i64)]) -> BTreeMap<K, Decimal> {
    pairs.iter().map(|&(k, v)| (k, Decimal::new(v, 0))).collect()
}

/// `(key, mantissa, scale)`, e.g. `(SalesTax, 775, 4)` is 0.0775.
fn fractions<K: Ord + Copy>(pairs: &[(K, i64, u32)]) -> BTreeMap<K, Decimal> {
    pairs
        .iter()
        .map(|&(k, m, scale)| (k, Decimal::new(m, scale).normalize()))
        .collect()
}

impl Default for PriceTable {
    fn default() -> Self {
        use StructureType::*;
        Self {
            base_prices: dollars(&[
                (DetachedOneStory, 240),
                (DetachedTwoStory, 265),
                (AttachedOneStory, 225),
                (AttachedTwoStory, 250),
                (GarageConversion, 175),
                (JuniorAdu, 160),
            ]),
            design_services: dollars(&[
                (DesignService::ArchitecturalPlans, 8_500),
                (DesignService::StructuralEngineering, 3_500),
                (DesignService::Title24Energy, 850),
                (DesignService::SoilsReport, 2_500),
                (DesignService::SiteSurvey, 1_800),
                (DesignService::PermitExpediting, 2_000),
            ]),
            utilities: dollars(&[
                (Utility::Water, 4_500),
                (Utility::Sewer, 6_500),
                (Utility::Electric, 5_500),
                (Utility::Gas, 3_500),
            ]),
            hvac: dollars(&[
                (HvacSystem::MiniSplit, 6_500),
                (HvacSystem::CentralAc, 12_000),
                (HvacSystem::HeatPump, 14_500),
            ]),
            add_ons: dollars(&[
                (AddOn::ExtraBathroom, 8_000),
                (AddOn::SolarPanels, 15_000),
                (AddOn::Deck, 6_500),
                (AddOn::DedicatedDriveway, 4_500),
                (AddOn::FireSprinklers, 7_500),
                (AddOn::Landscaping, 5_000),
            ]),
            kitchen: dollars(&[
                (KitchenPackage::Kitchenette, 9_500),
                (KitchenPackage::StandardKitchen, 18_000),
                (KitchenPackage::PremiumKitchen, 32_000),
            ]),
            finishes: dollars(&[
                (Finish::PremiumFixtures, 450),
                (Finish::RecessedLighting, 175),
                (Finish::PremiumFlooring, 4_500),
                (Finish::QuartzCountertops, 3_800),
                (Finish::CustomCabinetry, 7_500),
            ]),
            size_adjustments: dollars(&[
                (SizeBracket::Under400, 50),
                (SizeBracket::From400To600, 20),
                (SizeBracket::Over1200, -15),
            ]),
            discounts: fractions(&[
                (Discount::FriendsAndFamily, 5, 2),
                (Discount::Veteran, 5, 2),
                (Discount::Senior, 5, 2),
                (Discount::Cash, 5, 2),
                (Discount::Referral, 5, 2),
            ]),
            settings: fractions(&[
                (Setting::StandardMarkup, 10, 2),
                (Setting::RushJobMarkup, 20, 2),
                (Setting::ComplexSiteMarkup, 15, 2),
                (Setting::SalesTax, 775, 4),
                (Setting::PermitCostMultiplier, 3, 2),
                (Setting::Contingency, 5, 2),
            ]),
            milestones: fractions(&[
                (Milestone::ContractSigning, 10, 2),
                (Milestone::DesignComplete, 15, 2),
                (Milestone::PermitsIssued, 15, 2),
                (Milestone::Foundation, 20, 2),
                (Milestone::Framing, 20, 2),
                (Milestone::FinalInspection, 20, 2),
            ]),
            regional_multipliers: [
                (DEFAULT_REGION, 100),
                ("losAngeles", 110),
                ("sanFrancisco", 125),
                ("sanDiego", 105),
                ("sacramento", 95),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Decimal::new(v, 2).normalize()))
            .collect(),
        }
    }
}

impl PriceTable {
    pub fn get(&self, entry: &PriceEntry) -> Option<Decimal> {
        match entry {
            PriceEntry::BasePrice(k) => self.base_prices.get(k),
            PriceEntry::DesignService(k) => self.design_services.get(k),
            PriceEntry::Utility(k) => self.utilities.get(k),
            PriceEntry::Hvac(k) => self.hvac.get(k),
            PriceEntry::AddOn(k) => self.add_ons.get(k),
            PriceEntry::Kitchen(k) => self.kitchen.get(k),
            PriceEntry::Finish(k) => self.finishes.get(k),
            PriceEntry::SizeAdjustment(k) => self.size_adjustments.get(k),
            PriceEntry::Discount(k) => self.discounts.get(k),
            PriceEntry::Setting(k) => self.settings.get(k),
            PriceEntry::Milestone(k) => self.milestones.get(k),
            PriceEntry::RegionalMultiplier(k) => self.regional_multipliers.get(k),
        }
        .copied()
    }

    pub fn set(&mut self, entry: PriceEntry, value: Decimal) {
        match entry {
            PriceEntry::BasePrice(k) => {
                self.base_prices.insert(k, value);
            }
            PriceEntry::DesignService(k) => {
                self.design_services.insert(k, value);
            }
            PriceEntry::Utility(k) => {
                self.utilities.insert(k, value);
            }
            PriceEntry::Hvac(k) => {
                self.hvac.insert(k, value);
            }
            PriceEntry::AddOn(k) => {
                self.add_ons.insert(k, value);
            }
            PriceEntry::Kitchen(k) => {
                self.kitchen.insert(k, value);
            }
            PriceEntry::Finish(k) => {
                self.finishes.insert(k, value);
            }
            PriceEntry::SizeAdjustment(k) => {
                self.size_adjustments.insert(k, value);
            }
            PriceEntry::Discount(k) => {
                self.discounts.insert(k, value);
            }
            PriceEntry::Setting(k) => {
                self.settings.insert(k, value);
            }
            PriceEntry::Milestone(k) => {
                self.milestones.insert(k, value);
            }
            PriceEntry::RegionalMultiplier(k) => {
                self.regional_multipliers.insert(k, value);
            }
        }
    }

    /// Copy of this table with one cell replaced.
    pub fn with_value(&self, entry: PriceEntry, value: Decimal) -> PriceTable {
        let mut next = self.clone();
        next.set(entry, value);
        next
    }

    /// Every cell in category order.
    pub fn entries(&self) -> Vec<(PriceEntry, Decimal)> {
        fn collect<K: Copy>(
            out: &mut Vec<(PriceEntry, Decimal)>,
            map: &BTreeMap<K, Decimal>,
            wrap: fn(K) -> PriceEntry,
        ) {
            out.extend(map.iter().map(|(k, v)| (wrap(*k), *v)));
        }

        let mut out = Vec::new();
        collect(&mut out, &self.base_prices, PriceEntry::BasePrice);
        collect(&mut out, &self.design_services, PriceEntry::DesignService);
        collect(&mut out, &self.utilities, PriceEntry::Utility);
        collect(&mut out, &self.hvac, PriceEntry::Hvac);
        collect(&mut out, &self.add_ons, PriceEntry::AddOn);
        collect(&mut out, &self.kitchen, PriceEntry::Kitchen);
        collect(&mut out, &self.finishes, PriceEntry::Finish);
        collect(&mut out, &self.size_adjustments, PriceEntry::SizeAdjustment);
        collect(&mut out, &self.discounts, PriceEntry::Discount);
        collect(&mut out, &self.settings, PriceEntry::Setting);
        collect(&mut out, &self.milestones, PriceEntry::Milestone);
        out.extend(
            self.regional_multipliers
                .iter()
                .map(|(k, v)| (PriceEntry::RegionalMultiplier(k.clone()), *v)),
        );
        out
    }

    /// Defaults with every recognized cell of `document` laid on top.
    ///
    /// `document` is the category/key/value tree as exported. Unknown
    /// categories, unknown keys and non-numeric values are skipped and listed
    /// in [`Overlay::ignored`], so tables saved before a key existed still
    /// load with that key's default.
    pub fn overlay(document: &Value) -> Overlay {
        let mut table = PriceTable::default();
        let mut ignored = Vec::new();
        let Some(categories) = document.as_object() else {
            ignored.push("<root>".to_string());
            return Overlay { table, ignored };
        };
        for (name, cells) in categories {
            let (Ok(category), Some(cells)) = (name.parse::<Category>(), cells.as_object()) else {
                ignored.push(name.clone());
                continue;
            };
            for (key, raw) in cells {
                match (PriceEntry::parse(category, key), json_amount(raw)) {
                    (Ok(entry), Some(value)) => table.set(entry, value),
                    _ => ignored.push(format!("{name}.{key}")),
                }
            }
        }
        Overlay { table, ignored }
    }
}

fn json_amount(raw: &Value) -> Option<Decimal> {
    match raw {
        Value::Number(n) => parse_amount(&n.to_string()).ok(),
        Value::String(s) => parse_amount(s).ok(),
        _ => None,
    }
}
