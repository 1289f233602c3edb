//! Closed vocabulary of price categories and the keys each one accepts.

use crate::bounds::PriceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named category of the price table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    BasePrices,
    DesignServices,
    Utilities,
    Hvac,
    AddOns,
    Kitchen,
    Finishes,
    SizeAdjustments,
    Discounts,
    Settings,
    Milestones,
    RegionalMultipliers,
}

impl Category {
    pub const ALL: &'static [Category] = &[
        Category::BasePrices,
        Category::DesignServices,
        Category::Utilities,
        Category::Hvac,
        Category::AddOns,
        Category::Kitchen,
        Category::Finishes,
        Category::SizeAdjustments,
        Category::Discounts,
        Category::Settings,
        Category::Milestones,
        Category::RegionalMultipliers,
    ];

    /// Key used for this category in stored and exported documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::BasePrices => "basePrices",
            Category::DesignServices => "designServices",
            Category::Utilities => "utilities",
            Category::Hvac => "hvac",
            Category::AddOns => "addOns",
            Category::Kitchen => "kitchen",
            Category::Finishes => "finishes",
            Category::SizeAdjustments => "sizeAdjustments",
            Category::Discounts => "discounts",
            Category::Settings => "settings",
            Category::Milestones => "milestones",
            Category::RegionalMultipliers => "regionalMultipliers",
        }
    }

    /// Dollar categories are subject to the `[min_price, max_price]` bound.
    pub fn is_dollar(self) -> bool {
        matches!(
            self,
            Category::BasePrices
                | Category::DesignServices
                | Category::Utilities
                | Category::Hvac
                | Category::AddOns
                | Category::Kitchen
                | Category::Finishes
        )
    }

    /// Fraction and multiplier categories, which may not go negative.
    pub fn is_fractional(self) -> bool {
        matches!(
            self,
            Category::Discounts
                | Category::Settings
                | Category::Milestones
                | Category::RegionalMultipliers
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| PriceError::UnknownCategory(s.to_string()))
    }
}

/// Defines a key enum bound to one category, with its wire key and a
/// human-readable label used for line item descriptions.
macro_rules! price_keys {
    (
        $(#[$meta:meta])*
        $name:ident in $category:ident {
            $($variant:ident => ($key:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $key)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const CATEGORY: Category = Category::$category;

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $key,)+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = PriceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($key => Ok($name::$variant),)+
                    _ => Err(PriceError::UnknownKey {
                        category: Category::$category,
                        key: s.to_string(),
                    }),
                }
            }
        }
    };
}

price_keys! {
    /// ADU structure type; selects the per-square-foot base rate.
    StructureType in BasePrices {
        DetachedOneStory => ("detachedOneStory", "Detached one-story ADU"),
        DetachedTwoStory => ("detachedTwoStory", "Detached two-story ADU"),
        AttachedOneStory => ("attachedOneStory", "Attached one-story ADU"),
        AttachedTwoStory => ("attachedTwoStory", "Attached two-story ADU"),
        GarageConversion => ("garageConversion", "Garage conversion"),
        JuniorAdu => ("juniorAdu", "Junior ADU"),
    }
}

price_keys! {
    DesignService in DesignServices {
        ArchitecturalPlans => ("architecturalPlans", "Architectural plans"),
        StructuralEngineering => ("structuralEngineering", "Structural engineering"),
        Title24Energy => ("title24Energy", "Title 24 energy report"),
        SoilsReport => ("soilsReport", "Soils report"),
        SiteSurvey => ("siteSurvey", "Site survey"),
        PermitExpediting => ("permitExpediting", "Permit expediting"),
    }
}

price_keys! {
    /// Utility connection; priced only when metered separately.
    Utility in Utilities {
        Water => ("water", "Water service"),
        Sewer => ("sewer", "Sewer connection"),
        Electric => ("electric", "Electrical service"),
        Gas => ("gas", "Gas line"),
    }
}

price_keys! {
    HvacSystem in Hvac {
        MiniSplit => ("miniSplit", "Ductless mini-split"),
        CentralAc => ("centralAc", "Central air conditioning"),
        HeatPump => ("heatPump", "Ducted heat pump"),
    }
}

price_keys! {
    AddOn in AddOns {
        ExtraBathroom => ("extraBathroom", "Extra bathroom"),
        SolarPanels => ("solarPanels", "Solar panels"),
        Deck => ("deck", "Deck"),
        DedicatedDriveway => ("dedicatedDriveway", "Dedicated driveway"),
        FireSprinklers => ("fireSprinklers", "Fire sprinklers"),
        Landscaping => ("landscaping", "Landscaping"),
    }
}

price_keys! {
    KitchenPackage in Kitchen {
        Kitchenette => ("kitchenette", "Kitchenette"),
        StandardKitchen => ("standardKitchen", "Standard kitchen"),
        PremiumKitchen => ("premiumKitchen", "Premium kitchen"),
    }
}

price_keys! {
    Finish in Finishes {
        PremiumFixtures => ("premiumFixtures", "Premium plumbing fixtures"),
        RecessedLighting => ("recessedLighting", "Recessed lighting"),
        PremiumFlooring => ("premiumFlooring", "Premium flooring upgrade"),
        QuartzCountertops => ("quartzCountertops", "Quartz countertops"),
        CustomCabinetry => ("customCabinetry", "Custom cabinetry"),
    }
}

price_keys! {
    /// Square-footage bracket carrying a per-square-foot rate delta.
    SizeBracket in SizeAdjustments {
        Under400 => ("under400", "Under 400 sqft"),
        From400To600 => ("from400To600", "400 to 599 sqft"),
        Over1200 => ("over1200", "Over 1200 sqft"),
    }
}

price_keys! {
    Discount in Discounts {
        FriendsAndFamily => ("friendsAndFamily", "Friends & family discount"),
        Veteran => ("veteran", "Veteran discount"),
        Senior => ("senior", "Senior discount"),
        Cash => ("cash", "Cash payment discount"),
        Referral => ("referral", "Referral discount"),
    }
}

price_keys! {
    /// Business settings: markups, taxes and other fractions.
    Setting in Settings {
        StandardMarkup => ("standardMarkup", "Standard markup"),
        RushJobMarkup => ("rushJobMarkup", "Rush job markup"),
        ComplexSiteMarkup => ("complexSiteMarkup", "Complex site markup"),
        SalesTax => ("salesTax", "Sales tax"),
        PermitCostMultiplier => ("permitCostMultiplier", "Permits & fees"),
        Contingency => ("contingency", "Contingency"),
    }
}

price_keys! {
    /// Payment schedule milestone, in contract order.
    Milestone in Milestones {
        ContractSigning => ("contractSigning", "Contract signing"),
        DesignComplete => ("designComplete", "Design complete"),
        PermitsIssued => ("permitsIssued", "Permits issued"),
        Foundation => ("foundation", "Foundation poured"),
        Framing => ("framing", "Framing complete"),
        FinalInspection => ("finalInspection", "Final inspection"),
    }
}

impl SizeBracket {
    /// Whether `square_footage` falls inside this bracket. Brackets do not overlap.
    pub fn contains(self, square_footage: u32) -> bool {
        match self {
            SizeBracket::Under400 => square_footage < 400,
            SizeBracket::From400To600 => (400..600).contains(&square_footage),
            SizeBracket::Over1200 => square_footage > 1200,
        }
    }
}

/// How an optional item's configured price is extended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Unit {
    /// One charge regardless of quantity.
    Flat,
    /// Price multiplied by a caller-supplied count.
    PerCount,
}

impl Finish {
    pub fn unit(self) -> Unit {
        match self {
            Finish::PremiumFixtures | Finish::RecessedLighting => Unit::PerCount,
            Finish::PremiumFlooring | Finish::QuartzCountertops | Finish::CustomCabinetry => {
                Unit::Flat
            }
        }
    }
}

/// A single addressable cell of the price table.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriceEntry {
    BasePrice(StructureType),
    DesignService(DesignService),
    Utility(Utility),
    Hvac(HvacSystem),
    AddOn(AddOn),
    Kitchen(KitchenPackage),
    Finish(Finish),
    SizeAdjustment(SizeBracket),
    Discount(Discount),
    Setting(Setting),
    Milestone(Milestone),
    RegionalMultiplier(String),
}

impl PriceEntry {
    /// Resolve a category/key pair as the UI names them.
    pub fn parse(category: Category, key: &str) -> Result<Self, PriceError> {
        Ok(match category {
            Category::BasePrices => PriceEntry::BasePrice(key.parse()?),
            Category::DesignServices => PriceEntry::DesignService(key.parse()?),
            Category::Utilities => PriceEntry::Utility(key.parse()?),
            Category::Hvac => PriceEntry::Hvac(key.parse()?),
            Category::AddOns => PriceEntry::AddOn(key.parse()?),
            Category::Kitchen => PriceEntry::Kitchen(key.parse()?),
            Category::Finishes => PriceEntry::Finish(key.parse()?),
            Category::SizeAdjustments => PriceEntry::SizeAdjustment(key.parse()?),
            Category::Discounts => PriceEntry::Discount(key.parse()?),
            Category::Settings => PriceEntry::Setting(key.parse()?),
            Category::Milestones => PriceEntry::Milestone(key.parse()?),
            Category::RegionalMultipliers => {
                let region = key.trim();
                if region.is_empty() {
                    return Err(PriceError::UnknownKey {
                        category,
                        key: key.to_string(),
                    });
                }
                PriceEntry::RegionalMultiplier(region.to_string())
            }
        })
    }

    pub fn category(&self) -> Category {
        match self {
            PriceEntry::BasePrice(_) => Category::BasePrices,
            PriceEntry::DesignService(_) => Category::DesignServices,
            PriceEntry::Utility(_) => Category::Utilities,
            PriceEntry::Hvac(_) => Category::Hvac,
            PriceEntry::AddOn(_) => Category::AddOns,
            PriceEntry::Kitchen(_) => Category::Kitchen,
            PriceEntry::Finish(_) => Category::Finishes,
            PriceEntry::SizeAdjustment(_) => Category::SizeAdjustments,
            PriceEntry::Discount(_) => Category::Discounts,
            PriceEntry::Setting(_) => Category::Settings,
            PriceEntry::Milestone(_) => Category::Milestones,
            PriceEntry::RegionalMultiplier(_) => Category::RegionalMultipliers,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            PriceEntry::BasePrice(k) => k.as_str(),
            PriceEntry::DesignService(k) => k.as_str(),
            PriceEntry::Utility(k) => k.as_str(),
            PriceEntry::Hvac(k) => k.as_str(),
            PriceEntry::AddOn(k) => k.as_str(),
            PriceEntry::Kitchen(k) => k.as_str(),
            PriceEntry::Finish(k) => k.as_str(),
            PriceEntry::SizeAdjustment(k) => k.as_str(),
            PriceEntry::Discount(k) => k.as_str(),
            PriceEntry::Setting(k) => k.as_str(),
            PriceEntry::Milestone(k) => k.as_str(),
            PriceEntry::RegionalMultiplier(k) => k.as_str(),
        }
    }
}

impl fmt::Display for PriceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category(), self.key())
    }
}
