//! Project description supplied by the intake form.

use crate::category::{
    AddOn, DesignService, Discount, Finish, HvacSystem, KitchenPackage, StructureType, Utility,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Region key every table carries; used when a project's region is unknown.
pub const DEFAULT_REGION: &str = "default";

/// How a utility is provisioned for the ADU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UtilityChoice {
    /// Shared with the main house; listed at $0.
    Shared,
    /// Separately metered; charged at the configured price.
    Separate,
}

/// Everything the engine needs to price one project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    pub square_footage: u32,
    pub structure_type: StructureType,
    #[serde(default)]
    pub bedrooms: u8,
    #[serde(default)]
    pub bathrooms: u8,
    #[serde(default)]
    pub hvac: Option<HvacSystem>,
    #[serde(default)]
    pub utilities: BTreeMap<Utility, UtilityChoice>,
    #[serde(default)]
    pub design_services: BTreeSet<DesignService>,
    #[serde(default)]
    pub add_ons: BTreeSet<AddOn>,
    #[serde(default)]
    pub kitchen: Option<KitchenPackage>,
    /// Selected finishes with a count; the count is ignored for flat items.
    #[serde(default)]
    pub finishes: BTreeMap<Finish, u32>,
    #[serde(default)]
    pub discounts: BTreeSet<Discount>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub rush: bool,
    #[serde(default)]
    pub complex_site: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl ProjectSpec {
    /// A bare project: no optional items, default region, no markups flags.
    pub fn new(structure_type: StructureType, square_footage: u32) -> Self {
        Self {
            square_footage,
            structure_type,
            bedrooms: 0,
            bathrooms: 0,
            hvac: None,
            utilities: BTreeMap::new(),
            design_services: BTreeSet::new(),
            add_ons: BTreeSet::new(),
            kitchen: None,
            finishes: BTreeMap::new(),
            discounts: BTreeSet::new(),
            region: default_region(),
            rush: false,
            complex_site: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_form_payload() {
        let payload = r#"{
            "squareFootage": 640,
            "structureType": "garageConversion",
            "bedrooms": 1,
            "bathrooms": 1,
            "hvac": "miniSplit",
            "utilities": { "water": "shared", "electric": "separate" },
            "addOns": ["extraBathroom"],
            "finishes": { "recessedLighting": 12 },
            "discounts": ["veteran"],
            "region": "sanDiego",
            "rush": true
        }"#;
        let spec: ProjectSpec = serde_json::from_str(payload).unwrap();
        assert_eq!(spec.structure_type, StructureType::GarageConversion);
        assert_eq!(spec.utilities[&Utility::Electric], UtilityChoice::Separate);
        assert_eq!(spec.finishes[&Finish::RecessedLighting], 12);
        assert!(spec.rush);
        assert!(!spec.complex_site);
        assert!(spec.kitchen.is_none());
    }

    #[test]
    fn missing_region_means_default() {
        let spec: ProjectSpec =
            serde_json::from_str(r#"{"squareFootage": 500, "structureType": "juniorAdu"}"#)
                .unwrap();
        assert_eq!(spec, ProjectSpec::new(StructureType::JuniorAdu, 500));
    }

    #[test]
    fn unknown_structure_type_is_rejected() {
        let res: Result<ProjectSpec, _> =
            serde_json::from_str(r#"{"squareFootage": 500, "structureType": "treehouse"}"#);
        assert!(res.is_err());
    }
}
