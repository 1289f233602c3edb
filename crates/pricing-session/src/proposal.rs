//! Request assembly for the external PDF proposal renderer.
//!
//! The renderer is opaque: it receives a template name and a flat
//! key-value document and returns the rendered bytes or fails.

use pricing_core::{Calculation, ProjectSpec};
use pricing_engine::Installment;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PROPOSAL_TEMPLATE: &str = "adu-proposal";

/// Client and property identifiers collected by the intake form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub property_address: String,
    #[serde(default)]
    pub project_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    pub template: String,
    pub document: BTreeMap<String, String>,
    pub calculation: Calculation,
}

/// Remote document renderer, e.g. the PDF proxy.
pub trait ProposalRenderer {
    fn render(&self, request: &ProposalRequest) -> anyhow::Result<Vec<u8>>;
}

fn money(d: Decimal) -> String {
    format!("{:.2}", d)
}

/// Flatten the client, project and final calculation into the renderer's document.
pub fn build_request(
    client: &ClientRecord,
    spec: &ProjectSpec,
    calculation: &Calculation,
    schedule: &[Installment],
) -> ProposalRequest {
    let mut doc = BTreeMap::new();
    let mut put = |k: String, v: String| {
        doc.insert(k, v);
    };

    put("client.name".into(), client.name.clone());
    put("client.address".into(), client.property_address.clone());
    if let Some(email) = &client.email {
        put("client.email".into(), email.clone());
    }
    if let Some(phone) = &client.phone {
        put("client.phone".into(), phone.clone());
    }
    put(
        "project.name".into(),
        client
            .project_name
            .clone()
            .unwrap_or_else(|| format!("{} ADU", client.property_address)),
    );
    put("project.structureType".into(), spec.structure_type.label().to_string());
    put("project.squareFootage".into(), spec.square_footage.to_string());
    put("project.bedrooms".into(), spec.bedrooms.to_string());
    put("project.bathrooms".into(), spec.bathrooms.to_string());
    put("project.region".into(), spec.region.clone());

    for (i, line) in calculation.line_items.iter().enumerate() {
        put(format!("line.{i}.category"), line.category.label().to_string());
        put(format!("line.{i}.description"), line.description.clone());
        put(format!("line.{i}.quantity"), line.quantity.to_string());
        put(format!("line.{i}.unitPrice"), money(line.unit_price));
        put(format!("line.{i}.amount"), money(line.amount));
    }

    put("total.subtotal".into(), money(calculation.subtotal));
    put("total.discount".into(), money(calculation.discount_amount));
    put("total.contingency".into(), money(calculation.contingency));
    put("total.tax".into(), money(calculation.tax));
    put("total.grandTotal".into(), money(calculation.grand_total));
    put("total.pricePerSqft".into(), calculation.price_per_sqft.to_string());

    for p in schedule {
        let key = p.milestone.as_str();
        put(format!("payment.{key}.label"), p.milestone.label().to_string());
        put(format!("payment.{key}.amount"), money(p.amount));
    }

    ProposalRequest {
        template: PROPOSAL_TEMPLATE.to_string(),
        document: doc,
        calculation: calculation.clone(),
    }
}
