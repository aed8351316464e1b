use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_TERMS: &str = "1. A 50% non-refundable deposit is required to secure the event date.\n2. Final guest count must be confirmed 14 days prior to the event.\n3. Final payment is due 7 days before the event date.";

/// Storefront metadata and feature toggles. Exactly one per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct BusinessDetails {
    pub business_name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub terms_and_conditions: String,
    pub enable_water_effect: bool,
    pub enable_overlay_effect: bool,
    pub include_terms_on_print: bool,
    pub include_terms_on_proposal: bool,
    pub show_daily_totals: bool,
    pub show_monthly_total: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BusinessDetails {
    fn default() -> Self {
        Self {
            business_name: String::new(),
            address: String::new(),
            phone: String::new(),
            email: String::new(),
            website: String::new(),
            terms_and_conditions: DEFAULT_TERMS.to_owned(),
            enable_water_effect: true,
            enable_overlay_effect: true,
            include_terms_on_print: true,
            include_terms_on_proposal: true,
            show_daily_totals: true,
            show_monthly_total: true,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_document_fills_defaults() {
        let d: BusinessDetails =
            serde_json::from_value(json!({ "businessName": "GoldFin", "showDailyTotals": false }))
                .unwrap();
        assert_eq!(d.business_name, "GoldFin");
        assert!(!d.show_daily_totals);
        assert!(d.show_monthly_total);
        assert_eq!(d.terms_and_conditions, DEFAULT_TERMS);
    }
}
