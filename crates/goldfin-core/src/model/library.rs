// ── Templates, customers and reference libraries ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Collection, MenuLine, Record, RecordId};

/// Reusable bundle of menu items, services and terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub menu_items: Vec<MenuLine>,
    #[serde(default)]
    pub services: Vec<Value>,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_and_conditions: Option<String>,
    /// ISO-8601 creation time. Older templates lack it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingType {
    #[default]
    Flat,
    Hourly,
    #[serde(rename = "perPerson")]
    PerPerson,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pricing_type: PricingType,
    #[serde(default)]
    pub price: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Dietary-restriction label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintTag {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolPaletteItem {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub hover_text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

macro_rules! impl_record {
    ($($ty:ty => $collection:expr),+ $(,)?) => {
        $(
            impl Record for $ty {
                const COLLECTION: Collection = $collection;

                fn id(&self) -> &RecordId {
                    &self.id
                }

                fn set_id(&mut self, id: RecordId) {
                    self.id = id;
                }
            }
        )+
    };
}

impl_record! {
    Template => Collection::Templates,
    Customer => Collection::Customers,
    MenuItem => Collection::MenuItems,
    Service => Collection::Services,
    ConstraintTag => Collection::ConstraintTags,
    SymbolPaletteItem => Collection::SymbolPaletteItems,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_pricing_type_is_lowercase() {
        let s: Service = serde_json::from_value(json!({
            "id": "serv_1", "name": "On-site Chef", "pricingType": "hourly", "price": 75
        }))
        .unwrap();
        assert_eq!(s.pricing_type, PricingType::Hourly);
        assert!((s.price - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn symbol_uses_hover_text_key() {
        let sym = SymbolPaletteItem {
            id: "sym_1".into(),
            symbol: "🌱".into(),
            hover_text: "Plant-Based / Vegan".into(),
            extra: Map::new(),
        };
        let v = serde_json::to_value(&sym).unwrap();
        assert_eq!(v["hoverText"], json!("Plant-Based / Vegan"));
    }
}
