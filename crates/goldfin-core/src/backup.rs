// ── Backup file format ──
//
// One JSON object keyed by local storage key, plus `version` and
// `exportedAt`. Files without a version are the legacy unversioned
// format and are read as version 1.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use strum::IntoEnumIterator;

use crate::error::CoreError;
use crate::model::{
    BUSINESS_DETAILS_KEY, BusinessDetails, Collection, ConstraintTag, Contract, Customer, Event,
    MenuItem, Record, Service, SymbolPaletteItem, Template,
};
use crate::store::StateReset;

pub const BACKUP_VERSION: u64 = 1;

/// The full contents of a backup file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Backup {
    pub events: Vec<Event>,
    pub contracts: Vec<Contract>,
    pub templates: Vec<Template>,
    pub customers: Vec<Customer>,
    pub menu_items: Vec<MenuItem>,
    pub services: Vec<Service>,
    pub constraint_tags: Vec<ConstraintTag>,
    pub symbol_palette_items: Vec<SymbolPaletteItem>,
    /// Absent in files written before settings were exported.
    pub business_details: Option<BusinessDetails>,
}

/// Suggested download name, e.g. `goldfin_backup_2025-03-14.json`.
pub fn file_name(date: NaiveDate) -> String {
    format!("goldfin_backup_{}.json", date.format("%Y-%m-%d"))
}

impl Backup {
    pub fn to_json(&self, exported_at: DateTime<Utc>) -> Result<Value, CoreError> {
        let mut root = Map::new();
        root.insert("version".into(), Value::from(BACKUP_VERSION));
        root.insert(
            "exportedAt".into(),
            Value::String(exported_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        put(&mut root, &self.events)?;
        put(&mut root, &self.contracts)?;
        put(&mut root, &self.templates)?;
        put(&mut root, &self.customers)?;
        put(&mut root, &self.menu_items)?;
        put(&mut root, &self.services)?;
        put(&mut root, &self.constraint_tags)?;
        put(&mut root, &self.symbol_palette_items)?;
        if let Some(details) = &self.business_details {
            root.insert(BUSINESS_DETAILS_KEY.into(), serde_json::to_value(details)?);
        }
        Ok(Value::Object(root))
    }

    /// Parse a backup, rejecting any version this build does not know.
    pub fn from_json(value: &Value) -> Result<Self, CoreError> {
        let Value::Object(root) = value else {
            return Err(invalid("top level is not an object"));
        };

        match root.get("version") {
            None => {}
            Some(v) => {
                let found = v
                    .as_u64()
                    .ok_or_else(|| invalid("version is not a positive integer"))?;
                if !(1..=BACKUP_VERSION).contains(&found) {
                    return Err(CoreError::UnsupportedBackupVersion {
                        found,
                        supported: BACKUP_VERSION,
                    });
                }
            }
        }

        let known = root.contains_key(BUSINESS_DETAILS_KEY)
            || Collection::iter().any(|c| root.contains_key(c.storage_key()));
        if !known {
            return Err(invalid("no GoldFin data found"));
        }

        Ok(Self {
            events: take(root)?,
            contracts: take(root)?,
            templates: take(root)?,
            customers: take(root)?,
            menu_items: take(root)?,
            services: take(root)?,
            constraint_tags: take(root)?,
            symbol_palette_items: take(root)?,
            business_details: root
                .get(BUSINESS_DETAILS_KEY)
                .map(|v| parse(BUSINESS_DETAILS_KEY, v))
                .transpose()?,
        })
    }

    /// The state-container value this backup restores, using `fallback`
    /// settings when the file carries none.
    pub fn into_reset(self, fallback: BusinessDetails) -> StateReset {
        StateReset {
            events: self.events,
            contracts: self.contracts,
            templates: self.templates,
            customers: self.customers,
            menu_items: self.menu_items,
            services: self.services,
            constraint_tags: self.constraint_tags,
            symbol_palette_items: self.symbol_palette_items,
            business_details: self.business_details.unwrap_or(fallback),
        }
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::InvalidBackup {
        message: message.to_owned(),
    }
}

fn put<T: Record + Serialize>(root: &mut Map<String, Value>, items: &[T]) -> Result<(), CoreError> {
    root.insert(T::COLLECTION.storage_key().into(), serde_json::to_value(items)?);
    Ok(())
}

/// A missing collection key restores as empty.
fn take<T: Record>(root: &Map<String, Value>) -> Result<Vec<T>, CoreError> {
    let key = T::COLLECTION.storage_key();
    match root.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => parse(key, v),
    }
}

fn parse<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, CoreError> {
    serde_json::from_value(value.clone()).map_err(|e| CoreError::InvalidBackup {
        message: format!("{key}: {e}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        assert_eq!(file_name(date), "goldfin_backup_2025-03-04.json");
    }

    #[test]
    fn export_then_import_preserves_records() {
        let backup = Backup {
            customers: vec![Customer {
                id: "cust_1".into(),
                name: "The Family".into(),
                ..Customer::default()
            }],
            business_details: Some(BusinessDetails::default()),
            ..Backup::default()
        };
        let json = backup.to_json(Utc::now()).unwrap();
        assert_eq!(json["version"], json!(1));
        assert!(json["goldfin_proposal_templates"].is_array());

        let back = Backup::from_json(&json).unwrap();
        assert_eq!(back, backup);
    }

    #[test]
    fn legacy_file_without_version_is_accepted() {
        let json = json!({ "goldfin_events": [{ "id": "evt_1", "clientName": "A" }] });
        let backup = Backup::from_json(&json).unwrap();
        assert_eq!(backup.events.len(), 1);
        assert!(backup.contracts.is_empty());
        assert!(backup.business_details.is_none());
    }

    #[test]
    fn newer_version_is_rejected() {
        let json = json!({ "version": 2, "goldfin_events": [] });
        assert!(matches!(
            Backup::from_json(&json),
            Err(CoreError::UnsupportedBackupVersion { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn version_zero_is_rejected() {
        let json = json!({ "version": 0, "goldfin_events": [] });
        assert!(matches!(
            Backup::from_json(&json),
            Err(CoreError::UnsupportedBackupVersion { found: 0, supported: 1 })
        ));
    }

    #[test]
    fn unrelated_json_is_rejected() {
        assert!(matches!(
            Backup::from_json(&json!({ "hello": "world" })),
            Err(CoreError::InvalidBackup { .. })
        ));
        assert!(matches!(
            Backup::from_json(&json!([1, 2, 3])),
            Err(CoreError::InvalidBackup { .. })
        ));
    }

    #[test]
    fn malformed_collection_names_the_key() {
        let err = Backup::from_json(&json!({ "goldfin_contracts": "nope" })).unwrap_err();
        assert!(err.to_string().contains("goldfin_contracts"));
    }
}
