// ── Collection names ──
//
// Each collection has a stable remote name (Firestore sub-collection under
// `users/{uid}`) and a stable local storage key. Neither may change without
// orphaning existing data.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

/// The eight persisted record sets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Collection {
    Events,
    Contracts,
    Templates,
    Customers,
    MenuItems,
    Services,
    ConstraintTags,
    SymbolPaletteItems,
}

impl Collection {
    /// Sub-collection name in the remote store.
    pub fn remote_name(self) -> &'static str {
        self.into()
    }

    /// Key used by the local key-value storage.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Events => "goldfin_events",
            Self::Contracts => "goldfin_contracts",
            Self::Templates => "goldfin_proposal_templates",
            Self::Customers => "goldfin_customers",
            Self::MenuItems => "goldfin_menu_items",
            Self::Services => "goldfin_services",
            Self::ConstraintTags => "goldfin_constraint_tags",
            Self::SymbolPaletteItems => "goldfin_symbol_palette_items",
        }
    }

    /// Prefix for locally generated record ids.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Events => "evt",
            Self::Contracts => "cont",
            Self::Templates => "tmpl",
            Self::Customers => "cust",
            Self::MenuItems => "menu",
            Self::Services => "serv",
            Self::ConstraintTags => "tag",
            Self::SymbolPaletteItems => "sym",
        }
    }

    /// Whether a first load on empty storage installs built-in sample data.
    pub fn seeds_samples(self) -> bool {
        matches!(
            self,
            Self::Customers
                | Self::MenuItems
                | Self::Services
                | Self::ConstraintTags
                | Self::SymbolPaletteItems
        )
    }
}

/// Storage key of the business-details singleton.
pub const BUSINESS_DETAILS_KEY: &str = "goldfin_business_details";

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn remote_names_are_camel_case() {
        let names: Vec<&str> = Collection::iter().map(Collection::remote_name).collect();
        assert_eq!(
            names,
            [
                "events",
                "contracts",
                "templates",
                "customers",
                "menuItems",
                "services",
                "constraintTags",
                "symbolPaletteItems",
            ]
        );
    }

    #[test]
    fn storage_keys_are_unique() {
        let mut keys: Vec<&str> = Collection::iter().map(Collection::storage_key).collect();
        keys.push(BUSINESS_DETAILS_KEY);
        let before = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn transactional_collections_never_seed() {
        assert!(!Collection::Events.seeds_samples());
        assert!(!Collection::Contracts.seeds_samples());
        assert!(!Collection::Templates.seeds_samples());
        assert!(Collection::MenuItems.seeds_samples());
    }
}
