// ── Bulk data operations ──
//
// Export, import, wipe and sample regeneration. These bypass the
// per-record command path and reset whole collections at once.

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use super::Session;
use crate::backup::{self, Backup};
use crate::error::CoreError;
use crate::model::{ConstraintTag, Customer, MenuItem, Service, SymbolPaletteItem};
use crate::store::{StateReset, Stored};

impl Session {
    /// Snapshot every collection and the business details.
    pub fn export(&self) -> Result<Value, CoreError> {
        let state = &self.inner.state;
        let backup = Backup {
            events: state.records_owned(),
            contracts: state.records_owned(),
            templates: state.records_owned(),
            customers: state.records_owned(),
            menu_items: state.records_owned(),
            services: state.records_owned(),
            constraint_tags: state.records_owned(),
            symbol_palette_items: state.records_owned(),
            business_details: Some(state.business_details().as_ref().clone()),
        };
        backup.to_json(Utc::now())
    }

    /// File name for an export taken today.
    pub fn export_file_name() -> String {
        backup::file_name(Utc::now().date_naive())
    }

    /// Replace all data with the contents of a backup.
    ///
    /// In Cloud Mode the remote collections are wiped and rewritten in
    /// batches before the state container is reset; any remote failure
    /// aborts the import and leaves state untouched.
    pub async fn import(&self, value: &Value) -> Result<(), CoreError> {
        let backup = Backup::from_json(value)?;
        let _guard = self.inner.command_lock.lock().await;
        self.require_writable()?;

        match &self.inner.remote {
            None => {
                let local = &self.inner.local;
                local.save(&backup.events)?;
                local.save(&backup.contracts)?;
                local.save(&backup.templates)?;
                local.save(&backup.customers)?;
                local.save(&backup.menu_items)?;
                local.save(&backup.services)?;
                local.save(&backup.constraint_tags)?;
                local.save(&backup.symbol_palette_items)?;
                if let Some(details) = &backup.business_details {
                    local.save_business_details(details)?;
                }
            }
            Some(remote) => {
                remote.wipe_all().await?;
                remote.replace_collection(&backup.events).await?;
                remote.replace_collection(&backup.contracts).await?;
                remote.replace_collection(&backup.templates).await?;
                remote.replace_collection(&backup.customers).await?;
                remote.replace_collection(&backup.menu_items).await?;
                remote.replace_collection(&backup.services).await?;
                remote.replace_collection(&backup.constraint_tags).await?;
                remote.replace_collection(&backup.symbol_palette_items).await?;
                if let Some(details) = &backup.business_details {
                    remote.save_settings(details).await?;
                    self.inner.local.save_business_details(details)?;
                }
            }
        }

        self.inner.local.set_no_seed(false);
        let fallback = self.inner.state.business_details().as_ref().clone();
        let reset = backup.into_reset(fallback);
        info!(events = reset.events.len(), contracts = reset.contracts.len(), "backup imported");
        self.inner.state.reset(reset);
        Ok(())
    }

    /// Delete every record in every collection. Business details are kept
    /// and sample data is not reinstalled for the rest of the session.
    pub async fn wipe_all_data(&self) -> Result<(), CoreError> {
        let _guard = self.inner.command_lock.lock().await;
        self.require_writable()?;
        if let Some(remote) = &self.inner.remote {
            remote.wipe_all().await?;
        }
        self.inner.local.clear_all()?;

        let details = self.inner.state.business_details().as_ref().clone();
        self.inner.state.reset(StateReset::empty(details));
        info!("all data wiped");
        Ok(())
    }

    /// Overwrite the library collections with the built-in samples.
    /// Events, contracts and templates are left alone.
    pub async fn regenerate_samples(&self) -> Result<(), CoreError> {
        let _guard = self.inner.command_lock.lock().await;
        self.require_writable()?;
        let local = &self.inner.local;
        local.reseed_samples()?;

        self.restore_library(local.load::<Customer>()).await?;
        self.restore_library(local.load::<MenuItem>()).await?;
        self.restore_library(local.load::<Service>()).await?;
        self.restore_library(local.load::<ConstraintTag>()).await?;
        self.restore_library(local.load::<SymbolPaletteItem>()).await?;
        info!("sample libraries restored");
        Ok(())
    }

    async fn restore_library<T: Stored>(&self, items: Vec<T>) -> Result<(), CoreError> {
        if let Some(remote) = &self.inner.remote {
            remote.replace_collection(&items).await?;
        }
        self.inner.state.set(items);
        Ok(())
    }
}

