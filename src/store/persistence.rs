//! Typed persistence over a [`KeyValueStore`]

use super::{KeyValueStore, StoreError};
use crate::alert::Alert;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const ALERTS_KEY: &str = "alerts";
const SYMBOLS_KEY: &str = "symbols";
const HOLDINGS_KEY: &str = "holdings";
const PREFERENCES_KEY: &str = "preferences";

/// User display settings, stored but not interpreted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayPreferences {
    pub currency: String,
    pub decimals: u32,
    pub show_after_hours: bool,
    pub sound_enabled: bool,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            decimals: 2,
            show_after_hours: true,
            sound_enabled: false,
        }
    }
}

/// Reads and writes the engine's persisted collections
///
/// Every key is namespaced with `prefix`. Writes replace the whole
/// collection (last write wins).
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn load_alerts(&self) -> Result<Vec<Alert>, StoreError> {
        Ok(self.load(ALERTS_KEY)?.unwrap_or_default())
    }

    pub fn save_alerts(&self, alerts: &[Alert]) -> Result<(), StoreError> {
        self.save(ALERTS_KEY, &alerts)
    }

    pub fn load_symbols(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load(SYMBOLS_KEY)?.unwrap_or_default())
    }

    pub fn save_symbols(&self, symbols: &[String]) -> Result<(), StoreError> {
        self.save(SYMBOLS_KEY, &symbols)
    }

    pub fn load_holdings(&self) -> Result<HashMap<String, Decimal>, StoreError> {
        Ok(self.load(HOLDINGS_KEY)?.unwrap_or_default())
    }

    pub fn save_holdings(&self, holdings: &HashMap<String, Decimal>) -> Result<(), StoreError> {
        self.save(HOLDINGS_KEY, holdings)
    }

    pub fn load_preferences(&self) -> Result<DisplayPreferences, StoreError> {
        Ok(self.load(PREFERENCES_KEY)?.unwrap_or_default())
    }

    pub fn save_preferences(&self, prefs: &DisplayPreferences) -> Result<(), StoreError> {
        self.save(PREFERENCES_KEY, prefs)
    }

    /// Drop everything under this prefix
    pub fn clear(&self) -> Result<usize, StoreError> {
        self.store.clear(&self.prefix)
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(&self.key(name))? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn save<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        self.store
            .set(&self.key(name), serde_json::to_value(value)?, None)
    }
}
