use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::{KeyedStore, SETTINGS_KEY};

/// Fallback fee when a class has no entry in `classFees`.
pub const DEFAULT_FEE: f64 = 3000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettings {
    #[serde(default)]
    pub class_fees: BTreeMap<String, f64>,
    #[serde(default = "default_fee")]
    pub default_fee: f64,
}

fn default_fee() -> f64 {
    DEFAULT_FEE
}

impl Default for AdminSettings {
    fn default() -> Self {
        // Seed fee schedule for a fresh workspace; the admin edits these
        // through settings.update.
        let mut class_fees = BTreeMap::new();
        class_fees.insert("Pottery".to_string(), 3500.0);
        class_fees.insert("Sketching".to_string(), 2500.0);
        class_fees.insert("Watercolor".to_string(), 3000.0);
        class_fees.insert("Oil Painting".to_string(), 4000.0);
        class_fees.insert("Sculpture".to_string(), 4500.0);
        AdminSettings {
            class_fees,
            default_fee: DEFAULT_FEE,
        }
    }
}

impl AdminSettings {
    pub fn fee_for_class(&self, class: &str) -> f64 {
        self.class_fees.get(class).copied().unwrap_or(self.default_fee)
    }
}

pub fn load_settings(store: &dyn KeyedStore) -> AdminSettings {
    store
        .get(SETTINGS_KEY)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

pub fn save_settings(store: &dyn KeyedStore, settings: &AdminSettings) -> anyhow::Result<()> {
    store.set(SETTINGS_KEY, &serde_json::to_value(settings)?)
}
