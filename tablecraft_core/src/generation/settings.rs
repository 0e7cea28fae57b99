use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::trace;

pub const DEFAULT_TOTAL_RECORDS: u32 = 50;

/// Per-table knobs for a generation job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSettings {
    pub name: String,
    /// Free-text prompt steering the generated values
    pub query: String,
    pub total_records: u32,
    /// Sample rows or hints pasted by the user
    pub examples: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsUpdate {
    pub query: Option<String>,
    pub total_records: Option<u32>,
    pub examples: Option<String>,
}

/// Generation settings keyed by table id.
///
/// Entries outlive their tables until `remove_table_settings` or
/// `retain_tables` drops them.
#[derive(Debug, Clone)]
pub struct GenerationSettingsStore {
    settings: HashMap<String, TableSettings>,
    default_total_records: u32,
}

impl Default for GenerationSettingsStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_RECORDS)
    }
}

impl GenerationSettingsStore {
    pub fn new(default_total_records: u32) -> Self {
        Self {
            settings: HashMap::new(),
            default_total_records,
        }
    }

    pub fn defaults_for(&self, table_name: &str) -> TableSettings {
        TableSettings {
            name: table_name.to_string(),
            query: String::new(),
            total_records: self.default_total_records,
            examples: String::new(),
        }
    }

    /// Stored settings, or defaults named after `table_name`
    pub fn table_settings(&self, table_id: &str, table_name: &str) -> TableSettings {
        self.settings
            .get(table_id)
            .cloned()
            .unwrap_or_else(|| self.defaults_for(table_name))
    }

    pub fn has_settings(&self, table_id: &str) -> bool {
        self.settings.contains_key(table_id)
    }

    pub fn set_table_settings(&mut self, table_id: impl Into<String>, settings: TableSettings) {
        let table_id = table_id.into();
        trace!(
            table = %table_id,
            total_records = settings.total_records,
            "Storing generation settings"
        );
        self.settings.insert(table_id, settings);
    }

    /// Merge onto the current settings (or the defaults) and store the result
    pub fn update_table_settings(
        &mut self,
        table_id: &str,
        table_name: &str,
        update: SettingsUpdate,
    ) -> TableSettings {
        let mut settings = self.table_settings(table_id, table_name);
        settings.name = table_name.to_string();
        if let Some(query) = update.query {
            settings.query = query;
        }
        if let Some(total_records) = update.total_records {
            settings.total_records = total_records;
        }
        if let Some(examples) = update.examples {
            settings.examples = examples;
        }
        self.settings.insert(table_id.to_string(), settings.clone());
        settings
    }

    pub fn remove_table_settings(&mut self, table_id: &str) -> Option<TableSettings> {
        self.settings.remove(table_id)
    }

    /// Drop entries for tables no longer present
    pub fn retain_tables(&mut self, table_ids: &HashSet<&str>) -> usize {
        let before = self.settings.len();
        self.settings.retain(|id, _| table_ids.contains(id.as_str()));
        before - self.settings.len()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}
