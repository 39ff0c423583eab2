//! UI settings commands.

use super::{Output, json_string};
use crate::storage::Storage;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

fn validate_key(key: &str) -> Result<&str> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidArgument("Setting key is required".to_string()));
    }
    Ok(key)
}

/// A single setting.
#[derive(Debug, Serialize)]
pub struct SettingValue {
    pub key: String,
    /// None if the setting was never written
    pub value: Option<Value>,
}

impl Output for SettingValue {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match &self.value {
            Some(value) => format!("{} = {}", self.key, value),
            None => format!("{} is not set", self.key),
        }
    }
}

/// All settings keyed by name.
#[derive(Debug, Serialize)]
pub struct SettingsList {
    pub settings: Map<String, Value>,
}

impl Output for SettingsList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.settings.is_empty() {
            return "No settings.".to_string();
        }
        self.settings
            .iter()
            .map(|(key, value)| format!("{} = {}", key, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Read one setting.
pub fn setting_get(storage: &Storage, key: &str) -> Result<SettingValue> {
    let key = validate_key(key)?;
    Ok(SettingValue {
        key: key.to_string(),
        value: storage.get_setting(key)?,
    })
}

/// Write one setting, replacing any previous value.
pub fn setting_set(storage: &mut Storage, key: &str, value: Value) -> Result<SettingValue> {
    let key = validate_key(key)?;
    storage.set_setting(key, &value)?;
    Ok(SettingValue {
        key: key.to_string(),
        value: Some(value),
    })
}

/// List all settings.
pub fn setting_list(storage: &Storage) -> Result<SettingsList> {
    Ok(SettingsList {
        settings: storage.list_settings()?.into_iter().collect(),
    })
}
