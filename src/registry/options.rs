use crate::utils::errors::{CertimateError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type ConfigMap = Map<String, Value>;

/// Opaque provider configuration, handed unchanged to a constructor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderOptions {
    #[serde(default)]
    pub access_config: ConfigMap,
    #[serde(default)]
    pub extended_config: ConfigMap,
}

impl ProviderOptions {
    pub fn new(access_config: ConfigMap, extended_config: ConfigMap) -> Self {
        Self {
            access_config,
            extended_config,
        }
    }

    /// Access config first, extended config filling the gaps
    pub fn merged(&self) -> ConfigMap {
        let mut merged = self.extended_config.clone();
        for (k, v) in &self.access_config {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }
}

/// Deserialize a typed provider config out of a loose map.
pub fn populate<T: DeserializeOwned>(map: &ConfigMap) -> Result<T> {
    serde_json::from_value(Value::Object(map.clone()))
        .map_err(|e| CertimateError::Config(format!("invalid provider config: {e}")))
}

/// Strings as-is, numbers and booleans rendered; anything else is empty.
pub fn get_string(map: &ConfigMap, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub fn get_i64(map: &ConfigMap, key: &str) -> i64 {
    match map.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

pub fn get_bool(map: &ConfigMap, key: &str) -> bool {
    match map.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|i| i != 0),
        _ => false,
    }
}

/// Parse a `key=value` pair from the command line into the map.
pub fn insert_pair(map: &mut ConfigMap, pair: &str) -> Result<()> {
    let (key, value) = pair.split_once('=').ok_or_else(|| {
        CertimateError::InvalidInput(format!("expected key=value, got '{pair}'"))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CertimateError::InvalidInput(format!(
            "empty key in option '{pair}'"
        )));
    }
    map.insert(key.to_string(), Value::String(value.to_string()));
    Ok(())
}
