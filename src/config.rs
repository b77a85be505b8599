use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::field::FieldType;

pub trait ConfigStore {
    fn settings(&self) -> &Settings;
    fn action(&self, operation_id: &str) -> Option<&ActionConfig>;
    fn triggers(&self) -> &BTreeMap<String, TriggerConfig>;
    fn authentication(&self) -> Option<&AuthConfig>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub derive_triggers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            derive_triggers: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionConfig {
    pub omit: bool,
    pub noun: Option<String>,
    pub hide_query_params: Vec<String>,
    pub hide_request_body_properties: Vec<String>,
    pub field_defaults: BTreeMap<String, Value>,
    pub simplify: Option<SimplifyConfig>,
    pub dynamic_fields: BTreeMap<String, DynamicFieldConfig>,
    pub helper_fields: BTreeMap<String, HelperFieldConfig>,
    pub response_extraction: Option<ResponseExtraction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimplifyConfig {
    pub flatten_array: bool,
    pub array_field: String,
    /// Component schema of the array items; defaults to the array's own item schema.
    pub item_schema: Option<String>,
    pub public_name: Option<String>,
    pub additional_properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicFieldConfig {
    pub trigger: String,
    #[serde(default)]
    pub value_property: Option<String>,
    #[serde(default)]
    pub label_property: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperFieldConfig {
    pub map_to: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub dynamic: Option<DynamicFieldConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseExtraction {
    pub extract_single: bool,
    pub property: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerConfig {
    pub endpoint: Option<String>,
    pub name: Option<String>,
    pub noun: Option<String>,
    pub title: Option<String>,
    pub array_property: Option<String>,
    pub query_params: BTreeMap<String, Value>,
    pub filters: BTreeMap<String, Value>,
    pub filter_code: Option<String>,
    pub hidden: bool,
    pub label: Option<String>,
    pub has_more_property: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    pub test_endpoint: Option<String>,
    pub field_key: String,
    pub header_name: String,
    pub scheme: String,
    pub connection_label: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            test_endpoint: None,
            field_key: "api_key".to_string(),
            header_name: "Authorization".to_string(),
            scheme: "Bearer".to_string(),
            connection_label: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    pub settings: Settings,
    pub actions: BTreeMap<String, ActionConfig>,
    pub triggers: BTreeMap<String, TriggerConfig>,
    pub authentication: Option<AuthConfig>,
}

impl GeneratorConfig {
    pub fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            settings: read_optional(&dir.join("settings.json"))?.unwrap_or_default(),
            actions: read_optional(&dir.join("actions.json"))?.unwrap_or_default(),
            triggers: read_optional(&dir.join("triggers.json"))?.unwrap_or_default(),
            authentication: read_optional(&dir.join("authentication.json"))?,
        })
    }
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "config file not present");
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
}

impl ConfigStore for GeneratorConfig {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn action(&self, operation_id: &str) -> Option<&ActionConfig> {
        self.actions.get(operation_id)
    }

    fn triggers(&self) -> &BTreeMap<String, TriggerConfig> {
        &self.triggers
    }

    fn authentication(&self) -> Option<&AuthConfig> {
        self.authentication.as_ref()
    }
}
