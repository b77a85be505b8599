use serde_json::Value;

use crate::error::GenerateError;

#[derive(Debug, Clone)]
pub struct ApiDocument {
    raw: Value,
    version: String,
    base_url: String,
}

impl ApiDocument {
    pub fn from_value(raw: Value) -> Result<Self, GenerateError> {
        if !raw.get("paths").is_some_and(Value::is_object) {
            return Err(GenerateError::InvalidDocument {
                reason: "`paths` is missing or not an object".to_string(),
            });
        }

        let version = raw
            .get("info")
            .and_then(|v| v.get("version"))
            .and_then(Value::as_str)
            .unwrap_or("0")
            .to_string();

        let base_url = raw
            .get("servers")
            .and_then(Value::as_array)
            .and_then(|servers| servers.first())
            .and_then(|server| server.get("url"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            raw,
            version,
            base_url,
        })
    }

    /// Goes through `serde_yaml::Value` so unquoted status-code keys such as
    /// `200:` end up as string keys.
    pub fn parse(text: &str) -> Result<Self, GenerateError> {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|err| GenerateError::InvalidDocument {
                reason: err.to_string(),
            })?;
        let raw = serde_json::to_value(yaml).map_err(|err| GenerateError::InvalidDocument {
            reason: err.to_string(),
        })?;
        Self::from_value(raw)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn paths(&self) -> Option<&serde_json::Map<String, Value>> {
        self.raw.get("paths").and_then(Value::as_object)
    }

    pub fn lookup(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        if pointer.is_empty() {
            return Some(&self.raw);
        }
        if !pointer.starts_with('/') {
            return None;
        }

        let mut current = &self.raw;
        for part in pointer.trim_start_matches('/').split('/') {
            let part = part.replace("~1", "/").replace("~0", "~");
            current = match current {
                Value::Object(map) => map.get(&part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn component_schema(&self, name: &str) -> Option<&Value> {
        self.raw
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.get(name))
    }
}
