//! Serialization formats for dumps and state output

use crate::error::{Error, Result};
use serde_json::Value;

/// A serialization format
pub trait Format {
    /// Lowercase name, as accepted by `--format`
    fn name(&self) -> &'static str;

    /// Serialize a value
    fn marshal(&self, value: &Value) -> Result<Vec<u8>>;

    /// Deserialize a value
    fn unmarshal(&self, data: &[u8]) -> Result<Value>;
}

/// Pretty-printed JSON with a trailing newline
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

/// TOML
#[derive(Debug, Clone, Copy, Default)]
pub struct Toml;

/// YAML
#[derive(Debug, Clone, Copy, Default)]
pub struct Yaml;

fn format_err(format: &'static str, err: impl std::fmt::Display) -> Error {
    Error::Format {
        format,
        message: err.to_string(),
    }
}

impl Format for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>> {
        let mut out = serde_json::to_vec_pretty(value).map_err(|e| format_err("json", e))?;
        out.push(b'\n');
        Ok(out)
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data).map_err(|e| format_err("json", e))
    }
}

impl Format for Toml {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>> {
        toml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| format_err("toml", e))
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value> {
        let text = std::str::from_utf8(data).map_err(|e| format_err("toml", e))?;
        toml::from_str(text).map_err(|e| format_err("toml", e))
    }
}

impl Format for Yaml {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>> {
        serde_yaml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| format_err("yaml", e))
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value> {
        serde_yaml::from_slice(data).map_err(|e| format_err("yaml", e))
    }
}

/// Look up a format by name or file extension
pub fn from_name(name: &str) -> Option<Box<dyn Format>> {
    match name.to_ascii_lowercase().as_str() {
        "json" => Some(Box::new(Json)),
        "toml" => Some(Box::new(Toml)),
        "yaml" | "yml" => Some(Box::new(Yaml)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_is_pretty_with_newline() {
        let out = Json.marshal(&json!({"a": 1})).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn test_formats_read_back() {
        let value = json!({"name": "hearth", "nested": {"list": [1, 2]}});
        for name in ["json", "toml", "yaml"] {
            let format = from_name(name).unwrap();
            assert_eq!(format.name(), name);
            let bytes = format.marshal(&value).unwrap();
            assert_eq!(format.unmarshal(&bytes).unwrap(), value, "{name}");
        }
    }

    #[test]
    fn test_unknown_format() {
        assert!(from_name("xml").is_none());
        assert_eq!(from_name("YML").unwrap().name(), "yaml");
    }

    #[test]
    fn test_toml_rejects_bare_scalar() {
        assert!(matches!(Toml.marshal(&json!(1)), Err(Error::Format { format: "toml", .. })));
    }
}
