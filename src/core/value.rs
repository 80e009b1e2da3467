use indexmap::IndexMap;
use serde::Deserialize;

use crate::core::config::ConfigError;

/// A weakly-typed configuration document.
///
/// Both the YAML and the TOML configuration formats deserialize into this enum,
/// so everything downstream of the parser sees one shape regardless of which
/// file the user wrote. Mappings keep their declaration order because formatter
/// order is pipeline order.
///
/// Callers never match on the variants to coerce values. They use the `expect_*`
/// projections, which fail with an error naming the offending field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
    Mapping(IndexMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Parses a YAML document, expanding anchors, aliases and `<<` merge keys.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(content)?;
        value.apply_merge()?;
        serde_yaml::from_value(value)
    }

    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Human readable name of the variant, used in type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "boolean",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::String(_) => "string",
            ConfigValue::List(_) => "list",
            ConfigValue::Mapping(_) => "mapping",
        }
    }

    /// Looks up `key` when this value is a mapping.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    pub fn expect_list(&self, field: &str) -> Result<&[ConfigValue], ConfigError> {
        match self {
            ConfigValue::List(items) => Ok(items),
            other => Err(other.mismatch(field, "list")),
        }
    }

    pub fn expect_string(&self, field: &str) -> Result<&str, ConfigError> {
        match self {
            ConfigValue::String(s) => Ok(s),
            other => Err(other.mismatch(field, "string")),
        }
    }

    pub fn expect_mapping(&self, field: &str) -> Result<&IndexMap<String, ConfigValue>, ConfigError> {
        match self {
            ConfigValue::Mapping(map) => Ok(map),
            other => Err(other.mismatch(field, "mapping")),
        }
    }

    pub fn expect_bool(&self, field: &str) -> Result<bool, ConfigError> {
        match self {
            ConfigValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch(field, "boolean")),
        }
    }

    /// Projects a list of strings, qualifying element errors with their index.
    pub fn expect_string_list(&self, field: &str) -> Result<Vec<String>, ConfigError> {
        self.expect_list(field)?
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.expect_string(&format!("{field}[{i}]"))
                    .map(str::to_string)
            })
            .collect()
    }

    /// Like [`expect_string_list`](Self::expect_string_list), but a single
    /// string is accepted as a one-element list. Used for `extends`.
    pub fn expect_string_or_list(&self, field: &str) -> Result<Vec<String>, ConfigError> {
        match self {
            ConfigValue::String(s) => Ok(vec![s.clone()]),
            ConfigValue::List(_) => self.expect_string_list(field),
            other => Err(other.mismatch(field, "list")),
        }
    }

    fn mismatch(&self, field: &str, expected: &'static str) -> ConfigError {
        ConfigError::TypeMismatch {
            field: field.to_string(),
            expected,
            found: self.type_name(),
        }
    }
}
