use indexmap::IndexMap;

use crate::builders::pattern_sets::{PatternSet, PatternSetResolver};
use crate::builders::patterns::PatternEntry;
use crate::core::config::{Config, ConfigError, FormatterSpec};
use crate::core::value::ConfigValue;

/// Keys accepted for the pattern-set mapping, checked in this order.
const PATTERN_SET_KEYS: [&str; 3] = ["pattern-sets", "pattern_sets", "patternSets"];

/// Keys that mark a formatter as readonly.
const READONLY_KEYS: [&str; 2] = ["readonly", "no_write"];

/// The `ConfigValidator` trait turns a parsed configuration document into a
/// typed [`Config`].
///
/// Structural problems are hard errors, since there is no partial-config mode.
/// Suspicious but legal configurations are reported separately as warnings.
pub trait ConfigValidator {
    /// Validates the whole document and resolves every formatter's patterns.
    ///
    /// # Arguments
    /// * `document`: The normalized document produced by the YAML or TOML parser.
    ///
    /// # Returns
    /// The typed configuration, or the first structural error found.
    fn build(&self, document: &ConfigValue) -> Result<Config, ConfigError>;

    /// Validates a single formatter declaration.
    ///
    /// # Arguments
    /// * `name`: The formatter's name.
    /// * `value`: The formatter's mapping.
    /// * `field`: The field path used to qualify errors, e.g. `formatters.eslint`.
    fn build_formatter(
        &self,
        name: &str,
        value: &ConfigValue,
        field: &str,
    ) -> Result<FormatterSpec, ConfigError>;

    /// Returns warnings for configurations that are valid but likely mistakes.
    fn check_config(&self, config: &Config) -> Vec<String>;
}

/// The `StandardValidator` is the concrete implementation of `ConfigValidator`
/// used for every configuration file.
pub struct StandardValidator;

impl StandardValidator {
    pub fn new() -> Self {
        Self
    }

    /// Parses a list of raw pattern strings.
    fn parse_patterns(
        &self,
        value: &ConfigValue,
        field: &str,
    ) -> Result<Vec<PatternEntry>, ConfigError> {
        value
            .expect_string_list(field)?
            .into_iter()
            .map(|raw| {
                PatternEntry::parse(&raw).map_err(|message| ConfigError::InvalidPattern {
                    field: field.to_string(),
                    pattern: raw,
                    message,
                })
            })
            .collect()
    }

    /// Reads an optional `extends` field, accepting a scalar or a list.
    fn parse_extends(
        &self,
        spec: &IndexMap<String, ConfigValue>,
        field: &str,
    ) -> Result<Vec<String>, ConfigError> {
        match spec.get("extends") {
            Some(value) => value.expect_string_or_list(&format!("{field}.extends")),
            None => Ok(Vec::new()),
        }
    }

    fn build_pattern_sets(
        &self,
        key: &str,
        value: &ConfigValue,
    ) -> Result<IndexMap<String, PatternSet>, ConfigError> {
        let mut sets = IndexMap::new();

        for (name, set_value) in value.expect_mapping(key)? {
            let field = format!("{key}.{name}");
            // A bare list is shorthand for a set with only patterns.
            let set = match set_value {
                ConfigValue::List(_) => PatternSet {
                    name: name.clone(),
                    extends: Vec::new(),
                    patterns: self.parse_patterns(set_value, &field)?,
                },
                _ => {
                    let spec = set_value.expect_mapping(&field)?;
                    let patterns = match spec.get("patterns") {
                        Some(p) => self.parse_patterns(p, &format!("{field}.patterns"))?,
                        None => Vec::new(),
                    };
                    PatternSet {
                        name: name.clone(),
                        extends: self.parse_extends(spec, &field)?,
                        patterns,
                    }
                }
            };
            sets.insert(name.clone(), set);
        }

        Ok(sets)
    }

    fn build_formatters(&self, value: &ConfigValue) -> Result<Vec<FormatterSpec>, ConfigError> {
        match value {
            ConfigValue::Mapping(map) => map
                .iter()
                .map(|(name, spec)| self.build_formatter(name, spec, &format!("formatters.{name}")))
                .collect(),
            ConfigValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, spec)| {
                    let field = format!("formatters[{i}]");
                    let name = match spec.get("name") {
                        Some(name) => name.expect_string(&format!("{field}.name"))?.to_string(),
                        None => format!("formatter{}", i + 1),
                    };
                    self.build_formatter(&name, spec, &field)
                })
                .collect(),
            other => Err(ConfigError::TypeMismatch {
                field: "formatters".to_string(),
                expected: "list",
                found: other.type_name(),
            }),
        }
    }
}

impl Default for StandardValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator for StandardValidator {
    fn build(&self, document: &ConfigValue) -> Result<Config, ConfigError> {
        let root = document.expect_mapping("configuration")?;

        let pattern_sets = match PATTERN_SET_KEYS
            .iter()
            .find_map(|key| root.get(*key).map(|value| (*key, value)))
        {
            Some((key, value)) => self.build_pattern_sets(key, value)?,
            None => IndexMap::new(),
        };

        let formatters_value = root.get("formatters").ok_or(ConfigError::MissingFormatters)?;
        let mut formatters = self.build_formatters(formatters_value)?;

        let mut resolver = PatternSetResolver::new(&pattern_sets);
        resolver.resolve_all()?;
        for formatter in &mut formatters {
            formatter.patterns = resolver.resolve_formatter(formatter)?;
        }

        Ok(Config {
            formatters,
            pattern_sets,
        })
    }

    fn build_formatter(
        &self,
        name: &str,
        value: &ConfigValue,
        field: &str,
    ) -> Result<FormatterSpec, ConfigError> {
        let spec = value.expect_mapping(field)?;

        let command = match spec.get("command") {
            Some(command) => command.expect_string(&format!("{field}.command"))?,
            None => "",
        };
        if command.trim().is_empty() {
            return Err(ConfigError::MissingCommand {
                formatter: name.to_string(),
            });
        }

        let own_patterns = match spec.get("patterns") {
            Some(patterns) => self.parse_patterns(patterns, &format!("{field}.patterns"))?,
            None => Vec::new(),
        };

        let mut readonly = false;
        for key in READONLY_KEYS {
            if let Some(flag) = spec.get(key) {
                readonly |= flag.expect_bool(&format!("{field}.{key}"))?;
            }
        }

        Ok(FormatterSpec {
            name: name.to_string(),
            command: command.to_string(),
            extends: self.parse_extends(spec, field)?,
            own_patterns,
            readonly,
            patterns: Vec::new(),
        })
    }

    fn check_config(&self, config: &Config) -> Vec<String> {
        let mut warnings = Vec::new();

        if config.formatters.is_empty() {
            warnings.push("No formatters are configured".to_string());
        }

        for formatter in &config.formatters {
            if !formatter.patterns.iter().any(|p| !p.is_exclude()) {
                warnings.push(format!(
                    "Formatter '{}' has no include patterns and will never run",
                    formatter.name
                ));
            }
        }

        let referenced: Vec<&String> = config
            .formatters
            .iter()
            .flat_map(|f| f.extends.iter())
            .chain(config.pattern_sets.values().flat_map(|s| s.extends.iter()))
            .collect();
        for name in config.pattern_sets.keys() {
            if !referenced.contains(&name) {
                warnings.push(format!("Pattern set '{name}' is never used"));
            }
        }

        warnings
    }
}
