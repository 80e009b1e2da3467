use indexmap::IndexMap;
use std::collections::HashMap;

use crate::builders::patterns::PatternEntry;
use crate::core::config::{ConfigError, FormatterSpec};

/// A named, reusable list of patterns that can inherit from other sets.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSet {
    pub name: String,
    /// Parent sets, resolved in the order they are declared.
    pub extends: Vec<String>,
    /// Patterns declared directly on this set, appended after all parents.
    pub patterns: Vec<PatternEntry>,
}

/// Flattens pattern-set inheritance into plain ordered pattern lists.
///
/// Resolving a set yields the resolution of each parent in declared order,
/// followed by the set's own patterns. Since the matcher lets later patterns
/// override earlier ones, a child can narrow or widen what it inherits.
///
/// One resolver lives for one configuration load. Results are cached per set
/// name, and a stack of the sets currently being resolved catches cycles.
pub struct PatternSetResolver<'a> {
    sets: &'a IndexMap<String, PatternSet>,
    cache: HashMap<String, Vec<PatternEntry>>,
}

impl<'a> PatternSetResolver<'a> {
    pub fn new(sets: &'a IndexMap<String, PatternSet>) -> Self {
        Self {
            sets,
            cache: HashMap::new(),
        }
    }

    /// Resolves the named set into a flat pattern list.
    ///
    /// # Arguments
    /// * `name`: The set to resolve.
    /// * `referrer`: Who asked for it, used to make a missing-set error actionable.
    /// * `visiting`: The chain of sets currently being resolved.
    ///
    /// # Returns
    /// The flattened list, `PatternSetNotFound` when `name` (or any ancestor)
    /// is undefined, or `PatternSetCycle` when the inheritance loops back.
    pub fn resolve_set(
        &mut self,
        name: &str,
        referrer: &str,
        visiting: &mut Vec<String>,
    ) -> Result<Vec<PatternEntry>, ConfigError> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(cached.clone());
        }

        if let Some(start) = visiting.iter().position(|n| n == name) {
            let mut chain = visiting[start..].to_vec();
            chain.push(name.to_string());
            return Err(ConfigError::PatternSetCycle { chain });
        }

        let sets = self.sets;
        let set = sets
            .get(name)
            .ok_or_else(|| ConfigError::PatternSetNotFound {
                name: name.to_string(),
                referrer: referrer.to_string(),
            })?;

        visiting.push(name.to_string());
        let parent_referrer = format!("pattern set '{name}'");
        let mut resolved = Vec::new();
        for parent in &set.extends {
            resolved.extend(self.resolve_set(parent, &parent_referrer, visiting)?);
        }
        visiting.pop();

        resolved.extend(set.patterns.iter().cloned());
        self.cache.insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Resolves an `extends` list followed by locally declared patterns.
    ///
    /// This is the shared rule for formatters and sets alike.
    pub fn resolve_extends(
        &mut self,
        extends: &[String],
        own_patterns: &[PatternEntry],
        referrer: &str,
    ) -> Result<Vec<PatternEntry>, ConfigError> {
        let mut resolved = Vec::new();
        for name in extends {
            resolved.extend(self.resolve_set(name, referrer, &mut Vec::new())?);
        }
        resolved.extend(own_patterns.iter().cloned());
        Ok(resolved)
    }

    /// Computes a formatter's effective pattern list.
    pub fn resolve_formatter(
        &mut self,
        formatter: &FormatterSpec,
    ) -> Result<Vec<PatternEntry>, ConfigError> {
        self.resolve_extends(
            &formatter.extends,
            &formatter.own_patterns,
            &format!("formatter '{}'", formatter.name),
        )
    }

    /// Resolves every configured set, so a broken set is reported even when
    /// no formatter uses it.
    pub fn resolve_all(&mut self) -> Result<(), ConfigError> {
        let sets = self.sets;
        for name in sets.keys() {
            self.resolve_set(name, "configuration", &mut Vec::new())?;
        }
        Ok(())
    }
}
