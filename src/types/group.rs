use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named bundle of rules run together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub rules: Vec<String>,
}

impl Group {
    #[must_use]
    pub fn new(id: &str, rules: &[&str]) -> Self {
        Self {
            id: id.to_owned(),
            rules: rules.iter().map(|&r| r.to_owned()).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.iter().any(|r| r == rule_id)
    }
}

/// Rule configuration: a `default` bucket applied everywhere plus per-group
/// overrides.
///
/// ```json
/// { "default": { "rule": {} }, "groups": { "group": { "rule": {} } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default: HashMap<String, Value>,
    pub groups: HashMap<String, HashMap<String, Value>>,
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] on malformed input.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Set `rule`'s entry in the default bucket.
    #[must_use]
    pub fn with_default(mut self, rule: &str, config: Value) -> Self {
        self.default.insert(rule.to_owned(), config);
        self
    }

    /// Override `rule` for `group`. The group then gets a private state
    /// instance of the rule.
    #[must_use]
    pub fn with_override(mut self, group: &str, rule: &str, config: Value) -> Self {
        self.groups
            .entry(group.to_owned())
            .or_default()
            .insert(rule.to_owned(), config);
        self
    }

    /// Whether `group` overrides `rule`.
    #[must_use]
    pub fn overrides(&self, group: &str, rule: &str) -> bool {
        self.groups.get(group).is_some_and(|g| g.contains_key(rule))
    }

    /// Layer the declared default, the `default` bucket, and the group
    /// override, later layers winning.
    #[must_use]
    pub fn resolve(&self, group: &str, rule: &str, declared: &Value) -> Value {
        let mut config = declared.clone();
        if let Some(value) = self.default.get(rule) {
            config = merge(config, value);
        }
        if let Some(value) = self.groups.get(group).and_then(|g| g.get(rule)) {
            config = merge(config, value);
        }
        config
    }
}

/// Shallow merge for objects; any other kind is replaced.
fn merge(base: Value, layer: &Value) -> Value {
    match (base, layer) {
        (Value::Object(mut base), Value::Object(layer)) => {
            for (key, value) in layer {
                base.insert(key.clone(), value.clone());
            }
            Value::Object(base)
        }
        (_, layer) => layer.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn layers_merge_shallowly() {
        let config = EngineConfig::new()
            .with_default("note-distance", json!({ "max": 6, "unit": "fret" }))
            .with_override("strict", "note-distance", json!({ "max": 2 }));
        let declared = json!({ "max": 12, "warn": true });

        assert_eq!(
            config.resolve("lenient", "note-distance", &declared),
            json!({ "max": 6, "unit": "fret", "warn": true })
        );
        assert_eq!(
            config.resolve("strict", "note-distance", &declared),
            json!({ "max": 2, "unit": "fret", "warn": true })
        );
    }

    #[test]
    fn nested_objects_are_replaced_not_merged() {
        let config = EngineConfig::new().with_default("r", json!({ "limits": { "hi": 1 } }));
        let declared = json!({ "limits": { "lo": 0, "hi": 9 } });
        assert_eq!(
            config.resolve("g", "r", &declared),
            json!({ "limits": { "hi": 1 } })
        );
    }

    #[test]
    fn non_objects_replace() {
        let config = EngineConfig::new().with_override("g", "r", json!(3));
        assert_eq!(config.resolve("g", "r", &json!({ "a": 1 })), json!(3));
        assert_eq!(config.resolve("other", "r", &Value::Null), Value::Null);
    }

    #[test]
    fn override_presence_decides_scope() {
        let config = EngineConfig::new().with_override("g", "r", json!({}));
        assert!(config.overrides("g", "r"));
        assert!(!config.overrides("g", "other"));
        assert!(!config.overrides("h", "r"));
    }

    #[test]
    fn deserializes_with_missing_sections() {
        let config = EngineConfig::from_json(r#"{ "groups": { "xml-gen": { "line-naming": null } } }"#)
            .unwrap();
        assert!(config.default.is_empty());
        assert!(config.overrides("xml-gen", "line-naming"));

        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
        assert!(EngineConfig::from_json("[1]").is_err());
    }

    #[test]
    fn group_membership() {
        let group = Group::new("xml-gen", &["measure-count", "line-naming"]);
        assert!(group.contains("line-naming"));
        assert!(!group.contains("note-distance"));

        let parsed: Group =
            serde_json::from_str(r#"{ "id": "xml-gen", "rules": ["measure-count", "line-naming"] }"#)
                .unwrap();
        assert_eq!(parsed, group);
    }
}
