use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single id or a list of ids. The hub accepts both forms anywhere a
/// target id is expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// The first id, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            OneOrMany::One(id) => Some(id),
            OneOrMany::Many(ids) => ids.first().map(String::as_str),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(id) => vec![id.clone()],
            OneOrMany::Many(ids) => ids.clone(),
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(id: &str) -> Self {
        OneOrMany::One(id.to_string())
    }
}

impl From<String> for OneOrMany {
    fn from(id: String) -> Self {
        OneOrMany::One(id)
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(ids: Vec<String>) -> Self {
        if ids.len() == 1 {
            OneOrMany::One(ids.into_iter().next().unwrap_or_default())
        } else {
            OneOrMany::Many(ids)
        }
    }
}

/// What a service call or `extract_from_target` applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_id: Option<OneOrMany>,
}

impl Target {
    /// Targets one or more entities.
    pub fn entities(ids: impl Into<OneOrMany>) -> Self {
        Self {
            entity_id: Some(ids.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entity_id.is_none()
            && self.device_id.is_none()
            && self.area_id.is_none()
            && self.label_id.is_none()
    }
}

/// One entry of the `get_states` result.
///
/// Fields beyond `entity_id`, `state` and `attributes` (timestamps, context)
/// are kept in `extra` so the entry re-serializes unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityState {
    /// The domain part of the entity id (`light` for `light.kitchen`).
    pub fn domain(&self) -> &str {
        entity_domain(&self.entity_id).unwrap_or_default()
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.get("friendly_name").and_then(Value::as_str)
    }

    /// True when the entity id starts with `<domain>.`.
    pub fn in_domain(&self, domain: &str) -> bool {
        self.entity_id
            .strip_prefix(domain)
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Splits `domain.object_id`, returning the domain.
pub fn entity_domain(entity_id: &str) -> Option<&str> {
    match entity_id.split_once('.') {
        Some((domain, object_id)) if !domain.is_empty() && !object_id.is_empty() => Some(domain),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn one_or_many_accepts_both_forms() {
        let one: OneOrMany = serde_json::from_value(json!("light.a")).unwrap();
        assert_eq!(one, OneOrMany::One("light.a".into()));
        let many: OneOrMany = serde_json::from_value(json!(["light.a", "light.b"])).unwrap();
        assert_eq!(many.to_vec(), vec!["light.a", "light.b"]);
        assert_eq!(many.first(), Some("light.a"));
    }

    #[test]
    fn single_element_vec_collapses() {
        let ids: OneOrMany = vec!["switch.fan".to_string()].into();
        assert_eq!(ids, OneOrMany::One("switch.fan".into()));
    }

    #[test]
    fn empty_target_serializes_to_empty_object() {
        let target = Target::default();
        assert!(target.is_empty());
        assert_eq!(serde_json::to_value(&target).unwrap(), json!({}));
    }

    #[test]
    fn entity_state_keeps_unknown_fields() {
        let raw = json!({
            "entity_id": "light.x",
            "state": "on",
            "attributes": {"friendly_name": "X"},
            "last_changed": "2024-01-01T00:00:00+00:00",
            "context": {"id": "abc"}
        });
        let state: EntityState = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(state.domain(), "light");
        assert_eq!(state.friendly_name(), Some("X"));
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }

    #[test]
    fn domain_matching_requires_dot() {
        let state: EntityState =
            serde_json::from_value(json!({"entity_id": "light_group.x", "state": "off"})).unwrap();
        assert!(!state.in_domain("light"));
        assert!(state.in_domain("light_group"));
    }

    #[test]
    fn entity_domain_rejects_malformed_ids() {
        assert_eq!(entity_domain("sensor.temp"), Some("sensor"));
        assert_eq!(entity_domain("sensor"), None);
        assert_eq!(entity_domain(".temp"), None);
        assert_eq!(entity_domain("sensor."), None);
    }
}
