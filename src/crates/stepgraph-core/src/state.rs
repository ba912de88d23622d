//! State schema and reducer policies
//!
//! Thread state is a JSON object whose shape is declared once, at graph
//! build time: every field is registered in a [`StateSchema`] together
//! with the [`ReducerPolicy`] used to merge partial updates into it. The
//! schema is closed — an update touching an undeclared field is rejected
//! rather than silently absorbed, so handlers cannot grow the state
//! ad hoc.
//!
//! Two policies exist. `Overwrite` replaces the old value; `Append`
//! concatenates onto an ordered sequence in the order handlers returned
//! values, which is what conversational/event-log fields want.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while merging updates into state
#[derive(Debug, Error)]
pub enum StateError {
    /// State or update was not a JSON object
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Update referenced a field the schema does not declare
    #[error("Unknown state field: {0}")]
    UnknownField(String),

    /// Reducer could not combine the current value with the update
    #[error("Reducer error: {0}")]
    ReducerError(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// How a partial update merges into an existing field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReducerPolicy {
    /// New value replaces the old one
    Overwrite,
    /// New value(s) are concatenated onto an ordered sequence
    Append,
}

impl ReducerPolicy {
    /// Combine the current field value with an update under this policy.
    ///
    /// For `Append`, an absent/null current value starts a fresh array,
    /// a non-array update is pushed as a single element, and an array
    /// update is concatenated element-wise. A non-array current value is
    /// a contract violation.
    pub fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match self {
            ReducerPolicy::Overwrite => Ok(update.clone()),
            ReducerPolicy::Append => match (current, update) {
                (Value::Array(curr), Value::Array(upd)) => {
                    let mut result = curr.clone();
                    result.extend_from_slice(upd);
                    Ok(Value::Array(result))
                }
                (Value::Null, Value::Array(upd)) => Ok(Value::Array(upd.clone())),
                (Value::Array(curr), single) => {
                    let mut result = curr.clone();
                    result.push(single.clone());
                    Ok(Value::Array(result))
                }
                (Value::Null, single) => Ok(Value::Array(vec![single.clone()])),
                _ => Err(StateError::ReducerError(
                    "append policy requires an array target".to_string(),
                )),
            },
        }
    }
}

/// Compile-time-declared mapping from field name to reducer policy
///
/// Shared read-only by every thread executing the graph.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    fields: HashMap<String, ReducerPolicy>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field and its reducer policy
    pub fn add_field(&mut self, name: impl Into<String>, policy: ReducerPolicy) {
        self.fields.insert(name.into(), policy);
    }

    /// Builder-style field declaration
    pub fn with_field(mut self, name: impl Into<String>, policy: ReducerPolicy) -> Self {
        self.add_field(name, policy);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Declared field names
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Merge a partial update into `state` using each field's policy.
    ///
    /// Fields not mentioned in the update are untouched. Fields not
    /// declared in the schema are rejected.
    pub fn apply(&self, state: &mut Value, update: &Value) -> Result<()> {
        let update_obj = update
            .as_object()
            .ok_or_else(|| StateError::InvalidState("update must be an object".to_string()))?;

        let state_obj = state
            .as_object_mut()
            .ok_or_else(|| StateError::InvalidState("state must be an object".to_string()))?;

        for (field, update_value) in update_obj {
            let policy = self
                .fields
                .get(field)
                .ok_or_else(|| StateError::UnknownField(field.clone()))?;

            let current = state_obj.get(field).cloned().unwrap_or(Value::Null);
            let reduced = policy.reduce(&current, update_value)?;
            state_obj.insert(field.clone(), reduced);
        }

        Ok(())
    }

    /// Apply field-level overrides with overwrite semantics regardless of
    /// each field's normal policy. Used by manual state edits.
    pub fn apply_overrides(&self, state: &mut Value, overrides: &Value) -> Result<()> {
        let override_obj = overrides
            .as_object()
            .ok_or_else(|| StateError::InvalidState("overrides must be an object".to_string()))?;

        let state_obj = state
            .as_object_mut()
            .ok_or_else(|| StateError::InvalidState("state must be an object".to_string()))?;

        for (field, value) in override_obj {
            if !self.fields.contains_key(field) {
                return Err(StateError::UnknownField(field.clone()));
            }
            state_obj.insert(field.clone(), value.clone());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> StateSchema {
        StateSchema::new()
            .with_field("messages", ReducerPolicy::Append)
            .with_field("flag", ReducerPolicy::Overwrite)
    }

    #[test]
    fn test_overwrite_replaces() {
        let schema = schema();
        let mut state = json!({"flag": false});
        schema.apply(&mut state, &json!({"flag": true})).unwrap();
        assert_eq!(state["flag"], json!(true));
    }

    #[test]
    fn test_append_concatenates_in_order() {
        let schema = schema();
        let mut state = json!({});
        schema
            .apply(&mut state, &json!({"messages": ["a"]}))
            .unwrap();
        schema
            .apply(&mut state, &json!({"messages": ["b", "c"]}))
            .unwrap();
        schema.apply(&mut state, &json!({"messages": "d"})).unwrap();
        assert_eq!(state["messages"], json!(["a", "b", "c", "d"]));
    }

    #[test]
    fn test_unmentioned_fields_untouched() {
        let schema = schema();
        let mut state = json!({"messages": ["a"], "flag": true});
        schema.apply(&mut state, &json!({"flag": false})).unwrap();
        assert_eq!(state["messages"], json!(["a"]));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let schema = schema();
        let mut state = json!({});
        let err = schema.apply(&mut state, &json!({"bogus": 1})).unwrap_err();
        assert!(matches!(err, StateError::UnknownField(_)));
    }

    #[test]
    fn test_append_onto_non_array_fails() {
        let schema = schema();
        let mut state = json!({"messages": "oops"});
        let err = schema
            .apply(&mut state, &json!({"messages": ["a"]}))
            .unwrap_err();
        assert!(matches!(err, StateError::ReducerError(_)));
    }

    #[test]
    fn test_overrides_ignore_append_policy() {
        let schema = schema();
        let mut state = json!({"messages": ["a", "b"]});
        schema
            .apply_overrides(&mut state, &json!({"messages": ["replaced"]}))
            .unwrap();
        assert_eq!(state["messages"], json!(["replaced"]));
    }

    #[test]
    fn test_overrides_validate_fields() {
        let schema = schema();
        let mut state = json!({});
        let err = schema
            .apply_overrides(&mut state, &json!({"bogus": 5}))
            .unwrap_err();
        assert!(matches!(err, StateError::UnknownField(_)));
    }
}
