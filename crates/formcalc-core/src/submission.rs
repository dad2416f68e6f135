//! Form submissions and the variable scope derived from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

static NULL: Value = Value::Null;

/// The values of one form submission, keyed by field identifier.
///
/// Serializes as a plain JSON object (`{"price": "12.50", "qty": 2}`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Submission {
    values: BTreeMap<String, Value>,
}

impl Submission {
    /// Create an empty submission.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Set a field value, returning the previous one.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(field.into(), value.into())
    }

    /// Returns `true` if the field is present (even when its value is null).
    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Iterate over `(field, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Submission {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Read-only snapshot of the variables a formula may reference.
///
/// A scope is built once per evaluation pass. When extracted from a
/// submission it excludes every calculated field, so a formula can neither
/// read its own stale value nor another calculation's pre-computation value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scope {
    vars: BTreeMap<String, Value>,
}

impl Scope {
    /// Snapshot the non-calculated fields of `submission`.
    pub fn extract<S: AsRef<str>>(submission: &Submission, calculated: &[S]) -> Self {
        let vars = submission
            .iter()
            .filter(|(field, _)| !calculated.iter().any(|c| c.as_ref() == *field))
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect();
        Self { vars }
    }

    /// Value bound to `name`, or [`Value::Null`] when unbound.
    pub fn get(&self, name: &str) -> &Value {
        self.vars.get(name).unwrap_or(&NULL)
    }

    /// Returns `true` if `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Bound variable names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn order() -> Submission {
        [
            ("price", Value::from("12.50")),
            ("qty", Value::from(2_i64)),
            ("total", Value::from("stale")),
            ("tax", Value::Null),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn extract_excludes_calculated_fields() {
        let scope = Scope::extract(&order(), &["total", "tax"]);
        assert_eq!(scope.names().collect::<Vec<_>>(), vec!["price", "qty"]);
        assert!(!scope.contains("total"));
        assert_eq!(scope.get("total"), &Value::Null);
    }

    #[test]
    fn unbound_names_are_null() {
        let scope = Scope::extract(&order(), &[] as &[&str]);
        assert_eq!(scope.get("missing"), &Value::Null);
        assert_eq!(scope.get("qty"), &Value::Number(2.0));
        assert_eq!(scope.len(), 4);
    }

    #[test]
    fn submission_serializes_as_object() {
        let sub: Submission = [("a", 1_i64)].into_iter().collect();
        assert_eq!(serde_json::to_string(&sub).unwrap(), r#"{"a":1}"#);

        let back: Submission = serde_json::from_str(r#"{"a": 1, "b": "x"}"#).unwrap();
        assert_eq!(back.get("b"), Some(&Value::from("x")));
        assert!(back.contains("a"));
        assert!(!back.contains("c"));
    }

    #[test]
    fn set_returns_previous_value() {
        let mut sub = order();
        let prev = sub.set("total", 25.0);
        assert_eq!(prev, Some(Value::from("stale")));
        assert_eq!(sub.get("total"), Some(&Value::Number(25.0)));
    }
}
