//! Document filters.
//!
//! A [`Filter`] is a conjunction of conditions on dotted field paths. The
//! empty filter matches every document.

use serde_json::Value;

use crate::errors::StoreError;
use crate::store::validate_field_path;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The field equals the value.
    Eq { path: String, value: Value },
    /// The field is an array holding the value.
    Contains { path: String, value: Value },
}

impl Condition {
    pub fn path(&self) -> &str {
        match self {
            Condition::Eq { path, .. } | Condition::Contains { path, .. } => path,
        }
    }

    fn matches(&self, doc: &Value) -> bool {
        match self {
            Condition::Eq { path, value } => resolve(doc, path) == Some(value),
            Condition::Contains { path, value } => resolve(doc, path)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(path, value)
    }

    pub fn contains(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_contains(path, value)
    }

    pub fn and_eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn and_contains(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Contains {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Checks every field path against the naming rules.
    pub fn validate(&self) -> Result<(), StoreError> {
        self.conditions
            .iter()
            .try_for_each(|c| validate_field_path(c.path()))
    }

    /// Evaluates the filter against an in-memory document.
    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

/// Follows a dotted path through nested objects.
pub fn resolve<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, key| current.get(key))
}
