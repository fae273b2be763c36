//! SQL builder for document filters.
//!
//! Translates a [`Filter`] into a WHERE clause over the `doc` JSONB column
//! while tracking parameter indices for safe binding.

use serde_json::Value;

use crate::errors::StoreError;
use crate::filter::{Condition, Filter};

/// Returns the `doc #> '{a,b}'` expression for a dotted field path.
///
/// The path must already be validated; its segments are interpolated verbatim.
pub fn json_path_expr(path: &str) -> String {
    format!("doc #> '{{{}}}'", path.replace('.', ","))
}

/// Builder for WHERE clauses with JSONB parameters.
///
/// # Example
/// ```ignore
/// let mut qb = QueryBuilder::new();
/// qb.add_filter(&Filter::eq("category", "Electronics"))?;
/// let sql = format!("SELECT doc FROM products{}", qb.where_sql());
/// ```
#[derive(Debug)]
pub struct QueryBuilder {
    conditions: Vec<String>,
    params: Vec<Value>,
    param_idx: usize,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    /// Creates a new empty query builder.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a builder whose first placeholder is `$idx`, for statements that
    /// bind other values before the filter.
    pub fn starting_at(idx: usize) -> Self {
        Self {
            conditions: Vec::new(),
            params: Vec::new(),
            param_idx: idx,
        }
    }

    /// Adds a condition ending in a parameter placeholder and records its value.
    /// Returns the parameter index that was used.
    pub fn add_param_condition(&mut self, condition_prefix: &str, value: Value) -> usize {
        let idx = self.param_idx;
        self.conditions.push(format!("{condition_prefix}${idx}"));
        self.params.push(value);
        self.param_idx += 1;
        idx
    }

    /// Adds every condition of a filter.
    pub fn add_filter(&mut self, filter: &Filter) -> Result<&mut Self, StoreError> {
        filter.validate()?;
        for condition in filter.conditions() {
            match condition {
                Condition::Eq { path, value } => {
                    self.add_param_condition(
                        &format!("{} = ", json_path_expr(path)),
                        value.clone(),
                    );
                }
                Condition::Contains { path, value } => {
                    self.add_param_condition(
                        &format!("{} @> ", json_path_expr(path)),
                        Value::Array(vec![value.clone()]),
                    );
                }
            }
        }
        Ok(self)
    }

    /// Returns true if no conditions have been added.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Builds the WHERE clause string (without the "WHERE" keyword).
    /// Returns an empty string if no conditions were added.
    pub fn build_where(&self) -> String {
        self.conditions.join(" AND ")
    }

    /// Builds ` WHERE ...` ready to append to a statement, or an empty string.
    pub fn where_sql(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.build_where())
        }
    }

    /// Bound values in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }
}
