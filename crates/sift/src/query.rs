//! Queries: field path → condition, all of which must hold.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{Condition, Matcher};
use crate::context::Context;
use crate::error::Result;
use crate::path::FieldPath;

/// A conjunction of field conditions.
///
/// An empty query matches every record.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use sift::{Condition, Context, Query};
///
/// let query = Query::new()
///     .field("text", Condition::eq("foo"))
///     .field("num", Condition::gte(2));
///
/// let compiled = query.compile(&Context::new())?;
/// assert!(compiled.matches(&json!({"text": "foo", "num": 3})));
/// assert!(!compiled.matches(&json!({"text": "foo", "num": 1})));
/// # Ok::<(), sift::SiftError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    conditions: BTreeMap<String, Condition>,
}

impl Query {
    /// Creates an empty query.
    pub fn new() -> Self {
        Query::default()
    }

    /// Sets the condition for a field path, replacing any previous one.
    pub fn field(mut self, path: impl Into<String>, condition: Condition) -> Self {
        self.conditions.insert(path.into(), condition);
        self
    }

    /// Returns the condition on a field path.
    pub fn condition(&self, path: &str) -> Option<&Condition> {
        self.conditions.get(path)
    }

    /// Iterates over the field paths and their conditions.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(path, c)| (path.as_str(), c))
    }

    /// Returns the number of field conditions.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Returns `true` if this query has no conditions (matches everything).
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Compiles every field condition.
    pub fn compile(&self, ctx: &Context) -> Result<CompiledQuery> {
        let fields = self
            .conditions
            .iter()
            .map(|(path, condition)| Ok((FieldPath::new(path.as_str()), condition.compile(ctx)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledQuery { fields })
    }
}

/// A compiled [`Query`].
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    fields: Vec<(FieldPath, Matcher)>,
}

impl CompiledQuery {
    /// Tests a document: every field matcher must accept the values
    /// extracted at its path.
    pub fn matches(&self, doc: &Value) -> bool {
        self.fields
            .iter()
            .all(|(path, matcher)| matcher.test(&path.extract(doc)))
    }
}
