//! Statements: OR-lists of queries, combined with AND.
//!
//! ```text
//! match = every statement has at least one matching query
//! ```
//!
//! `[[q1], [q2, q3]]` therefore reads `q1 AND (q2 OR q3)`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::error::Result;
use crate::query::{CompiledQuery, Query};

/// A disjunction of queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statement {
    queries: Vec<Query>,
}

impl Statement {
    /// Creates a statement from its alternatives.
    pub fn new(queries: impl IntoIterator<Item = Query>) -> Self {
        Statement {
            queries: queries.into_iter().collect(),
        }
    }

    /// Returns the alternatives.
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Appends an alternative.
    pub fn push(&mut self, query: Query) {
        self.queries.push(query);
    }

    pub(crate) fn queries_mut(&mut self) -> &mut Vec<Query> {
        &mut self.queries
    }
}

impl From<Query> for Statement {
    fn from(query: Query) -> Self {
        Statement::new([query])
    }
}

impl From<Vec<Query>> for Statement {
    fn from(queries: Vec<Query>) -> Self {
        Statement { queries }
    }
}

/// Compiled statement list.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    statements: Vec<Vec<CompiledQuery>>,
}

impl Predicate {
    /// Compiles a statement list.
    pub fn compile(statements: &[Statement], ctx: &Context) -> Result<Self> {
        let statements = statements
            .iter()
            .map(|statement| {
                statement
                    .queries
                    .iter()
                    .map(|query| query.compile(ctx))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Predicate { statements })
    }

    /// Returns `true` if there are no statements (matches everything).
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Tests a document.
    pub fn matches(&self, doc: &Value) -> bool {
        self.statements
            .iter()
            .all(|alternatives| alternatives.iter().any(|query| query.matches(doc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use serde_json::json;

    fn eq(path: &str, value: i64) -> Query {
        Query::new().field(path, Condition::eq(value))
    }

    fn predicate(statements: &[Statement]) -> Predicate {
        Predicate::compile(statements, &Context::new()).unwrap()
    }

    #[test]
    fn empty_statement_list_matches_everything() {
        let p = predicate(&[]);
        assert!(p.is_empty());
        assert!(p.matches(&json!({"a": 1})));
    }

    #[test]
    fn statement_without_queries_matches_nothing() {
        let p = predicate(&[Statement::default()]);
        assert!(!p.matches(&json!({"a": 1})));
    }

    #[test]
    fn and_of_ors() {
        // a = 1 AND (b = 1 OR c = 1)
        let p = predicate(&[
            Statement::from(eq("a", 1)),
            Statement::new([eq("b", 1), eq("c", 1)]),
        ]);

        for a in 0..2 {
            for b in 0..2 {
                for c in 0..2 {
                    let doc = json!({"a": a, "b": b, "c": c});
                    let expected = a == 1 && (b == 1 || c == 1);
                    assert_eq!(p.matches(&doc), expected, "{doc}");
                }
            }
        }
    }

    #[test]
    fn json_form_is_nested_lists() {
        let statements: Vec<Statement> = serde_json::from_value(json!([
            [{"a": {"op": "EQ", "value": 1}}],
            [{"b": {"op": "EQ", "value": 1}}, {"c": {"op": "EQ", "value": 1}}]
        ]))
        .unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].queries(), [eq("b", 1), eq("c", 1)]);
    }
}
