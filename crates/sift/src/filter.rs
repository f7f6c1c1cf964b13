//! Filter descriptions, their builder and the filter pipeline.
//!
//! A [`Filter`] runs three stages over a record slice:
//!
//! 1. keep records matching every statement (see [`crate::statement`])
//! 2. stable sort by the optional [`SortSpec`]
//! 3. truncate to the optional limit
//!
//! The input slice is never modified; results borrow from it.

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, Operand};
use crate::context::Context;
use crate::error::Result;
use crate::ordering::{Dir, SortSpec};
use crate::query::Query;
use crate::record::Record;
use crate::statement::{Predicate, Statement};

/// A filter description.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use sift::{Condition, Dir, Filter};
///
/// let records = vec![
///     json!({"id": 1, "text": "foo", "num": 1}),
///     json!({"id": 2, "text": "bar", "num": 1}),
///     json!({"id": 3, "text": "foo", "num": 2}),
/// ];
///
/// // text = foo OR num = 2, newest first
/// let filter = Filter::builder()
///     .field("text", Condition::eq("foo"))
///     .or()
///     .field("num", Condition::eq(2))
///     .sort_by("id", Dir::Desc)
///     .limit(10)
///     .build();
///
/// let ids: Vec<_> = filter.apply(&records)?.iter().map(|r| r["id"].clone()).collect();
/// assert_eq!(ids, [json!(3), json!(1)]);
/// # Ok::<(), sift::SiftError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Statements, all of which must hold.
    #[serde(default)]
    pub statements: Vec<Statement>,
    /// Optional sort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
    /// Maximum number of results. `None` is unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    /// Creates a filter that matches everything.
    pub fn new() -> Self {
        Filter::default()
    }

    /// Starts a fluent builder.
    pub fn builder() -> FilterBuilder {
        FilterBuilder::default()
    }

    /// Loads a filter from its JSON description.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Compiles the statements against an evaluation context.
    pub fn compile(&self, ctx: &Context) -> Result<CompiledFilter> {
        let predicate = Predicate::compile(&self.statements, ctx)?;
        tracing::debug!(
            statements = self.statements.len(),
            sort = self.sort.as_ref().map(|s| s.field.as_str()),
            limit = self.limit,
            "Compiled filter"
        );
        Ok(CompiledFilter {
            predicate,
            sort: self.sort.clone(),
            limit: self.limit,
        })
    }

    /// Runs the pipeline with the current time as context.
    pub fn apply<'a, R: Record>(&self, records: &'a [R]) -> Result<Vec<&'a R>> {
        self.apply_with(records, &Context::new())
    }

    /// Runs the pipeline with an explicit context.
    pub fn apply_with<'a, R: Record>(&self, records: &'a [R], ctx: &Context) -> Result<Vec<&'a R>> {
        Ok(self.compile(ctx)?.apply(records))
    }

    /// Runs the pipeline and clones the results.
    pub fn apply_cloned<R: Record + Clone>(&self, records: &[R]) -> Result<Vec<R>> {
        Ok(self.apply(records)?.into_iter().cloned().collect())
    }

    /// Counts records matching the statements. Sort and limit are ignored.
    pub fn count<R: Record>(&self, records: &[R]) -> Result<usize> {
        self.count_with(records, &Context::new())
    }

    /// Counts matching records with an explicit context.
    pub fn count_with<R: Record>(&self, records: &[R], ctx: &Context) -> Result<usize> {
        let compiled = self.compile(ctx)?;
        Ok(records.iter().filter(|r| compiled.matches(*r)).count())
    }

    /// Tests one record against the statements.
    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> Result<bool> {
        self.matches_with(record, &Context::new())
    }

    /// Tests one record with an explicit context.
    pub fn matches_with<R: Record + ?Sized>(&self, record: &R, ctx: &Context) -> Result<bool> {
        Ok(self.compile(ctx)?.matches(record))
    }
}

/// A compiled [`Filter`], reusable across record slices.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    predicate: Predicate,
    sort: Option<SortSpec>,
    limit: Option<usize>,
}

impl CompiledFilter {
    /// Tests one record against the statements.
    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> bool {
        self.predicate.matches(record.document())
    }

    /// Filters, sorts and truncates.
    pub fn apply<'a, R: Record>(&self, records: &'a [R]) -> Vec<&'a R> {
        if self.limit == Some(0) {
            return Vec::new();
        }

        let mut results: Vec<&'a R> = records.iter().filter(|r| self.matches(*r)).collect();

        if let Some(sort) = &self.sort {
            results.sort_by(|a, b| sort.compare(*a, *b));
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }

        tracing::debug!(input = records.len(), output = results.len(), "Applied filter");
        results
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Same,
    Query,
    Statement,
}

/// Fluent builder for [`Filter`].
///
/// Field conditions accumulate into the current query. [`or`](Self::or)
/// opens a new alternative query in the current statement;
/// [`and`](Self::and) opens a new statement.
///
/// ```text
/// .field(a).and().field(b)  =>  [[a], [b]]   a AND b
/// .field(a).or().field(b)   =>  [[a, b]]     a OR b
/// ```
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    filter: Filter,
    pending: Pending,
}

impl Default for FilterBuilder {
    fn default() -> Self {
        FilterBuilder {
            filter: Filter::default(),
            pending: Pending::Statement,
        }
    }
}

impl FilterBuilder {
    // ========================================================================
    // Statements
    // ========================================================================

    /// Adds a field condition to the current query.
    pub fn field(self, path: impl Into<String>, condition: Condition) -> Self {
        let path = path.into();
        self.with_current(move |query| query.field(path, condition))
    }

    /// Adds every condition of `query` to the current query.
    pub fn query(self, query: Query) -> Self {
        self.with_current(move |current| {
            query
                .iter()
                .fold(current, |acc, (path, c)| acc.field(path, c.clone()))
        })
    }

    /// Shorthand for an equality condition.
    pub fn eq(self, path: impl Into<String>, value: impl Into<Operand>) -> Self {
        self.field(path, Condition::eq(value))
    }

    /// Starts an alternative query in the current statement.
    pub fn or(mut self) -> Self {
        if self.pending == Pending::Same {
            self.pending = Pending::Query;
        }
        self
    }

    /// Starts a new statement.
    pub fn and(mut self) -> Self {
        self.pending = Pending::Statement;
        self
    }

    /// Appends a complete statement.
    pub fn statement(mut self, statement: impl Into<Statement>) -> Self {
        self.filter.statements.push(statement.into());
        self.pending = Pending::Statement;
        self
    }

    fn with_current(mut self, update: impl FnOnce(Query) -> Query) -> Self {
        let statements = &mut self.filter.statements;
        match (self.pending, statements.last_mut()) {
            (Pending::Same, Some(_)) => {}
            (Pending::Query, Some(statement)) => statement.push(Query::new()),
            (_, _) => statements.push(Statement::from(Query::new())),
        }
        if let Some(query) = statements
            .last_mut()
            .and_then(|statement| statement.queries_mut().last_mut())
        {
            *query = update(std::mem::take(query));
        }
        self.pending = Pending::Same;
        self
    }

    // ========================================================================
    // Sort and limit
    // ========================================================================

    /// Sorts by a field.
    pub fn sort_by(mut self, field: &str, dir: Dir) -> Self {
        self.filter.sort = Some(SortSpec::new(field, dir));
        self
    }

    /// Sorts by `prop` of the list element at `field` whose id is `id`.
    pub fn sort_by_element(
        mut self,
        field: &str,
        id: impl Into<serde_json::Value>,
        prop: &str,
        dir: Dir,
    ) -> Self {
        self.filter.sort = Some(SortSpec::new(field, dir).with_sub(id, prop));
        self
    }

    /// Sets the maximum number of results.
    pub fn limit(mut self, n: usize) -> Self {
        self.filter.limit = Some(n);
        self
    }

    /// Finalizes the filter.
    pub fn build(self) -> Filter {
        self.filter
    }
}
