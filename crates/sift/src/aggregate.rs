//! Aggregation pipelines: ordered filter and bucket steps.
//!
//! Steps are evaluated **right-to-left**: the last declared step runs on the
//! source records first and each earlier step consumes the output of the
//! step declared after it.
//!
//! ```text
//! steps:  [Buckets(team), Filter(active)]
//! runs:   records -> Filter(active) -> Buckets(team)
//! ```
//!
//! Once a `Buckets` step has run, the items are buckets. Steps evaluated
//! after that see each bucket as the document
//! `{"id": .., "value": .., "buckets": [..]}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bucket::{bucketize, Bucket, BucketOptions};
use crate::context::Context;
use crate::error::Result;
use crate::record::Record;
use crate::statement::{Predicate, Statement};

/// One pipeline step.
///
/// JSON form: `{"type": "filter", "statements": [...]}` or
/// `{"type": "buckets", "options": {...}}`. Any other `type` loads as
/// [`Step::Unknown`] and passes items through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Step {
    /// Keeps the items matching every statement.
    Filter {
        #[serde(default)]
        statements: Vec<Statement>,
    },
    /// Replaces the items with their buckets.
    Buckets { options: BucketOptions },
    /// Unrecognized step kind.
    #[serde(other)]
    Unknown,
}

impl Step {
    /// Returns the step kind as it appears in JSON.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Filter { .. } => "filter",
            Step::Buckets { .. } => "buckets",
            Step::Unknown => "unknown",
        }
    }
}

/// Items flowing through a pipeline, and its result.
#[derive(Debug, Clone, PartialEq)]
pub enum Output<'a, R> {
    /// Source records that survived every filter.
    Records(Vec<&'a R>),
    /// Buckets produced by the last bucket step.
    Buckets(Vec<Bucket>),
}

impl<'a, R> Output<'a, R> {
    /// Number of items.
    pub fn len(&self) -> usize {
        match self {
            Output::Records(records) => records.len(),
            Output::Buckets(buckets) => buckets.len(),
        }
    }

    /// Returns `true` if there are no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the records, if no bucket step ran.
    pub fn records(&self) -> Option<&[&'a R]> {
        match self {
            Output::Records(records) => Some(records.as_slice()),
            Output::Buckets(_) => None,
        }
    }

    /// Returns the buckets, if a bucket step ran.
    pub fn buckets(&self) -> Option<&[Bucket]> {
        match self {
            Output::Records(_) => None,
            Output::Buckets(buckets) => Some(buckets.as_slice()),
        }
    }

    /// Consumes the output, returning the buckets if a bucket step ran.
    pub fn into_buckets(self) -> Option<Vec<Bucket>> {
        match self {
            Output::Records(_) => None,
            Output::Buckets(buckets) => Some(buckets),
        }
    }
}

enum Stage<'s> {
    Filter(Predicate),
    Buckets(&'s BucketOptions),
    PassThrough,
}

/// An ordered list of steps.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use sift::{Aggregation, BucketOptions, Condition, Query, Statement};
///
/// let records = vec![
///     json!({"id": 1, "team": "x", "active": true}),
///     json!({"id": 2, "team": "x", "active": false}),
///     json!({"id": 3, "team": "y", "active": true}),
/// ];
///
/// // declared top-down, evaluated bottom-up: filter first, then bucket
/// let pipeline = Aggregation::new()
///     .buckets(BucketOptions::new("team"))
///     .filter([Statement::from(Query::new().field("active", Condition::eq(true)))]);
///
/// let buckets = pipeline.run(&records)?.into_buckets().unwrap_or_default();
/// assert_eq!(buckets.len(), 2);
/// assert!(buckets.iter().all(|b| b.value == 1));
/// # Ok::<(), sift::SiftError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Steps in declaration order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Aggregation {
    /// Creates an empty pipeline. It returns every record unchanged.
    pub fn new() -> Self {
        Aggregation::default()
    }

    /// Loads a pipeline from its JSON description.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Appends a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends a filter step.
    pub fn filter(self, statements: impl IntoIterator<Item = Statement>) -> Self {
        self.step(Step::Filter {
            statements: statements.into_iter().collect(),
        })
    }

    /// Appends a bucket step.
    pub fn buckets(self, options: BucketOptions) -> Self {
        self.step(Step::Buckets { options })
    }

    /// Runs the pipeline with the current time as context.
    pub fn run<'a, R: Record>(&self, records: &'a [R]) -> Result<Output<'a, R>> {
        self.run_with(records, &Context::new())
    }

    /// Runs the pipeline with an explicit context.
    ///
    /// Every step is compiled before any record is read, so a malformed
    /// step fails the whole run.
    pub fn run_with<'a, R: Record>(
        &self,
        records: &'a [R],
        ctx: &Context,
    ) -> Result<Output<'a, R>> {
        let stages = self
            .steps
            .iter()
            .map(|step| compile_step(step, ctx))
            .collect::<Result<Vec<_>>>()?;

        let mut items = Output::Records(records.iter().collect());
        // Right-to-left: the last declared step sees the source first.
        for (stage, step) in stages.iter().zip(&self.steps).rev() {
            let before = items.len();
            items = run_stage(stage, items, ctx)?;
            tracing::debug!(
                step = step.kind(),
                input = before,
                output = items.len(),
                "Ran aggregation step"
            );
        }
        Ok(items)
    }
}

fn compile_step<'s>(step: &'s Step, ctx: &Context) -> Result<Stage<'s>> {
    match step {
        Step::Filter { statements } => Ok(Stage::Filter(Predicate::compile(statements, ctx)?)),
        Step::Buckets { options } => {
            options.validate()?;
            Ok(Stage::Buckets(options))
        }
        Step::Unknown => {
            tracing::warn!("Unknown aggregation step, passing items through");
            Ok(Stage::PassThrough)
        }
    }
}

fn run_stage<'a, R: Record>(
    stage: &Stage<'_>,
    items: Output<'a, R>,
    ctx: &Context,
) -> Result<Output<'a, R>> {
    Ok(match (stage, items) {
        (Stage::PassThrough, items) => items,
        (Stage::Filter(predicate), Output::Records(mut records)) => {
            records.retain(|r| predicate.matches(r.document()));
            Output::Records(records)
        }
        (Stage::Filter(predicate), Output::Buckets(mut buckets)) => {
            buckets.retain(|b| predicate.matches(&b.to_document()));
            Output::Buckets(buckets)
        }
        (Stage::Buckets(options), Output::Records(records)) => {
            Output::Buckets(bucketize(&records, options, ctx)?)
        }
        (Stage::Buckets(options), Output::Buckets(buckets)) => {
            let docs: Vec<Value> = buckets.iter().map(Bucket::to_document).collect();
            Output::Buckets(bucketize(&docs, options, ctx)?)
        }
    })
}
