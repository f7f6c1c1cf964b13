//! Sift - In-memory query interpreter for collections of records.
//!
//! Sift turns declarative descriptions into executable predicates and runs
//! them over slices of records. It supports:
//!
//! - Dotted field paths that flatten through nested lists
//! - Conditions: equality, ordering, prefix, relative dates, nested queries
//! - Boolean structure: queries (AND) inside statements (OR) inside filters (AND)
//! - Deterministic sorting with nulls last and id tie-breaks
//! - Recursive bucketing by raw value, numeric interval or calendar unit
//! - Aggregation pipelines of filter and bucket steps
//!
//! Every description can be built in code or loaded from JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use sift::{BucketOptions, Condition, Dir, Filter};
//!
//! let records = vec![
//!     json!({"id": 1, "text": "lark", "num": 1}),
//!     json!({"id": 2, "text": "larkspur", "num": 2}),
//!     json!({"id": 3, "text": "owl", "num": 3}),
//! ];
//!
//! let filter = Filter::builder()
//!     .field("text", Condition::prefix("lark"))
//!     .sort_by("num", Dir::Desc)
//!     .build();
//!
//! let results = filter.apply(&records)?;
//! assert_eq!(results.len(), 2);
//! assert_eq!(results[0]["id"], 2);
//!
//! let buckets = BucketOptions::new("num").interval(2.0).apply(&records)?;
//! assert_eq!(buckets.len(), 2);
//! # Ok::<(), sift::SiftError>(())
//! ```
//!
//! # Filter Semantics
//!
//! ```text
//! filter    = every statement holds
//! statement = at least one query holds
//! query     = every field condition holds
//! ```
//!
//! An empty filter matches everything; a statement with no queries matches
//! nothing.
//!
//! # Operators
//!
//! | Tag | Operand | Holds when |
//! |-----|---------|------------|
//! | `EQ` | scalar | some value equals it; with `null`, every value is blank |
//! | `NEQ` | scalar | no value equals it; with `null`, some value is present |
//! | `LT` `GT` `LTE` `GTE` | scalar or `{"daysAgo": n}` | some value orders accordingly |
//! | `PREFIX` | string | some string value starts with it |
//! | `ALL` `ANY` | conditions | every / some sub-condition holds |
//! | `FIND` `NFIND` | query | some / no extracted element matches |
//!
//! Missing fields and malformed values never raise: they simply produce no
//! value. Only malformed descriptions are errors ([`SiftError`]).

mod aggregate;
mod bucket;
pub mod calendar;
mod condition;
mod context;
mod error;
mod filter;
mod op;
mod ordering;
mod path;
mod query;
mod record;
mod statement;
pub mod value;

// Re-export public API
pub use aggregate::{Aggregation, Output, Step};
pub use bucket::{bucketize, merge_buckets, Bucket, BucketOptions, BucketSet};
pub use calendar::DateUnit;
pub use condition::{Bound, Condition, Matcher, Operand};
pub use context::Context;
pub use error::{Result, SiftError};
pub use filter::{CompiledFilter, Filter, FilterBuilder};
pub use op::Op;
pub use ordering::{compare_ids, Dir, SortSpec, SubSelector};
pub use path::FieldPath;
pub use query::{CompiledQuery, Query};
pub use record::{Document, Record, ID_FIELD};
pub use statement::{Predicate, Statement};
