//! Condition operator tags.
//!
//! [`Op`] names every operator a [`Condition`](crate::Condition) can carry.
//! It is the tag used in JSON descriptions (`{"op": "GTE", ...}`).

use std::cmp::Ordering;

/// Operator of a condition.
///
/// Operators are grouped by payload:
/// - **Scalar**: `Eq`, `Neq`, `Prefix`
/// - **Order**: `Lt`, `Gt`, `Lte`, `Gte` (scalar or relative-date operand)
/// - **Composite**: `All`, `Any`
/// - **Nested**: `Find`, `NFind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Less than.
    Lt,
    /// Greater than.
    Gt,
    /// Less than or equal.
    Lte,
    /// Greater than or equal.
    Gte,
    /// Every sub-condition holds.
    All,
    /// At least one sub-condition holds.
    Any,
    /// String starts with prefix.
    Prefix,
    /// Some list element matches a nested query.
    Find,
    /// No list element matches a nested query.
    NFind,
}

impl Op {
    /// Every operator, in declaration order.
    pub const VARIANTS: [Op; 11] = [
        Op::Eq,
        Op::Neq,
        Op::Lt,
        Op::Gt,
        Op::Lte,
        Op::Gte,
        Op::All,
        Op::Any,
        Op::Prefix,
        Op::Find,
        Op::NFind,
    ];

    /// Parses a tag, ignoring ASCII case.
    pub fn parse(tag: &str) -> Option<Op> {
        Op::VARIANTS
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(tag))
    }

    /// Evaluates an order operator given `value.cmp(bound)`.
    ///
    /// Non-order operators return `false`.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Op::Lt => ordering == Ordering::Less,
            Op::Gt => ordering == Ordering::Greater,
            Op::Lte => ordering != Ordering::Greater,
            Op::Gte => ordering != Ordering::Less,
            _ => false,
        }
    }

    /// Returns the tag of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "EQ",
            Op::Neq => "NEQ",
            Op::Lt => "LT",
            Op::Gt => "GT",
            Op::Lte => "LTE",
            Op::Gte => "GTE",
            Op::All => "ALL",
            Op::Any => "ANY",
            Op::Prefix => "PREFIX",
            Op::Find => "FIND",
            Op::NFind => "NFIND",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
