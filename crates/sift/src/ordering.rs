//! Sorting: direction, sort description and the record comparator.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SiftError;
use crate::path::FieldPath;
use crate::record::{Record, ID_FIELD};
use crate::value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dir {
    /// Ascending order (smallest first).
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

impl Dir {
    /// Applies this direction to an ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    /// Returns the display name of this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "ASC",
            Dir::Desc => "DESC",
        }
    }
}

impl std::fmt::Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Picks one element of a list field by id and sorts on one of its
/// properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSelector {
    /// Identifier of the element to pick.
    pub sub_id: Value,
    /// Property of that element to sort on.
    pub sub_prop: String,
}

/// Sort configuration of a filter.
///
/// JSON form: `{"field": .., "subId": .., "subProp": .., "direction": ..}`.
/// `subId` and `subProp` come together or not at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSortSpec", into = "RawSortSpec")]
pub struct SortSpec {
    /// Field to sort by.
    pub field: FieldPath,
    /// Optional element selector when `field` holds a list.
    pub sub: Option<SubSelector>,
    /// Sort direction.
    pub direction: Dir,
}

impl SortSpec {
    /// Sorts by a field.
    pub fn new(field: impl Into<FieldPath>, direction: Dir) -> Self {
        SortSpec {
            field: field.into(),
            sub: None,
            direction,
        }
    }

    /// Ascending sort by a field.
    pub fn asc(field: impl Into<FieldPath>) -> Self {
        SortSpec::new(field, Dir::Asc)
    }

    /// Descending sort by a field.
    pub fn desc(field: impl Into<FieldPath>) -> Self {
        SortSpec::new(field, Dir::Desc)
    }

    /// Sorts on `prop` of the list element whose id is `id`.
    pub fn with_sub(mut self, id: impl Into<Value>, prop: impl Into<String>) -> Self {
        self.sub = Some(SubSelector {
            sub_id: id.into(),
            sub_prop: prop.into(),
        });
        self
    }

    /// Resolves the sort value of a document. `None` means null.
    pub fn sort_value<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        let value = self.field.lookup(doc)?;
        let resolved = match (&self.sub, value) {
            (Some(sub), Value::Array(items)) => items
                .iter()
                .find(|item| {
                    item.get(ID_FIELD)
                        .is_some_and(|id| value::strict_eq(id, &sub.sub_id))
                })
                .and_then(|item| item.get(sub.sub_prop.as_str()))?,
            (Some(_), _) | (None, Value::Array(_)) => return None,
            (None, other) => other,
        };
        (!resolved.is_null()).then_some(resolved)
    }

    /// Compares two records.
    ///
    /// - both null: by record id, scaled by direction
    /// - one null: the null sorts last in either direction
    /// - otherwise by value, then by record id, scaled by direction
    ///
    /// Values of different kinds order by [`value::sort_cmp`], so the
    /// comparator is total even over mixed-type fields.
    pub fn compare<R: Record + ?Sized>(&self, a: &R, b: &R) -> Ordering {
        let by_id = || compare_ids(a.record_id(), b.record_id());
        match (self.sort_value(a.document()), self.sort_value(b.document())) {
            (None, None) => self.direction.apply(by_id()),
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let by_value = value::sort_cmp(x, y);
                self.direction.apply(by_value.then_with(by_id))
            }
        }
    }
}

/// Serialized shape of a [`SortSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSortSpec {
    field: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_prop: Option<String>,
    #[serde(default)]
    direction: Dir,
}

impl TryFrom<RawSortSpec> for SortSpec {
    type Error = SiftError;

    fn try_from(raw: RawSortSpec) -> Result<Self, SiftError> {
        let sub = match (raw.sub_id, raw.sub_prop) {
            (Some(sub_id), Some(sub_prop)) => Some(SubSelector { sub_id, sub_prop }),
            (None, None) => None,
            _ => return Err(SiftError::IncompleteSelector),
        };
        Ok(SortSpec {
            field: raw.field,
            sub,
            direction: raw.direction,
        })
    }
}

impl From<SortSpec> for RawSortSpec {
    fn from(spec: SortSpec) -> Self {
        let (sub_id, sub_prop) = match spec.sub {
            Some(sub) => (Some(sub.sub_id), Some(sub.sub_prop)),
            None => (None, None),
        };
        RawSortSpec {
            field: spec.field,
            sub_id,
            sub_prop,
            direction: spec.direction,
        }
    }
}

/// Orders record identifiers. Missing ids sort first; present ids order by
/// [`value::sort_cmp`].
pub fn compare_ids(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => value::sort_cmp(x, y),
    }
}
