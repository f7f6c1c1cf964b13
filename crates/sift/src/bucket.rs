//! Bucket reducer: recursive grouping of records into counted buckets.
//!
//! Each record is keyed in one of three ways:
//!
//! - **raw**: the value at `fieldId`
//! - **interval**: `v - (v % interval)` for a numeric value `v`
//! - **date unit**: the value read as an instant and truncated to the unit
//!
//! Missing, null or unusable values produce the no-value key (`id: None`).
//! Buckets are accumulated in a [`BucketSet`], an arena indexed by key that
//! merges on collision, so partial results over shards can be combined with
//! [`merge_buckets`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::calendar::{self, DateUnit};
use crate::context::Context;
use crate::error::{Result, SiftError};
use crate::path::FieldPath;
use crate::record::{Record, ID_FIELD};
use crate::value;

/// Grouping options for one bucket level.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use sift::{bucketize, BucketOptions, Context};
///
/// let records: Vec<_> = (1..=4).map(|n| json!({"id": n, "num": n})).collect();
/// let options = BucketOptions::new("num").interval(2.0);
///
/// let buckets = bucketize(&records, &options, &Context::new())?;
/// let counts: Vec<_> = buckets.iter().map(|b| (b.id.clone(), b.value)).collect();
/// assert_eq!(counts, [(Some(json!(0)), 1), (Some(json!(2)), 2), (Some(json!(4)), 1)]);
/// # Ok::<(), sift::SiftError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketOptions {
    /// Field holding the grouping value.
    pub field_id: FieldPath,
    /// Allow-list of keys. `null` admits the no-value key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    /// Numeric interval width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
    /// Date truncation unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<DateUnit>,
    /// Ids of the list elements at `fieldId` to group by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_field_ids: Option<Vec<Value>>,
    /// Property of each selected element holding its grouping value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_field_prop: Option<String>,
    /// Options for the next bucket level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_buckets: Option<Box<BucketOptions>>,
}

impl BucketOptions {
    /// Groups by the raw value of a field.
    pub fn new(field_id: impl Into<FieldPath>) -> Self {
        BucketOptions {
            field_id: field_id.into(),
            values: None,
            interval: None,
            unit: None,
            sub_field_ids: None,
            sub_field_prop: None,
            sub_buckets: None,
        }
    }

    /// Loads options from their JSON description.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Only keeps records whose key is listed.
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Groups numeric values into intervals of this width.
    pub fn interval(mut self, width: f64) -> Self {
        self.interval = Some(width);
        self
    }

    /// Groups date values by calendar unit.
    pub fn unit(mut self, unit: DateUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Groups by `prop` of the list elements at the field whose id is
    /// listed.
    pub fn sub_fields<I, V>(mut self, ids: I, prop: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.sub_field_ids = Some(ids.into_iter().map(Into::into).collect());
        self.sub_field_prop = Some(prop.into());
        self
    }

    /// Nests another bucket level.
    pub fn sub_buckets(mut self, options: BucketOptions) -> Self {
        self.sub_buckets = Some(Box::new(options));
        self
    }

    /// Checks every level for an invalid interval.
    pub fn validate(&self) -> Result<()> {
        if let Some(width) = self.interval {
            if !(width.is_finite() && width > 0.0) {
                return Err(SiftError::InvalidInterval(width));
            }
        }
        match &self.sub_buckets {
            Some(sub) => sub.validate(),
            None => Ok(()),
        }
    }

    /// Groups records with the current time as context.
    pub fn apply<R: Record>(&self, records: &[R]) -> Result<Vec<Bucket>> {
        bucketize(records, self, &Context::new())
    }

    /// Normalizes a raw grouping value into a bucket key.
    ///
    /// A date unit takes precedence over an interval.
    pub fn key_of(&self, raw: Option<&Value>, ctx: &Context) -> Option<Value> {
        let raw = raw.filter(|v| !v.is_null())?;
        if let Some(unit) = self.unit {
            return calendar::parse_instant(raw)
                .and_then(|instant| unit.truncate(instant, ctx.week_start()))
                .map(|start| Value::String(calendar::format_instant(start)));
        }
        if let Some(width) = self.interval {
            let n = raw.as_f64()?;
            return Some(value::number_value(n - n % width));
        }
        Some(raw.clone())
    }

    fn admits(&self, key: Option<&Value>) -> bool {
        let Some(allowed) = &self.values else {
            return true;
        };
        match key {
            None => allowed.iter().any(Value::is_null),
            Some(key) => allowed.iter().any(|v| value::strict_eq(v, key)),
        }
    }

    /// Keys contributed by one document.
    fn keys_of(&self, doc: &Value, ctx: &Context) -> Vec<Option<Value>> {
        let field = self.field_id.lookup(doc);
        let keys = match &self.sub_field_ids {
            None => vec![self.key_of(field, ctx)],
            Some(ids) => match field {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter(|item| {
                        item.get(ID_FIELD)
                            .is_some_and(|id| ids.iter().any(|want| value::strict_eq(want, id)))
                    })
                    .map(|item| {
                        let raw = match &self.sub_field_prop {
                            Some(prop) => item.get(prop.as_str()),
                            None => Some(item),
                        };
                        self.key_of(raw, ctx)
                    })
                    .collect(),
                _ => Vec::new(),
            },
        };
        keys.into_iter().filter(|k| self.admits(k.as_ref())).collect()
    }
}

/// One group: its key, record count and child groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Grouping key. `None` collects records without a usable value.
    pub id: Option<Value>,
    /// Number of records in this bucket.
    pub value: usize,
    /// Child buckets.
    #[serde(default)]
    pub buckets: Vec<Bucket>,
}

impl Bucket {
    /// Document form `{"id", "value", "buckets"}`, as seen by later
    /// aggregation steps.
    pub fn to_document(&self) -> Value {
        json!({
            "id": self.id,
            "value": self.value,
            "buckets": self.buckets.iter().map(Bucket::to_document).collect::<Vec<_>>(),
        })
    }
}

impl From<&Bucket> for Value {
    fn from(bucket: &Bucket) -> Self {
        bucket.to_document()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: Option<Value>,
    count: usize,
    children: BucketSet,
}

/// Bucket accumulator: entries in first-encounter order, indexed by the
/// canonical form of their key.
#[derive(Debug, Clone, Default)]
pub struct BucketSet {
    index: HashMap<Option<String>, usize>,
    entries: Vec<Entry>,
}

impl BucketSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        BucketSet::default()
    }

    /// Returns the number of top-level buckets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no buckets.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the top-level counts.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Buckets one document. Each admitted key adds a count of one plus the
    /// sub-buckets computed over this document alone.
    pub fn insert(mut self, doc: &Value, options: &BucketOptions, ctx: &Context) -> Self {
        for key in options.keys_of(doc, ctx) {
            let children = match &options.sub_buckets {
                Some(sub) => BucketSet::new().insert(doc, sub, ctx),
                None => BucketSet::new(),
            };
            self.absorb(Entry {
                id: key,
                count: 1,
                children,
            });
        }
        self
    }

    /// Merges another set into this one.
    pub fn merge(mut self, other: BucketSet) -> Self {
        for entry in other.entries {
            self.absorb(entry);
        }
        self
    }

    fn absorb(&mut self, entry: Entry) {
        let key = entry.id.as_ref().map(value::canonical_key);
        match self.index.get(&key) {
            Some(&slot) => {
                let existing = &mut self.entries[slot];
                existing.count += entry.count;
                existing.children = std::mem::take(&mut existing.children).merge(entry.children);
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Flattens into the output bucket list.
    pub fn into_buckets(self) -> Vec<Bucket> {
        self.entries
            .into_iter()
            .map(|entry| Bucket {
                id: entry.id,
                value: entry.count,
                buckets: entry.children.into_buckets(),
            })
            .collect()
    }
}

impl FromIterator<Bucket> for BucketSet {
    fn from_iter<I: IntoIterator<Item = Bucket>>(iter: I) -> Self {
        let mut set = BucketSet::new();
        for bucket in iter {
            set.absorb(Entry {
                id: bucket.id,
                count: bucket.value,
                children: bucket.buckets.into_iter().collect(),
            });
        }
        set
    }
}

/// Groups records into buckets.
pub fn bucketize<R: Record>(
    records: &[R],
    options: &BucketOptions,
    ctx: &Context,
) -> Result<Vec<Bucket>> {
    options.validate()?;
    let set = records
        .iter()
        .fold(BucketSet::new(), |set, record| set.insert(record.document(), options, ctx));
    tracing::debug!(
        field = %options.field_id,
        input = records.len(),
        buckets = set.len(),
        counted = set.total(),
        "Bucketed records"
    );
    Ok(set.into_buckets())
}

/// Merges two bucket lists by key: counts add up and children merge
/// recursively. Keys only in `b` are appended after those of `a`.
pub fn merge_buckets(a: Vec<Bucket>, b: Vec<Bucket>) -> Vec<Bucket> {
    a.into_iter()
        .collect::<BucketSet>()
        .merge(b.into_iter().collect())
        .into_buckets()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn run(records: &[Value], options: &BucketOptions) -> Vec<Bucket> {
        let ctx = Context::at(Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap());
        bucketize(records, options, &ctx).unwrap()
    }

    fn counts(buckets: &[Bucket]) -> Vec<(Option<Value>, usize)> {
        buckets.iter().map(|b| (b.id.clone(), b.value)).collect()
    }

    #[test]
    fn raw_values() {
        let records = vec![
            json!({"id": 1, "kind": "a"}),
            json!({"id": 2, "kind": "b"}),
            json!({"id": 3, "kind": "a"}),
            json!({"id": 4}),
            json!({"id": 5, "kind": null}),
        ];
        let buckets = run(&records, &BucketOptions::new("kind"));
        assert_eq!(
            counts(&buckets),
            [(Some(json!("a")), 2), (Some(json!("b")), 1), (None, 2)]
        );
    }

    #[test]
    fn interval_keys() {
        let options = BucketOptions::new("n").interval(10.0);
        let records = vec![
            json!({"n": 0}),
            json!({"n": 9.5}),
            json!({"n": 10}),
            json!({"n": 25}),
            json!({"n": "25"}),
        ];
        assert_eq!(
            counts(&run(&records, &options)),
            [
                (Some(json!(0)), 2),
                (Some(json!(10)), 1),
                (Some(json!(20)), 1),
                (None, 1)
            ]
        );
    }

    #[test]
    fn integral_floats_share_a_bucket() {
        let records = vec![json!({"n": 2}), json!({"n": 2.0})];
        assert_eq!(
            counts(&run(&records, &BucketOptions::new("n"))),
            [(Some(json!(2)), 2)]
        );
    }

    #[test]
    fn invalid_interval() {
        for width in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let options = BucketOptions::new("n").interval(width);
            assert!(matches!(
                bucketize(&[json!({})], &options, &Context::new()),
                Err(SiftError::InvalidInterval(_))
            ));
        }
        let nested = BucketOptions::new("a").sub_buckets(BucketOptions::new("b").interval(0.0));
        assert!(nested.validate().is_err());
    }

    #[test]
    fn date_units() {
        let records = vec![
            json!({"at": "2024-06-03T10:15:00Z"}),
            json!({"at": "2024-06-03T23:59:59Z"}),
            json!({"at": "2024-06-04T00:00:00Z"}),
            json!({"at": "not a date"}),
        ];
        let by_day = run(&records, &BucketOptions::new("at").unit(DateUnit::Day));
        assert_eq!(
            counts(&by_day),
            [
                (Some(json!("2024-06-03T00:00:00.000Z")), 2),
                (Some(json!("2024-06-04T00:00:00.000Z")), 1),
                (None, 1)
            ]
        );

        let by_month = run(&records, &BucketOptions::new("at").unit(DateUnit::Month));
        assert_eq!(by_month[0].id, Some(json!("2024-06-01T00:00:00.000Z")));
        assert_eq!(by_month[0].value, 3);
    }

    #[test]
    fn allow_list_skips_records() {
        let records = vec![
            json!({"kind": "a"}),
            json!({"kind": "b"}),
            json!({"kind": "c"}),
            json!({}),
        ];
        let options = BucketOptions::new("kind").values(["a", "c"]);
        assert_eq!(
            counts(&run(&records, &options)),
            [(Some(json!("a")), 1), (Some(json!("c")), 1)]
        );

        let with_null = BucketOptions::new("kind").values([json!("b"), Value::Null]);
        assert_eq!(
            counts(&run(&records, &with_null)),
            [(Some(json!("b")), 1), (None, 1)]
        );
    }

    #[test]
    fn sub_buckets_merge_on_collision() {
        let records = vec![
            json!({"team": "x", "role": "dev"}),
            json!({"team": "x", "role": "ops"}),
            json!({"team": "y", "role": "dev"}),
            json!({"team": "x", "role": "dev"}),
        ];
        let options = BucketOptions::new("team").sub_buckets(BucketOptions::new("role"));
        let buckets = run(&records, &options);

        assert_eq!(counts(&buckets), [(Some(json!("x")), 3), (Some(json!("y")), 1)]);
        assert_eq!(
            counts(&buckets[0].buckets),
            [(Some(json!("dev")), 2), (Some(json!("ops")), 1)]
        );
        assert_eq!(counts(&buckets[1].buckets), [(Some(json!("dev")), 1)]);
    }

    #[test]
    fn sub_fields_key_by_element_property() {
        let records = vec![
            json!({"id": 1, "kind": "t", "fields": [
                {"id": "size", "value": 3},
                {"id": "color", "value": "red"}
            ]}),
            json!({"id": 2, "kind": "t", "fields": [
                {"id": "size", "value": 3}
            ]}),
            json!({"id": 3, "kind": "u", "fields": "none"}),
        ];
        let options = BucketOptions::new("fields")
            .sub_fields(["size"], "value")
            .sub_buckets(BucketOptions::new("kind"));
        let buckets = run(&records, &options);

        assert_eq!(counts(&buckets), [(Some(json!(3)), 2)]);
        // children are computed over the outer record
        assert_eq!(counts(&buckets[0].buckets), [(Some(json!("t")), 2)]);
    }

    #[test]
    fn merge_sums_and_recurses() {
        let options = BucketOptions::new("team").sub_buckets(BucketOptions::new("role"));
        let left = run(&[json!({"team": "x", "role": "dev"})], &options);
        let right = run(
            &[
                json!({"team": "x", "role": "ops"}),
                json!({"team": "z", "role": "dev"}),
            ],
            &options,
        );

        let merged = merge_buckets(left, right);
        assert_eq!(counts(&merged), [(Some(json!("x")), 2), (Some(json!("z")), 1)]);
        assert_eq!(
            counts(&merged[0].buckets),
            [(Some(json!("dev")), 1), (Some(json!("ops")), 1)]
        );
    }

    #[test]
    fn document_form() {
        let bucket = Bucket {
            id: None,
            value: 2,
            buckets: vec![Bucket {
                id: Some(json!("a")),
                value: 2,
                buckets: Vec::new(),
            }],
        };
        assert_eq!(
            bucket.to_document(),
            json!({"id": null, "value": 2, "buckets": [{"id": "a", "value": 2, "buckets": []}]})
        );
        assert_eq!(serde_json::to_value(&bucket).unwrap(), bucket.to_document());
    }

    #[test]
    fn options_json() {
        let options = BucketOptions::from_json(
            r#"{
                "fieldId": "fields",
                "subFieldIds": ["f1"],
                "subFieldProp": "value",
                "interval": 5,
                "subBuckets": {"fieldId": "created", "unit": "week"}
            }"#,
        )
        .unwrap();
        assert_eq!(
            options,
            BucketOptions::new("fields")
                .sub_fields(["f1"], "value")
                .interval(5.0)
                .sub_buckets(BucketOptions::new("created").unit(DateUnit::Week))
        );
    }
}
