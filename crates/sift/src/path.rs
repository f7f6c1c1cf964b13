//! Field path resolution.
//!
//! A [`FieldPath`] is a dot-separated list of segments. It can be resolved
//! two ways:
//!
//! - [`FieldPath::extract`] flattens lists at every step and returns every
//!   reachable value. Conditions use this.
//! - [`FieldPath::lookup`] follows object keys (and numeric list indices)
//!   without flattening and returns at most one value. Sorting and
//!   bucketing use this.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A parsed, dot-separated field path such as `"comments.author.name"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted path. Empty segments are dropped, so `""` is the
    /// root path.
    pub fn new(path: impl Into<String>) -> Self {
        let raw = path.into();
        let segments = raw
            .split('.')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        FieldPath { raw, segments }
    }

    /// Returns the path as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the individual segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolves the path, flattening lists encountered at any step.
    ///
    /// A list is expanded before the next segment is applied, so `tags`
    /// on `{"tags": ["a", "b"]}` yields `"a"` and `"b"`, and `items.name`
    /// yields the `name` of every element of `items`. Null and missing
    /// values contribute nothing.
    pub fn extract<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut out = Vec::new();
        collect(&self.segments, root, &mut out);
        out
    }

    /// Plain nested lookup without flattening.
    ///
    /// Numeric segments index into lists. Returns `None` when any step is
    /// missing.
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }
}

fn collect<'a>(segments: &[String], current: &'a Value, out: &mut Vec<&'a Value>) {
    match current {
        Value::Array(items) => {
            for item in items {
                collect(segments, item, out);
            }
        }
        Value::Null => {}
        _ => match segments.split_first() {
            None => out.push(current),
            Some((head, rest)) => {
                if let Some(next) = current.get(head.as_str()) {
                    collect(rest, next, out);
                }
            }
        },
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        FieldPath::new(path)
    }
}

impl From<String> for FieldPath {
    fn from(path: String) -> Self {
        FieldPath::new(path)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(FieldPath::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn segments_split_on_dots() {
        let path = FieldPath::new("a.b.c");
        assert_eq!(path.segments(), ["a", "b", "c"]);
        assert_eq!(path.as_str(), "a.b.c");
        assert!(FieldPath::new("").segments().is_empty());
    }

    #[test]
    fn extract_scalar() {
        let doc = json!({"text": "foo", "num": 1});
        assert_eq!(FieldPath::new("text").extract(&doc), vec![&json!("foo")]);
    }

    #[test]
    fn extract_missing_and_null_are_empty() {
        let doc = json!({"a": null, "b": {"c": null}});
        assert!(FieldPath::new("a").extract(&doc).is_empty());
        assert!(FieldPath::new("b.c").extract(&doc).is_empty());
        assert!(FieldPath::new("zzz").extract(&doc).is_empty());
        assert!(FieldPath::new("a.deeper").extract(&doc).is_empty());
    }

    #[test]
    fn extract_flattens_list_of_objects() {
        let doc = json!({"a": [{"b": "x"}, {"b": "y"}, {"c": "z"}]});
        assert_eq!(
            FieldPath::new("a.b").extract(&doc),
            vec![&json!("x"), &json!("y")]
        );
    }

    #[test]
    fn extract_flattens_terminal_list() {
        let doc = json!({"tags": ["red", "blue"]});
        assert_eq!(
            FieldPath::new("tags").extract(&doc),
            vec![&json!("red"), &json!("blue")]
        );
    }

    #[test]
    fn extract_through_object_into_list() {
        let doc = json!({"prop": {"list": [{"v": 1}, {"v": 2}]}});
        assert_eq!(
            FieldPath::new("prop.list.v").extract(&doc),
            vec![&json!(1), &json!(2)]
        );
        assert_eq!(FieldPath::new("prop.list").extract(&doc).len(), 2);
    }

    #[test]
    fn extract_nested_lists() {
        let doc = json!({"a": [{"b": [1, 2]}, {"b": [3]}, [{"b": 4}]]});
        assert_eq!(
            FieldPath::new("a.b").extract(&doc),
            vec![&json!(1), &json!(2), &json!(3), &json!(4)]
        );
    }

    #[test]
    fn lookup_does_not_flatten() {
        let doc = json!({"a": [{"b": 1}], "o": {"p": "q"}});
        assert_eq!(FieldPath::new("a").lookup(&doc), Some(&json!([{"b": 1}])));
        assert_eq!(FieldPath::new("a.b").lookup(&doc), None);
        assert_eq!(FieldPath::new("a.0.b").lookup(&doc), Some(&json!(1)));
        assert_eq!(FieldPath::new("o.p").lookup(&doc), Some(&json!("q")));
        assert_eq!(FieldPath::new("o.p.x").lookup(&doc), None);
    }

    #[test]
    fn serde_as_string() {
        let path: FieldPath = serde_json::from_value(json!("a.b")).unwrap();
        assert_eq!(path, FieldPath::new("a.b"));
        assert_eq!(serde_json::to_value(&path).unwrap(), json!("a.b"));
    }
}
