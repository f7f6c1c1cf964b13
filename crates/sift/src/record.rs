//! The record abstraction.
//!
//! Queries resolve runtime field paths, so every record exposes a dynamic
//! [`Value`] view. Plain JSON documents implement [`Record`] directly;
//! strongly typed structs are wrapped in a [`Document`].

use std::ops::Deref;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Field holding the identifier of records and of nested list elements.
pub const ID_FIELD: &str = "id";

/// Trait for items that can be filtered, sorted and bucketed.
///
/// # Example
///
/// ```
/// use serde_json::{json, Value};
/// use sift::Record;
///
/// struct Row {
///     doc: Value,
/// }
///
/// impl Record for Row {
///     fn document(&self) -> &Value {
///         &self.doc
///     }
/// }
///
/// let row = Row { doc: json!({"id": "r1", "text": "foo"}) };
/// assert_eq!(row.record_id(), Some(&json!("r1")));
/// ```
pub trait Record {
    /// Returns the document that field paths are resolved against.
    fn document(&self) -> &Value;

    /// Returns the stable identifier of this record.
    ///
    /// Defaults to the [`ID_FIELD`] of the document.
    fn record_id(&self) -> Option<&Value> {
        self.document().get(ID_FIELD)
    }
}

impl Record for Value {
    fn document(&self) -> &Value {
        self
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn document(&self) -> &Value {
        (**self).document()
    }

    fn record_id(&self) -> Option<&Value> {
        (**self).record_id()
    }
}

/// A typed item paired with its serialized document.
///
/// ```
/// use serde::Serialize;
/// use sift::{Document, Record};
///
/// #[derive(Serialize)]
/// struct Task {
///     id: u32,
///     name: String,
/// }
///
/// let doc = Document::new(Task { id: 7, name: "write docs".into() })?;
/// assert_eq!(doc.name, "write docs");
/// assert_eq!(doc.record_id(), Some(&serde_json::json!(7)));
/// # Ok::<(), sift::SiftError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Document<T> {
    item: T,
    doc: Value,
}

impl<T: Serialize> Document<T> {
    /// Serializes `item` once and keeps both views.
    pub fn new(item: T) -> Result<Self> {
        let doc = serde_json::to_value(&item)?;
        Ok(Document { item, doc })
    }

    /// Wraps every item of an iterator.
    pub fn wrap_all<I>(items: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = T>,
    {
        items.into_iter().map(Document::new).collect()
    }
}

impl<T> Document<T> {
    /// Returns the typed item.
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Unwraps the typed item.
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> Deref for Document<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T> Record for Document<T> {
    fn document(&self) -> &Value {
        &self.doc
    }
}
