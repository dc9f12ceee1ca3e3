//! Field projections
//!
//! A [`Fields`] value tells the server which fields of each document to
//! return. It can be built from arbitrary names, or checked against the
//! declared field names of a document type through [`DocumentShape`].

use bson::Document as BsonDocument;
use docbridge_common::{BridgeError, Result};
use std::collections::BTreeMap;

/// Inclusion marker stored for every projected field
pub const INCLUDE: i32 = 1;

/// Declared field names of a document type
///
/// ```ignore
/// struct User { name: String, email: Option<String> }
///
/// impl DocumentShape for User {
///     const FIELDS: &'static [&'static str] = &["name", "email"];
/// }
/// ```
pub trait DocumentShape {
    /// Every field name a document of this type may carry
    const FIELDS: &'static [&'static str];
}

/// Projection mapping field names to the inclusion marker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    fields: BTreeMap<String, i32>,
}

impl Fields {
    /// Create an empty projection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field to the projection
    pub fn include(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), INCLUDE);
        self
    }

    /// Projection of every field declared by `S`
    pub fn all_of<S: DocumentShape>() -> Self {
        S::FIELDS.iter().copied().collect()
    }

    /// Projection of a subset of the fields declared by `S`
    ///
    /// # Errors
    /// Returns a validation error naming the first field `S` does not declare.
    pub fn typed<S: DocumentShape>(names: &[&str]) -> Result<Self> {
        let declared = |name: &&str| S::FIELDS.iter().any(|field| field == name);
        if let Some(unknown) = names.iter().copied().find(|name| !declared(name)) {
            return Err(BridgeError::Validation(format!(
                "Field '{}' is not declared by the document shape",
                unknown
            )));
        }
        Ok(names.iter().copied().collect())
    }

    /// Returns true if `name` is projected
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of projected fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when no field is projected, so whole documents come back
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate the projected field names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// BSON form handed to the driver
    pub fn to_document(&self) -> BsonDocument {
        self.fields
            .iter()
            .map(|(name, marker)| (name.clone(), bson::Bson::Int32(*marker)))
            .collect()
    }
}

impl<'a> FromIterator<&'a str> for Fields {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |fields, name| fields.include(name))
    }
}

impl FromIterator<String> for Fields {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), |fields, name| fields.include(name))
    }
}

impl From<&Fields> for BsonDocument {
    fn from(fields: &Fields) -> Self {
        fields.to_document()
    }
}
