//! Defines the [`Record`] trait implemented by every CSV-backed collection
//! schema, along with the raw row representation ([`RawRecord`]) and the
//! field-level validation errors ([`FieldError`], [`ValidationErrors`]).
//!
//! Validation never short-circuits: every field of a row is checked and all of
//! the failures are reported together, in schema field order.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use url::Url;

/// A row of untyped data as produced by CSV parsing: column name to raw cell
/// value.
pub type RawRecord = BTreeMap<String, String>;

/// A validated, typed collection record.
pub trait Record: Sized {
    /// The collection's name. This is also the name of the content
    /// subdirectory holding the collection's source files.
    const COLLECTION: &'static str;

    /// The column names the schema reads, in validation order.
    const FIELDS: &'static [&'static str];

    /// Maps a raw row to a typed record, or reports every field that doesn't
    /// satisfy the schema.
    fn validate(raw: &RawRecord) -> Result<Self, ValidationErrors>;

    /// Converts the record back into its raw (CSV) form. Keywords are joined
    /// with `", "`, so validating the result yields an equal record.
    fn to_raw(&self) -> RawRecord;

    /// The record's display name.
    fn name(&self) -> &str;

    /// The record's keywords.
    fn keywords(&self) -> &[String];

    /// The record's description.
    fn description(&self) -> &str;

    /// A URL-safe identifier derived from the record's name.
    fn slug(&self) -> String {
        slug::slugify(self.name())
    }
}

/// Splits a raw keyword cell on `,` and trims whitespace from every element.
/// Order is preserved and nothing is filtered, so an empty cell yields a
/// single empty keyword.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',').map(|k| k.trim().to_owned()).collect()
}

/// Joins keywords into the raw form accepted by [`split_keywords`].
pub fn join_keywords(keywords: &[String]) -> String {
    keywords.join(", ")
}

/// Accumulates field errors while a [`Record`] implementation pulls typed
/// values out of a [`RawRecord`].
pub struct Fields<'a> {
    raw: &'a RawRecord,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    pub fn new(raw: &'a RawRecord) -> Fields<'a> {
        Fields {
            raw,
            errors: Vec::new(),
        }
    }

    fn present(&mut self, field: &str) -> Option<&'a str> {
        let raw: &'a RawRecord = self.raw;
        match raw.get(field) {
            Some(value) if !value.is_empty() => Some(value.as_str()),
            _ => {
                self.errors.push(FieldError::MissingField(field.to_owned()));
                None
            }
        }
    }

    /// A required, non-empty string field.
    pub fn string(&mut self, field: &str) -> Option<String> {
        self.present(field).map(str::to_owned)
    }

    /// A required field holding an absolute URL.
    pub fn url(&mut self, field: &str) -> Option<Url> {
        let value = self.present(field)?;
        match Url::parse(value) {
            Ok(url) => Some(url),
            Err(_) => {
                self.errors.push(FieldError::InvalidUrl {
                    field: field.to_owned(),
                    value: value.to_owned(),
                });
                None
            }
        }
    }

    /// A required keyword field. Unlike the other kinds, an empty cell is
    /// accepted (see [`split_keywords`]).
    pub fn keywords(&mut self, field: &str) -> Option<Vec<String>> {
        match self.raw.get(field) {
            Some(value) => Some(split_keywords(value)),
            None => {
                self.errors.push(FieldError::MissingField(field.to_owned()));
                None
            }
        }
    }

    /// Returns the record produced by `build` if no field failed. `build`
    /// returns `None` only when some field was missing, in which case that
    /// failure has already been recorded.
    pub fn finish<T>(
        self,
        build: impl FnOnce() -> Option<T>,
    ) -> Result<T, ValidationErrors> {
        match build() {
            Some(record) if self.errors.is_empty() => Ok(record),
            _ => Err(ValidationErrors(self.errors)),
        }
    }
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The field is absent from the row or its value is empty.
    MissingField(String),

    /// The field's value doesn't parse as an absolute URL.
    InvalidUrl { field: String, value: String },
}

impl FieldError {
    /// The name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            FieldError::MissingField(field) => field,
            FieldError::InvalidUrl { field, .. } => field,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldError::MissingField(field) => {
                write!(f, "missing field `{}`", field)
            }
            FieldError::InvalidUrl { field, value } => {
                write!(f, "invalid URL {:?} in field `{}`", value, field)
            }
        }
    }
}

impl std::error::Error for FieldError {}

/// Every field error found in one row. Never empty when returned from
/// [`Record::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    /// Displays the errors as a `; `-separated list.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            err.fmt(f)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
