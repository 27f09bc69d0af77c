//! Record of named values.
use crate::error::ApexError;
use chrono::prelude::{DateTime, Local};
use std::{
    collections::{btree_map::Iter, BTreeMap},
    fmt,
};

/// A value in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A scalar, e.g., loss or mean score.
    Scalar(f32),

    /// A timestamp.
    DateTime(DateTime<Local>),

    /// A 1-dimensional array, e.g., TD-errors of a batch.
    Array1(Vec<f32>),

    /// A text value.
    String(String),
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{:.5}", v),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Self::Array1(v) => write!(f, "[{} values]", v.len()),
            Self::String(v) => write!(f, "{}", v),
        }
    }
}

/// Named values, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(BTreeMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Creates a record with a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(BTreeMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from pairs of names and values.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a value, replacing the previous one of the same name.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns the value of the given name.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Returns an iterator over names and values.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges two records. Values of `record` win on name collisions.
    pub fn merge(mut self, record: Record) -> Self {
        self.merge_inplace(record);
        self
    }

    /// Merges `record` into this one. Values of `record` win on name collisions.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Returns a scalar value.
    pub fn get_scalar(&self, k: &str) -> Result<f32, ApexError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(ApexError::RecordValueTypeError("Scalar".to_string())),
            None => Err(ApexError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns a 1-dimensional array.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, ApexError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(ApexError::RecordValueTypeError("Array1".to_string())),
            None => Err(ApexError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns a string value.
    pub fn get_string(&self, k: &str) -> Result<String, ApexError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(ApexError::RecordValueTypeError("String".to_string())),
            None => Err(ApexError::RecordKeyError(k.to_string())),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, RecordValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, RecordValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
