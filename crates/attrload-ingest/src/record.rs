//! Building typed records from input items

use attrload_common::InputItem;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;
use tracing::{debug, error};

use crate::coerce::{coerce, TemporalSettings, TypedValue};
use crate::schema::SchemaDefinition;

/// Column values of one row, in schema order. Absent columns are simply not
/// present; there is no typed null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedRecord {
    fields: Vec<(String, TypedValue)>,
}

impl TypedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&TypedValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Builder-style field insert, mostly for tests and fixtures
    pub fn with(mut self, column: impl Into<String>, value: TypedValue) -> Self {
        self.fields.push((column.into(), value));
        self
    }

    fn push(&mut self, column: &str, value: TypedValue) {
        self.fields.push((column.to_string(), value));
    }
}

impl Serialize for TypedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// An item whose record could not be built. The whole record is abandoned.
#[derive(Error, Debug, Clone)]
#[error("failed to build record at column '{column}': {reason}")]
pub struct RecordBuildFailure {
    pub item: InputItem,
    pub column: String,
    pub reason: String,
}

/// Builds records for one schema with fixed temporal settings
#[derive(Debug, Clone)]
pub struct RecordBuilder<'a> {
    schema: &'a SchemaDefinition,
    temporal: &'a TemporalSettings,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(schema: &'a SchemaDefinition, temporal: &'a TemporalSettings) -> Self {
        Self { schema, temporal }
    }

    /// Build the typed record for `item`.
    ///
    /// Coercion itself never fails, but each column still passes a fault
    /// check: a column name that already appears in the record aborts the
    /// whole record.
    pub fn build(&self, item: InputItem) -> Result<(InputItem, TypedRecord), RecordBuildFailure> {
        let mut record = TypedRecord::new();

        for column in self.schema.columns() {
            let raw = item.attributes.get(&column.name);

            let Some(value) = coerce(raw, column, self.temporal) else {
                continue;
            };

            if record.contains(&column.name) {
                let reason = "column appears more than once in the schema".to_string();
                error!(
                    item_id = %item.id,
                    column = %column.name,
                    value = ?raw,
                    reason = %reason,
                    "Failed to build record"
                );
                return Err(RecordBuildFailure {
                    item,
                    column: column.name.clone(),
                    reason,
                });
            }

            debug!(column = %column.name, value = %value, "Coerced column value");
            record.push(&column.name, value);
        }

        Ok((item, record))
    }
}
