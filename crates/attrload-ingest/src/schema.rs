//! Compact schema grammar
//!
//! A schema is a comma-separated list of pipe-delimited field specs:
//!
//! ```text
//! schema     ::= field (',' field)*
//! field      ::= name ('|' type)? ('|' annotation)*
//! type       ::= 'double' | 'float' | 'integer' | 'int' | 'long' | 'string'
//! annotation ::= '$primary_key' ('(' digits ')')? | <opaque tag text>
//! ```
//!
//! For example `x|Float|data,y|Float|data,TEXT|String|store_only|text_search`.
//! Primary-key ordinals without an explicit index are assigned
//! `max-seen + 1`, starting at 0, in order of first occurrence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::error::SchemaError;

const PRIMARY_KEY_MARKER: &str = "$primary_key";

/// Annotation marking a column whose values are epoch timestamps
pub const TEMPORAL_TAG: &str = "timestamp";

/// Closed set of column value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Double,
    Float,
    Integer,
    Long,
    String,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Double => "double",
            ColumnType::Float => "float",
            ColumnType::Integer => "integer",
            ColumnType::Long => "long",
            ColumnType::String => "string",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnType::String)
    }

    /// Parse a type token, case-insensitively
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "double" => Some(ColumnType::Double),
            "float" => Some(ColumnType::Float),
            "integer" | "int" => Some(ColumnType::Integer),
            "long" => Some(ColumnType::Long),
            "string" => Some(ColumnType::String),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Opaque tags such as `data`, `text_search` or `timestamp`
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key_ordinal: Option<u32>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            annotations: Vec::new(),
            primary_key_ordinal: None,
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    pub fn has_annotation(&self, tag: &str) -> bool {
        self.annotations.iter().any(|a| a.eq_ignore_ascii_case(tag))
    }

    /// Whether values of this column are parsed as timestamps
    pub fn is_temporal(&self) -> bool {
        self.has_annotation(TEMPORAL_TAG)
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key_ordinal.is_some()
    }
}

/// Ordered, immutable list of columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    columns: Vec<ColumnDefinition>,
}

/// Schemas are established once at setup and shared read-only across cycles
pub type SharedSchema = Arc<SchemaDefinition>;

impl SchemaDefinition {
    pub fn new(columns: Vec<ColumnDefinition>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// First column with exactly this name
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Primary-key columns ordered by ordinal
    pub fn primary_key_columns(&self) -> Vec<&ColumnDefinition> {
        let mut keys: Vec<&ColumnDefinition> =
            self.columns.iter().filter(|c| c.is_primary_key()).collect();
        keys.sort_by_key(|c| c.primary_key_ordinal);
        keys
    }

    /// Render back into the compact grammar
    pub fn to_schema_text(&self) -> String {
        self.columns
            .iter()
            .map(|column| {
                let mut parts = vec![column.name.clone(), column.column_type.to_string()];
                parts.extend(column.annotations.iter().cloned());
                if let Some(ordinal) = column.primary_key_ordinal {
                    parts.push(format!("{}({})", PRIMARY_KEY_MARKER, ordinal));
                }
                parts.join("|")
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for SchemaDefinition {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse schema text into an ordered column list.
///
/// Fails on an empty schema, an empty column name, an unknown type token, or
/// an auto-assigned key ordinal past `u32::MAX`. Duplicate column names are
/// kept as written.
pub fn parse(schema_text: &str) -> Result<SchemaDefinition, SchemaError> {
    if schema_text.trim().is_empty() {
        return Err(SchemaError::Empty);
    }

    let mut columns = Vec::new();
    let mut max_ordinal: Option<u32> = None;

    for (position, field) in schema_text.split(',').enumerate() {
        let mut segments = field.split('|');

        let name = segments.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(SchemaError::EmptyColumnName { position });
        }

        let column_type = match segments.next() {
            Some(token) => ColumnType::from_token(token.trim()).ok_or_else(|| {
                SchemaError::InvalidDataType {
                    column: name.to_string(),
                    token: token.to_string(),
                }
            })?,
            None => ColumnType::String,
        };

        let mut column = ColumnDefinition::new(name, column_type);

        for segment in segments {
            let annotation = segment.trim();
            if annotation.is_empty() {
                continue;
            }

            if annotation.to_lowercase().starts_with(PRIMARY_KEY_MARKER) {
                let ordinal = match explicit_ordinal(annotation) {
                    Some(n) => {
                        max_ordinal = Some(max_ordinal.map_or(n, |m| m.max(n)));
                        n
                    },
                    None => {
                        let next = match max_ordinal {
                            None => 0,
                            Some(m) => m.checked_add(1).ok_or_else(|| SchemaError::OrdinalOverflow {
                                column: name.to_string(),
                            })?,
                        };
                        max_ordinal = Some(next);
                        next
                    },
                };
                column.primary_key_ordinal = Some(ordinal);
            } else {
                column.annotations.push(annotation.to_string());
            }
        }

        debug!(
            column = %column.name,
            column_type = %column.column_type,
            annotations = ?column.annotations,
            primary_key_ordinal = ?column.primary_key_ordinal,
            "Parsed schema field"
        );
        columns.push(column);
    }

    Ok(SchemaDefinition::new(columns))
}

/// The `n` of `$primary_key(n)`, if present and a non-negative integer
fn explicit_ordinal(annotation: &str) -> Option<u32> {
    let open = annotation.find('(')?;
    let close = open + annotation[open..].find(')')?;
    annotation[open + 1..close].trim().parse().ok()
}
