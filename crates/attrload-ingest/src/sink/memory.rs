//! In-process sink for dry runs and tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;

use super::{CreateTableOptions, InsertOptions, InsertResponse, Sink};
use crate::error::SinkError;
use crate::record::TypedRecord;
use crate::schema::SchemaDefinition;

struct MemoryTable {
    schema: SchemaDefinition,
    options: CreateTableOptions,
    rows: Vec<TypedRecord>,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, MemoryTable>,
    batch_sizes: Vec<usize>,
    failing_inserts: usize,
    lookups_fail: bool,
}

/// Sink that keeps tables in memory.
///
/// Honours primary keys the way a keyed column store does: with
/// `update_on_existing_pk` a row with an existing key replaces the stored row,
/// without it the new row is ignored. Failures can be injected to exercise the
/// failure paths of the batch layer.
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<State>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing table
    pub fn with_table(mut self, table: impl Into<String>, schema: SchemaDefinition) -> Self {
        self.state.get_mut().tables.insert(
            table.into(),
            MemoryTable {
                schema,
                options: CreateTableOptions::default(),
                rows: Vec::new(),
            },
        );
        self
    }

    /// Make the next `count` batch inserts fail
    pub async fn fail_next_inserts(&self, count: usize) {
        self.state.lock().await.failing_inserts = count;
    }

    /// Make `has_table` and `table_schema` fail
    pub async fn fail_lookups(&self, fail: bool) {
        self.state.lock().await.lookups_fail = fail;
    }

    /// Stored rows of `table`, in insertion order
    pub async fn rows(&self, table: &str) -> Vec<TypedRecord> {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Size of every batch insert attempted so far
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().await.batch_sizes.clone()
    }

    pub async fn table_options(&self, table: &str) -> Option<CreateTableOptions> {
        self.state
            .lock()
            .await
            .tables
            .get(table)
            .map(|t| t.options.clone())
    }
}

fn primary_key(schema: &SchemaDefinition, record: &TypedRecord) -> Option<String> {
    let keys = schema.primary_key_columns();
    if keys.is_empty() {
        return None;
    }
    let values: Vec<_> = keys.iter().map(|c| record.get(&c.name)).collect();
    Some(format!("{:?}", values))
}

#[async_trait]
impl Sink for MemorySink {
    async fn has_table(&self, table: &str) -> Result<bool, SinkError> {
        let state = self.state.lock().await;
        if state.lookups_fail {
            return Err(SinkError::Unavailable("lookup failure injected".to_string()));
        }
        Ok(state.tables.contains_key(table))
    }

    async fn table_schema(&self, table: &str) -> Result<SchemaDefinition, SinkError> {
        let state = self.state.lock().await;
        if state.lookups_fail {
            return Err(SinkError::Unavailable("lookup failure injected".to_string()));
        }
        state
            .tables
            .get(table)
            .map(|t| t.schema.clone())
            .ok_or_else(|| SinkError::TableNotFound(table.to_string()))
    }

    async fn create_table(
        &self,
        table: &str,
        schema: &SchemaDefinition,
        options: &CreateTableOptions,
    ) -> Result<(), SinkError> {
        let mut state = self.state.lock().await;
        if state.tables.contains_key(table) {
            return Err(SinkError::TableExists(table.to_string()));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = schema.columns().iter().find(|c| !seen.insert(c.name.as_str())) {
            return Err(SinkError::Rejected {
                status: 400,
                message: format!("duplicate column name '{}'", dup.name),
            });
        }

        state.tables.insert(
            table.to_string(),
            MemoryTable {
                schema: schema.clone(),
                options: options.clone(),
                rows: Vec::new(),
            },
        );
        debug!(table, columns = schema.len(), "Created in-memory table");
        Ok(())
    }

    async fn insert_records(
        &self,
        table: &str,
        records: &[TypedRecord],
        options: &InsertOptions,
    ) -> Result<InsertResponse, SinkError> {
        let mut state = self.state.lock().await;
        state.batch_sizes.push(records.len());

        if state.failing_inserts > 0 {
            state.failing_inserts -= 1;
            return Err(SinkError::Unavailable("insert failure injected".to_string()));
        }

        let target = state
            .tables
            .get_mut(table)
            .ok_or_else(|| SinkError::TableNotFound(table.to_string()))?;

        for record in records {
            if let Some((column, _)) = record.iter().find(|(name, _)| target.schema.column(name).is_none()) {
                return Err(SinkError::Rejected {
                    status: 400,
                    message: format!("unknown column '{}'", column),
                });
            }
        }

        let mut response = InsertResponse::default();
        for record in records {
            let existing = primary_key(&target.schema, record).and_then(|key| {
                target
                    .rows
                    .iter()
                    .position(|row| primary_key(&target.schema, row).as_deref() == Some(key.as_str()))
            });

            match existing {
                Some(index) if options.update_on_existing_pk => {
                    target.rows[index] = record.clone();
                    response.count_updated += 1;
                },
                Some(_) => {},
                None => {
                    target.rows.push(record.clone());
                    response.count_inserted += 1;
                },
            }
        }

        Ok(response)
    }
}
