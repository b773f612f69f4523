//! Sink collaborator contract
//!
//! The batch layer only ever calls [`Sink::insert_records`]; the other methods
//! are used once, at connector setup, to find or create the target table.

mod http;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::SinkError;
use crate::record::TypedRecord;
use crate::schema::SchemaDefinition;

pub use http::HttpSink;
pub use memory::MemorySink;

/// Options for creating a missing table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTableOptions {
    /// Parent collection; empty string for none
    pub collection_name: String,
    pub is_replicated: bool,
}

/// Options applied to every batch insert of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOptions {
    /// Replace rows whose primary key already exists instead of ignoring the
    /// new row. Ignored for tables without a primary key.
    pub update_on_existing_pk: bool,
}

/// Outcome of a successful batch insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertResponse {
    pub count_inserted: u64,
    pub count_updated: u64,
}

/// Target store for typed records
#[async_trait]
pub trait Sink: Send + Sync {
    async fn has_table(&self, table: &str) -> Result<bool, SinkError>;

    /// Schema of an existing table
    async fn table_schema(&self, table: &str) -> Result<SchemaDefinition, SinkError>;

    async fn create_table(
        &self,
        table: &str,
        schema: &SchemaDefinition,
        options: &CreateTableOptions,
    ) -> Result<(), SinkError>;

    /// Write one batch. An error means no record of the batch is durable.
    async fn insert_records(
        &self,
        table: &str,
        records: &[TypedRecord],
        options: &InsertOptions,
    ) -> Result<InsertResponse, SinkError>;
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for Arc<S> {
    async fn has_table(&self, table: &str) -> Result<bool, SinkError> {
        (**self).has_table(table).await
    }

    async fn table_schema(&self, table: &str) -> Result<SchemaDefinition, SinkError> {
        (**self).table_schema(table).await
    }

    async fn create_table(
        &self,
        table: &str,
        schema: &SchemaDefinition,
        options: &CreateTableOptions,
    ) -> Result<(), SinkError> {
        (**self).create_table(table, schema, options).await
    }

    async fn insert_records(
        &self,
        table: &str,
        records: &[TypedRecord],
        options: &InsertOptions,
    ) -> Result<InsertResponse, SinkError> {
        (**self).insert_records(table, records, options).await
    }
}
