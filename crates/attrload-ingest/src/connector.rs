//! Connector setup and the per-trigger cycle

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::batch::{BatchOrchestrator, BatchTarget, CycleOutcome};
use crate::coerce::TemporalSettings;
use crate::config::ConnectorConfig;
use crate::error::{IngestError, Result};
use crate::schema::{self, SharedSchema};
use crate::sink::{InsertOptions, Sink};
use crate::source::ItemSource;

/// A configured connector bound to one sink table.
///
/// The schema is resolved once in [`Connector::setup`] and shared read-only by
/// every cycle afterwards.
pub struct Connector<S: Sink> {
    sink: S,
    table: String,
    schema: SharedSchema,
    temporal: TemporalSettings,
    options: InsertOptions,
    batch_size: usize,
}

impl<S: Sink> Connector<S> {
    /// Resolve the schema and make sure the target table exists.
    ///
    /// An existing table dictates the schema and any configured schema text is
    /// ignored. A missing table is created from the configured schema text.
    #[instrument(skip(sink, config), fields(table = %config.table_name))]
    pub async fn setup(sink: S, config: &ConnectorConfig) -> Result<Self> {
        config.validate()?;
        let temporal = config.temporal_settings()?;
        let table = config.table_name.trim().to_string();

        let exists = match sink.has_table(&table).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(error = %e, "Table lookup failed, assuming the table does not exist");
                false
            },
        };

        let schema = if exists {
            let schema = sink.table_schema(&table).await?;
            if config.schema.is_some() {
                debug!("Table exists, configured schema text ignored");
            }
            info!(columns = schema.len(), "Using existing table");
            schema
        } else {
            let text = config.schema.as_deref().ok_or_else(|| IngestError::MissingSchema {
                table: table.clone(),
            })?;
            let schema = schema::parse(text)?;
            sink.create_table(&table, &schema, &config.create_table_options())
                .await?;
            info!(
                columns = schema.len(),
                collection = config.collection_name.as_deref().unwrap_or(""),
                replicated = config.replicate_table,
                "Created table"
            );
            schema
        };

        debug!(schema = %schema.to_schema_text(), "Schema resolved");

        Ok(Self {
            sink,
            table,
            schema: Arc::new(schema),
            temporal,
            options: config.insert_options(),
            batch_size: config.batch_size,
        })
    }

    pub fn schema(&self) -> &SharedSchema {
        &self.schema
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Pull up to one batch of items and run a full cycle over them
    pub async fn run_cycle<I: ItemSource + ?Sized>(&self, source: &mut I) -> CycleOutcome {
        let items = source.pull(self.batch_size);
        if items.is_empty() {
            debug!(table = %self.table, "No pending items");
            return CycleOutcome::default();
        }

        let target = BatchTarget {
            table: &self.table,
            schema: &self.schema,
            temporal: &self.temporal,
            options: self.options,
            batch_size: self.batch_size,
        };
        let result = BatchOrchestrator::new(&self.sink, target).run(items).await;

        let report = &result.report;
        info!(
            table = %self.table,
            items = report.items,
            succeeded = report.succeeded,
            failed = report.failed,
            auto_flushes = report.auto_flushes,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cycle complete"
        );

        result
    }
}
