//! Batch orchestration for one processing cycle
//!
//! A [`BatchOrchestrator`] owns the buffer for exactly one cycle and moves
//! through `Accepting -> Flushing -> Accepting ... -> Draining -> Idle`.
//! Records are buffered until the batch size is reached, then written in one
//! sink call. Items are classified as succeeded only once the flush carrying
//! their record has returned OK; a failed flush routes every item of that
//! batch to the failure channel. Every item ends in exactly one channel.

use attrload_common::InputItem;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::coerce::TemporalSettings;
use crate::record::{RecordBuilder, TypedRecord};
use crate::schema::SchemaDefinition;
use crate::sink::{InsertOptions, InsertResponse, Sink};

/// Phase of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Taking inserts into the buffer
    Accepting,
    /// Writing a full buffer mid-cycle
    Flushing,
    /// Writing the remainder at the end of the cycle
    Draining,
    /// Cycle finished; the buffer is gone
    Idle,
}

/// Why an item ended in the failure channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum FailureCause {
    /// The record could not be built
    Build { column: String, reason: String },
    /// The record was refused before buffering
    Insert { reason: String },
    /// The batch write carrying the record failed
    Flush { reason: String },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Build { column, reason } => {
                write!(f, "record build failed at column '{}': {}", column, reason)
            },
            FailureCause::Insert { reason } => write!(f, "insert rejected: {}", reason),
            FailureCause::Flush { reason } => write!(f, "batch write failed: {}", reason),
        }
    }
}

/// An item routed to the failure channel, with a readable cause
#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub item: InputItem,
    pub cause: FailureCause,
    pub message: String,
}

impl FailedItem {
    pub fn new(item: InputItem, cause: FailureCause) -> Self {
        let message = cause.to_string();
        Self {
            item,
            cause,
            message,
        }
    }
}

/// Success and failure channels of one cycle
#[derive(Debug, Clone, Default)]
pub struct OutcomeSet {
    pub succeeded: Vec<InputItem>,
    pub failed: Vec<FailedItem>,
}

impl OutcomeSet {
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counters for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub items: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Flushes triggered by a full buffer
    pub auto_flushes: usize,
    /// Records written by the final flush, 0 when nothing was left
    pub final_flush_records: usize,
    pub elapsed: Duration,
}

/// Result of a finished cycle
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    pub outcome: OutcomeSet,
    pub report: CycleReport,
}

/// A record refused by [`BatchOrchestrator::insert`]; the item is handed back
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct InsertRejected {
    pub item: InputItem,
    pub reason: String,
}

/// Where and how a cycle writes
#[derive(Debug, Clone, Copy)]
pub struct BatchTarget<'a> {
    pub table: &'a str,
    pub schema: &'a SchemaDefinition,
    pub temporal: &'a TemporalSettings,
    pub options: InsertOptions,
    pub batch_size: usize,
}

/// Buffers records and writes them in batches for a single cycle
pub struct BatchOrchestrator<'a, S: Sink + ?Sized> {
    sink: &'a S,
    target: BatchTarget<'a>,
    capacity: usize,
    buffer: Vec<(InputItem, TypedRecord)>,
    state: BatchState,
    outcome: OutcomeSet,
    auto_flushes: usize,
    final_flush_records: usize,
}

impl<'a, S: Sink + ?Sized> BatchOrchestrator<'a, S> {
    pub fn new(sink: &'a S, target: BatchTarget<'a>) -> Self {
        let capacity = target.batch_size.max(1);
        Self {
            sink,
            target,
            capacity,
            buffer: Vec::with_capacity(capacity),
            state: BatchState::Accepting,
            outcome: OutcomeSet::default(),
            auto_flushes: 0,
            final_flush_records: 0,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Number of records waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Build, insert and route every item, then drain the buffer
    pub async fn run(mut self, items: Vec<InputItem>) -> CycleOutcome {
        let start = Instant::now();
        let total = items.len();
        let builder = RecordBuilder::new(self.target.schema, self.target.temporal);

        for item in items {
            match builder.build(item) {
                Ok((item, record)) => {
                    if let Err(rejected) = self.insert(item, record).await {
                        warn!(item_id = %rejected.item.id, reason = %rejected.reason, "Insert rejected");
                        self.outcome.failed.push(FailedItem::new(
                            rejected.item,
                            FailureCause::Insert {
                                reason: rejected.reason,
                            },
                        ));
                    }
                },
                Err(failure) => {
                    self.outcome.failed.push(FailedItem::new(
                        failure.item,
                        FailureCause::Build {
                            column: failure.column,
                            reason: failure.reason,
                        },
                    ));
                },
            }
        }

        let mut finished = self.drain().await;
        finished.report.items = total;
        finished.report.elapsed = start.elapsed();
        finished
    }

    /// Buffer one record, flushing first if the buffer fills up.
    ///
    /// Records missing a primary-key value are refused and never buffered.
    pub async fn insert(&mut self, item: InputItem, record: TypedRecord) -> Result<(), InsertRejected> {
        if let Some(key) = self
            .target
            .schema
            .primary_key_columns()
            .into_iter()
            .find(|c| !record.contains(&c.name))
        {
            return Err(InsertRejected {
                item,
                reason: format!("missing value for primary key column '{}'", key.name),
            });
        }

        self.buffer.push((item, record));

        if self.buffer.len() >= self.capacity {
            self.transition(BatchState::Flushing);
            self.flush().await;
            self.auto_flushes += 1;
            self.transition(BatchState::Accepting);
        }

        Ok(())
    }

    /// Write everything buffered as one batch and route the items.
    ///
    /// Failures are logged and routed, never returned; `None` means nothing
    /// was written.
    pub async fn flush(&mut self) -> Option<InsertResponse> {
        if self.buffer.is_empty() {
            return None;
        }

        let (items, records): (Vec<InputItem>, Vec<TypedRecord>) = self.buffer.drain(..).unzip();
        debug!(table = %self.target.table, records = records.len(), "Flushing batch");

        match self
            .sink
            .insert_records(self.target.table, &records, &self.target.options)
            .await
        {
            Ok(response) => {
                debug!(
                    table = %self.target.table,
                    inserted = response.count_inserted,
                    updated = response.count_updated,
                    "Batch written"
                );
                self.outcome.succeeded.extend(items);
                Some(response)
            },
            Err(e) => {
                error!(
                    table = %self.target.table,
                    records = records.len(),
                    error = %e,
                    "Flush failed"
                );
                let reason = e.to_string();
                self.outcome.failed.extend(items.into_iter().map(|item| {
                    FailedItem::new(
                        item,
                        FailureCause::Flush {
                            reason: reason.clone(),
                        },
                    )
                }));
                None
            },
        }
    }

    /// Final flush of the remainder; ends the cycle
    pub async fn drain(mut self) -> CycleOutcome {
        self.transition(BatchState::Draining);
        let remaining = self.buffer.len();
        if self.flush().await.is_some() {
            self.final_flush_records = remaining;
        }
        self.transition(BatchState::Idle);

        let report = CycleReport {
            items: self.outcome.len(),
            succeeded: self.outcome.succeeded.len(),
            failed: self.outcome.failed.len(),
            auto_flushes: self.auto_flushes,
            final_flush_records: self.final_flush_records,
            elapsed: Duration::ZERO,
        };

        CycleOutcome {
            outcome: self.outcome,
            report,
        }
    }

    fn transition(&mut self, next: BatchState) {
        trace!(from = ?self.state, to = ?next, "Batch state change");
        self.state = next;
    }
}
