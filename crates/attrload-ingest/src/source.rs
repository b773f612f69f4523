//! Upstream of a cycle: where input items come from and where routed items go

use attrload_common::io::{append_jsonl, read_csv, read_jsonl};
use attrload_common::InputItem;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use tracing::info;

use crate::batch::OutcomeSet;
use crate::error::Result;

/// Supplier of input items for trigger cycles
pub trait ItemSource {
    /// Take up to `max` items; an empty vector means nothing is pending
    fn pull(&mut self, max: usize) -> Vec<InputItem>;
}

/// In-memory FIFO queue of pending items
#[derive(Debug, Clone, Default)]
pub struct QueueSource {
    queue: VecDeque<InputItem>,
}

impl QueueSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every item of an input file
    pub fn load(path: impl AsRef<Path>, format: InputFormat) -> Result<Self> {
        let path = path.as_ref();
        let items = match format {
            InputFormat::Jsonl => read_jsonl(path)?,
            InputFormat::Csv => read_csv(path)?,
        };
        info!(path = %path.display(), ?format, items = items.len(), "Loaded input items");
        Ok(items.into_iter().collect())
    }

    pub fn push(&mut self, item: InputItem) {
        self.queue.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl FromIterator<InputItem> for QueueSource {
    fn from_iter<T: IntoIterator<Item = InputItem>>(iter: T) -> Self {
        Self {
            queue: iter.into_iter().collect(),
        }
    }
}

impl ItemSource for QueueSource {
    fn pull(&mut self, max: usize) -> Vec<InputItem> {
        let n = max.min(self.queue.len());
        self.queue.drain(..n).collect()
    }
}

/// Input file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// One JSON object per line
    #[default]
    Jsonl,
    /// Header row names the attributes
    Csv,
}

/// Append the routed items of a cycle to the success and failure files
pub fn write_outcome(success_path: impl AsRef<Path>, failure_path: impl AsRef<Path>, outcome: &OutcomeSet) -> Result<()> {
    if !outcome.succeeded.is_empty() {
        append_jsonl(success_path, &outcome.succeeded)?;
    }
    if !outcome.failed.is_empty() {
        append_jsonl(failure_path, &outcome.failed)?;
    }
    Ok(())
}
