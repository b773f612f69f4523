//! attrload ingest library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Converts loosely-typed attribute sets into typed rows and writes them to a
//! column store in batches.
//!
//! # Pipeline
//!
//! - **Schema**: compact `name|type|annotation` grammar, parsed once at setup
//! - **Coercion**: total string-to-typed-value conversion with zero/absent fallbacks
//! - **Records**: one typed record per input item, in schema order
//! - **Batches**: buffered writes with auto-flush; items routed to success or
//!   failure only after their batch write is confirmed
//!
//! # Example
//!
//! ```no_run
//! use attrload_ingest::config::ConnectorConfig;
//! use attrload_ingest::connector::Connector;
//! use attrload_ingest::sink::MemorySink;
//! use attrload_ingest::source::{InputFormat, QueueSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = ConnectorConfig::new("http://localhost:9191", "events");
//!     config.schema = Some("id|Long|$primary_key,name".to_string());
//!
//!     let connector = Connector::setup(MemorySink::new(), &config).await?;
//!     let mut source = QueueSource::load("./events.jsonl", InputFormat::Jsonl)?;
//!     let result = connector.run_cycle(&mut source).await;
//!     println!("{} succeeded", result.report.succeeded);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod coerce;
pub mod config;
pub mod connector;
pub mod error;
pub mod record;
pub mod schema;
pub mod sink;
pub mod source;

pub use error::{IngestError, Result};
