//! attrload common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, file loaders, error handling and logging for the attrload
//! workspace.
//!
//! - **Types**: [`AttributeSet`] and [`InputItem`], the untyped input of the pipeline
//! - **IO**: JSON-lines and CSV item loaders, JSON-lines outcome writer
//! - **Logging**: tracing subscriber setup shared by all binaries
//!
//! # Example
//!
//! ```no_run
//! use attrload_common::io::read_jsonl;
//!
//! fn load() -> attrload_common::Result<()> {
//!     let items = read_jsonl("./input.jsonl")?;
//!     for item in &items {
//!         let _ = item.attributes.get("x");
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod io;
pub mod logging;
pub mod types;

pub use error::{CommonError, Result};
pub use types::{AttributeSet, InputItem};
