//! # donor-tally
//!
//! Streaming statistics over pipe-delimited contribution records.
//!
//! Three aggregates are computed over a source: how many records fall in
//! each month, how many distinct people appear, and the most common first
//! name with its count. Two strategies produce identical results:
//!
//! - [`run_sequential`] - single pass on the calling task
//! - [`run_concurrent`] / [`Pipeline`] - a reader, a pool of workers that
//!   aggregate locally, and a merger that combines their partials
//!
//! ## Modules
//!
//! - `extract` - pure field extraction from a raw record
//! - `aggregate` - partial and final aggregates and their merge rules
//! - `pipeline` - the concurrent reader / worker / merger stages
//! - `sequential` - the sequential baseline
//! - `source` - opening files and reading records
//! - `config` - pipeline configuration (defaults, TOML, environment)
//! - `error` - error types
//!
//! ```no_run
//! # async fn example() -> donor_tally::Result<()> {
//! let source = donor_tally::open_source("itcont.txt").await?;
//! let result = donor_tally::run_concurrent(source, 10, 10_000).await?;
//! println!("{} records", result.total_records);
//! # Ok(())
//! # }
//! ```
pub mod aggregate;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod sequential;
pub mod source;

pub use aggregate::{FinalAggregate, PartialAggregate, RunStatus};
pub use config::{ConfigLoader, FirstNamePolicy, PipelineConfig};
pub use error::{RecordError, Result, TallyError};
pub use pipeline::{run_concurrent, CancellationController, Pipeline};
pub use sequential::{run_sequential, run_sequential_with};
pub use source::open_source;
