//! Report pipeline.
//!
//! - Predicate: row filter expressions
//! - Stages: the individual load, clean, filter, narrow, rank and aggregate steps
//! - Pipeline: the parameterized run that chains them for one profile

pub mod pipeline;
pub mod predicate;
pub mod stages;

pub use pipeline::{prepare, run, run_prepared, PreparedRows, RunConfig, Selections};
pub use predicate::{Clause, CompareOp, Literal, Predicate};
pub use stages::*;
