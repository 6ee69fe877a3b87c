//! Per-alert pipeline orchestration.

pub mod pipeline;

pub use pipeline::{AlertReport, MappingOutcome, Pipeline, PipelineError};
