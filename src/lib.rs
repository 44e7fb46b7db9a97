//! artifact-forge: batched, concurrency-bounded artifact generation
//!
//! Turns work items into persisted artifacts (schemas, test plans) by calling an unreliable
//! text-generation service. Items are grouped into per-category batches, dispatched in
//! bounded waves with retry, reconciled back to their items from free-form output, and
//! regenerated one by one when a batch does not produce them.

pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod source;
pub mod store;
pub mod types;

pub use error::{ErrorClass, GenerationError, PipelineError, StoreError};
pub use generation::{GenerationClient, GenerationOptions, GenerationPipeline, PipelineConfig};
pub use types::{ArtifactKind, ItemOutcome, ItemState, PipelineResult, WorkItem};
