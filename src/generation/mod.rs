pub mod aggregate;
pub mod batch;
pub mod client;
pub mod dispatch;
pub mod fallback;
pub mod generator;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod reconcile;
pub mod retry;
pub mod skip;

pub use aggregate::ResultAggregator;
pub use batch::BatchGrouper;
pub use client::{GenerationClient, GenerationOptions};
pub use dispatch::{BatchFailure, BatchOutcome, BatchOutput, ConcurrencyBoundedDispatcher};
pub use fallback::FallbackExecutor;
pub use generator::Generator;
pub use parse::{ParseOutcome, ParserConfig, ResponseParser};
pub use pipeline::{ArtifactCheck, GenerationPipeline, PipelineConfig};
pub use prompt::{DefaultPromptBuilder, PromptBuilder};
pub use reconcile::{BatchReconciliation, Reconciler, Reconciliation};
pub use retry::{RetryExecutor, RetryOutcome, RetryPolicy};
pub use skip::{ArtifactSkipGuard, SkipGuardConfig};
