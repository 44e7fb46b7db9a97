//! Integration tests for the artifact generation pipeline

mod cli_check;
mod logging_output;
mod pipeline_scenario;
mod refinement;
mod skip_idempotence;
mod support;
