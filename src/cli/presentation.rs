//! CLI presentation: tables and JSON for pipeline results and check reports.

use crate::error::PipelineError;
use crate::generation::pipeline::ArtifactCheck;
use crate::types::{MatchStrategy, PipelineResult};
use comfy_table::Table;

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, PipelineError> {
    serde_json::to_string_pretty(value).map_err(|e| PipelineError::OutputError(e.to_string()))
}

fn strategy_label(strategy: Option<MatchStrategy>) -> &'static str {
    match strategy {
        Some(MatchStrategy::ExactId) => "exact id",
        Some(MatchStrategy::IdContains) => "id contains",
        Some(MatchStrategy::TitleContains) => "title contains",
        Some(MatchStrategy::DigitSequence) => "digit sequence",
        Some(MatchStrategy::SoleCandidate) => "sole candidate",
        None => "-",
    }
}

/// Render a pipeline result as a table plus summary, or as JSON.
pub fn format_pipeline_result(result: &PipelineResult, json: bool) -> Result<String, PipelineError> {
    if json {
        return to_json(result);
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Item", "State", "Match", "Attempts", "Artifact / Error"]);
    for outcome in &result.outcomes {
        let detail = match (&outcome.error, &outcome.path) {
            (Some(error), _) => error.clone(),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => "-".to_string(),
        };
        table.add_row(vec![
            outcome.item_id.clone(),
            outcome.state.label().to_string(),
            strategy_label(outcome.strategy).to_string(),
            outcome.attempts.len().to_string(),
            detail,
        ]);
    }
    Ok(format!("{}\n{}", table, result.summary))
}

/// Render a check report as a table plus totals, or as JSON.
pub fn format_check_result(checks: &[ArtifactCheck], json: bool) -> Result<String, PipelineError> {
    if json {
        return to_json(checks);
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Item", "Artifact", "Status"]);
    for check in checks {
        table.add_row(vec![
            check.item_id.clone(),
            check.path.display().to_string(),
            if check.valid { "valid" } else { "missing" }.to_string(),
        ]);
    }
    let valid = checks.iter().filter(|check| check.valid).count();
    Ok(format!(
        "{}\n{}/{} items have a valid artifact",
        table,
        valid,
        checks.len()
    ))
}
