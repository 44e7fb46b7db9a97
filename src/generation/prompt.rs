//! Prompt construction for batch and single-item generation calls.

use crate::types::{ArtifactKind, WorkItem};
use std::fmt::Write as _;

pub trait PromptBuilder: Send + Sync {
    /// Prompt for a multi-item call. The response should carry one entry per item.
    fn batch_prompt(&self, kind: ArtifactKind, items: &[WorkItem], context: Option<&str>) -> String;

    /// Prompt for a call that covers exactly one item.
    fn single_prompt(&self, kind: ArtifactKind, item: &WorkItem, context: Option<&str>) -> String;
}

/// Generic instructions asking for a JSON array of `{"id", "content"}` objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptBuilder;

impl DefaultPromptBuilder {
    fn describe(out: &mut String, item: &WorkItem) {
        let _ = writeln!(out, "- id: {}", item.id);
        let _ = writeln!(out, "  title: {}", item.title);
        if !item.description.trim().is_empty() {
            let _ = writeln!(out, "  description: {}", item.description.trim());
        }
        let _ = writeln!(out, "  category: {}", item.category);
        if !item.phase.is_empty() {
            let _ = writeln!(out, "  phase: {}", item.phase);
        }
    }

    fn context_block(out: &mut String, context: Option<&str>) {
        if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
            let _ = writeln!(out, "\nAdditional context:\n{}", context);
        }
    }
}

impl PromptBuilder for DefaultPromptBuilder {
    fn batch_prompt(&self, kind: ArtifactKind, items: &[WorkItem], context: Option<&str>) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Write one {} for each of the following {} work items.\n",
            kind.noun(),
            items.len()
        );
        for item in items {
            Self::describe(&mut out, item);
        }
        Self::context_block(&mut out, context);
        let _ = write!(
            out,
            "\nRespond with a JSON array only. Each element must be an object with an \"id\" \
             field equal to the work item id and a \"content\" field holding the {}.",
            kind.noun()
        );
        out
    }

    fn single_prompt(&self, kind: ArtifactKind, item: &WorkItem, context: Option<&str>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Write a {} for this work item.\n", kind.noun());
        Self::describe(&mut out, item);
        Self::context_block(&mut out, context);
        let _ = write!(
            out,
            "\nRespond with a JSON array holding one object with \"id\": \"{}\" and a \
             \"content\" field holding the {}.",
            item.id,
            kind.noun()
        );
        out
    }
}
