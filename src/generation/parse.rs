//! Response parsing: extract entries from free-form generation output.
//!
//! The service is asked for a JSON array but routinely answers with fenced blocks, markdown
//! sections or plain prose. Strategies cascade from strict to loose and the first one that
//! yields anything wins. Nothing here errors; an unusable response is `ParseOutcome::Empty`.

use crate::types::{ParseStrategy, ParsedEntry, WorkItem};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Parser tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Object fields that may carry the work item reference, in preference order
    #[serde(default = "default_discriminator_fields")]
    pub discriminator_fields: Vec<String>,
    /// Object fields that may carry the artifact body, in preference order
    #[serde(default = "default_content_fields")]
    pub content_fields: Vec<String>,
    /// Minimum trimmed length for the unstructured last-resort entry
    #[serde(default = "default_min_raw_chars")]
    pub min_raw_chars: usize,
}

fn default_discriminator_fields() -> Vec<String> {
    ["id", "item_id", "itemId", "task_id", "taskId", "story_id", "storyId"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_content_fields() -> Vec<String> {
    ["content", "artifact", "schema", "test_plan", "testPlan", "body"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_raw_chars() -> usize {
    50
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            discriminator_fields: default_discriminator_fields(),
            content_fields: default_content_fields(),
            min_raw_chars: default_min_raw_chars(),
        }
    }
}

/// Tagged parser result; callers branch on the tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Entries(Vec<ParsedEntry>),
    Empty,
}

impl ParseOutcome {
    fn from_entries(entries: Vec<ParsedEntry>) -> Self {
        if entries.is_empty() {
            ParseOutcome::Empty
        } else {
            ParseOutcome::Entries(entries)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ParseOutcome::Empty)
    }

    pub fn len(&self) -> usize {
        match self {
            ParseOutcome::Entries(entries) => entries.len(),
            ParseOutcome::Empty => 0,
        }
    }

    /// Strategy that produced the entries, if any.
    pub fn strategy(&self) -> Option<ParseStrategy> {
        match self {
            ParseOutcome::Entries(entries) => entries.first().map(|entry| entry.strategy),
            ParseOutcome::Empty => None,
        }
    }

    pub fn into_entries(self) -> Vec<ParsedEntry> {
        match self {
            ParseOutcome::Entries(entries) => entries,
            ParseOutcome::Empty => Vec::new(),
        }
    }
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_+\-]*[ \t]*\r?\n(.*?)```").unwrap())
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s{0,3}#{1,6}\s+(.+)$").unwrap())
}

fn numbered_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\*\*)?\d+[.)]\s+(.+)$").unwrap())
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-*•]\s+(.+)$").unwrap())
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(.+)$").unwrap())
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(id|name|title|description|steps|expected(?:\s+(?:result|results|outcome|behavior))?)\s*:\s*(.*)$",
        )
        .unwrap()
    })
}

/// Markers that open a section, strongest kind first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionMarker {
    Heading,
    Numbered,
    Bullet,
}

impl SectionMarker {
    fn regex(self) -> &'static Regex {
        match self {
            SectionMarker::Heading => heading_re(),
            SectionMarker::Numbered => numbered_re(),
            SectionMarker::Bullet => bullet_re(),
        }
    }
}

/// Extracts [`ParsedEntry`] values from raw generation output.
#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    config: ParserConfig,
}

impl ResponseParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse `raw_text` produced for the `expected` items.
    pub fn parse(&self, raw_text: &str, expected: &[WorkItem]) -> ParseOutcome {
        let entries = self.parse_json_array(raw_text, ParseStrategy::JsonArray);
        if !entries.is_empty() {
            return ParseOutcome::from_entries(entries);
        }

        let entries = self.parse_fenced_blocks(raw_text);
        if !entries.is_empty() {
            return ParseOutcome::from_entries(entries);
        }

        let entries = self.parse_sections(raw_text, expected);
        if let ([only], [_, _, ..]) = (expected, entries.as_slice()) {
            // One item asked for: the sections are its parts, not separate artifacts.
            return ParseOutcome::from_entries(vec![whole_reply(raw_text, only)]);
        }
        if !entries.is_empty() {
            return ParseOutcome::from_entries(entries);
        }

        ParseOutcome::from_entries(self.parse_raw(raw_text, expected))
    }

    /// Strategy 1: the whole text is a JSON array of objects with a discriminator.
    fn parse_json_array(&self, text: &str, strategy: ParseStrategy) -> Vec<ParsedEntry> {
        let Ok(Value::Array(values)) = serde_json::from_str::<Value>(text.trim()) else {
            return Vec::new();
        };
        values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(map) => self.entry_from_object(map, strategy),
                _ => None,
            })
            .collect()
    }

    /// Strategy 2: each fenced block parsed on its own as strategy 1.
    fn parse_fenced_blocks(&self, text: &str) -> Vec<ParsedEntry> {
        fenced_block_re()
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .flat_map(|block| self.parse_json_array(block.as_str(), ParseStrategy::FencedBlock))
            .collect()
    }

    /// Strategy 3: split on section markers and read `Label:` lines.
    ///
    /// Every marker kind present is tried. The split whose sections reference the most
    /// expected items wins, then the one with the most sections, then the stronger kind.
    fn parse_sections(&self, text: &str, expected: &[WorkItem]) -> Vec<ParsedEntry> {
        let lines: Vec<&str> = text.lines().collect();
        let mut best: Option<(usize, usize, Vec<ParsedEntry>)> = None;

        for marker in [
            SectionMarker::Heading,
            SectionMarker::Numbered,
            SectionMarker::Bullet,
        ] {
            let entries = split_sections(&lines, marker);
            if entries.is_empty() {
                continue;
            }
            let referenced = expected
                .iter()
                .filter(|item| entries.iter().any(|entry| references(entry, item)))
                .count();
            let better = match &best {
                Some((best_referenced, best_len, _)) => {
                    (referenced, entries.len()) > (*best_referenced, *best_len)
                }
                None => true,
            };
            if better {
                best = Some((referenced, entries.len(), entries));
            }
        }

        best.map(|(_, _, entries)| entries).unwrap_or_default()
    }

    /// Strategy 4: a long enough answer for a single expected item is taken verbatim.
    ///
    /// Only single-item calls use this. Unstructured text in a multi-item call cannot be
    /// attributed to any one item, so it is a parse miss and the batch goes to fallback
    /// instead of binding everything to the first item.
    fn parse_raw(&self, text: &str, expected: &[WorkItem]) -> Vec<ParsedEntry> {
        let trimmed = text.trim();
        match expected {
            [only] if trimmed.chars().count() > self.config.min_raw_chars => vec![ParsedEntry {
                discriminator: only.id.clone(),
                content: trimmed.to_string(),
                fields: Map::new(),
                strategy: ParseStrategy::RawText,
            }],
            _ => Vec::new(),
        }
    }

    fn entry_from_object(
        &self,
        map: Map<String, Value>,
        strategy: ParseStrategy,
    ) -> Option<ParsedEntry> {
        let discriminator = self
            .config
            .discriminator_fields
            .iter()
            .find_map(|field| scalar_text(map.get(field)?))?;

        let content = self
            .config
            .content_fields
            .iter()
            .find_map(|field| match map.get(field)? {
                Value::Null => None,
                Value::String(s) if s.trim().is_empty() => None,
                Value::String(s) => Some(s.clone()),
                other => serde_json::to_string_pretty(other).ok(),
            })
            .or_else(|| serde_json::to_string_pretty(&Value::Object(map.clone())).ok())?;

        Some(ParsedEntry {
            discriminator,
            content,
            fields: map,
            strategy,
        })
    }
}

fn split_sections(lines: &[&str], marker: SectionMarker) -> Vec<ParsedEntry> {
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    for line in lines {
        if let Some(caps) = marker.regex().captures(line) {
            sections.push((caps[1].to_string(), vec![*line]));
        } else if let Some((_, body)) = sections.last_mut() {
            body.push(*line);
        }
    }

    sections
        .into_iter()
        .filter_map(|(header, body)| section_entry(&header, &body))
        .collect()
}

fn references(entry: &ParsedEntry, item: &WorkItem) -> bool {
    let discriminator = entry.discriminator.to_lowercase();
    [item.id.trim(), item.title.trim()]
        .into_iter()
        .filter(|needle| !needle.is_empty())
        .any(|needle| discriminator.contains(&needle.to_lowercase()))
}

fn whole_reply(text: &str, item: &WorkItem) -> ParsedEntry {
    ParsedEntry {
        discriminator: item.id.clone(),
        content: text.trim().to_string(),
        fields: Map::new(),
        strategy: ParseStrategy::Sections,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn strip_emphasis(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '*' || c == '_' || c == '`')
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string()
}

fn section_entry(header: &str, body: &[&str]) -> Option<ParsedEntry> {
    let header = strip_emphasis(header);
    let mut id = None;
    let mut name = None;
    let mut description = None;
    let mut expected = None;
    let mut steps: Vec<String> = Vec::new();
    let mut in_steps = false;

    for line in body.iter().skip(1) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let unbulleted = trimmed
            .trim_start_matches(|c| c == '-' || c == '*' || c == '•')
            .trim();
        let unbulleted = strip_leading_emphasis(unbulleted);

        if let Some(caps) = label_re().captures(&unbulleted) {
            let label = caps[1].to_lowercase();
            let value = strip_emphasis(&caps[2]);
            in_steps = false;
            match label.as_str() {
                "id" => id = Some(value),
                "name" | "title" => name = Some(value),
                "description" => description = Some(value),
                "steps" => {
                    in_steps = true;
                    if !value.is_empty() {
                        steps.push(value);
                    }
                }
                _ => expected = Some(value),
            }
            continue;
        }

        if in_steps {
            if let Some(caps) = list_item_re().captures(trimmed) {
                steps.push(caps[1].trim().to_string());
            }
        }
    }

    let discriminator = [id.as_deref(), name.as_deref(), Some(header.as_str())]
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())?
        .to_string();

    let mut fields = Map::new();
    fields.insert("header".to_string(), Value::String(header.clone()));
    if let Some(id) = id {
        fields.insert("id".to_string(), Value::String(id));
    }
    fields.insert(
        "name".to_string(),
        Value::String(name.unwrap_or_else(|| header.clone())),
    );
    if let Some(description) = description {
        fields.insert("description".to_string(), Value::String(description));
    }
    if !steps.is_empty() {
        fields.insert(
            "steps".to_string(),
            Value::Array(steps.into_iter().map(Value::String).collect()),
        );
    }
    if let Some(expected) = expected {
        fields.insert("expected_result".to_string(), Value::String(expected));
    }

    Some(ParsedEntry {
        discriminator,
        content: body.join("\n").trim().to_string(),
        fields,
        strategy: ParseStrategy::Sections,
    })
}

// "**Name:** Login" -> "Name: Login"
fn strip_leading_emphasis(text: &str) -> String {
    text.replacen("**", "", 2)
}
