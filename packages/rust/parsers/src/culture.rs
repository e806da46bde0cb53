//! Shared plumbing for culture aspect documents.
//!
//! Environments and upbringings use the same layout: a description,
//! then a `**Skill Options:**` line naming skill-group choices and an
//! optional `(*Quick Build:* ...)` pick.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use rulesforge_document::text::word_to_number;
use rulesforge_document::{strip_markdown_links, Document};

const SKILL_OPTIONS_MARKER: &str = "**Skill Options:**";

static LEADING_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+[^\n]+\n+").expect("valid regex"));

static SKILL_OPTIONS_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Skill Options:\*\*\s*([^\n]+)").expect("valid regex"));

static QUICK_BUILD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\*Quick Build:\*\s*([^)]+)\)").expect("valid regex"));

static QUICK_BUILD_STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\*Quick Build:\*[^)]+\)").expect("valid regex"));

static GROUP_OR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(One|Two|Three|Four)\s+skills?\s+from\s+the\s+(\w+)\s+or\s+(\w+)\s+skill\s+groups?")
        .expect("valid regex")
});

static GROUP_SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(One|Two|Three|Four)\s+skills?\s+from\s+the\s+(\w+)\s+skill\s+groups?")
        .expect("valid regex")
});

/// Builds one aspect record. `choice` interprets the skill options
/// line, so upbringings can layer their specific-skill patterns on
/// top of [`group_choice`].
pub(crate) fn parse_culture_aspect<F>(doc: &Document, choice: F) -> Value
where
    F: Fn(&str) -> Option<Value>,
{
    let body = LEADING_HEADING_RE.replace(doc.body.trim_start(), "");
    let description = match body.split_once(SKILL_OPTIONS_MARKER) {
        Some((before, _)) => before.trim(),
        None => body.trim(),
    };
    let skill_options = SKILL_OPTIONS_LINE_RE.captures(&body).map(|caps| {
        let skill_text = &caps[1];
        json!({
            "description": QUICK_BUILD_STRIP_RE.replace_all(skill_text, "").trim(),
            "choice": choice(skill_text),
            "quick_build": quick_build(skill_text),
        })
    });

    let mut aspect = Map::new();
    aspect.insert("item_id".to_string(), doc.field_value("item_id"));
    aspect.insert("item_name".to_string(), doc.field_value("item_name"));
    aspect.insert("item_index".to_string(), doc.field_value("item_index"));
    aspect.insert("source".to_string(), doc.field_value("source"));
    aspect.insert(
        "culture_benefit_type".to_string(),
        doc.field_value("culture_benefit_type"),
    );
    aspect.insert(
        "description".to_string(),
        Value::String(strip_markdown_links(description)),
    );
    aspect.insert("skill_options".to_string(), skill_options.unwrap_or(Value::Null));
    Value::Object(aspect)
}

/// The common "N skills from the X (or Y) skill group(s)" patterns.
pub(crate) fn group_choice(skill_text: &str) -> Option<Value> {
    if let Some(caps) = GROUP_OR_RE.captures(skill_text) {
        return Some(json!({
            "number": word_to_number(&caps[1]).unwrap_or(1),
            "group": { "names": [&caps[2], &caps[3]], "type": "or" },
        }));
    }
    GROUP_SINGLE_RE.captures(skill_text).map(|caps| {
        json!({
            "number": word_to_number(&caps[1]).unwrap_or(1),
            "group": { "names": [&caps[2]], "type": "from" },
        })
    })
}

fn quick_build(text: &str) -> Option<String> {
    QUICK_BUILD_RE
        .captures(text)
        .map(|caps| caps[1].trim().trim_end_matches('.').to_string())
}
