//! Deities and saints from the Gods and Religion chapter.
//!
//! Two tables give the roster and domains; the per-deity and
//! per-saint sections below them contribute descriptions. Deities
//! come first in the output, then saints.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use rulesforge_document::text::collapse_blank_lines;
use rulesforge_document::{keyed_rows, named_table, slugify};
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

static DEITY_SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"### ([^\n]+)\n\n\*\*Domains:\*\*\s+([^\n]+)").expect("valid regex")
});

static DEITY_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n#{3,4}\s+").expect("valid regex"));

static SAINT_SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"##### ([^\n]+)\n\n\*\*Domains:\*\*\s+([^\n]+)").expect("valid regex")
});

static SAINT_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n#{4,5}\s+").expect("valid regex"));

static DEITY_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n###\s+").expect("valid regex"));

pub struct DeitiesParser;

impl CategoryParser for DeitiesParser {
    fn category(&self) -> Category {
        Category::Deities
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let content = ctx.read(&ctx.rules_path("Chapters/Gods and Religion.md"))?;

        let mut deities = table_entities(&content, "Deities and Domains Table", "deity", "deity");
        let deity_details = section_details(&content, &DEITY_SECTION_RE, &[&DEITY_END_RE]);
        for deity in &mut deities {
            let id = deity["id"].as_str().unwrap_or_default().to_string();
            if let Some(description) = deity_details.get(&id) {
                deity.insert("description".to_string(), Value::String(description.clone()));
            }
            if let Some(patron) = patron_ancestry(&id) {
                deity.insert("patron_of".to_string(), Value::String(patron.to_string()));
            }
        }

        let mut saints = table_entities(&content, "Saints and Domains Table", "saint", "saint");
        let saint_details =
            section_details(&content, &SAINT_SECTION_RE, &[&SAINT_END_RE, &DEITY_HEADING_RE]);
        for saint in &mut saints {
            let id = saint["id"].as_str().unwrap_or_default().to_string();
            if let Some(description) = saint_details.get(&id) {
                saint.insert("description".to_string(), Value::String(description.clone()));
            }
        }

        let mut entities: Vec<Value> = deities.into_iter().map(Value::Object).collect();
        entities.extend(saints.into_iter().map(Value::Object));
        Ok(Value::Array(entities))
    }
}

fn table_entities(
    content: &str,
    table_name: &str,
    name_key: &str,
    kind: &str,
) -> Vec<Map<String, Value>> {
    let Some(table) = named_table(content, table_name) else {
        warn!(table = table_name, "table not found");
        return Vec::new();
    };

    let mut entities = Vec::new();
    for row in keyed_rows(&table) {
        let name = row.get(name_key).and_then(Value::as_str).unwrap_or("").trim();
        let domains = row.get("domains").and_then(Value::as_str).unwrap_or("").trim();
        if name.is_empty() || domains.is_empty() {
            continue;
        }
        let mut entity = Map::new();
        entity.insert("id".to_string(), Value::String(slugify(name)));
        entity.insert("name".to_string(), Value::String(name.to_string()));
        entity.insert("type".to_string(), Value::String(kind.to_string()));
        entity.insert(
            "domains".to_string(),
            Value::Array(
                domains
                    .split(',')
                    .map(|domain| Value::String(domain.trim().to_string()))
                    .collect(),
            ),
        );
        entities.push(entity);
    }
    entities
}

/// Descriptions keyed by slug, taken from the text between a
/// section's `**Domains:**` line and the next heading that `ends`
/// recognizes. The first end pattern that matches anywhere wins.
fn section_details(content: &str, section: &Regex, ends: &[&Regex]) -> HashMap<String, String> {
    let mut details = HashMap::new();
    for caps in section.captures_iter(content) {
        let name = caps[1].trim().to_string();
        let start = caps.get(0).expect("whole match").end();
        let rest = &content[start..];
        let end = ends
            .iter()
            .find_map(|re| re.find(rest).map(|m| m.start()))
            .unwrap_or(rest.len());
        details.insert(slugify(&name), collapse_blank_lines(rest[..end].trim()));
    }
    details
}

fn patron_ancestry(id: &str) -> Option<&'static str> {
    match id {
        "val" => Some("elf"),
        "ord" => Some("dwarf"),
        "kul" => Some("orc"),
        "aan" => Some("human"),
        _ => None,
    }
}
