//! Titles awarded for deeds, read from the per-echelon subdirectories.
//!
//! Each title is a heading, an italic flavor line, then bold
//! `**Prerequisite:**`, `**Effect:**`, and optional `**Special:**`
//! paragraphs. Titles that grant an ability carry it as a trailing
//! blockquote, which stays inside the effect text and is also lifted
//! out in structured form.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use rulesforge_document::text::section;
use rulesforge_document::{parse_quoted_abilities, strip_markdown_links};
use rulesforge_shared::{Category, Result};

use crate::context::{file_name, ParseContext};
use crate::CategoryParser;

static FLAVOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)#### .+?\n\n\*(.+?)\*").expect("valid regex"));

static PREREQUISITE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Prerequisite:\*\*\s*").expect("valid regex"));

static PREREQUISITE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n|\*\*Effect").expect("valid regex"));

static EFFECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Effect:\*\*\s*").expect("valid regex"));

static EFFECT_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n\*\*Special").expect("valid regex"));

static SPECIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Special:\*\*\s*").expect("valid regex"));

static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\n").expect("valid regex"));

pub struct TitlesParser;

impl CategoryParser for TitlesParser {
    fn category(&self) -> Category {
        Category::Titles
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut titles = Vec::new();
        for echelon_dir in ctx.subdirectories(&ctx.rules_path("Titles"))? {
            if !file_name(&echelon_dir).contains("Echelon") {
                continue;
            }
            for path in ctx.markdown_files(&echelon_dir)? {
                let Some(doc) = ctx.load_document(&path)? else {
                    continue;
                };
                let body = doc.body.trim();

                let mut record = Map::new();
                record.insert("item_id".to_string(), doc.field_nullable("item_id"));
                record.insert("item_name".to_string(), doc.field_nullable("item_name"));
                record.insert("item_index".to_string(), doc.field_nullable("item_index"));
                record.insert("source".to_string(), doc.field_nullable("source"));
                record.insert("type".to_string(), doc.field_nullable("type"));
                record.insert("echelon".to_string(), doc.field_nullable("echelon"));
                record.insert(
                    "flavor_text".to_string(),
                    FLAVOR_RE.captures(body).map_or(Value::Null, |caps| {
                        Value::String(strip_markdown_links(caps[1].trim()))
                    }),
                );
                record.insert(
                    "prerequisite".to_string(),
                    bold_section(body, &PREREQUISITE_RE, &PREREQUISITE_END_RE),
                );
                record.insert("effect".to_string(), bold_section(body, &EFFECT_RE, &EFFECT_END_RE));
                record
                    .insert("special".to_string(), bold_section(body, &SPECIAL_RE, &PARAGRAPH_RE));
                record.insert(
                    "abilities".to_string(),
                    parse_quoted_abilities(body)
                        .and_then(|abilities| serde_json::to_value(abilities).ok())
                        .unwrap_or(Value::Null),
                );
                titles.push(Value::Object(record));
            }
        }
        Ok(Value::Array(titles))
    }
}

/// Text between a bold section marker and its terminator, links
/// stripped, or null when the marker is absent.
fn bold_section(body: &str, head: &Regex, end: &Regex) -> Value {
    section(body, head, end)
        .map_or(Value::Null, |text| Value::String(strip_markdown_links(text.trim())))
}
