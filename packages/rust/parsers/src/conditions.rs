//! Conditions such as bleeding or dazed, one record per document.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use rulesforge_document::strip_markdown_links;
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

static LEADING_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+[^\n]+\n+").expect("valid regex"));

pub struct ConditionsParser;

impl CategoryParser for ConditionsParser {
    fn category(&self) -> Category {
        Category::Conditions
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut conditions = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Conditions"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            // The body repeats the condition name as a heading; the
            // frontmatter already carries it.
            let body = LEADING_HEADING_RE.replace(doc.body.trim_start(), "");
            let mut condition = Map::new();
            condition.insert("item_id".to_string(), doc.field_value("item_id"));
            condition.insert("item_name".to_string(), doc.field_value("item_name"));
            condition.insert("item_index".to_string(), doc.field_value("item_index"));
            condition.insert("source".to_string(), doc.field_value("source"));
            condition.insert(
                "content".to_string(),
                Value::String(strip_markdown_links(body.trim())),
            );
            conditions.push(Value::Object(condition));
        }
        Ok(Value::Array(conditions))
    }
}
