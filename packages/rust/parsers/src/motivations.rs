//! Negotiation motivations and pitfalls, kept as display text.

use serde_json::{Map, Value};

use rulesforge_document::strip_markdown_links;
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

pub struct MotivationsParser;

impl CategoryParser for MotivationsParser {
    fn category(&self) -> Category {
        Category::MotivationsAndPitfalls
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let dir = ctx.rules_path("Negotiation/Motivations and Pitfalls");
        let mut records = Vec::new();
        for path in ctx.markdown_files(&dir)? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            let mut record = Map::new();
            record.insert("item_id".to_string(), doc.field_nullable("item_id"));
            record.insert("item_name".to_string(), doc.field_nullable("item_name"));
            record.insert("item_index".to_string(), doc.field_nullable("item_index"));
            record.insert("source".to_string(), doc.field_nullable("source"));
            record.insert("type".to_string(), doc.field_nullable("type"));
            record.insert(
                "content".to_string(),
                Value::String(strip_markdown_links(doc.body.trim())),
            );
            records.push(Value::Object(record));
        }
        Ok(Value::Array(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulesforge-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn motivations_come_from_the_negotiation_chapter() {
        let tmp = temp_dir();
        let dir = tmp.join("Negotiation/Motivations and Pitfalls");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Greed.md"),
            "---\nitem_id: greed\nitem_name: Greed\ntype: motivation\n---\n\nOffer the NPC wealth or valuables.\n",
        )
        .unwrap();

        let value = MotivationsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["type"], "motivation");
        assert_eq!(records[0]["content"], "Offer the NPC wealth or valuables.");

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
