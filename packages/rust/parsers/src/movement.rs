//! Movement rules, kept as display text.

use serde_json::{Map, Value};

use rulesforge_document::strip_markdown_links;
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

pub struct MovementParser;

impl CategoryParser for MovementParser {
    fn category(&self) -> Category {
        Category::Movement
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut records = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Movement"))? {
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
    fn movement_records_keep_frontmatter_identity() {
        let tmp = temp_dir();
        let dir = tmp.join("Movement");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Climbing.md"),
            "---\nitem_id: climbing\nitem_name: Climbing and Swimming\ntype: movement\n---\n\nWhile climbing, you move at half [speed](../Speed.md).\n",
        )
        .unwrap();

        let value = MovementParser.parse(&ParseContext::new(&tmp)).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records[0]["item_id"], "climbing");
        assert_eq!(records[0]["item_index"], Value::Null);
        assert_eq!(records[0]["content"], "While climbing, you move at half speed.");

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
