//! Perks, grouped under `Rules/Perks/<group>/` subdirectories.
//!
//! The group also lives in the frontmatter `type` field as
//! `perk/<group>`, which is what the output records carry. Some perks
//! embed a companion stat block, and some carry designer notes after
//! an `<!-- -->` marker that are cut from the content.

use serde_json::{Map, Value};

use rulesforge_document::{parse_stat_block, strip_markdown_links};
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

pub struct PerksParser;

impl CategoryParser for PerksParser {
    fn category(&self) -> Category {
        Category::Perks
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut perks = Vec::new();
        for dir in ctx.subdirectories(&ctx.rules_path("Perks"))? {
            for path in ctx.markdown_files(&dir)? {
                let Some(doc) = ctx.load_document(&path)? else {
                    continue;
                };
                let body = doc.body.trim();
                let stat_block = parse_stat_block(body);

                // Text after the comment marker is supplementary and
                // not part of the perk.
                let content = match body.split_once("<!-- -->") {
                    Some((before, _)) => before.trim(),
                    None => body,
                };
                let content = strip_markdown_links(content);

                let perk_group = doc
                    .field("type")
                    .and_then(|kind| kind.split_once('/'))
                    .map(|(_, group)| group.to_string());

                let mut perk = Map::new();
                perk.insert("item_id".to_string(), doc.field_nullable("item_id"));
                perk.insert("item_name".to_string(), doc.field_nullable("item_name"));
                perk.insert("item_index".to_string(), doc.field_nullable("item_index"));
                perk.insert("source".to_string(), doc.field_nullable("source"));
                perk.insert("type".to_string(), doc.field_nullable("type"));
                perk.insert(
                    "perk_group".to_string(),
                    perk_group.map(Value::String).unwrap_or(Value::Null),
                );
                perk.insert("content".to_string(), Value::String(content));
                if let Some(block) = stat_block {
                    if let Ok(block) = serde_json::to_value(&block) {
                        perk.insert("stat_block".to_string(), block);
                    }
                }
                perks.push(Value::Object(perk));
            }
        }
        Ok(Value::Array(perks))
    }
}
