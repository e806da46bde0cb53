//! Rulebook chapters, kept as display text.

use serde_json::{Map, Value};

use rulesforge_document::strip_markdown_links;
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

pub struct ChaptersParser;

impl CategoryParser for ChaptersParser {
    fn category(&self) -> Category {
        Category::Chapters
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut chapters = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Chapters"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            let mut chapter: Map<String, Value> = doc.frontmatter.clone();
            chapter.insert(
                "content".to_string(),
                Value::String(strip_markdown_links(doc.body.trim())),
            );
            chapters.push(Value::Object(chapter));
        }
        Ok(Value::Array(chapters))
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
    fn chapters_carry_frontmatter_and_clean_content() {
        let tmp = temp_dir();
        let dir = tmp.join("Chapters");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Combat.md"),
            "---\nitem_id: combat\nitem_name: Combat\nsource: mcdm.heroes.v1\n---\n\nSee [Conditions](../Conditions/_Index.md) for details.\n",
        )
        .unwrap();

        let value = ChaptersParser.parse(&ParseContext::new(&tmp)).unwrap();
        let chapters = value.as_array().unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0]["item_id"], "combat");
        assert_eq!(chapters[0]["content"], "See Conditions for details.");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_chapters_are_skipped() {
        let tmp = temp_dir();
        let dir = tmp.join("Chapters");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Good.md"), "---\nitem_id: good\n---\nbody\n").unwrap();
        std::fs::write(dir.join("Bad.md"), "no header at all\n").unwrap();

        let value = ChaptersParser.parse(&ParseContext::new(&tmp)).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
