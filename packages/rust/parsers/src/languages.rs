//! Language and culture reference tables from the Background chapter.
//!
//! Unlike the directory-walking categories, this one lifts five named
//! tables out of `Rules/Chapters/Background.md`. Tables missing from
//! the chapter are skipped rather than reported as errors.

use serde_json::{json, Value};

use rulesforge_document::{keyed_rows, named_table};
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

struct TableSpec {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    kind: &'static str,
    /// Column whose `<br/>` line breaks are flattened to spaces.
    cleanup: Option<&'static str>,
}

const TABLES: [TableSpec; 5] = [
    TableSpec {
        id: "typical-ancestry-cultures",
        name: "Typical Ancestry Cultures Table",
        description: "Archetypical culture aspects for heroes who grew up surrounded mostly by other members of their ancestry.",
        kind: "culture_reference",
        cleanup: None,
    },
    TableSpec {
        id: "archetypical-cultures",
        name: "Archetypical Cultures Table",
        description: "Culture aspects based on cultural archetypes such as noble houses or pirate crews.",
        kind: "culture_reference",
        cleanup: None,
    },
    TableSpec {
        id: "vaslorian-human-languages",
        name: "Vaslorian Human Languages Table",
        description: "Dominant languages in Vaslorian human-centric territories by region.",
        kind: "language_reference",
        cleanup: None,
    },
    TableSpec {
        id: "languages-by-ancestry",
        name: "Languages by Ancestry Table",
        description: "The most common languages actively spoken and signed by significant populations of people in Orden.",
        kind: "language_reference",
        cleanup: Some("notes"),
    },
    TableSpec {
        id: "dead-languages",
        name: "Dead Languages Table",
        description: "Ancient languages of Orden that are no longer actively spoken, and the modern languages related to them.",
        kind: "language_reference",
        cleanup: Some("common_topics"),
    },
];

pub struct LanguagesParser;

impl CategoryParser for LanguagesParser {
    fn category(&self) -> Category {
        Category::Languages
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let content = ctx.read(&ctx.rules_path("Chapters/Background.md"))?;

        let mut tables = Vec::new();
        for spec in &TABLES {
            let Some(table) = named_table(&content, spec.name) else {
                continue;
            };
            let mut entries = keyed_rows(&table);
            if let Some(field) = spec.cleanup {
                for row in &mut entries {
                    if let Some(Value::String(text)) = row.get_mut(field) {
                        *text = text.replace("<br/>", " ").replace("  ", " ").trim().to_string();
                    }
                }
            }
            tables.push(json!({
                "table_id": spec.id,
                "table_name": spec.name,
                "description": spec.description,
                "type": spec.kind,
                "entries": entries,
            }));
        }
        Ok(Value::Array(tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const BACKGROUND: &str = "\
---\nitem_id: background\n---\n\n\
### Languages\n\n\
#### Languages by Ancestry Table\n\n\
| Ancestry | Languages | Notes                          |\n\
| -------- | --------- | ------------------------------ |\n\
| Devil    | Anjali    | Spoken in<br/>the Seven Cities |\n\
| Dwarf    | Zaliac    | Carved runes                   |\n\n\
#### Dead Languages Table\n\n\
| Language     | Common Topics          | Related Modern Languages |\n\
| ------------ | ---------------------- | ------------------------ |\n\
| High Rhyvian | Magic,<br/>elf history | Hyrallic                 |\n";

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulesforge-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn tables_present_in_the_chapter_are_extracted_in_order() {
        let tmp = temp_dir();
        let dir = tmp.join("Chapters");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Background.md"), BACKGROUND).unwrap();

        let value = LanguagesParser.parse(&ParseContext::new(&tmp)).unwrap();
        let tables = value.as_array().unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0]["table_id"], "languages-by-ancestry");
        assert_eq!(tables[0]["type"], "language_reference");
        assert_eq!(tables[1]["table_id"], "dead-languages");

        let entries = tables[0]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["ancestry"], "Devil");
        assert_eq!(entries[0]["notes"], "Spoken in the Seven Cities");
        assert_eq!(entries[1]["languages"], "Zaliac");

        let dead = tables[1]["entries"].as_array().unwrap();
        assert_eq!(dead[0]["common_topics"], "Magic, elf history");
        assert_eq!(dead[0]["related_modern_languages"], "Hyrallic");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_background_chapter_is_an_error() {
        let tmp = temp_dir();
        assert!(LanguagesParser.parse(&ParseContext::new(&tmp)).is_err());
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
