//! Treasures of every stripe: artifacts, consumables, trinkets, and
//! leveled items.
//!
//! The source tree nests them two levels deep (consumables and
//! trinkets by echelon, leveled treasures by kind), so records carry a
//! category and subcategory read from the frontmatter `file_dpath`.
//! Unlike perks, the `<!-- -->` separator here precedes granted
//! abilities that belong to the treasure, so content after it is kept.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use rulesforge_document::{parse_quoted_abilities, strip_markdown_links};
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

static FLAVOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)##### .+?\n\n\*(.+?)\*").expect("valid regex"));

pub struct TreasuresParser;

impl CategoryParser for TreasuresParser {
    fn category(&self) -> Category {
        Category::Treasures
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut treasures = Vec::new();
        for path in ctx.markdown_files_recursive(&ctx.rules_path("Treasures"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            let body = strip_markdown_links(doc.body.trim());

            let segments: Vec<&str> = doc.field_or_default("file_dpath").split('/').collect();
            let category = path_segment(&segments, 1);
            let subcategory = path_segment(&segments, 2);

            let mut record = Map::new();
            record.insert("item_id".to_string(), doc.field_nullable("item_id"));
            record.insert("item_name".to_string(), doc.field_nullable("item_name"));
            record.insert("item_index".to_string(), doc.field_nullable("item_index"));
            record.insert("source".to_string(), doc.field_nullable("source"));
            record.insert("type".to_string(), doc.field_nullable("type"));
            record.insert("treasure_type".to_string(), doc.field_nullable("treasure_type"));
            record.insert("treasure_category".to_string(), category);
            record.insert("treasure_subcategory".to_string(), subcategory);
            record.insert("echelon".to_string(), doc.field_nullable("echelon"));
            record.insert(
                "flavor_text".to_string(),
                FLAVOR_RE
                    .captures(&body)
                    .map_or(Value::Null, |caps| Value::String(caps[1].trim().to_string())),
            );
            record.insert("content".to_string(), Value::String(body.clone()));
            record.insert(
                "abilities".to_string(),
                parse_quoted_abilities(&body)
                    .and_then(|abilities| serde_json::to_value(abilities).ok())
                    .unwrap_or(Value::Null),
            );
            treasures.push(Value::Object(record));
        }
        Ok(Value::Array(treasures))
    }
}

fn path_segment(segments: &[&str], index: usize) -> Value {
    segments
        .get(index)
        .map_or(Value::Null, |segment| Value::String((*segment).to_string()))
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

    fn write_treasure(tmp: &PathBuf, rel_dir: &str, name: &str, content: &str) {
        let dir = tmp.join("Treasures").join(rel_dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn artifacts_carry_their_category_and_flavor() {
        let tmp = temp_dir();
        write_treasure(
            &tmp,
            "Artifacts",
            "Encepter.md",
            "---\n\
             item_id: encepter\n\
             item_name: Encepter\n\
             type: treasure\n\
             treasure_type: artifact\n\
             file_dpath: Treasures/Artifacts\n\
             ---\n\n\
             ##### Encepter\n\n\
             *This scepter shines with captured starlight.*\n\n\
             The Encepter can be wielded by any [leader](../Classes/Leader.md).\n",
        );

        let value = TreasuresParser.parse(&ParseContext::new(&tmp)).unwrap();
        let treasure = &value.as_array().unwrap()[0];
        assert_eq!(treasure["item_id"], "encepter");
        assert_eq!(treasure["treasure_category"], "Artifacts");
        assert_eq!(treasure["treasure_subcategory"], Value::Null);
        assert_eq!(treasure["echelon"], Value::Null);
        assert_eq!(treasure["flavor_text"], "This scepter shines with captured starlight.");
        assert!(treasure["content"]
            .as_str()
            .unwrap()
            .ends_with("The Encepter can be wielded by any leader."));
        assert_eq!(treasure["abilities"], Value::Null);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn nested_treasures_keep_their_subcategory_and_abilities() {
        let tmp = temp_dir();
        write_treasure(
            &tmp,
            "Leveled Treasures/Leveled Weapon Treasures",
            "Blade of Quintessence.md",
            "---\n\
             item_id: blade-of-quintessence\n\
             item_name: Blade of Quintessence\n\
             treasure_type: leveled\n\
             echelon: 1\n\
             file_dpath: Treasures/Leveled Treasures/Leveled Weapon Treasures\n\
             ---\n\n\
             ##### Blade of Quintessence\n\n\
             *This blade hums with elemental power.*\n\n\
             **Level 1:** The weapon deals elemental damage.\n\n\
             <!-- -->\n\n\
             > ###### Elemental Burst (5 Essence)\n\
             >\n\
             > *The blade erupts.*\n\
             >\n\
             > | **Magic, Melee** | **Main action** |\n\
             > | --- | --- |\n\
             > | **📏 Melee 1** | **🎯 One creature** |\n\
             >\n\
             > **Power Roll + Might:**\n\
             >\n\
             > - **≤11:** 3 damage\n\
             > - **12-16:** 6 damage\n\
             > - **17+:** 9 damage\n\
             >\n\
             > **Effect:** Choose the damage type.\n",
        );

        let value = TreasuresParser.parse(&ParseContext::new(&tmp)).unwrap();
        let treasure = &value.as_array().unwrap()[0];
        assert_eq!(treasure["treasure_category"], "Leveled Treasures");
        assert_eq!(treasure["treasure_subcategory"], "Leveled Weapon Treasures");
        assert_eq!(treasure["echelon"], 1);
        // The separator does not cut treasure content.
        assert!(treasure["content"].as_str().unwrap().contains("Elemental Burst"));

        let abilities = treasure["abilities"].as_array().unwrap();
        assert_eq!(abilities.len(), 1);
        assert_eq!(abilities[0]["name"], "Elemental Burst");
        assert_eq!(abilities[0]["resource_cost"], "5 Essence");
        assert_eq!(abilities[0]["power_roll"], "Might");
        assert_eq!(abilities[0]["tier_effects"].as_array().unwrap().len(), 3);
        assert_eq!(abilities[0]["effect"], "Choose the damage type.");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn treasures_without_a_path_have_no_category() {
        let tmp = temp_dir();
        write_treasure(
            &tmp,
            "Trinkets",
            "Pocket Homunculus.md",
            "---\nitem_name: Pocket Homunculus\n---\n\n##### Pocket Homunculus\n\nA tiny clay figure.\n",
        );

        let value = TreasuresParser.parse(&ParseContext::new(&tmp)).unwrap();
        let treasure = &value.as_array().unwrap()[0];
        assert_eq!(treasure["treasure_category"], Value::Null);
        assert_eq!(treasure["treasure_subcategory"], Value::Null);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
