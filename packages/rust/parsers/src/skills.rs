//! Skill groups and the skills inside them.
//!
//! Each document under `Rules/Skills` covers one group (crafting,
//! exploration, ...) with a description, typical rewards and
//! consequences paragraphs, and a `| Skill | Use |` table listing the
//! group's skills.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use rulesforge_document::text::take_until;
use rulesforge_document::strip_markdown_links;
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

static SKILLS_TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\| Skill\s+\| Use\s+\|").expect("valid regex"));

static DESCRIPTION_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)##### .+?\n\n").expect("valid regex"));

static REWARDS_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Rewards for tests made with \w+ skills typically include ").expect("valid regex")
});

static CONSEQUENCES_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Consequences for tests made with \w+ skills (?:typically )?include ")
        .expect("valid regex")
});

static PARAGRAPH_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n").expect("valid regex"));

static HEADING_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n#").expect("valid regex"));

static REWARDS_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n|Consequences").expect("valid regex"));

static CONSEQUENCES_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n|######").expect("valid regex"));

pub struct SkillsParser;

impl CategoryParser for SkillsParser {
    fn category(&self) -> Category {
        Category::Skills
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut groups = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Skills"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            let body = &doc.body;

            let description = DESCRIPTION_HEAD_RE.find(body).map(|m| {
                strip_markdown_links(take_until(&body[m.end()..], &HEADING_END_RE).trim())
            });
            let typical_rewards = REWARDS_HEAD_RE.find(body).map(|m| {
                strip_markdown_links(take_until(&body[m.end()..], &REWARDS_END_RE).trim())
            });
            let typical_consequences = CONSEQUENCES_HEAD_RE.find(body).map(|m| {
                strip_markdown_links(take_until(&body[m.end()..], &CONSEQUENCES_END_RE).trim())
            });

            let mut group = Map::new();
            group.insert("item_id".to_string(), doc.field_nullable("item_id"));
            group.insert("item_name".to_string(), doc.field_nullable("item_name"));
            group.insert("item_index".to_string(), doc.field_nullable("item_index"));
            group.insert("source".to_string(), doc.field_nullable("source"));
            group.insert("type".to_string(), doc.field_nullable("type"));
            group.insert("description".to_string(), option_string(description));
            group.insert("typical_rewards".to_string(), option_string(typical_rewards));
            group.insert("typical_consequences".to_string(), option_string(typical_consequences));
            group.insert("skills".to_string(), Value::Array(parse_skills_table(body)));
            groups.push(Value::Object(group));
        }
        Ok(Value::Array(groups))
    }
}

fn option_string(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

fn parse_skills_table(body: &str) -> Vec<Value> {
    let Some(head) = SKILLS_TABLE_RE.find(body) else {
        return Vec::new();
    };
    let table = take_until(&body[head.end()..], &PARAGRAPH_END_RE);

    let mut skills = Vec::new();
    for line in table.lines() {
        if !line.contains('|') || line.contains("---") {
            continue;
        }
        let cells: Vec<&str> = line
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect();
        if cells.len() >= 2 {
            skills.push(json!({
                "name": cells[0],
                "use": strip_markdown_links(cells[1]),
            }));
        }
    }
    skills
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const GROUP: &str = "\
---\nitem_id: exploration-skills\nitem_name: Exploration Skills\ntype: skill_group\n---\n\n\
##### Exploration Skills\n\n\
Exploration skills cover feats of athletics and wilderness craft.\n\n\
###### Exploration Skills Table\n\n\
| Skill     | Use                            |\n\
| --------- | ------------------------------ |\n\
| Climb     | Scale sheer surfaces           |\n\
| Endurance | Resist [fatigue](../Rest.md)   |\n\n\
Rewards for tests made with exploration skills typically include shortcuts and safe passage.\n\n\
Consequences for tests made with exploration skills include lost time and hazards.\n";

    fn write_group(tmp: &PathBuf) {
        let dir = tmp.join("Skills");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Exploration.md"), GROUP).unwrap();
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulesforge-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn groups_carry_description_rewards_and_consequences() {
        let tmp = temp_dir();
        write_group(&tmp);

        let value = SkillsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let group = &value.as_array().unwrap()[0];
        assert_eq!(
            group["description"],
            "Exploration skills cover feats of athletics and wilderness craft."
        );
        assert_eq!(
            group["typical_rewards"],
            "shortcuts and safe passage."
        );
        assert_eq!(
            group["typical_consequences"],
            "lost time and hazards."
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn the_skills_table_becomes_name_and_use_pairs() {
        let tmp = temp_dir();
        write_group(&tmp);

        let value = SkillsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let skills = value[0]["skills"].as_array().unwrap();
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0]["name"], "Climb");
        assert_eq!(skills[0]["use"], "Scale sheer surfaces");
        assert_eq!(skills[1]["use"], "Resist fatigue");

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
