//! Culture upbringings (academic, creative, martial, ...).
//!
//! Upbringings name specific skills more often than environments do,
//! so three sentence shapes are tried before the shared group
//! patterns: a "One of the following:" list, a run of "The X skill"
//! names ending in a group, and a "The X or Y skill, or one skill
//! from the Z group" pair.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::{culture, CategoryParser};

static OPTION_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,]|\s+or\s+").expect("valid regex"));

static SKILL_FROM_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s+from\s+the").expect("valid regex")
});

static SKILLS_THEN_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"The\s+\w+\s+skill.*?or\s+a\s+skill\s+from\s+the\s+\w+\s+group")
        .expect("valid regex")
});

static NAMED_SKILL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[Tt]he\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s+skill").expect("valid regex")
});

static GROUP_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"or\s+a\s+skill\s+from\s+the\s+(\w+)\s+group").expect("valid regex"));

static PAIR_THEN_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"The\s+([A-Z][a-z]+)\s+or\s+([A-Z][a-z]+)\s+skill.*?or\s+one\s+skill\s+from\s+the\s+(\w+)\s+group")
        .expect("valid regex")
});

pub struct UpbringingsParser;

impl CategoryParser for UpbringingsParser {
    fn category(&self) -> Category {
        Category::Upbringings
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut upbringings = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Cultures/Upbringing"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            upbringings.push(culture::parse_culture_aspect(&doc, upbringing_choice));
        }
        Ok(Value::Array(upbringings))
    }
}

fn upbringing_choice(skill_text: &str) -> Option<Value> {
    specific_choice(skill_text).or_else(|| culture::group_choice(skill_text))
}

fn specific_choice(text: &str) -> Option<Value> {
    // "One of the following: X from the A group; Y from the B group"
    if text.contains("One of the following:") {
        let mut skills = BTreeSet::new();
        for segment in option_segments(text) {
            if let Some(caps) = SKILL_FROM_GROUP_RE.captures(segment) {
                skills.insert(caps[1].to_string());
            }
        }
        if skills.is_empty() {
            return None;
        }
        return Some(json!({
            "number": 1,
            "specific_skills": skills.iter().collect::<Vec<_>>(),
            "type": "specific_list",
        }));
    }

    // "The X skill, the Y skill, or a skill from the Z group"
    if SKILLS_THEN_GROUP_RE.is_match(text) {
        let names: Vec<String> = NAMED_SKILL_RE
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .collect();
        let group = GROUP_TAIL_RE.captures(text).map(|caps| caps[1].to_string());
        if names.is_empty() && group.is_none() {
            return None;
        }
        let mut options = Vec::new();
        if !names.is_empty() {
            options.push(json!({ "type": "specific", "names": names }));
        }
        if let Some(group) = group {
            options.push(json!({ "type": "from_group", "group": group }));
        }
        return Some(json!({ "number": 1, "options": options }));
    }

    // "The X or Y skill, or one skill from the Z group"
    if text.contains(" or one skill from the ") {
        return PAIR_THEN_GROUP_RE.captures(text).map(|caps| {
            json!({
                "number": 1,
                "options": [
                    { "type": "specific", "names": [&caps[1], &caps[2]] },
                    { "type": "from_group", "group": &caps[3] },
                ],
            })
        });
    }

    None
}

/// Splits an option list on `;`, `,`, and the word "or", keeping
/// "or" joins that do not introduce a capitalized skill name.
fn option_segments(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut last = 0;
    for m in OPTION_SPLIT_RE.find_iter(text) {
        let is_or = m.as_str() != ";" && m.as_str() != ",";
        if is_or && !text[m.end()..].starts_with(|c: char| c.is_ascii_uppercase()) {
            continue;
        }
        segments.push(&text[last..m.start()]);
        last = m.end();
    }
    segments.push(&text[last..]);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn following_list_collects_sorted_unique_skills() {
        let choice = specific_choice(
            "One of the following: Blacksmithing or Carpentry from the crafting group; Endurance from the exploration group",
        )
        .unwrap();
        assert_eq!(
            choice,
            json!({
                "number": 1,
                "specific_skills": ["Carpentry", "Endurance"],
                "type": "specific_list",
            })
        );
    }

    #[test]
    fn named_skills_with_group_tail_become_options() {
        let choice = specific_choice(
            "The Blacksmithing skill, the Handle Animals skill, or a skill from the exploration group",
        )
        .unwrap();
        assert_eq!(
            choice,
            json!({
                "number": 1,
                "options": [
                    { "type": "specific", "names": ["Blacksmithing", "Handle Animals"] },
                    { "type": "from_group", "group": "exploration" },
                ],
            })
        );
    }

    #[test]
    fn skill_pair_with_group_alternative() {
        let choice =
            specific_choice("The Music or Perform skill, or one skill from the crafting group")
                .unwrap();
        assert_eq!(
            choice["options"],
            json!([
                { "type": "specific", "names": ["Music", "Perform"] },
                { "type": "from_group", "group": "crafting" },
            ])
        );
    }

    #[test]
    fn plain_group_sentences_fall_back_to_shared_patterns() {
        assert_eq!(
            upbringing_choice("Two skills from the interpersonal skill group"),
            Some(json!({
                "number": 2,
                "group": { "names": ["interpersonal"], "type": "from" },
            }))
        );
    }

    #[test]
    fn upbringing_documents_parse_end_to_end() {
        let tmp = std::env::temp_dir().join(format!("rulesforge-test-{}", uuid::Uuid::now_v7()));
        let dir = tmp.join("Cultures").join("Upbringing");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Creative.md"),
            "---\nitem_id: creative\nitem_name: Creative\nculture_benefit_type: skill\n---\n\n\
##### Creative\n\n\
Raised among artists and performers.\n\n\
**Skill Options:** The Music or Perform skill, or one skill from the crafting group (*Quick Build:* Music.)\n",
        )
        .unwrap();

        let value = UpbringingsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let upbringing = &value.as_array().unwrap()[0];
        assert_eq!(upbringing["item_name"], "Creative");
        assert_eq!(upbringing["description"], "Raised among artists and performers.");
        assert_eq!(upbringing["skill_options"]["quick_build"], "Music");
        assert_eq!(
            upbringing["skill_options"]["choice"]["options"][0]["names"],
            json!(["Music", "Perform"])
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
