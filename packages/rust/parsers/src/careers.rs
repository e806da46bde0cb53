//! Careers, the pre-heroic occupations that grant skills, renown, and
//! an inciting incident table.
//!
//! The benefits line format is prose rather than tabular, so skill
//! grants are recovered from sentence patterns: "The X skill (from
//! the Y group)", "The X or Y skill", and "N skills from the Z group"
//! with an optional "(*Quick Build:* ...)" parenthetical.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use rulesforge_document::text::word_to_number;
use rulesforge_document::strip_markdown_links;
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

const BENEFITS_MARKER: &str = "You gain the following career benefits:";

static LEADING_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,4}\s+[^\n]+\n+").expect("valid regex"));

static QUICK_BUILD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\*Quick Build:\*\s*([^)]+)\)").expect("valid regex"));

static QUICK_BUILD_STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\*Quick Build:\*[^)]+\)").expect("valid regex"));

static GIVEN_OR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[Tt]he\s+([A-Z][A-Za-z\s]+?)\s+or\s+([A-Z][A-Za-z\s]+?)\s+skill")
        .expect("valid regex")
});

static THE_SKILL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[Tt]he\s+([A-Z][A-Za-z\s]+?)\s+skill\s+(?:\(|from)").expect("valid regex")
});

static STANDALONE_SKILL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|,\s+)([A-Z][A-Za-z\s]+?)\s+\(from\s+the").expect("valid regex"));

static EITHER_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(one|two|three|four|\d+)\s+(?:skill|skills)\s+from\s+either\s+the\s+(\w+)\s+group\s+or\s+the\s+(\w+)\s+group",
    )
    .expect("valid regex")
});

static CHOICE_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(one|two|three|four|\d+)\s+(?:more\s+)?(?:skill|skills|other\s+skills?)\s+from\s+the\s+(\w+)(?:\s+skill)?\s+(?:skill\s+)?group",
    )
    .expect("valid regex")
});

static SKILLS_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Skills:\*\*\s*([^\n]+)").expect("valid regex"));

static LANGUAGES_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Languages:\*\*\s*([^\n]+)").expect("valid regex"));

static PROJECT_POINTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Project Points:\*\*\s*(\d+)").expect("valid regex"));

static RENOWN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Renown:\*\*\s*([+\-]?\d+)").expect("valid regex"));

static WEALTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Wealth:\*\*\s*([+\-]?\d+)").expect("valid regex"));

static PERK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Perk:\*\*\s*([^\n]+)").expect("valid regex"));

static PERK_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(one|two|three|four|1|2|3|4)\b").expect("valid regex"));

static PERK_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\w+)\s+perks?").expect("valid regex"));

static INCIDENTS_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\| d6\s+\| Inciting Incident.*?\n\| ---.*?\n((?:\| \d+\s+\|.*?\n)+)")
        .expect("valid regex")
});

static INCIDENT_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\|\s*(\d+)\s+\|\s*\*\*([^:*]+):\*\*\s*(.*?)\s*\|").expect("valid regex")
});

pub struct CareersParser;

impl CategoryParser for CareersParser {
    fn category(&self) -> Category {
        Category::Careers
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut careers = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Careers"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            let body = LEADING_HEADING_RE.replace(doc.body.trim_start(), "");

            let (description, benefits, incidents) = match body.split_once(BENEFITS_MARKER) {
                Some((before, after)) => (
                    strip_markdown_links(before.trim()),
                    parse_benefits(after),
                    parse_inciting_incidents(after),
                ),
                None => (String::new(), Map::new(), Vec::new()),
            };

            let mut career = Map::new();
            career.insert("item_id".to_string(), doc.field_value("item_id"));
            career.insert("item_name".to_string(), doc.field_value("item_name"));
            career.insert("item_index".to_string(), doc.field_value("item_index"));
            career.insert("source".to_string(), doc.field_value("source"));
            career.insert("description".to_string(), Value::String(description));
            career.insert("benefits".to_string(), Value::Object(benefits));
            career.insert("inciting_incidents".to_string(), Value::Array(incidents));
            careers.push(Value::Object(career));
        }
        Ok(Value::Array(careers))
    }
}

fn parse_quick_build(text: &str) -> Option<Vec<String>> {
    QUICK_BUILD_RE.captures(text).map(|caps| {
        caps[1]
            .split(',')
            .map(|item| item.trim().trim_end_matches('.').to_string())
            .collect()
    })
}

/// Splits a skills line into given skills, group choices, and the
/// quick-build picks.
fn parse_skill_grants(skills_text: &str) -> (Vec<Value>, Vec<Value>, Option<Vec<String>>) {
    let quick_build = parse_quick_build(skills_text);
    let mut clean = QUICK_BUILD_STRIP_RE
        .replace_all(skills_text, "")
        .trim()
        .to_string();

    let mut given = Vec::new();

    // "The Music or Perform skill" grants a pick between two named
    // skills. Cut the sentence out so the singular pattern below does
    // not see it again.
    if let Some(caps) = GIVEN_OR_RE.captures(&clean) {
        let range = caps.get(0).expect("whole match").range();
        let first = caps[1].trim().to_string();
        let second = caps[2].trim().to_string();
        given.push(json!({ "names": [first, second], "type": "or" }));
        clean.replace_range(range, "");
    }

    // Named grants come as "The X skill (from ..." or, in a few
    // careers, as a bare "X (from the ..." list.
    let named: Vec<String> = THE_SKILL_RE
        .captures_iter(&clean)
        .map(|caps| caps[1].trim().to_string())
        .collect();
    if !named.is_empty() {
        for skill in named {
            if !grants_name(&given, &skill) {
                given.push(json!({ "names": [skill], "type": "standard" }));
            }
        }
    } else {
        for caps in STANDALONE_SKILL_RE.captures_iter(&clean) {
            let skill = caps[1].trim().to_string();
            if !grants_name(&given, &skill) {
                given.push(json!({ "names": [skill], "type": "standard" }));
            }
        }
    }

    let mut choices = Vec::new();
    for caps in EITHER_GROUP_RE.captures_iter(&clean) {
        choices.push(json!({
            "number": word_to_number(&caps[1]).unwrap_or(1),
            "group": { "names": [&caps[2], &caps[3]], "type": "or" },
        }));
    }
    for caps in CHOICE_GROUP_RE.captures_iter(&clean) {
        choices.push(json!({
            "number": word_to_number(&caps[1]).unwrap_or(1),
            "group": { "names": [&caps[2]], "type": "from" },
        }));
    }

    (given, choices, quick_build)
}

fn grants_name(given: &[Value], name: &str) -> bool {
    given.iter().any(|grant| {
        grant["names"]
            .as_array()
            .is_some_and(|names| names.iter().any(|n| n == name))
    })
}

fn parse_benefits(content: &str) -> Map<String, Value> {
    let mut benefits = Map::new();
    benefits.insert("skills".to_string(), Value::Null);
    benefits.insert("languages".to_string(), Value::Null);
    benefits.insert("project_points".to_string(), Value::Null);
    benefits.insert("renown".to_string(), Value::Null);
    benefits.insert("wealth".to_string(), Value::Null);
    benefits.insert("perk".to_string(), Value::Null);

    if let Some(caps) = SKILLS_LINE_RE.captures(content) {
        let skills_text = &caps[1];
        let (given, choices, quick_build) = parse_skill_grants(skills_text);
        let description = QUICK_BUILD_STRIP_RE
            .replace_all(skills_text, "")
            .trim()
            .to_string();
        benefits.insert(
            "skills".to_string(),
            json!({
                "description": description,
                "given": if given.is_empty() { Value::Null } else { Value::Array(given) },
                "choice": if choices.is_empty() { Value::Null } else { Value::Array(choices) },
                "quick_build": quick_build,
            }),
        );
    }

    if let Some(caps) = LANGUAGES_LINE_RE.captures(content) {
        let lang_text = caps[1].trim().to_lowercase();
        for (word, count) in [("one", 1), ("two", 2), ("three", 3), ("four", 4)] {
            if lang_text.contains(word) {
                benefits.insert("languages".to_string(), json!({ "count": count }));
                break;
            }
        }
    }

    if let Some(caps) = PROJECT_POINTS_RE.captures(content) {
        if let Ok(points) = caps[1].parse::<i64>() {
            benefits.insert("project_points".to_string(), json!(points));
        }
    }
    if let Some(caps) = RENOWN_RE.captures(content) {
        if let Ok(renown) = caps[1].parse::<i64>() {
            benefits.insert("renown".to_string(), json!(renown));
        }
    }
    if let Some(caps) = WEALTH_RE.captures(content) {
        if let Ok(wealth) = caps[1].parse::<i64>() {
            benefits.insert("wealth".to_string(), json!(wealth));
        }
    }

    if let Some(caps) = PERK_LINE_RE.captures(content) {
        let perk_text = &caps[1];
        let quick_build = parse_quick_build(perk_text);
        let description = QUICK_BUILD_STRIP_RE
            .replace_all(perk_text, "")
            .trim()
            .to_string();
        let lowered = description.to_lowercase();
        let number = PERK_NUMBER_RE
            .captures(&lowered)
            .and_then(|caps| word_to_number(&caps[1]));
        let perk_type = PERK_TYPE_RE.captures(&lowered).map(|caps| caps[1].to_string());
        benefits.insert(
            "perk".to_string(),
            json!({
                "number": number,
                "type": perk_type,
                "description": description,
                "quick_build": quick_build.and_then(|items| items.into_iter().next()),
            }),
        );
    }

    benefits
}

fn parse_inciting_incidents(content: &str) -> Vec<Value> {
    let Some(caps) = INCIDENTS_TABLE_RE.captures(content) else {
        return Vec::new();
    };
    INCIDENT_ROW_RE
        .captures_iter(&caps[1])
        .map(|row| {
            json!({
                "roll": row[1].trim(),
                "title": row[2].trim(),
                "description": strip_markdown_links(row[3].trim()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const GLADIATOR: &str = "\
---\nitem_id: gladiator\nitem_name: Gladiator\nitem_index: \"06\"\nsource: mcdm.heroes.v1\n---\n\n\
#### Gladiator\n\n\
You fought in arenas for the crowd's favor.\n\n\
You gain the following career benefits:\n\n\
- **Skills:** The Alertness skill (from the intrigue skill group) and two skills from either the exploration group or the interpersonal group (*Quick Build:* Jump, Lead)\n\
- **Languages:** One language\n\
- **Renown:** 2\n\
- **Project Points:** 100\n\
- **Perk:** One interpersonal perk (*Quick Build:* Harmonizer)\n\n\
###### Gladiator Inciting Incidents\n\n\
| d6  | Inciting Incident |\n\
| --- | ----------------- |\n\
| 1   | **Betrayed:** Your patron sold [your contract](../Downtime.md) to a rival. |\n\
| 2   | **Freedom:** You won your freedom and now fight for others. |\n";

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulesforge-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn write_career(tmp: &PathBuf, name: &str, content: &str) {
        let dir = tmp.join("Careers");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn benefits_line_items_become_structured_fields() {
        let tmp = temp_dir();
        write_career(&tmp, "Gladiator.md", GLADIATOR);

        let value = CareersParser.parse(&ParseContext::new(&tmp)).unwrap();
        let career = &value.as_array().unwrap()[0];
        assert_eq!(career["description"], "You fought in arenas for the crowd's favor.");

        let benefits = &career["benefits"];
        assert_eq!(benefits["languages"], json!({ "count": 1 }));
        assert_eq!(benefits["project_points"], 100);
        assert_eq!(benefits["renown"], 2);
        assert_eq!(benefits["wealth"], Value::Null);

        let skills = &benefits["skills"];
        assert_eq!(skills["given"], json!([{ "names": ["Alertness"], "type": "standard" }]));
        assert_eq!(
            skills["choice"],
            json!([{
                "number": 2,
                "group": { "names": ["exploration", "interpersonal"], "type": "or" },
            }])
        );
        assert_eq!(skills["quick_build"], json!(["Jump", "Lead"]));

        let perk = &benefits["perk"];
        assert_eq!(perk["number"], 1);
        assert_eq!(perk["type"], "interpersonal");
        assert_eq!(perk["description"], "One interpersonal perk");
        assert_eq!(perk["quick_build"], "Harmonizer");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn inciting_incidents_rows_carry_roll_title_and_description() {
        let tmp = temp_dir();
        write_career(&tmp, "Gladiator.md", GLADIATOR);

        let value = CareersParser.parse(&ParseContext::new(&tmp)).unwrap();
        let incidents = value[0]["inciting_incidents"].as_array().unwrap();
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0]["roll"], "1");
        assert_eq!(incidents[0]["title"], "Betrayed");
        assert_eq!(
            incidents[0]["description"],
            "Your patron sold your contract to a rival."
        );
        assert_eq!(incidents[1]["title"], "Freedom");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn either_or_skill_grant_and_more_skills_choice() {
        let tmp = temp_dir();
        write_career(
            &tmp,
            "Performer.md",
            "---\nitem_id: performer\nitem_name: Performer\n---\n\n\
#### Performer\n\n\
You entertained crowds.\n\n\
You gain the following career benefits:\n\n\
- **Skills:** The Music or Perform skill, and two more skills from the interpersonal group (*Quick Build:* Music, Flirt, Persuade)\n",
        );

        let value = CareersParser.parse(&ParseContext::new(&tmp)).unwrap();
        let skills = &value[0]["benefits"]["skills"];
        assert_eq!(
            skills["given"],
            json!([{ "names": ["Music", "Perform"], "type": "or" }])
        );
        assert_eq!(
            skills["choice"],
            json!([{ "number": 2, "group": { "names": ["interpersonal"], "type": "from" } }])
        );
        assert_eq!(skills["quick_build"], json!(["Music", "Flirt", "Persuade"]));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_benefits_marker_leaves_sections_empty() {
        let tmp = temp_dir();
        write_career(
            &tmp,
            "Drifter.md",
            "---\nitem_id: drifter\nitem_name: Drifter\n---\n\n#### Drifter\n\nYou wandered.\n",
        );

        let value = CareersParser.parse(&ParseContext::new(&tmp)).unwrap();
        assert_eq!(value[0]["description"], "");
        assert_eq!(value[0]["benefits"], json!({}));
        assert_eq!(value[0]["inciting_incidents"], json!([]));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
