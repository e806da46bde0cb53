//! Complications, optional origin twists that pair a benefit with a
//! drawback.
//!
//! Each mechanic paragraph is classified by shape: tiered test
//! outcomes, resource tracking, a choice, a conditional trigger, or
//! plain text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use rulesforge_document::text::take_until;
use rulesforge_document::strip_markdown_links;
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

static HEADING_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^####\s+.*$").expect("valid regex"));

static MECHANIC_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(?:Benefit|Drawback)").expect("valid regex"));

static BENEFIT_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*Benefit(?:\s+and\s+Drawback)?:\*\*\s*").expect("valid regex")
});

static BENEFIT_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(?:Drawback|Benefit)").expect("valid regex"));

static DRAWBACK_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Drawback:\*\*\s*").expect("valid regex"));

static DRAWBACK_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Benefit").expect("valid regex"));

static TIER_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[≤<]11:|12-16:|17\+:").expect("valid regex"));

static INTRO_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*[-•≤<]").expect("valid regex"));

static TIER_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*[-•]?\s*\*\*([≤<]11|12-16|17\+):\*\*\s*").expect("valid regex")
});

static LINE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n").expect("valid regex"));

static RESOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+\s+(?:destiny points|charges|uses)").expect("valid regex")
});

static CHOICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)choose|select|pick").expect("valid regex"));

static CONDITIONAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)whenever|when|if|while").expect("valid regex"));

pub struct ComplicationsParser;

impl CategoryParser for ComplicationsParser {
    fn category(&self) -> Category {
        Category::Complications
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut complications = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Complications"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            let cleaned = strip_markdown_links(&doc.body);
            let stripped = HEADING_LINE_RE.replace_all(&cleaned, "");
            let content = stripped.trim();

            let description = MECHANIC_MARKER_RE
                .find(content)
                .map(|m| content[..m.start()].trim().to_string())
                .unwrap_or_default();
            let benefit = BENEFIT_HEAD_RE
                .find(content)
                .and_then(|m| parse_mechanic(take_until(&content[m.end()..], &BENEFIT_END_RE)));
            let drawback = DRAWBACK_HEAD_RE
                .find(content)
                .and_then(|m| parse_mechanic(take_until(&content[m.end()..], &DRAWBACK_END_RE)));

            let mut complication = doc.frontmatter.clone();
            complication.insert("name".to_string(), doc.field_value("item_name"));
            complication.insert("description".to_string(), Value::String(description));
            complication.insert(
                "mechanics".to_string(),
                json!({ "benefit": benefit, "drawback": drawback }),
            );
            complications.push(Value::Object(complication));
        }
        Ok(Value::Array(complications))
    }
}

/// Classifies one benefit or drawback paragraph. Tiered test results
/// win over the keyword classes, which are checked in a fixed order.
fn parse_mechanic(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if TIER_MARKER_RE.is_match(text) {
        let intro = INTRO_END_RE
            .find(text)
            .map(|m| text[..m.start()].trim().to_string())
            .unwrap_or_default();
        let outcomes: Vec<Value> = TIER_HEAD_RE
            .captures_iter(text)
            .map(|caps| {
                let end = caps.get(0).expect("whole match").end();
                json!({
                    "tier": &caps[1],
                    "effect": take_until(&text[end..], &LINE_END_RE).trim(),
                })
            })
            .collect();
        if !outcomes.is_empty() {
            return Some(json!({ "type": "test", "text": intro, "outcomes": outcomes }));
        }
    }

    if RESOURCE_RE.is_match(text) {
        return Some(json!({ "type": "resource", "text": text }));
    }
    if CHOICE_RE.is_match(text) {
        return Some(json!({ "type": "choice", "text": text }));
    }
    if CONDITIONAL_RE.is_match(text) {
        return Some(json!({ "type": "conditional", "text": text }));
    }
    Some(json!({ "type": "simple", "text": text }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const CURSED_WEAPON: &str = "\
---\nitem_id: cursed-weapon\nitem_name: Cursed Weapon\nitem_index: \"03\"\nsource: mcdm.heroes.v1\n---\n\n\
#### Cursed Weapon\n\n\
You carry a [weapon](../Items.md) that whispers.\n\n\
**Benefit:** Whenever you strike, you may reroll one damage die.\n\n\
**Drawback:** Make a Presence test the first time you draw the weapon each day.\n\n\
- **≤11:** The curse takes hold.\n\
- **12-16:** You resist, but are frightened.\n\
- **17+:** You master the whispers.\n";

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulesforge-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn write_complication(tmp: &PathBuf, name: &str, content: &str) {
        let dir = tmp.join("Complications");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn benefit_and_drawback_are_classified() {
        let tmp = temp_dir();
        write_complication(&tmp, "Cursed Weapon.md", CURSED_WEAPON);

        let value = ComplicationsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let complication = &value.as_array().unwrap()[0];
        assert_eq!(complication["item_id"], "cursed-weapon");
        assert_eq!(complication["name"], "Cursed Weapon");
        assert_eq!(complication["description"], "You carry a weapon that whispers.");

        let benefit = &complication["mechanics"]["benefit"];
        assert_eq!(benefit["type"], "conditional");
        assert_eq!(benefit["text"], "Whenever you strike, you may reroll one damage die.");

        let drawback = &complication["mechanics"]["drawback"];
        assert_eq!(drawback["type"], "test");
        assert_eq!(
            drawback["text"],
            "Make a Presence test the first time you draw the weapon each day."
        );
        let outcomes = drawback["outcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0]["tier"], "≤11");
        assert_eq!(outcomes[0]["effect"], "The curse takes hold.");
        assert_eq!(outcomes[2]["tier"], "17+");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn combined_benefit_and_drawback_heading_is_accepted() {
        let tmp = temp_dir();
        write_complication(
            &tmp,
            "Lucky Coin.md",
            "---\nitem_id: lucky-coin\nitem_name: Lucky Coin\n---\n\n\
#### Lucky Coin\n\n\
A coin that always lands your way.\n\n\
**Benefit and Drawback:** You gain 3 charges of fortune. Each morning the coin demands a toll.\n",
        );

        let value = ComplicationsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let mechanics = &value[0]["mechanics"];
        assert_eq!(mechanics["benefit"]["type"], "resource");
        assert_eq!(mechanics["drawback"], Value::Null);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn plain_text_mechanics_fall_back_to_simple() {
        let tmp = temp_dir();
        write_complication(
            &tmp,
            "Marked.md",
            "---\nitem_id: marked\nitem_name: Marked\n---\n\n\
#### Marked\n\n\
A rival cabal knows your face.\n\n\
**Drawback:** Your renown among the cabal's agents starts at 2.\n",
        );

        let value = ComplicationsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let mechanics = &value[0]["mechanics"];
        assert_eq!(mechanics["benefit"], Value::Null);
        assert_eq!(mechanics["drawback"]["type"], "simple");
        assert_eq!(
            mechanics["drawback"]["text"],
            "Your renown among the cabal's agents starts at 2."
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
