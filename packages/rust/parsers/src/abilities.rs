//! Abilities: power rolls, effects, costs, and targeting.
//!
//! Ability documents live in per-class subdirectories and carry most of
//! their identity in frontmatter. The body contributes the flavor line,
//! the targeting table, the tiered power roll, and the effect sections
//! around it. An effect can sit before the roll, after it, or stand
//! alone, and the record keeps a `component_order` so consumers can
//! reassemble the sections as the source laid them out.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use rulesforge_document::text::take_until;
use rulesforge_document::{
    distance_field, parse_damage_clause, parse_stat_block, target_field, Document,
};
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::{is_truthy, CategoryParser};

static BASE_ID_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d+-\w+$").expect("valid regex"));

static FLAVOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#+ .+?\n\n\*(.+?)\*").expect("valid regex"));

static POWER_ROLL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Power Roll \+ ([^:]+):\*\*").expect("valid regex"));

static CONDITIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\*\*Effect:\*\*\s*([^.]+)\.\s*(?:If you target an enemy|Otherwise),?\s*you make a power roll",
    )
    .expect("valid regex")
});

static NEXT_BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\*\*[^*]+\*\*").expect("valid regex"));

static TIER_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:>\s*)?-\s*\*\*([^:]+):\*\*").expect("valid regex"));

static TIER_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:>\s*)?-\s*\*\*|\n\*\*").expect("valid regex"));

static DAMAGE_SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9dD\s+\-*/A-Za-z()]+?)(?:\s+([a-zA-Z]+(?:\s+[a-zA-Z]+)*))?\s+damage")
        .expect("valid regex")
});

static PERSISTENT_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Persistent (\d+):\*\*\s*").expect("valid regex"));

static TRIGGER_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Trigger:\*\*\s*").expect("valid regex"));

static BOLD_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n\*\*|\n\*\*").expect("valid regex"));

static BEFORE_ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*🎯[^*]+\*\*|\*\*Trigger:\*\*[^\n]+").expect("valid regex"));

static EFFECT_PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n\*\*Effect:\*\*\s*").expect("valid regex"));

static BEFORE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n\*\*Power Roll").expect("valid regex"));

static AFTER_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\*\*Power Roll.+?\n(?:- \*\*[^*]+\*\*[^*]*\n)+.*?\n\n\*\*Effect:\*\*\s*")
        .expect("valid regex")
});

static SOLO_EFFECT_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Effect:\*\*\s*").expect("valid regex"));

static SOLO_EFFECT_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n#{5,6}").expect("valid regex"));

static MARK_BENEFIT_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Mark Benefit:\*\*\s*").expect("valid regex"));

static STRAINED_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Strained:\*\*\s*").expect("valid regex"));

static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\n").expect("valid regex"));

static TRIGGER_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Trigger:\*\*").expect("valid regex"));

static EFFECT_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Effect:\*\*").expect("valid regex"));

static POWER_ROLL_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Power Roll").expect("valid regex"));

static MARK_BENEFIT_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Mark Benefit:\*\*").expect("valid regex"));

static STRAINED_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Strained:\*\*").expect("valid regex"));

static PERSISTENT_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Persistent").expect("valid regex"));

static SPEND_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Spend").expect("valid regex"));

pub struct AbilitiesParser;

impl CategoryParser for AbilitiesParser {
    fn category(&self) -> Category {
        Category::Abilities
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut abilities = Vec::new();
        for path in ctx.markdown_files_recursive(&ctx.rules_path("Abilities"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            abilities.push(parse_ability(&doc));
        }

        abilities.sort_by(|a, b| {
            let key = |v: &Value| {
                (
                    v["class"].as_str().unwrap_or("").to_string(),
                    v["level"].as_i64().unwrap_or(0),
                    v["item_name"].as_str().unwrap_or("").to_string(),
                )
            };
            key(a).cmp(&key(b))
        });

        Ok(Value::Array(abilities))
    }
}

fn parse_ability(doc: &Document) -> Value {
    let body = &doc.body;

    let flavor = FLAVOR_RE
        .captures(body)
        .map_or_else(|| doc.field_nullable("flavor"), |caps| {
            Value::String(caps[1].trim().to_string())
        });

    let power_roll = parse_power_roll(body);
    let targeting = parse_targeting(body);
    let effects = parse_effect_sections(body, power_roll.is_some());
    let persistent = parse_persistent(body);
    let stat_block = parse_stat_block(body);

    let item_id = doc.field_nullable("item_id");
    let base_id = match item_id.as_str() {
        Some(id) => Value::String(BASE_ID_SUFFIX_RE.replace(id, "").to_string()),
        None => item_id.clone(),
    };

    let mut record = Map::new();
    record.insert("item_id".to_string(), item_id);
    record.insert("base_id".to_string(), base_id);
    record.insert("item_name".to_string(), doc.field_nullable("item_name"));
    record.insert("item_index".to_string(), doc.field_nullable("item_index"));
    record.insert(
        "source".to_string(),
        doc.frontmatter
            .get("source")
            .cloned()
            .unwrap_or_else(|| Value::String("mcdm.heroes.v1".to_string())),
    );
    record.insert(
        "type".to_string(),
        doc.frontmatter
            .get("type")
            .cloned()
            .unwrap_or_else(|| Value::String("ability".to_string())),
    );
    record.insert("class".to_string(), doc.field_nullable("class"));
    record.insert("level".to_string(), doc.field_nullable("level"));
    record.insert("ability_type".to_string(), doc.field_nullable("ability_type"));
    record.insert("feature_type".to_string(), doc.field_nullable("feature_type"));

    let action_type = doc.field_nullable("action_type");
    let keywords = doc
        .frontmatter
        .get("keywords")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    if is_truthy(&action_type) || is_truthy(&keywords) {
        record.insert("action".to_string(), json!({"type": action_type, "keywords": keywords}));
    }

    let cost_amount = doc.field_nullable("cost_amount");
    let cost_resource = doc.field_nullable("cost_resource");
    let cost = if is_truthy(&cost_amount) && is_truthy(&cost_resource) {
        json!({"amount": cost_amount, "resource": cost_resource})
    } else {
        Value::Null
    };
    let has_cost = !cost.is_null();
    record.insert("cost".to_string(), cost);

    record.insert("targeting".to_string(), targeting);
    record.insert("flavor".to_string(), flavor);
    record.insert("power_roll".to_string(), power_roll.clone().unwrap_or(Value::Null));
    record.insert(
        "effects".to_string(),
        effects.clone().map_or(Value::Null, Value::Object),
    );
    record.insert(
        "persistent".to_string(),
        persistent.clone().unwrap_or(Value::Null),
    );

    let components =
        component_order(body, effects.as_ref(), power_roll.is_some(), persistent.is_some(), has_cost);
    if !components.is_empty() {
        record.insert(
            "component_order".to_string(),
            Value::Array(components.into_iter().map(|c| Value::String(c.to_string())).collect()),
        );
    }

    if let Some(stat_block) = stat_block {
        if let Ok(value) = serde_json::to_value(&stat_block) {
            record.insert("stat_block".to_string(), value);
        }
    }
    if let Some(subclass) = doc.frontmatter.get("subclass") {
        record.insert("subclass".to_string(), subclass.clone());
    }

    Value::Object(record)
}

fn parse_targeting(body: &str) -> Value {
    let distance = distance_field(body);
    let target = target_field(body);
    if distance.is_none() && target.is_none() {
        return Value::Null;
    }
    json!({
        "distance": distance,
        "target": target,
    })
}

fn parse_power_roll(body: &str) -> Option<Value> {
    let caps = POWER_ROLL_RE.captures(body)?;
    let characteristic = caps[1].trim().to_string();
    let conditional = CONDITIONAL_RE
        .captures(body)
        .map_or(Value::Null, |caps| Value::String(caps[1].to_string()));

    let start = caps.get(0).expect("whole match").end();
    let content = take_until(&body[start..], &NEXT_BOLD_RE).trim();

    let heads: Vec<(String, usize, usize)> = TIER_HEAD_RE
        .captures_iter(content)
        .map(|caps| {
            let whole = caps.get(0).expect("whole match");
            (caps[1].trim().to_string(), whole.start(), whole.end())
        })
        .collect();

    let mut tiers = Vec::new();
    for (i, (range_text, _, body_start)) in heads.iter().enumerate() {
        let limit = heads.get(i + 1).map_or(content.len(), |next| next.1);
        let result_text = take_until(&content[*body_start..limit], &TIER_END_RE).trim();

        let tier = if range_text.contains("≤11") || range_text.contains("11-") {
            "weak"
        } else if range_text.contains("12-16") || range_text.contains("12–16") {
            "average"
        } else if range_text.contains("17+") || range_text.contains("17–") {
            "strong"
        } else {
            "unknown"
        };

        let mut damage = Value::Null;
        let mut effects = Vec::new();
        for part in result_text.split(';') {
            let part = part.trim();
            if part.to_lowercase().contains("damage") {
                // A part that mentions damage without a recognizable
                // formula shape is dropped rather than kept as prose.
                if DAMAGE_SHAPE_RE.is_match(part) {
                    if let Some(clause) = parse_damage_clause(part) {
                        let mut parsed = Map::new();
                        parsed.insert("formula".to_string(), Value::String(clause.formula.clone()));
                        parsed.insert(
                            "type".to_string(),
                            clause.damage_type.clone().map_or(Value::Null, Value::String),
                        );
                        if let Some(characteristics) = &clause.characteristics {
                            parsed.insert("characteristics".to_string(), json!(characteristics));
                        }
                        damage = Value::Object(parsed);
                    } else {
                        effects.push(Value::String(part.to_string()));
                    }
                }
            } else if !part.is_empty() {
                effects.push(Value::String(part.to_string()));
            }
        }

        tiers.push(json!({
            "tier": tier,
            "range": range_text,
            "damage": damage,
            "effects": effects,
        }));
    }

    if tiers.is_empty() {
        return None;
    }
    Some(json!({
        "characteristic": characteristic,
        "conditional": conditional,
        "tiers": tiers,
    }))
}

fn parse_persistent(body: &str) -> Option<Value> {
    let caps = PERSISTENT_HEAD_RE.captures(body)?;
    let turns: i64 = caps[1].parse().ok()?;
    let rest = &body[caps.get(0).expect("whole match").end()..];
    let description = take_until(rest, &PARAGRAPH_RE).trim().to_string();
    Some(json!({"turns": turns, "description": description}))
}

/// Effect sections keyed by where they sit relative to the power roll:
/// `before`/`after` around a roll, plain `effect` otherwise, plus
/// `trigger`, `mark_benefit`, and `strained` when present.
fn parse_effect_sections(body: &str, has_power_roll: bool) -> Option<Map<String, Value>> {
    let mut effects = Map::new();

    if let Some(m) = TRIGGER_HEAD_RE.find(body) {
        let text = take_until(&body[m.end()..], &BOLD_BREAK_RE).trim();
        effects.insert("trigger".to_string(), Value::String(text.to_string()));
    }

    if has_power_roll {
        let mut before: Option<String> = None;
        'anchors: for anchor in BEFORE_ANCHOR_RE.find_iter(body) {
            let rest = &body[anchor.end()..];
            for head in EFFECT_PARAGRAPH_RE.find_iter(rest) {
                let tail = &rest[head.end()..];
                if let Some(end) =
                    BEFORE_END_RE.find_iter(tail).map(|m| m.start()).find(|&s| s >= 1)
                {
                    before = Some(tail[..end].trim().to_string());
                    break 'anchors;
                }
            }
        }

        let after = AFTER_HEAD_RE
            .find(body)
            .map(|m| take_until(&body[m.end()..], &PARAGRAPH_RE).trim().to_string());

        match (before, after) {
            (Some(before), Some(after)) => {
                effects.insert("before".to_string(), Value::String(before));
                effects.insert("after".to_string(), Value::String(after));
            }
            (Some(before), None) => {
                effects.insert("effect".to_string(), Value::String(before));
            }
            (None, Some(after)) => {
                effects.insert("effect".to_string(), Value::String(after));
            }
            (None, None) => {}
        }
    } else if let Some(m) = SOLO_EFFECT_HEAD_RE.find(body) {
        let text = take_until(&body[m.end()..], &SOLO_EFFECT_END_RE).trim();
        effects.insert("effect".to_string(), Value::String(text.to_string()));
    }

    if let Some(m) = MARK_BENEFIT_HEAD_RE.find(body) {
        let text = take_until(&body[m.end()..], &PARAGRAPH_RE).trim();
        effects.insert("mark_benefit".to_string(), Value::String(text.to_string()));
    }
    if let Some(m) = STRAINED_HEAD_RE.find(body) {
        let text = take_until(&body[m.end()..], &BOLD_BREAK_RE).trim();
        effects.insert("strained".to_string(), Value::String(text.to_string()));
    }

    (!effects.is_empty()).then_some(effects)
}

/// Section order as the headings appear in the body. At most one of
/// `before`/`after`/`effect` is listed for the first `**Effect:**`
/// heading found.
fn component_order(
    body: &str,
    effects: Option<&Map<String, Value>>,
    has_power_roll: bool,
    has_persistent: bool,
    has_cost: bool,
) -> Vec<&'static str> {
    let markers: [(&'static str, &Regex); 7] = [
        ("trigger", &TRIGGER_MARK_RE),
        ("effect", &EFFECT_MARK_RE),
        ("power_roll", &POWER_ROLL_MARK_RE),
        ("mark_benefit", &MARK_BENEFIT_MARK_RE),
        ("strained", &STRAINED_MARK_RE),
        ("persistent", &PERSISTENT_MARK_RE),
        ("cost_options", &SPEND_MARK_RE),
    ];
    let mut positions: Vec<(&'static str, usize)> = markers
        .iter()
        .filter_map(|(name, re)| re.find(body).map(|m| (*name, m.start())))
        .collect();
    positions.sort_by_key(|(_, pos)| *pos);

    let has = |key: &str| effects.is_some_and(|map| map.contains_key(key));
    let mut components: Vec<&'static str> = Vec::new();
    for (name, _) in positions {
        match name {
            "trigger" if has("trigger") && !components.contains(&"trigger") => {
                components.push("trigger")
            }
            "effect" if effects.is_some() => {
                if has("before") && !components.contains(&"before") {
                    components.push("before");
                } else if has("after") && !components.contains(&"after") {
                    components.push("after");
                } else if has("effect") && !components.contains(&"effect") {
                    components.push("effect");
                }
            }
            "power_roll" if has_power_roll && !components.contains(&"power_roll") => {
                components.push("power_roll")
            }
            "mark_benefit" if has("mark_benefit") && !components.contains(&"mark_benefit") => {
                components.push("mark_benefit")
            }
            "strained" if has("strained") && !components.contains(&"strained") => {
                components.push("strained")
            }
            "persistent" if has_persistent && !components.contains(&"persistent") => {
                components.push("persistent")
            }
            "cost_options" if has_cost && !components.contains(&"cost") => components.push("cost"),
            _ => {}
        }
    }

    if components.is_empty() {
        if has("trigger") {
            components.push("trigger");
        }
        if has("before") {
            components.push("before");
        }
        if has_power_roll {
            components.push("power_roll");
        }
        if has("after") {
            components.push("after");
        }
        if has("mark_benefit") {
            components.push("mark_benefit");
        }
        if has_persistent {
            components.push("persistent");
        }
        if has("effect") {
            components.push("effect");
        }
    }
    components
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

    fn write_ability(tmp: &PathBuf, rel: &str, content: &str) {
        let path = tmp.join("Abilities").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    const BRUTAL_SLAM: &str = "\
---\n\
item_id: brutal-slam\n\
item_name: Brutal Slam\n\
item_index: '01'\n\
class: Fury\n\
level: 1\n\
ability_type: Signature\n\
action_type: Main action\n\
keywords:\n\
  - Melee\n\
  - Strike\n\
cost_amount: 3\n\
cost_resource: Rage\n\
---\n\n\
### Brutal Slam\n\n\
*The direct approach is best.*\n\n\
| **Melee, Strike** | **Main action** |\n\
| ----------------- | --------------: |\n\
| **📏 Melee 1** | **🎯 One creature** |\n\n\
**Effect:** Before rolling, you may shove.\n\n\
**Power Roll + Might:**\n\n\
- **≤11:** 3 + M damage\n\
- **12-16:** 6 + M damage; push 2\n\
- **17+:** 9 + M damage; push 4\n\n\
**Effect:** The target is taunted until the end of your next turn.\n\n\
**Persistent 1:** You gain an edge on the next strike.\n";

    const COVER_FIRE: &str = "\
---\n\
item_id: cover-fire-3-focus\n\
item_name: Cover Fire\n\
class: Shadow\n\
level: 2\n\
action_type: Triggered action\n\
keywords:\n\
  - Ranged\n\
cost_amount: 3\n\
cost_resource: Focus\n\
subclass: College of Black Ash\n\
---\n\n\
#### Cover Fire\n\n\
*You answer an enemy shot.*\n\n\
| **Ranged** | **Triggered action** |\n\
| ---------- | -------------------: |\n\
| **📏 Ranged 5** | **🎯 Self or one ally** |\n\n\
**Trigger:** A creature targets you or an ally with a ranged strike.\n\n\
**Effect:** The damage is halved.\n";

    const KNIFE_DANCE: &str = "\
---\n\
item_id: knife-dance\n\
item_name: Knife Dance\n\
class: Fury\n\
level: 2\n\
---\n\n\
#### Knife Dance\n\n\
*Blades whirl around you.*\n\n\
**Effect:** You ready your knives. If you target an enemy, you make a power roll.\n\n\
**Power Roll + Agility:**\n\n\
- **≤11:** 2 damage\n\
- **12-16:** 5 damage\n\
- **17+:** 7 damage\n";

    #[test]
    fn signature_abilities_split_into_components() {
        let tmp = temp_dir();
        write_ability(&tmp, "Fury/Brutal Slam.md", BRUTAL_SLAM);

        let value = AbilitiesParser.parse(&ParseContext::new(&tmp)).unwrap();
        let ability = &value.as_array().unwrap()[0];
        assert_eq!(ability["item_id"], "brutal-slam");
        assert_eq!(ability["base_id"], "brutal-slam");
        assert_eq!(ability["source"], "mcdm.heroes.v1");
        assert_eq!(ability["type"], "ability");
        assert_eq!(ability["ability_type"], "Signature");
        assert_eq!(ability["action"], json!({"type": "Main action", "keywords": ["Melee", "Strike"]}));
        assert_eq!(ability["cost"], json!({"amount": 3, "resource": "Rage"}));
        assert_eq!(ability["targeting"], json!({"distance": "Melee 1", "target": "One creature"}));
        assert_eq!(ability["flavor"], "The direct approach is best.");

        let power_roll = &ability["power_roll"];
        assert_eq!(power_roll["characteristic"], "Might");
        assert_eq!(power_roll["conditional"], Value::Null);
        let tiers = power_roll["tiers"].as_array().unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0]["tier"], "weak");
        assert_eq!(tiers[0]["damage"], json!({"formula": "3 +", "type": "m"}));
        assert_eq!(tiers[1]["effects"], json!(["push 2"]));

        assert_eq!(ability["effects"]["before"], "Before rolling, you may shove.");
        assert_eq!(
            ability["effects"]["after"],
            "The target is taunted until the end of your next turn."
        );
        assert_eq!(
            ability["persistent"],
            json!({"turns": 1, "description": "You gain an edge on the next strike."})
        );
        assert_eq!(ability["component_order"], json!(["before", "power_roll", "persistent"]));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn triggered_abilities_keep_trigger_and_effect() {
        let tmp = temp_dir();
        write_ability(&tmp, "Shadow/Cover Fire.md", COVER_FIRE);

        let value = AbilitiesParser.parse(&ParseContext::new(&tmp)).unwrap();
        let ability = &value.as_array().unwrap()[0];
        assert_eq!(ability["item_id"], "cover-fire-3-focus");
        assert_eq!(ability["base_id"], "cover-fire");
        assert_eq!(ability["subclass"], "College of Black Ash");
        assert_eq!(ability["power_roll"], Value::Null);
        assert_eq!(
            ability["effects"]["trigger"],
            "A creature targets you or an ally with a ranged strike."
        );
        assert_eq!(ability["effects"]["effect"], "The damage is halved.");
        assert_eq!(ability["component_order"], json!(["trigger", "effect"]));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn abilities_sort_by_class_level_and_name() {
        let tmp = temp_dir();
        write_ability(&tmp, "Shadow/Cover Fire.md", COVER_FIRE);
        write_ability(&tmp, "Fury/Brutal Slam.md", BRUTAL_SLAM);
        write_ability(&tmp, "Fury/Knife Dance.md", KNIFE_DANCE);
        write_ability(&tmp, "Fury/Notes.md", "## Notes\n\nLoose commentary without a header.\n");

        let value = AbilitiesParser.parse(&ParseContext::new(&tmp)).unwrap();
        let names: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["item_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Brutal Slam", "Knife Dance", "Cover Fire"]);

        let knife_dance = &value.as_array().unwrap()[1];
        assert_eq!(knife_dance["power_roll"]["conditional"], "You ready your knives");
        assert_eq!(knife_dance["power_roll"]["tiers"][0]["damage"], json!({"formula": "2", "type": null}));
        assert_eq!(knife_dance["effects"], Value::Null);
        assert_eq!(knife_dance["component_order"], json!(["power_roll"]));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
