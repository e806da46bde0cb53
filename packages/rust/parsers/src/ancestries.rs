//! Ancestries: lore, signature traits, and purchasable trait options.
//!
//! Each ancestry document opens with a description, an `On <Ancestry>`
//! lore section, then a traits section holding signature traits and a
//! points-costed list of purchased traits. Trait text is mined for
//! structured stat bonuses (stamina scaling, size, speed, disengage)
//! and skill grants, and embedded `######` ability blocks are parsed
//! into full ability records with power roll tiers.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use rulesforge_document::text::take_until;
use rulesforge_document::{parse_damage_clause, strip_markdown_links};
use rulesforge_shared::{Category, Result};

use crate::context::ParseContext;
use crate::CategoryParser;

static SECTION_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^###\s+").expect("valid regex"));

static LORE_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^On\s+.+?\n\n").expect("valid regex"));

static LORE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n###").expect("valid regex"));

static SIGNATURE_TRAIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:###|####)\s+Signature Trait:\s+(.+?)$").expect("valid regex")
});

static NEXT_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n#{3,5}\s+").expect("valid regex"));

static PURCHASED_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{4,5}\s+Purchased\s+.+?Traits\s*\n").expect("valid regex"));

static POINTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"You have (\d+) ancestry points?").expect("valid regex"));

static POINTS_CONDITIONAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"or (\d+) ancestry points? if (.+?)\.").expect("valid regex"));

static QUICK_BUILD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\*Quick Build:\*\s*(.+?)\)").expect("valid regex"));

static OPTION_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{5}\s+\w").expect("valid regex"));

static OPTION_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{5}\s+(.+?)\s+\((\d+)\s+Points?\)").expect("valid regex"));

static OPTION_HEADER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{5}\s+.+?\n").expect("valid regex"));

static ABILITY_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{6}").expect("valid regex"));

static CHOOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bchoose\b").expect("valid regex"));

static ACTION_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:maneuver|action|triggered action|free action)\b").expect("valid regex")
});

static ABILITY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{6}\s+(.+?)$").expect("valid regex"));

static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*").expect("valid regex"));

static TABLE_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|(.*?)\|(.*?)\|").expect("valid regex"));

static TABLE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*|📏|🎯").expect("valid regex"));

static DISTANCE_CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"📏\s*(.+?)(?:\*\*|$)").expect("valid regex"));

static TARGET_CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"🎯\s*(.+?)(?:\*\*|$)").expect("valid regex"));

static BOLD_CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));

static POWER_ROLL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Power Roll \+ ([^:]+):\*\*").expect("valid regex"));

static POWER_ROLL_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Power Roll").expect("valid regex"));

static TIER_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\s*\*\*([^:]+):\*\*").expect("valid regex"));

static TIER_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n-\s*\*\*").expect("valid regex"));

static EFFECT_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Effect:\*\*\s*").expect("valid regex"));

static TRIGGER_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Trigger:\*\*").expect("valid regex"));

static PERSISTENT_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Persistent").expect("valid regex"));

static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\n").expect("valid regex"));

static STAMINA_SCALING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)you (?:have|gain) a ([+-]?\d+)\s+bonus to stamina.*?bonus increases by (\d+) at (\d+)(?:th|rd|st|nd), (\d+)(?:th|rd|st|nd), and (\d+)(?:th|rd|st|nd) levels",
    )
    .expect("valid regex")
});

static SIZE_SET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)your size is\s*([0-9]+\s*[SL])").expect("valid regex"));

static DISENGAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you gain a ([+-]?\d+)\s+bonus to the distance you can shift when you take the disengage")
        .expect("valid regex")
});

static DISENGAGE_LOOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you gain a ([+-]?\d+)\s+bonus to the distance you can shift")
        .expect("valid regex")
});

static SPEED_SET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)you have speed (\d+)").expect("valid regex"));

static SPEED_IS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)your speed is\s*([+-]?\d+)").expect("valid regex"));

static SPEED_INCREASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:your speed (?:increases|is increased) by|increase your speed by)\s*([+-]?\d+)")
        .expect("valid regex")
});

static SPEED_PLUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)speed\s*\+\s*([+-]?\d+)").expect("valid regex"));

static BASIC_BONUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you (?:have|gain) a ([+-]?\d+)\s+bonus to (\w+)").expect("valid regex")
});

static ROLL_BONUS_SKIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bto (?:the )?(?:project )?roll\b").expect("valid regex"));

static SKILL_CHOICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)choose\s+(one|two|three|[0-9]+)\s+skills?\s+from\s+the\s+([a-zA-Z]+)\s+skill\s+group")
        .expect("valid regex")
});

static SKILL_ROLL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you (?:gain|have) a ([+-]?\d+)\s+bonus to (?:the )?(?:project )?roll")
        .expect("valid regex")
});

static CRAFT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)craft").expect("valid regex"));

static COMBAT_CONTEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bin combat\b|during combat|heat of battle").expect("valid regex"));

static ON_DAMAGE_CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"when you take damage|whenever you take damage|when .* takes damage|you take damage")
        .expect("valid regex")
});

static ONCE_PER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"once per (?:round|combat)").expect("valid regex"));

static ROUND_CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"until the end of the round|end of the round|until the end of the combat|end of combat")
        .expect("valid regex")
});

static CONDITIONAL_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bwhen\b|\bwhenever\b|\bwhile\b").expect("valid regex"));

pub struct AncestriesParser;

impl CategoryParser for AncestriesParser {
    fn category(&self) -> Category {
        Category::Ancestries
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut ancestries = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Ancestries"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            let clean = strip_markdown_links(doc.body.trim());
            let name = doc.field_or_default("item_name");
            let (description, lore, traits) = parse_ancestry_content(&clean, name);

            let mut record = doc.frontmatter.clone();
            record.insert("name".to_string(), Value::String(name.to_string()));
            record.insert("description".to_string(), Value::String(description));
            record.insert("lore".to_string(), Value::String(lore));
            record.insert("traits".to_string(), traits);
            ancestries.push(Value::Object(record));
        }
        Ok(Value::Array(ancestries))
    }
}

fn parse_ancestry_content(content: &str, ancestry_name: &str) -> (String, String, Value) {
    let heading = Regex::new(&format!(r"(?m)^##\s+{}\s*$", regex::escape(ancestry_name)))
        .expect("valid regex");
    let content = heading.replace_all(content, "").trim().to_string();

    let sections: Vec<&str> = SECTION_SPLIT_RE.split(&content).collect();
    let description = sections.first().map_or(String::new(), |s| s.trim().to_string());

    let mut lore = String::new();
    let mut traits_text = String::new();
    for (i, section) in sections.iter().enumerate().skip(1) {
        if section.starts_with("On ") {
            lore = LORE_HEAD_RE.find(section).map_or(String::new(), |m| {
                take_until(&section[m.end()..], &LORE_END_RE).trim().to_string()
            });
        } else if section.lines().next().unwrap_or("").contains("Traits") {
            traits_text = format!("### {section}");
            for remaining in &sections[i + 1..] {
                traits_text.push_str("\n### ");
                traits_text.push_str(remaining);
            }
            break;
        }
    }

    let mut signature = Vec::new();
    let mut purchased = Map::new();
    purchased.insert("points".to_string(), Value::Number(0.into()));
    purchased.insert("quick_build".to_string(), Value::Array(Vec::new()));
    purchased.insert("options".to_string(), Value::Array(Vec::new()));

    if !traits_text.is_empty() {
        let heads: Vec<(String, usize)> = SIGNATURE_TRAIT_RE
            .captures_iter(&traits_text)
            .map(|caps| (caps[1].trim().to_string(), caps.get(0).expect("whole match").end()))
            .collect();
        for (name, start) in heads {
            let trait_content = take_until(&traits_text[start..], &NEXT_HEADING_RE).trim();
            let mut trait_obj = parse_signature_trait(trait_content);
            trait_obj.insert("name".to_string(), Value::String(name));
            signature.push(Value::Object(trait_obj));
        }

        if let Some(m) = PURCHASED_HEAD_RE.find(&traits_text) {
            let subsection = &traits_text[m.end()..];
            if let Some(caps) = POINTS_RE.captures(subsection) {
                if let Ok(points) = caps[1].parse::<i64>() {
                    purchased.insert("points".to_string(), Value::Number(points.into()));
                }
            }
            if let Some(caps) = POINTS_CONDITIONAL_RE.captures(subsection) {
                purchased.insert(
                    "points_conditional".to_string(),
                    Value::String(format!("or {} ancestry points if {}", &caps[1], &caps[2])),
                );
            }
            if let Some(caps) = QUICK_BUILD_RE.captures(subsection) {
                let picks: Vec<Value> = caps[1]
                    .split(',')
                    .map(|item| Value::String(item.trim().to_string()))
                    .collect();
                purchased.insert("quick_build".to_string(), Value::Array(picks));
            }

            let starts: Vec<usize> = OPTION_HEAD_RE.find_iter(subsection).map(|m| m.start()).collect();
            let mut options = Vec::new();
            for (i, &start) in starts.iter().enumerate() {
                let end = starts.get(i + 1).copied().unwrap_or(subsection.len());
                if let Some(option) = parse_purchased_trait(&subsection[start..end]) {
                    options.push(Value::Object(option));
                }
            }
            purchased.insert("options".to_string(), Value::Array(options));
        }
    }

    let traits = json!({
        "signature": signature,
        "purchased": purchased,
    });
    (description, lore, traits)
}

fn parse_signature_trait(text: &str) -> Map<String, Value> {
    let stat_bonuses = parse_stat_bonuses(text);
    let (skill_grants, skill_bonuses) = parse_skill_info(text);

    let mut result = Map::new();
    if ABILITY_HEADING_RE.is_match(text) {
        let intro = text.find("######").map_or("", |pos| text[..pos].trim());
        result.insert("type".to_string(), Value::String("ability_with_stat_block".to_string()));
        result.insert("text".to_string(), Value::String(intro.to_string()));
        result.insert("ability".to_string(), Value::Object(parse_ability_block(text)));
    } else if CHOOSE_RE.is_match(text) {
        result.insert("type".to_string(), Value::String("choice".to_string()));
        result.insert("text".to_string(), Value::String(text.to_string()));
    } else if ACTION_WORD_RE.is_match(text) {
        result.insert("type".to_string(), Value::String("ability".to_string()));
        result.insert("text".to_string(), Value::String(text.to_string()));
    } else {
        result.insert("type".to_string(), Value::String("trait".to_string()));
        result.insert("text".to_string(), Value::String(text.to_string()));
    }
    append_bonus_fields(&mut result, stat_bonuses, skill_grants, skill_bonuses);
    result
}

fn parse_purchased_trait(text: &str) -> Option<Map<String, Value>> {
    let header = OPTION_HEADER_RE.captures(text)?;
    let name = header[1].trim().to_string();
    let cost: i64 = header[2].parse().ok()?;
    let body = OPTION_HEADER_LINE_RE.replace(text, "").trim().to_string();

    let stat_bonuses = parse_stat_bonuses(&body);
    let (skill_grants, skill_bonuses) = parse_skill_info(&body);

    let mut result = Map::new();
    result.insert("name".to_string(), Value::String(name));
    result.insert("cost".to_string(), Value::Number(cost.into()));
    if let Some(m) = ABILITY_HEADING_RE.find(&body) {
        let description = body[..m.start()].trim().to_string();
        result.insert("text".to_string(), Value::String(description));
        result.insert(
            "grants_ability".to_string(),
            Value::Object(parse_ability_block(&body[m.start()..])),
        );
    } else {
        result.insert("text".to_string(), Value::String(body));
    }
    append_bonus_fields(&mut result, stat_bonuses, skill_grants, skill_bonuses);
    Some(result)
}

fn append_bonus_fields(
    result: &mut Map<String, Value>,
    stat_bonuses: Vec<Value>,
    skill_grants: Vec<Value>,
    skill_bonuses: Vec<Value>,
) {
    if !stat_bonuses.is_empty() {
        result.insert("stat_bonuses".to_string(), Value::Array(stat_bonuses));
    }
    if !skill_grants.is_empty() {
        result.insert("skill_grants".to_string(), Value::Array(skill_grants));
    }
    if !skill_bonuses.is_empty() {
        result.insert("skill_bonuses".to_string(), Value::Array(skill_bonuses));
    }
}

/// An embedded `######` ability: heading, italic flavor line, a two
/// column keyword/action table, then an optional power roll and effect.
fn parse_ability_block(text: &str) -> Map<String, Value> {
    let name = ABILITY_NAME_RE
        .captures(text)
        .map_or(String::new(), |caps| caps[1].trim().to_string());
    let flavor =
        ITALIC_RE.captures(text).map_or(String::new(), |caps| caps[1].trim().to_string());

    let mut keywords: Vec<Value> = Vec::new();
    let mut action_type = String::new();
    let mut distance = String::new();
    let mut target = String::new();
    for caps in TABLE_PAIR_RE.captures_iter(text) {
        let first = caps[1].trim().to_string();
        let second = caps[2].trim().to_string();
        if first.contains("---") || second.contains("---") {
            continue;
        }
        if keywords.is_empty() && first.contains("**") {
            let cleaned = TABLE_MARKER_RE.replace_all(&first, "").trim().to_string();
            let lowered = cleaned.to_lowercase();
            if !cleaned.is_empty()
                && !lowered.starts_with("self")
                && !lowered.starts_with("melee")
                && !lowered.starts_with("ranged")
            {
                keywords = cleaned
                    .split(',')
                    .map(str::trim)
                    .filter(|keyword| !keyword.is_empty())
                    .map(|keyword| Value::String(keyword.to_string()))
                    .collect();
            }
        }
        if distance.is_empty() {
            if let Some(cell) = DISTANCE_CELL_RE.captures(&first) {
                distance = cell[1].trim().to_string();
            }
        }
        if action_type.is_empty() {
            if let Some(cell) = BOLD_CELL_RE.captures(&second) {
                action_type = cell[1].trim().to_string();
            }
        }
        if target.is_empty() {
            if let Some(cell) = TARGET_CELL_RE.captures(&second) {
                target = cell[1].trim().to_string();
            }
        }
    }

    let power_roll = parse_power_roll(text);
    let effect = EFFECT_HEAD_RE
        .find(text)
        .map_or(String::new(), |m| take_until(&text[m.end()..], &PARAGRAPH_RE).trim().to_string());

    let mut ability = Map::new();
    ability.insert("name".to_string(), Value::String(name));
    ability.insert("flavor".to_string(), Value::String(flavor));
    ability.insert("keywords".to_string(), Value::Array(keywords));
    ability.insert("action_type".to_string(), Value::String(action_type));
    ability.insert("distance".to_string(), Value::String(distance));
    ability.insert("target".to_string(), Value::String(target));
    if let Some(power_roll) = &power_roll {
        ability.insert("power_roll".to_string(), power_roll.clone());
    }
    if !effect.is_empty() {
        ability.insert("effect".to_string(), Value::String(effect.clone()));
    }

    let components = component_order(text, !effect.is_empty(), power_roll.is_some());
    if !components.is_empty() {
        ability.insert(
            "component_order".to_string(),
            Value::Array(components.into_iter().map(|c| Value::String(c.to_string())).collect()),
        );
    }
    ability
}

/// Order of the ability's sections as they appear in the source text.
fn component_order(text: &str, has_effect: bool, has_power_roll: bool) -> Vec<&'static str> {
    let markers: [(&'static str, &Regex); 4] = [
        ("trigger", &TRIGGER_MARK_RE),
        ("effect", &EFFECT_HEAD_RE),
        ("power_roll", &POWER_ROLL_MARK_RE),
        ("persistent", &PERSISTENT_MARK_RE),
    ];
    let mut positions: Vec<(&'static str, usize)> = markers
        .iter()
        .filter_map(|(name, re)| re.find(text).map(|m| (*name, m.start())))
        .collect();
    positions.sort_by_key(|(_, pos)| *pos);

    let mut components = Vec::new();
    for (name, _) in positions {
        match name {
            "effect" if has_effect && !components.contains(&"effect") => components.push("effect"),
            "power_roll" if has_power_roll && !components.contains(&"power_roll") => {
                components.push("power_roll")
            }
            _ => {}
        }
    }
    if components.is_empty() {
        if has_effect {
            components.push("effect");
        }
        if has_power_roll {
            components.push("power_roll");
        }
    }
    components
}

fn parse_power_roll(text: &str) -> Option<Value> {
    let caps = POWER_ROLL_RE.captures(text)?;
    let characteristic = caps[1].trim().to_string();

    let heads: Vec<(String, usize, usize)> = TIER_HEAD_RE
        .captures_iter(text)
        .map(|caps| {
            let whole = caps.get(0).expect("whole match");
            (caps[1].trim().to_string(), whole.start(), whole.end())
        })
        .collect();

    let mut tiers = Vec::new();
    for (i, (range_text, _, body_start)) in heads.iter().enumerate() {
        let limit = heads.get(i + 1).map_or(text.len(), |next| next.1);
        let result_text = take_until(&text[*body_start..limit], &TIER_END_RE).trim();

        let tier = if range_text.contains("≤11") || range_text.contains("<11") {
            "weak"
        } else if range_text.contains("12-16") {
            "average"
        } else if range_text.contains("17+") {
            "strong"
        } else {
            "unknown"
        };

        let mut damage = Value::Null;
        let mut effects = Vec::new();
        for part in result_text.split(';') {
            let part = part.trim();
            if part.to_lowercase().contains("damage") {
                if let Some(clause) = parse_damage_clause(part) {
                    let mut parsed = Map::new();
                    parsed.insert(
                        "formula".to_string(),
                        Value::String(clause.formula.clone()),
                    );
                    parsed.insert(
                        "type".to_string(),
                        clause.damage_type.clone().map_or(Value::Null, Value::String),
                    );
                    if let Some(characteristics) = &clause.characteristics {
                        parsed.insert("characteristics".to_string(), json!(characteristics));
                    }
                    fold_characteristic_type(&mut parsed);
                    damage = Value::Object(parsed);
                } else if !part.is_empty() {
                    effects.push(Value::String(part.to_string()));
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

    Some(json!({
        "characteristic": characteristic,
        "tiers": tiers,
    }))
}

/// A lone characteristic letter in the type slot belongs to the
/// formula, `2 + M` rather than damage of type `m`.
pub(crate) fn fold_characteristic_type(damage: &mut Map<String, Value>) {
    let Some(kind) = damage.get("type").and_then(Value::as_str) else {
        return;
    };
    if kind.chars().count() == 1 && matches!(kind, "m" | "a" | "r" | "i" | "p") {
        let formula = damage.get("formula").and_then(Value::as_str).unwrap_or("");
        let folded = format!("{} {}", formula, kind.to_uppercase()).trim().to_string();
        damage.insert("formula".to_string(), Value::String(folded));
        damage.insert("type".to_string(), Value::Null);
    }
}

fn parse_stat_bonuses(text: &str) -> Vec<Value> {
    let mut bonuses: Vec<Value> = Vec::new();
    let lowered = text.to_lowercase();

    let mut stamina_scaling = false;
    if let Some(caps) = STAMINA_SCALING_RE.captures(text) {
        let numbers: Option<Vec<i64>> =
            (1..=5).map(|i| caps[i].parse().ok()).collect();
        if let Some(n) = numbers {
            stamina_scaling = true;
            bonuses.push(json!({
                "stat": "stamina",
                "value": n[0],
                "scaling": {
                    "increase": n[1],
                    "levels": [n[2], n[3], n[4]],
                },
            }));
        }
    }

    if let Some(caps) = SIZE_SET_RE.captures(text) {
        bonuses.push(json!({
            "stat": "size",
            "value": caps[1].replace(' ', ""),
            "type": "set",
        }));
    }

    if let Some(caps) = DISENGAGE_RE.captures(text) {
        if let Ok(value) = caps[1].parse::<i64>() {
            bonuses.push(json!({"stat": "disengage", "value": value}));
        }
    } else if let Some(caps) = DISENGAGE_LOOSE_RE.captures(text) {
        if lowered.contains("disengage") {
            if let Ok(value) = caps[1].parse::<i64>() {
                bonuses.push(json!({"stat": "disengage", "value": value}));
            }
        }
    }

    if let Some(caps) = SPEED_SET_RE.captures(text) {
        if let Ok(value) = caps[1].parse::<i64>() {
            bonuses.push(json!({"stat": "speed", "value": value, "type": "set"}));
        }
    }
    if let Some(caps) = SPEED_IS_RE.captures(text) {
        if let Ok(value) = caps[1].parse::<i64>() {
            bonuses.push(json!({"stat": "speed", "value": value, "type": "set"}));
        }
    }
    if let Some(caps) = SPEED_INCREASE_RE.captures(text) {
        if let Ok(value) = caps[1].parse::<i64>() {
            bonuses.push(json!({"stat": "speed", "value": value}));
        }
    }
    if let Some(caps) = SPEED_PLUS_RE.captures(text) {
        if let Ok(value) = caps[1].parse::<i64>() {
            bonuses.push(json!({"stat": "speed", "value": value}));
        }
    }

    for caps in BASIC_BONUS_RE.captures_iter(text) {
        let whole = caps.get(0).expect("whole match").as_str();
        if ROLL_BONUS_SKIP_RE.is_match(whole) {
            continue;
        }
        if lowered.contains("distance") && lowered.contains("shift") {
            continue;
        }
        let Ok(value) = caps[1].parse::<i64>() else {
            continue;
        };
        let stat_raw = caps[2].to_lowercase();
        if stat_raw == "stamina" && stamina_scaling {
            continue;
        }
        let stat = match stat_raw.as_str() {
            "stamina" | "stam" => "stamina",
            "stability" | "stab" => "stability",
            "speed" => "speed",
            "size" => "size",
            "might" => "might",
            "agility" => "agility",
            "reason" => "reason",
            "intuition" => "intuition",
            "presence" => "presence",
            "disengage" => "disengage",
            _ => continue,
        };
        bonuses.push(json!({"stat": stat, "value": value}));
    }

    let contexts = detect_bonus_context(&lowered);
    if !contexts.is_empty() && !bonuses.is_empty() {
        let context_value = if contexts.len() == 1 {
            Value::String(contexts[0].to_string())
        } else {
            json!(contexts)
        };
        for bonus in &mut bonuses {
            if let Some(map) = bonus.as_object_mut() {
                if !map.contains_key("context") {
                    map.insert("context".to_string(), context_value.clone());
                }
            }
        }
    }

    bonuses
}

fn parse_skill_info(text: &str) -> (Vec<Value>, Vec<Value>) {
    let mut grants = Vec::new();
    let mut bonuses = Vec::new();

    if let Some(caps) = SKILL_CHOICE_RE.captures(text) {
        let word = caps[1].to_lowercase();
        let count = match word.as_str() {
            "one" => 1,
            "two" => 2,
            "three" => 3,
            other => other.parse().unwrap_or(1),
        };
        grants.push(json!({
            "type": "choice",
            "count": count,
            "group": caps[2].to_lowercase(),
        }));
    }

    if let Some(caps) = SKILL_ROLL_RE.captures(text) {
        if let Ok(value) = caps[1].parse::<i64>() {
            let group = if CRAFT_RE.is_match(text) {
                Value::String("crafting".to_string())
            } else {
                Value::Null
            };
            bonuses.push(json!({
                "group": group,
                "value": value,
                "context": "project_roll",
            }));
        }
    }

    (grants, bonuses)
}

/// Conditional qualifiers attached to stat bonuses, matched on the
/// lowercased trait text.
fn detect_bonus_context(lowered: &str) -> Vec<&'static str> {
    let mut contexts = Vec::new();
    if COMBAT_CONTEXT_RE.is_match(lowered) {
        contexts.push("combat");
    }
    if ON_DAMAGE_CONTEXT_RE.is_match(lowered) {
        contexts.push("on_damage");
    }
    if lowered.contains("first time") || ONCE_PER_RE.is_match(lowered) {
        contexts.push("first_time");
    }
    if ROUND_CONTEXT_RE.is_match(lowered) {
        contexts.push("round");
    }
    if contexts.is_empty() && CONDITIONAL_WORD_RE.is_match(lowered) {
        contexts.push("conditional");
    }
    contexts
}
