//! Martial kits: equipment, numeric bonuses, and a signature ability.
//!
//! Most kits live one per file under `Kits/`. The four stormwight kits
//! are embedded in the fury class document instead, so they are lifted
//! from its `####` sections and assigned item indices after the
//! highest one found in the standalone files.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use rulesforge_document::ability::{distance_field, target_field};
use rulesforge_document::text::{section, take_until};
use rulesforge_document::{strip_markdown_links, Document};
use rulesforge_shared::{Category, Result};

use crate::context::{file_name, ParseContext};
use crate::CategoryParser;

/// Stormwight kits defined inside the fury class document.
const STORMWIGHT_KITS: [&str; 4] = ["Boren", "Corven", "Raden", "Vuken"];

static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)#### .+?\n\n").expect("valid regex"));

static SUBSECTION_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n##### ").expect("valid regex"));

static KIT_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n#### ").expect("valid regex"));

static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\n").expect("valid regex"));

static EQUIPMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"##### Equipment\s*\n\n").expect("valid regex"));

static EQUIPMENT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^You (?:wear|wield)\s+").expect("valid regex"));

static KIT_BONUSES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"##### Kit Bonuses\s*\n\n").expect("valid regex"));

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

static SIGNATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)##### Signature Ability\s*\n\n###### (.+?)\n\n\*(.+?)\*\n\n")
        .expect("valid regex")
});

static SIGNATURE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n---").expect("valid regex"));

static KEYWORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\s*\*\*([^*]+)\*\*\s*\|").expect("valid regex"));

static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\s*\*\*([^*]+action)\*\*\s*\|").expect("valid regex"));

static POWER_ROLL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Power Roll \+ ([^:*]+):\*\*").expect("valid regex"));

static TIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\s*\*\*([≤\d\-+]+):\*\*").expect("valid regex"));

static TIER_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n-|\n\n").expect("valid regex"));

static EFFECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Effect:\*\*\s*").expect("valid regex"));

static PRIMORDIAL_STORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"##### Primordial Storm\s*\n\n").expect("valid regex"));

static ASPECT_BENEFITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"##### Aspect Benefits\s*\n\n").expect("valid regex"));

static ANIMAL_FORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)##### Animal Form: (.+?)\s*\n\n").expect("valid regex"));

static HYBRID_FORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)##### Hybrid Form: (.+?)\s*\n\n").expect("valid regex"));

static GROWING_FEROCITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"##### Growing Ferocity\s*\n\n").expect("valid regex"));

static STORMWIGHT_LEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)With this stormwight kit.+?\.").expect("valid regex"));

struct BonusRule {
    key: &'static str,
    re: Regex,
    /// Damage bonuses may hold one value per tier, `+2/+2/+2`.
    tiered: bool,
}

static BONUS_RULES: LazyLock<Vec<BonusRule>> = LazyLock::new(|| {
    let rule = |key, pattern, tiered| BonusRule {
        key,
        re: Regex::new(pattern).expect("valid regex"),
        tiered,
    };
    vec![
        rule("stamina_bonus", r"\*\*Stamina Bonus:\*\*\s*([+\d]+(?:\s+per\s+echelon)?)", false),
        rule("speed_bonus", r"\*\*Speed Bonus:\*\*\s*([+\d]+)", false),
        rule("stability_bonus", r"\*\*Stability Bonus:\*\*\s*([+\d]+)", false),
        rule("melee_damage_bonus", r"\*\*Melee Damage Bonus:\*\*\s*([+\d/]+)", true),
        rule("ranged_damage_bonus", r"\*\*Ranged Damage Bonus:\*\*\s*([+\d/]+)", true),
        rule("ranged_distance_bonus", r"\*\*Ranged Distance Bonus:\*\*\s*([+\d]+)", false),
        rule("disengage_bonus", r"\*\*Disengage Bonus:\*\*\s*([+\d]+)", false),
        rule("mobility_bonus", r"\*\*Mobility Bonus:\*\*\s*([+\d]+)", false),
    ]
});

pub struct KitsParser;

impl CategoryParser for KitsParser {
    fn category(&self) -> Category {
        Category::Kits
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut kits = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Kits"))? {
            // The kits table is an overview, not a kit.
            if file_name(&path) == "Kits Table.md" {
                continue;
            }
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            kits.push(parse_kit(&doc));
        }

        let fury = ctx.rules_path("Classes").join("Fury.md");
        if fury.is_file() {
            let content = ctx.read(&fury)?;
            for name in STORMWIGHT_KITS {
                if let Some(kit) = parse_stormwight_kit(&content, name) {
                    kits.push(kit);
                }
            }
        }

        assign_missing_indices(&mut kits);
        Ok(Value::Array(kits.into_iter().map(Value::Object).collect()))
    }
}

fn parse_kit(doc: &Document) -> Map<String, Value> {
    let body = doc.body.as_str();
    let mut kit = Map::new();
    kit.insert("item_id".to_string(), doc.field_nullable("item_id"));
    kit.insert("item_name".to_string(), doc.field_nullable("item_name"));
    kit.insert("item_index".to_string(), doc.field_nullable("item_index"));
    kit.insert("source".to_string(), doc.field_nullable("source"));
    kit.insert("type".to_string(), doc.field_nullable("type"));
    kit.insert(
        "description".to_string(),
        match DESCRIPTION_RE.find(body) {
            Some(m) => Value::String(strip_markdown_links(
                take_until(&body[m.end()..], &SUBSECTION_END_RE).trim(),
            )),
            None => Value::Null,
        },
    );
    kit_details(body, &mut kit);
    kit
}

/// One stormwight kit, sliced from its `####` section in the fury
/// class document. These carry no frontmatter, so identity fields are
/// synthesized and the item index is filled in afterwards.
fn parse_stormwight_kit(content: &str, name: &str) -> Option<Map<String, Value>> {
    let heading =
        Regex::new(&format!(r"#### {}\s*\n\n", regex::escape(name))).expect("valid regex");
    let start = heading.find(content)?;
    let kit_content = take_until(&content[start.end()..], &KIT_END_RE);

    let mut kit = Map::new();
    kit.insert("item_id".to_string(), Value::String(name.to_lowercase()));
    kit.insert("item_name".to_string(), Value::String(name.to_string()));
    kit.insert("item_index".to_string(), Value::Null);
    kit.insert("source".to_string(), Value::String("mcdm.heroes.v1".to_string()));
    kit.insert("type".to_string(), Value::String("kit".to_string()));

    kit.insert(
        "description".to_string(),
        match STORMWIGHT_LEAD_RE.find(kit_content) {
            Some(m) => Value::String(strip_markdown_links(
                take_until(&kit_content[m.end()..], &SUBSECTION_END_RE).trim(),
            )),
            None => Value::Null,
        },
    );
    kit_details(kit_content, &mut kit);
    Some(kit)
}

/// Sections shared by standalone and stormwight kits.
fn kit_details(content: &str, kit: &mut Map<String, Value>) {
    kit.insert("equipment".to_string(), equipment(content));
    kit.insert("kit_bonuses".to_string(), Value::Object(kit_bonuses(content)));
    kit.insert(
        "signature_ability".to_string(),
        signature_ability(content).unwrap_or(Value::Null),
    );
    kit.insert(
        "primordial_storm".to_string(),
        stripped_section(content, &PRIMORDIAL_STORM_RE),
    );
    kit.insert("aspect_benefits".to_string(), stripped_section(content, &ASPECT_BENEFITS_RE));
    kit.insert("animal_form".to_string(), form(content, &ANIMAL_FORM_RE));
    kit.insert("hybrid_form".to_string(), form(content, &HYBRID_FORM_RE));
    kit.insert("growing_ferocity".to_string(), growing_ferocity(content));
}

fn equipment(content: &str) -> Value {
    match section(content, &EQUIPMENT_RE, &PARAGRAPH_RE) {
        Some(text) => {
            let text = strip_markdown_links(text.trim());
            Value::String(EQUIPMENT_PREFIX_RE.replace(&text, "").into_owned())
        }
        None => Value::Null,
    }
}

fn kit_bonuses(content: &str) -> Map<String, Value> {
    let mut bonuses = Map::new();
    let Some(text) = section(content, &KIT_BONUSES_RE, &SUBSECTION_END_RE) else {
        return bonuses;
    };
    for rule in BONUS_RULES.iter() {
        let Some(caps) = rule.re.captures(text) else {
            continue;
        };
        let raw = &caps[1];
        if rule.tiered && raw.contains('/') {
            let tiers: Option<Vec<i64>> =
                raw.split('/').map(|part| part.replace('+', "").parse().ok()).collect();
            if let Some(tiers) = tiers {
                bonuses.insert(rule.key.to_string(), json!(tiers));
            }
        } else if let Some(m) = NUMBER_RE.find(raw) {
            if let Ok(value) = m.as_str().parse::<i64>() {
                bonuses.insert(rule.key.to_string(), Value::Number(value.into()));
            }
        }
    }
    bonuses
}

fn signature_ability(content: &str) -> Option<Value> {
    let caps = SIGNATURE_RE.captures(content)?;
    let after = &content[caps.get(0).expect("whole match").end()..];
    let details = take_until(after, &SIGNATURE_END_RE).trim();

    let mut ability = Map::new();
    ability.insert("name".to_string(), Value::String(caps[1].trim().to_string()));
    ability.insert(
        "flavor_text".to_string(),
        Value::String(strip_markdown_links(caps[2].trim())),
    );
    if let Some(keyword_caps) = KEYWORDS_RE.captures(details) {
        let keywords: Vec<Value> = keyword_caps[1]
            .trim()
            .split(',')
            .map(|keyword| Value::String(keyword.trim().to_string()))
            .collect();
        ability.insert("keywords".to_string(), Value::Array(keywords));
    }
    if let Some(action_caps) = ACTION_RE.captures(details) {
        ability.insert("action_type".to_string(), Value::String(action_caps[1].trim().to_string()));
    }
    if let Some(distance) = distance_field(details) {
        ability.insert("distance".to_string(), Value::String(strip_markdown_links(&distance)));
    }
    if let Some(target) = target_field(details) {
        ability.insert("target".to_string(), Value::String(strip_markdown_links(&target)));
    }
    if let Some(roll_caps) = POWER_ROLL_RE.captures(details) {
        ability.insert("power_roll".to_string(), Value::String(roll_caps[1].trim().to_string()));
    }
    let tiers = tier_effects(details);
    if !tiers.is_empty() {
        ability.insert("tier_effects".to_string(), Value::Array(tiers));
    }
    if let Some(m) = EFFECT_RE.find(details) {
        ability.insert(
            "effect".to_string(),
            Value::String(strip_markdown_links(
                take_until(&details[m.end()..], &PARAGRAPH_RE).trim(),
            )),
        );
    }
    Some(Value::Object(ability))
}

fn tier_effects(details: &str) -> Vec<Value> {
    let starts: Vec<(String, usize, usize)> = TIER_RE
        .captures_iter(details)
        .map(|caps| {
            let whole = caps.get(0).expect("whole match");
            (caps[1].trim().to_string(), whole.start(), whole.end())
        })
        .collect();
    let mut tiers = Vec::new();
    for (i, (tier, _, body_start)) in starts.iter().enumerate() {
        let limit = starts.get(i + 1).map_or(details.len(), |next| next.1);
        let effect = take_until(&details[*body_start..limit], &TIER_END_RE);
        tiers.push(json!({
            "tier": tier,
            "effect": strip_markdown_links(effect.trim()),
        }));
    }
    tiers
}

fn stripped_section(content: &str, head: &Regex) -> Value {
    section(content, head, &SUBSECTION_END_RE)
        .map_or(Value::Null, |text| Value::String(strip_markdown_links(text.trim())))
}

fn form(content: &str, head: &Regex) -> Value {
    match head.captures(content) {
        Some(caps) => {
            let after = &content[caps.get(0).expect("whole match").end()..];
            json!({
                "animal": caps[1].trim(),
                "description": strip_markdown_links(take_until(after, &SUBSECTION_END_RE).trim()),
            })
        }
        None => Value::Null,
    }
}

fn growing_ferocity(content: &str) -> Value {
    let Some(table) = section(content, &GROWING_FEROCITY_RE, &KIT_END_RE) else {
        return Value::Null;
    };
    let mut rows = Vec::new();
    for line in table.trim().lines() {
        if !line.contains('|') || line.starts_with("| ---") {
            continue;
        }
        let segments: Vec<&str> = line.split('|').collect();
        if segments.len() < 4 {
            continue;
        }
        rows.push(json!({
            "ferocity": segments[1].trim(),
            "benefit": strip_markdown_links(segments[2].trim()),
        }));
    }
    Value::Array(rows)
}

/// Frontmatter indices are zero-padded digit strings; kits without one
/// continue the sequence past the highest already taken.
fn assign_missing_indices(kits: &mut [Map<String, Value>]) {
    let mut next_index = kits
        .iter()
        .filter_map(|kit| kit.get("item_index").and_then(Value::as_str))
        .filter(|idx| !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|idx| idx.parse::<i64>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    for kit in kits {
        if kit.get("item_index").is_some_and(Value::is_null) {
            kit.insert("item_index".to_string(), Value::String(format!("{next_index:02}")));
            next_index += 1;
        }
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

    fn write_kit(tmp: &PathBuf, name: &str, content: &str) {
        let dir = tmp.join("Kits");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn write_fury(tmp: &PathBuf, content: &str) {
        let dir = tmp.join("Classes");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Fury.md"), content).unwrap();
    }

    const PANTHER: &str = "\
---\n\
item_id: panther\n\
item_name: Panther\n\
item_index: '07'\n\
source: mcdm.heroes.v1\n\
type: kit\n\
---\n\n\
#### Panther\n\n\
If you want a good mix of speed, protection, and damage, the panther kit is for you.\n\n\
##### Equipment\n\n\
You wear [light armor](../Items.md) and wield a single weapon.\n\n\
##### Kit Bonuses\n\n\
- **Stamina Bonus:** +6\n\
- **Speed Bonus:** +1\n\
- **Melee Damage Bonus:** +2/+2/+2\n\
- **Disengage Bonus:** +1\n\n\
##### Signature Ability\n\n\
###### Panther Pounce\n\n\
*You leap at a foe before it can react.*\n\n\
| **Melee, Weapon** | **Main action** |\n\
| --- | --- |\n\
| **📏 Melee 1** | **🎯 One creature** |\n\n\
**Power Roll + Might or Agility:**\n\n\
- **≤11:** 5 + M or A damage\n\
- **12-16:** 8 + M or A damage\n\
- **17+:** 11 + M or A damage\n\n\
**Effect:** You can shift up to 2 squares before the strike.\n";

    const FURY: &str = "\
---\n\
item_name: Fury\n\
---\n\n\
### Fury\n\n\
#### Boren\n\n\
With this stormwight kit, you channel your rage into the form of a great bear. \
Boren are tied to the mountain, and their fury is avalanche and stone.\n\n\
##### Equipment\n\n\
You wield claws.\n\n\
##### Kit Bonuses\n\n\
- **Stamina Bonus:** +9 per echelon\n\
- **Speed Bonus:** +2\n\n\
##### Aspect Benefits\n\n\
Whenever you use forced movement, you can push [adjacent](../Rules.md) creatures.\n\n\
##### Animal Form: Bear\n\n\
When you are in your bear form, your speed increases by 2.\n\n\
##### Hybrid Form: Bear\n\n\
Your hybrid form gains the benefits of both other forms.\n\n\
##### Growing Ferocity\n\n\
| Ferocity | Benefit |\n\
| --- | --- |\n\
| 2 | Regain 2 stamina. |\n\
| 4 | Gain an edge on melee strikes. |\n\n\
#### Corven\n\n\
With this stormwight kit, you take the form of a crow. Corven are tricksters \
and messengers.\n\n\
##### Equipment\n\n\
You wield talons.\n";

    #[test]
    fn kit_files_split_into_sections() {
        let tmp = temp_dir();
        write_kit(&tmp, "Panther.md", PANTHER);
        write_kit(&tmp, "Kits Table.md", "---\nitem_name: Kits Table\n---\n\n| Kit |\n");

        let value = KitsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let kits = value.as_array().unwrap();
        assert_eq!(kits.len(), 1);

        let kit = &kits[0];
        assert_eq!(kit["item_id"], "panther");
        assert_eq!(kit["item_index"], "07");
        assert!(kit["description"].as_str().unwrap().starts_with("If you want a good mix"));
        assert_eq!(kit["equipment"], "light armor and wield a single weapon.");
        assert_eq!(kit["kit_bonuses"]["stamina_bonus"], 6);
        assert_eq!(kit["kit_bonuses"]["speed_bonus"], 1);
        assert_eq!(kit["kit_bonuses"]["melee_damage_bonus"], json!([2, 2, 2]));
        assert_eq!(kit["kit_bonuses"]["disengage_bonus"], 1);
        assert_eq!(kit["primordial_storm"], Value::Null);
        assert_eq!(kit["growing_ferocity"], Value::Null);

        let ability = &kit["signature_ability"];
        assert_eq!(ability["name"], "Panther Pounce");
        assert_eq!(ability["flavor_text"], "You leap at a foe before it can react.");
        assert_eq!(ability["keywords"], json!(["Melee", "Weapon"]));
        assert_eq!(ability["action_type"], "Main action");
        assert_eq!(ability["distance"], "Melee 1");
        assert_eq!(ability["target"], "One creature");
        assert_eq!(ability["power_roll"], "Might or Agility");
        let tiers = ability["tier_effects"].as_array().unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0]["tier"], "≤11");
        assert_eq!(tiers[0]["effect"], "5 + M or A damage");
        assert_eq!(ability["effect"], "You can shift up to 2 squares before the strike.");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn stormwight_kits_come_from_the_fury_class() {
        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("Kits")).unwrap();
        write_fury(&tmp, FURY);

        let value = KitsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let kits = value.as_array().unwrap();
        assert_eq!(kits.len(), 2);

        let boren = &kits[0];
        assert_eq!(boren["item_id"], "boren");
        assert_eq!(boren["item_name"], "Boren");
        assert_eq!(boren["source"], "mcdm.heroes.v1");
        assert_eq!(boren["type"], "kit");
        assert_eq!(
            boren["description"],
            "Boren are tied to the mountain, and their fury is avalanche and stone."
        );
        assert_eq!(boren["equipment"], "claws.");
        assert_eq!(boren["kit_bonuses"]["stamina_bonus"], 9);
        assert_eq!(boren["kit_bonuses"]["speed_bonus"], 2);
        assert!(boren["aspect_benefits"]
            .as_str()
            .unwrap()
            .ends_with("you can push adjacent creatures."));
        assert_eq!(boren["animal_form"]["animal"], "Bear");
        assert_eq!(boren["hybrid_form"]["animal"], "Bear");

        // The heading row of the table rides along as the first entry.
        let ferocity = boren["growing_ferocity"].as_array().unwrap();
        assert_eq!(ferocity.len(), 3);
        assert_eq!(ferocity[0]["ferocity"], "Ferocity");
        assert_eq!(ferocity[1]["ferocity"], "2");
        assert_eq!(ferocity[1]["benefit"], "Regain 2 stamina.");

        assert_eq!(kits[1]["item_name"], "Corven");
        assert_eq!(kits[1]["description"], "Corven are tricksters and messengers.");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_indices_continue_from_the_highest() {
        let tmp = temp_dir();
        write_kit(&tmp, "Panther.md", PANTHER);
        write_fury(&tmp, FURY);

        let value = KitsParser.parse(&ParseContext::new(&tmp)).unwrap();
        let kits = value.as_array().unwrap();
        assert_eq!(kits.len(), 3);
        assert_eq!(kits[0]["item_index"], "07");
        assert_eq!(kits[1]["item_index"], "08");
        assert_eq!(kits[2]["item_index"], "09");

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
