//! Class documents: basics, subclasses, heroic resources, advancement
//! tables, and ability selection pools.
//!
//! Each class file under `Rules/Classes` becomes one record. The
//! advancement table drives a `features_by_level` structure whose
//! entries are classified (subclass choice, ability choice, passive,
//! and so on) and wired to the ability pools extracted from the
//! level-section headings. Ability content itself is not captured
//! here, only pool membership by identifier.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use rulesforge_document::text::{
    slugify, split_sentences, strip_blockquotes, strip_markdown_links, take_until, word_to_number,
};
use rulesforge_document::Document;
use rulesforge_shared::{Category, Result};

use crate::context::{self, ParseContext};
use crate::{is_truthy, title_case, CategoryParser};

const SKILL_GROUPS: [&str; 5] = ["interpersonal", "exploration", "intrigue", "lore", "crafting"];

static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\n").expect("valid regex"));

static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<!-- -->\s*>\s*"([^"]+)"\s*>\s*>\s*\*\*([^*]+)\*\*"#).expect("valid regex")
});

static STARTING_CHARS_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Starting Characteristics:\*\*\s+").expect("valid regex"));

static WEAK_POTENCY_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Weak Potency:").expect("valid regex"));

static REQUIRED_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"You start with (?:a|an) (\w+) of 2(?: and (?:a|an) (\w+) of 2)?")
        .expect("valid regex")
});

static ARRAY_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[-−•]\s*((?:[-−]?\d+,?\s*)+)$").expect("valid regex"));

static BASICS_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"### Basics\s*\n\n").expect("valid regex"));

static H3_MARK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"###").expect("valid regex"));

static H4_MARK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"####").expect("valid regex"));

static WEAK_POTENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Weak Potency:\*\*\s*(.+)").expect("valid regex"));

static AVERAGE_POTENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Average Potency:\*\*\s*(.+)").expect("valid regex"));

static STRONG_POTENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Strong Potency:\*\*\s*(.+)").expect("valid regex"));

static STARTING_STAMINA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*Starting Stamina at 1st Level:\*\*\s*(\d+)").expect("valid regex")
});

static LEVEL_STAMINA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*Stamina Gained at 2nd and Higher Levels:\*\*\s*(\d+)").expect("valid regex")
});

static RECOVERIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Recoveries:\*\*\s*(\d+)").expect("valid regex"));

static SKILLS_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Skills:\*\*\s*").expect("valid regex"));

static SKILLS_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n|\*\*|###").expect("valid regex"));

static QUICK_BUILD_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\*Quick Build:\*\*?\s*(.+?)\)").expect("valid regex"));

static GIVEN_SKILLS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"You gain the ([A-Z][^(]+?)\s+skill(?:s)?\s*\(").expect("valid regex"));

static COMPOUND_CHOICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:Then )?[Cc]hoose (\w+) skills? from ([^)]+?) and (\w+) skills? from ([^)]+?)(?:\s*\(|\.)",
    )
    .expect("valid regex")
});

static SIMPLE_CHOICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:Then )?[Cc]hoose (?:any )?(\w+) skills? from (.+?)(?:\s*\(|\.)")
        .expect("valid regex")
});

static OPTION_BOLD_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-−]\s+\*\*([^:*]+):\*\*\s+").expect("valid regex"));

static OPTION_PLAIN_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-−]\s+([^:*\n]+):\s+").expect("valid regex"));

static OPTION_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*[-−]|\n\n").expect("valid regex"));

static TRADITION_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-−]\s+\*\*([^*]+)\*\*\s+(?:abilities?\s+|is the element of\s+)")
        .expect("valid regex")
});

static TRADITION_OPTIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"You choose (?:a|an) (?:talent tradition|elemental specialization) from the following options:\s*([^.]+)\.",
    )
    .expect("valid regex")
});

static OPTION_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*(?:or\s*)?").expect("valid regex"));

static WS_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static SPECIFIC_SKILL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"You (?:have|gain)(?: the)? ([A-Z][a-z]+(?: [A-Z][a-z]+)*) skill")
        .expect("valid regex")
});

static GROUP_SKILL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"You gain (?:one|a) skill from the (\w+)(?: skill)? group").expect("valid regex")
});

static DOMAIN_1ST_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"###### 1st-Level .+ Domain Features Table\s*\n\s*\|[^\n]+\|[^\n]+\|[^\n]+\|\s*\n\s*\|[:\-\s|]+\|\s*\n((?:\s*\|[^\n]+\|[^\n]+\|[^\n]+\|\s*\n)+)",
    )
    .expect("valid regex")
});

static DOMAIN_4TH_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"###### 4th-Level .+ Domain Features Table\s*\n\s*\|[^\n]+\|[^\n]+\|\s*\n\s*\|[:\-\s|]+\|\s*\n((?:\s*\|[^\n]+\|[^\n]+\|\s*\n)+)",
    )
    .expect("valid regex")
});

static DOMAIN_7TH_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"###### 7th-Level .+ Domain Features Table\s*\n\s*\|[^\n]+\|[^\n]+\|\s*\n\s*\|[:\-\s|]+\|\s*\n((?:\s*\|[^\n]+\|[^\n]+\|\s*\n)+)",
    )
    .expect("valid regex")
});

static ASPECT_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"###### 1st-Level Aspect Features Table\s*\n\s*\|[^\n]+\|[^\n]+\|\s*\n\s*\|[:\-\s|]+\|\s*\n((?:\s*\|[^\n]+\|[^\n]+\|\s*\n)+)",
    )
    .expect("valid regex")
});

static PIETY_SECTION_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"##### Domain Piety and Effects\s*\n").expect("valid regex"));

static PIETY_SECTION_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*#### [1-9]").expect("valid regex"));

static DOMAIN_PIETY_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"###### (\w+) Domain Piety and Effect\s*\n").expect("valid regex")
});

static DOMAIN_PIETY_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*######|\n\s*####").expect("valid regex"));

static PIETY_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"- \*\*Piety:\*\*\s*").expect("valid regex"));

static PRAYER_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*- \*\*Prayer Effect:\*\*").expect("valid regex"));

static PRAYER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"- \*\*Prayer Effect:\*\*\s*").expect("valid regex"));

static ADVANCEMENT_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\| Level \|").expect("valid regex"));

static NUMBER_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\b").expect("valid regex"));

static COST_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\d+\s+\w+\)").expect("valid regex"));

static LEVEL_SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"###\s+(\d+)(?:st|nd|rd|th)-Level Features").expect("valid regex"));

static SIG_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#{4,5}\s+Signature Abilit(?:y|ies)\s*\n\n").expect("valid regex")
});

static KIT_SIG_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#{4,5}\s+Kit Signature Abilit(?:y|ies)\s*\n\n").expect("valid regex")
});

static SIG_SECTION_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#{4,5}\s+Signature Abilit(?:y|ies)\s*\n").expect("valid regex")
});

static SIG_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n#{2,5} ").expect("valid regex"));

static H6_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"######\s+([^\n]+)").expect("valid regex"));

static CHOOSE_SIGNATURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Choose (\w+) signature").expect("valid regex"));

static CHOOSE_HEROIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Choose (\w+) heroic ability").expect("valid regex"));

static POOL_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n(?:#{2,5}\s+|#{6}\s+\d+-\w+\s+Abilit)").expect("valid regex")
});

static QUOTED_H6_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^>\s*#{6}\s+([^\n]+)").expect("valid regex"));

static PLAIN_H6_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*#{6}\s+([^\n]+)").expect("valid regex"));

static SUBCLASS_POOL_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n#{2,4}\s+").expect("valid regex"));

static CHAR_INCREASE_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)####\s+Characteristic Increase\s*\n\n").expect("valid regex")
});

static H4_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n####").expect("valid regex"));

static H34_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n####|\n###").expect("valid regex"));

static INCREASE_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Your (\w+) and (\w+) scores each increase to (\d+)").expect("valid regex")
});

static INCREASE_ANY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)Your (\w+) score increases to (\d+)\. Additionally, you can increase one of your characteristic scores by (\d+), to a maximum of (\d+)",
    )
    .expect("valid regex")
});

static INCREASE_ALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Each of your characteristic scores increases by (\d+), to a maximum of (\d+)")
        .expect("valid regex")
});

static QUICK_BUILD_OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(\*Quick Build:\s*([^)]+)\)").expect("valid regex"));

static QUICK_DEITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([A-Za-zû]+)\s+(?:as|for)\s+deity").expect("valid regex"));

static QUICK_DOMAINS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)and\s+(.+?)\s+as\s+(?:domain|domains)\.?$").expect("valid regex")
});

static SKILLS_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Skills:\*\*").expect("valid regex"));

static SKILLS_SECTION_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\*\*|\n###").expect("valid regex"));

static DEITY_SECTION_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#### Deity and Domains\s*\n").expect("valid regex"));

static KIT_SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"You can use and gain the benefits of a kit\.").expect("valid regex"));

static PRAYER_SECTION_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#### Prayer\s*\n").expect("valid regex"));

static WARD_SECTION_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#### Conduit Ward\s*\n").expect("valid regex"));

static JUDGMENT_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"##### Judgment Order Benefit\s*\n").expect("valid regex"));

static H5_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#####").expect("valid regex"));

static H3_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^###").expect("valid regex"));

static NEWLINE_GAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

static GAIN_CLAUSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i),?\s*you gain.*").expect("valid regex"));

static COST_IN_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)-").expect("valid regex"));

pub struct ClassesParser;

impl CategoryParser for ClassesParser {
    fn category(&self) -> Category {
        Category::Classes
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut classes = Vec::new();
        for path in ctx.markdown_files(&ctx.rules_path("Classes"))? {
            let Some(doc) = ctx.load_document(&path)? else {
                continue;
            };
            classes.push(parse_class(&doc, &path));
        }
        Ok(Value::Array(classes))
    }
}

fn parse_class(doc: &Document, path: &Path) -> Value {
    let content = doc.body.as_str();
    let class_name = doc
        .field("item_name")
        .unwrap_or_else(|| context::file_stem(path))
        .to_string();

    let subclass = parse_subclass_info(content, &class_name);
    let advancement = parse_advancement_table(content);
    let pools = parse_ability_pools(content, &class_name);
    let aspect_features = parse_aspect_features_table(content, &class_name);
    let features_by_level = build_features_by_level(
        &advancement,
        &subclass,
        &pools,
        &class_name,
        content,
        aspect_features.as_ref(),
    );

    let mut record = Map::new();
    record.insert("item_id".to_string(), doc.field_nullable("item_id"));
    record.insert("item_name".to_string(), Value::String(class_name.clone()));
    record.insert("item_index".to_string(), doc.field_nullable("item_index"));
    record.insert("source".to_string(), doc.field_nullable("source"));
    record.insert("type".to_string(), doc.field_nullable("type"));
    record.insert("description".to_string(), class_description(content, &class_name));
    record.insert("quote".to_string(), parse_quote(content));
    record.insert("basics".to_string(), parse_basics(content));
    record.insert("subclass".to_string(), subclass);
    record.insert("domain_features".to_string(), parse_domain_features(content, &class_name));
    record.insert(
        "domain_piety_effects".to_string(),
        parse_domain_piety_effects(content, &class_name),
    );
    record.insert(
        "heroic_resource".to_string(),
        parse_heroic_resource(content, &class_name),
    );
    record.insert("advancement_table".to_string(), Value::Array(advancement));
    record.insert("ability_pools".to_string(), pools_value(&pools));
    record.insert("features_by_level".to_string(), features_by_level);
    Value::Object(record)
}

fn subclass_heading(class_name: &str) -> (&'static str, &'static str) {
    match class_name {
        "Censor" => ("Censor Order", "order"),
        "Conduit" => ("Deity and Domains", "domain"),
        "Elementalist" => ("Elemental Specialization", "specialization"),
        "Fury" => ("Primordial Aspect", "aspect"),
        "Null" => ("Null Tradition", "tradition"),
        "Shadow" => ("Shadow College", "college"),
        "Tactician" => ("Tactical Doctrine", "doctrine"),
        "Talent" => ("Talent Tradition", "tradition"),
        "Troubadour" => ("Troubadour Class Act", "class_act"),
        _ => ("Subclass", "subclass"),
    }
}

fn resource_name(class_name: &str) -> &'static str {
    match class_name {
        "Censor" => "wrath",
        "Conduit" => "piety",
        "Elementalist" => "essence",
        "Fury" => "ferocity",
        "Null" => "discipline",
        "Shadow" => "insight",
        "Tactician" => "focus",
        "Talent" => "clarity",
        "Troubadour" => "drama",
        _ => "resource",
    }
}

fn ability_name_to_id(name: &str) -> String {
    slugify(&COST_PAREN_RE.replace_all(name, ""))
}

fn class_description(content: &str, class_name: &str) -> Value {
    let head = Regex::new(&format!(r"## {}\s*\n\n", regex::escape(class_name)))
        .expect("valid regex");
    match head.find(content) {
        Some(m) => {
            let text = take_until(&content[m.end()..], &PARAGRAPH_RE).trim();
            Value::String(strip_markdown_links(text).trim().to_string())
        }
        None => Value::Null,
    }
}

fn parse_quote(content: &str) -> Value {
    match QUOTE_RE.captures(content) {
        Some(caps) => json!({"text": caps[1].trim(), "author": caps[2].trim()}),
        None => Value::Null,
    }
}

fn parse_starting_characteristics(content: &str) -> Value {
    let Some(head) = STARTING_CHARS_HEAD_RE.find(content) else {
        return Value::Null;
    };
    let rest = &content[head.end()..];
    let Some(end) = WEAK_POTENCY_MARK_RE.find(rest) else {
        return Value::Null;
    };
    let char_text = &rest[..end.start()];

    let mut required = Vec::new();
    if let Some(caps) = REQUIRED_CHARS_RE.captures(char_text) {
        required.push(Value::String(caps[1].to_string()));
        if let Some(second) = caps.get(2) {
            required.push(Value::String(second.as_str().to_string()));
        }
    }

    let mut arrays = Vec::new();
    for caps in ARRAY_LINE_RE.captures_iter(char_text) {
        let cleaned = caps[1].replace('−', "-").replace(',', " ");
        let numbers: Option<Vec<i64>> = cleaned
            .split_whitespace()
            .map(|token| token.parse().ok())
            .collect();
        if let Some(numbers) = numbers {
            if !numbers.is_empty() {
                arrays.push(json!(numbers));
            }
        }
    }

    json!({"required": required, "arrays": arrays})
}

fn parse_basics(content: &str) -> Value {
    let Some(head) = BASICS_HEAD_RE.find(content) else {
        return Value::Null;
    };
    let basics_text = take_until(&content[head.end()..], &H3_MARK_RE);

    let mut potency = Map::new();
    for (key, re) in [
        ("weak", &WEAK_POTENCY_RE),
        ("average", &AVERAGE_POTENCY_RE),
        ("strong", &STRONG_POTENCY_RE),
    ] {
        if let Some(caps) = re.captures(basics_text) {
            potency.insert(key.to_string(), Value::String(caps[1].trim().to_string()));
        }
    }

    let mut stamina = Map::new();
    if let Some(caps) = STARTING_STAMINA_RE.captures(basics_text) {
        stamina.insert("starting".to_string(), json!(caps[1].parse::<i64>().unwrap_or(0)));
    }
    if let Some(caps) = LEVEL_STAMINA_RE.captures(basics_text) {
        stamina.insert("per_level".to_string(), json!(caps[1].parse::<i64>().unwrap_or(0)));
    }

    let recoveries = RECOVERIES_RE
        .captures(basics_text)
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .map_or(Value::Null, |n| json!(n));

    let mut skills = Map::new();
    if let Some(m) = SKILLS_HEAD_RE.find(basics_text) {
        let skills_text = take_until(&basics_text[m.end()..], &SKILLS_BREAK_RE);

        let mut quick_build: Vec<Value> = Vec::new();
        if let Some(caps) = QUICK_BUILD_LIST_RE.captures(skills_text) {
            quick_build = caps[1]
                .trim_end_matches('.')
                .split(',')
                .map(|s| Value::String(s.trim().to_string()))
                .collect();
        }

        let mut given = Vec::new();
        for caps in GIVEN_SKILLS_RE.captures_iter(skills_text) {
            let gain_text = &caps[1];
            if gain_text.contains(" and ") {
                given.extend(
                    gain_text
                        .split(" and ")
                        .map(|s| Value::String(s.trim().to_string())),
                );
            } else {
                given.push(Value::String(gain_text.trim().to_string()));
            }
        }

        let mut choices = Vec::new();
        if let Some(caps) = COMPOUND_CHOICE_RE.captures(skills_text) {
            for (count_group, from_group) in [(1, 2), (3, 4)] {
                let count = word_to_number(&caps[count_group]).unwrap_or(0) as i64;
                let sources = parse_skill_sources(caps[from_group].trim());
                if !sources.is_empty() && count > 0 {
                    choices.push(json!({"count": count, "from": sources, "operator": "OR"}));
                }
            }
        } else {
            for caps in SIMPLE_CHOICE_RE.captures_iter(skills_text) {
                let count = word_to_number(&caps[1]).unwrap_or(0) as i64;
                let sources = parse_skill_sources(caps[2].trim());
                if !sources.is_empty() && count > 0 {
                    choices.push(json!({"count": count, "from": sources, "operator": "OR"}));
                }
            }
        }

        skills.insert("given".to_string(), Value::Array(given));
        skills.insert("choices".to_string(), Value::Array(choices));
        skills.insert("quick_build".to_string(), Value::Array(quick_build));
    }

    json!({
        "starting_characteristics": parse_starting_characteristics(content),
        "potency": potency,
        "stamina": stamina,
        "recoveries": recoveries,
        "skills": skills,
    })
}

/// A skill "from" clause names either specific skills, skill groups, or
/// a mix split by "or the".
fn parse_skill_sources(from_text: &str) -> Vec<Value> {
    let mut sources = Vec::new();

    if from_text.contains(" or the ") {
        let mut parts = from_text.split(" or the ");
        let before = parts.next().unwrap_or("");
        let after = parts.collect::<Vec<_>>().join(" or the ");

        let before_lower = before.to_lowercase();
        if !before.is_empty() && !SKILL_GROUPS.iter().any(|g| before_lower.contains(g)) {
            for skill in before.split(',') {
                let skill = skill.trim();
                if !skill.is_empty() {
                    sources.push(json!({"type": "skill", "value": skill}));
                }
            }
        }
        let after_lower = after.to_lowercase();
        for group in SKILL_GROUPS {
            if after_lower.contains(group) {
                sources.push(json!({"type": "group", "value": group}));
            }
        }
    } else {
        let lowered = from_text.to_lowercase();
        let groups: Vec<&str> = SKILL_GROUPS
            .iter()
            .copied()
            .filter(|g| lowered.contains(g))
            .collect();
        if !groups.is_empty() {
            for group in groups {
                sources.push(json!({"type": "group", "value": group}));
            }
        } else {
            let cleaned = from_text.replace("the", "");
            let cleaned = cleaned.trim();
            if !cleaned.is_empty() {
                sources.push(json!({"type": "skill", "value": cleaned}));
            }
        }
    }
    sources
}

fn parse_subclass_info(content: &str, class_name: &str) -> Value {
    let (subclass_name, subclass_type) = subclass_heading(class_name);
    let head = Regex::new(&format!(r"#### {}\s*\n\n", regex::escape(subclass_name)))
        .expect("valid regex");
    let Some(m) = head.find(content) else {
        return Value::Null;
    };
    let subclass_text = take_until(&content[m.end()..], &H4_MARK_RE);

    json!({
        "type": subclass_type,
        "name": subclass_name,
        "description": strip_markdown_links(subclass_text.lines().next().unwrap_or("")).trim(),
        "options": parse_subclass_options(subclass_text, class_name),
        "selection_count": if class_name == "Conduit" { 2 } else { 1 },
    })
}

fn parse_subclass_options(subclass_text: &str, class_name: &str) -> Vec<Value> {
    let mut heads: Vec<(String, usize)> = OPTION_BOLD_HEAD_RE
        .captures_iter(subclass_text)
        .map(|caps| (caps[1].to_string(), caps.get(0).expect("whole match").end()))
        .collect();
    if heads.is_empty() {
        heads = OPTION_PLAIN_HEAD_RE
            .captures_iter(subclass_text)
            .map(|caps| (caps[1].to_string(), caps.get(0).expect("whole match").end()))
            .collect();
    }

    let mut options = Vec::new();

    // Talent and Elementalist name their options in a sentence, with
    // descriptions in separate bold bullets.
    if heads.is_empty() && matches!(class_name, "Talent" | "Elementalist") {
        let mut traditions: std::collections::HashMap<String, (String, String)> =
            std::collections::HashMap::new();
        for caps in TRADITION_HEAD_RE.captures_iter(subclass_text) {
            let name = caps[1].trim().to_string();
            let desc_start = caps.get(0).expect("whole match").end();
            let desc = take_until(&subclass_text[desc_start..], &OPTION_BREAK_RE).trim();
            let desc = WS_RUN_RE.replace_all(desc, " ").to_string();
            traditions.insert(name.to_lowercase(), (name, desc));
        }
        if let Some(caps) = TRADITION_OPTIONS_RE.captures(subclass_text) {
            for raw in OPTION_SPLIT_RE.split(&caps[1]) {
                let tradition_name = raw.trim();
                if tradition_name.is_empty() {
                    continue;
                }
                let key = tradition_name.to_lowercase();
                match traditions.get(&key) {
                    Some((name, desc)) => options.push(json!({
                        "id": key.replace(' ', "-"),
                        "name": name,
                        "description": desc,
                        "skill_granted": Value::Null,
                    })),
                    None => {
                        let title = title_case(tradition_name);
                        options.push(json!({
                            "id": key.replace(' ', "-"),
                            "name": title,
                            "description": format!("{title} tradition abilities and features."),
                            "skill_granted": Value::Null,
                        }));
                    }
                }
            }
        }
    }

    for (raw_name, desc_start) in &heads {
        let option_name = raw_name.trim();
        let desc_raw = take_until(&subclass_text[*desc_start..], &OPTION_BREAK_RE).trim();

        let skill_granted = if let Some(caps) = SPECIFIC_SKILL_RE.captures(desc_raw) {
            Value::String(caps[1].to_string())
        } else if let Some(caps) = GROUP_SKILL_RE.captures(desc_raw) {
            json!({
                "type": "choice",
                "count": 1,
                "from": {"type": "group", "value": &caps[1]},
            })
        } else {
            Value::Null
        };

        options.push(json!({
            "id": option_name.to_lowercase().replace(' ', "-").replace('\'', ""),
            "name": option_name,
            "description": strip_markdown_links(desc_raw).trim(),
            "skill_granted": skill_granted,
        }));
    }
    options
}

fn parse_domain_features(content: &str, class_name: &str) -> Value {
    if !matches!(class_name, "Censor" | "Conduit") {
        return Value::Null;
    }
    let mut domain_features = Map::new();
    if let Some(caps) = DOMAIN_1ST_TABLE_RE.captures(content) {
        let rows = domain_table_rows(&caps[1], true);
        if !rows.is_empty() {
            domain_features.insert("1st_level".to_string(), Value::Array(rows));
        }
    }
    if let Some(caps) = DOMAIN_4TH_TABLE_RE.captures(content) {
        let rows = domain_table_rows(&caps[1], false);
        if !rows.is_empty() {
            domain_features.insert("4th_level".to_string(), Value::Array(rows));
        }
    }
    if let Some(caps) = DOMAIN_7TH_TABLE_RE.captures(content) {
        let rows = domain_table_rows(&caps[1], false);
        if !rows.is_empty() {
            domain_features.insert("7th_level".to_string(), Value::Array(rows));
        }
    }
    if domain_features.is_empty() {
        Value::Null
    } else {
        Value::Object(domain_features)
    }
}

fn domain_table_rows(table: &str, with_skill_group: bool) -> Vec<Value> {
    let needed = if with_skill_group { 3 } else { 2 };
    let mut rows = Vec::new();
    for line in table.trim().split('\n') {
        if !line.contains('|') {
            continue;
        }
        let parts: Vec<&str> = line.split('|').collect();
        let cells: Vec<&str> = parts[1..parts.len() - 1].iter().map(|c| c.trim()).collect();
        if cells.len() < needed {
            continue;
        }
        let mut row = Map::new();
        row.insert("domain".to_string(), Value::String(cells[0].to_string()));
        row.insert("feature".to_string(), Value::String(cells[1].to_string()));
        if with_skill_group && !cells[2].is_empty() {
            row.insert("skill_group".to_string(), Value::String(cells[2].to_string()));
        }
        rows.push(Value::Object(row));
    }
    rows
}

fn parse_aspect_features_table(content: &str, class_name: &str) -> Option<Value> {
    if class_name != "Fury" {
        return None;
    }
    let caps = ASPECT_TABLE_RE.captures(content)?;
    let mut map = Map::new();
    for line in caps[1].trim().split('\n') {
        if !line.contains('|') {
            continue;
        }
        let parts: Vec<&str> = line.split('|').collect();
        let cells: Vec<&str> = parts[1..parts.len() - 1].iter().map(|c| c.trim()).collect();
        if cells.len() >= 2 {
            let ids: Vec<Value> = cells[1]
                .split(',')
                .map(|f| Value::String(ability_name_to_id(f.trim())))
                .collect();
            map.insert(cells[0].to_lowercase(), Value::Array(ids));
        }
    }
    (!map.is_empty()).then_some(Value::Object(map))
}

fn parse_domain_piety_effects(content: &str, class_name: &str) -> Value {
    if class_name != "Conduit" {
        return Value::Null;
    }
    let Some(head) = PIETY_SECTION_HEAD_RE.find(content) else {
        return Value::Null;
    };
    let section = take_until(&content[head.end()..], &PIETY_SECTION_BREAK_RE);

    let mut effects = Map::new();
    for caps in DOMAIN_PIETY_HEAD_RE.captures_iter(section) {
        let start = caps.get(0).expect("whole match").end();
        let chunk = take_until(&section[start..], &DOMAIN_PIETY_BREAK_RE);
        let Some(piety_head) = PIETY_LINE_RE.find(chunk) else {
            continue;
        };
        let piety = take_until(&chunk[piety_head.end()..], &PRAYER_SPLIT_RE).trim();
        let Some(prayer_head) = PRAYER_LINE_RE.find(chunk) else {
            continue;
        };
        let prayer = chunk[prayer_head.end()..].trim();
        effects.insert(
            caps[1].to_string(),
            json!({"piety_trigger": piety, "prayer_effect": prayer}),
        );
    }
    if effects.is_empty() {
        Value::Null
    } else {
        Value::Object(effects)
    }
}

fn parse_heroic_resource(content: &str, class_name: &str) -> Value {
    let resource = resource_name(class_name);
    let title = title_case(resource);
    let head = Regex::new(&format!(r"#### {title}[^#\n]*\n")).expect("valid regex");
    let Some(m) = head.find(content) else {
        return Value::Null;
    };
    let resource_text = take_until(&content[m.end()..], &H3_LINE_RE);

    let desc_text = take_until(resource_text, &H5_LINE_RE).trim();
    let desc_text = strip_blockquotes(desc_text);
    let desc_text = NEWLINE_GAP_RE.replace_all(&desc_text, " ");
    let desc_text = strip_markdown_links(&desc_text);
    let first_para = desc_text.split("\n\n").next().unwrap_or("").trim();
    let description = if first_para.len() > 10 {
        Value::String(first_para.to_string())
    } else {
        Value::Null
    };

    let mut combat = Map::new();
    let combat_head =
        Regex::new(&format!(r"(?i)##### {title} in Combat\s*\n")).expect("valid regex");
    if let Some(m) = combat_head.find(content) {
        let combat_text = take_until(&content[m.end()..], &H5_LINE_RE);
        if combat_text.contains("Victories") || combat_text.contains("victories") {
            combat.insert("starting".to_string(), Value::String("Victories".to_string()));
        }

        let per_turn = Regex::new(&format!(
            r"(?i)start of each of your turns[^.]+?you gain (\d+d\d+|\d+) {resource}"
        ))
        .expect("valid regex");
        if let Some(caps) = per_turn.captures(combat_text) {
            combat.insert("per_turn".to_string(), Value::String(caps[1].to_string()));
        }

        let amount_re = Regex::new(&format!(r"(?i)you gain (\d+d?\d*|\d+) {resource}"))
            .expect("valid regex");
        let mut triggers = Vec::new();
        for sentence in split_sentences(combat_text) {
            let lowered = sentence.to_lowercase();
            if !(lowered.contains("you gain") && lowered.contains(resource)) {
                continue;
            }
            let Some(caps) = amount_re.captures(sentence) else {
                continue;
            };
            let amount = caps[1].to_string();
            let condition = GAIN_CLAUSE_RE.replace_all(sentence, "");
            let condition = condition.trim();
            if condition.is_empty() || condition.to_lowercase().contains("start of") {
                continue;
            }
            triggers.push(json!({
                "condition": strip_markdown_links(condition).trim(),
                "amount": amount,
            }));
        }
        if !triggers.is_empty() {
            combat.insert("triggers".to_string(), Value::Array(triggers));
        }

        let lowered = combat_text.to_lowercase();
        let mut special = Vec::new();
        if lowered.contains("strain") || lowered.contains("negative") {
            special.push(Value::String(
                "Can spend into negative (strain mechanics)".to_string(),
            ));
        }
        if lowered.contains("pray") && class_name == "Conduit" {
            special.push(Value::String(
                "Prayer mechanics for additional piety".to_string(),
            ));
        }
        if !special.is_empty() {
            combat.insert("special_mechanics".to_string(), Value::Array(special));
        }
    }

    let mut outside_combat = Map::new();
    let outside_head =
        Regex::new(&format!(r"(?i)##### {title} Outside of Combat\s*\n")).expect("valid regex");
    if outside_head.is_match(content) {
        outside_combat.insert(
            "usage_rule".to_string(),
            Value::String(
                "Can use abilities without spending resource, but can't use same ability again until earning Victories or finishing respite"
                    .to_string(),
            ),
        );
        outside_combat.insert("respite_reset".to_string(), Value::Bool(true));
    }

    json!({
        "name": resource,
        "description": description,
        "combat": combat,
        "outside_combat": outside_combat,
        "related_features": {
            "in_combat": format!("{title} in Combat"),
            "outside_combat": format!("{title} Outside of Combat"),
        },
    })
}

fn parse_advancement_table(content: &str) -> Vec<Value> {
    let Some(head) = ADVANCEMENT_HEAD_RE.find(content) else {
        return Vec::new();
    };
    let Some(end) = PARAGRAPH_RE.find(&content[head.end()..]) else {
        return Vec::new();
    };
    let table_text = &content[head.start()..head.end() + end.start()];
    let lines: Vec<&str> = table_text.trim().split('\n').collect();

    let mut advancement = Vec::new();
    for line in lines.iter().skip(2) {
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 2 {
            continue;
        }
        let cells: Vec<&str> = parts[1..parts.len() - 1].iter().map(|c| c.trim()).collect();
        if cells.len() < 2 {
            continue;
        }
        let level_digits = cells[0]
            .replace("st", "")
            .replace("nd", "")
            .replace("rd", "")
            .replace("th", "");
        let Ok(level) = level_digits.parse::<i64>() else {
            continue;
        };

        let features: Vec<Value> = cells[1]
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| Value::String(f.to_string()))
            .collect();

        let mut abilities = Map::new();
        if cells.len() > 2 {
            let sig_count = cells[2].to_lowercase().matches("signature").count() as i64;
            if sig_count > 0 {
                abilities.insert("signature".to_string(), json!(sig_count));
            }
            let costs = number_set(cells[2]);
            if !costs.is_empty() {
                abilities.insert("costs".to_string(), json!(costs));
            }
        }

        let mut subclass_abilities = Value::Null;
        if cells.len() > 3 {
            let costs = number_set(cells[3]);
            if !costs.is_empty() {
                subclass_abilities = json!({"costs": costs});
            }
        }

        advancement.push(json!({
            "level": level,
            "features": features,
            "abilities": abilities,
            "subclass_abilities": subclass_abilities,
        }));
    }
    advancement
}

fn number_set(text: &str) -> Vec<i64> {
    let set: BTreeSet<i64> = NUMBER_WORD_RE
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    set.into_iter().collect()
}

fn parse_ability_pools(content: &str, class_name: &str) -> BTreeMap<i64, Map<String, Value>> {
    let resource = resource_name(class_name);
    let title = title_case(resource);
    let mut pools: BTreeMap<i64, Map<String, Value>> = BTreeMap::new();

    let sections: Vec<(i64, usize, usize)> = LEVEL_SECTION_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0).expect("whole match");
            caps[1]
                .parse::<i64>()
                .ok()
                .map(|level| (level, whole.start(), whole.end()))
        })
        .collect();

    for (i, (level, _, body_start)) in sections.iter().enumerate() {
        let limit = sections
            .get(i + 1)
            .map_or(content.len(), |(_, next_start, _)| *next_start);
        let section = &content[*body_start..limit];
        let level_pools = pools.entry(*level).or_default();

        if *level == 1 {
            let sig_heads: [&Regex; 2] = [&SIG_HEAD_RE, &KIT_SIG_HEAD_RE];
            for head_re in sig_heads {
                let Some(m) = head_re.find(section) else {
                    continue;
                };
                let sig_text = take_until(&section[m.end()..], &SIG_BREAK_RE);
                let names: Vec<String> = H6_NAME_RE
                    .captures_iter(sig_text)
                    .map(|caps| caps[1].to_string())
                    .collect();
                if !names.is_empty() {
                    let count_available = CHOOSE_SIGNATURE_RE
                        .captures(sig_text)
                        .and_then(|caps| word_to_number(&caps[1]))
                        .unwrap_or(1);
                    level_pools.insert(
                        "signature_abilities".to_string(),
                        json!({
                            "cost": 0,
                            "count_available": count_available,
                            "ability_count": names.len(),
                            "ability_ids": ability_ids(&names),
                        }),
                    );
                }
                break;
            }
        }

        for cost in [3, 5, 7, 9, 11] {
            let head = Regex::new(&format!(
                r"(?i)#{{4,6}}\s+{cost}-{title} Abilit(?:y|ies)\s*\n"
            ))
            .expect("valid regex");
            if let Some(m) = head.find(section) {
                let text = pool_section(section, m.end());
                let names = pool_ability_names(text);
                if !names.is_empty() {
                    let count_available = CHOOSE_HEROIC_RE
                        .captures(text)
                        .and_then(|caps| word_to_number(&caps[1]))
                        .unwrap_or(1);
                    level_pools.insert(
                        format!("{cost}_resource_abilities"),
                        json!({
                            "cost": cost,
                            "cost_resource": resource,
                            "count_available": count_available,
                            "ability_count": names.len(),
                            "ability_ids": ability_ids(&names),
                        }),
                    );
                }
            }

            let new_head = Regex::new(&format!(
                r"(?i)#{{4,6}}\s+New {cost}-{title} Abilit(?:y|ies)\s*\n"
            ))
            .expect("valid regex");
            if let Some(m) = new_head.find(section) {
                let text = pool_section(section, m.end());
                let names = pool_ability_names(text);
                if !names.is_empty() {
                    level_pools.insert(
                        format!("{cost}_resource_abilities_new"),
                        json!({
                            "cost": cost,
                            "cost_resource": resource,
                            "count_available": 1,
                            "ability_count": names.len(),
                            "ability_ids": ability_ids(&names),
                        }),
                    );
                }
            }
        }

        let gate = Regex::new(&format!(
            r"(?i)####\s+{level}(?:st|nd|rd|th)-Level \w+ Abilit(?:y|ies)"
        ))
        .expect("valid regex");
        if gate.is_match(section) {
            let head = Regex::new(&format!(
                r"(?i)#####\s+{level}(?:st|nd|rd|th)-Level ([^\n]+?) Abilit(?:y|ies)\s*\n"
            ))
            .expect("valid regex");
            let heads: Vec<(String, usize, usize)> = head
                .captures_iter(section)
                .map(|caps| {
                    let whole = caps.get(0).expect("whole match");
                    (caps[1].trim().to_string(), whole.start(), whole.end())
                })
                .collect();
            let cost_re =
                Regex::new(&format!(r"(?i)\((\d+)\s+{title}")).expect("valid regex");
            for (j, (subclass_full, _, text_start)) in heads.iter().enumerate() {
                let subclass_id = ability_name_to_id(subclass_full);
                let text = match heads.get(j + 1) {
                    Some((_, next_start, _)) => &section[*text_start..*next_start],
                    None => match SUBCLASS_POOL_BREAK_RE.find(&section[*text_start..]) {
                        Some(m) => &section[*text_start..*text_start + m.start()],
                        None => &section[*text_start..],
                    },
                };
                let names = pool_ability_names(text);
                if names.is_empty() {
                    continue;
                }
                let Some(cost) = names.iter().find_map(|name| {
                    cost_re
                        .captures(name)
                        .and_then(|caps| caps[1].parse::<i64>().ok())
                }) else {
                    continue;
                };
                level_pools.insert(
                    format!("{cost}_resource_abilities_{subclass_id}"),
                    json!({
                        "cost": cost,
                        "cost_resource": resource,
                        "subclass": subclass_id,
                        "count_available": 1,
                        "ability_count": names.len(),
                        "ability_ids": ability_ids(&names),
                    }),
                );
            }
        }
    }
    pools
}

fn pool_section<'a>(section: &'a str, start: usize) -> &'a str {
    match POOL_BREAK_RE.find(&section[start..]) {
        Some(m) => &section[start..start + m.start()],
        None => &section[start..],
    }
}

/// Ability headings inside a pool section, blockquoted form first.
fn pool_ability_names(text: &str) -> Vec<String> {
    let names: Vec<String> = QUOTED_H6_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();
    if !names.is_empty() {
        return names;
    }
    PLAIN_H6_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn ability_ids(names: &[String]) -> Vec<Value> {
    names
        .iter()
        .map(|name| Value::String(ability_name_to_id(name)))
        .collect()
}

fn pools_value(pools: &BTreeMap<i64, Map<String, Value>>) -> Value {
    let mut map = Map::new();
    for (level, level_pools) in pools {
        map.insert(level.to_string(), Value::Object(level_pools.clone()));
    }
    Value::Object(map)
}

fn parse_characteristic_increase(content: &str, level: i64) -> Option<Value> {
    let level_head = Regex::new(&format!(
        r"(?i)###\s+{level}(?:st|nd|rd|th)-Level Features"
    ))
    .expect("valid regex");
    let desc = level_head
        .find(content)
        .and_then(|m| {
            let rest = &content[m.end()..];
            CHAR_INCREASE_HEAD_RE
                .find(rest)
                .map(|inc| take_until(&rest[inc.end()..], &H4_BREAK_RE))
        })
        .or_else(|| {
            CHAR_INCREASE_HEAD_RE
                .find(content)
                .map(|inc| take_until(&content[inc.end()..], &H4_BREAK_RE))
        })?;
    let first_para = desc.trim().split("\n\n").next().unwrap_or("").trim();

    if let Some(caps) = INCREASE_PAIR_RE.captures(first_para) {
        let score = caps[3].parse::<i64>().unwrap_or(0);
        return Some(json!([
            {"characteristic": &caps[1], "score": score},
            {"characteristic": &caps[2], "score": score},
        ]));
    }
    if let Some(caps) = INCREASE_ANY_RE.captures(first_para) {
        return Some(json!([
            {"characteristic": &caps[1], "score": caps[2].parse::<i64>().unwrap_or(0)},
            {
                "characteristic": "any",
                "increase": caps[3].parse::<i64>().unwrap_or(0),
                "maximum": caps[4].parse::<i64>().unwrap_or(0),
            },
        ]));
    }
    if let Some(caps) = INCREASE_ALL_RE.captures(first_para) {
        return Some(json!([
            {
                "characteristic": "all",
                "increase": caps[1].parse::<i64>().unwrap_or(0),
                "maximum": caps[2].parse::<i64>().unwrap_or(0),
            },
        ]));
    }
    Some(Value::String(first_para.to_string()))
}

fn quick_build_option(section: &str, section_name: &str) -> Value {
    let Some(caps) = QUICK_BUILD_OPTION_RE.captures(section) else {
        return Value::Null;
    };
    let text = caps[1].trim();
    let text = text.strip_prefix("* ").unwrap_or(text);
    if section_name == "Deity and Domains" {
        return deity_domains_quick_build(text);
    }
    Value::String(text.to_string())
}

fn deity_domains_quick_build(text: &str) -> Value {
    let mut result = Map::new();
    result.insert("description".to_string(), Value::String(text.to_string()));
    if let Some(caps) = QUICK_DEITY_RE.captures(text) {
        result.insert("deity".to_string(), Value::String(caps[1].trim().to_string()));
    }
    if let Some(caps) = QUICK_DOMAINS_RE.captures(text) {
        let domain_text = caps[1].trim();
        let domains: Vec<Value> = if domain_text.contains(" and ") {
            domain_text
                .split(" and ")
                .map(|d| Value::String(d.trim().to_string()))
                .collect()
        } else {
            vec![Value::String(domain_text.to_string())]
        };
        result.insert("domains".to_string(), Value::Array(domains));
    }
    Value::Object(result)
}

fn build_features_by_level(
    advancement: &[Value],
    subclass: &Value,
    pools: &BTreeMap<i64, Map<String, Value>>,
    class_name: &str,
    content: &str,
    aspect_features: Option<&Value>,
) -> Value {
    let mut by_level = Map::new();
    let mut quick_build = Value::Null;

    for level_data in advancement {
        let level = level_data["level"].as_i64().unwrap_or(0);
        let mut features_list: Vec<Value> = Vec::new();

        for feature_name in level_data["features"].as_array().into_iter().flatten() {
            let Some(feature_name) = feature_name.as_str() else {
                continue;
            };
            let feature_id = ability_name_to_id(feature_name);
            let feature_type = classify_feature_type(feature_name, level, subclass);

            let mut feature = Map::new();
            feature.insert("feature_id".to_string(), Value::String(feature_id.clone()));
            feature.insert("feature_name".to_string(), Value::String(feature_name.to_string()));
            feature.insert("feature_type".to_string(), Value::String(feature_type.to_string()));
            feature.insert("description".to_string(), Value::Null);

            if feature_name.contains("Perk") {
                feature.insert(
                    "choice".to_string(),
                    json!({"required": true, "count": 1, "from": "all_perks"}),
                );
            } else if feature_name.contains("Skill") && !feature_name.contains("Increase") {
                let mut choice = Map::new();
                choice.insert("required".to_string(), Value::Bool(true));
                choice.insert("count".to_string(), json!(1));
                choice.insert("from".to_string(), Value::String("all_skills".to_string()));
                if let Some(m) = SKILLS_MARK_RE.find(content) {
                    let section = take_until(&content[m.end()..], &SKILLS_SECTION_BREAK_RE);
                    quick_build = quick_build_option(section, "Skills");
                    if is_truthy(&quick_build) {
                        choice.insert("quick_build".to_string(), quick_build.clone());
                    }
                }
                feature.insert("choice".to_string(), Value::Object(choice));
            } else if feature_name.contains("Characteristic Increase") {
                feature.insert(
                    "choice".to_string(),
                    json!({"required": true, "type": "characteristic_increase"}),
                );
                if let Some(details) = parse_characteristic_increase(content, level) {
                    feature.insert("details".to_string(), details);
                }
            } else if feature_id == "triggered-action" {
                feature.insert(
                    "choice".to_string(),
                    json!({"required": true, "count": 1, "from": "triggered_actions"}),
                );
            } else if feature_type == "deity_and_domains" {
                let domain_count = if class_name == "Conduit" { 2 } else { 1 };
                let domain_desc = if domain_count == 2 {
                    "Choose two domains from your deity's portfolio"
                } else {
                    "Choose one domain from your deity's portfolio"
                };
                let mut choice = Map::new();
                choice.insert("required".to_string(), Value::Bool(true));
                choice.insert(
                    "deity".to_string(),
                    json!({
                        "source": "gods-and-religion",
                        "description": "Choose a god or saint, or create your own deity",
                    }),
                );
                choice.insert(
                    "domains".to_string(),
                    json!({
                        "count": domain_count,
                        "source": "deity_portfolio",
                        "description": domain_desc,
                    }),
                );
                if let Some(m) = DEITY_SECTION_HEAD_RE.find(content) {
                    let section = take_until(&content[m.end()..], &H4_BREAK_RE);
                    quick_build = quick_build_option(section, "Deity and Domains");
                    if is_truthy(&quick_build) {
                        choice.insert("quick_build".to_string(), quick_build.clone());
                    }
                }
                feature.insert("choice".to_string(), Value::Object(choice));
            } else if feature_type == "subclass_choice" {
                let mut choice = Map::new();
                choice.insert("required".to_string(), Value::Bool(true));
                choice.insert(
                    "count".to_string(),
                    json!(subclass["selection_count"].as_i64().unwrap_or(1)),
                );
                choice.insert("options".to_string(), subclass["options"].clone());
                if let Some(name) = subclass["name"].as_str() {
                    let head = Regex::new(&format!(r"#### {}\s*\n", regex::escape(name)))
                        .expect("valid regex");
                    if let Some(m) = head.find(content) {
                        let section = take_until(&content[m.end()..], &H34_BREAK_RE);
                        quick_build = quick_build_option(section, name);
                        if is_truthy(&quick_build) {
                            choice.insert("quick_build".to_string(), quick_build.clone());
                        }
                    }
                }
                feature.insert("choice".to_string(), Value::Object(choice));
            } else if feature_type == "kit_choice" {
                let mut choice = Map::new();
                choice.insert("required".to_string(), Value::Bool(true));
                choice.insert("type".to_string(), Value::String("kit".to_string()));
                choice.insert("description".to_string(), Value::String("Choose a kit".to_string()));
                if let Some(m) = KIT_SENTENCE_RE.find(content) {
                    let section = take_until(&content[m.end()..], &H34_BREAK_RE);
                    quick_build = quick_build_option(section, "Kit");
                    if is_truthy(&quick_build) {
                        choice.insert("quick_build".to_string(), quick_build.clone());
                    }
                }
                feature.insert("choice".to_string(), Value::Object(choice));
            } else if feature_type == "prayer_choice" {
                let mut choice = Map::new();
                choice.insert("required".to_string(), Value::Bool(false));
                choice.insert("type".to_string(), Value::String("prayer".to_string()));
                choice.insert(
                    "description".to_string(),
                    Value::String(
                        "Choose to pray at the start of your turn for bonus piety effects"
                            .to_string(),
                    ),
                );
                if let Some(m) = PRAYER_SECTION_HEAD_RE.find(content) {
                    let section = take_until(&content[m.end()..], &H4_BREAK_RE);
                    quick_build = quick_build_option(section, "Prayer");
                    if is_truthy(&quick_build) {
                        choice.insert("quick_build".to_string(), quick_build.clone());
                    }
                }
                feature.insert("choice".to_string(), Value::Object(choice));
            } else if feature_type == "ward_choice" {
                let mut choice = Map::new();
                choice.insert("required".to_string(), Value::Bool(true));
                choice.insert("type".to_string(), Value::String("ward".to_string()));
                choice.insert(
                    "description".to_string(),
                    Value::String("Choose your conduit ward".to_string()),
                );
                if let Some(m) = WARD_SECTION_HEAD_RE.find(content) {
                    let section = take_until(&content[m.end()..], &H4_BREAK_RE);
                    quick_build = quick_build_option(section, "Conduit Ward");
                    if is_truthy(&quick_build) {
                        choice.insert("quick_build".to_string(), quick_build.clone());
                    }
                }
                feature.insert("choice".to_string(), Value::Object(choice));
            } else if feature_name.contains("Abilities") || feature_name.contains("Ability") {
                let mut choice = ability_choice(feature_name, pools, level);
                if feature_name.contains("Signature") {
                    if let Some(m) = SIG_SECTION_HEAD_RE.find(content) {
                        let section = take_until(&content[m.end()..], &SIG_BREAK_RE);
                        quick_build = quick_build_option(section, feature_name);
                    }
                    if is_truthy(&quick_build) {
                        choice.insert("quick_build".to_string(), quick_build.clone());
                    }
                } else if COST_IN_NAME_RE.is_match(feature_name) {
                    // Cost-ability sections carry no heading of their own
                    // that this lookup recognizes, so the quick build most
                    // recently extracted carries over.
                    if is_truthy(&quick_build) {
                        choice.insert("quick_build".to_string(), quick_build.clone());
                    }
                }
                feature.insert("choice".to_string(), Value::Object(choice));
            }

            if class_name == "Fury" && feature_name == "Aspect Features" {
                if let Some(aspect_features) = aspect_features {
                    feature.insert("subclass_options".to_string(), aspect_features.clone());
                }
            }

            features_list.push(Value::Object(feature));
        }

        if level == 1 && class_name == "Conduit" {
            let piety_feature = json!({
                "feature_id": "domain-piety-and-effects",
                "feature_name": "Domain Piety and Effects",
                "feature_type": "passive",
                "description": Value::Null,
            });
            let index = features_list
                .iter()
                .position(|f| f["feature_name"] == "Piety")
                .unwrap_or(features_list.len());
            let insert_at = (index + 1).min(features_list.len());
            features_list.insert(insert_at, piety_feature);
        }
        if level == 1 && class_name == "Censor" {
            let description = JUDGMENT_HEAD_RE.find(content).map_or(Value::Null, |m| {
                Value::String(take_until(&content[m.end()..], &H34_BREAK_RE).trim().to_string())
            });
            let judgment_feature = json!({
                "feature_id": "judgment-order-benefit",
                "feature_name": "Judgment Order Benefit",
                "feature_type": "passive",
                "description": description,
            });
            let index = features_list
                .iter()
                .position(|f| f["feature_name"] == "Judgment")
                .unwrap_or(features_list.len());
            let insert_at = (index + 1).min(features_list.len());
            features_list.insert(insert_at, judgment_feature);
        }

        by_level.insert(level.to_string(), Value::Array(features_list));
    }
    Value::Object(by_level)
}

fn classify_feature_type(feature_name: &str, level: i64, subclass: &Value) -> &'static str {
    let name_lower = feature_name.to_lowercase();
    let subclass_name = subclass["name"].as_str().unwrap_or("");
    let subclass_type = subclass["type"].as_str().unwrap_or("");

    if name_lower.contains("perk") {
        "perk_choice"
    } else if name_lower.contains("skill") && !name_lower.contains("increase") {
        "skill_choice"
    } else if name_lower.contains("characteristic increase") {
        "stat_increase"
    } else if name_lower.contains("abilities") || name_lower.contains("ability") {
        "ability_choice"
    } else if feature_name == "Deity and Domains" {
        "deity_and_domains"
    } else if level == 1 && !subclass_name.is_empty() && name_lower == subclass_name.to_lowercase()
    {
        "subclass_choice"
    } else if (!subclass_type.is_empty() && name_lower.contains(subclass_type))
        || name_lower.contains("order")
        || name_lower.contains("domain")
        || name_lower.contains("aspect")
    {
        "subclass_feature"
    } else if name_lower.contains("kit") {
        "kit_choice"
    } else if name_lower == "prayer" {
        "prayer_choice"
    } else if name_lower == "conduit ward" {
        "ward_choice"
    } else if name_lower == "triggered action" {
        "triggered_action"
    } else {
        "passive"
    }
}

fn ability_choice(
    feature_name: &str,
    pools: &BTreeMap<i64, Map<String, Value>>,
    level: i64,
) -> Map<String, Value> {
    let mut choice = Map::new();
    choice.insert("required".to_string(), Value::Bool(true));
    let empty = Map::new();
    let level_pools = pools.get(&level).unwrap_or(&empty);

    if feature_name.contains("Signature") {
        let pool = level_pools
            .get("signature_abilities")
            .and_then(Value::as_object);
        choice.insert(
            "count".to_string(),
            json!(pool
                .and_then(|p| p.get("count_available"))
                .and_then(Value::as_i64)
                .unwrap_or(1)),
        );
        choice.insert("from".to_string(), Value::String("signature_abilities".to_string()));
        choice.insert(
            "options".to_string(),
            pool.and_then(|p| p.get("ability_ids")).cloned().unwrap_or_else(|| json!([])),
        );
        return choice;
    }

    let Some(caps) = COST_IN_NAME_RE.captures(feature_name) else {
        return choice;
    };
    let Ok(cost) = caps[1].parse::<i64>() else {
        return choice;
    };
    let pool_key = format!("{cost}_resource_abilities");
    let mut pool: Option<Map<String, Value>> =
        level_pools.get(&pool_key).and_then(Value::as_object).cloned();

    if feature_name.contains("New") {
        let new_pool = level_pools
            .get(&format!("{cost}_resource_abilities_new"))
            .and_then(Value::as_object);
        let new_ids: Vec<Value> = new_pool
            .and_then(|p| p.get("ability_ids"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut old_ids: Vec<Value> = Vec::new();
        match &pool {
            None => {
                for search_level in (1..level).rev() {
                    let found = pools
                        .get(&search_level)
                        .and_then(|lp| lp.get(&pool_key))
                        .and_then(Value::as_object);
                    if let Some(found) = found {
                        old_ids = found
                            .get("ability_ids")
                            .and_then(Value::as_array)
                            .cloned()
                            .unwrap_or_default();
                        pool = Some(found.clone());
                        break;
                    }
                }
            }
            Some(p) => {
                old_ids = p
                    .get("ability_ids")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
            }
        }

        if !new_ids.is_empty() || !old_ids.is_empty() {
            let cost_resource = new_pool
                .and_then(|p| p.get("cost_resource"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    pool.as_ref()
                        .and_then(|p| p.get("cost_resource"))
                        .and_then(Value::as_str)
                })
                .unwrap_or("")
                .to_string();
            let mut merged = new_ids;
            merged.extend(old_ids);
            let mut rebuilt = Map::new();
            rebuilt.insert("cost".to_string(), json!(cost));
            rebuilt.insert("cost_resource".to_string(), Value::String(cost_resource));
            rebuilt.insert("count_available".to_string(), json!(1));
            rebuilt.insert("ability_count".to_string(), json!(merged.len()));
            rebuilt.insert("ability_ids".to_string(), Value::Array(merged));
            pool = Some(rebuilt);
        }
    }

    if pool.is_none() {
        let prefix = format!("{cost}_resource_abilities_");
        if level_pools.keys().any(|key| key.starts_with(&prefix)) {
            // Subclass-specific pools: which options apply depends on the
            // subclass chosen, so none are listed here.
            choice.insert("count".to_string(), json!(1));
            choice.insert("cost".to_string(), json!(cost));
            return choice;
        }
    }

    let pool = pool.unwrap_or_default();
    choice.insert(
        "count".to_string(),
        json!(pool.get("count_available").and_then(Value::as_i64).unwrap_or(1)),
    );
    choice.insert("cost".to_string(), json!(cost));
    choice.insert("from".to_string(), Value::String(pool_key));
    choice.insert(
        "options".to_string(),
        pool.get("ability_ids").cloned().unwrap_or_else(|| json!([])),
    );
    choice
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

    fn write_class(tmp: &PathBuf, name: &str, content: &str) {
        let dir = tmp.join("Classes");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    const FURY_CLASS: &str = "\
---\n\
item_id: fury\n\
item_name: Fury\n\
item_index: '04'\n\
source: mcdm.heroes.v1\n\
type: class\n\
---\n\n\
## Fury\n\n\
You channel primordial [rage](../rules.md) into devastating strikes.\n\n\
<!-- -->\n\n\
> \"Do not mistake my fury for recklessness.\"\n\
>\n\
> **Oruk Bloodcaller**\n\n\
### Basics\n\n\
**Starting Characteristics:** You start with a Might of 2 and an Agility \
of 2. Your other scores come from one of the following arrays:\n\n\
- 2, −1, −1\n\
- 1, 1, −1\n\n\
**Weak Potency:** M < [weak]\n\n\
**Average Potency:** M < [average]\n\n\
**Strong Potency:** M < [strong]\n\n\
**Starting Stamina at 1st Level:** 21\n\n\
**Stamina Gained at 2nd and Higher Levels:** 12\n\n\
**Recoveries:** 10\n\n\
**Skills:** You gain the Nature and Endurance skills (*Quick Build:* \
Nature, Climb). Then choose two skills from the exploration skill group.\n\n\
### Class Features\n\n\
| Level | Features | Abilities |\n\
| ----- | -------- | --------- |\n\
| 1st | Primordial Aspect, Ferocity, Signature Ability | 2 signature |\n\
| 2nd | Perk, Characteristic Increase, Aspect Features | 3 |\n\n\
#### Primordial Aspect\n\n\
You embody a primordial force. (*Quick Build:* Berserker)\n\n\
- **Berserker:** You channel your rage into raw strength. You gain the Lift skill.\n\
- **Reaver:** You stalk and slaughter. You gain one skill from the intrigue group.\n\n\
###### 1st-Level Aspect Features Table\n\n\
| Aspect | Features |\n\
| ------ | -------- |\n\
| Berserker | Primordial Strength, Relentless Toughness |\n\
| Reaver | Primordial Cunning |\n\n\
#### Ferocity\n\n\
When you take or deal damage, your ferocity rises.\n\n\
##### Ferocity in Combat\n\n\
At the start of a combat encounter, you gain ferocity equal to your \
Victories. At the start of each of your turns, you gain 1d3 ferocity. \
Additionally, the first time you take damage in a round, you gain 2 ferocity.\n\n\
##### Ferocity Outside of Combat\n\n\
You can use ferocity abilities outside of combat.\n\n\
### 1st-Level Features\n\n\
#### Signature Ability\n\n\
Choose two signature abilities. (*Quick Build:* Brutal Slam)\n\n\
###### Brutal Slam\n\n\
###### Knife Dance\n\n\
#### 3-Ferocity Abilities\n\n\
Choose one heroic ability.\n\n\
###### Whirlwind (3 Ferocity)\n\n\
### 2nd-Level Features\n\n\
#### Perk\n\n\
You gain a perk.\n\n\
#### Characteristic Increase\n\n\
Your Might and Agility scores each increase to 3.\n";

    #[test]
    fn class_basics_resource_and_advancement() {
        let tmp = temp_dir();
        write_class(&tmp, "Fury.md", FURY_CLASS);

        let value = ClassesParser.parse(&ParseContext::new(&tmp)).unwrap();
        let class = &value.as_array().unwrap()[0];
        assert_eq!(class["item_id"], "fury");
        assert_eq!(class["item_name"], "Fury");
        assert_eq!(
            class["description"],
            "You channel primordial rage into devastating strikes."
        );
        assert_eq!(class["quote"]["author"], "Oruk Bloodcaller");

        let basics = &class["basics"];
        assert_eq!(
            basics["starting_characteristics"]["required"],
            json!(["Might", "Agility"])
        );
        assert_eq!(
            basics["starting_characteristics"]["arrays"],
            json!([[2, -1, -1], [1, 1, -1]])
        );
        assert_eq!(basics["potency"]["weak"], "M < [weak]");
        assert_eq!(basics["stamina"], json!({"starting": 21, "per_level": 12}));
        assert_eq!(basics["recoveries"], 10);
        assert_eq!(basics["skills"]["given"], json!(["Nature", "Endurance"]));
        assert_eq!(
            basics["skills"]["choices"],
            json!([{
                "count": 2,
                "from": [{"type": "group", "value": "exploration"}],
                "operator": "OR",
            }])
        );
        assert_eq!(basics["skills"]["quick_build"], json!(["Nature", "Climb"]));

        let resource = &class["heroic_resource"];
        assert_eq!(resource["name"], "ferocity");
        assert_eq!(
            resource["description"],
            "When you take or deal damage, your ferocity rises."
        );
        assert_eq!(resource["combat"]["starting"], "Victories");
        assert_eq!(resource["combat"]["per_turn"], "1d3");
        assert_eq!(
            resource["combat"]["triggers"],
            json!([{
                "condition": "Additionally, the first time you take damage in a round",
                "amount": "2",
            }])
        );
        assert_eq!(resource["outside_combat"]["respite_reset"], true);
        assert_eq!(resource["related_features"]["in_combat"], "Ferocity in Combat");

        let advancement = class["advancement_table"].as_array().unwrap();
        assert_eq!(advancement.len(), 2);
        assert_eq!(advancement[0]["level"], 1);
        assert_eq!(
            advancement[0]["features"],
            json!(["Primordial Aspect", "Ferocity", "Signature Ability"])
        );
        assert_eq!(advancement[0]["abilities"], json!({"signature": 1, "costs": [2]}));
        assert_eq!(advancement[0]["subclass_abilities"], Value::Null);
        assert_eq!(advancement[1]["abilities"], json!({"costs": [3]}));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn subclass_options_pools_and_feature_wiring() {
        let tmp = temp_dir();
        write_class(&tmp, "Fury.md", FURY_CLASS);

        let value = ClassesParser.parse(&ParseContext::new(&tmp)).unwrap();
        let class = &value.as_array().unwrap()[0];

        let subclass = &class["subclass"];
        assert_eq!(subclass["type"], "aspect");
        assert_eq!(subclass["name"], "Primordial Aspect");
        assert_eq!(subclass["selection_count"], 1);
        let options = subclass["options"].as_array().unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0]["id"], "berserker");
        assert_eq!(options[0]["skill_granted"], "Lift");
        assert_eq!(
            options[1]["skill_granted"],
            json!({
                "type": "choice",
                "count": 1,
                "from": {"type": "group", "value": "intrigue"},
            })
        );

        let pools = &class["ability_pools"];
        assert_eq!(
            pools["1"]["signature_abilities"],
            json!({
                "cost": 0,
                "count_available": 2,
                "ability_count": 2,
                "ability_ids": ["brutal-slam", "knife-dance"],
            })
        );
        assert_eq!(
            pools["1"]["3_resource_abilities"]["ability_ids"],
            json!(["whirlwind"])
        );
        assert_eq!(pools["1"]["3_resource_abilities"]["cost_resource"], "ferocity");
        assert_eq!(pools["2"], json!({}));

        let first_level = class["features_by_level"]["1"].as_array().unwrap();
        assert_eq!(first_level[0]["feature_id"], "primordial-aspect");
        assert_eq!(first_level[0]["feature_type"], "subclass_choice");
        assert_eq!(first_level[0]["choice"]["count"], 1);
        assert_eq!(first_level[0]["choice"]["quick_build"], "Berserker");
        assert_eq!(first_level[1]["feature_type"], "passive");
        assert_eq!(first_level[2]["feature_type"], "ability_choice");
        assert_eq!(
            first_level[2]["choice"],
            json!({
                "required": true,
                "count": 2,
                "from": "signature_abilities",
                "options": ["brutal-slam", "knife-dance"],
                "quick_build": "Brutal Slam",
            })
        );

        let second_level = class["features_by_level"]["2"].as_array().unwrap();
        assert_eq!(second_level[0]["feature_type"], "perk_choice");
        assert_eq!(second_level[1]["feature_type"], "stat_increase");
        assert_eq!(
            second_level[1]["details"],
            json!([
                {"characteristic": "Might", "score": 3},
                {"characteristic": "Agility", "score": 3},
            ])
        );
        assert_eq!(second_level[2]["feature_type"], "subclass_feature");
        assert_eq!(
            second_level[2]["subclass_options"],
            json!({
                "berserker": ["primordial-strength", "relentless-toughness"],
                "reaver": ["primordial-cunning"],
            })
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_classes_directory_is_an_error() {
        let tmp = temp_dir();
        assert!(ClassesParser.parse(&ParseContext::new(&tmp)).is_err());
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
