//! Class features: granted abilities, bonuses, and subclass wiring.
//!
//! Feature documents live under `Features/{Class}/{Level}/` and mix
//! prose with embedded ability blockquotes, reference tables, and
//! subclass selector lists. A file holding several embedded abilities
//! is split into one record per ability, with identifiers rewritten to
//! the ability's slug. After the walk, subclass names are attached to
//! records in three passes: the Elementalist specialization table,
//! subclass option tables found in class documents, and the
//! college-to-feature listings inside selector features.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use rulesforge_document::text::{slugify, take_until};
use rulesforge_document::{
    benefit_rows, heading_tables, parse_damage_clause, parse_stat_block, Document, StatBlock,
};
use rulesforge_shared::{Category, Result};

use crate::ancestries::fold_characteristic_type;
use crate::context::{self, ParseContext};
use crate::{is_truthy, title_case, CategoryParser};

const SUBCLASS_TERMS: [&str; 7] = [
    "college",
    "school",
    "tradition",
    "subclass",
    "specialization",
    "discipline",
    "order",
];
const FEATURE_TERMS: [&str; 2] = ["feature", "ability"];

static EMBEDDED_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*#{5,6}\s+([^\n]+)\n").expect("valid regex"));

static BLOCKQUOTE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^>\s*").expect("valid regex"));

static FIRST_ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*").expect("valid regex"));

static POWER_ROLL_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Power Roll \+ ([^:]+):\*\*").expect("valid regex"));

static TIER_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\s*\*\*([^:]+):\*\*").expect("valid regex"));

static TIER_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n-\s*\*\*").expect("valid regex"));

static PERSISTENT_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Persistent (\d+):\*\*\s*").expect("valid regex"));

static SPEND_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Spend (\d+\+?) ([^:]+):\*\*\s*").expect("valid regex"));

static SPEND_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n\*\*Spend").expect("valid regex"));

static TRIGGER_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Trigger:\*\*\s*").expect("valid regex"));

static BOLD_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n\*\*|\n\*\*").expect("valid regex"));

static BEFORE_ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*🎯[^*]+\*\*|\*\*Trigger:\*\*[^\n]+").expect("valid regex"));

static EFFECT_PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n\*\*Effect:\*\*\s*").expect("valid regex"));

static BEFORE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\n\*\*Power Roll").expect("valid regex"));

static AFTER_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\*\*Power Roll.+?\n(?:- \*\*[^*]+\*\*[^*]*\n)+.*?\n\n\*\*Effect:\*\*\s*")
        .expect("valid regex")
});

static AFTER_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n\n\*\*Mark Benefit|\n\n\*\*Persistent|\n\n\*\*Spend").expect("valid regex")
});

static SOLO_EFFECT_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Effect:\*\*\s*").expect("valid regex"));

static SOLO_EFFECT_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n>\s*#{5,6}").expect("valid regex"));

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

static SKILL_CHOICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you gain (?:one|two|three|(\d+)) skills? of your choice").expect("valid regex")
});

static SKILL_GAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you gain the ([A-Z][a-z]+(?: [A-Z][a-z]+)*) skill\.").expect("valid regex")
});

static SKILL_HAVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you have the ([A-Z][a-z]+(?: [A-Z][a-z]+)*) skill\.").expect("valid regex")
});

static SKILL_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(one|two|three|\d+) skills?").expect("valid regex"));

static PERK_CHOICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you gain (?:one|two|three|(\d+)) perks? of your choice").expect("valid regex")
});

static PERK_GAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)you gain a? (\w+) perk").expect("valid regex"));

static PERK_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(one|two|three|\d+) perks?").expect("valid regex"));

static KIT_USE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you can use and gain the benefits of (?:a |one |two |three |(\d+ ))?kits?")
        .expect("valid regex")
});

static KIT_GAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you gain (?:a |the )?([A-Z][a-z]+(?: [A-Z][a-z]+)*) kit").expect("valid regex")
});

static QUICK_BUILD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\*Quick Build:\*\s*([^)]+)\)").expect("valid regex"));

static CHAR_ALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)each of your characteristic scores increases by (\d+)").expect("valid regex")
});

static CHAR_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)your (\w+) and (\w+) scores each increase to (\d+)").expect("valid regex")
});

static CHAR_SINGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)your (\w+) score increases to (\d+)").expect("valid regex"));

static CHAR_ANY_ALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)characteristic scores increase by (\d+)").expect("valid regex")
});

static MAXIMUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"maximum of (\d+)").expect("valid regex"));

static BONUS_GAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)you gain a \+(\d+) bonus to (\w+)").expect("valid regex"));

static BONUS_HAVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)you have a \+(\d+) bonus to (\w+)").expect("valid regex"));

static BONUS_PLAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)you gain \+(\d+) (\w+)").expect("valid regex"));

static BONUS_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)you gain a \+(\d+) bonus to (\w+) and (\w+)").expect("valid regex")
});

static BONUS_SCALING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)you gain a \+(\d+) bonus to (\w+), and this bonus increases by (\d+) at (\d+)(?:th|st|nd|rd),? (\d+)(?:th|st|nd|rd),? and (\d+)(?:th|st|nd|rd) levels",
    )
    .expect("valid regex")
});

static SCALING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:that|this) bonus increases by (\d+) at (\d+)(?:th|st|nd|rd),? (\d+)(?:th|st|nd|rd),? and (\d+)(?:th|st|nd|rd) levels",
    )
    .expect("valid regex")
});

static SUBCLASS_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)-\s*\*\*([^*]+)\*\*:\s*(.+?)\s*You have the ([A-Z][a-z]+(?: [A-Z][a-z]+)*) skill\.?",
    )
    .expect("valid regex")
});

static COLLEGE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\| College\s*\| Feature\s*\|[\s\S]*?\| (Black Ash|Caustic Alchemy|Harlequin Mask)\s*\| ([^\|]+)\s*\|",
    )
    .expect("valid regex")
});

static COLLEGE_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^College of (?:the )?").expect("valid regex"));

static COLLEGE_PREFIX_CI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^college of (?:the )?").expect("valid regex"));

static SUBCLASS_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)college|school|tradition|specialization|discipline|subclass")
        .expect("valid regex")
});

static ELEMENTAL_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"###### 1st-Level Elemental Specialization Features Table\s*\n\s*\|[^\n]+\|[^\n]+\|\s*\n\s*\|[:\-\s|]+\|\s*\n((?:\s*\|[^\n]+\|[^\n]+\|\s*\n)+)",
    )
    .expect("valid regex")
});

static FEATURE_LIST_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",|;|/|\\n").expect("valid regex"));

static ABILITY_BLOCK_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*#{5,6}\s+[^\n]+\n").expect("valid regex"));

static MAJOR_HEADING_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n#{1,4}[^#]").expect("valid regex"));

static TABLE_SECTION_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)#{4,6}\s+[^\n]*Table").expect("valid regex"));

static SECTION_HEADING_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n#{1,3}[^#]").expect("valid regex"));

static HTML_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));

static EXTRA_BLANK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

pub struct FeaturesParser;

impl CategoryParser for FeaturesParser {
    fn category(&self) -> Category {
        Category::Features
    }

    fn parse(&self, ctx: &ParseContext) -> Result<Value> {
        let mut subclass_by_slug = elemental_specializations(ctx)?;
        for (slug, subclass) in class_table_subclasses(ctx)? {
            subclass_by_slug.entry(slug).or_insert(subclass);
        }
        let option_tables = class_option_tables(ctx)?;

        let mut features = Vec::new();
        for class_dir in ctx.subdirectories(&ctx.rules_path("Features"))? {
            for level_dir in ctx.subdirectories(&class_dir)? {
                for path in ctx.markdown_files(&level_dir)? {
                    if context::file_name(&path) == "Index.md" {
                        continue;
                    }
                    let Some(doc) = ctx.load_document(&path)? else {
                        continue;
                    };
                    features.extend(parse_feature(&doc, &subclass_by_slug));
                }
            }
        }

        attach_option_tables(&mut features, &option_tables);
        assign_subclasses(&mut features);

        Ok(Value::Array(features))
    }
}

fn parse_feature(doc: &Document, subclass_by_slug: &HashMap<String, String>) -> Vec<Value> {
    let body = &doc.body;
    let abilities = extract_embedded_abilities(body);
    let stat_block = parse_stat_block(body);
    let grants = extract_grants(body, doc.field_or_default("item_name"));
    let mut subclass_options = extract_subclass_options(body);
    let tables = extract_tables(body);
    if subclass_options.is_empty() && !tables.is_empty() {
        subclass_options = options_from_tables(&tables);
    }
    let benefits = threshold_benefits(body);
    let description = clean_feature_content(body);

    if abilities.len() > 1 {
        // One record per embedded ability, identifiers rewritten to the
        // ability's slug while the rest of the frontmatter is shared.
        abilities
            .into_iter()
            .map(|ability| {
                let mut record = doc.frontmatter.clone();
                let slug = slugify(ability["name"].as_str().unwrap_or(""));
                record.insert("item_id".to_string(), Value::String(slug.clone()));
                record.insert("item_name".to_string(), ability["name"].clone());
                if let Some(type_str) = record.get("type").and_then(Value::as_str) {
                    let rewritten = match type_str.rsplit_once(':') {
                        Some((prefix, _)) => format!("{prefix}:{slug}"),
                        None => match type_str.rsplit_once('/') {
                            Some((prefix, _)) => format!("{prefix}/{slug}"),
                            None => format!("{type_str}/{slug}"),
                        },
                    };
                    record.insert("type".to_string(), Value::String(rewritten));
                }
                if let Some(scc) = record.get("scc").and_then(Value::as_array).cloned() {
                    let updated: Vec<Value> = scc
                        .iter()
                        .map(|item| match item.as_str().and_then(|s| s.rsplit_once(':')) {
                            Some((prefix, _)) => Value::String(format!("{prefix}:{slug}")),
                            None => item.clone(),
                        })
                        .collect();
                    record.insert("scc".to_string(), Value::Array(updated));
                }
                record.insert("description".to_string(), Value::String(description.clone()));
                record.insert("abilities".to_string(), json!([ability]));
                finish_feature_record(
                    &mut record,
                    &grants,
                    &benefits,
                    &tables,
                    &subclass_options,
                    stat_block.as_ref(),
                    subclass_by_slug,
                );
                Value::Object(record)
            })
            .collect()
    } else {
        let mut record = doc.frontmatter.clone();
        record.insert("description".to_string(), Value::String(description));
        if !abilities.is_empty() {
            record.insert("abilities".to_string(), Value::Array(abilities));
        }
        finish_feature_record(
            &mut record,
            &grants,
            &benefits,
            &tables,
            &subclass_options,
            stat_block.as_ref(),
            subclass_by_slug,
        );
        vec![Value::Object(record)]
    }
}

fn finish_feature_record(
    record: &mut Map<String, Value>,
    grants: &Map<String, Value>,
    benefits: &[Value],
    tables: &[Value],
    subclass_options: &[Value],
    stat_block: Option<&StatBlock>,
    subclass_by_slug: &HashMap<String, String>,
) {
    if !grants.is_empty() {
        record.insert("grants".to_string(), Value::Object(grants.clone()));
    }
    if !benefits.is_empty() {
        record.insert("benefits".to_string(), Value::Array(benefits.to_vec()));
    }
    if !tables.is_empty() {
        record.insert("tables".to_string(), Value::Array(tables.to_vec()));
    }
    if !subclass_options.is_empty() {
        record.insert(
            "subclass_options".to_string(),
            Value::Array(subclass_options.to_vec()),
        );
    }
    if let Some(stat_block) = stat_block {
        if let Ok(value) = serde_json::to_value(stat_block) {
            record.insert("stat_block".to_string(), value);
        }
    }
    if record.get("class").and_then(Value::as_str) == Some("elementalist") {
        let assigned = record
            .get("item_id")
            .and_then(Value::as_str)
            .and_then(|id| subclass_by_slug.get(id))
            .cloned();
        if let Some(subclass) = assigned {
            record.insert("subclass".to_string(), Value::String(subclass));
        }
    }
}

/// Specialization table in the Elementalist class document, mapped by
/// feature slug. Missing file or table just yields an empty map.
fn elemental_specializations(ctx: &ParseContext) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    let path = ctx.rules_path("Classes").join("Elementalist.md");
    if !path.exists() {
        return Ok(map);
    }
    let content = ctx.read(&path)?;
    let Some(caps) = ELEMENTAL_TABLE_RE.captures(&content) else {
        return Ok(map);
    };
    for line in caps[1].trim().split('\n') {
        if !line.contains('|') {
            continue;
        }
        let parts: Vec<&str> = line.split('|').collect();
        if parts.len() < 4 {
            continue;
        }
        let cells: Vec<&str> = parts[1..parts.len() - 1].iter().map(|c| c.trim()).collect();
        if cells.len() >= 2 {
            map.insert(slugify(cells[1]), title_case(cells[0]));
        }
    }
    Ok(map)
}

/// Subclass-to-feature tables anywhere in the class documents, mapped
/// by feature slug to the subclass short name.
fn class_table_subclasses(ctx: &ParseContext) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    let classes_dir = ctx.rules_path("Classes");
    if !classes_dir.is_dir() {
        return Ok(map);
    }
    for path in ctx.markdown_files(&classes_dir)? {
        let content = ctx.read(&path)?;
        for table in extract_tables(&content) {
            let name = table["name"].as_str().unwrap_or("").to_lowercase();
            let joined = lower_headers(&table).join(" ");
            let likely = SUBCLASS_TERMS.iter().any(|term| name.contains(term))
                || SUBCLASS_TERMS.iter().any(|term| joined.contains(term));
            if !likely {
                continue;
            }
            for row in table["data"].as_array().into_iter().flatten() {
                let Some(row) = row.as_object() else {
                    continue;
                };
                let (Some(subclass_key), Some(feature_key)) = row_keys(row) else {
                    continue;
                };
                let subclass_name = row.get(subclass_key).and_then(Value::as_str).unwrap_or("");
                let features_str = row
                    .get(feature_key)
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim();
                if features_str.is_empty() {
                    continue;
                }
                let short = COLLEGE_PREFIX_CI_RE
                    .replace(subclass_name.trim(), "")
                    .trim()
                    .to_string();
                for feature in split_feature_list(features_str) {
                    let slug = slugify(&feature);
                    if !slug.is_empty() {
                        map.insert(slug, short.clone());
                    }
                }
            }
        }
    }
    Ok(map)
}

/// Tables in class documents that pair a subclass column with a feature
/// column, keyed by lowercase class name.
fn class_option_tables(ctx: &ParseContext) -> Result<HashMap<String, Vec<Value>>> {
    let mut result = HashMap::new();
    let classes_dir = ctx.rules_path("Classes");
    if !classes_dir.is_dir() {
        return Ok(result);
    }
    for path in ctx.markdown_files(&classes_dir)? {
        let content = ctx.read(&path)?;
        let filtered: Vec<Value> = extract_tables(&content)
            .into_iter()
            .filter(|table| {
                let headers = lower_headers(table);
                let has_subclass = headers.iter().any(|header| {
                    SUBCLASS_TERMS
                        .iter()
                        .any(|term| header.contains(term) && !header.contains("abilit"))
                });
                let has_feature = headers
                    .iter()
                    .any(|header| FEATURE_TERMS.iter().any(|term| header.contains(term)));
                has_subclass && has_feature
            })
            .collect();
        if !filtered.is_empty() {
            result.insert(context::file_stem(&path).to_lowercase(), filtered);
        }
    }
    Ok(result)
}

fn lower_headers(table: &Value) -> Vec<String> {
    table["headers"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_lowercase)
        .collect()
}

/// First row keys that look like a subclass column and a feature
/// column, falling back to the first two columns.
fn row_keys(row: &Map<String, Value>) -> (Option<&str>, Option<&str>) {
    let mut subclass_key = None;
    let mut feature_key = None;
    for key in row.keys() {
        let lowered = key.to_lowercase();
        if subclass_key.is_none() && SUBCLASS_TERMS.iter().any(|term| lowered.contains(term)) {
            subclass_key = Some(key.as_str());
        }
        if feature_key.is_none() && FEATURE_TERMS.iter().any(|term| lowered.contains(term)) {
            feature_key = Some(key.as_str());
        }
    }
    let keys: Vec<&str> = row.keys().map(String::as_str).collect();
    if subclass_key.is_none() && !keys.is_empty() {
        subclass_key = Some(keys[0]);
    }
    if feature_key.is_none() && keys.len() >= 2 {
        feature_key = Some(keys[1]);
    }
    (subclass_key, feature_key)
}

fn split_feature_list(features_str: &str) -> Vec<String> {
    FEATURE_LIST_SPLIT_RE
        .split(features_str)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build subclass options from the first table that looks like a
/// subclass-to-feature listing.
fn options_from_tables(tables: &[Value]) -> Vec<Value> {
    for table in tables {
        let name = table["name"].as_str().unwrap_or("").to_lowercase();
        let joined = lower_headers(table).join(" ");
        let likely = SUBCLASS_TERMS.iter().any(|term| name.contains(term))
            || SUBCLASS_TERMS.iter().any(|term| joined.contains(term));
        if !likely {
            continue;
        }

        let mut constructed = Vec::new();
        for row in table["data"].as_array().into_iter().flatten() {
            let Some(row) = row.as_object() else {
                continue;
            };
            let (Some(subclass_key), Some(feature_key)) = row_keys(row) else {
                continue;
            };
            let college_name = row
                .get(subclass_key)
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim();
            let features_str = row
                .get(feature_key)
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim();
            let features_list = split_feature_list(features_str);
            let option_name = if !college_name.is_empty() && !SUBCLASS_NAME_RE.is_match(college_name)
            {
                format!("College of {college_name}")
            } else {
                college_name.to_string()
            };
            constructed.push(json!({"name": option_name, "features": features_list}));
        }
        if !constructed.is_empty() {
            return constructed;
        }
    }
    Vec::new()
}

/// Attach class-document option tables to selector features such as
/// "Talent Tradition" that name a subclass concept.
fn attach_option_tables(features: &mut [Value], option_tables: &HashMap<String, Vec<Value>>) {
    for feature in features {
        let Some(record) = feature.as_object_mut() else {
            continue;
        };
        let Some(class) = record.get("class").and_then(Value::as_str) else {
            continue;
        };
        let Some(tables) = option_tables.get(&class.to_lowercase()) else {
            continue;
        };
        let name = record
            .get("item_name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase();
        if !SUBCLASS_TERMS.iter().any(|term| name.contains(term)) {
            continue;
        }

        let mut constructed = Vec::new();
        for table in tables {
            for row in table["data"].as_array().into_iter().flatten() {
                let Some(row) = row.as_object() else {
                    continue;
                };
                let (Some(subclass_key), Some(feature_key)) = row_keys(row) else {
                    continue;
                };
                let subclass_name = row
                    .get(subclass_key)
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim();
                let features_str = row
                    .get(feature_key)
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim();
                if subclass_name.is_empty() || features_str.is_empty() {
                    continue;
                }
                constructed.push(json!({
                    "name": subclass_name,
                    "features": split_feature_list(features_str),
                }));
            }
        }
        if !constructed.is_empty() && !record.get("subclass_options").is_some_and(is_truthy) {
            record.insert("subclass_options".to_string(), Value::Array(constructed));
        }
    }
}

/// Propagate subclass short names onto the features the selector
/// listings point at, first by exact name, then by slug.
fn assign_subclasses(features: &mut [Value]) {
    let mut by_name: HashMap<String, String> = HashMap::new();
    for feature in features.iter() {
        for option in feature["subclass_options"].as_array().into_iter().flatten() {
            let college = option["name"].as_str().unwrap_or("");
            let short = COLLEGE_PREFIX_CI_RE.replace(college, "").trim().to_string();
            for name in option["features"].as_array().into_iter().flatten() {
                if let Some(name) = name.as_str() {
                    if !name.is_empty() {
                        by_name.insert(name.to_string(), short.clone());
                    }
                }
            }
        }
    }
    for feature in features.iter_mut() {
        let Some(record) = feature.as_object_mut() else {
            continue;
        };
        let Some(short) = record
            .get("item_name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .and_then(|name| by_name.get(name))
            .cloned()
        else {
            continue;
        };
        if !record.get("subclass").is_some_and(is_truthy) {
            record.insert("subclass".to_string(), Value::String(short));
        }
    }

    let mut slug_to_index: HashMap<String, usize> = HashMap::new();
    for (index, feature) in features.iter().enumerate() {
        let Some(record) = feature.as_object() else {
            continue;
        };
        let item_id = record
            .get("item_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty());
        let Some(fallback) = item_id.or_else(|| {
            record
                .get("item_name")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
        }) else {
            continue;
        };
        let name = record
            .get("item_name")
            .and_then(Value::as_str)
            .unwrap_or(fallback);
        slug_to_index.insert(slugify(name), index);
    }
    let mut assignments: Vec<(usize, String)> = Vec::new();
    for feature in features.iter() {
        for option in feature["subclass_options"].as_array().into_iter().flatten() {
            let college = option["name"].as_str().unwrap_or("");
            let short = COLLEGE_PREFIX_CI_RE.replace(college, "").trim().to_string();
            for name in option["features"].as_array().into_iter().flatten() {
                let Some(name) = name.as_str().filter(|name| !name.is_empty()) else {
                    continue;
                };
                if let Some(&index) = slug_to_index.get(&slugify(name)) {
                    assignments.push((index, short.clone()));
                }
            }
        }
    }
    for (index, short) in assignments {
        let Some(record) = features[index].as_object_mut() else {
            continue;
        };
        if !record.get("subclass").is_some_and(is_truthy) {
            record.insert("subclass".to_string(), Value::String(short));
        }
    }
}

fn extract_embedded_abilities(body: &str) -> Vec<Value> {
    let heads: Vec<(String, usize, usize)> = EMBEDDED_HEAD_RE
        .captures_iter(body)
        .map(|caps| {
            let whole = caps.get(0).expect("whole match");
            (caps[1].trim().to_string(), whole.start(), whole.end())
        })
        .collect();

    let mut abilities = Vec::new();
    for (i, (name, _, text_start)) in heads.iter().enumerate() {
        let limit = heads.get(i + 1).map_or(body.len(), |(_, next_start, _)| *next_start);
        let text = body[*text_start..limit].trim();
        if !text.is_empty() {
            abilities.push(embedded_ability(text, name));
        }
    }
    abilities
}

fn embedded_ability(raw: &str, name: &str) -> Value {
    let stripped = BLOCKQUOTE_PREFIX_RE.replace_all(raw, "");
    let text = stripped.trim();

    let power_roll = embedded_power_roll(text);
    let effects = embedded_effects(text, power_roll.is_some());
    let persistent = embedded_persistent(text);
    let cost_options = embedded_cost_options(text);
    let (action_type, keywords, distance, target) = embedded_table_fields(text);
    let components = embedded_component_order(text, effects.as_ref());

    let mut ability = Map::new();
    ability.insert("name".to_string(), Value::String(name.to_string()));
    ability.insert(
        "flavor_text".to_string(),
        FIRST_ITALIC_RE
            .captures(text)
            .map_or(Value::Null, |caps| Value::String(caps[1].trim().to_string())),
    );
    ability.insert("action_type".to_string(), action_type);
    ability.insert("keywords".to_string(), keywords);
    ability.insert("distance".to_string(), distance);
    ability.insert("target".to_string(), target);
    ability.insert("cost_options".to_string(), Value::Array(cost_options));
    if let Some(power_roll) = power_roll {
        ability.insert("power_roll".to_string(), power_roll);
    }
    if let Some(effects) = effects {
        ability.insert("effects".to_string(), Value::Object(effects));
    }
    if let Some(persistent) = persistent {
        ability.insert("persistent".to_string(), persistent);
    }
    if !components.is_empty() {
        ability.insert(
            "component_order".to_string(),
            Value::Array(components.into_iter().map(|c| Value::String(c.to_string())).collect()),
        );
    }

    ability.retain(|_, value| {
        !(value.is_null()
            || value.as_array().is_some_and(Vec::is_empty)
            || value.as_str() == Some(""))
    });
    Value::Object(ability)
}

fn embedded_power_roll(text: &str) -> Option<Value> {
    let caps = POWER_ROLL_HEAD_RE.captures(text)?;
    let characteristic = caps[1].trim().to_string();

    let mut tiers = Vec::new();
    let mut cursor = 0;
    while let Some(head) = TIER_HEAD_RE.captures(&text[cursor..]) {
        let whole = head.get(0).expect("whole match");
        let range_text = head[1].trim().to_string();
        let body_start = cursor + whole.end();
        let body_end = TIER_BREAK_RE
            .find(&text[body_start..])
            .map_or(text.len(), |m| body_start + m.start());
        let result_text = text[body_start..body_end].trim();

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
                match parse_damage_clause(part) {
                    Some(clause) => {
                        let mut parsed = Map::new();
                        parsed.insert("formula".to_string(), Value::String(clause.formula.clone()));
                        parsed.insert(
                            "type".to_string(),
                            clause.damage_type.clone().map_or(Value::Null, Value::String),
                        );
                        if let Some(characteristics) = &clause.characteristics {
                            parsed.insert("characteristics".to_string(), json!(characteristics));
                        }
                        fold_characteristic_type(&mut parsed);
                        damage = Value::Object(parsed);
                    }
                    None => effects.push(Value::String(part.to_string())),
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
        cursor = body_end;
    }

    if tiers.is_empty() {
        return None;
    }
    Some(json!({"characteristic": characteristic, "tiers": tiers}))
}

fn embedded_effects(text: &str, has_power_roll: bool) -> Option<Map<String, Value>> {
    let mut effects = Map::new();

    if let Some(m) = TRIGGER_HEAD_RE.find(text) {
        let trigger = take_until(&text[m.end()..], &BOLD_BREAK_RE).trim();
        effects.insert("trigger".to_string(), Value::String(trigger.to_string()));
    }

    if has_power_roll {
        let mut before: Option<String> = None;
        'anchors: for anchor in BEFORE_ANCHOR_RE.find_iter(text) {
            let rest = &text[anchor.end()..];
            for head in EFFECT_PARAGRAPH_RE.find_iter(rest) {
                let tail = &rest[head.end()..];
                if let Some(end) =
                    BEFORE_BREAK_RE.find_iter(tail).map(|m| m.start()).find(|&s| s >= 1)
                {
                    before = Some(tail[..end].trim().to_string());
                    break 'anchors;
                }
            }
        }

        let after = AFTER_HEAD_RE
            .find(text)
            .map(|m| take_until(&text[m.end()..], &AFTER_BREAK_RE).trim().to_string());

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
    } else if let Some(m) = SOLO_EFFECT_HEAD_RE.find(text) {
        let effect = take_until(&text[m.end()..], &SOLO_EFFECT_BREAK_RE).trim();
        effects.insert("effect".to_string(), Value::String(effect.to_string()));
    }

    if let Some(m) = MARK_BENEFIT_HEAD_RE.find(text) {
        let benefit = take_until(&text[m.end()..], &PARAGRAPH_RE).trim();
        effects.insert("mark_benefit".to_string(), Value::String(benefit.to_string()));
    }
    if let Some(m) = STRAINED_HEAD_RE.find(text) {
        let strained = take_until(&text[m.end()..], &BOLD_BREAK_RE).trim();
        effects.insert("strained".to_string(), Value::String(strained.to_string()));
    }

    (!effects.is_empty()).then_some(effects)
}

fn embedded_persistent(text: &str) -> Option<Value> {
    let caps = PERSISTENT_HEAD_RE.captures(text)?;
    let turns: i64 = caps[1].parse().ok()?;
    let rest = &text[caps.get(0).expect("whole match").end()..];
    let description = take_until(rest, &PARAGRAPH_RE).trim();
    Some(json!({"turns": turns, "description": description}))
}

fn embedded_cost_options(text: &str) -> Vec<Value> {
    SPEND_HEAD_RE
        .captures_iter(text)
        .map(|caps| {
            let rest = &text[caps.get(0).expect("whole match").end()..];
            let effect = take_until(rest, &SPEND_BREAK_RE).trim();
            json!({"amount": &caps[1], "resource": &caps[2], "effect": effect})
        })
        .collect()
}

/// Action type, keywords, distance, and target from the first
/// well-formed pipe table in the ability text.
fn embedded_table_fields(text: &str) -> (Value, Value, Value, Value) {
    let mut action_type = Value::Null;
    let mut keywords = json!([]);
    let mut distance = Value::Null;
    let mut target = Value::Null;

    for table in pipe_tables(text) {
        let header_cols = table_cells(table[0], false);
        let data_cols = table_cells(table[2], true);
        if header_cols.len() != data_cols.len() || header_cols.len() < 2 {
            continue;
        }

        if header_cols.len() == 2 {
            if !header_cols[0].is_empty() {
                let list: Vec<Value> = header_cols[0]
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(|k| Value::String(k.to_string()))
                    .collect();
                if !list.is_empty() {
                    keywords = Value::Array(list);
                }
            }
            if !data_cols[0].is_empty() {
                distance = Value::String(data_cols[0].clone());
            }
            if !header_cols[1].is_empty() {
                action_type = Value::String(header_cols[1].clone());
            }
            if !data_cols[1].is_empty() {
                target = Value::String(data_cols[1].clone());
            }
        } else {
            const KEYWORD_TERMS: [&str; 18] = [
                "area", "magic", "psionic", "ranged", "melee", "strike", "telepathy", "force",
                "fire", "cold", "lightning", "poison", "necrotic", "radiant", "weapon", "spell",
                "divine", "martial",
            ];
            const ACTION_TERMS: [&str; 6] = [
                "maneuver",
                "main action",
                "free action",
                "reaction",
                "bonus action",
                "action",
            ];
            for (i, header) in header_cols.iter().enumerate() {
                let header_lower = header.to_lowercase();
                let Some(cell) = data_cols.get(i).filter(|cell| !cell.is_empty()) else {
                    continue;
                };
                if KEYWORD_TERMS.iter().any(|term| header_lower.contains(term)) {
                    let extra: Vec<Value> = cell
                        .split(',')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(|k| Value::String(k.to_string()))
                        .collect();
                    if let Some(list) = keywords.as_array_mut() {
                        list.extend(extra);
                    }
                } else if header_lower.contains("distance")
                    || header_lower.contains("ranged")
                    || header_lower.contains("melee")
                    || header_lower.contains("reach")
                {
                    distance = Value::String(cell.clone());
                } else if ACTION_TERMS.iter().any(|term| header_lower.contains(term)) {
                    action_type = Value::String(cell.clone());
                } else if header_lower.contains("target") {
                    target = Value::String(cell.clone());
                }
            }
        }
        break;
    }

    (action_type, keywords, distance, target)
}

/// Runs of pipe-delimited lines with at least header, separator, and
/// one data row.
fn pipe_tables(text: &str) -> Vec<Vec<&str>> {
    let mut tables = Vec::new();
    let mut current = Vec::new();
    for line in text.split('\n') {
        let line = line.trim();
        if line.starts_with('|') && line.ends_with('|') {
            current.push(line);
        } else {
            if current.len() >= 3 {
                tables.push(std::mem::take(&mut current));
            }
            current.clear();
        }
    }
    if current.len() >= 3 {
        tables.push(current);
    }
    tables
}

fn table_cells(line: &str, strip_markers: bool) -> Vec<String> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() <= 2 {
        return Vec::new();
    }
    parts[1..parts.len() - 1]
        .iter()
        .map(|cell| {
            let cell = cell.trim().replace("**", "");
            if strip_markers {
                cell.replace('📏', "").replace('🎯', "")
            } else {
                cell
            }
        })
        .collect()
}

/// First two-column table whose rows read as threshold/benefit pairs,
/// kept in source row order.
fn threshold_benefits(body: &str) -> Vec<Value> {
    for table in pipe_tables(body) {
        if table_cells(table[0], false).len() != 2 {
            continue;
        }
        let rows = benefit_rows(&table.join("\n"));
        if !rows.is_empty() {
            return rows.iter().filter_map(|row| serde_json::to_value(row).ok()).collect();
        }
    }
    Vec::new()
}

/// Section names in the order their headings appear in the ability
/// text. Unlike top-level abilities, a power roll or persistent heading
/// is listed even when its section failed to parse.
fn embedded_component_order(text: &str, effects: Option<&Map<String, Value>>) -> Vec<&'static str> {
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
        .filter_map(|(name, re)| re.find(text).map(|m| (*name, m.start())))
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
                if has("before") && has("after") {
                    if !components.contains(&"before") {
                        components.push("before");
                    }
                    if !components.contains(&"after") {
                        components.push("after");
                    }
                } else if has("before") && !components.contains(&"before") {
                    components.push("before");
                } else if has("after") && !components.contains(&"after") {
                    components.push("after");
                } else if has("effect") && !components.contains(&"effect") {
                    components.push("effect");
                }
            }
            "power_roll" if !components.contains(&"power_roll") => components.push("power_roll"),
            "mark_benefit" if !components.contains(&"mark_benefit") => {
                components.push("mark_benefit")
            }
            "strained" if has("strained") && !components.contains(&"strained") => {
                components.push("strained")
            }
            "persistent" if !components.contains(&"persistent") => components.push("persistent"),
            "cost_options" if !components.contains(&"cost_options") => {
                components.push("cost_options")
            }
            _ => {}
        }
    }
    components
}

/// What the feature grants: skills, perks, kits, characteristic
/// increases, and stat bonuses, recognized from stock phrasings.
fn extract_grants(body: &str, feature_name: &str) -> Map<String, Value> {
    let mut grants = Map::new();
    let text = body.to_lowercase();

    if SKILL_CHOICE_RE.is_match(body) {
        let count = SKILL_COUNT_RE
            .captures(&text)
            .map_or(1, |caps| spelled_count(&caps[1]));
        grants.insert("skill".to_string(), json!({"type": "choice", "count": count}));
    } else if let Some(caps) = SKILL_GAIN_RE
        .captures(body)
        .or_else(|| SKILL_HAVE_RE.captures(body))
    {
        let mut skill = Map::new();
        let name = &caps[1];
        if name.len() > 2 {
            skill.insert("type".to_string(), Value::String("specific".to_string()));
            skill.insert("name".to_string(), Value::String(name.to_string()));
        }
        grants.insert("skill".to_string(), Value::Object(skill));
    }

    if PERK_CHOICE_RE.is_match(body) || PERK_GAIN_RE.is_match(body) {
        let mut perk = Map::new();
        if text.contains("of your choice") {
            perk.insert("type".to_string(), Value::String("choice".to_string()));
            let count = PERK_COUNT_RE
                .captures(&text)
                .map_or(1, |caps| spelled_count(&caps[1]));
            perk.insert("count".to_string(), Value::Number(count.into()));
            let restrictions: Vec<Value> = ["crafting", "lore", "supernatural"]
                .iter()
                .filter(|term| text.contains(*term))
                .map(|term| Value::String((*term).to_string()))
                .collect();
            if !restrictions.is_empty() {
                perk.insert("restrictions".to_string(), Value::Array(restrictions));
            }
        }
        grants.insert("perk".to_string(), Value::Object(perk));
    }

    if KIT_USE_RE.is_match(body) || KIT_GAIN_RE.is_match(body) {
        let mut kit = Map::new();
        let count = if text.contains("two kits") {
            2
        } else if text.contains("three kits") {
            3
        } else {
            1
        };
        kit.insert("count".to_string(), Value::Number(count.into()));
        if let Some(caps) = QUICK_BUILD_RE.captures(body) {
            kit.insert(
                "quick_build".to_string(),
                Value::String(caps[1].trim().to_string()),
            );
        }
        grants.insert("kit".to_string(), Value::Object(kit));
    }

    if feature_name.to_lowercase().contains("characteristic increase") {
        let mut increase = Map::new();
        if let Some(caps) = CHAR_ALL_RE.captures(body) {
            record_full_increase(&mut increase, &caps[1], body, &text);
        } else if let Some(caps) = CHAR_PAIR_RE.captures(body) {
            increase.insert("type".to_string(), Value::String("specific".to_string()));
            increase.insert("characteristics".to_string(), json!([&caps[1], &caps[2]]));
            increase.insert("to_value".to_string(), json!(parse_number(&caps[3])));
        } else if let Some(caps) = CHAR_SINGLE_RE.captures(body) {
            increase.insert("type".to_string(), Value::String("specific".to_string()));
            increase.insert("characteristics".to_string(), json!([&caps[1]]));
            increase.insert("to_value".to_string(), json!(parse_number(&caps[2])));
        } else if let Some(caps) = CHAR_ANY_ALL_RE.captures(body) {
            record_full_increase(&mut increase, &caps[1], body, &text);
        }
        if !increase.is_empty() {
            grants.insert("characteristic_increase".to_string(), Value::Object(increase));
        }
    }

    if feature_name.to_lowercase().contains("enchantment of") {
        let mut bonuses: Map<String, Value> = Map::new();
        for re in [&BONUS_GAIN_RE, &BONUS_HAVE_RE, &BONUS_PLAIN_RE] {
            for caps in re.captures_iter(body) {
                let stat = caps[2].to_lowercase();
                if !matches!(stat.as_str(), "stamina" | "stability" | "speed") {
                    continue;
                }
                merge_base(&mut bonuses, &stat, parse_number(&caps[1]));
            }
        }
        if let Some(caps) = SCALING_RE.captures(body) {
            let scaling = scaling_value(&caps, 1);
            if let Some(entry) = bonuses.values_mut().next() {
                if let Some(obj) = entry.as_object_mut() {
                    if !obj.contains_key("scaling") {
                        obj.insert("scaling".to_string(), scaling);
                    }
                }
            }
        }
        if !bonuses.is_empty() {
            grants.insert("stat_bonuses".to_string(), Value::Object(bonuses));
        }
    }

    let mut bonuses: Map<String, Value> = Map::new();
    for re in [&BONUS_GAIN_RE, &BONUS_HAVE_RE, &BONUS_PLAIN_RE] {
        for caps in re.captures_iter(body) {
            let stat = normalize_stat_name(&caps[2]);
            if stat.is_empty() {
                continue;
            }
            merge_base(&mut bonuses, stat, parse_number(&caps[1]));
        }
    }
    for caps in BONUS_PAIR_RE.captures_iter(body) {
        let amount = parse_number(&caps[1]);
        for group in [2, 3] {
            let stat = normalize_stat_name(&caps[group]);
            if !stat.is_empty() {
                merge_base(&mut bonuses, stat, amount);
            }
        }
    }
    for caps in BONUS_SCALING_RE.captures_iter(body) {
        let stat = normalize_stat_name(&caps[2]);
        if stat.is_empty() {
            continue;
        }
        let amount = parse_number(&caps[1]);
        let scaling = scaling_value(&caps, 3);
        match bonuses.get_mut(stat).and_then(Value::as_object_mut) {
            Some(entry) => {
                let base = entry.get("base").and_then(Value::as_i64).unwrap_or(0);
                entry.insert("base".to_string(), Value::Number(base.max(amount).into()));
                if !entry.contains_key("scaling") {
                    entry.insert("scaling".to_string(), scaling);
                }
            }
            None => {
                bonuses.insert(stat.to_string(), json!({"base": amount, "scaling": scaling}));
            }
        }
    }
    if let Some(caps) = SCALING_RE.captures(body) {
        if !bonuses.is_empty() {
            let already_scaled = bonuses
                .values()
                .any(|entry| entry.as_object().is_some_and(|o| o.contains_key("scaling")));
            if !already_scaled {
                let scaling = scaling_value(&caps, 1);
                for entry in bonuses.values_mut() {
                    if let Some(obj) = entry.as_object_mut() {
                        if !obj.contains_key("scaling") {
                            obj.insert("scaling".to_string(), scaling.clone());
                        }
                    }
                }
            }
        }
    }
    if !bonuses.is_empty() {
        grants.insert("stat_bonuses".to_string(), Value::Object(bonuses));
    }

    grants
}

fn record_full_increase(increase: &mut Map<String, Value>, amount: &str, body: &str, text: &str) {
    increase.insert("type".to_string(), Value::String("all".to_string()));
    increase.insert("amount".to_string(), json!(parse_number(amount)));
    if text.contains("maximum of") {
        if let Some(caps) = MAXIMUM_RE.captures(body) {
            increase.insert("maximum".to_string(), json!(parse_number(&caps[1])));
        }
    }
}

/// Scaling object from capture groups starting at `first`: increase
/// amount then the three levels it lands on.
fn scaling_value(caps: &regex::Captures<'_>, first: usize) -> Value {
    json!({
        "amount": parse_number(&caps[first]),
        "levels": [
            parse_number(&caps[first + 1]),
            parse_number(&caps[first + 2]),
            parse_number(&caps[first + 3]),
        ],
    })
}

fn merge_base(bonuses: &mut Map<String, Value>, stat: &str, amount: i64) {
    match bonuses.get_mut(stat).and_then(Value::as_object_mut) {
        Some(entry) => {
            let base = entry.get("base").and_then(Value::as_i64).unwrap_or(0);
            entry.insert("base".to_string(), Value::Number(base.max(amount).into()));
        }
        None => {
            bonuses.insert(stat.to_string(), json!({"base": amount}));
        }
    }
}

fn parse_number(digits: &str) -> i64 {
    digits.parse().unwrap_or(0)
}

fn spelled_count(word: &str) -> i64 {
    match word {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        other => other.parse().unwrap_or(1),
    }
}

fn normalize_stat_name(stat: &str) -> &'static str {
    let lowered = stat.to_lowercase();
    match lowered.trim().trim_end_matches('.') {
        "stamina" | "stam" => "stamina",
        "stability" | "stab" => "stability",
        "speed" => "speed",
        "damage" | "rolled damage" => "damage",
        "shift" | "shift distance" => "shift",
        _ => "",
    }
}

/// Subclass options from selector bullet lists, enriched with feature
/// names from a college table when one is present.
fn extract_subclass_options(body: &str) -> Vec<Value> {
    let mut options = Vec::new();
    for caps in SUBCLASS_OPTION_RE.captures_iter(body) {
        options.push(json!({
            "name": caps[1].trim(),
            "description": caps[2].trim(),
            "grants": {"skill": {"type": "specific", "name": caps[3].trim()}},
        }));
    }

    let mut college_features: HashMap<String, Vec<String>> = HashMap::new();
    for caps in COLLEGE_TABLE_RE.captures_iter(body) {
        let college = caps[1].trim().to_string();
        let features = caps[2].trim().split(',').map(|f| f.trim().to_string()).collect();
        college_features.insert(college, features);
    }

    for option in &mut options {
        let name = option["name"].as_str().unwrap_or("").to_string();
        let short = COLLEGE_PREFIX_RE.replace(&name, "").trim().to_string();
        if let Some(features) = college_features.get(&short) {
            if let Some(obj) = option.as_object_mut() {
                obj.insert("features".to_string(), json!(features));
            }
        }
    }
    options
}

/// Tables under fourth- to sixth-level headings, as
/// `{name, headers, data}` with one object per data row.
fn extract_tables(content: &str) -> Vec<Value> {
    heading_tables(content)
        .into_iter()
        .filter(|table| !table.data.is_empty())
        .filter_map(|table| serde_json::to_value(table).ok())
        .collect()
}

/// Feature prose with ability blockquotes, table sections, comments,
/// and link targets removed.
fn clean_feature_content(body: &str) -> String {
    let mut text = body.to_string();
    while let Some(head) = ABILITY_BLOCK_HEAD_RE.find(&text) {
        let end = MAJOR_HEADING_BREAK_RE
            .find(&text[head.end()..])
            .map_or(text.len(), |m| head.end() + m.start());
        text.replace_range(head.start()..end, "");
    }
    while let Some(head) = TABLE_SECTION_HEAD_RE.find(&text) {
        let end = SECTION_HEADING_BREAK_RE
            .find(&text[head.end()..])
            .map_or(text.len(), |m| head.end() + m.start());
        text.replace_range(head.start()..end, "");
    }
    let text = HTML_COMMENT_RE.replace_all(&text, "");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = EXTRA_BLANK_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
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

    fn write_feature(tmp: &PathBuf, rel: &str, content: &str) {
        let path = tmp.join("Features").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    const PRIMORDIAL_STRIKE: &str = "\
---\n\
item_id: primordial-strike\n\
item_name: Primordial Strike\n\
class: fury\n\
level: 1\n\
type: class:fury:1st:primordial-strike\n\
---\n\n\
Your rage takes form.\n\n\
> ###### Primordial Strike\n\n\
> *The elements answer your call.*\n\n\
> | **Magic, Melee** | **Main action** |\n\
> | ---------------- | --------------: |\n\
> | **📏 Melee 2** | **🎯 One creature** |\n\n\
> **Effect:** The strike gains the fire keyword.\n\n\
> **Power Roll + Might:**\n\n\
> - **≤11:** 3 + M fire damage\n\
> - **12-16:** 5 + M fire damage\n\
> - **17+:** 8 + M fire damage; push 3\n";

    const FIELD_COMMANDS: &str = "\
---\n\
item_id: field-commands\n\
item_name: Field Commands\n\
item_index: '02'\n\
class: tactician\n\
level: 3\n\
type: class:tactician:3rd:field-commands\n\
scc:\n\
  - class:tactician:3rd:field-commands\n\
---\n\n\
Choose one of the following maneuvers.\n\n\
> ###### Rally Cry\n\n\
> *A rallying shout.*\n\n\
> **Effect:** Each ally within 5 squares gains one surge.\n\n\
> ###### Hold the Line\n\n\
> *Stand firm.*\n\n\
> **Effect:** Each ally adjacent to you is protected.\n";

    const SHADOW_COLLEGE: &str = "\
---\n\
item_id: shadow-college\n\
item_name: Shadow College\n\
class: shadow\n\
level: 1\n\
---\n\n\
Choose a college.\n\n\
- **College of Black Ash**: Assassins who teleport. You have the Magic skill.\n\n\
##### College Features Table\n\n\
| College | Feature |\n\
| ------- | ------- |\n\
| Black Ash | Black Ash Teleport |\n";

    const BLACK_ASH_TELEPORT: &str = "\
---\n\
item_id: black-ash-teleport\n\
item_name: Black Ash Teleport\n\
class: shadow\n\
level: 2\n\
---\n\n\
You [teleport](../../rules.md) through ash.\n";

    const BATTLE_TRAINING: &str = "\
---\n\
item_id: battle-training\n\
item_name: Battle Training\n\
class: fury\n\
level: 1\n\
---\n\n\
You gain the Endurance skill. You gain a +3 bonus to Stamina, and this \
bonus increases by 3 at 4th, 7th, and 10th levels.\n";

    const BURNING_GRASP: &str = "\
---\n\
item_id: burning-grasp\n\
item_name: Burning Grasp\n\
class: elementalist\n\
level: 1\n\
---\n\n\
Fire answers your call.\n";

    const ELEMENTALIST_CLASS: &str = "\
## Elementalist\n\n\
###### 1st-Level Elemental Specialization Features Table\n\n\
| Specialization | Feature |\n\
| -------------- | ------- |\n\
| fire | Burning Grasp |\n\
| void | A Beyonding of Void |\n";

    #[test]
    fn embedded_ability_carries_table_fields_and_power_roll() {
        let tmp = temp_dir();
        write_feature(&tmp, "Fury/1st-Level Features/Primordial Strike.md", PRIMORDIAL_STRIKE);

        let value = FeaturesParser.parse(&ParseContext::new(&tmp)).unwrap();
        let feature = &value.as_array().unwrap()[0];
        assert_eq!(feature["item_id"], "primordial-strike");
        assert_eq!(feature["description"], "Your rage takes form.");
        assert!(feature.get("grants").is_none());

        let ability = &feature["abilities"][0];
        assert_eq!(ability["name"], "Primordial Strike");
        assert_eq!(ability["flavor_text"], "The elements answer your call.");
        assert_eq!(ability["keywords"], json!(["Magic", "Melee"]));
        assert_eq!(ability["action_type"], "Main action");
        assert_eq!(ability["distance"], " Melee 2");
        assert_eq!(ability["target"], " One creature");

        let power_roll = &ability["power_roll"];
        assert_eq!(power_roll["characteristic"], "Might");
        let tiers = power_roll["tiers"].as_array().unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(
            tiers[0]["damage"],
            json!({"formula": "3 + M", "type": "fire", "characteristics": ["M"]})
        );
        assert_eq!(tiers[2]["effects"], json!(["push 3"]));

        assert_eq!(ability["effects"]["effect"], "The strike gains the fire keyword.");
        assert_eq!(ability["component_order"], json!(["effect", "power_roll"]));
        assert!(ability.get("cost_options").is_none());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn multi_ability_features_split_into_one_record_each() {
        let tmp = temp_dir();
        write_feature(&tmp, "Tactician/3rd-Level Features/Field Commands.md", FIELD_COMMANDS);

        let value = FeaturesParser.parse(&ParseContext::new(&tmp)).unwrap();
        let features = value.as_array().unwrap();
        assert_eq!(features.len(), 2);

        let rally = &features[0];
        assert_eq!(rally["item_id"], "rally-cry");
        assert_eq!(rally["item_name"], "Rally Cry");
        assert_eq!(rally["type"], "class:tactician:3rd:rally-cry");
        assert_eq!(rally["scc"], json!(["class:tactician:3rd:rally-cry"]));
        assert_eq!(rally["description"], "Choose one of the following maneuvers.");
        assert_eq!(rally["abilities"].as_array().unwrap().len(), 1);
        assert_eq!(
            rally["abilities"][0]["effects"]["effect"],
            "Each ally within 5 squares gains one surge."
        );

        let hold = &features[1];
        assert_eq!(hold["item_id"], "hold-the-line");
        assert_eq!(hold["item_name"], "Hold the Line");
        assert_eq!(hold["abilities"][0]["flavor_text"], "Stand firm.");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn grants_and_subclasses_attach_across_records() {
        let tmp = temp_dir();
        write_feature(&tmp, "Shadow/1st-Level Features/Shadow College.md", SHADOW_COLLEGE);
        write_feature(&tmp, "Shadow/2nd-Level Features/Black Ash Teleport.md", BLACK_ASH_TELEPORT);
        write_feature(&tmp, "Fury/1st-Level Features/Battle Training.md", BATTLE_TRAINING);
        write_feature(&tmp, "Elementalist/1st-Level Features/Burning Grasp.md", BURNING_GRASP);
        let classes_dir = tmp.join("Classes");
        std::fs::create_dir_all(&classes_dir).unwrap();
        std::fs::write(classes_dir.join("Elementalist.md"), ELEMENTALIST_CLASS).unwrap();

        let value = FeaturesParser.parse(&ParseContext::new(&tmp)).unwrap();
        let features = value.as_array().unwrap();
        let names: Vec<&str> = features
            .iter()
            .map(|f| f["item_name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            ["Burning Grasp", "Battle Training", "Shadow College", "Black Ash Teleport"]
        );

        let burning_grasp = &features[0];
        assert_eq!(burning_grasp["subclass"], "Fire");

        let battle_training = &features[1];
        assert_eq!(
            battle_training["grants"]["skill"],
            json!({"type": "specific", "name": "Endurance"})
        );
        assert_eq!(
            battle_training["grants"]["stat_bonuses"]["stamina"],
            json!({"base": 3, "scaling": {"amount": 3, "levels": [4, 7, 10]}})
        );

        let college = &features[2];
        assert_eq!(college["description"].as_str().unwrap(),
            "Choose a college.\n\n- **College of Black Ash**: Assassins who teleport. You have the Magic skill.");
        assert_eq!(college["grants"]["skill"]["name"], "Magic");
        assert_eq!(
            college["subclass_options"],
            json!([{
                "name": "College of Black Ash",
                "description": "Assassins who teleport.",
                "grants": {"skill": {"type": "specific", "name": "Magic"}},
                "features": ["Black Ash Teleport"],
            }])
        );
        assert_eq!(college["tables"][0]["name"], "College Features Table");

        let teleport = &features[3];
        assert_eq!(teleport["description"], "You teleport through ash.");
        assert_eq!(teleport["subclass"], "Black Ash");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn threshold_tables_become_ordered_benefits() {
        let tmp = temp_dir();
        write_feature(
            &tmp,
            "Shadow/1st-Level Features/College Benefits.md",
            "---\n\
             item_id: shadow-college\n\
             item_name: Shadow College\n\
             class: shadow\n\
             level: 1\n\
             ---\n\n\
             As your insight grows, so do your gifts.\n\n\
             | Insight | Benefit |\n\
             | --- | --- |\n\
             | 2 | gain edge |\n\
             | 4 | gain surge |\n",
        );

        let value = FeaturesParser.parse(&ParseContext::new(&tmp)).unwrap();
        let feature = &value.as_array().unwrap()[0];
        assert_eq!(feature["item_id"], "shadow-college");
        assert_eq!(feature["level"], 1);
        assert_eq!(
            feature["benefits"],
            json!([
                {"threshold": 2, "benefit": "gain edge"},
                {"threshold": 4, "benefit": "gain surge"},
            ])
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
