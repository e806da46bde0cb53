//! Creature stat block extraction.
//!
//! Some documents embed a full creature block (a summoned wolf, a
//! retainer) under a `###### <Name> Statblock` heading, usually inside a
//! blockquote. The block carries a five row stat table followed by
//! nested `> > **Name**` trait sections.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// A creature block lifted out of a document.
#[derive(Debug, Clone, Serialize)]
pub struct StatBlock {
    pub name: String,
    pub full_content: String,
    pub stat_table: Option<String>,
    pub stats: Option<Map<String, Value>>,
    pub traits: Option<Vec<StatBlockTrait>>,
}

/// A named trait under the stat table. Traits with their own roll table
/// are abilities and keep the raw block as `content`; the rest are plain
/// prose `description`s.
#[derive(Debug, Clone, Serialize)]
pub struct StatBlockTrait {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

static STATBLOCK_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)>?\s*#{6}\s+(.+?)\s+Statblock\s*\n").expect("valid regex"));

static NEXT_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:>\s*)?#{1,6}\s+").expect("valid regex"));

static CREATURE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">?\s*\*\*(.+?)\*\*\s*\n").expect("valid regex"));

static QUOTE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^>\s*").expect("valid regex"));

static TRAIT_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n>\s*>\s*\*\*([^*]+)\*\*\s*\n").expect("valid regex"));

static TRAIT_QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^>\s*>?\s*").expect("valid regex"));

static LEVEL_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Level\s+(\d+)").expect("valid regex"));

static EV_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"EV\s+(.+)").expect("valid regex"));

static BOLD_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));

static HTML_TAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<br/>.*").expect("valid regex"));

/// Find and parse the first stat block in a document, if any.
pub fn parse_stat_block(content: &str) -> Option<StatBlock> {
    let heading = STATBLOCK_HEADING_RE.captures(content)?;
    let block_name = heading[1].trim().to_string();
    let start = heading.get(0).expect("match").end();
    let scope = match NEXT_HEADING_RE.find(&content[start..]) {
        Some(next) => &content[start..start + next.start()],
        None => &content[start..],
    };

    let name = CREATURE_NAME_RE
        .captures(scope)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or(block_name);

    // Collect the main stat table: consecutive pipe lines after the
    // creature name, stopping at the first blank quote line.
    let lines: Vec<&str> = scope.lines().collect();
    let mut table_lines: Vec<&str> = Vec::new();
    let mut in_table = false;
    let mut after_table = lines.len();
    for (idx, line) in lines.iter().enumerate() {
        if line.contains(name.as_str()) && line.contains("**") {
            continue;
        }
        if line.contains('|') && !line.trim_start().starts_with("> >") {
            table_lines.push(line);
            in_table = true;
            after_table = idx + 1;
        } else if in_table && matches!(line.trim(), "" | ">") {
            after_table = idx;
            break;
        }
    }

    let stat_table = (!table_lines.is_empty()).then(|| {
        QUOTE_MARKER_RE
            .replace_all(table_lines.join("\n").trim(), "")
            .to_string()
    });

    let traits_section = if stat_table.is_some() {
        format!("\n{}", lines[after_table..].join("\n"))
    } else {
        scope.to_string()
    };

    let mut traits = Vec::new();
    let headings: Vec<(String, usize)> = TRAIT_HEADING_RE
        .captures_iter(&traits_section)
        .map(|caps| (caps[1].trim().to_string(), caps.get(0).expect("match").end()))
        .collect();
    let starts: Vec<usize> = TRAIT_HEADING_RE
        .find_iter(&traits_section)
        .map(|m| m.start())
        .collect();
    for (i, (trait_name, body_start)) in headings.iter().enumerate() {
        let body_end = starts.get(i + 1).copied().unwrap_or(traits_section.len());
        let body = TRAIT_QUOTE_RE
            .replace_all(&traits_section[*body_start..body_end], "")
            .trim()
            .to_string();
        traits.push(if body.contains('|') {
            StatBlockTrait {
                name: trait_name.clone(),
                kind: "ability".to_string(),
                content: Some(body),
                description: None,
            }
        } else {
            StatBlockTrait {
                name: trait_name.clone(),
                kind: "trait".to_string(),
                content: None,
                description: Some(body),
            }
        });
    }

    let stats = stat_table.as_deref().map(parse_stat_fields);

    Some(StatBlock {
        name,
        full_content: scope.trim().to_string(),
        stat_table,
        stats,
        traits: (!traits.is_empty()).then_some(traits),
    })
}

/// Cell value: the bold span when present, otherwise the text before any
/// `<br/>` label. `-` and empty cells count as absent.
fn cell_value(cell: &str) -> Option<String> {
    let value = match BOLD_VALUE_RE.captures(cell) {
        Some(caps) => caps[1].trim().to_string(),
        None => HTML_TAIL_RE.replace(cell, "").trim().to_string(),
    };
    (!value.is_empty() && value != "-").then_some(value)
}

fn int_or_string(value: String) -> Value {
    match value.parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::String(value),
    }
}

fn split_row(line: &str) -> Vec<String> {
    line.trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Structured fields from the five row stat table. Row 1 carries
/// ancestry, level, role and EV; row 2 the movement block; row 3
/// immunities; row 4 the characteristic array. The separator sits at
/// index 1.
fn parse_stat_fields(table: &str) -> Map<String, Value> {
    let mut stats = Map::new();
    let lines: Vec<&str> = table.trim().lines().collect();
    if lines.len() < 5 {
        return stats;
    }

    let row1 = split_row(lines[0]);
    if row1.len() >= 5 {
        if let Some(ancestry) = cell_value(&row1[0]) {
            stats.insert("ancestry".to_string(), Value::String(ancestry));
        }
        if let Some(level) = cell_value(&row1[2]) {
            let value = match LEVEL_VALUE_RE.captures(&level) {
                Some(caps) => Value::from(caps[1].parse::<i64>().unwrap_or_default()),
                None => Value::String(level),
            };
            stats.insert("level".to_string(), value);
        }
        if let Some(role) = cell_value(&row1[3]) {
            stats.insert("role".to_string(), Value::String(role));
        }
        if let Some(ev) = cell_value(&row1[4]) {
            if ev.starts_with("EV") {
                let value = EV_VALUE_RE
                    .captures(&ev)
                    .map(|caps| caps[1].trim().to_string())
                    .unwrap_or(ev);
                stats.insert("ev".to_string(), Value::String(value));
            }
        }
    }

    let row2 = split_row(lines[2]);
    if row2.len() >= 5 {
        if let Some(size) = cell_value(&row2[0]) {
            stats.insert("size".to_string(), Value::String(size));
        }
        for (key, cell) in [
            ("speed", &row2[1]),
            ("stamina", &row2[2]),
            ("stability", &row2[3]),
            ("free_strike", &row2[4]),
        ] {
            if let Some(value) = cell_value(cell) {
                stats.insert(key.to_string(), int_or_string(value));
            }
        }
    }

    let row3 = split_row(lines[3]);
    if row3.len() >= 5 {
        for (key, cell) in [
            ("immunities", &row3[0]),
            ("movement", &row3[1]),
            ("with_captain", &row3[3]),
            ("weaknesses", &row3[4]),
        ] {
            if let Some(value) = cell_value(cell) {
                stats.insert(key.to_string(), Value::String(value));
            }
        }
    }

    let row4 = split_row(lines[4]);
    if row4.len() >= 5 {
        let mut characteristics = Map::new();
        for (key, cell) in [
            ("might", &row4[0]),
            ("agility", &row4[1]),
            ("reason", &row4[2]),
            ("intuition", &row4[3]),
            ("presence", &row4[4]),
        ] {
            if let Some(value) = cell_value(cell) {
                characteristics.insert(key.to_string(), int_or_string(value));
            }
        }
        if !characteristics.is_empty() {
            stats.insert("characteristics".to_string(), Value::Object(characteristics));
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "\
---\nitem_id: ratcatcher\n---\n\n##### Ratcatcher\n\nPerk text.\n\n###### Wolf Statblock\n\n\
> **Wolf**\n\
>\n\
> | Animal |  | Level 1 | Harrier | EV 3 |\n\
> | --- | --- | --- | --- | --- |\n\
> | 1S | 6 | 20 | 0 | 2 |\n\
> | Poison 2 | Climb |  | - | Fire 1 |\n\
> | **+2**<br/>Might | **+2**<br/>Agility | **-1**<br/>Reason | **+1**<br/>Intuition | **-1**<br/>Presence |\n\
>\n\
> > **Pack Hunter**\n\
>\n\
> > The wolf gains an edge on strikes against creatures adjacent to its allies.\n";

    #[test]
    fn finds_the_creature_and_its_table() {
        let block = parse_stat_block(BLOCK).unwrap();
        assert_eq!(block.name, "Wolf");
        let table = block.stat_table.unwrap();
        assert!(table.starts_with("| Animal |"));
        assert!(!table.contains('>'));
    }

    #[test]
    fn reads_structured_stats_from_the_table_rows() {
        let block = parse_stat_block(BLOCK).unwrap();
        let stats = block.stats.unwrap();
        assert_eq!(stats["ancestry"], "Animal");
        assert_eq!(stats["level"], 1);
        assert_eq!(stats["role"], "Harrier");
        assert_eq!(stats["ev"], "3");
        assert_eq!(stats["size"], "1S");
        assert_eq!(stats["speed"], 6);
        assert_eq!(stats["stamina"], 20);
        assert_eq!(stats["free_strike"], 2);
        assert_eq!(stats["immunities"], "Poison 2");
        assert_eq!(stats["movement"], "Climb");
        assert!(!stats.contains_key("with_captain"));
        assert_eq!(stats["weaknesses"], "Fire 1");
        assert_eq!(stats["characteristics"]["might"], 2);
        assert_eq!(stats["characteristics"]["reason"], -1);
    }

    #[test]
    fn traits_without_tables_are_descriptions() {
        let block = parse_stat_block(BLOCK).unwrap();
        let traits = block.traits.unwrap();
        assert_eq!(traits.len(), 1);
        assert_eq!(traits[0].name, "Pack Hunter");
        assert_eq!(traits[0].kind, "trait");
        assert!(traits[0].description.as_deref().unwrap().starts_with("The wolf gains"));
    }

    #[test]
    fn documents_without_a_statblock_heading_yield_none() {
        assert!(parse_stat_block("##### Plain Perk\n\nNo creature here.\n").is_none());
    }

    #[test]
    fn short_tables_yield_empty_stats() {
        let content = "###### Rat Statblock\n\n> **Rat**\n>\n> | Animal | | Level 1 | Harrier | EV 1 |\n> | --- | --- | --- | --- | --- |\n";
        let block = parse_stat_block(content).unwrap();
        assert_eq!(block.stats.unwrap().len(), 0);
    }
}
