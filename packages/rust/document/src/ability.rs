//! Blockquoted ability extraction.
//!
//! Treasures, titles, and a few features embed abilities as blockquotes
//! opening with a `> ######` heading: name with an optional resource
//! cost in parentheses, italic flavor line, a keyword/action table with
//! 📏 distance and 🎯 target cells, then a power roll with tier results
//! and a trailing effect.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::text::{strip_markdown_links, take_until};

/// One ability lifted from a `> ######` block.
#[derive(Debug, Clone, Serialize)]
pub struct QuotedAbility {
    pub name: String,
    pub resource_cost: Option<String>,
    pub heroic_resource_cost: Option<i64>,
    pub flavor_text: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub action_type: Option<String>,
    pub distance: Option<String>,
    pub target: Option<String>,
    pub power_roll: Option<String>,
    pub tier_effects: Option<Vec<TierEffect>>,
    pub effect: Option<String>,
}

/// A single row of a power roll outcome table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierEffect {
    pub tier: String,
    pub effect: String,
}

static BLOCK_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*######\s+").expect("valid regex"));

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"######\s+([^(\n]+)(?:\(([^)]+)\))?").expect("valid regex"));

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").expect("valid regex"));

static FLAVOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*\*([^*\n]+?)\*\s*[\n|]").expect("valid regex"));

static KEYWORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\s*(.+?)\s*\|").expect("valid regex"));

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\|\s*\*\*([^*]*(?:action|Maneuver|Triggered action)[^*]*)\*\*\s*\|")
        .expect("valid regex")
});

static DISTANCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*📏\s*([^*]+)\*\*").expect("valid regex"));

static TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*🎯\s*([^*]+)\*\*").expect("valid regex"));

static POWER_ROLL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*Power Roll \+ ([^:*]+):\*\*").expect("valid regex"));

static TIER_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*-\s*\*\*([≤\d\-+]+):\*\*").expect("valid regex"));

static EFFECT_HEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*\*\*Effect:\*\*").expect("valid regex"));

static BLOCK_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n>\s*\n|\n\n").expect("valid regex"));

/// 📏 distance cell, shared with the kit signature ability format.
pub fn distance_field(text: &str) -> Option<String> {
    DISTANCE_RE.captures(text).map(|caps| caps[1].trim().to_string())
}

/// 🎯 target cell, shared with the kit signature ability format.
pub fn target_field(text: &str) -> Option<String> {
    TARGET_RE.captures(text).map(|caps| caps[1].trim().to_string())
}

/// All `> ######` ability blocks in a document, or `None` when it has
/// none.
pub fn parse_quoted_abilities(content: &str) -> Option<Vec<QuotedAbility>> {
    let starts: Vec<usize> = BLOCK_START_RE.find_iter(content).map(|m| m.start()).collect();
    if starts.is_empty() {
        return None;
    }

    let mut abilities = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(content.len());
        if let Some(ability) = parse_block(&content[start..end]) {
            abilities.push(ability);
        }
    }
    (!abilities.is_empty()).then_some(abilities)
}

fn parse_block(block: &str) -> Option<QuotedAbility> {
    let name_caps = NAME_RE.captures(block)?;
    let name = name_caps[1].trim().to_string();
    let resource_cost = name_caps.get(2).map(|m| m.as_str().trim().to_string());

    let heroic_resource_cost = resource_cost
        .as_deref()
        .filter(|cost| cost.to_lowercase().contains("heroic resource"))
        .and_then(|cost| NUMBER_RE.captures(cost))
        .and_then(|caps| caps[1].parse().ok());

    let flavor_text = FLAVOR_RE.captures(block).map(|caps| caps[1].trim().to_string());

    let keywords = KEYWORDS_RE.captures(block).map(|caps| {
        caps[1]
            .trim()
            .replace("**", "")
            .split(',')
            .map(|keyword| keyword.trim().to_string())
            .collect()
    });

    let action_type = ACTION_RE.captures(block).map(|caps| caps[1].trim().to_string());
    let power_roll = POWER_ROLL_RE.captures(block).map(|caps| caps[1].trim().to_string());

    let tier_starts: Vec<(String, usize, usize)> = TIER_HEAD_RE
        .captures_iter(block)
        .map(|caps| {
            let whole = caps.get(0).expect("match");
            (caps[1].trim().to_string(), whole.start(), whole.end())
        })
        .collect();
    let mut tier_effects = Vec::new();
    for (i, (tier, _, body_start)) in tier_starts.iter().enumerate() {
        let limit = tier_starts.get(i + 1).map_or(block.len(), |next| next.1);
        let body = take_until(&block[*body_start..limit], &BLOCK_BREAK_RE);
        tier_effects.push(TierEffect {
            tier: tier.clone(),
            effect: strip_markdown_links(body.trim()),
        });
    }

    let effect = EFFECT_HEAD_RE.find(block).map(|m| {
        let body = take_until(&block[m.end()..], &BLOCK_BREAK_RE);
        strip_markdown_links(body.trim())
    });

    Some(QuotedAbility {
        name,
        resource_cost,
        heroic_resource_cost,
        flavor_text,
        keywords,
        action_type,
        distance: distance_field(block),
        target: target_field(block),
        power_roll,
        tier_effects: (!tier_effects.is_empty()).then_some(tier_effects),
        effect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "\
Intro text outside any block.\n\n\
> ###### Overwatch (3 Heroic Resources)\n\
>\n\
> *Your weapon arcs to cover an ally.*\n\
>\n\
> | **Magic, Ranged** | **Main action** |\n\
> | --- | --- |\n\
> | **📏 Ranged 10** | **🎯 One creature** |\n\
>\n\
> **Power Roll + Agility:**\n\
>\n\
> - **≤11:** 2 + A damage\n\
> - **12-16:** 5 + A damage\n\
> - **17+:** 7 + A damage\n\
>\n\
> **Effect:** The target is [slowed](../Conditions/Slowed.md).\n\
\n\
> ###### Lurking Shadow (5 Essence)\n\
>\n\
> *You drape the area in gloom.*\n\
>\n\
> | **Area, Magic** | **Maneuver** |\n\
> | --- | --- |\n\
> | **📏 Self** | **🎯 Self** |\n\
>\n\
> **Effect:** You become hidden.\n";

    #[test]
    fn finds_every_block() {
        let abilities = parse_quoted_abilities(BLOCK).unwrap();
        assert_eq!(abilities.len(), 2);
        assert_eq!(abilities[0].name, "Overwatch");
        assert_eq!(abilities[1].name, "Lurking Shadow");
    }

    #[test]
    fn reads_cost_flavor_and_table_cells() {
        let abilities = parse_quoted_abilities(BLOCK).unwrap();
        let first = &abilities[0];
        assert_eq!(first.resource_cost.as_deref(), Some("3 Heroic Resources"));
        assert_eq!(first.heroic_resource_cost, Some(3));
        assert_eq!(first.flavor_text.as_deref(), Some("Your weapon arcs to cover an ally."));
        assert_eq!(
            first.keywords.as_deref(),
            Some(["Magic".to_string(), "Ranged".to_string()].as_slice())
        );
        assert_eq!(first.action_type.as_deref(), Some("Main action"));
        assert_eq!(first.distance.as_deref(), Some("Ranged 10"));
        assert_eq!(first.target.as_deref(), Some("One creature"));
    }

    #[test]
    fn named_resource_costs_are_not_heroic() {
        let abilities = parse_quoted_abilities(BLOCK).unwrap();
        assert_eq!(abilities[1].resource_cost.as_deref(), Some("5 Essence"));
        assert_eq!(abilities[1].heroic_resource_cost, None);
    }

    #[test]
    fn reads_the_power_roll_and_its_tiers() {
        let abilities = parse_quoted_abilities(BLOCK).unwrap();
        let first = &abilities[0];
        assert_eq!(first.power_roll.as_deref(), Some("Agility"));
        let tiers = first.tier_effects.as_ref().unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0], TierEffect { tier: "≤11".into(), effect: "2 + A damage".into() });
        assert_eq!(tiers[2].tier, "17+");
        assert_eq!(tiers[2].effect, "7 + A damage");
    }

    #[test]
    fn effect_text_loses_its_links() {
        let abilities = parse_quoted_abilities(BLOCK).unwrap();
        assert_eq!(abilities[0].effect.as_deref(), Some("The target is slowed."));
        assert_eq!(abilities[1].effect.as_deref(), Some("You become hidden."));
    }

    #[test]
    fn plain_documents_have_no_abilities() {
        assert_eq!(parse_quoted_abilities("## Heading\n\nProse only.\n").map(|a| a.len()), None);
    }
}
