//! Damage clause parsing.
//!
//! Tier results routinely read like `2d6 + A fire damage` or `lightning
//! damage equal to your level`. This module pulls the roll formula, the
//! damage type, and any characteristic letters out of such clauses so
//! tier tables can carry structured damage instead of prose.

use std::sync::LazyLock;

use regex::Regex;

use crate::text::strip_bold;

/// Structured damage pulled from one clause of a tier result.
#[derive(Debug, Clone, PartialEq)]
pub struct DamageClause {
    /// Normalized roll formula, e.g. `2d6 + A`.
    pub formula: String,
    /// Damage type word, when the clause names one.
    pub damage_type: Option<String>,
    /// Characteristic letters offered as alternatives, e.g. `["M", "A"]`.
    pub characteristics: Option<Vec<String>>,
}

static CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9dD\w\s+\-*/(),]+?)(?:\s+([a-zA-Z]+(?:\s+[a-zA-Z]+)*))?\s+damage")
        .expect("valid regex")
});

static TOKEN_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i),|\bor\b").expect("valid regex"));

static FORMULA_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d|\b[AaMmRrPpIi]\b").expect("valid regex"));

static LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blevel\b").expect("valid regex"));

static SIGN_SPACING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([+\-])\s*").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static EQUAL_TO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([A-Za-z]+)\s+damage\s+equal to\s+([^;]+)").expect("valid regex")
});

/// Parse a clause that may describe a damage roll.
///
/// Returns `None` when the clause does not look like damage, so callers
/// can keep the text as a plain effect. A single letter sitting in the
/// type slot (`2d6 + A fire damage` matches with type `A fire`) is a
/// characteristic, and gets folded back into the formula.
pub fn parse_damage_clause(clause: &str) -> Option<DamageClause> {
    if !clause.to_lowercase().contains("damage") {
        return None;
    }

    if let Some(caps) = CLAUSE_RE.captures(clause) {
        let raw = caps[1].trim().trim_end_matches(',').to_string();
        let type_raw = caps.get(2).map(|m| m.as_str().to_string());
        let mut damage_type = type_raw.as_deref().map(str::to_lowercase);

        let tokens: Vec<&str> = TOKEN_SPLIT_RE
            .split(&raw)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect();
        let mut formula_candidate = tokens.first().copied().unwrap_or(&raw).to_string();

        let trailing_are_letters = tokens.len() > 1
            && tokens[1..]
                .iter()
                .all(|t| t.chars().count() == 1 && t.chars().all(char::is_alphabetic));
        let mut characteristics: Option<Vec<String>> = trailing_are_letters
            .then(|| tokens[1..].iter().map(|t| t.to_uppercase()).collect());

        if let Some(type_text) = &type_raw {
            let words: Vec<&str> = type_text.split_whitespace().collect();
            if words.len() >= 2
                && words[0].chars().count() == 1
                && words[0].chars().all(char::is_alphabetic)
            {
                let lead = words[0].to_uppercase();
                let lead_re =
                    Regex::new(&format!(r"\b{}\b", regex::escape(&lead))).expect("valid regex");
                if !lead_re.is_match(&formula_candidate) {
                    formula_candidate = format!("{formula_candidate} {lead}").trim().to_string();
                }
                match characteristics.as_mut() {
                    Some(list) => list.insert(0, lead),
                    None => characteristics = Some(vec![lead]),
                }
                let remaining = words[1..].join(" ");
                damage_type = (!remaining.is_empty()).then(|| remaining.to_lowercase());
            }
        }

        if FORMULA_SHAPE_RE.is_match(&formula_candidate) || LEVEL_RE.is_match(&formula_candidate) {
            let formula = strip_bold(&formula_candidate)
                .replace('\u{2013}', "-")
                .replace('\u{2014}', "-");
            let formula = SIGN_SPACING_RE.replace_all(&formula, " $1 ");
            let formula = WHITESPACE_RE.replace_all(formula.trim(), " ").to_string();
            return Some(DamageClause { formula, damage_type, characteristics });
        }
    }

    if let Some(caps) = EQUAL_TO_RE.captures(clause) {
        return Some(DamageClause {
            formula: WHITESPACE_RE.replace_all(caps[2].trim(), " ").to_string(),
            damage_type: Some(caps[1].to_lowercase()),
            characteristics: None,
        });
    }

    None
}
