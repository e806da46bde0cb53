//! Category parsers for the rules corpus.
//!
//! Each parser owns one output category: it walks the category's source
//! documents under the rules root, lifts their Markdown structure into
//! records, and returns the category's output value ready for the
//! writer. Parsers are pure over the corpus; ordering and failure
//! handling live in the pipeline.

pub mod context;

mod culture;

pub mod abilities;
pub mod ancestries;
pub mod careers;
pub mod chapters;
pub mod classes;
pub mod complications;
pub mod conditions;
pub mod deities;
pub mod environments;
pub mod features;
pub mod kits;
pub mod languages;
pub mod motivations;
pub mod movement;
pub mod perks;
pub mod skills;
pub mod titles;
pub mod treasures;
pub mod upbringings;

use rulesforge_shared::{Category, Result};
use serde_json::Value;

pub use crate::context::ParseContext;

/// Truthiness over JSON values: null, zero, and empty strings or
/// containers all count as absent. Used where record fields are kept
/// only when they carry information.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Uppercase the first letter of every word, lowercasing the rest.
pub(crate) fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut boundary = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if boundary {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(ch);
            boundary = true;
        }
    }
    out
}

/// A parser for one output category.
pub trait CategoryParser {
    /// The category this parser produces.
    fn category(&self) -> Category;

    /// Parse the category's source documents into its output value.
    fn parse(&self, ctx: &ParseContext) -> Result<Value>;
}

/// Every category parser, in execution order.
///
/// Classes, abilities, and features run first: their outputs anchor the
/// cross-reference checks and are the ones readers reach for when a run
/// is cut short. The rest keep the declared order from
/// [`Category::ALL`]; nothing downstream depends on it.
pub fn registry() -> Vec<Box<dyn CategoryParser>> {
    vec![
        Box::new(classes::ClassesParser),
        Box::new(abilities::AbilitiesParser),
        Box::new(features::FeaturesParser),
        Box::new(ancestries::AncestriesParser),
        Box::new(careers::CareersParser),
        Box::new(upbringings::UpbringingsParser),
        Box::new(chapters::ChaptersParser),
        Box::new(complications::ComplicationsParser),
        Box::new(conditions::ConditionsParser),
        Box::new(environments::EnvironmentsParser),
        Box::new(kits::KitsParser),
        Box::new(languages::LanguagesParser),
        Box::new(motivations::MotivationsParser),
        Box::new(movement::MovementParser),
        Box::new(deities::DeitiesParser),
        Box::new(perks::PerksParser),
        Box::new(skills::SkillsParser),
        Box::new(titles::TitlesParser),
        Box::new(treasures::TreasuresParser),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_category_in_order() {
        let parsers = registry();
        let categories: Vec<Category> = parsers.iter().map(|p| p.category()).collect();
        assert_eq!(categories, Category::ALL);
    }
}
