//! Document model for the Markdown rules corpus.
//!
//! Every source document is Markdown with a YAML frontmatter header.
//! The modules here split that header off, slice heading-delimited
//! sections, and lift the recurring micro-formats (pipe tables, damage
//! clauses, ability blocks, creature stat blocks) into structured data
//! that the category parsers assemble into records.

pub mod ability;
pub mod damage;
pub mod frontmatter;
pub mod statblock;
pub mod table;
pub mod text;

pub use ability::{distance_field, parse_quoted_abilities, target_field, QuotedAbility};
pub use damage::{parse_damage_clause, DamageClause};
pub use frontmatter::{parse_document, Document};
pub use statblock::{parse_stat_block, StatBlock};
pub use table::{benefit_rows, heading_tables, keyed_rows, named_table, BenefitRow, HeadingTable};
pub use text::{slugify, strip_markdown_links};
