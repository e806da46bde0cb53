//! Core pipeline orchestration for RulesForge.
//!
//! This crate ties the category parsers to the output writer: a parse
//! run walks every declared category in order and emits one JSON file
//! per category plus a run manifest. Cross-output consistency checks
//! live in [`xref`].

pub mod pipeline;
pub mod writer;
pub mod xref;

pub use pipeline::{
    run_parse, ParseConfig, ParseResult, ParserOutcome, ProgressReporter, SilentProgress,
};
pub use writer::{write_category, write_manifest, CategoryFile};
pub use xref::{validate_xref, MissingFeature, UnreferencedFeature, XrefReport};
