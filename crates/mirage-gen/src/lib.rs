//! # Mirage Generator
//!
//! The build-time half of the mirage proxy system. Consumes a declarative
//! list of proxy definitions (which implementation type, narrowed to which
//! capability contract, under what name and visibility) and emits ordinary
//! Rust source: one parameter-pack artifact per namespace and one illusion
//! type per definition, all targeting the `mirage` runtime crate.
//!
//! Generation is a two-phase pass: collect and validate definitions, then
//! emit artifacts. Definition-time problems never abort the pass; they
//! accumulate as [`diag::Diagnostic`]s and the offending definition or
//! member is skipped.
//!
//! Emitted artifacts are unformatted token streams; run them through
//! rustfmt in the consuming build script if readability matters.

pub mod diag;
pub mod emit;
pub mod generate;
pub mod model;
pub mod pack;
pub mod proxy;
pub mod select;
