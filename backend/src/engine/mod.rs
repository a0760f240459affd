//! Matching and transformation engine.
//!
//! Two independent, pure operations over [`crate::models::Table`]:
//!
//! - [`match_tables`] / [`match_report`] pair source rows with their best
//!   target row and merge them.
//! - [`transform`] derives new columns from existing ones.
//!
//! Neither touches the filesystem or logs; hosts (CLI, HTTP, pipeline) do that.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabmatch::engine::{match_tables, transform, MatchOptions};
//! use tabmatch::rules::{MatchRule, TransformRule};
//!
//! let rules = vec![MatchRule::fuzzy("name", "full_name", 0.8)];
//! let merged = match_tables(&source, &target, &rules, &MatchOptions::default())?;
//! let outcome = transform(&merged, &[TransformRule::number_format("balance", "balance", 2)])?;
//! ```

pub mod matcher;
pub mod operations;
pub mod similarity;
pub mod transformer;

pub use matcher::{match_report, match_tables, MatchOptions, MatchReport, RowMatch, ThresholdPolicy};
pub use similarity::FuzzyScorer;
pub use transformer::{transform, RuleApplicationError, TransformOutcome, ValueCoercionWarning};
