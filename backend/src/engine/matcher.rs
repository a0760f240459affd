//! Row matcher
//!
//! Pairs every source row with the single best target row under a list of
//! [`MatchRule`]s and merges each pair into one output row.
//!
//! For a source row, every target row is scored as the mean of the per-rule
//! scores. The first target reaching the highest aggregate wins, provided the
//! aggregate is strictly positive and passes the threshold policy. Source rows
//! without a winner are dropped.

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::similarity::{self, FuzzyScorer};
use crate::error::{SchemaError, SchemaResult, TableRole};
use crate::models::{Column, Table, Value};
use crate::rules::{MatchRule, MatchType};

/// How rule thresholds gate a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// The aggregate score must reach the smallest threshold of all rules.
    #[default]
    GlobalMinimum,
    /// Every rule's own score must reach that rule's threshold.
    PerRule,
}

/// Matcher knobs carried by a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchOptions {
    #[serde(default)]
    pub threshold_policy: ThresholdPolicy,
    #[serde(default)]
    pub fuzzy_scorer: FuzzyScorer,
    /// Scan source rows on the rayon pool. Ignored without the `parallel` feature.
    #[serde(default)]
    pub parallel: bool,
}

/// One accepted source/target pairing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowMatch {
    pub source_row: usize,
    pub target_row: usize,
    pub score: f64,
}

/// Merged table plus the pairing that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    pub table: Table,
    /// In source-row order, one per output row.
    pub matches: Vec<RowMatch>,
    /// Source rows that found no acceptable target.
    pub unmatched: Vec<usize>,
}

impl MatchReport {
    pub fn matched_count(&self) -> usize {
        self.matches.len()
    }
}

/// Match `source` against `target` and return the merged rows.
pub fn match_tables(source: &Table, target: &Table, rules: &[MatchRule], options: &MatchOptions) -> SchemaResult<Table> {
    Ok(match_report(source, target, rules, options)?.table)
}

/// Like [`match_tables`] but also reports scores and unmatched source rows.
pub fn match_report(
    source: &Table,
    target: &Table,
    rules: &[MatchRule],
    options: &MatchOptions,
) -> SchemaResult<MatchReport> {
    let plan = MatchPlan::resolve(source, target, rules, options)?;
    let best = plan.scan(source.row_count());

    let mut matches = Vec::new();
    let mut unmatched = Vec::new();
    for (source_row, found) in best.into_iter().enumerate() {
        match found {
            Some(m) => matches.push(m),
            None => unmatched.push(source_row),
        }
    }

    let table = merge(source, target, &matches);
    Ok(MatchReport {
        table,
        matches,
        unmatched,
    })
}

// =============================================================================
// Scoring plan
// =============================================================================

/// A rule with both of its columns pre-normalized.
struct ResolvedRule {
    match_type: MatchType,
    threshold: f64,
    source_keys: Vec<String>,
    target_keys: Vec<String>,
}

struct MatchPlan {
    rules: Vec<ResolvedRule>,
    policy: ThresholdPolicy,
    scorer: FuzzyScorer,
    floor: f64,
    target_rows: usize,
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    parallel: bool,
}

impl MatchPlan {
    fn resolve(source: &Table, target: &Table, rules: &[MatchRule], options: &MatchOptions) -> SchemaResult<Self> {
        if rules.is_empty() {
            return Err(SchemaError::EmptyRuleSet);
        }

        let mut resolved = Vec::with_capacity(rules.len());
        for (rule_index, rule) in rules.iter().enumerate() {
            if !(0.0..=1.0).contains(&rule.threshold) {
                return Err(SchemaError::InvalidThreshold {
                    rule_index,
                    threshold: rule.threshold,
                });
            }
            let source_col = source
                .column(&rule.source_column)
                .ok_or_else(|| SchemaError::missing(TableRole::Source, &rule.source_column))?;
            let target_col = target
                .column(&rule.target_column)
                .ok_or_else(|| SchemaError::missing(TableRole::Target, &rule.target_column))?;

            resolved.push(ResolvedRule {
                match_type: rule.match_type,
                threshold: rule.threshold,
                source_keys: normalize_all(&source_col.values, rule.case_sensitive),
                target_keys: normalize_all(&target_col.values, rule.case_sensitive),
            });
        }

        let floor = rules.iter().map(|r| r.threshold).fold(f64::INFINITY, f64::min);

        Ok(Self {
            rules: resolved,
            policy: options.threshold_policy,
            scorer: options.fuzzy_scorer,
            floor,
            target_rows: target.row_count(),
            parallel: options.parallel,
        })
    }

    #[cfg(feature = "parallel")]
    fn scan(&self, source_rows: usize) -> Vec<Option<RowMatch>> {
        if self.parallel {
            // collect() on an indexed parallel iterator keeps source order
            (0..source_rows).into_par_iter().map(|s| self.best_for(s)).collect()
        } else {
            (0..source_rows).map(|s| self.best_for(s)).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn scan(&self, source_rows: usize) -> Vec<Option<RowMatch>> {
        (0..source_rows).map(|s| self.best_for(s)).collect()
    }

    /// Best target for one source row, first one wins on ties.
    fn best_for(&self, source_row: usize) -> Option<RowMatch> {
        let mut best: Option<RowMatch> = None;
        let mut best_score = 0.0;

        for target_row in 0..self.target_rows {
            let (aggregate, all_pass) = self.score_pair(source_row, target_row);
            let eligible = match self.policy {
                ThresholdPolicy::GlobalMinimum => aggregate >= self.floor,
                ThresholdPolicy::PerRule => all_pass,
            };
            if aggregate > best_score && eligible {
                best_score = aggregate;
                best = Some(RowMatch {
                    source_row,
                    target_row,
                    score: aggregate,
                });
            }
        }
        best
    }

    /// Mean rule score and whether every rule met its own threshold.
    fn score_pair(&self, source_row: usize, target_row: usize) -> (f64, bool) {
        let mut total = 0.0;
        let mut all_pass = true;
        for rule in &self.rules {
            let s = similarity::score(
                rule.match_type,
                self.scorer,
                &rule.source_keys[source_row],
                &rule.target_keys[target_row],
            );
            all_pass &= s >= rule.threshold;
            total += s;
        }
        (total / self.rules.len() as f64, all_pass)
    }
}

fn normalize_all(values: &[Value], case_sensitive: bool) -> Vec<String> {
    values
        .iter()
        .map(|v| similarity::normalize(v, case_sensitive))
        .collect()
}

// =============================================================================
// Merge
// =============================================================================

#[derive(Clone, Copy)]
enum Origin {
    Source(usize),
    Target(usize),
}

/// Source columns first, then target-only columns. A shared column name keeps
/// its source position but carries the target's value.
fn merge(source: &Table, target: &Table, matches: &[RowMatch]) -> Table {
    let mut layout: Vec<(&str, Origin)> = source
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), Origin::Source(i)))
        .collect();

    for (j, column) in target.columns().iter().enumerate() {
        match layout.iter().position(|(name, _)| *name == column.name) {
            Some(pos) => layout[pos].1 = Origin::Target(j),
            None => layout.push((column.name.as_str(), Origin::Target(j))),
        }
    }

    let columns = layout
        .into_iter()
        .map(|(name, origin)| {
            let values = matches
                .iter()
                .map(|m| match origin {
                    Origin::Source(i) => source.columns()[i].values[m.source_row].clone(),
                    Origin::Target(j) => target.columns()[j].values[m.target_row].clone(),
                })
                .collect();
            Column::new(name, values)
        })
        .collect();

    Table::from_valid_columns(columns)
}
