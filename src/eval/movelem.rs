//! Evaluation of moving elements.
//!
//! Moving elements are scored with the generic span evaluator, but their
//! labels are first concatenated with the discourse position
//! (`NP-insitu`, `RELC-extrap`), so an element found with the right extent
//! but the wrong position surfaces as a labeling error rather than a hit.
//!
//! On the gold side, elements with an undetermined position and
//! non-attributive relative clauses (no antecedent, or only verbal
//! antecedent heads) are excluded; the system side is taken as-is, so
//! hallucinated elements still count against precision. A second,
//! position-independent evaluation restricted to relative clauses measures
//! pure detection accuracy on the unfiltered span sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::fair::{compare_spans, EvalSpan, FairWeights, SchemeCounts, ScoredSchemes, SpanEvalReport, SpanEvalSummary};
use super::merge::Merge;
use crate::discourse::{Position, RELATIVE_CLAUSE};
use crate::span::{DiscourseSet, SpanArena, SpanElement, SpanId, SpanKind};
use crate::token::{Sentence, Token};

/// Moving-element evaluation: the position-qualified span comparison plus
/// the relative-clause-only sub-evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovElemReport {
    /// Span comparison over `label-position` labels.
    pub spans: SpanEvalReport,
    /// Position-independent counts for relative clauses.
    pub relative_clauses: SchemeCounts,
}

impl MovElemReport {
    /// Counts plus derived metrics.
    #[must_use]
    pub fn summary(&self, weights: &FairWeights) -> MovElemSummary {
        MovElemSummary {
            spans: self.spans.summary(weights),
            relative_clauses: self.relative_clauses.scored(weights),
        }
    }
}

impl Merge for MovElemReport {
    fn merge(&mut self, other: Self) {
        self.spans.merge(other.spans);
        self.relative_clauses.merge(other.relative_clauses);
    }
}

/// Scored moving-element evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovElemSummary {
    /// Scored span comparison.
    pub spans: SpanEvalSummary,
    /// Scored relative-clause block.
    pub relative_clauses: ScoredSchemes,
}

/// Evaluate the moving elements of a gold/system sentence pair against a
/// `label-position` allow-list (e.g. `NP-insitu`, `RELC-extrap`).
///
/// Sentences without a discourse layer contribute fully zeroed counts.
#[must_use]
pub fn evaluate_moving_elements<S: AsRef<str>>(
    gold: &Sentence,
    system: &Sentence,
    labels: &[S],
) -> MovElemReport {
    let empty = DiscourseSet::default();
    let gold_set = gold.discourse().unwrap_or(&empty);
    let system_set = system.discourse().unwrap_or(&empty);

    let base_labels: BTreeSet<&str> = labels
        .iter()
        .filter_map(|l| l.as_ref().split('-').next())
        .collect();

    let gold_all = collect_spans(gold_set, gold.tokens(), &base_labels, false, false);
    let gold_filtered = collect_spans(gold_set, gold.tokens(), &base_labels, true, true);
    let system_all = collect_spans(system_set, system.tokens(), &base_labels, false, false);

    let mut spans = compare_spans(&gold_filtered, &system_all);
    spans.seed_labels(labels);

    // Relative clauses, position stripped, no attributivity filter.
    let strip = |mut span: EvalSpan| {
        span.label = RELATIVE_CLAUSE.to_string();
        span
    };
    let gold_relcs: Vec<EvalSpan> = gold_all
        .iter()
        .filter(|s| s.label.starts_with(RELATIVE_CLAUSE))
        .cloned()
        .map(strip)
        .collect();
    let system_relcs: Vec<EvalSpan> = system_all
        .iter()
        .filter(|s| s.label.starts_with(RELATIVE_CLAUSE))
        .cloned()
        .map(strip)
        .collect();
    let relative_clauses = compare_spans(&gold_relcs, &system_relcs).overall;

    MovElemReport {
        spans,
        relative_clauses,
    }
}

/// Flatten moving elements into position-qualified evaluation spans.
fn collect_spans(
    set: &DiscourseSet,
    tokens: &[Token],
    base_labels: &BTreeSet<&str>,
    exclude_non_attributive: bool,
    exclude_unknown_position: bool,
) -> Vec<EvalSpan> {
    let arena = &set.arena;
    let mut out = Vec::new();
    let mut stack: Vec<SpanId> = set.moving_elements.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        for el in arena.elements(id).iter().rev() {
            if let SpanElement::Span(child) = el {
                stack.push(*child);
            }
        }
        if !matches!(arena.kind(id), SpanKind::MovingElement { .. }) {
            continue;
        }
        let label = arena.label(id);
        if !base_labels.contains(label) {
            continue;
        }
        if exclude_unknown_position && arena.position(id) == Some(Position::Unknown) {
            continue;
        }
        if exclude_non_attributive && label == RELATIVE_CLAUSE && non_attributive(arena, id, tokens)
        {
            continue;
        }
        let (Some(start), Some(end)) = (
            arena.start_index(id, tokens, true),
            arena.end_index(id, tokens, true),
        ) else {
            continue;
        };
        let span_tokens: BTreeSet<usize> = arena
            .token_positions(id)
            .iter()
            .filter_map(|&p| tokens.get(p))
            .filter(|t| !t.is_punctuation())
            .filter_map(Token::id_index)
            .collect();
        if span_tokens.is_empty() {
            continue;
        }
        let position = arena
            .position(id)
            .map_or("none", Position::as_str);
        out.push(
            EvalSpan::new(format!("{label}-{position}"), start, end).with_tokens(span_tokens),
        );
    }
    out
}

/// A relative clause is non-attributive when it has no antecedent or when
/// every antecedent head is verbal.
fn non_attributive(arena: &SpanArena, relc: SpanId, tokens: &[Token]) -> bool {
    match arena.antecedent_of(relc) {
        None => true,
        Some(antec) => arena
            .heads(antec)
            .iter()
            .all(|&h| tokens.get(h).map_or(true, |t| t.xpos().starts_with('V'))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discourse::{decode_default, ANTECEDENT_COLUMN, MOVING_ELEMENT_COLUMN};

    fn sentence(movs: &[&str], antecs: &[&str], xpos: &[&str]) -> Sentence {
        let tokens = movs
            .iter()
            .zip(antecs)
            .zip(xpos)
            .enumerate()
            .map(|(i, ((m, a), x))| {
                Token::new((i + 1).to_string(), *x)
                    .with_attr(MOVING_ELEMENT_COLUMN, *m)
                    .with_attr(ANTECEDENT_COLUMN, *a)
            })
            .collect();
        let mut sent = Sentence::new(tokens);
        let set = decode_default(&sent);
        sent.set_discourse(set);
        sent
    }

    fn labels() -> Vec<String> {
        ["NP-insitu", "NP-extrap", "RELC-insitu", "RELC-extrap"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn position_qualifies_the_label() {
        let gold = sentence(
            &["B-NP-insitu", "I-NP", "_"],
            &["_", "_", "_"],
            &["ART", "NN", "$."],
        );
        // Same extent, wrong position: a labeling error, not a hit.
        let system = sentence(
            &["B-NP-extrap", "I-NP", "_"],
            &["_", "_", "_"],
            &["ART", "NN", "$."],
        );
        let report = evaluate_moving_elements(&gold, &system, &labels());
        assert_eq!(report.spans.overall.fair.label_error, 1);
        assert_eq!(report.spans.overall.fair.true_pos, 0);
        assert_eq!(report.spans.confusion["NP-insitu"]["NP-extrap"], 1);
    }

    #[test]
    fn relc_subevaluation_ignores_position() {
        let gold = sentence(
            &["_", "_", "B-RELC-extrap-1", "I-RELC", "_"],
            &["B-Antec-1-Head", "_", "_", "_", "_"],
            &["NN", "VVFIN", "PRELS", "VVFIN", "$."],
        );
        let system = sentence(
            &["_", "_", "B-RELC-insitu-1", "I-RELC", "_"],
            &["B-Antec-1-Head", "_", "_", "_", "_"],
            &["NN", "VVFIN", "PRELS", "VVFIN", "$."],
        );
        let report = evaluate_moving_elements(&gold, &system, &labels());
        // Qualified labels differ: labeling error.
        assert_eq!(report.spans.overall.fair.label_error, 1);
        // The position-independent RELC block sees a hit.
        assert_eq!(report.relative_clauses.fair.true_pos, 1);
        assert_eq!(report.relative_clauses.traditional.true_pos, 1);
    }

    #[test]
    fn unknown_position_and_nonattributive_relcs_leave_gold() {
        let gold = sentence(
            &["B-NP-unknown", "_", "B-RELC-extrap-9", "I-RELC", "_"],
            &["_", "_", "_", "_", "_"],
            &["NN", "VVFIN", "PRELS", "VVFIN", "$."],
        );
        let system = sentence(
            &["_", "_", "_", "_", "_"],
            &["_", "_", "_", "_", "_"],
            &["NN", "VVFIN", "PRELS", "VVFIN", "$."],
        );
        // The unknown-position NP and the antecedent-less RELC are both
        // excluded from gold: nothing to find, nothing missed.
        let report = evaluate_moving_elements(&gold, &system, &labels());
        assert_eq!(report.spans.overall.fair.false_neg, 0);
        assert_eq!(report.spans.overall.fair.true_pos, 0);
        // The RELC block still sees the unfiltered clause as missed.
        assert_eq!(report.relative_clauses.fair.false_neg, 1);
    }

    #[test]
    fn system_spans_are_not_filtered() {
        let gold = sentence(
            &["_", "_", "_"],
            &["_", "_", "_"],
            &["ART", "NN", "$."],
        );
        let system = sentence(
            &["B-NP-unknown", "I-NP", "_"],
            &["_", "_", "_"],
            &["ART", "NN", "$."],
        );
        let report = evaluate_moving_elements(&gold, &system, &labels());
        assert_eq!(report.spans.overall.fair.false_pos, 1);
    }

    #[test]
    fn nested_elements_are_collected() {
        let gold = sentence(
            &["B-RELC-extrap-1", "I-RELC|B-NP-insitu", "I-RELC|I-NP", "_"],
            &["B-Antec-1-Head", "_", "_", "_"],
            &["NN", "ART", "NN", "$."],
        );
        let report = evaluate_moving_elements(&gold, &gold.clone(), &labels());
        // Both the clause and the nested NP match exactly.
        assert_eq!(report.spans.overall.fair.true_pos, 2);
        assert_eq!(report.relative_clauses.fair.true_pos, 1);
    }

    #[test]
    fn empty_pair_keeps_label_shape() {
        let gold = sentence(&["_"], &["_"], &["NN"]);
        let report = evaluate_moving_elements(&gold, &gold.clone(), &labels());
        assert_eq!(report.spans.overall.fair, Default::default());
        for label in labels() {
            assert!(report.spans.per_label.fair.contains_key(&label));
        }
    }
}
