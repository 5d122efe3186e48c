//! Fine-grained span comparison with traditional and fair scoring.
//!
//! Every gold span is matched one-to-one against system spans and the pair
//! is classified along two axes: interval overlap ([`OverlapType`]) and
//! label (in)equality. That yields the error taxonomy
//!
//! - **TP**: identical boundaries, identical label
//! - **LE**: identical boundaries, different label
//! - **BES/BEL/BEO**: same label, system span too short / too long /
//!   shifted
//! - **LBE**: overlapping boundaries and different label
//! - **FN/FP**: unmatched gold / unmatched system spans
//!
//! *Traditional* scoring accepts only exact matches and books every error
//! twice, as a false positive and a false negative. *Fair* scoring books
//! each error once, in its own bucket, and grants boundary errors partial
//! credit through a weighting scheme ([`FairWeights`]).

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use super::merge::Merge;

/// Label used in the confusion table for the missing side of an unmatched
/// span.
pub const NO_LABEL: &str = "_";

/// A flattened span as seen by the evaluator.
///
/// Indices are zero-based token indices, both ends inclusive, computed
/// without punctuation; the token set likewise excludes punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalSpan {
    /// Span label (possibly label⊕position for moving elements).
    pub label: String,
    /// First token index.
    pub start: usize,
    /// Last token index (inclusive).
    pub end: usize,
    /// Token indices covered by the span.
    pub tokens: BTreeSet<usize>,
}

impl EvalSpan {
    /// Create an evaluation span covering `start..=end`.
    #[must_use]
    pub fn new(label: impl Into<String>, start: usize, end: usize) -> Self {
        EvalSpan {
            label: label.into(),
            start,
            end,
            tokens: (start..=end).collect(),
        }
    }

    /// Replace the token set (for spans with internal punctuation).
    #[must_use]
    pub fn with_tokens(mut self, tokens: BTreeSet<usize>) -> Self {
        self.tokens = tokens;
        self
    }

    fn interval(&self) -> (usize, usize) {
        (self.start, self.end)
    }
}

/// Interval relation between a gold and a system span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlapType {
    /// Identical start and end.
    #[serde(rename = "TP")]
    Exact,
    /// System span nested inside the gold span (too short).
    #[serde(rename = "BES")]
    SystemShorter,
    /// System span containing the gold span (too long).
    #[serde(rename = "BEL")]
    SystemLonger,
    /// Boundaries overlap but neither contains the other.
    #[serde(rename = "BEO")]
    Crossing,
    /// No overlap at all.
    #[serde(rename = "none")]
    Disjoint,
}

impl OverlapType {
    /// Whether this is one of the boundary-error relations.
    #[must_use]
    pub fn is_boundary_error(self) -> bool {
        matches!(
            self,
            OverlapType::SystemShorter | OverlapType::SystemLonger | OverlapType::Crossing
        )
    }
}

impl std::fmt::Display for OverlapType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OverlapType::Exact => "TP",
            OverlapType::SystemShorter => "BES",
            OverlapType::SystemLonger => "BEL",
            OverlapType::Crossing => "BEO",
            OverlapType::Disjoint => "none",
        };
        write!(f, "{s}")
    }
}

/// Classify the interval relation of a gold/system pair.
///
/// Both intervals are inclusive `(start, end)` pairs. The classification is
/// total: exactly one variant applies, and swapping the arguments maps
/// `BES` ↔ `BEL` while fixing the rest.
#[must_use]
pub fn overlap_type(gold: (usize, usize), system: (usize, usize)) -> OverlapType {
    let (gs, ge) = gold;
    let (ss, se) = system;
    if gs == ss && ge == se {
        OverlapType::Exact
    } else if gs <= ss && ge >= se {
        OverlapType::SystemShorter
    } else if gs >= ss && ge <= se {
        OverlapType::SystemLonger
    } else if gs <= se && ss <= ge {
        OverlapType::Crossing
    } else {
        OverlapType::Disjoint
    }
}

/// Traditional (exact-match) counts: every error is both an FP and an FN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraditionalCounts {
    /// Exact matches.
    #[serde(rename = "TP")]
    pub true_pos: usize,
    /// System spans without an exact gold counterpart.
    #[serde(rename = "FP")]
    pub false_pos: usize,
    /// Gold spans without an exact system counterpart.
    #[serde(rename = "FN")]
    pub false_neg: usize,
}

impl TraditionalCounts {
    /// Precision `TP/(TP+FP)`; 0 when undefined.
    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.true_pos as f64, (self.true_pos + self.false_pos) as f64)
    }

    /// Recall `TP/(TP+FN)`; 0 when undefined.
    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.true_pos as f64, (self.true_pos + self.false_neg) as f64)
    }

    /// Harmonic mean of precision and recall; 0 when undefined.
    #[must_use]
    pub fn f1(&self) -> f64 {
        f1_score(self.precision(), self.recall())
    }

    /// Counts plus derived metrics, for reporting.
    #[must_use]
    pub fn scored(&self) -> ScoredTraditional {
        ScoredTraditional {
            counts: *self,
            precision: self.precision(),
            recall: self.recall(),
            f1: self.f1(),
        }
    }
}

impl Merge for TraditionalCounts {
    fn merge(&mut self, other: Self) {
        self.true_pos += other.true_pos;
        self.false_pos += other.false_pos;
        self.false_neg += other.false_neg;
    }
}

/// Fair counts: every error is booked once, in its own bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairCounts {
    /// Exact matches.
    #[serde(rename = "TP")]
    pub true_pos: usize,
    /// Unmatched system spans.
    #[serde(rename = "FP")]
    pub false_pos: usize,
    /// Unmatched gold spans.
    #[serde(rename = "FN")]
    pub false_neg: usize,
    /// Labeling errors (exact boundaries, wrong label).
    #[serde(rename = "LE")]
    pub label_error: usize,
    /// Boundary errors: system span too short.
    #[serde(rename = "BES")]
    pub shorter: usize,
    /// Boundary errors: system span too long.
    #[serde(rename = "BEL")]
    pub longer: usize,
    /// Boundary errors: shifted match.
    #[serde(rename = "BEO")]
    pub crossing: usize,
    /// Label-and-boundary errors.
    #[serde(rename = "LBE")]
    pub label_boundary_error: usize,
}

impl FairCounts {
    /// Total boundary errors (`BES + BEL + BEO`).
    #[must_use]
    pub fn boundary_errors(&self) -> usize {
        self.shorter + self.longer + self.crossing
    }

    /// Weighted true positives under a weighting scheme.
    #[must_use]
    pub fn weighted_true_pos(&self, weights: &FairWeights) -> f64 {
        self.true_pos as f64
            + self.label_error as f64 * weights.label_error.tp_share
            + self.boundary_errors() as f64 * weights.boundary_error.tp_share
            + self.label_boundary_error as f64 * weights.label_boundary_error.tp_share
    }

    fn weighted_false_pos(&self, weights: &FairWeights) -> f64 {
        self.false_pos as f64
            + self.label_error as f64 * weights.label_error.fp_share
            + self.boundary_errors() as f64 * weights.boundary_error.fp_share
            + self.label_boundary_error as f64 * weights.label_boundary_error.fp_share
    }

    fn weighted_false_neg(&self, weights: &FairWeights) -> f64 {
        self.false_neg as f64
            + self.label_error as f64 * weights.label_error.fn_share
            + self.boundary_errors() as f64 * weights.boundary_error.fn_share
            + self.label_boundary_error as f64 * weights.label_boundary_error.fn_share
    }

    /// Fair precision under a weighting scheme; 0 when undefined.
    #[must_use]
    pub fn precision(&self, weights: &FairWeights) -> f64 {
        let tp = self.weighted_true_pos(weights);
        ratio(tp, tp + self.weighted_false_pos(weights))
    }

    /// Fair recall under a weighting scheme; 0 when undefined.
    #[must_use]
    pub fn recall(&self, weights: &FairWeights) -> f64 {
        let tp = self.weighted_true_pos(weights);
        ratio(tp, tp + self.weighted_false_neg(weights))
    }

    /// Fair F1 under a weighting scheme; 0 when undefined.
    #[must_use]
    pub fn f1(&self, weights: &FairWeights) -> f64 {
        f1_score(self.precision(weights), self.recall(weights))
    }

    /// Counts plus derived metrics, for reporting.
    #[must_use]
    pub fn scored(&self, weights: &FairWeights) -> ScoredFair {
        ScoredFair {
            true_pos: self.true_pos,
            false_pos: self.false_pos,
            false_neg: self.false_neg,
            label_error: self.label_error,
            boundary_error: self.boundary_errors(),
            shorter: self.shorter,
            longer: self.longer,
            crossing: self.crossing,
            label_boundary_error: self.label_boundary_error,
            precision: self.precision(weights),
            recall: self.recall(weights),
            f1: self.f1(weights),
        }
    }
}

impl Merge for FairCounts {
    fn merge(&mut self, other: Self) {
        self.true_pos += other.true_pos;
        self.false_pos += other.false_pos;
        self.false_neg += other.false_neg;
        self.label_error += other.label_error;
        self.shorter += other.shorter;
        self.longer += other.longer;
        self.crossing += other.crossing;
        self.label_boundary_error += other.label_boundary_error;
    }
}

/// How one error category contributes to the weighted TP/FP/FN totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeight {
    /// Partial credit toward true positives.
    pub tp_share: f64,
    /// Cost booked as false positive.
    pub fp_share: f64,
    /// Cost booked as false negative.
    pub fn_share: f64,
}

impl CategoryWeight {
    /// A weight contributing `tp` credit and `fp`/`fn` costs.
    #[must_use]
    pub const fn new(tp_share: f64, fp_share: f64, fn_share: f64) -> Self {
        CategoryWeight {
            tp_share,
            fp_share,
            fn_share,
        }
    }
}

/// Weights of the error categories in the fair metrics.
///
/// The defaults book a labeling error and a label-boundary error as half a
/// false positive plus half a false negative (counted once, not twice), and
/// grant boundary errors half a true positive: a system span that found the
/// right thing with imperfect boundaries is worth more than nothing but
/// less than a hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairWeights {
    /// Weight of labeling errors (LE).
    pub label_error: CategoryWeight,
    /// Weight of boundary errors (BES/BEL/BEO).
    pub boundary_error: CategoryWeight,
    /// Weight of label-and-boundary errors (LBE).
    pub label_boundary_error: CategoryWeight,
}

impl Default for FairWeights {
    fn default() -> Self {
        FairWeights {
            label_error: CategoryWeight::new(0.0, 0.5, 0.5),
            boundary_error: CategoryWeight::new(0.5, 0.25, 0.25),
            label_boundary_error: CategoryWeight::new(0.0, 0.5, 0.5),
        }
    }
}

/// Traditional and fair counts over the same span pairing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeCounts {
    /// Exact-match bookkeeping.
    pub traditional: TraditionalCounts,
    /// Fine-grained bookkeeping.
    pub fair: FairCounts,
}

impl SchemeCounts {
    /// Both blocks with derived metrics.
    #[must_use]
    pub fn scored(&self, weights: &FairWeights) -> ScoredSchemes {
        ScoredSchemes {
            traditional: self.traditional.scored(),
            fair: self.fair.scored(weights),
        }
    }
}

impl Merge for SchemeCounts {
    fn merge(&mut self, other: Self) {
        self.traditional.merge(other.traditional);
        self.fair.merge(other.fair);
    }
}

/// Per-label counts for both schemes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerLabelCounts {
    /// Traditional counts by label.
    pub traditional: BTreeMap<String, TraditionalCounts>,
    /// Fair counts by label.
    pub fair: BTreeMap<String, FairCounts>,
}

impl Merge for PerLabelCounts {
    fn merge(&mut self, other: Self) {
        self.traditional.merge(other.traditional);
        self.fair.merge(other.fair);
    }
}

/// Result of comparing one gold span list against one system span list.
///
/// Metrics are not stored here: counts of any number of reports can be
/// merged first and scored once at the end (metrics are not additive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanEvalReport {
    /// Counts over all labels.
    pub overall: SchemeCounts,
    /// Counts per label.
    pub per_label: PerLabelCounts,
    /// Confusion table: gold label → system label → frequency, with
    /// [`NO_LABEL`] on the missing side of FN/FP rows.
    #[serde(rename = "conf")]
    pub confusion: BTreeMap<String, BTreeMap<String, usize>>,
}

impl SpanEvalReport {
    /// Make sure every allow-listed label has a (possibly zero) per-label
    /// block, so merged reports keep an identical shape.
    pub fn seed_labels<S: AsRef<str>>(&mut self, labels: &[S]) {
        for label in labels {
            self.per_label
                .traditional
                .entry(label.as_ref().to_string())
                .or_default();
            self.per_label
                .fair
                .entry(label.as_ref().to_string())
                .or_default();
        }
    }

    /// Counts plus derived metrics for every block.
    #[must_use]
    pub fn summary(&self, weights: &FairWeights) -> SpanEvalSummary {
        SpanEvalSummary {
            overall: self.overall.scored(weights),
            per_label: ScoredPerLabel {
                traditional: self
                    .per_label
                    .traditional
                    .iter()
                    .map(|(l, c)| (l.clone(), c.scored()))
                    .collect(),
                fair: self
                    .per_label
                    .fair
                    .iter()
                    .map(|(l, c)| (l.clone(), c.scored(weights)))
                    .collect(),
            },
            confusion: self.confusion.clone(),
        }
    }
}

impl Merge for SpanEvalReport {
    fn merge(&mut self, other: Self) {
        self.overall.merge(other.overall);
        self.per_label.merge(other.per_label);
        self.confusion.merge(other.confusion);
    }
}

/// Traditional counts with derived metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredTraditional {
    /// The raw counts.
    #[serde(flatten)]
    pub counts: TraditionalCounts,
    /// Precision.
    #[serde(rename = "Prec")]
    pub precision: f64,
    /// Recall.
    #[serde(rename = "Rec")]
    pub recall: f64,
    /// F1 score.
    #[serde(rename = "F1")]
    pub f1: f64,
}

/// Fair counts with the aggregate BE bucket and derived metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredFair {
    /// Exact matches.
    #[serde(rename = "TP")]
    pub true_pos: usize,
    /// Unmatched system spans.
    #[serde(rename = "FP")]
    pub false_pos: usize,
    /// Unmatched gold spans.
    #[serde(rename = "FN")]
    pub false_neg: usize,
    /// Labeling errors.
    #[serde(rename = "LE")]
    pub label_error: usize,
    /// All boundary errors.
    #[serde(rename = "BE")]
    pub boundary_error: usize,
    /// System span too short.
    #[serde(rename = "BES")]
    pub shorter: usize,
    /// System span too long.
    #[serde(rename = "BEL")]
    pub longer: usize,
    /// Shifted match.
    #[serde(rename = "BEO")]
    pub crossing: usize,
    /// Label-and-boundary errors.
    #[serde(rename = "LBE")]
    pub label_boundary_error: usize,
    /// Precision.
    #[serde(rename = "Prec")]
    pub precision: f64,
    /// Recall.
    #[serde(rename = "Rec")]
    pub recall: f64,
    /// F1 score.
    #[serde(rename = "F1")]
    pub f1: f64,
}

/// Scored traditional and fair blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredSchemes {
    /// Traditional block.
    pub traditional: ScoredTraditional,
    /// Fair block.
    pub fair: ScoredFair,
}

/// Scored per-label blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredPerLabel {
    /// Traditional block per label.
    pub traditional: BTreeMap<String, ScoredTraditional>,
    /// Fair block per label.
    pub fair: BTreeMap<String, ScoredFair>,
}

/// A full report with metrics everywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanEvalSummary {
    /// Scored overall counts.
    pub overall: ScoredSchemes,
    /// Scored per-label counts.
    pub per_label: ScoredPerLabel,
    /// Confusion table.
    #[serde(rename = "conf")]
    pub confusion: BTreeMap<String, BTreeMap<String, usize>>,
}

/// `num/den` with division by zero recovered to 0.
#[must_use]
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Harmonic mean of precision and recall; 0 when both are 0.
#[must_use]
pub fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// The matching stages, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Exact,
    Label,
    Boundary,
    LabelBoundary,
}

/// Compare system spans against gold spans.
///
/// Matching is one-to-one and runs in global stages — all exact matches
/// first, then labeling errors, boundary errors, and label-boundary errors
/// — so a weaker pairing can never consume a span that another gold span
/// matches exactly. Within a stage, gold spans are visited in input order;
/// among equally qualified candidates the leftmost-starting, then longest,
/// then earliest system span wins. Leftover gold spans are false negatives,
/// leftover system spans false positives.
#[must_use]
pub fn compare_spans(gold: &[EvalSpan], system: &[EvalSpan]) -> SpanEvalReport {
    let mut report = SpanEvalReport::default();
    let mut gold_used = vec![false; gold.len()];
    let mut sys_used = vec![false; system.len()];

    for stage in [Stage::Exact, Stage::Label, Stage::Boundary, Stage::LabelBoundary] {
        for (gi, g) in gold.iter().enumerate() {
            if gold_used[gi] {
                continue;
            }
            let mut best: Option<((usize, Reverse<usize>, usize), usize, OverlapType)> = None;
            for (si, s) in system.iter().enumerate() {
                if sys_used[si] {
                    continue;
                }
                let overlap = overlap_type(g.interval(), s.interval());
                let same_label = g.label == s.label;
                let qualifies = match stage {
                    Stage::Exact => overlap == OverlapType::Exact && same_label,
                    Stage::Label => overlap == OverlapType::Exact && !same_label,
                    Stage::Boundary => overlap.is_boundary_error() && same_label,
                    Stage::LabelBoundary => overlap.is_boundary_error() && !same_label,
                };
                if !qualifies {
                    continue;
                }
                let key = (s.start, Reverse(s.end), si);
                if best.as_ref().map_or(true, |(k, _, _)| key < *k) {
                    best = Some((key, si, overlap));
                }
            }
            if let Some((_, si, overlap)) = best {
                gold_used[gi] = true;
                sys_used[si] = true;
                record_match(&mut report, g, &system[si], stage, overlap);
            }
        }
    }

    for (gi, g) in gold.iter().enumerate() {
        if !gold_used[gi] {
            record_false_neg(&mut report, g);
        }
    }
    for (si, s) in system.iter().enumerate() {
        if !sys_used[si] {
            record_false_pos(&mut report, s);
        }
    }
    report
}

fn record_match(
    report: &mut SpanEvalReport,
    gold: &EvalSpan,
    system: &EvalSpan,
    stage: Stage,
    overlap: OverlapType,
) {
    *report
        .confusion
        .entry(gold.label.clone())
        .or_default()
        .entry(system.label.clone())
        .or_default() += 1;

    match stage {
        Stage::Exact => {
            report.overall.traditional.true_pos += 1;
            report.overall.fair.true_pos += 1;
            report
                .per_label
                .traditional
                .entry(gold.label.clone())
                .or_default()
                .true_pos += 1;
            report
                .per_label
                .fair
                .entry(gold.label.clone())
                .or_default()
                .true_pos += 1;
        }
        Stage::Label | Stage::Boundary | Stage::LabelBoundary => {
            // Traditional: the error is both a miss of the gold span and a
            // spurious system span.
            report.overall.traditional.false_neg += 1;
            report.overall.traditional.false_pos += 1;
            report
                .per_label
                .traditional
                .entry(gold.label.clone())
                .or_default()
                .false_neg += 1;
            report
                .per_label
                .traditional
                .entry(system.label.clone())
                .or_default()
                .false_pos += 1;

            // Fair: booked once, under the gold label.
            book_fair_error(&mut report.overall.fair, stage, overlap);
            book_fair_error(
                report
                    .per_label
                    .fair
                    .entry(gold.label.clone())
                    .or_default(),
                stage,
                overlap,
            );
        }
    }
}

fn book_fair_error(counts: &mut FairCounts, stage: Stage, overlap: OverlapType) {
    match (stage, overlap) {
        (Stage::Label, _) => counts.label_error += 1,
        (Stage::LabelBoundary, _) => counts.label_boundary_error += 1,
        (Stage::Boundary, OverlapType::SystemShorter) => counts.shorter += 1,
        (Stage::Boundary, OverlapType::SystemLonger) => counts.longer += 1,
        (Stage::Boundary, _) => counts.crossing += 1,
        (Stage::Exact, _) => {}
    }
}

fn record_false_neg(report: &mut SpanEvalReport, gold: &EvalSpan) {
    report.overall.traditional.false_neg += 1;
    report.overall.fair.false_neg += 1;
    report
        .per_label
        .traditional
        .entry(gold.label.clone())
        .or_default()
        .false_neg += 1;
    report
        .per_label
        .fair
        .entry(gold.label.clone())
        .or_default()
        .false_neg += 1;
    *report
        .confusion
        .entry(gold.label.clone())
        .or_default()
        .entry(NO_LABEL.to_string())
        .or_default() += 1;
}

fn record_false_pos(report: &mut SpanEvalReport, system: &EvalSpan) {
    report.overall.traditional.false_pos += 1;
    report.overall.fair.false_pos += 1;
    report
        .per_label
        .traditional
        .entry(system.label.clone())
        .or_default()
        .false_pos += 1;
    report
        .per_label
        .fair
        .entry(system.label.clone())
        .or_default()
        .false_pos += 1;
    *report
        .confusion
        .entry(NO_LABEL.to_string())
        .or_default()
        .entry(system.label.clone())
        .or_default() += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(label: &str, start: usize, end: usize) -> EvalSpan {
        EvalSpan::new(label, start, end)
    }

    #[test]
    fn exact_match_scores_one_everywhere() {
        let report = compare_spans(&[span("NP", 0, 2)], &[span("NP", 0, 2)]);
        assert_eq!(report.overall.traditional.true_pos, 1);
        assert_eq!(report.overall.traditional.false_pos, 0);
        assert_eq!(report.overall.traditional.false_neg, 0);
        assert_eq!(report.overall.fair.true_pos, 1);

        let scored = report.overall.scored(&FairWeights::default());
        assert!((scored.traditional.precision - 1.0).abs() < f64::EPSILON);
        assert!((scored.traditional.recall - 1.0).abs() < f64::EPSILON);
        assert!((scored.traditional.f1 - 1.0).abs() < f64::EPSILON);
        assert!((scored.fair.f1 - 1.0).abs() < f64::EPSILON);
        assert_eq!(report.confusion["NP"]["NP"], 1);
    }

    #[test]
    fn short_system_span_is_a_bes() {
        let report = compare_spans(&[span("NP", 0, 2)], &[span("NP", 0, 1)]);
        // Traditional: one miss, one spurious span.
        assert_eq!(report.overall.traditional.true_pos, 0);
        assert_eq!(report.overall.traditional.false_pos, 1);
        assert_eq!(report.overall.traditional.false_neg, 1);
        // Fair: a single BES.
        assert_eq!(report.overall.fair.shorter, 1);
        assert_eq!(report.overall.fair.false_pos, 0);
        assert_eq!(report.overall.fair.false_neg, 0);

        let fair = report.overall.fair.scored(&FairWeights::default());
        assert!(fair.f1 > 0.0 && fair.f1 < 1.0);
        assert!((fair.f1 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn label_mismatch_with_exact_boundaries_is_le() {
        let report = compare_spans(&[span("NP", 0, 2)], &[span("PP", 0, 2)]);
        assert_eq!(report.overall.fair.label_error, 1);
        assert_eq!(report.overall.fair.true_pos, 0);
        assert_eq!(report.overall.traditional.false_pos, 1);
        assert_eq!(report.overall.traditional.false_neg, 1);
        assert_eq!(report.confusion["NP"]["PP"], 1);
        // Per label: the miss under NP, the spurious span under PP.
        assert_eq!(report.per_label.traditional["NP"].false_neg, 1);
        assert_eq!(report.per_label.traditional["PP"].false_pos, 1);
        assert_eq!(report.per_label.fair["NP"].label_error, 1);
    }

    #[test]
    fn unmatched_gold_is_a_false_negative() {
        let report = compare_spans(&[span("NP", 0, 2)], &[]);
        assert_eq!(report.overall.traditional.false_neg, 1);
        assert_eq!(report.overall.fair.false_neg, 1);
        let scored = report.overall.scored(&FairWeights::default());
        assert!(scored.traditional.recall.abs() < f64::EPSILON);
        assert_eq!(report.confusion["NP"][NO_LABEL], 1);
    }

    #[test]
    fn exact_match_beats_earlier_gold_spans_weaker_claim() {
        // The first gold span overlaps the system span, the second matches
        // it exactly; the exact match must win.
        let gold = vec![span("NP", 0, 3), span("NP", 2, 4)];
        let system = vec![span("NP", 2, 4)];
        let report = compare_spans(&gold, &system);
        assert_eq!(report.overall.fair.true_pos, 1);
        assert_eq!(report.overall.fair.false_neg, 1);
        assert_eq!(report.overall.fair.boundary_errors(), 0);
    }

    #[test]
    fn same_label_boundary_error_preferred_over_lbe() {
        let gold = vec![span("NP", 0, 3)];
        let system = vec![span("PP", 0, 3), span("NP", 0, 2)];
        // The exact-boundary PP is an LE candidate and wins the earlier
        // stage; the NP never gets matched and stays a false positive.
        let report = compare_spans(&gold, &system);
        assert_eq!(report.overall.fair.label_error, 1);
        assert_eq!(report.overall.fair.false_pos, 1);
    }

    #[test]
    fn ties_break_leftmost_then_longest() {
        let gold = vec![span("NP", 2, 5)];
        let system = vec![span("NP", 3, 5), span("NP", 2, 4), span("NP", 2, 3)];
        let report = compare_spans(&gold, &system);
        // Both candidates starting at 2 beat the one starting at 3; the
        // longer of them wins. The two leftovers are false positives.
        assert_eq!(report.overall.fair.shorter, 1);
        assert_eq!(report.overall.fair.false_pos, 2);
        assert_eq!(report.confusion["NP"]["NP"], 1);
    }

    #[test]
    fn overlap_type_is_total_and_swaps_cleanly() {
        assert_eq!(overlap_type((0, 2), (0, 2)), OverlapType::Exact);
        assert_eq!(overlap_type((0, 3), (1, 2)), OverlapType::SystemShorter);
        assert_eq!(overlap_type((1, 2), (0, 3)), OverlapType::SystemLonger);
        assert_eq!(overlap_type((0, 2), (1, 4)), OverlapType::Crossing);
        assert_eq!(overlap_type((1, 4), (0, 2)), OverlapType::Crossing);
        assert_eq!(overlap_type((0, 1), (2, 3)), OverlapType::Disjoint);
        // Containment sharing one boundary is still containment.
        assert_eq!(overlap_type((0, 2), (0, 1)), OverlapType::SystemShorter);
        assert_eq!(overlap_type((0, 1), (0, 2)), OverlapType::SystemLonger);
    }

    #[test]
    fn merge_then_score_equals_score_of_sums() {
        let a = compare_spans(&[span("NP", 0, 2)], &[span("NP", 0, 1)]);
        let b = compare_spans(&[span("NP", 4, 6)], &[span("NP", 4, 6)]);
        let mut merged = a.clone();
        merged.merge(b.clone());

        assert_eq!(
            merged.overall.fair.true_pos,
            a.overall.fair.true_pos + b.overall.fair.true_pos
        );
        assert_eq!(
            merged.overall.fair.shorter,
            a.overall.fair.shorter + b.overall.fair.shorter
        );
        // Metrics are recomputed from merged counts, not averaged:
        // TP=1 and BES=1 give weighted 1.5/0.25/0.25, so P = R = 6/7.
        let w = FairWeights::default();
        let f1 = merged.overall.fair.f1(&w);
        assert!((f1 - 6.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn zero_counts_never_divide_by_zero() {
        let empty = SpanEvalReport::default();
        let scored = empty.overall.scored(&FairWeights::default());
        assert_eq!(scored.traditional.precision, 0.0);
        assert_eq!(scored.fair.recall, 0.0);
        assert_eq!(scored.fair.f1, 0.0);
    }

    #[test]
    fn seeded_labels_keep_shape() {
        let mut report = compare_spans(&[], &[]);
        report.seed_labels(&["NP", "PP"]);
        assert!(report.per_label.traditional.contains_key("NP"));
        assert!(report.per_label.fair.contains_key("PP"));
        let json = serde_json::to_value(report.summary(&FairWeights::default())).unwrap();
        assert_eq!(json["per_label"]["fair"]["NP"]["TP"], 0);
        assert_eq!(json["per_label"]["fair"]["NP"]["BE"], 0);
    }
}
