//! Evaluation of relative-clause antecedents.
//!
//! Antecedents are not scored as free-standing spans: an antecedent is
//! meaningless without the moving element it attaches to, so every match
//! additionally requires the linked elements' start indices to coincide.
//! They all share one label, which removes the labeling-error axis, and
//! their right boundary matters more than the exact extent (a fuzzy match
//! with the correct right boundary still determines the original position
//! of the element and the distance between the two).
//!
//! For each gold antecedent the match is, in order of preference: same
//! boundaries (**Correct**), overlapping boundaries (**BES/BEL/BEO**, with
//! **BEright** tracking right-aligned ones), or no overlap at all but the
//! correct element (**IL**, "incorrect location"). Leftovers are **FN**
//! and **FP**. Results are bucketed by the distance between antecedent and
//! element (non-punctuation tokens strictly between them) so that
//! accuracy-by-distance curves can be drawn, plus an `overall` bucket.
//!
//! Head tokens are scored at three nested strictness tiers: over correct
//! antecedents only (`Correct`), adding right-aligned fuzzy matches
//! (`Right`), and over all matched pairs including IL (`All`).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::fair::{f1_score, overlap_type, ratio, FairWeights, OverlapType};
use super::merge::Merge;
use crate::discourse::RELATIVE_CLAUSE;
use crate::span::{DiscourseSet, SpanArena, SpanId};
use crate::token::{Sentence, Token};

/// Head-token counts at the three strictness tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadCounts {
    /// Correct head tokens of correct antecedents.
    #[serde(rename = "TP_Head_Correct")]
    pub tp_correct: usize,
    /// Spurious head tokens of correct antecedents.
    #[serde(rename = "FP_Head_Correct")]
    pub fp_correct: usize,
    /// Missing head tokens of correct antecedents.
    #[serde(rename = "FN_Head_Correct")]
    pub fn_correct: usize,
    /// Correct head tokens, right-aligned matches included.
    #[serde(rename = "TP_Head_Right")]
    pub tp_right: usize,
    /// Spurious head tokens, right-aligned matches included.
    #[serde(rename = "FP_Head_Right")]
    pub fp_right: usize,
    /// Missing head tokens, right-aligned matches included.
    #[serde(rename = "FN_Head_Right")]
    pub fn_right: usize,
    /// Correct head tokens over all matches.
    #[serde(rename = "TP_Head_All")]
    pub tp_all: usize,
    /// Spurious head tokens over all matches.
    #[serde(rename = "FP_Head_All")]
    pub fp_all: usize,
    /// Missing head tokens over all matches.
    #[serde(rename = "FN_Head_All")]
    pub fn_all: usize,
}

impl Merge for HeadCounts {
    fn merge(&mut self, other: Self) {
        self.tp_correct += other.tp_correct;
        self.fp_correct += other.fp_correct;
        self.fn_correct += other.fn_correct;
        self.tp_right += other.tp_right;
        self.fp_right += other.fp_right;
        self.fn_right += other.fn_right;
        self.tp_all += other.tp_all;
        self.fp_all += other.fp_all;
        self.fn_all += other.fn_all;
    }
}

/// Error counts for one distance bucket (or the overall bucket).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntecedentCounts {
    /// Correct boundaries, correct moving element.
    #[serde(rename = "Correct")]
    pub correct: usize,
    /// Boundary errors: system antecedent too short.
    #[serde(rename = "BES")]
    pub shorter: usize,
    /// Boundary errors: system antecedent too long.
    #[serde(rename = "BEL")]
    pub longer: usize,
    /// Boundary errors: shifted match.
    #[serde(rename = "BEO")]
    pub crossing: usize,
    /// All boundary errors.
    #[serde(rename = "BE")]
    pub boundary: usize,
    /// Boundary errors whose right boundary is correct.
    #[serde(rename = "BEright")]
    pub right_aligned: usize,
    /// Correct moving element, but no overlap with the gold antecedent.
    #[serde(rename = "IL")]
    pub incorrect_location: usize,
    /// System antecedents without a gold counterpart.
    #[serde(rename = "FP")]
    pub false_pos: usize,
    /// Gold antecedents without a system counterpart.
    #[serde(rename = "FN")]
    pub false_neg: usize,
    /// Head-token counts.
    #[serde(flatten)]
    pub heads: HeadCounts,
}

impl AntecedentCounts {
    fn weighted(&self, weights: &FairWeights) -> (f64, f64, f64) {
        let be = self.boundary as f64;
        let il = self.incorrect_location as f64;
        let tp = self.correct as f64 + be * weights.boundary_error.tp_share;
        let fp = self.false_pos as f64 + 0.5 * il + be * weights.boundary_error.fp_share;
        let fn_ = self.false_neg as f64 + 0.5 * il + be * weights.boundary_error.fn_share;
        (tp, fp, fn_)
    }

    /// Fair precision, with IL matches half-weighted as FP.
    #[must_use]
    pub fn precision(&self, weights: &FairWeights) -> f64 {
        let (tp, fp, _) = self.weighted(weights);
        ratio(tp, tp + fp)
    }

    /// Fair recall, with IL matches half-weighted as FN.
    #[must_use]
    pub fn recall(&self, weights: &FairWeights) -> f64 {
        let (tp, _, fn_) = self.weighted(weights);
        ratio(tp, tp + fn_)
    }

    /// Fair F1.
    #[must_use]
    pub fn f1(&self, weights: &FairWeights) -> f64 {
        f1_score(self.precision(weights), self.recall(weights))
    }

    fn weighted_right(&self) -> (f64, f64, f64) {
        // Right-aligned boundary errors count as full hits; the remaining
        // boundary errors as half FP, half FN.
        let residual = (self.boundary - self.right_aligned) as f64;
        let il = self.incorrect_location as f64;
        let tp = (self.correct + self.right_aligned) as f64;
        let fp = self.false_pos as f64 + 0.5 * il + 0.5 * residual;
        let fn_ = self.false_neg as f64 + 0.5 * il + 0.5 * residual;
        (tp, fp, fn_)
    }

    /// F1 when right-aligned boundary errors are accepted as hits.
    #[must_use]
    pub fn f1_right(&self) -> f64 {
        let (tp, fp, fn_) = self.weighted_right();
        f1_score(ratio(tp, tp + fp), ratio(tp, tp + fn_))
    }

    /// Counts plus derived metrics.
    #[must_use]
    pub fn scored(&self, weights: &FairWeights) -> ScoredAntecedent {
        let heads = &self.heads;
        let head_prf = |tp: usize, fp: usize, fn_: usize| {
            let p = ratio(tp as f64, (tp + fp) as f64);
            let r = ratio(tp as f64, (tp + fn_) as f64);
            (p, r, f1_score(p, r))
        };
        let (hc_p, hc_r, hc_f) = head_prf(heads.tp_correct, heads.fp_correct, heads.fn_correct);
        let (hr_p, hr_r, hr_f) = head_prf(heads.tp_right, heads.fp_right, heads.fn_right);
        let (ha_p, ha_r, ha_f) = head_prf(heads.tp_all, heads.fp_all, heads.fn_all);
        ScoredAntecedent {
            counts: *self,
            precision: self.precision(weights),
            recall: self.recall(weights),
            f1: self.f1(weights),
            f1_right: self.f1_right(),
            head_correct_precision: hc_p,
            head_correct_recall: hc_r,
            head_correct_f1: hc_f,
            head_right_precision: hr_p,
            head_right_recall: hr_r,
            head_right_f1: hr_f,
            head_all_precision: ha_p,
            head_all_recall: ha_r,
            head_all_f1: ha_f,
        }
    }
}

impl Merge for AntecedentCounts {
    fn merge(&mut self, other: Self) {
        self.correct += other.correct;
        self.shorter += other.shorter;
        self.longer += other.longer;
        self.crossing += other.crossing;
        self.boundary += other.boundary;
        self.right_aligned += other.right_aligned;
        self.incorrect_location += other.incorrect_location;
        self.false_pos += other.false_pos;
        self.false_neg += other.false_neg;
        self.heads.merge(other.heads);
    }
}

/// Antecedent counts with derived metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredAntecedent {
    /// The raw counts.
    #[serde(flatten)]
    pub counts: AntecedentCounts,
    /// Fair precision.
    #[serde(rename = "Prec")]
    pub precision: f64,
    /// Fair recall.
    #[serde(rename = "Rec")]
    pub recall: f64,
    /// Fair F1.
    #[serde(rename = "F1")]
    pub f1: f64,
    /// F1 accepting right-aligned boundary errors as hits.
    #[serde(rename = "F1right")]
    pub f1_right: f64,
    /// Head precision over correct antecedents.
    #[serde(rename = "Head_Correct_Prec")]
    pub head_correct_precision: f64,
    /// Head recall over correct antecedents.
    #[serde(rename = "Head_Correct_Rec")]
    pub head_correct_recall: f64,
    /// Head F1 over correct antecedents.
    #[serde(rename = "Head_Correct_F1")]
    pub head_correct_f1: f64,
    /// Head precision including right-aligned matches.
    #[serde(rename = "Head_Right_Prec")]
    pub head_right_precision: f64,
    /// Head recall including right-aligned matches.
    #[serde(rename = "Head_Right_Rec")]
    pub head_right_recall: f64,
    /// Head F1 including right-aligned matches.
    #[serde(rename = "Head_Right_F1")]
    pub head_right_f1: f64,
    /// Head precision over all matches.
    #[serde(rename = "Head_All_Prec")]
    pub head_all_precision: f64,
    /// Head recall over all matches.
    #[serde(rename = "Head_All_Rec")]
    pub head_all_recall: f64,
    /// Head F1 over all matches.
    #[serde(rename = "Head_All_F1")]
    pub head_all_f1: f64,
}

/// Antecedent evaluation results, bucketed by distance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntecedentReport {
    /// Counts per antecedent-to-element distance.
    pub by_distance: BTreeMap<usize, AntecedentCounts>,
    /// Counts summed over all distances.
    pub overall: AntecedentCounts,
}

impl AntecedentReport {
    /// Counts plus derived metrics for every bucket.
    #[must_use]
    pub fn summary(&self, weights: &FairWeights) -> ScoredAntecedentReport {
        ScoredAntecedentReport {
            by_distance: self
                .by_distance
                .iter()
                .map(|(&d, c)| (d, c.scored(weights)))
                .collect(),
            overall: self.overall.scored(weights),
        }
    }
}

impl Merge for AntecedentReport {
    fn merge(&mut self, other: Self) {
        self.by_distance.merge(other.by_distance);
        self.overall.merge(other.overall);
    }
}

/// Scored antecedent report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredAntecedentReport {
    /// Scored counts per distance.
    pub by_distance: BTreeMap<usize, ScoredAntecedent>,
    /// Scored overall counts.
    pub overall: ScoredAntecedent,
}

/// One side of the comparison, with everything the matcher needs.
struct Candidate {
    id: SpanId,
    bounds: Option<(usize, usize)>,
    element_start: Option<usize>,
    distance: Option<usize>,
    head_ids: BTreeSet<String>,
}

impl Candidate {
    fn collect(set: &DiscourseSet, tokens: &[Token], require_nonverbal_head: bool) -> Vec<Self> {
        set.antecedents
            .iter()
            .copied()
            .filter(|&a| {
                let Some(element) = set.arena.moving_element_of(a) else {
                    return false;
                };
                if set.arena.label(element) != RELATIVE_CLAUSE {
                    return false;
                }
                // Antecedents whose heads are all verbal (or absent) belong
                // to non-attributive clauses and are not evaluated on the
                // gold side.
                !(require_nonverbal_head && heads_all_verbal(&set.arena, a, tokens))
            })
            .map(|a| {
                let element = set.arena.moving_element_of(a);
                Candidate {
                    id: a,
                    bounds: match (
                        set.arena.start_index(a, tokens, true),
                        set.arena.end_index(a, tokens, true),
                    ) {
                        (Some(s), Some(e)) => Some((s, e)),
                        _ => None,
                    },
                    element_start: element
                        .and_then(|m| set.arena.start_index(m, tokens, true)),
                    distance: set.arena.distance(a, tokens),
                    head_ids: set
                        .arena
                        .heads(a)
                        .iter()
                        .filter_map(|&h| tokens.get(h).and_then(Token::id))
                        .map(str::to_string)
                        .collect(),
                }
            })
            .collect()
    }

    fn overlap_with(&self, other: &Candidate) -> OverlapType {
        match (self.bounds, other.bounds) {
            (Some(g), Some(s)) => overlap_type(g, s),
            _ => OverlapType::Disjoint,
        }
    }

    fn element_aligned_with(&self, other: &Candidate) -> bool {
        matches!(
            (self.element_start, other.element_start),
            (Some(a), Some(b)) if a == b
        )
    }

    fn right_aligned_with(&self, other: &Candidate) -> bool {
        matches!(
            (self.bounds, other.bounds),
            (Some((_, ge)), Some((_, se))) if ge == se
        )
    }
}

fn heads_all_verbal(arena: &SpanArena, antecedent: SpanId, tokens: &[Token]) -> bool {
    arena
        .heads(antecedent)
        .iter()
        .all(|&h| tokens.get(h).map_or(true, |t| t.xpos().starts_with('V')))
}

/// The matching stages, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Correct,
    Boundary,
    IncorrectLocation,
}

/// Evaluate the antecedents of a gold/system sentence pair.
///
/// Sentences without a discourse layer contribute fully zeroed counts.
#[must_use]
pub fn evaluate_antecedents(gold: &Sentence, system: &Sentence) -> AntecedentReport {
    let empty = DiscourseSet::default();
    let gold_set = gold.discourse().unwrap_or(&empty);
    let system_set = system.discourse().unwrap_or(&empty);

    let golds = Candidate::collect(gold_set, gold.tokens(), true);
    let systems = Candidate::collect(system_set, system.tokens(), false);

    let mut report = AntecedentReport::default();
    // Rows for every observed distance, so document-level folds keep an
    // identical shape even for buckets that stay empty here.
    for candidate in golds.iter().chain(&systems) {
        if let Some(d) = candidate.distance {
            report.by_distance.entry(d).or_default();
        }
    }

    let mut gold_used = vec![false; golds.len()];
    let mut sys_used = vec![false; systems.len()];

    for stage in [Stage::Correct, Stage::Boundary, Stage::IncorrectLocation] {
        for (gi, ga) in golds.iter().enumerate() {
            if gold_used[gi] {
                continue;
            }
            let candidate = systems.iter().enumerate().find(|(si, ea)| {
                if sys_used[*si] || !ga.element_aligned_with(ea) {
                    return false;
                }
                let overlap = ga.overlap_with(ea);
                match stage {
                    Stage::Correct => overlap == OverlapType::Exact,
                    Stage::Boundary => overlap.is_boundary_error(),
                    Stage::IncorrectLocation => overlap == OverlapType::Disjoint,
                }
            });
            let Some((si, ea)) = candidate else {
                continue;
            };
            gold_used[gi] = true;
            sys_used[si] = true;
            record_pair(&mut report, ga, ea, stage);
        }
    }

    for (gi, ga) in golds.iter().enumerate() {
        if !gold_used[gi] {
            let heads = ga.head_ids.len();
            apply(&mut report, ga.distance, |c| {
                c.false_neg += 1;
                c.heads.fn_all += heads;
            });
        }
    }
    for (si, ea) in systems.iter().enumerate() {
        if !sys_used[si] {
            let heads = ea.head_ids.len();
            apply(&mut report, ea.distance, |c| {
                c.false_pos += 1;
                c.heads.fp_all += heads;
            });
        }
    }
    report
}

fn record_pair(report: &mut AntecedentReport, gold: &Candidate, system: &Candidate, stage: Stage) {
    let tp = gold.head_ids.intersection(&system.head_ids).count();
    let fp = system.head_ids.difference(&gold.head_ids).count();
    let fn_ = gold.head_ids.difference(&system.head_ids).count();
    let overlap = gold.overlap_with(system);
    let right = stage == Stage::Boundary && gold.right_aligned_with(system);

    apply(report, gold.distance, |c| {
        match stage {
            Stage::Correct => {
                c.correct += 1;
                c.heads.tp_correct += tp;
                c.heads.fp_correct += fp;
                c.heads.fn_correct += fn_;
                c.heads.tp_right += tp;
                c.heads.fp_right += fp;
                c.heads.fn_right += fn_;
            }
            Stage::Boundary => {
                match overlap {
                    OverlapType::SystemShorter => c.shorter += 1,
                    OverlapType::SystemLonger => c.longer += 1,
                    _ => c.crossing += 1,
                }
                c.boundary += 1;
                if right {
                    c.right_aligned += 1;
                    c.heads.tp_right += tp;
                    c.heads.fp_right += fp;
                    c.heads.fn_right += fn_;
                }
            }
            Stage::IncorrectLocation => {
                c.incorrect_location += 1;
            }
        }
        c.heads.tp_all += tp;
        c.heads.fp_all += fp;
        c.heads.fn_all += fn_;
    });
}

/// Apply a count update to the overall bucket and, when the distance is
/// known, to its distance bucket.
fn apply<F: Fn(&mut AntecedentCounts)>(
    report: &mut AntecedentReport,
    distance: Option<usize>,
    update: F,
) {
    update(&mut report.overall);
    if let Some(d) = distance {
        update(report.by_distance.entry(d).or_default());
    }
}
