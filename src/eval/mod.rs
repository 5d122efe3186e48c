//! Span evaluation framework.
//!
//! Compares system annotations against gold annotations and classifies
//! every pairing into a fine-grained error taxonomy (exact match, labeling
//! error, three boundary-error shapes, label-and-boundary error, miss,
//! spurious span), from which precision, recall, and F1 are derived under
//! two philosophies:
//!
//! - **traditional**: only exact matches count; every near-miss is booked
//!   twice, as a false positive and a false negative;
//! - **fair**: every near-miss is booked once, in its own bucket, with
//!   partial credit for boundary errors.
//!
//! The entry points, bottom-up:
//!
//! - [`compare_spans`]: one gold span list against one system span list;
//! - [`evaluate_spans`]: one sentence pair, one annotation layer;
//! - [`evaluate_moving_elements`] / [`evaluate_antecedents`]: the
//!   discourse-specific evaluations;
//! - [`evaluate_documents`]: sentence-aligned documents, evaluated in
//!   parallel and folded with the additive [`Merge`] combinator.
//!
//! Counts and metrics are kept apart: reports hold counts and can be
//! merged across sentences, documents, and corpora; metrics are computed
//! once, at the end, via the `summary` methods (they are not additive).

pub mod antecedent;
pub mod fair;
pub mod merge;
pub mod movelem;

pub use antecedent::{
    evaluate_antecedents, AntecedentCounts, AntecedentReport, HeadCounts, ScoredAntecedent,
    ScoredAntecedentReport,
};
pub use fair::{
    compare_spans, overlap_type, CategoryWeight, EvalSpan, FairCounts, FairWeights, OverlapType,
    PerLabelCounts, SchemeCounts, ScoredFair, ScoredPerLabel, ScoredSchemes, ScoredTraditional,
    SpanEvalReport, SpanEvalSummary, TraditionalCounts, NO_LABEL,
};
pub use merge::Merge;
pub use movelem::{evaluate_moving_elements, MovElemReport, MovElemSummary};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::span::{SpanElement, SpanId, SpanSet};
use crate::token::{Document, Sentence, Token};

/// The annotation families this crate evaluates, with their conventional
/// layer names and label inventories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Annotation {
    /// Chunks (`NC`, `PC`, ...).
    #[serde(rename = "chunks")]
    Chunks,
    /// Topological fields (`VF`, `LK`, `MF`, ...).
    #[serde(rename = "topf")]
    TopologicalFields,
    /// Phrases (`NP`, `PP`, `AP`, `ADVP`).
    #[serde(rename = "phrases")]
    Phrases,
    /// Sentence brackets (`LK`, `RK`).
    #[serde(rename = "brackets")]
    Brackets,
    /// Moving elements and antecedents.
    #[serde(rename = "extrap")]
    Extraposition,
}

impl Annotation {
    /// The sentence layer this annotation is stored under.
    #[must_use]
    pub fn layer(self) -> &'static str {
        match self {
            Annotation::Chunks => "chunks",
            Annotation::TopologicalFields => "topf",
            Annotation::Phrases => "phrases",
            Annotation::Brackets => "brackets",
            Annotation::Extraposition => "extrap",
        }
    }

    /// The default label allow-list.
    #[must_use]
    pub fn default_labels(self) -> &'static [&'static str] {
        match self {
            Annotation::Chunks => &["NC", "PC", "AC", "ADVC", "sNC", "sPC"],
            Annotation::TopologicalFields => &["KOORD", "LV", "VF", "LK", "MF", "RK", "NF"],
            Annotation::Phrases => &["NP", "PP", "AP", "ADVP"],
            Annotation::Brackets => &["LK", "RK"],
            Annotation::Extraposition => &[
                "NP-insitu",
                "NP-extrap",
                "PP-insitu",
                "PP-extrap",
                "AP-insitu",
                "AP-extrap",
                "ADVP-insitu",
                "ADVP-extrap",
                "RELC-insitu",
                "RELC-ambig",
                "RELC-extrap",
            ],
        }
    }

    /// The label allow-list for a corpus; some historical corpora annotate
    /// only relative-clause moving elements.
    #[must_use]
    pub fn labels_for_corpus(self, corpus: Option<&str>) -> Vec<String> {
        let labels: &[&str] = match (self, corpus) {
            (Annotation::Extraposition, Some("Tiger")) => {
                &["RELC-insitu", "RELC-ambig", "RELC-extrap"]
            }
            _ => self.default_labels(),
        };
        labels.iter().map(|s| s.to_string()).collect()
    }
}

impl std::fmt::Display for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.layer())
    }
}

/// Options for document evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalOptions {
    /// Label allow-list override; defaults to the annotation's inventory.
    pub labels: Option<Vec<String>>,
    /// Corpus name, used to narrow the label set for some corpora.
    pub corpus: Option<String>,
}

/// Flatten a span layer into evaluation spans, keeping only allow-listed
/// labels. Indices and token sets are punctuation-exclusive; spans whose
/// indices are absent (or that consist of punctuation only) are skipped.
#[must_use]
pub fn collect_spans<S: AsRef<str>>(set: &SpanSet, tokens: &[Token], labels: &[S]) -> Vec<EvalSpan> {
    let wanted: BTreeSet<&str> = labels.iter().map(AsRef::as_ref).collect();
    let arena = &set.arena;
    let mut out = Vec::new();
    let mut stack: Vec<SpanId> = set.roots.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        for el in arena.elements(id).iter().rev() {
            if let SpanElement::Span(child) = el {
                stack.push(*child);
            }
        }
        if !wanted.contains(arena.label(id)) {
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
        out.push(EvalSpan::new(arena.label(id), start, end).with_tokens(span_tokens));
    }
    out
}

/// Evaluate one annotation layer of a gold/system sentence pair.
///
/// A missing layer on either side contributes an empty span list, not an
/// error, so sparsely annotated documents fold cleanly.
#[must_use]
pub fn evaluate_spans<S: AsRef<str>>(
    gold: &Sentence,
    system: &Sentence,
    layer: &str,
    labels: &[S],
) -> SpanEvalReport {
    let empty = SpanSet::default();
    let gold_spans = collect_spans(gold.layer(layer).unwrap_or(&empty), gold.tokens(), labels);
    let system_spans = collect_spans(
        system.layer(layer).unwrap_or(&empty),
        system.tokens(),
        labels,
    );
    let mut report = compare_spans(&gold_spans, &system_spans);
    report.seed_labels(labels);
    report
}

/// Evaluation results for a document pair (and, after merging, for a
/// corpus).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    /// Span comparison counts. For [`Annotation::Extraposition`] these are
    /// the position-qualified moving-element counts.
    pub spans: SpanEvalReport,
    /// Position-independent relative-clause counts (extraposition only).
    pub relative_clauses: Option<SchemeCounts>,
    /// Antecedent evaluation (extraposition only).
    pub antecedents: Option<AntecedentReport>,
}

impl DocumentReport {
    /// Counts plus derived metrics for every block.
    #[must_use]
    pub fn summary(&self, weights: &FairWeights) -> DocumentSummary {
        DocumentSummary {
            spans: self.spans.summary(weights),
            relative_clauses: self.relative_clauses.as_ref().map(|c| c.scored(weights)),
            antecedents: self.antecedents.as_ref().map(|a| a.summary(weights)),
        }
    }
}

impl Merge for DocumentReport {
    fn merge(&mut self, other: Self) {
        self.spans.merge(other.spans);
        self.relative_clauses.merge(other.relative_clauses);
        self.antecedents.merge(other.antecedents);
    }
}

/// Scored document results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Scored span comparison.
    pub spans: SpanEvalSummary,
    /// Scored relative-clause block.
    pub relative_clauses: Option<ScoredSchemes>,
    /// Scored antecedent evaluation.
    pub antecedents: Option<ScoredAntecedentReport>,
}

/// Evaluate a sentence-aligned gold/system document pair.
///
/// Sentences are independent, so they are compared in parallel and the
/// per-sentence counts are folded at a single join point; any processing
/// order yields the same aggregate. Metrics are left to
/// [`DocumentReport::summary`].
///
/// # Errors
///
/// Fails when the documents have different sentence counts.
pub fn evaluate_documents(
    gold: &Document,
    system: &Document,
    annotation: Annotation,
    options: &EvalOptions,
) -> Result<DocumentReport> {
    if gold.sentences.len() != system.sentences.len() {
        return Err(Error::MismatchedDocuments {
            gold: gold.sentences.len(),
            system: system.sentences.len(),
        });
    }
    let labels = match &options.labels {
        Some(labels) => labels.clone(),
        None => annotation.labels_for_corpus(options.corpus.as_deref()),
    };
    debug!(
        document = %gold.name,
        %annotation,
        sentences = gold.sentences.len(),
        "evaluating document pair"
    );

    let mut report = gold
        .sentences
        .par_iter()
        .zip(system.sentences.par_iter())
        .map(|(g, s)| evaluate_sentence(g, s, annotation, &labels))
        .reduce(DocumentReport::default, |mut acc, piece| {
            acc.merge(piece);
            acc
        });
    report.spans.seed_labels(&labels);
    Ok(report)
}

fn evaluate_sentence(
    gold: &Sentence,
    system: &Sentence,
    annotation: Annotation,
    labels: &[String],
) -> DocumentReport {
    match annotation {
        Annotation::Extraposition => {
            let movelems = evaluate_moving_elements(gold, system, labels);
            DocumentReport {
                spans: movelems.spans,
                relative_clauses: Some(movelems.relative_clauses),
                antecedents: Some(evaluate_antecedents(gold, system)),
            }
        }
        _ => DocumentReport {
            spans: evaluate_spans(gold, system, annotation.layer(), labels),
            relative_clauses: None,
            antecedents: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio;

    fn chunk_sentence(tags: &[&str]) -> Sentence {
        let tokens = tags
            .iter()
            .enumerate()
            .map(|(i, tag)| Token::new((i + 1).to_string(), "NN").with_attr("chunks", *tag))
            .collect();
        let mut sent = Sentence::new(tokens);
        let set = bio::decode(&sent, "chunks");
        sent.set_layer("chunks", set);
        sent
    }

    #[test]
    fn sentence_layer_evaluation_end_to_end() {
        let gold = chunk_sentence(&["B-NC", "I-NC", "O", "B-PC"]);
        let system = chunk_sentence(&["B-NC", "I-NC", "O", "B-AC"]);
        let labels = Annotation::Chunks.labels_for_corpus(None);
        let report = evaluate_spans(&gold, &system, "chunks", &labels);
        assert_eq!(report.overall.fair.true_pos, 1);
        assert_eq!(report.overall.fair.label_error, 1);
        // All inventory labels are present even if unused.
        assert!(report.per_label.fair.contains_key("sNC"));
    }

    #[test]
    fn missing_layer_contributes_nothing() {
        let gold = chunk_sentence(&["B-NC"]);
        let bare = Sentence::new(vec![Token::new("1", "NN")]);
        let labels = Annotation::Chunks.labels_for_corpus(None);
        let report = evaluate_spans(&gold, &bare, "chunks", &labels);
        assert_eq!(report.overall.fair.false_neg, 1);
        assert_eq!(report.overall.fair.false_pos, 0);
    }

    #[test]
    fn document_evaluation_folds_sentences() {
        let gold = Document::new(
            "doc",
            vec![
                chunk_sentence(&["B-NC", "I-NC"]),
                chunk_sentence(&["B-PC", "O"]),
            ],
        );
        let system = Document::new(
            "doc",
            vec![
                chunk_sentence(&["B-NC", "I-NC"]),
                chunk_sentence(&["O", "B-PC"]),
            ],
        );
        let report =
            evaluate_documents(&gold, &system, Annotation::Chunks, &EvalOptions::default())
                .unwrap();
        assert_eq!(report.spans.overall.fair.true_pos, 1);
        // The shifted PC: disjoint intervals, so a miss plus a spurious span.
        assert_eq!(report.spans.overall.fair.false_neg, 1);
        assert_eq!(report.spans.overall.fair.false_pos, 1);
        assert!(report.antecedents.is_none());
    }

    #[test]
    fn mismatched_documents_are_rejected() {
        let gold = Document::new("doc", vec![chunk_sentence(&["B-NC"])]);
        let system = Document::new("doc", vec![]);
        let err = evaluate_documents(&gold, &system, Annotation::Chunks, &EvalOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MismatchedDocuments { gold: 1, system: 0 }
        ));
    }

    #[test]
    fn corpus_narrowing_for_tiger() {
        let labels = Annotation::Extraposition.labels_for_corpus(Some("Tiger"));
        assert_eq!(labels, vec!["RELC-insitu", "RELC-ambig", "RELC-extrap"]);
        let labels = Annotation::Extraposition.labels_for_corpus(Some("TuebaDZ"));
        assert!(labels.contains(&"NP-insitu".to_string()));
    }

    #[test]
    fn corpus_level_fold_reuses_merge() {
        let gold = Document::new("a", vec![chunk_sentence(&["B-NC"])]);
        let system = Document::new("a", vec![chunk_sentence(&["B-NC"])]);
        let options = EvalOptions::default();
        let a = evaluate_documents(&gold, &system, Annotation::Chunks, &options).unwrap();
        let b = a.clone();
        let mut corpus = a.clone();
        corpus.merge(b);
        assert_eq!(corpus.spans.overall.fair.true_pos, 2);
        let summary = corpus.summary(&FairWeights::default());
        assert!((summary.spans.overall.fair.f1 - 1.0).abs() < f64::EPSILON);
    }
}
