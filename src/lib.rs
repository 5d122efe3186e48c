//! # fairspan
//!
//! Nested span annotations for Rust: a data model for hierarchically
//! nested, possibly stacked labeled spans over token sequences, a lossless
//! round trip between span trees and flat per-token BIO tag strings, and a
//! fuzzy structural evaluator that scores system annotations against gold
//! annotations with a fine-grained error taxonomy.
//!
//! - **Data model**: [`Token`] / [`Sentence`] / [`Document`], plus
//!   arena-backed span forests ([`SpanArena`], [`SpanSet`]) with phrase,
//!   moving-element, and antecedent span kinds
//! - **BIO codec**: [`bio::decode`] / [`bio::encode`] for pipe-stacked
//!   nested annotations, [`discourse`] codecs for moving elements and
//!   antecedents
//! - **Evaluation**: [`eval::compare_spans`] with traditional and fair
//!   scoring, moving-element and antecedent evaluators, parallel
//!   document-level aggregation
//!
//! ## Quick start
//!
//! ```rust
//! use fairspan::prelude::*;
//!
//! // Two tokens annotated with a noun chunk.
//! let tokens = vec![
//!     Token::new("1", "ART").with_attr("chunks", "B-NC"),
//!     Token::new("2", "NN").with_attr("chunks", "I-NC"),
//! ];
//! let sent = Sentence::new(tokens);
//!
//! let spans = fairspan::bio::decode(&sent, "chunks");
//! assert_eq!(spans.roots.len(), 1);
//! assert_eq!(spans.arena.label(spans.roots[0]), "NC");
//!
//! // The round trip reproduces the tag column.
//! let tags = fairspan::bio::encode(&sent, &spans);
//! assert_eq!(tags, vec!["B-NC", "I-NC"]);
//! ```
//!
//! ## Evaluation
//!
//! ```rust
//! use fairspan::eval::{compare_spans, EvalSpan, FairWeights};
//!
//! let gold = vec![EvalSpan::new("NP", 0, 2)];
//! let system = vec![EvalSpan::new("NP", 0, 1)]; // too short
//!
//! let report = compare_spans(&gold, &system);
//! assert_eq!(report.overall.fair.shorter, 1);
//!
//! let scored = report.overall.scored(&FairWeights::default());
//! assert_eq!(scored.traditional.f1, 0.0); // exact matching: a miss
//! assert!(scored.fair.f1 > 0.0);          // fair: partial credit
//! ```
//!
//! ## Design notes
//!
//! Spans never own tokens; they reference them by sentence position, and
//! all spans of a layer live in one sentence-scoped arena. Mutual
//! references (span parents, moving element ↔ antecedent) are arena
//! indices, so no reference cycles exist at the ownership level. All
//! evaluation counts merge additively ([`eval::Merge`]) and metrics are
//! derived from merged counts, which makes sentence- and document-level
//! computation embarrassingly parallel.

#![warn(missing_docs)]

pub mod bio;
pub mod discourse;
mod error;
pub mod eval;
mod span;
mod token;

pub use discourse::{Position, VerbPosition};
pub use error::{Error, Result};
pub use span::{DiscourseSet, SpanArena, SpanElement, SpanId, SpanKind, SpanNode, SpanSet};
pub use token::{Document, Sentence, Token, PUNCTUATION_MARKER};

pub mod prelude {
    //! Commonly used items, re-exported for convenience.
    //!
    //! ```rust
    //! use fairspan::prelude::*;
    //!
    //! let tok = Token::new("1", "NN");
    //! assert!(!tok.is_punctuation());
    //! ```
    pub use crate::discourse::{Position, VerbPosition};
    pub use crate::error::{Error, Result};
    pub use crate::eval::{
        compare_spans, evaluate_documents, Annotation, EvalOptions, EvalSpan, FairWeights, Merge,
        SpanEvalReport,
    };
    pub use crate::span::{DiscourseSet, SpanArena, SpanElement, SpanId, SpanKind, SpanSet};
    pub use crate::token::{Document, Sentence, Token};
}
