//! Discourse-level annotation: moving elements and their antecedents.
//!
//! A *moving element* is a constituent annotated with its discourse position
//! relative to its canonical ("in-situ") placement — a relative clause, for
//! example, may be extraposed to the right of its head noun. The span it
//! semantically attaches to is its *antecedent*. Both are spans with extra
//! fields; an element and its antecedent reference each other mutually
//! through arena indices (the one intentional cycle in the data model).
//!
//! Tag shapes, per token and column:
//!
//! | column | examples |
//! |--------|----------|
//! | moving elements | `B-NP-insitu`, `I-RELC-extrap-2\|B-PP-insitu`, `B-ADVC-V2-Head` |
//! | antecedents | `B-Antec-2`, `I-Antec-Head\|B-Antec-3` |
//!
//! Suffixes carry the discourse position, the correlation id linking a
//! relative clause (or comparative phrase) to its antecedent, the verb
//! position of adverbial clauses, and `Head` markers; they survive a
//! decode/encode round trip verbatim.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bio::{flatten, is_sentinel, paint_with, parse_level, Boundary, LevelTag, UNANNOTATED};
use crate::span::{DiscourseSet, SpanArena, SpanElement, SpanId, SpanKind};
use crate::token::{Sentence, Token};

/// Default tag column for moving elements.
pub const MOVING_ELEMENT_COLUMN: &str = "MovElem";

/// Default tag column for antecedents.
pub const ANTECEDENT_COLUMN: &str = "Antec";

/// Label of adverbial-clause moving elements, which carry a verb position
/// instead of a discourse position.
pub const ADVERBIAL_CLAUSE: &str = "ADVC";

/// Label of relative-clause moving elements.
pub const RELATIVE_CLAUSE: &str = "RELC";

/// Labels whose moving elements link to an antecedent via correlation id.
pub const LINKED_LABELS: [&str; 2] = [RELATIVE_CLAUSE, "CMPP"];

/// Suffix marking head tokens.
pub const HEAD_MARKER: &str = "Head";

/// Discourse position of a moving element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    /// In canonical position.
    #[serde(rename = "insitu")]
    InSitu,
    /// Position cannot be decided between in-situ and extraposed.
    #[serde(rename = "ambig")]
    Ambiguous,
    /// Extraposed out of the canonical position.
    #[serde(rename = "extrap")]
    Extraposed,
    /// Position could not be determined.
    #[serde(rename = "unknown")]
    Unknown,
}

impl Position {
    /// The tag-suffix spelling of this position.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Position::InSitu => "insitu",
            Position::Ambiguous => "ambig",
            Position::Extraposed => "extrap",
            Position::Unknown => "unknown",
        }
    }

    /// Parse a tag suffix; anything unrecognized is [`Position::Unknown`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "insitu" => Position::InSitu,
            "ambig" => Position::Ambiguous,
            "extrap" => Position::Extraposed,
            _ => Position::Unknown,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verb placement of an adverbial clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerbPosition {
    /// Verb-second clause.
    V2,
    /// Verb-last clause.
    VL,
}

impl VerbPosition {
    /// The tag-suffix spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            VerbPosition::V2 => "V2",
            VerbPosition::VL => "VL",
        }
    }

    /// Parse a tag suffix.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "V2" => Some(VerbPosition::V2),
            "VL" => Some(VerbPosition::VL),
            _ => None,
        }
    }
}

impl std::fmt::Display for VerbPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decode the discourse layer of a sentence.
///
/// Antecedents are read first, then moving elements, which are linked to
/// their antecedents by correlation id. Both live in one arena so the
/// mutual references are plain indices.
#[must_use]
pub fn decode(sentence: &Sentence, mov_column: &str, antec_column: &str) -> DiscourseSet {
    let tokens = sentence.tokens();
    let mut arena = SpanArena::new();
    let antecedents = decode_antecedents(&mut arena, tokens, antec_column);
    let moving_elements = decode_moving_elements(&mut arena, &antecedents, tokens, mov_column);
    DiscourseSet {
        arena,
        moving_elements,
        antecedents,
    }
}

/// Decode with the default column names.
#[must_use]
pub fn decode_default(sentence: &Sentence) -> DiscourseSet {
    decode(sentence, MOVING_ELEMENT_COLUMN, ANTECEDENT_COLUMN)
}

/// Read antecedent spans from a tag column.
///
/// Returns every antecedent — nested ones included — in closing order, the
/// order in which they leave the decoding stack.
fn decode_antecedents(arena: &mut SpanArena, tokens: &[Token], column: &str) -> Vec<SpanId> {
    let mut all: Vec<SpanId> = Vec::new();
    let mut stack: Vec<SpanId> = Vec::new();

    for (position, tok) in tokens.iter().enumerate() {
        let tag = tok.attr(column).unwrap_or(UNANNOTATED);
        if is_sentinel(tag) {
            while let Some(closed) = stack.pop() {
                all.push(closed);
            }
            continue;
        }
        let levels: Vec<&str> = tag.trim().split('|').collect();
        while stack.len() > levels.len() {
            if let Some(closed) = stack.pop() {
                all.push(closed);
            }
        }
        for (depth, level) in levels.iter().enumerate() {
            let deepest = depth == levels.len() - 1;
            match parse_level(level) {
                Some(LevelTag {
                    boundary: Boundary::Begin,
                    label,
                    suffixes,
                }) => {
                    open_antecedent(
                        arena, &mut stack, &mut all, depth, deepest, label, &suffixes, position,
                    );
                }
                Some(LevelTag {
                    boundary: Boundary::Inside,
                    label,
                    suffixes,
                }) => {
                    if depth >= stack.len() {
                        warn!(column, token = position, tag = *level, "I- tag without open antecedent, starting a new one");
                        open_antecedent(
                            arena, &mut stack, &mut all, depth, deepest, label, &suffixes, position,
                        );
                    } else {
                        if deepest {
                            arena.push_element_raw(stack[depth], SpanElement::Token(position));
                        }
                        if suffixes.contains(&HEAD_MARKER) {
                            arena.add_head(stack[depth], position);
                        }
                    }
                }
                None => {
                    warn!(column, token = position, tag = *level, "unparseable level tag, skipping");
                }
            }
        }
    }
    while let Some(closed) = stack.pop() {
        all.push(closed);
    }
    for &a in &all {
        arena.update_indices(a, tokens);
    }
    all
}

#[allow(clippy::too_many_arguments)]
fn open_antecedent(
    arena: &mut SpanArena,
    stack: &mut Vec<SpanId>,
    all: &mut Vec<SpanId>,
    depth: usize,
    deepest: bool,
    label: &str,
    suffixes: &[&str],
    position: usize,
) {
    while stack.len() > depth {
        if let Some(closed) = stack.pop() {
            all.push(closed);
        }
    }
    let moving_element_id = suffixes.iter().find_map(|s| s.parse::<u32>().ok());
    let heads = if suffixes.contains(&HEAD_MARKER) {
        vec![position]
    } else {
        Vec::new()
    };
    let id = arena.alloc(
        label,
        SpanKind::Antecedent {
            heads,
            moving_element_id,
            moving_element: None,
            distance: OnceCell::new(),
        },
    );
    if deepest {
        arena.push_element_raw(id, SpanElement::Token(position));
    }
    if let Some(&parent) = stack.last() {
        arena.push_element_raw(parent, SpanElement::Span(id));
    }
    stack.push(id);
}

/// Read moving elements from a tag column and link them to the already
/// decoded antecedents by correlation id.
fn decode_moving_elements(
    arena: &mut SpanArena,
    antecedents: &[SpanId],
    tokens: &[Token],
    column: &str,
) -> Vec<SpanId> {
    let mut roots: Vec<SpanId> = Vec::new();
    let mut stack: Vec<SpanId> = Vec::new();

    for (position, tok) in tokens.iter().enumerate() {
        let tag = tok.attr(column).unwrap_or(UNANNOTATED);
        if is_sentinel(tag) {
            if let Some(&root) = stack.first() {
                roots.push(root);
            }
            stack.clear();
            continue;
        }
        let levels: Vec<&str> = tag.trim().split('|').collect();
        stack.truncate(levels.len());
        for (depth, level) in levels.iter().enumerate() {
            let deepest = depth == levels.len() - 1;
            match parse_level(level) {
                Some(LevelTag {
                    boundary: Boundary::Begin,
                    label,
                    suffixes,
                }) => {
                    open_moving_element(
                        arena,
                        antecedents,
                        &mut stack,
                        &mut roots,
                        depth,
                        deepest,
                        label,
                        &suffixes,
                        position,
                    );
                }
                Some(LevelTag {
                    boundary: Boundary::Inside,
                    label,
                    suffixes,
                }) => {
                    if depth >= stack.len() {
                        warn!(column, token = position, tag = *level, "I- tag without open moving element, starting a new one");
                        open_moving_element(
                            arena,
                            antecedents,
                            &mut stack,
                            &mut roots,
                            depth,
                            deepest,
                            label,
                            &suffixes,
                            position,
                        );
                    } else {
                        if deepest {
                            arena.push_element_raw(stack[depth], SpanElement::Token(position));
                        }
                        if suffixes.contains(&HEAD_MARKER) {
                            arena.add_head(stack[depth], position);
                        }
                    }
                }
                None => {
                    warn!(column, token = position, tag = *level, "unparseable level tag, skipping");
                }
            }
        }
    }
    if let Some(&root) = stack.first() {
        roots.push(root);
    }
    for &root in &roots {
        arena.update_indices(root, tokens);
    }
    roots
}

#[allow(clippy::too_many_arguments)]
fn open_moving_element(
    arena: &mut SpanArena,
    antecedents: &[SpanId],
    stack: &mut Vec<SpanId>,
    roots: &mut Vec<SpanId>,
    depth: usize,
    deepest: bool,
    label: &str,
    suffixes: &[&str],
    position: usize,
) {
    if depth == 0 && !stack.is_empty() {
        roots.push(stack[0]);
        stack.clear();
    } else {
        stack.truncate(depth);
    }

    let kind = if label == ADVERBIAL_CLAUSE {
        SpanKind::MovingElement {
            position: None,
            id: None,
            antecedent: None,
            heads: if suffixes.contains(&HEAD_MARKER) {
                vec![position]
            } else {
                Vec::new()
            },
            verb_position: suffixes.first().and_then(|s| VerbPosition::parse(s)),
        }
    } else {
        let discourse_position = match suffixes.first() {
            Some(s) => Position::parse(s),
            None => {
                warn!(label, token = position, "moving element without position suffix");
                Position::Unknown
            }
        };
        SpanKind::MovingElement {
            position: Some(discourse_position),
            id: suffixes.last().and_then(|s| s.parse::<u32>().ok()),
            antecedent: None,
            heads: Vec::new(),
            verb_position: None,
        }
    };

    let span = arena.alloc(label, kind);
    if deepest {
        arena.push_element_raw(span, SpanElement::Token(position));
    }
    if let Some(correlation) = arena.correlation_id(span) {
        if let Some(&antec) = antecedents
            .iter()
            .find(|&&a| arena.moving_element_id(a) == Some(correlation))
        {
            arena.link(span, antec);
        }
    }
    if let Some(&parent) = stack.last() {
        arena.push_element_raw(parent, SpanElement::Span(span));
    }
    stack.push(span);
}

/// Encode moving elements back into per-token tag strings.
///
/// Extents are painted from punctuation-exclusive indices; position,
/// correlation-id, verb-position, and `Head` suffixes are reproduced
/// verbatim. Tokens outside every element get `_`.
#[must_use]
pub fn encode_moving_elements(sentence: &Sentence, set: &DiscourseSet) -> Vec<String> {
    let tokens = sentence.tokens();
    let arena = &set.arena;

    let mut tuples = flatten(arena, &set.moving_elements, tokens, true);
    tuples.sort_by_key(|&(_, start, end)| (start, std::cmp::Reverse(end)));

    let head_at = |id: SpanId, index: usize| {
        arena
            .heads(id)
            .iter()
            .any(|&h| tokens.get(h).and_then(Token::id_index) == Some(index))
    };

    paint_with(tokens.len(), UNANNOTATED, &tuples, |id, index, begin| {
        let label = arena.label(id);
        let mut level = String::new();
        if begin {
            level.push_str("B-");
            level.push_str(label);
            if label == ADVERBIAL_CLAUSE {
                if let Some(v) = arena.verb_position(id) {
                    level.push('-');
                    level.push_str(v.as_str());
                }
                if head_at(id, index) {
                    level.push('-');
                    level.push_str(HEAD_MARKER);
                }
            } else {
                if let Some(p) = arena.position(id) {
                    level.push('-');
                    level.push_str(p.as_str());
                }
                if LINKED_LABELS.contains(&label) {
                    if let Some(correlation) = arena.correlation_id(id) {
                        level.push('-');
                        level.push_str(&correlation.to_string());
                    }
                }
            }
        } else {
            level.push_str("I-");
            level.push_str(label);
            if label == ADVERBIAL_CLAUSE && head_at(id, index) {
                level.push('-');
                level.push_str(HEAD_MARKER);
            }
        }
        level
    })
}

/// Encode antecedents back into per-token tag strings.
///
/// Every antecedent in the set is painted exactly once; tuples sort by
/// `(start, -end, id)`. Correlation ids and `Head` markers are reproduced
/// on both `B-` and `I-` tags.
#[must_use]
pub fn encode_antecedents(sentence: &Sentence, set: &DiscourseSet) -> Vec<String> {
    let tokens = sentence.tokens();
    let arena = &set.arena;

    let mut tuples: Vec<(SpanId, usize, usize)> = Vec::new();
    for &a in &set.antecedents {
        if let (Some(start), Some(end)) = (
            arena.start_index(a, tokens, false),
            arena.end_index(a, tokens, false),
        ) {
            tuples.push((a, start, end));
        } else {
            warn!("antecedent without token indices, not encoded");
        }
    }
    tuples.sort_by_key(|&(id, start, end)| {
        (start, std::cmp::Reverse(end), arena.moving_element_id(id))
    });

    let head_at = |id: SpanId, index: usize| {
        arena
            .heads(id)
            .iter()
            .any(|&h| tokens.get(h).and_then(Token::id_index) == Some(index))
    };

    paint_with(tokens.len(), UNANNOTATED, &tuples, |id, index, begin| {
        let mut level = String::new();
        level.push_str(if begin { "B-" } else { "I-" });
        level.push_str(arena.label(id));
        if begin {
            if let Some(correlation) = arena.moving_element_id(id) {
                level.push('-');
                level.push_str(&correlation.to_string());
            }
        }
        if head_at(id, index) {
            level.push('-');
            level.push_str(HEAD_MARKER);
        }
        level
    })
}
