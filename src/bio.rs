//! BIO codec for nested, pipe-stacked span annotations.
//!
//! Per token and annotation column, the tag is either a sentinel (`O` or
//! `_`, "not annotated") or an ordered, `|`-separated list of level tags
//! matching `^(B|I)-<label>(-<suffix>)*$`. Level *i* of the pipe list
//! corresponds to nesting depth *i* (0 = outermost), which lets several
//! annotation layers be open at the same token — a phrase can end while the
//! clause containing it continues.
//!
//! Decoding maintains an explicit stack of open spans, one per level;
//! encoding flattens every span to `(label, start, end)` and paints tags
//! back, earliest-then-longest first, so children land on top of their
//! already-open parents. For any forest whose spans are contiguous per
//! level, `decode(encode(S))` reconstructs an isomorphic forest.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::span::{SpanArena, SpanElement, SpanId, SpanKind, SpanSet};
use crate::token::{Sentence, Token};

/// Tag written for tokens outside of any span.
pub const OUTSIDE: &str = "O";

/// Alternative sentinel used by discourse columns.
pub const UNANNOTATED: &str = "_";

static LEVEL_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([BI])-([^\s|-]+)((?:-[^\s|-]+)*)$").expect("valid regex"));

/// Whether a tag marks a token as not annotated.
#[must_use]
pub fn is_sentinel(tag: &str) -> bool {
    matches!(tag.trim(), "" | OUTSIDE | UNANNOTATED)
}

/// Whether a level tag begins a span (`B-`) or continues one (`I-`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boundary {
    /// `B-`: span-initial token.
    Begin,
    /// `I-`: span-internal token.
    Inside,
}

/// One parsed level of a pipe-stacked tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LevelTag<'a> {
    pub boundary: Boundary,
    pub label: &'a str,
    pub suffixes: Vec<&'a str>,
}

/// Parse one level tag. Returns `None` for anything that is neither
/// `B-...` nor `I-...`.
pub(crate) fn parse_level(tag: &str) -> Option<LevelTag<'_>> {
    let caps = LEVEL_TAG.captures(tag)?;
    let boundary = match caps.get(1).map(|m| m.as_str()) {
        Some("B") => Boundary::Begin,
        _ => Boundary::Inside,
    };
    let label = caps.get(2).map(|m| m.as_str())?;
    let suffixes = caps
        .get(3)
        .map(|m| m.as_str())
        .unwrap_or("")
        .split('-')
        .filter(|s| !s.is_empty())
        .collect();
    Some(LevelTag {
        boundary,
        label,
        suffixes,
    })
}

/// Decode one annotation column of a sentence into a span forest.
///
/// Tokens without the column count as unannotated. Malformed input is
/// recovered deterministically rather than rejected: an `I-` level with no
/// open span at that depth opens a fresh span (as if it were `B-`), and a
/// level that parses as neither is skipped; both emit a warning.
#[must_use]
pub fn decode(sentence: &Sentence, column: &str) -> SpanSet {
    let tokens = sentence.tokens();
    let mut arena = SpanArena::new();
    let mut roots: Vec<SpanId> = Vec::new();
    let mut stack: Vec<SpanId> = Vec::new();

    for (position, tok) in tokens.iter().enumerate() {
        let tag = tok.attr(column).unwrap_or(OUTSIDE);
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
                    ..
                }) => {
                    open_span(&mut arena, &mut stack, &mut roots, depth, deepest, label, position);
                }
                Some(LevelTag {
                    boundary: Boundary::Inside,
                    label,
                    ..
                }) => {
                    if depth >= stack.len() {
                        // No open span at this depth: treat as a fresh B-.
                        warn!(column, token = position, tag = *level, "I- tag without open span, starting a new one");
                        open_span(&mut arena, &mut stack, &mut roots, depth, deepest, label, position);
                    } else if deepest {
                        arena.push_element_raw(stack[depth], SpanElement::Token(position));
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
    SpanSet { arena, roots }
}

/// Open a new span at `depth`, attaching it below the level above or
/// flushing the current root if a new top-level span begins.
fn open_span(
    arena: &mut SpanArena,
    stack: &mut Vec<SpanId>,
    roots: &mut Vec<SpanId>,
    depth: usize,
    deepest: bool,
    label: &str,
    position: usize,
) {
    if depth == 0 && !stack.is_empty() {
        roots.push(stack[0]);
        stack.clear();
    } else {
        stack.truncate(depth);
    }
    let id = arena.alloc(label, SpanKind::Phrase);
    // A dominating span owns its tokens through the levels below it.
    if deepest {
        arena.push_element_raw(id, SpanElement::Token(position));
    }
    if let Some(&parent) = stack.last() {
        arena.push_element_raw(parent, SpanElement::Span(id));
    }
    stack.push(id);
}

/// Encode a span forest back into per-token tag strings.
///
/// Every span (nested ones included) is flattened to `(label, start, end)`;
/// tuples are sorted by `(start, -end)` so that earlier-starting and, among
/// those, longer spans are painted first, which keeps children on top of
/// their open parents in the pipe stack. Tokens outside every span get the
/// [`OUTSIDE`] sentinel. Spans with absent indices are skipped.
#[must_use]
pub fn encode(sentence: &Sentence, set: &SpanSet) -> Vec<String> {
    let tokens = sentence.tokens();
    let mut tuples = flatten(&set.arena, &set.roots, tokens, false);
    tuples.sort_by_key(|&(_, start, end)| (start, std::cmp::Reverse(end)));
    paint_with(tokens.len(), OUTSIDE, &tuples, |id, _, begin| {
        format!("{}-{}", if begin { "B" } else { "I" }, set.arena.label(id))
    })
}

/// Collect `(span, start, end)` tuples for the given spans and everything
/// they dominate, in pre-order.
pub(crate) fn flatten(
    arena: &SpanArena,
    roots: &[SpanId],
    tokens: &[Token],
    ignore_punct: bool,
) -> Vec<(SpanId, usize, usize)> {
    let mut out = Vec::new();
    let mut stack: Vec<SpanId> = roots.iter().rev().copied().collect();
    while let Some(cur) = stack.pop() {
        if let (Some(start), Some(end)) = (
            arena.start_index(cur, tokens, ignore_punct),
            arena.end_index(cur, tokens, ignore_punct),
        ) {
            out.push((cur, start, end));
        } else {
            warn!(label = arena.label(cur), "span without token indices, not encoded");
        }
        for el in arena.elements(cur).iter().rev() {
            if let SpanElement::Span(child) = el {
                stack.push(*child);
            }
        }
    }
    out
}

/// Paint pre-sorted span tuples onto a tag vector, asking `level` for the
/// tag of each `(span, token index, span-initial?)` combination.
pub(crate) fn paint_with<F>(
    len: usize,
    sentinel: &str,
    tuples: &[(SpanId, usize, usize)],
    mut level: F,
) -> Vec<String>
where
    F: FnMut(SpanId, usize, bool) -> String,
{
    let mut tags: Vec<String> = vec![String::new(); len];
    for &(id, start, end) in tuples {
        if start >= len {
            continue;
        }
        let first = level(id, start, true);
        push_level(&mut tags[start], &first);
        for index in (start + 1)..=end.min(len - 1) {
            let inner = level(id, index, false);
            push_level(&mut tags[index], &inner);
        }
    }
    for tag in &mut tags {
        if tag.is_empty() {
            *tag = sentinel.to_string();
        }
    }
    tags
}

/// Append one level to a growing pipe stack.
fn push_level(stack: &mut String, level: &str) {
    if !stack.is_empty() {
        stack.push('|');
    }
    stack.push_str(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(tags: &[&str]) -> Sentence {
        let tokens = tags
            .iter()
            .enumerate()
            .map(|(i, tag)| Token::new((i + 1).to_string(), "NN").with_attr("Chunk", *tag))
            .collect();
        Sentence::new(tokens)
    }

    fn labels_and_tokens(set: &SpanSet) -> Vec<(String, Vec<usize>)> {
        set.roots
            .iter()
            .map(|&r| {
                (
                    set.arena.label(r).to_string(),
                    set.arena.token_positions(r),
                )
            })
            .collect()
    }

    #[test]
    fn decode_flat_spans() {
        let sent = sentence(&["B-NC", "I-NC", "O", "B-PC", "I-PC"]);
        let set = decode(&sent, "Chunk");
        assert_eq!(
            labels_and_tokens(&set),
            vec![
                ("NC".to_string(), vec![0, 1]),
                ("PC".to_string(), vec![3, 4])
            ]
        );
        set.arena.check_consistency().unwrap();
    }

    #[test]
    fn adjacent_begin_flushes_previous_root() {
        let sent = sentence(&["B-NC", "B-NC", "I-NC"]);
        let set = decode(&sent, "Chunk");
        assert_eq!(
            labels_and_tokens(&set),
            vec![("NC".to_string(), vec![0]), ("NC".to_string(), vec![1, 2])]
        );
    }

    #[test]
    fn stacked_levels_become_nested_spans() {
        // Two simultaneously open levels: level 0 dominates level 1, both
        // close at the sentinel, each holds both tokens.
        let sent = sentence(&["B-NP|B-PP", "I-NP|I-PP", "O"]);
        let set = decode(&sent, "Chunk");
        assert_eq!(set.roots.len(), 1);
        let np = set.roots[0];
        assert_eq!(set.arena.label(np), "NP");
        assert_eq!(set.arena.token_positions(np), vec![0, 1]);
        let children: Vec<SpanId> = set
            .arena
            .elements(np)
            .iter()
            .filter_map(|e| match e {
                SpanElement::Span(c) => Some(*c),
                SpanElement::Token(_) => None,
            })
            .collect();
        assert_eq!(children.len(), 1);
        assert_eq!(set.arena.label(children[0]), "PP");
        assert_eq!(set.arena.token_positions(children[0]), vec![0, 1]);
    }

    #[test]
    fn inner_span_ends_while_outer_continues() {
        let sent = sentence(&["B-MF|B-NP", "I-MF|I-NP", "I-MF", "O"]);
        let set = decode(&sent, "Chunk");
        assert_eq!(set.roots.len(), 1);
        let mf = set.roots[0];
        assert_eq!(set.arena.token_positions(mf), vec![0, 1, 2]);
        // The NP child holds only the first two tokens.
        let np = set
            .arena
            .elements(mf)
            .iter()
            .find_map(|e| match e {
                SpanElement::Span(c) => Some(*c),
                SpanElement::Token(_) => None,
            })
            .unwrap();
        assert_eq!(set.arena.token_positions(np), vec![0, 1]);
    }

    #[test]
    fn orphan_inside_recovers_as_begin() {
        let sent = sentence(&["I-NC", "I-NC"]);
        let set = decode(&sent, "Chunk");
        assert_eq!(labels_and_tokens(&set), vec![("NC".to_string(), vec![0, 1])]);
    }

    #[test]
    fn garbage_levels_are_skipped() {
        let sent = sentence(&["B-NC", "not-a-tag", "I-NC"]);
        let set = decode(&sent, "Chunk");
        // The garbage token neither closes nor extends the span; the
        // following I- continues it.
        assert_eq!(labels_and_tokens(&set), vec![("NC".to_string(), vec![0, 2])]);
    }

    #[test]
    fn missing_column_is_unannotated() {
        let sent = Sentence::new(vec![Token::new("1", "NN")]);
        let set = decode(&sent, "Chunk");
        assert!(set.roots.is_empty());
    }

    #[test]
    fn encode_paints_nested_spans() {
        let sent = sentence(&["B-NP|B-PP", "I-NP|I-PP", "O"]);
        let set = decode(&sent, "Chunk");
        let tags = encode(&sent, &set);
        assert_eq!(tags, vec!["B-NP|B-PP", "I-NP|I-PP", "O"]);
    }

    #[test]
    fn encode_orders_same_start_by_length() {
        let sent = sentence(&["B-MF|B-NP", "I-MF|I-NP", "I-MF", "O", "B-NP"]);
        let set = decode(&sent, "Chunk");
        let tags = encode(&sent, &set);
        assert_eq!(tags, vec!["B-MF|B-NP", "I-MF|I-NP", "I-MF", "O", "B-NP"]);
    }

    #[test]
    fn roundtrip_is_idempotent() {
        let original = &["B-VF", "B-LK", "B-MF|B-NP", "I-MF|I-NP", "I-MF", "O"];
        let mut sent = sentence(original);
        let set = decode(&sent, "Chunk");
        let tags = encode(&sent, &set);
        assert_eq!(tags, original.to_vec());
        sent.set_column("Chunk", &tags);
        let set2 = decode(&sent, "Chunk");
        assert_eq!(encode(&sent, &set2), tags);
    }

    #[test]
    fn parse_level_splits_suffixes() {
        let tag = parse_level("B-RELC-extrap-2").unwrap();
        assert_eq!(tag.boundary, Boundary::Begin);
        assert_eq!(tag.label, "RELC");
        assert_eq!(tag.suffixes, vec!["extrap", "2"]);
        assert!(parse_level("O").is_none());
        assert!(parse_level("_").is_none());
        assert!(parse_level("NC").is_none());
    }
}
