//! Arena-backed span forests.
//!
//! A [`Span`](SpanNode) is a labeled node owning an ordered list of elements,
//! each either a token (referenced by its position in the sentence) or
//! another span. Spans form trees; a span may dominate other spans. All
//! nodes of one annotation layer live in a sentence-scoped [`SpanArena`] and
//! reference each other by [`SpanId`], so parent back-references and the
//! moving-element/antecedent cycle are plain indices instead of owning
//! pointers.
//!
//! Cached `start`/`end` indices are zero-based token indices derived from
//! the tokens' `ID` attributes. They are maintained by the structural
//! mutators and must be refreshed explicitly ([`SpanArena::update_indices`])
//! after any other membership change.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::discourse::{Position, VerbPosition};
use crate::error::{Error, Result};
use crate::token::Token;

/// Index of a span node within its sentence-scoped arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpanId(u32);

impl SpanId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One element of a span: a token (by sentence position) or a nested span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanElement {
    /// A token, referenced by its position in the sentence token list.
    Token(usize),
    /// A dominated span.
    Span(SpanId),
}

/// What kind of span a node is, with the kind-specific fields.
///
/// Plain phrases, moving elements, and antecedents share the common span
/// capability set (label, elements, indices, parent); the variants add their
/// own fields instead of deep inheritance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum SpanKind {
    /// A plain labeled span (phrase, chunk, topological field, ...).
    #[default]
    Phrase,
    /// A constituent annotated with its discourse position.
    MovingElement {
        /// Discourse position relative to the in-situ placement.
        ///
        /// `None` for adverbial clauses, which carry a verb position instead.
        position: Option<Position>,
        /// Correlation id linking this element to its antecedent.
        id: Option<u32>,
        /// The linked antecedent, if any.
        antecedent: Option<SpanId>,
        /// Head token positions (the verbs of adverbial clauses).
        heads: Vec<usize>,
        /// Verb placement for adverbial clauses.
        verb_position: Option<VerbPosition>,
    },
    /// The span a moving element semantically attaches to.
    Antecedent {
        /// Head token positions.
        heads: Vec<usize>,
        /// Correlation id of the moving element this antecedent belongs to.
        moving_element_id: Option<u32>,
        /// The linked moving element, if any.
        moving_element: Option<SpanId>,
        /// Cached distance to the moving element, invalidated by index
        /// refreshes.
        #[serde(skip)]
        distance: OnceCell<Option<usize>>,
    },
}

/// A span node: label, elements, parent back-reference, cached indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanNode {
    label: String,
    elements: Vec<SpanElement>,
    parent: Option<SpanId>,
    start: Option<usize>,
    end: Option<usize>,
    kind: SpanKind,
}

/// Sentence-scoped storage for the span nodes of one annotation layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanArena {
    nodes: Vec<SpanNode>,
}

impl SpanArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new span node and return its id.
    pub fn alloc(&mut self, label: impl Into<String>, kind: SpanKind) -> SpanId {
        let id = SpanId(self.nodes.len() as u32);
        self.nodes.push(SpanNode {
            label: label.into(),
            elements: Vec::new(),
            parent: None,
            start: None,
            end: None,
            kind,
        });
        id
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all node ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = SpanId> {
        (0..self.nodes.len() as u32).map(SpanId)
    }

    fn node(&self, id: SpanId) -> &SpanNode {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: SpanId) -> &mut SpanNode {
        &mut self.nodes[id.index()]
    }

    /// The label of a span.
    #[must_use]
    pub fn label(&self, id: SpanId) -> &str {
        &self.node(id).label
    }

    /// Replace the label of a span.
    pub fn set_label(&mut self, id: SpanId, label: impl Into<String>) {
        self.node_mut(id).label = label.into();
    }

    /// The parent span, or `None` for a root.
    #[must_use]
    pub fn parent(&self, id: SpanId) -> Option<SpanId> {
        self.node(id).parent
    }

    /// Set the parent back-reference.
    pub fn set_parent(&mut self, id: SpanId, parent: Option<SpanId>) {
        self.node_mut(id).parent = parent;
    }

    /// The ordered elements of a span.
    #[must_use]
    pub fn elements(&self, id: SpanId) -> &[SpanElement] {
        &self.node(id).elements
    }

    /// The kind of a span.
    #[must_use]
    pub fn kind(&self, id: SpanId) -> &SpanKind {
        &self.node(id).kind
    }

    /// Whether the span directly dominates another span.
    #[must_use]
    pub fn is_complex(&self, id: SpanId) -> bool {
        self.node(id)
            .elements
            .iter()
            .any(|e| matches!(e, SpanElement::Span(_)))
    }

    /// All token positions dominated by a span, in order, recursively.
    #[must_use]
    pub fn token_positions(&self, id: SpanId) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![(id, 0usize)];
        while let Some((cur, idx)) = stack.pop() {
            let elems = &self.node(cur).elements;
            if idx < elems.len() {
                stack.push((cur, idx + 1));
                match elems[idx] {
                    SpanElement::Token(p) => out.push(p),
                    SpanElement::Span(child) => stack.push((child, 0)),
                }
            }
        }
        out
    }

    /// Number of tokens dominated by a span, recursively.
    #[must_use]
    pub fn token_count(&self, id: SpanId) -> usize {
        self.token_positions(id).len()
    }

    /// Start index of a span: the zero-based index of its first token.
    ///
    /// With `ignore_punct`, the first non-punctuation token is used; if the
    /// span contains only punctuation, the punctuation-inclusive index is
    /// returned instead. Returns `None` for spans without tokens or with
    /// unparseable token IDs.
    #[must_use]
    pub fn start_index(&self, id: SpanId, tokens: &[Token], ignore_punct: bool) -> Option<usize> {
        if !ignore_punct {
            return self.node(id).start;
        }
        let positions = self.token_positions(id);
        if positions.is_empty() {
            return None;
        }
        for &p in &positions {
            if let Some(tok) = tokens.get(p) {
                if !tok.is_punctuation() {
                    return tok.id_index();
                }
            }
        }
        tokens.get(positions[0]).and_then(Token::id_index)
    }

    /// End index of a span: the zero-based index of its last token.
    ///
    /// Mirrors [`SpanArena::start_index`] for the right boundary.
    #[must_use]
    pub fn end_index(&self, id: SpanId, tokens: &[Token], ignore_punct: bool) -> Option<usize> {
        if !ignore_punct {
            return self.node(id).end;
        }
        let positions = self.token_positions(id);
        if positions.is_empty() {
            return None;
        }
        for &p in positions.iter().rev() {
            if let Some(tok) = tokens.get(p) {
                if !tok.is_punctuation() {
                    return tok.id_index();
                }
            }
        }
        positions
            .last()
            .and_then(|&p| tokens.get(p).and_then(Token::id_index))
    }

    /// Whether `other` lies within (or coincides with) `id`.
    ///
    /// Compares punctuation-ignoring start and end indices; spans with an
    /// absent index never include or get included.
    #[must_use]
    pub fn includes_span(&self, id: SpanId, other: SpanId, tokens: &[Token]) -> bool {
        let (Some(s1), Some(e1)) = (
            self.start_index(id, tokens, true),
            self.end_index(id, tokens, true),
        ) else {
            return false;
        };
        let (Some(s2), Some(e2)) = (
            self.start_index(other, tokens, true),
            self.end_index(other, tokens, true),
        ) else {
            return false;
        };
        s1 <= s2 && e1 >= e2
    }

    /// Recompute the cached `start`/`end` of a span and all its descendants,
    /// and drop any cached antecedent distances below it.
    pub fn update_indices(&mut self, id: SpanId, tokens: &[Token]) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let positions = self.token_positions(cur);
            let start = positions
                .first()
                .and_then(|&p| tokens.get(p).and_then(Token::id_index));
            let end = positions
                .last()
                .and_then(|&p| tokens.get(p).and_then(Token::id_index));
            let node = self.node_mut(cur);
            node.start = start;
            node.end = end;
            if let SpanKind::Antecedent { distance, .. } = &mut node.kind {
                distance.take();
            }
            for el in &node.elements {
                if let SpanElement::Span(child) = el {
                    stack.push(*child);
                }
            }
        }
    }

    /// Append an element without recomputing indices. Used by the decoders,
    /// which refresh indices once at the end.
    pub(crate) fn push_element_raw(&mut self, id: SpanId, element: SpanElement) {
        if let SpanElement::Span(child) = element {
            self.node_mut(child).parent = Some(id);
        }
        self.node_mut(id).elements.push(element);
    }

    /// Append an element to a span, updating parent links and indices.
    pub fn append_element(&mut self, id: SpanId, element: SpanElement, tokens: &[Token]) {
        self.push_element_raw(id, element);
        self.update_indices(id, tokens);
        debug_assert!(self.check_consistency().is_ok());
    }

    /// Insert an element at `index`, updating parent links and indices.
    ///
    /// `index == len` appends; `index > len` is an error and never silently
    /// appends.
    pub fn insert_element(
        &mut self,
        id: SpanId,
        index: usize,
        element: SpanElement,
        tokens: &[Token],
    ) -> Result<()> {
        let len = self.node(id).elements.len();
        if index > len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        if let SpanElement::Span(child) = element {
            self.node_mut(child).parent = Some(id);
        }
        self.node_mut(id).elements.insert(index, element);
        self.update_indices(id, tokens);
        debug_assert!(self.check_consistency().is_ok());
        Ok(())
    }

    /// Remove the first occurrence of an element from a span.
    ///
    /// Returns `true` if the element was present. A removed child span keeps
    /// existing in the arena but loses its parent back-reference.
    pub fn remove_element(&mut self, id: SpanId, element: &SpanElement, tokens: &[Token]) -> bool {
        let pos = self.node(id).elements.iter().position(|e| e == element);
        let Some(pos) = pos else {
            return false;
        };
        let removed = self.node_mut(id).elements.remove(pos);
        if let SpanElement::Span(child) = removed {
            self.node_mut(child).parent = None;
        }
        self.update_indices(id, tokens);
        debug_assert!(self.check_consistency().is_ok());
        true
    }

    /// Verify that child/parent back-references agree and that no span is
    /// dominated twice. A violation is a bug in a mutator, not a data issue.
    pub fn check_consistency(&self) -> std::result::Result<(), String> {
        let mut seen_as_child = vec![false; self.nodes.len()];
        for id in self.ids() {
            for el in &self.node(id).elements {
                if let SpanElement::Span(child) = el {
                    if seen_as_child[child.index()] {
                        return Err(format!("span {:?} is dominated twice", child));
                    }
                    seen_as_child[child.index()] = true;
                    if self.node(*child).parent != Some(id) {
                        return Err(format!(
                            "span {:?} has parent {:?}, expected {:?}",
                            child,
                            self.node(*child).parent,
                            id
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Kind-specific accessors
    // ------------------------------------------------------------------

    /// Discourse position of a moving element.
    #[must_use]
    pub fn position(&self, id: SpanId) -> Option<Position> {
        match &self.node(id).kind {
            SpanKind::MovingElement { position, .. } => *position,
            _ => None,
        }
    }

    /// Verb position of an adverbial-clause moving element.
    #[must_use]
    pub fn verb_position(&self, id: SpanId) -> Option<VerbPosition> {
        match &self.node(id).kind {
            SpanKind::MovingElement { verb_position, .. } => *verb_position,
            _ => None,
        }
    }

    /// Correlation id of a moving element.
    #[must_use]
    pub fn correlation_id(&self, id: SpanId) -> Option<u32> {
        match &self.node(id).kind {
            SpanKind::MovingElement { id: mid, .. } => *mid,
            _ => None,
        }
    }

    /// Correlation id stored on an antecedent.
    #[must_use]
    pub fn moving_element_id(&self, id: SpanId) -> Option<u32> {
        match &self.node(id).kind {
            SpanKind::Antecedent {
                moving_element_id, ..
            } => *moving_element_id,
            _ => None,
        }
    }

    /// The antecedent linked to a moving element.
    #[must_use]
    pub fn antecedent_of(&self, id: SpanId) -> Option<SpanId> {
        match &self.node(id).kind {
            SpanKind::MovingElement { antecedent, .. } => *antecedent,
            _ => None,
        }
    }

    /// The moving element linked to an antecedent.
    #[must_use]
    pub fn moving_element_of(&self, id: SpanId) -> Option<SpanId> {
        match &self.node(id).kind {
            SpanKind::Antecedent { moving_element, .. } => *moving_element,
            _ => None,
        }
    }

    /// Head token positions of a moving element or antecedent.
    #[must_use]
    pub fn heads(&self, id: SpanId) -> &[usize] {
        match &self.node(id).kind {
            SpanKind::MovingElement { heads, .. } | SpanKind::Antecedent { heads, .. } => heads,
            SpanKind::Phrase => &[],
        }
    }

    /// Add a head token position to a moving element or antecedent.
    pub fn add_head(&mut self, id: SpanId, position: usize) {
        match &mut self.node_mut(id).kind {
            SpanKind::MovingElement { heads, .. } | SpanKind::Antecedent { heads, .. } => {
                heads.push(position);
            }
            SpanKind::Phrase => {}
        }
    }

    /// Establish the mutual moving-element/antecedent link.
    ///
    /// Neither side owns the other; both are arena indices. Linking resets
    /// the antecedent's cached distance.
    pub fn link(&mut self, moving_element: SpanId, antecedent: SpanId) {
        if let SpanKind::MovingElement {
            antecedent: slot, ..
        } = &mut self.node_mut(moving_element).kind
        {
            *slot = Some(antecedent);
        }
        if let SpanKind::Antecedent {
            moving_element: slot,
            distance,
            ..
        } = &mut self.node_mut(antecedent).kind
        {
            *slot = Some(moving_element);
            distance.take();
        }
    }

    /// Distance between an antecedent and its moving element: the number of
    /// non-punctuation tokens strictly between them. `None` without a linked
    /// element or with absent boundary indices. The result is cached on the
    /// antecedent until its indices are refreshed.
    #[must_use]
    pub fn distance(&self, id: SpanId, tokens: &[Token]) -> Option<usize> {
        let SpanKind::Antecedent {
            moving_element,
            distance,
            ..
        } = &self.node(id).kind
        else {
            return None;
        };
        let mov = (*moving_element)?;
        *distance.get_or_init(|| {
            let a_end = self.end_index(id, tokens, true)?;
            let m_start = self.start_index(mov, tokens, true)?;
            Some(
                tokens
                    .iter()
                    .filter(|t| {
                        !t.is_punctuation()
                            && matches!(t.id_index(), Some(i) if i > a_end && i < m_start)
                    })
                    .count(),
            )
        })
    }
}

/// A decoded annotation layer: the arena plus its top-level spans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanSet {
    /// Storage for all spans of the layer.
    pub arena: SpanArena,
    /// Top-level spans, in sentence order.
    pub roots: Vec<SpanId>,
}

/// A decoded discourse layer: moving elements and antecedents share one
/// arena so their mutual links stay plain indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscourseSet {
    /// Storage for all spans of the layer.
    pub arena: SpanArena,
    /// Top-level moving elements, in sentence order.
    pub moving_elements: Vec<SpanId>,
    /// All antecedents (nested ones included), in decoding order.
    pub antecedents: Vec<SpanId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(n: usize) -> Vec<Token> {
        (1..=n).map(|i| Token::new(i.to_string(), "NN")).collect()
    }

    fn toks_with_punct() -> Vec<Token> {
        vec![
            Token::new("1", "$("),
            Token::new("2", "NN"),
            Token::new("3", "NN"),
            Token::new("4", "$."),
        ]
    }

    #[test]
    fn append_updates_indices_and_parent() {
        let tokens = toks(3);
        let mut arena = SpanArena::new();
        let np = arena.alloc("NP", SpanKind::Phrase);
        let pp = arena.alloc("PP", SpanKind::Phrase);
        arena.append_element(np, SpanElement::Token(0), &tokens);
        arena.append_element(pp, SpanElement::Token(1), &tokens);
        arena.append_element(np, SpanElement::Span(pp), &tokens);

        assert_eq!(arena.parent(pp), Some(np));
        assert_eq!(arena.start_index(np, &tokens, false), Some(0));
        assert_eq!(arena.end_index(np, &tokens, false), Some(1));
        assert_eq!(arena.token_positions(np), vec![0, 1]);
        arena.check_consistency().unwrap();
    }

    #[test]
    fn insert_beyond_length_fails() {
        let tokens = toks(2);
        let mut arena = SpanArena::new();
        let np = arena.alloc("NP", SpanKind::Phrase);
        arena.append_element(np, SpanElement::Token(0), &tokens);
        let err = arena
            .insert_element(np, 2, SpanElement::Token(1), &tokens)
            .unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { index: 2, len: 1 }));
        // index == len appends
        arena
            .insert_element(np, 1, SpanElement::Token(1), &tokens)
            .unwrap();
        assert_eq!(arena.end_index(np, &tokens, false), Some(1));
    }

    #[test]
    fn remove_clears_parent_and_recomputes() {
        let tokens = toks(3);
        let mut arena = SpanArena::new();
        let np = arena.alloc("NP", SpanKind::Phrase);
        let pp = arena.alloc("PP", SpanKind::Phrase);
        arena.append_element(pp, SpanElement::Token(2), &tokens);
        arena.append_element(np, SpanElement::Token(0), &tokens);
        arena.append_element(np, SpanElement::Span(pp), &tokens);
        assert_eq!(arena.end_index(np, &tokens, false), Some(2));

        assert!(arena.remove_element(np, &SpanElement::Span(pp), &tokens));
        assert_eq!(arena.parent(pp), None);
        assert_eq!(arena.end_index(np, &tokens, false), Some(0));
        assert!(!arena.remove_element(np, &SpanElement::Span(pp), &tokens));
    }

    #[test]
    fn punctuation_indices_skip_and_fall_back() {
        let tokens = toks_with_punct();
        let mut arena = SpanArena::new();
        let np = arena.alloc("NP", SpanKind::Phrase);
        for p in 0..4 {
            arena.append_element(np, SpanElement::Token(p), &tokens);
        }
        assert_eq!(arena.start_index(np, &tokens, false), Some(0));
        assert_eq!(arena.start_index(np, &tokens, true), Some(1));
        assert_eq!(arena.end_index(np, &tokens, true), Some(2));

        // A punctuation-only span falls back to the inclusive result.
        let punct = arena.alloc("NP", SpanKind::Phrase);
        arena.append_element(punct, SpanElement::Token(3), &tokens);
        assert_eq!(arena.start_index(punct, &tokens, true), Some(3));

        // No tokens at all: absent.
        let empty = arena.alloc("NP", SpanKind::Phrase);
        assert_eq!(arena.start_index(empty, &tokens, true), None);
        assert_eq!(arena.start_index(empty, &tokens, false), None);
    }

    #[test]
    fn includes_span_uses_punct_free_intervals() {
        let tokens = toks(5);
        let mut arena = SpanArena::new();
        let outer = arena.alloc("NP", SpanKind::Phrase);
        let inner = arena.alloc("PP", SpanKind::Phrase);
        for p in 1..4 {
            arena.append_element(inner, SpanElement::Token(p), &tokens);
        }
        arena.append_element(outer, SpanElement::Token(0), &tokens);
        arena.append_element(outer, SpanElement::Span(inner), &tokens);
        arena.append_element(outer, SpanElement::Token(4), &tokens);

        assert!(arena.includes_span(outer, inner, &tokens));
        assert!(arena.includes_span(outer, outer, &tokens));
        assert!(!arena.includes_span(inner, outer, &tokens));

        // Absent indices never match.
        let empty = arena.alloc("NP", SpanKind::Phrase);
        assert!(!arena.includes_span(outer, empty, &tokens));
        assert!(!arena.includes_span(empty, outer, &tokens));
    }

    #[test]
    fn unparseable_ids_yield_absent_indices() {
        let tokens = vec![Token::new("1-1", "NN"), Token::new("2", "NN")];
        let mut arena = SpanArena::new();
        let np = arena.alloc("NP", SpanKind::Phrase);
        arena.append_element(np, SpanElement::Token(0), &tokens);
        assert_eq!(arena.start_index(np, &tokens, false), None);
        arena.append_element(np, SpanElement::Token(1), &tokens);
        assert_eq!(arena.end_index(np, &tokens, false), Some(1));
    }

    #[test]
    fn distance_is_cached_and_invalidated() {
        // antecedent [0], filler [1..3], moving element [4]
        let tokens = toks(5);
        let mut arena = SpanArena::new();
        let antec = arena.alloc(
            "Antec",
            SpanKind::Antecedent {
                heads: vec![],
                moving_element_id: Some(1),
                moving_element: None,
                distance: OnceCell::new(),
            },
        );
        let mov = arena.alloc(
            "RELC",
            SpanKind::MovingElement {
                position: Some(Position::Extraposed),
                id: Some(1),
                antecedent: None,
                heads: vec![],
                verb_position: None,
            },
        );
        arena.append_element(antec, SpanElement::Token(0), &tokens);
        arena.append_element(mov, SpanElement::Token(4), &tokens);
        arena.link(mov, antec);

        assert_eq!(arena.distance(antec, &tokens), Some(3));
        // Growing the antecedent invalidates the cache.
        arena.append_element(antec, SpanElement::Token(1), &tokens);
        assert_eq!(arena.distance(antec, &tokens), Some(2));
        // A moving element has no distance of its own.
        assert_eq!(arena.distance(mov, &tokens), None);
    }
}
