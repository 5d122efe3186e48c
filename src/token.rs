//! Tokens, sentences, and documents.
//!
//! Tokens carry an open attribute set (CoNLL-style column name to value).
//! Two attributes are reserved by convention: `ID`, the 1-based position of
//! the token within its sentence (string-typed, because corpora use suffixed
//! variants like `"3-1"` for subtokens), and `XPOS`, the language-specific
//! part-of-speech tag. Punctuation is recognized by an `XPOS` starting with
//! the STTS punctuation marker `$`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::span::{DiscourseSet, SpanSet};

/// First character of part-of-speech tags that mark punctuation.
pub const PUNCTUATION_MARKER: char = '$';

/// A single token with an open attribute mapping.
///
/// Tokens are owned by exactly one [`Sentence`]; spans reference them by
/// position and never own them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    attrs: BTreeMap<String, String>,
}

impl Token {
    /// Create a token with `ID` and `XPOS` attributes set.
    #[must_use]
    pub fn new(id: impl Into<String>, xpos: impl Into<String>) -> Self {
        let mut attrs = BTreeMap::new();
        attrs.insert("ID".to_string(), id.into());
        attrs.insert("XPOS".to_string(), xpos.into());
        Token { attrs }
    }

    /// Look up an attribute value.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Set an attribute value, replacing any previous one.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`Token::set_attr`].
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// The raw `ID` attribute (1-based, possibly suffixed like `"3-1"`).
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.attr("ID")
    }

    /// Zero-based sentence index derived from the `ID` attribute.
    ///
    /// Suffixed or otherwise non-numeric IDs yield `None`; callers treat an
    /// absent index as "does not match" rather than an error.
    #[must_use]
    pub fn id_index(&self) -> Option<usize> {
        self.id()?.trim().parse::<usize>().ok()?.checked_sub(1)
    }

    /// The `XPOS` attribute, defaulting to `"_"`.
    #[must_use]
    pub fn xpos(&self) -> &str {
        self.attr("XPOS").unwrap_or("_")
    }

    /// Whether this token is tagged as punctuation.
    #[must_use]
    pub fn is_punctuation(&self) -> bool {
        self.xpos().starts_with(PUNCTUATION_MARKER)
    }
}

/// One sentence: an ordered token sequence plus decoded annotation layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sentence {
    tokens: Vec<Token>,
    layers: BTreeMap<String, SpanSet>,
    discourse: Option<DiscourseSet>,
}

impl Sentence {
    /// Create a sentence from its tokens.
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Sentence {
            tokens,
            layers: BTreeMap::new(),
            discourse: None,
        }
    }

    /// The tokens of this sentence.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Mutable access to the tokens.
    pub fn tokens_mut(&mut self) -> &mut [Token] {
        &mut self.tokens
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the sentence has no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// A decoded span layer by name (usually the tag column it came from).
    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&SpanSet> {
        self.layers.get(name)
    }

    /// Store a decoded span layer under a name.
    pub fn set_layer(&mut self, name: impl Into<String>, set: SpanSet) {
        self.layers.insert(name.into(), set);
    }

    /// The discourse layer (moving elements and antecedents), if decoded.
    #[must_use]
    pub fn discourse(&self) -> Option<&DiscourseSet> {
        self.discourse.as_ref()
    }

    /// Store the discourse layer.
    pub fn set_discourse(&mut self, set: DiscourseSet) {
        self.discourse = Some(set);
    }

    /// Write a tag column back onto the token attributes.
    ///
    /// `tags` must be sentence-length; extra positions are ignored.
    pub fn set_column(&mut self, column: &str, tags: &[String]) {
        for (tok, tag) in self.tokens.iter_mut().zip(tags) {
            tok.set_attr(column, tag.clone());
        }
    }
}

/// A named document: an ordered list of sentences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier, typically the source filename.
    pub name: String,
    /// The sentences, in corpus order.
    pub sentences: Vec<Sentence>,
}

impl Document {
    /// Create a document.
    #[must_use]
    pub fn new(name: impl Into<String>, sentences: Vec<Sentence>) -> Self {
        Document {
            name: name.into(),
            sentences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_index_parses_plain_ids() {
        assert_eq!(Token::new("1", "NN").id_index(), Some(0));
        assert_eq!(Token::new("17", "NN").id_index(), Some(16));
    }

    #[test]
    fn id_index_absent_for_suffixed_or_missing_ids() {
        assert_eq!(Token::new("3-1", "NN").id_index(), None);
        assert_eq!(Token::new("", "NN").id_index(), None);
        assert_eq!(Token::new("0", "NN").id_index(), None);
        assert_eq!(Token::default().id_index(), None);
    }

    #[test]
    fn punctuation_follows_xpos_marker() {
        assert!(Token::new("1", "$.").is_punctuation());
        assert!(Token::new("2", "$,").is_punctuation());
        assert!(!Token::new("3", "NN").is_punctuation());
        assert!(!Token::default().is_punctuation());
    }

    #[test]
    fn column_roundtrip_on_tokens() {
        let mut sent = Sentence::new(vec![Token::new("1", "NN"), Token::new("2", "$.")]);
        sent.set_column("Chunk", &["B-NC".to_string(), "O".to_string()]);
        assert_eq!(sent.tokens()[0].attr("Chunk"), Some("B-NC"));
        assert_eq!(sent.tokens()[1].attr("Chunk"), Some("O"));
    }
}
