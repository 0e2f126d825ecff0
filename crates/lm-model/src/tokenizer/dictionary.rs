use std::collections::HashMap;

use crate::error::{ModelError, Result};

/// End-of-sentence marker appended to every encoded line.
pub const EOS: &str = "<eos>";
/// Out-of-vocabulary marker.
pub const UNK: &str = "<unk>";

/// Word-level vocabulary mapping whitespace-separated words to ids.
///
/// Ids are assigned densely in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    /// Words, indexed by id.
    words: Vec<String>,
    /// Reverse mapping from word to id.
    word_to_id: HashMap<String, u32>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    /// Build a dictionary from words in order, skipping duplicates.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dict = Dictionary::new();
        for w in words {
            dict.add_word(w.as_ref());
        }
        dict
    }

    /// Insert `word` if absent and return its id.
    pub fn add_word(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.word_to_id.get(word) {
            return id;
        }
        let id = self.words.len() as u32;
        self.words.push(word.to_string());
        self.word_to_id.insert(word.to_string(), id);
        id
    }

    /// Add every word of `line` plus the end-of-sentence marker.
    pub fn add_line(&mut self, line: &str) {
        for w in line.split_whitespace() {
            self.add_word(w);
        }
        self.add_word(EOS);
    }

    pub fn id(&self, word: &str) -> Option<u32> {
        self.word_to_id.get(word).copied()
    }

    pub fn word(&self, id: u32) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    /// Number of words in the vocabulary.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns true if the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Encode one line of text, appending `<eos>`.
    ///
    /// Unknown words map to `<unk>` when the dictionary has it; otherwise
    /// encoding fails.
    pub fn encode_line(&self, line: &str) -> Result<Vec<u32>> {
        let unk = self.id(UNK);
        line.split_whitespace()
            .chain(std::iter::once(EOS))
            .map(|w| {
                self.id(w)
                    .or(unk)
                    .ok_or_else(|| ModelError::TokenizerError(format!("unknown word {:?}", w)))
            })
            .collect()
    }

    /// Map ids back to words, failing on an id outside the vocabulary.
    pub fn decode(&self, ids: &[u32]) -> Result<Vec<&str>> {
        ids.iter()
            .map(|&id| {
                self.word(id).ok_or(ModelError::TokenOutOfRange {
                    token: id,
                    vocab_size: self.len(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_word_is_idempotent() {
        let mut dict = Dictionary::new();
        assert!(dict.is_empty());
        assert_eq!(dict.add_word("the"), 0);
        assert_eq!(dict.add_word("cat"), 1);
        assert_eq!(dict.add_word("the"), 0);
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.word(1), Some("cat"));
        assert_eq!(dict.id("dog"), None);
    }

    #[test]
    fn test_encode_line_appends_eos() {
        let mut dict = Dictionary::new();
        dict.add_line("the cat sat");
        let ids = dict.encode_line("  sat the\tcat ").unwrap();
        assert_eq!(ids, vec![2, 0, 1, 3]);
        assert_eq!(dict.decode(&ids).unwrap(), vec!["sat", "the", "cat", EOS]);
    }

    #[test]
    fn test_unknown_words() {
        let mut dict = Dictionary::from_words(["a", "b", EOS]);
        assert!(matches!(
            dict.encode_line("a zebra"),
            Err(ModelError::TokenizerError(_))
        ));

        let unk = dict.add_word(UNK);
        assert_eq!(dict.encode_line("a zebra").unwrap(), vec![0, unk, 2]);
    }

    #[test]
    fn test_decode_out_of_range() {
        let dict = Dictionary::from_words(["x"]);
        assert!(matches!(
            dict.decode(&[0, 4]),
            Err(ModelError::TokenOutOfRange { token: 4, vocab_size: 1 })
        ));
    }
}
