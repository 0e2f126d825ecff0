use tracing::{debug, warn};

use crate::error::Result;
use crate::table::Table;

/// Column of the surprisal table holding the word.
pub const SURPRISAL_WORD_COLUMN: usize = 2;
/// Column of the surprisal table holding the surprisal value.
pub const SURPRISAL_VALUE_COLUMN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignOptions {
    /// Alignment stops once this many surprisal rows or fewer remain unread.
    pub tail_guard: usize,
}

impl Default for AlignOptions {
    fn default() -> Self {
        AlignOptions { tail_guard: 10 }
    }
}

/// A matched word: the model's (word, surprisal) plus the reference row
/// without its leading word column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRow {
    pub word: String,
    pub surprisal: String,
    pub measures: Vec<String>,
}

fn is_alphabetic(word: &str) -> bool {
    !word.is_empty() && word.chars().all(char::is_alphabetic)
}

/// Greedily synchronize the reference word stream with the surprisal stream.
///
/// At each step, with `s` the current surprisal word and `r` the current
/// reference word:
/// - `s == r`: emit a merged row and advance both;
/// - `s` contains `unk`, `r` is not purely alphabetic, or `r` contains
///   `eol`: advance both without emitting;
/// - otherwise advance only the surprisal stream.
pub fn harmonize_rows(
    reference: &Table,
    surprisals: &Table,
    options: AlignOptions,
) -> Result<Vec<MergedRow>> {
    reference.require_columns(1, "reading-time")?;
    surprisals.require_columns(SURPRISAL_VALUE_COLUMN + 1, "surprisal")?;

    let refs = &reference.rows;
    let surps = &surprisals.rows;
    let mut merged = Vec::new();
    if refs.is_empty() || surps.is_empty() {
        warn!(
            reference_rows = refs.len(),
            surprisal_rows = surps.len(),
            "nothing to align"
        );
        return Ok(merged);
    }

    let (mut si, mut ri) = (0usize, 0usize);
    while surps.len() - si - 1 > options.tail_guard {
        let s = &surps[si];
        let r = &refs[ri];
        let s_word = s[SURPRISAL_WORD_COLUMN].as_str();
        let r_word = r[0].as_str();

        let advance_both = if s_word == r_word {
            merged.push(MergedRow {
                word: s_word.to_string(),
                surprisal: s[SURPRISAL_VALUE_COLUMN].clone(),
                measures: r[1..].to_vec(),
            });
            true
        } else {
            s_word.contains("unk") || !is_alphabetic(r_word) || r_word.contains("eol")
        };

        si += 1;
        if advance_both {
            ri += 1;
            if ri == refs.len() {
                warn!(
                    surprisal_row = si,
                    "reference stream exhausted before surprisal stream"
                );
                break;
            }
        }
    }

    debug!(
        merged = merged.len(),
        surprisal_rows_read = si,
        reference_rows_read = ri,
        "alignment finished"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(header: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn surps(words: &[&str]) -> Table {
        let rows: Vec<Vec<String>> = words
            .iter()
            .enumerate()
            .map(|(i, w)| vec!["1".into(), (i + 1).to_string(), w.to_string(), format!("{}.5", i)])
            .collect();
        Table {
            header: vec!["sentid".into(), "sentpos".into(), "word".into(), "surprisal".into()],
            rows,
        }
    }

    fn refs(words: &[&str]) -> Table {
        Table {
            header: vec!["Word".into(), "mean_rt".into()],
            rows: words
                .iter()
                .enumerate()
                .map(|(i, w)| vec![w.to_string(), (300 + i).to_string()])
                .collect(),
        }
    }

    fn no_guard() -> AlignOptions {
        AlignOptions { tail_guard: 0 }
    }

    #[test]
    fn test_exact_match_stream() {
        let merged = harmonize_rows(
            &refs(&["the", "cat", "sat", "x"]),
            &surps(&["the", "cat", "sat", "x"]),
            no_guard(),
        )
        .unwrap();
        // The final surprisal row is never consumed.
        let words: Vec<_> = merged.iter().map(|m| m.word.as_str()).collect();
        assert_eq!(words, vec!["the", "cat", "sat"]);
        assert_eq!(merged[1].surprisal, "1.5");
        assert_eq!(merged[1].measures, vec!["301"]);
    }

    #[test]
    fn test_skip_rules() {
        // "<unk>" skips both; "," is not alphabetic; "eol" marks line ends;
        // "extra" only exists in the surprisal stream.
        let merged = harmonize_rows(
            &refs(&["Zyzzyva", "dog", ",", "eolx", "ran", "home", "end"]),
            &surps(&["<unk>", "dog", ".", "<eos>", "extra", "ran", "home", "end", "pad"]),
            no_guard(),
        )
        .unwrap();
        let words: Vec<_> = merged.iter().map(|m| m.word.as_str()).collect();
        assert_eq!(words, vec!["dog", "ran", "home", "end"]);
        assert_eq!(merged[1].measures, vec!["304"]);
    }

    #[test]
    fn test_tail_guard_stops_early() {
        let words = ["a", "b", "c", "d", "e", "f"];
        let merged = harmonize_rows(&refs(&words), &surps(&words), AlignOptions { tail_guard: 3 })
            .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(AlignOptions::default().tail_guard, 10);
    }

    #[test]
    fn test_reference_exhausted() {
        let merged = harmonize_rows(
            &refs(&["a", "b"]),
            &surps(&["a", "b", "c", "d", "e"]),
            no_guard(),
        )
        .unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_empty_and_narrow_inputs() {
        assert!(harmonize_rows(&refs(&[]), &surps(&["a"]), no_guard())
            .unwrap()
            .is_empty());
        let narrow = table(&["word", "surprisal"], &[&["a", "1.0"]]);
        assert!(harmonize_rows(&refs(&["a"]), &narrow, no_guard()).is_err());
    }
}
