//! Per-token surprisal, the quantity consumed by reading-time analyses.

use std::io::Write;

use lm_tensor::{ComputeBackend, Tensor};

use crate::architecture::LanguageModel;
use crate::error::{ModelError, Result};
use crate::rnn::HiddenState;
use crate::tokenizer::{Dictionary, EOS};

/// Header of the tab-separated surprisal table.
pub const TABLE_HEADER: [&str; 4] = ["sentid", "sentpos", "word", "surprisal"];

/// One scored word.
#[derive(Debug, Clone, PartialEq)]
pub struct SurprisalRecord {
    pub sentence: usize,
    /// 1-based position of the word in its sentence.
    pub position: usize,
    pub word: String,
    /// `-log2 p(word | context)`.
    pub surprisal: f32,
}

/// `-log2 softmax(row)[target]`, computed through log-sum-exp.
fn surprisal_bits(row: &[f32], target: u32) -> f32 {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let log_sum = row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln() + max;
    (log_sum - row[target as usize]) / std::f32::consts::LN_2
}

/// Surprisal of each target under `logits`.
///
/// `logits` has shape [seq_len, batch, vocab_size]; `targets` is
/// [seq_len][batch]. The result has the shape of `targets`.
pub fn surprisals(logits: &Tensor, targets: &[Vec<u32>]) -> Result<Vec<Vec<f32>>> {
    let dims = logits.shape().dims();
    if dims.len() != 3 {
        return Err(ModelError::Other(format!(
            "logits must be [seq_len, batch, vocab], got shape {}",
            logits.shape()
        )));
    }
    let (seq_len, batch, vocab_size) = (dims[0], dims[1], dims[2]);
    if targets.len() != seq_len {
        return Err(ModelError::ShapeMismatch {
            what: "target sequence",
            expected: seq_len,
            got: targets.len(),
        });
    }

    let mut out = Vec::with_capacity(seq_len);
    for (t, row) in targets.iter().enumerate() {
        if row.len() != batch {
            return Err(ModelError::ShapeMismatch {
                what: "target batch",
                expected: batch,
                got: row.len(),
            });
        }
        let mut step = Vec::with_capacity(batch);
        for (b, &target) in row.iter().enumerate() {
            if target as usize >= vocab_size {
                return Err(ModelError::TokenOutOfRange { token: target, vocab_size });
            }
            step.push(surprisal_bits(logits.slice_at(&[t, b])?, target));
        }
        out.push(step);
    }
    Ok(out)
}

/// Score one sentence, conditioning the first word on `<eos>`.
///
/// The sentence is run as a single-sequence batch continuing from `hidden`,
/// so a neural cache carries over between consecutive calls. Returns one
/// record per word plus the closing `<eos>`, and the carried state.
pub fn score_sentence(
    model: &mut dyn LanguageModel,
    dict: &Dictionary,
    sentence: usize,
    line: &str,
    hidden: &HiddenState,
    backend: &dyn ComputeBackend,
) -> Result<(Vec<SurprisalRecord>, HiddenState)> {
    let eos = dict
        .id(EOS)
        .ok_or_else(|| ModelError::TokenizerError(format!("dictionary has no {}", EOS)))?;
    let targets = dict.encode_line(line)?;

    let mut inputs = Vec::with_capacity(targets.len());
    inputs.push(vec![eos]);
    inputs.extend(targets[..targets.len() - 1].iter().map(|&t| vec![t]));

    let (logits, hidden) = model.forward(&inputs, hidden, backend)?;
    let column: Vec<Vec<u32>> = targets.iter().map(|&t| vec![t]).collect();
    let scores = surprisals(&logits, &column)?;

    let words = line.split_whitespace().chain(std::iter::once(EOS));
    let records = words
        .zip(scores)
        .enumerate()
        .map(|(i, (word, s))| SurprisalRecord {
            sentence,
            position: i + 1,
            word: word.to_string(),
            surprisal: s[0],
        })
        .collect();
    Ok((records, hidden))
}

/// Write records as a tab-separated table with a [`TABLE_HEADER`] row.
pub fn write_surprisal_table<W: Write>(mut writer: W, records: &[SurprisalRecord]) -> Result<()> {
    writeln!(writer, "{}", TABLE_HEADER.join("\t"))?;
    for r in records {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            r.sentence, r.position, r.word, r.surprisal
        )?;
    }
    writer.flush()?;
    Ok(())
}
