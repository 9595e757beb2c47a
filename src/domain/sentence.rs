// ============================================================
// Layer 3: Token Sequence Domain Type
// ============================================================
// A sentence after vocabulary lookup: a fixed-length row of
// token ids plus the number of positions that are real.
//
//   words:   a  man  is  sleeping
//   ids:     7  12   9   41        EOS  PAD  PAD  PAD
//   length:  5  (words + EOS)
//
// Everything past `length` is padding. Padding never reaches
// the loss and is stripped from decoded output.
//
// Reference: Bowman et al. (2016) Generating Sentences from
//            a Continuous Space

use serde::{Deserialize, Serialize};

/// A padded, length-annotated sequence of vocabulary ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSequence {
    /// Exactly `max_len` ids, padded with the PAD id
    pub ids: Vec<u32>,

    /// Number of leading ids that belong to the sentence
    pub length: usize,
}

impl TokenSequence {
    /// Build a sequence from raw word ids.
    ///
    /// EOS is appended before truncation, so a sentence that
    /// fills `max_len` on its own loses its EOS marker.
    pub fn from_word_ids(word_ids: &[u32], eos: u32, pad: u32, max_len: usize) -> Self {
        let mut ids: Vec<u32> = word_ids
            .iter()
            .copied()
            .chain(std::iter::once(eos))
            .take(max_len)
            .collect();
        let length = ids.len();
        ids.resize(max_len, pad);
        Self { ids, length }
    }

}

/// Drop PAD and EOS ids from a decoded row, keeping word order.
pub fn content_ids(ids: &[u32], pad: u32, eos: u32) -> Vec<u32> {
    ids.iter()
        .copied()
        .filter(|&id| id != pad && id != eos)
        .collect()
}
