// ============================================================
// Layer 6: Vocabulary Store
// ============================================================
// Word <-> id mapping backed by a HuggingFace WordLevel
// tokenizer. The tokenizer JSON is written by hand from word
// frequencies, which sidesteps the trainer/ModelWrapper type
// mismatch in tokenizers 0.15.
//
// Reserved ids (fixed, always present):
//   PAD = 0   padding, also the word-dropout placeholder
//   GO  = 1   decoder start token
//   EOS = 2   end of sentence
//   UNK = 3   any word outside the vocabulary
//
// Reference: Rust Book §8 (Hash Maps)

use anyhow::{Context, Result};
use std::{collections::HashMap, path::PathBuf, str::FromStr};
use tokenizers::Tokenizer;

use crate::domain::sentence::{content_ids, TokenSequence};

pub const PAD_TOKEN: &str = "PAD";
pub const GO_TOKEN: &str = "GO";
pub const EOS_TOKEN: &str = "EOS";
pub const UNK_TOKEN: &str = "UNK";

const RESERVED: [&str; 4] = [PAD_TOKEN, GO_TOKEN, EOS_TOKEN, UNK_TOKEN];

const TOKENIZER_FILE: &str = "tokenizer.json";

/// A word-level vocabulary with the four reserved tokens resolved.
#[derive(Clone)]
pub struct Vocabulary {
    tokenizer: Tokenizer,
    pad: u32,
    go: u32,
    eos: u32,
    unk: u32,
}

impl Vocabulary {
    /// Wrap an existing tokenizer. Fails if any reserved token is missing.
    pub fn from_tokenizer(tokenizer: Tokenizer) -> Result<Self> {
        let lookup = |token: &str| {
            tokenizer.token_to_id(token).with_context(|| {
                format!("Vocabulary is missing the reserved token '{token}'")
            })
        };
        let pad = lookup(PAD_TOKEN)?;
        let go = lookup(GO_TOKEN)?;
        let eos = lookup(EOS_TOKEN)?;
        let unk = lookup(UNK_TOKEN)?;
        Ok(Self { tokenizer, pad, go, eos, unk })
    }

    /// Build a vocabulary of at most `vocab_size` entries from a corpus.
    ///
    /// The four reserved tokens take the first ids; the remaining
    /// slots go to the most frequent words (ties broken
    /// alphabetically so builds are reproducible).
    pub fn build(sentences: &[String], vocab_size: usize) -> Result<Self> {
        let mut freq: HashMap<String, usize> = HashMap::new();
        for sentence in sentences {
            for word in split_words(sentence) {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        let mut words: Vec<(String, usize)> = freq
            .into_iter()
            .filter(|(w, _)| !RESERVED.contains(&w.as_str()))
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(RESERVED.len()));

        let mut vocab = serde_json::Map::new();
        for (id, token) in RESERVED.iter().enumerate() {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        for (offset, (word, _)) in words.iter().enumerate() {
            vocab.insert(word.clone(), serde_json::json!(RESERVED.len() + offset));
        }

        let added_tokens: Vec<serde_json::Value> = RESERVED
            .iter()
            .enumerate()
            .map(|(id, token)| {
                serde_json::json!({
                    "id": id, "content": token, "single_word": false, "lstrip": false,
                    "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": false,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let tokenizer = Tokenizer::from_str(&tokenizer_json.to_string())
            .map_err(|e| anyhow::anyhow!("Cannot build tokenizer: {e}"))?;

        tracing::info!("Vocabulary built with {} entries", RESERVED.len() + words.len());
        Self::from_tokenizer(tokenizer)
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn len(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn pad(&self) -> u32 { self.pad }
    pub fn go(&self) -> u32 { self.go }
    pub fn eos(&self) -> u32 { self.eos }
    pub fn unk(&self) -> u32 { self.unk }

    /// Word ids for a raw sentence. Unknown words become UNK.
    pub fn encode_words(&self, sentence: &str) -> Result<Vec<u32>> {
        let enc = self
            .tokenizer
            .encode(sentence, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        Ok(enc.get_ids().to_vec())
    }

    /// Encode a sentence as a padded sequence of `max_len` ids ending in EOS.
    pub fn encode(&self, sentence: &str, max_len: usize) -> Result<TokenSequence> {
        let word_ids = self.encode_words(sentence)?;
        Ok(TokenSequence::from_word_ids(&word_ids, self.eos, self.pad, max_len))
    }

    pub fn word(&self, id: u32) -> String {
        self.tokenizer
            .id_to_token(id)
            .unwrap_or_else(|| UNK_TOKEN.to_string())
    }

    /// Words of a decoded row with PAD and EOS removed.
    pub fn words(&self, ids: &[u32]) -> Vec<String> {
        content_ids(ids, self.pad, self.eos)
            .into_iter()
            .map(|id| self.word(id))
            .collect()
    }

    /// Space-joined sentence for a decoded row.
    pub fn decode(&self, ids: &[u32]) -> String {
        self.words(ids).join(" ")
    }

    /// Every (word, id) pair, reserved tokens included.
    pub fn entries(&self) -> HashMap<String, u32> {
        self.tokenizer.get_vocab(true)
    }
}

/// Lowercased word/punctuation split matching the Whitespace pre-tokenizer
/// (`\w+|[^\w\s]+`).
pub fn split_words(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_is_word = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        let is_word = c.is_alphanumeric() || c == '_';
        if !current.is_empty() && is_word != current_is_word {
            out.push(std::mem::take(&mut current));
        }
        current_is_word = is_word;
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

// ─── VocabularyStore ──────────────────────────────────────────────────────────
/// Persists the vocabulary next to the checkpoints so that sampling
/// uses exactly the ids the model was trained with.
pub struct VocabularyStore {
    dir: PathBuf,
}

impl VocabularyStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: PathBuf::from(dir.into()) }
    }

    /// Load an existing vocabulary or build (and save) a new one from texts
    pub fn load_or_build(&self, texts: &[String], vocab_size: usize) -> Result<Vocabulary> {
        if self.dir.join(TOKENIZER_FILE).exists() {
            tracing::info!("Loading existing vocabulary from disk");
            self.load()
        } else {
            tracing::info!("Building new vocabulary (vocab_size={})", vocab_size);
            let vocab = Vocabulary::build(texts, vocab_size)?;
            self.save(&vocab)?;
            Ok(vocab)
        }
    }

    pub fn load(&self) -> Result<Vocabulary> {
        let path = self.dir.join(TOKENIZER_FILE);
        let tokenizer = Tokenizer::from_file(&path).map_err(|e| {
            anyhow::anyhow!("Cannot load vocabulary from '{}': {}", path.display(), e)
        })?;
        Vocabulary::from_tokenizer(tokenizer)
    }

    pub fn save(&self, vocab: &Vocabulary) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.dir.join(TOKENIZER_FILE);
        vocab
            .tokenizer()
            .save(&path, true)
            .map_err(|e| anyhow::anyhow!("Cannot write '{}': {e}", path.display()))?;
        tracing::debug!("Saved vocabulary to '{}'", path.display());
        Ok(())
    }
}
