// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The application layer only talks to these traits, so a
// plain-text corpus reader and an in-memory corpus (used in
// tests) are interchangeable.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

// ─── SentenceSource ───────────────────────────────────────────────────────────
/// Any component that can produce a corpus of raw sentences.
///
/// Implementations:
///   - CorpusLoader     → one sentence per line from .txt files
///   - InMemoryCorpus   → a fixed list, for tests and demos
pub trait SentenceSource {
    /// Load every sentence this source provides, in order.
    fn load_all(&self) -> Result<Vec<String>>;
}

/// A corpus held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    pub sentences: Vec<String>,
}

impl InMemoryCorpus {
    pub fn new<S: Into<String>>(sentences: impl IntoIterator<Item = S>) -> Self {
        Self { sentences: sentences.into_iter().map(Into::into).collect() }
    }
}

impl SentenceSource for InMemoryCorpus {
    fn load_all(&self) -> Result<Vec<String>> {
        Ok(self.sentences.clone())
    }
}
