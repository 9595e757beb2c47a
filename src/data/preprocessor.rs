// ============================================================
// Layer 4: Sentence Preprocessor
// ============================================================
// Normalises one raw corpus line into one clean sentence
// before it reaches the vocabulary.
//
// Corpus lines often carry:
//   - non-breaking or zero-width spaces from scraped text
//   - tabs left over from TSV exports
//   - control characters and byte-order marks
//   - runs of spaces
//
// Cleaning steps (in order):
//   1. Map Unicode whitespace variants and controls to a space
//   2. Collapse runs of spaces into one
//   3. Trim both ends
//
// Lowercasing and punctuation splitting are left to the
// tokenizer's normaliser and pre-tokenizer.

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a single sentence. The result never contains a newline.
    pub fn clean(&self, text: &str) -> String {
        let mut out        = String::with_capacity(text.len());
        let mut last_space = true;

        for c in text.chars() {
            let c = match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_whitespace() || c.is_control() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim_end().to_string()
    }

    /// Clean every sentence and drop the ones that end up empty.
    pub fn clean_all<I, S>(&self, sentences: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        sentences
            .into_iter()
            .map(|s| self.clean(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("a   man  sleeps"), "a man sleeps");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  a man sleeps \t"), "a man sleeps");
    }

    #[test]
    fn test_removes_control_and_invisible_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("a\u{FEFF}man\x01sleeps\u{00A0}now"), "a man sleeps now");
    }

    #[test]
    fn test_newlines_become_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("a man\r\nsleeps"), "a man sleeps");
    }

    #[test]
    fn test_clean_all_drops_empty_lines() {
        let p = Preprocessor::new();
        let cleaned = p.clean_all(["a dog", "   ", "", "two  cats"]);
        assert_eq!(cleaned, vec!["a dog", "two cats"]);
    }
}
