// ============================================================
// Layer 4: Corpus Loader
// ============================================================
// Reads plain-text corpora with one sentence per line.
//
// The path may point at:
//   - a single file            → every non-empty line is a sentence
//   - a directory              → every *.txt file inside it, read
//                                in file-name order
//
// Unreadable files inside a directory are skipped with a
// warning; a missing path is an error.

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::preprocessor::Preprocessor;
use crate::domain::traits::SentenceSource;

/// Loads sentences from a text file or a directory of text files.
/// Implements the SentenceSource trait from Layer 3.
pub struct CorpusLoader {
    path:         PathBuf,
    preprocessor: Preprocessor,
}

impl CorpusLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), preprocessor: Preprocessor::new() }
    }

    fn read_file(&self, path: &Path) -> Result<Vec<String>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read corpus file '{}'", path.display()))?;
        Ok(self.preprocessor.clean_all(text.lines()))
    }

    fn text_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("txt"))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl SentenceSource for CorpusLoader {
    fn load_all(&self) -> Result<Vec<String>> {
        if self.path.is_file() {
            let sentences = self.read_file(&self.path)?;
            tracing::info!("Loaded {} sentences from '{}'", sentences.len(), self.path.display());
            return Ok(sentences);
        }
        if !self.path.is_dir() {
            bail!("Corpus path '{}' does not exist", self.path.display());
        }

        let mut sentences = Vec::new();
        for file in Self::text_files(&self.path)? {
            match self.read_file(&file) {
                Ok(lines) => {
                    tracing::debug!("Loaded: {} ({} sentences)", file.display(), lines.len());
                    sentences.extend(lines);
                }
                Err(e) => tracing::warn!("Skipping '{}': {}", file.display(), e),
            }
        }

        tracing::info!("Loaded {} sentences from '{}'", sentences.len(), self.path.display());
        Ok(sentences)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sentence_vae_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_loads_single_file() {
        let dir = scratch_dir("loader_file");
        let file = dir.join("train.txt");
        fs::write(&file, "a man is sleeping .\n\n  two dogs   play\n").unwrap();

        let sentences = CorpusLoader::new(&file).load_all().unwrap();
        fs::remove_dir_all(&dir).ok();
        assert_eq!(sentences, vec!["a man is sleeping .", "two dogs play"]);
    }

    #[test]
    fn test_loads_directory_in_name_order() {
        let dir = scratch_dir("loader_dir");
        fs::write(dir.join("b.txt"), "second\n").unwrap();
        fs::write(dir.join("a.txt"), "first\n").unwrap();
        fs::write(dir.join("notes.md"), "ignored\n").unwrap();

        let sentences = CorpusLoader::new(&dir).load_all().unwrap();
        fs::remove_dir_all(&dir).ok();
        assert_eq!(sentences, vec!["first", "second"]);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let missing = std::env::temp_dir().join("sentence_vae_definitely_missing_corpus");
        assert!(CorpusLoader::new(missing).load_all().is_err());
    }
}
