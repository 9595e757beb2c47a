// ============================================================
// Layer 6: Generation Quality Scores
// ============================================================
// Text-level metrics used to judge generated sentences:
//
//   corpus_bleu      → modified n-gram precision with brevity
//                      penalty, pooled over the whole corpus
//   bleu_1_to_4      → cumulative BLEU-1, -2, -3, -4
//   entropy          → unigram entropy (nats) of a token list
//   ngram_diversity  → distinct-1 / distinct-2 ratios
//
// Corpus BLEU follows the usual convention: if any n-gram
// order has zero matches the score is 0.
//
// Reference: Papineni et al. (2002) BLEU
//            Li et al. (2016) A Diversity-Promoting Objective

use std::collections::HashMap;

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

/// Reference length closest to `hyp_len`, shorter wins ties.
fn closest_ref_length(references: &[Vec<String>], hyp_len: usize) -> usize {
    references
        .iter()
        .map(|r| r.len())
        .min_by_key(|&len| (len.abs_diff(hyp_len), len))
        .unwrap_or(0)
}

/// Cumulative corpus BLEU up to `max_order` with uniform weights.
///
/// `references[i]` holds every acceptable reference for `hypotheses[i]`.
pub fn corpus_bleu(
    references: &[Vec<Vec<String>>],
    hypotheses: &[Vec<String>],
    max_order:  usize,
) -> f64 {
    if max_order == 0 {
        return 0.0;
    }

    let mut matches = vec![0usize; max_order];
    let mut totals  = vec![0usize; max_order];
    let mut hyp_len = 0usize;
    let mut ref_len = 0usize;

    for (refs, hyp) in references.iter().zip(hypotheses) {
        hyp_len += hyp.len();
        ref_len += closest_ref_length(refs, hyp.len());

        for n in 1..=max_order {
            let mut max_ref_counts: HashMap<&[String], usize> = HashMap::new();
            for r in refs {
                for (gram, count) in ngram_counts(r, n) {
                    let entry = max_ref_counts.entry(gram).or_insert(0);
                    *entry = (*entry).max(count);
                }
            }

            for (gram, count) in ngram_counts(hyp, n) {
                let clip = max_ref_counts.get(gram).copied().unwrap_or(0);
                matches[n - 1] += count.min(clip);
                totals[n - 1]  += count;
            }
        }
    }

    if hyp_len == 0 || matches.iter().any(|&m| m == 0) {
        return 0.0;
    }

    let weight = 1.0 / max_order as f64;
    let log_precision: f64 = matches
        .iter()
        .zip(&totals)
        .map(|(&m, &t)| weight * (m as f64 / t as f64).ln())
        .sum();

    let brevity_penalty = if hyp_len < ref_len {
        (1.0 - ref_len as f64 / hyp_len as f64).exp()
    } else {
        1.0
    };

    brevity_penalty * log_precision.exp()
}

/// BLEU-1 through BLEU-4, each in [0, 1].
pub fn bleu_1_to_4(references: &[Vec<Vec<String>>], hypotheses: &[Vec<String>]) -> [f64; 4] {
    [1, 2, 3, 4].map(|order| corpus_bleu(references, hypotheses, order))
}

/// Shannon entropy (natural log) of the unigram distribution.
pub fn entropy(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let total = tokens.len() as f64;
    ngram_counts(tokens, 1)
        .values()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum()
}

/// (distinct-1, distinct-2): unique n-grams over total n-grams.
pub fn ngram_diversity(tokens: &[String]) -> (f64, f64) {
    let distinct = |n: usize| {
        let total = tokens.len().saturating_sub(n - 1);
        if total == 0 {
            0.0
        } else {
            ngram_counts(tokens, n).len() as f64 / total as f64
        }
    };
    (distinct(1), distinct(2))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_identical_corpus_scores_one() {
        let hyp  = vec![words("a man is sleeping on the couch")];
        let refs = vec![vec![words("a man is sleeping on the couch")]];
        for score in bleu_1_to_4(&refs, &hyp) {
            assert!((score - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_disjoint_corpus_scores_zero() {
        let hyp  = vec![words("dogs bark loudly")];
        let refs = vec![vec![words("a man is sleeping")]];
        assert_eq!(bleu_1_to_4(&refs, &hyp), [0.0; 4]);
    }

    #[test]
    fn test_partial_match_is_between_zero_and_one() {
        let hyp  = vec![words("a man is running outside")];
        let refs = vec![vec![words("a man is sleeping outside")]];
        let [b1, b2, _, _] = bleu_1_to_4(&refs, &hyp);
        assert!((b1 - 0.8).abs() < 1e-9);
        assert!(b2 > 0.0 && b2 < b1);
    }

    #[test]
    fn test_brevity_penalty_applies() {
        let hyp  = vec![words("a man")];
        let refs = vec![vec![words("a man is sleeping")]];
        // precision is perfect but the hypothesis is half the length
        let b1 = corpus_bleu(&refs, &hyp, 1);
        assert!((b1 - (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_of_uniform_tokens() {
        let tokens = words("a b c d");
        assert!((entropy(&tokens) - 4f64.ln()).abs() < 1e-9);
        assert_eq!(entropy(&words("x x x")), 0.0);
    }

    #[test]
    fn test_ngram_diversity() {
        let (d1, d2) = ngram_diversity(&words("a a b b"));
        assert!((d1 - 0.5).abs() < 1e-9);
        assert!((d2 - 1.0).abs() < 1e-9);
        assert_eq!(ngram_diversity(&[]), (0.0, 0.0));
    }
}
