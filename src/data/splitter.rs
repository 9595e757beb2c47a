// ============================================================
// Layer 4: Train/Validation Splitter
// ============================================================
// Shuffles the sentence corpus with a seeded generator and
// splits it in two:
//   - training set:   drives the parameter updates
//   - validation set: greedily reconstructed after every epoch
//                     to compute BLEU
//
// Corpora are usually ordered (by source, by premise), so the
// shuffle comes first. Seeding it keeps the split identical
// across reruns of the same configuration.
//
// Reference: rand crate documentation (SliceRandom, SeedableRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation),
/// putting `train_fraction` of them in the first part.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let val      = samples.split_off(split_at.min(total));

    tracing::debug!(
        "Corpus split: {} training, {} validation sentences",
        samples.len(),
        val.len(),
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.9, 7);
        assert_eq!(train.len(), 90);
        assert_eq!(val.len(),   10);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val)      = split_train_val(items, 0.7, 7);
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let items: Vec<usize> = (0..30).collect();
        let a = split_train_val(items.clone(), 0.8, 42);
        let b = split_train_val(items, 0.8, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_corpus() {
        let (train, val) = split_train_val(Vec::<usize>::new(), 0.8, 1);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }
}
