// ============================================================
// Layer 4 — K-Fold Splitter
// ============================================================
// Partitions the record indices [0, N) into k folds for
// cross-validation. Each fold is used once as the evaluation
// set while the remaining k-1 folds form the training set.
//
// Algorithm:
//   1. Shuffle 0..N with a seeded ChaCha8 RNG
//   2. Cut the shuffled order into k contiguous blocks; the
//      first N % k blocks get one extra element, so block
//      sizes differ by at most one
//   3. Block i is the test set of fold i, everything else is
//      its training set
//
// Both index lists of a fold are returned sorted ascending, so
// derived datasets keep the parent's record order.
//
// The same (N, k, seed) always yields the same folds, which is
// what lets a fold's checkpoint be re-evaluated later.
//
// Reference: rand / rand_chacha crate documentation

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::domain::error::{DatasetError, DatasetResult};

/// Seed used when none is configured
pub const DEFAULT_SEED: u64 = 42;

/// One train/test partition of the index range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub train: Vec<usize>,
    pub test:  Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
    seed:     u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Split `n` items into `n_splits` folds.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `n_splits < 2` or `n_splits > n`.
    pub fn split(&self, n: usize) -> DatasetResult<Vec<FoldSplit>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(DatasetError::InvalidConfiguration(format!(
                "k-fold needs at least 2 splits, got {k}"
            )));
        }
        if k > n {
            return Err(DatasetError::InvalidConfiguration(format!(
                "cannot make {k} folds from {n} items"
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);

        let base  = n / k;
        let extra = n % k;

        let mut folds = Vec::with_capacity(k);
        let mut start = 0usize;
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            let end  = start + size;

            let mut test: Vec<usize> = order[start..end].to_vec();
            let mut train: Vec<usize> = order[..start]
                .iter()
                .chain(order[end..].iter())
                .copied()
                .collect();
            test.sort_unstable();
            train.sort_unstable();

            folds.push(FoldSplit { train, test });
            start = end;
        }

        tracing::debug!(
            "K-fold split: {} items into {} folds (seed {})",
            n, k, self.seed
        );

        Ok(folds)
    }
}
