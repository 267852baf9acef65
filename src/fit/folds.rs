//! Repeated k-fold splits.
//!
//! Each repeat shuffles the row indices with a seeded RNG and cuts them into
//! `k` contiguous folds; the first `n % k` folds get one extra row. Every row
//! is held out exactly once per repeat.

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::error::UnitError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

/// Build `k * repeats` train/validation splits over `n` rows.
pub fn repeated_kfold(n: usize, k: usize, repeats: usize, seed: u64) -> Result<Vec<Fold>, UnitError> {
    if k < 2 || n < k {
        return Err(UnitError::InsufficientObservations {
            observations: n,
            folds: k,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(k * repeats);

    for _ in 0..repeats {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);

        let base = n / k;
        let extra = n % k;
        let mut start = 0;
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            let end = start + size;

            let mut valid = order[start..end].to_vec();
            let mut train: Vec<usize> = order[..start].iter().chain(&order[end..]).copied().collect();
            valid.sort_unstable();
            train.sort_unstable();

            out.push(Fold { train, valid });
            start = end;
        }
    }

    Ok(out)
}
