//! Permutation tests with an injectable random source.
//!
//! One seed per permutation is drawn from the caller's generator before any work is
//! scheduled, and every permutation shuffles with its own `ChaCha8Rng`. Results are
//! therefore reproducible for a seeded generator no matter how rayon distributes the
//! permutations over threads.

use log::debug;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Two-sided permutation p-values for a vector of observed statistics.
///
/// `labels` is shuffled `nperm` times and `statistics` recomputes all statistics from
/// each shuffled copy. The p-value of statistic `i` is
/// `(1 + #{|null_i| >= |observed_i|}) / (nperm + 1)`, so it is never below
/// `1 / (nperm + 1)`.
pub fn permutation_p_values<R, F>(
    observed: &[f64],
    labels: &[f64],
    nperm: usize,
    rng: &mut R,
    statistics: F,
) -> Vec<f64>
where
    R: Rng + ?Sized,
    F: Fn(&[f64]) -> Vec<f64> + Sync,
{
    let seeds: Vec<u64> = (0..nperm).map(|_| rng.next_u64()).collect();
    debug!(
        "Running {} permutations for {} statistics",
        nperm,
        observed.len()
    );

    let exceedances = seeds
        .into_par_iter()
        .map(|seed| {
            let mut perm_rng = ChaCha8Rng::seed_from_u64(seed);
            let mut permuted = labels.to_vec();
            permuted.shuffle(&mut perm_rng);
            let null = statistics(&permuted);
            observed
                .iter()
                .zip(null.iter())
                .map(|(obs, null)| usize::from(is_as_extreme(*null, *obs)))
                .collect::<Vec<usize>>()
        })
        .reduce(
            || vec![0usize; observed.len()],
            |mut acc, counts| {
                for (a, c) in acc.iter_mut().zip(counts) {
                    *a += c;
                }
                acc
            },
        );

    let denom = nperm as f64 + 1.0;
    exceedances
        .into_iter()
        .map(|count| (count as f64 + 1.0) / denom)
        .collect()
}

// Ties within rounding error of the observed value count as exceedances.
#[inline]
fn is_as_extreme(null: f64, observed: f64) -> bool {
    let threshold = observed.abs();
    null.abs() >= threshold - 1e-12 * threshold.max(1.0)
}
