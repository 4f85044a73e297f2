//! Linear split with rotation

use super::fractions::{partition, SplitFractions};
use super::{SplitIndices, Splittable};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

const DESCRIPTION: &str = "Deterministic linear cross-validator with rotation of returned indices. \
Useful for extremely small datasets not served by other strategies. \
Given n_splits, a rotation window of ceil(len(dataset) / n_splits) is calculated \
and the indices are rotated by that window after each split.";

/// Deterministic cross-validator that rotates the index sequence between folds
///
/// Cutoffs are computed once from the dataset length, so every fold has
/// the same train, validation and test sizes; only the indices inside them
/// move.
///
/// # Example
///
/// ```
/// use relevo::splits::LinearSplitWithRotation;
///
/// let indices: Vec<u32> = (0..10).collect();
/// let folds: Vec<_> = LinearSplitWithRotation::new(2).split(&indices).unwrap().collect();
///
/// assert_eq!(folds[0].train, vec![0, 1, 2, 3, 4, 5, 6, 7]);
/// assert_eq!(folds[1].train, vec![5, 6, 7, 8, 9, 0, 1, 2]);
/// assert_eq!(folds[1].validation, vec![3]);
/// assert_eq!(folds[1].test, vec![4]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearSplitWithRotation {
    pub n_splits: usize,
    pub fractions: SplitFractions,
}

impl Default for LinearSplitWithRotation {
    fn default() -> Self {
        Self {
            n_splits: 1,
            fractions: SplitFractions::default(),
        }
    }
}

impl LinearSplitWithRotation {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            ..Self::default()
        }
    }

    pub fn with_fractions(mut self, fractions: SplitFractions) -> Self {
        self.fractions = fractions;
        self
    }

    pub fn description(&self) -> &'static str {
        DESCRIPTION
    }

    /// Lazily yield `n_splits` folds of `dataset`
    pub fn split<S: Splittable + ?Sized>(&self, dataset: &S) -> Result<RotatingSplits> {
        self.fractions.check()?;
        if self.n_splits == 0 {
            return Err(Error::InvalidSplit("n_splits must be at least 1".to_string()));
        }

        let len = dataset.num_samples();
        let window = len.div_ceil(self.n_splits);
        let (train_cutoff, validation_cutoff) = partition(len, &self.fractions);
        debug!(
            len,
            n_splits = self.n_splits,
            window,
            train_cutoff,
            validation_cutoff,
            "linear split with rotation"
        );

        Ok(RotatingSplits {
            indices: (0..len).collect(),
            window,
            train_cutoff,
            validation_cutoff,
            remaining: self.n_splits,
        })
    }
}

/// Folds of [`LinearSplitWithRotation`]
///
/// Each fold consumes one rotation; the iterator cannot be restarted.
#[derive(Debug, Clone)]
pub struct RotatingSplits {
    indices: VecDeque<usize>,
    window: usize,
    train_cutoff: usize,
    validation_cutoff: usize,
    remaining: usize,
}

impl RotatingSplits {
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn cutoffs(&self) -> (usize, usize) {
        (self.train_cutoff, self.validation_cutoff)
    }
}

impl Iterator for RotatingSplits {
    type Item = SplitIndices;

    fn next(&mut self) -> Option<SplitIndices> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.indices.make_contiguous();
        let (train, rest) = current.split_at(self.train_cutoff);
        let (validation, test) = rest.split_at(self.validation_cutoff - self.train_cutoff);
        let fold = SplitIndices {
            train: train.to_vec(),
            validation: validation.to_vec(),
            test: test.to_vec(),
        };

        if !self.indices.is_empty() {
            let shift = self.window % self.indices.len();
            self.indices.rotate_right(shift);
        }
        Some(fold)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RotatingSplits {}
