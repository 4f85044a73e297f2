//! Dataset splitting strategies
//!
//! A strategy turns anything with a length ([`Splittable`]) into folds of
//! row indices ([`SplitIndices`]); [`SplitIndices::select`] applies a fold
//! to a [`Dataset`].

mod fractions;
mod rotation;


pub use fractions::{partition, SplitFractions, FRACTION_SUM_TOLERANCE};
pub use rotation::{LinearSplitWithRotation, RotatingSplits};

use crate::data::Dataset;
use crate::error::Result;

/// Something whose rows can be split by index
pub trait Splittable {
    fn num_samples(&self) -> usize;
}

impl Splittable for Dataset {
    fn num_samples(&self) -> usize {
        self.len()
    }
}

impl<T> Splittable for [T] {
    fn num_samples(&self) -> usize {
        self.len()
    }
}

impl<T> Splittable for Vec<T> {
    fn num_samples(&self) -> usize {
        self.len()
    }
}

/// Row indices of one fold
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    /// Rows across all three parts
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Train, validation and test subsets of `dataset`
    pub fn select(&self, dataset: &Dataset) -> Result<(Dataset, Dataset, Dataset)> {
        Ok((
            dataset.select(&self.train)?,
            dataset.select(&self.validation)?,
            dataset.select(&self.test)?,
        ))
    }
}
