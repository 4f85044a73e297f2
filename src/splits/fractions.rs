//! Train/validation/test fractions

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest accepted distance of the fraction sum from 1.0
pub const FRACTION_SUM_TOLERANCE: f64 = 1.5e-7;

/// Share of the rows going to each side of a split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitFractions {
    pub train: f64,
    pub validation: f64,
    pub test: f64,
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self {
            train: 0.8,
            validation: 0.1,
            test: 0.1,
        }
    }
}

impl SplitFractions {
    pub fn new(train: f64, validation: f64, test: f64) -> Self {
        Self {
            train,
            validation,
            test,
        }
    }

    /// Fractions must be non-negative and sum to 1.0
    pub fn check(&self) -> Result<()> {
        let parts = [self.train, self.validation, self.test];
        if parts.iter().any(|f| f.is_nan() || *f < 0.0) {
            return Err(Error::InvalidSplit(format!(
                "fractions must be non-negative, got {parts:?}"
            )));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() >= FRACTION_SUM_TOLERANCE {
            return Err(Error::InvalidSplit(format!(
                "fractions must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Train and validation cutoffs for `len` rows
///
/// Rows `[0, train)` are train, `[train, validation)` validation and the
/// rest test. Both cutoffs truncate.
pub fn partition(len: usize, fractions: &SplitFractions) -> (usize, usize) {
    let n = len as f64;
    let train = ((fractions.train * n) as usize).min(len);
    let validation = (((fractions.train + fractions.validation) * n) as usize).clamp(train, len);
    (train, validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cutoffs() {
        assert_eq!(partition(10, &SplitFractions::default()), (8, 9));
        assert_eq!(partition(0, &SplitFractions::default()), (0, 0));
        assert_eq!(partition(7, &SplitFractions::default()), (5, 6));
    }

    #[test]
    fn test_sum_tolerance() {
        assert!(SplitFractions::new(0.7, 0.2, 0.1).check().is_ok());
        assert!(SplitFractions::new(0.5, 0.25, 0.25 + 1e-8).check().is_ok());
        assert!(SplitFractions::new(0.5, 0.25, 0.25 + 1e-6).check().is_err());
        assert!(SplitFractions::new(f64::NAN, 0.5, 0.5).check().is_err());
        assert!(SplitFractions::new(1.2, -0.1, -0.1).check().is_err());
    }
}
