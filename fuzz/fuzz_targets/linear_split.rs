#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use relevo::splits::{LinearSplitWithRotation, SplitFractions};

/// Fuzz target for the rotating linear splitter
///
/// Any accepted configuration yields `n_splits` folds, each a permutation
/// of the dataset indices.

#[derive(Arbitrary, Debug)]
struct SplitFuzzInput {
    len: u16,
    n_splits: u8,
    train: u8,
    validation: u8,
}

fuzz_target!(|input: SplitFuzzInput| {
    let len = usize::from(input.len % 2048);
    let train = f64::from(input.train) / 255.0;
    let validation = (f64::from(input.validation) / 255.0).min(1.0 - train);
    let fractions = SplitFractions::new(train, validation, 1.0 - train - validation);

    let data = vec![(); len];
    let strategy = LinearSplitWithRotation::new(usize::from(input.n_splits)).with_fractions(fractions);
    let Ok(folds) = strategy.split(&data) else {
        return;
    };

    let mut count = 0;
    for fold in folds {
        let mut all: Vec<usize> = fold
            .train
            .iter()
            .chain(&fold.validation)
            .chain(&fold.test)
            .copied()
            .collect();
        all.sort_unstable();
        assert!(all.iter().copied().eq(0..len));
        count += 1;
    }
    assert_eq!(count, usize::from(input.n_splits));
});
