//! Batching of train, validation and prediction data

use super::{Dataset, NamedDatasets};
use crate::config::{DataModuleConfig, ModelConfig};
use crate::error::Result;
use crate::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// Mini-batch: row-major inputs and, when known, targets
#[derive(Debug, Clone)]
pub struct Batch {
    /// `size × x_features` values
    pub inputs: Tensor,
    /// `size × y_features` values; `None` for prediction data
    pub targets: Option<Tensor>,
    pub size: usize,
}

/// Packages datasets into batches according to the datamodule section
#[derive(Debug, Clone)]
pub struct DataModule {
    config: DataModuleConfig,
    x_features: Vec<String>,
    y_features: Vec<String>,
    train: NamedDatasets,
    validation: NamedDatasets,
    predict: Option<Dataset>,
}

impl DataModule {
    pub fn new<A>(config: &ModelConfig<A>) -> Self {
        Self {
            config: config.datamodule.clone(),
            x_features: config.x_features.clone(),
            y_features: config.y_features.clone(),
            train: NamedDatasets::new(),
            validation: NamedDatasets::new(),
            predict: None,
        }
    }

    pub fn with_train(mut self, train: NamedDatasets) -> Self {
        self.train = train;
        self
    }

    pub fn with_validation(mut self, validation: NamedDatasets) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_predict(mut self, predict: Dataset) -> Self {
        self.predict = Some(predict);
        self
    }

    pub fn config(&self) -> &DataModuleConfig {
        &self.config
    }

    pub fn has_validation(&self) -> bool {
        self.validation.values().any(|d| !d.is_empty())
    }

    /// Training batches for `epoch`
    ///
    /// Rows of all sources are pooled. Shuffling is seeded with
    /// `seed + epoch`, so a given epoch always sees the same order.
    pub fn train_batches(&self, epoch: usize) -> Result<Vec<Batch>> {
        let mut rows: Vec<(&Dataset, usize)> = self
            .train
            .values()
            .flat_map(|ds| (0..ds.len()).map(move |i| (ds, i)))
            .collect();

        let split = &self.config.train;
        if split.shuffle {
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(epoch as u64));
            rows.shuffle(&mut rng);
        }

        let mut batches = Vec::new();
        for chunk in rows.chunks(split.batch_size.max(1)) {
            if split.drop_last && chunk.len() < split.batch_size {
                continue;
            }
            batches.push(self.pooled_batch(chunk)?);
        }
        debug!(
            epoch,
            rows = rows.len(),
            batches = batches.len(),
            "train batches"
        );
        Ok(batches)
    }

    /// Validation batches per source, in source order
    pub fn validation_batches(&self) -> Result<Vec<(String, Vec<Batch>)>> {
        let batch_size = self.config.validation.batch_size;
        self.validation
            .iter()
            .map(|(name, ds)| Ok((name.clone(), self.sequential(ds, batch_size, true)?)))
            .collect()
    }

    /// Prediction batches in row order; empty when no prediction data is set
    pub fn predict_batches(&self) -> Result<Vec<Batch>> {
        match &self.predict {
            Some(ds) => self.sequential(ds, self.config.predict.batch_size, false),
            None => Ok(Vec::new()),
        }
    }

    fn sequential(&self, ds: &Dataset, batch_size: usize, targets: bool) -> Result<Vec<Batch>> {
        let indices: Vec<usize> = (0..ds.len()).collect();
        indices
            .chunks(batch_size.max(1))
            .map(|rows| {
                let inputs = ds.gather(&self.x_features, rows)?;
                let targets = if targets {
                    Some(Tensor::from_vec(ds.gather(&self.y_features, rows)?, false))
                } else {
                    None
                };
                Ok(Batch {
                    inputs: Tensor::from_vec(inputs, false),
                    targets,
                    size: rows.len(),
                })
            })
            .collect()
    }

    fn pooled_batch(&self, rows: &[(&Dataset, usize)]) -> Result<Batch> {
        let mut inputs = Vec::with_capacity(rows.len() * self.x_features.len());
        let mut targets = Vec::with_capacity(rows.len() * self.y_features.len());
        for (ds, i) in rows {
            inputs.extend(ds.gather(&self.x_features, &[*i])?);
            targets.extend(ds.gather(&self.y_features, &[*i])?);
        }
        Ok(Batch {
            inputs: Tensor::from_vec(inputs, false),
            targets: Some(Tensor::from_vec(targets, false)),
            size: rows.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(batch_size: usize, shuffle: bool, drop_last: bool) -> ModelConfig<()> {
        let mut config = ModelConfig::new((), ["x"], ["y"]);
        config.datamodule.train.batch_size = batch_size;
        config.datamodule.train.shuffle = shuffle;
        config.datamodule.train.drop_last = drop_last;
        config.datamodule.predict.batch_size = 2;
        config
    }

    fn data(n: usize) -> Dataset {
        let x: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let y = x.iter().map(|v| v * 10.0).collect();
        Dataset::from_columns([("x", x), ("y", y)]).unwrap()
    }

    fn named(ds: Dataset) -> NamedDatasets {
        NamedDatasets::from([("main".to_string(), ds)])
    }

    #[test]
    fn test_drop_last() {
        let keep = DataModule::new(&config(2, false, false)).with_train(named(data(5)));
        assert_eq!(keep.train_batches(0).unwrap().len(), 3);

        let drop = DataModule::new(&config(2, false, true)).with_train(named(data(5)));
        let batches = drop.train_batches(0).unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.size == 2));
    }

    #[test]
    fn test_shuffle_is_seeded_per_epoch() {
        let dm = DataModule::new(&config(10, true, false)).with_train(named(data(10)));
        let first = dm.train_batches(0).unwrap()[0].inputs.to_vec();
        let again = dm.train_batches(0).unwrap()[0].inputs.to_vec();
        assert_eq!(first, again);

        let mut sorted = first.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(sorted, data(10).column("x").unwrap());
    }

    #[test]
    fn test_targets_follow_inputs() {
        let dm = DataModule::new(&config(3, true, false)).with_train(named(data(7)));
        for batch in dm.train_batches(1).unwrap() {
            let targets = batch.targets.unwrap().to_vec();
            for (x, y) in batch.inputs.to_vec().iter().zip(targets) {
                assert_eq!(x * 10.0, y);
            }
        }
    }

    #[test]
    fn test_predict_batches_keep_order() {
        let dm = DataModule::new(&config(1, true, false)).with_predict(data(5));
        let batches = dm.predict_batches().unwrap();
        assert_eq!(batches.len(), 3);
        assert!(batches[0].targets.is_none());
        let flat: Vec<f32> = batches.iter().flat_map(|b| b.inputs.to_vec()).collect();
        assert_eq!(flat, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
