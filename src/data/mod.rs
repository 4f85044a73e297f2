//! In-memory datasets and batching

mod datamodule;
mod dataset;

pub use datamodule::{Batch, DataModule};
pub use dataset::{Dataset, NamedDatasets};
