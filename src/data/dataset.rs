//! Columnar in-memory dataset

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Datasets keyed by source name
pub type NamedDatasets = BTreeMap<String, Dataset>;

/// Table of equally long `f32` columns
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    columns: BTreeMap<String, Vec<f32>>,
    len: usize,
}

impl Dataset {
    /// Build from named columns; every column must have the same length
    pub fn from_columns<K, I>(columns: I) -> Result<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Vec<f32>)>,
    {
        let columns: BTreeMap<String, Vec<f32>> = columns
            .into_iter()
            .map(|(name, values)| (name.into(), values))
            .collect();
        let len = columns.values().next().map_or(0, Vec::len);
        if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != len) {
            return Err(Error::InvalidParameter(format!(
                "column '{name}' has {} rows, expected {len}",
                values.len()
            )));
        }
        Ok(Self { columns, len })
    }

    /// Dataset with the given columns and no rows
    pub fn empty<K: Into<String>>(names: impl IntoIterator<Item = K>) -> Self {
        Self {
            columns: names.into_iter().map(|n| (n.into(), Vec::new())).collect(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column(&self, name: &str) -> Option<&[f32]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Row `index` as column name to value
    pub fn row(&self, index: usize) -> Option<BTreeMap<&str, f32>> {
        (index < self.len).then(|| {
            self.columns
                .iter()
                .map(|(name, values)| (name.as_str(), values[index]))
                .collect()
        })
    }

    /// Rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(bad) = indices.iter().find(|&&i| i >= self.len) {
            return Err(Error::InvalidParameter(format!(
                "row index {bad} out of range for dataset of length {}",
                self.len
            )));
        }
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), indices.iter().map(|&i| values[i]).collect()))
            .collect();
        Ok(Self {
            columns,
            len: indices.len(),
        })
    }

    /// Row-major `rows.len() × names.len()` matrix of the named columns
    pub fn gather(&self, names: &[String], rows: &[usize]) -> Result<Vec<f32>> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name).ok_or_else(|| {
                    Error::InvalidParameter(format!("dataset has no column '{name}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len() * columns.len());
        for &row in rows {
            for column in &columns {
                out.push(column[row]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Dataset {
        Dataset::from_columns([("a", vec![1.0, 2.0, 3.0]), ("b", vec![4.0, 5.0, 6.0])]).unwrap()
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = Dataset::from_columns([("a", vec![1.0]), ("b", vec![1.0, 2.0])]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_row_and_select() {
        let ds = table();
        assert_eq!(ds.row(1).unwrap()["b"], 5.0);
        assert!(ds.row(3).is_none());

        let picked = ds.select(&[2, 0]).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.column("a").unwrap(), &[3.0, 1.0]);
        assert!(ds.select(&[3]).is_err());
    }

    #[test]
    fn test_gather_is_row_major() {
        let ds = table();
        let names = vec!["b".to_string(), "a".to_string()];
        assert_eq!(ds.gather(&names, &[0, 2]).unwrap(), vec![4.0, 1.0, 6.0, 3.0]);
        assert!(ds.gather(&["c".to_string()], &[0]).is_err());
    }

    #[test]
    fn test_empty_dataset() {
        let ds = Dataset::empty(["a"]);
        assert!(ds.is_empty());
        assert_eq!(ds.column("a").unwrap().len(), 0);
    }
}
