//! Dataset import
//!
//! Loads the training and generalization CSV files with polars, drops rows with
//! missing values, maps the binary label column to 0/1 and carves a stratified,
//! seeded test split out of the training file.

use crate::error::{Result, SweepError};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Row counts and column names recorded in the job metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub label: String,
    pub feature_names: Vec<String>,
    pub train_rows: usize,
    pub train_positive_count: usize,
    pub train_negative_count: usize,
    pub test_rows: usize,
    pub generalization_rows: usize,
    pub generalization_positive_count: usize,
    pub generalization_negative_count: usize,
}

/// Train, test and generalization splits of one job
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
    pub x_gen: Array2<f64>,
    pub y_gen: Array1<f64>,
    pub feature_names: Vec<String>,
    /// `["No <label>", "<label>"]`, negative class first
    pub labels: [String; 2],
    /// Raw label values mapped to 0 and 1
    pub class_values: [f64; 2],
    pub metadata: DatasetMetadata,
}

/// Reads job datasets from disk
#[derive(Debug, Clone)]
pub struct DataLoader {
    test_size: f64,
    random_state: u64,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
        }
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Load both files and split the training file.
    ///
    /// The generalization file must have the same feature columns as the
    /// training file and use the same two label values.
    pub fn load(&self, train_path: &Path, test_path: &Path, label_column: &str) -> Result<Dataset> {
        let train = read_csv(train_path)?;
        let generalization = read_csv(test_path)?;

        let feature_names: Vec<String> = train
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != label_column)
            .map(|s| s.to_string())
            .collect();
        if feature_names.is_empty() {
            return Err(SweepError::Data(format!(
                "{} has no feature columns besides '{}'",
                train_path.display(),
                label_column
            )));
        }

        let raw_train_y = column_values(&train, label_column)?;
        let classes = binary_classes(&raw_train_y, label_column)?;
        let x = columns_to_array2(&train, &feature_names)?;
        let y = encode_labels(&raw_train_y, classes, label_column)?;

        let x_gen = columns_to_array2(&generalization, &feature_names)?;
        let y_gen = encode_labels(&column_values(&generalization, label_column)?, classes, label_column)?;

        let (train_idx, test_idx) = self.stratified_split(&y)?;
        let x_train = x.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let x_test = x.select(Axis(0), &test_idx);
        let y_test = y.select(Axis(0), &test_idx);

        let positives = |labels: &Array1<f64>| labels.iter().filter(|&&v| v == 1.0).count();
        let metadata = DatasetMetadata {
            label: label_column.to_string(),
            feature_names: feature_names.clone(),
            train_rows: y_train.len(),
            train_positive_count: positives(&y_train),
            train_negative_count: y_train.len() - positives(&y_train),
            test_rows: y_test.len(),
            generalization_rows: y_gen.len(),
            generalization_positive_count: positives(&y_gen),
            generalization_negative_count: y_gen.len() - positives(&y_gen),
        };

        info!(
            train = metadata.train_rows,
            test = metadata.test_rows,
            generalization = metadata.generalization_rows,
            features = feature_names.len(),
            "Dataset loaded"
        );

        Ok(Dataset {
            x_train,
            y_train,
            x_test,
            y_test,
            x_gen,
            y_gen,
            feature_names,
            labels: [format!("No {}", label_column), label_column.to_string()],
            class_values: [classes.0, classes.1],
            metadata,
        })
    }

    /// Per-class seeded shuffle, then hold out `test_size` of each class
    fn stratified_split(&self, y: &Array1<f64>) -> Result<(Vec<usize>, Vec<usize>)> {
        let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            by_class.entry(label as i64).or_default().push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut train = Vec::with_capacity(y.len());
        let mut test = Vec::new();
        for (class, mut indices) in by_class {
            if indices.len() < 2 {
                return Err(SweepError::Data(format!(
                    "class {} needs at least 2 rows to split, found {}",
                    class,
                    indices.len()
                )));
            }
            indices.shuffle(&mut rng);
            let n_test = ((indices.len() as f64 * self.test_size).round() as usize)
                .clamp(1, indices.len() - 1);
            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }
        train.sort_unstable();
        test.sort_unstable();
        debug!(train = train.len(), test = test.len(), "Stratified split");
        Ok((train, test))
    }
}

/// Load the `features` columns and the 0/1-mapped label of an extra labelled file.
///
/// `class_values` are the raw negative and positive label values of the training file.
pub fn load_labeled(
    path: &Path,
    label_column: &str,
    features: &[String],
    class_values: [f64; 2],
) -> Result<(Array2<f64>, Array1<f64>)> {
    let df = read_csv(path)?;
    let x = columns_to_array2(&df, features)?;
    let y = encode_labels(
        &column_values(&df, label_column)?,
        (class_values[0], class_values[1]),
        label_column,
    )?;
    debug!(path = %path.display(), rows = y.len(), "Labelled data loaded");
    Ok((x, y))
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .map_err(|e| SweepError::Data(format!("cannot open {}: {}", path.display(), e)))?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()?;

    let rows = df.height();
    let df = df.drop_nulls::<String>(None)?;
    if df.height() < rows {
        debug!(path = %path.display(), dropped = rows - df.height(), "Dropped rows with missing values");
    }
    if df.height() == 0 {
        return Err(SweepError::Data(format!("{} has no complete rows", path.display())));
    }
    Ok(df)
}

fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| SweepError::Data(format!("column '{}' not found", name)))?;
    let values = column.cast(&DataType::Float64)?;
    let values = values.f64()?;
    if values.null_count() > 0 {
        return Err(SweepError::Data(format!("column '{}' is not numeric", name)));
    }
    Ok(values.into_iter().flatten().collect())
}

/// Extract named columns into a row-major matrix
fn columns_to_array2(df: &DataFrame, names: &[String]) -> Result<Array2<f64>> {
    let columns = names
        .iter()
        .map(|name| column_values(df, name))
        .collect::<Result<Vec<Vec<f64>>>>()?;
    Ok(Array2::from_shape_fn((df.height(), names.len()), |(r, c)| columns[c][r]))
}

/// The two distinct label values, negative (smaller) first
fn binary_classes(values: &[f64], label: &str) -> Result<(f64, f64)> {
    let mut distinct: Vec<f64> = Vec::new();
    for &v in values {
        if !distinct.contains(&v) {
            distinct.push(v);
            if distinct.len() > 2 {
                break;
            }
        }
    }
    match distinct.as_slice() {
        [a, b] => Ok((a.min(*b), a.max(*b))),
        _ => Err(SweepError::Data(format!(
            "label column '{}' must have exactly two classes",
            label
        ))),
    }
}

fn encode_labels(values: &[f64], (negative, positive): (f64, f64), label: &str) -> Result<Array1<f64>> {
    values
        .iter()
        .map(|&v| {
            if v == negative {
                Ok(0.0)
            } else if v == positive {
                Ok(1.0)
            } else {
                Err(SweepError::Data(format!(
                    "label column '{}' has unexpected value {}",
                    label, v
                )))
            }
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, rows: &[(f64, f64, i32)]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "a,b,outcome").unwrap();
        for (a, b, y) in rows {
            writeln!(file, "{},{},{}", a, b, y).unwrap();
        }
        path
    }

    fn rows(n: usize) -> Vec<(f64, f64, i32)> {
        (0..n).map(|i| (i as f64, (i * 2) as f64, (i % 2) as i32)).collect()
    }

    #[test]
    fn test_load_and_split() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_csv(dir.path(), "train.csv", &rows(50));
        let test = write_csv(dir.path(), "test.csv", &rows(10));

        let data = DataLoader::new().load(&train, &test, "outcome").unwrap();
        assert_eq!(data.feature_names, vec!["a", "b"]);
        assert_eq!(data.x_train.nrows() + data.x_test.nrows(), 50);
        assert_eq!(data.metadata.test_rows, 10);
        assert_eq!(data.metadata.train_positive_count, 20);
        assert_eq!(data.x_gen.nrows(), 10);
        assert_eq!(data.labels, ["No outcome".to_string(), "outcome".to_string()]);
        assert_eq!(data.class_values, [0.0, 1.0]);
    }

    #[test]
    fn test_split_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_csv(dir.path(), "train.csv", &rows(40));
        let test = write_csv(dir.path(), "test.csv", &rows(6));
        let a = DataLoader::new().load(&train, &test, "outcome").unwrap();
        let b = DataLoader::new().load(&train, &test, "outcome").unwrap();
        assert_eq!(a.x_test, b.x_test);
    }

    #[test]
    fn test_missing_rows_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "a,outcome").unwrap();
        for i in 0..20 {
            writeln!(file, "{},{}", i, i % 2).unwrap();
        }
        writeln!(file, ",1").unwrap();
        let data = DataLoader::new().load(&path, &path, "outcome").unwrap();
        assert_eq!(data.x_gen.nrows(), 20);
    }

    #[test]
    fn test_load_labeled_uses_training_classes() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<_> = (0..6).map(|i| (i as f64, 1.0, if i % 2 == 0 { 3 } else { 7 })).collect();
        let path = write_csv(dir.path(), "extra.csv", &rows);

        let (x, y) = load_labeled(&path, "outcome", &["b".to_string(), "a".to_string()], [3.0, 7.0]).unwrap();
        assert_eq!(x.ncols(), 2);
        assert_eq!(x[[2, 1]], 2.0);
        assert_eq!(y.to_vec(), vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);

        assert!(load_labeled(&path, "outcome", &["a".to_string()], [0.0, 1.0]).is_err());
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let three: Vec<_> = (0..12).map(|i| (i as f64, 0.0, i % 3)).collect();
        let path = write_csv(dir.path(), "train.csv", &three);
        let err = DataLoader::new().load(&path, &path, "outcome").unwrap_err();
        assert!(matches!(err, SweepError::Data(_)));

        let ok = write_csv(dir.path(), "ok.csv", &rows(12));
        assert!(DataLoader::new().load(&ok, &ok, "missing").is_err());
    }
}
