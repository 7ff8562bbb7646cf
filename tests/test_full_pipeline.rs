//! Integration test: sweep from CSV files to report

use kolosal_sweep::config::SweepSettings;
use kolosal_sweep::job::{run_job, JobOutcome, JobRequest, NoopObserver, CancellationToken, REPORT_FILE};
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Two Gaussian-ish blobs over five features, labels alternating 0/1
fn classification_df(rows: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let label: Vec<i64> = (0..rows).map(|i| (i % 2) as i64).collect();
    let mut columns: Vec<Column> = (0..5)
        .map(|j| {
            let values: Vec<f64> = label
                .iter()
                .map(|&y| y as f64 * (1.0 + j as f64 * 0.3) + rng.gen_range(-1.0..1.0))
                .collect();
            Series::new(format!("f{}", j).into(), values).into()
        })
        .collect();
    columns.push(Series::new("outcome".into(), label).into());
    DataFrame::new(columns).unwrap()
}

fn write_csv(dir: &Path, name: &str, mut df: DataFrame) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
    path
}

fn small_job(dir: &Path) -> JobRequest {
    let train = write_csv(dir, "train.csv", classification_df(100, 1));
    let test = write_csv(dir, "test.csv", classification_df(20, 2));
    JobRequest::new(train, test, "outcome")
        .with_job_id("e2e")
        .with_parameter("ignore_scaler", "minmax,maxabs,robust")
        .with_parameter(
            "ignore_feature_selector",
            "select-75,select-50,select-25,mi-75,mi-50,mi-25,pca-80,pca-90",
        )
        .with_parameter("ignore_estimator", "knn,svm")
        .with_parameter("ignore_searcher", "grid,random")
        .with_parameter("ignore_scorer", "roc_auc,f1_macro")
}

fn read_report(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (header, rows)
}

fn column<'a>(header: &[String], row: &'a [String], name: &str) -> &'a str {
    let i = header.iter().position(|h| h == name).unwrap();
    &row[i]
}

#[test]
fn test_end_to_end_small_space() {
    let dir = tempfile::tempdir().unwrap();
    let settings = SweepSettings::new().with_jobs_dir(dir.path().join("jobs"));
    let request = small_job(dir.path());

    let outcome = run_job(&request, &settings, &NoopObserver, &CancellationToken::new()).unwrap();
    let sweep = match outcome {
        JobOutcome::Completed(sweep) => sweep,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(sweep.total_candidates, 2 * 1 * 2 * 1 * 1);
    assert_eq!(sweep.rows_written, 4);
    assert!(sweep.failures.is_empty());

    let (header, rows) = read_report(&settings.job_dir("e2e").join(REPORT_FILE));
    assert_eq!(rows.len(), 4);

    let keys: HashSet<&str> = rows.iter().map(|r| column(&header, r, "key")).collect();
    assert_eq!(keys.len(), 4);

    for row in &rows {
        let features: Vec<String> = serde_json::from_str(column(&header, row, "selected_features")).unwrap();
        assert_eq!(features.len(), 5);

        for split in ["test", "generalization"] {
            let tpr: Vec<f64> = serde_json::from_str(column(&header, row, &format!("{}_tpr", split))).unwrap();
            assert!(tpr.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(tpr.last().copied(), Some(1.0));
        }

        let fop: Vec<f64> = serde_json::from_str(column(&header, row, "generalization_fop")).unwrap();
        for value in fop {
            assert_eq!((value * 10_000.0).round() / 10_000.0, value);
        }

        let tn: usize = column(&header, row, "tn").parse().unwrap();
        let tp: usize = column(&header, row, "tp").parse().unwrap();
        let fn_: usize = column(&header, row, "fn").parse().unwrap();
        let fp: usize = column(&header, row, "fp").parse().unwrap();
        assert_eq!(tn + tp + fn_ + fp, 20);
    }
}

#[test]
fn test_report_schema_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let settings = SweepSettings::new()
        .with_jobs_dir(dir.path().join("jobs"))
        .with_cv_folds(3)
        .with_random_search_iterations(2);
    let request = small_job(dir.path())
        .with_job_id("schema")
        .with_parameter("ignore_estimator", "")
        .with_parameter("ignore_searcher", "grid")
        .with_parameter("ignore_feature_selector", "select-75,select-25,mi-75,mi-25,pca-80")
        .with_parameter("ignore_scaler", "minmax,maxabs,robust,none");

    let outcome = run_job(&request, &settings, &NoopObserver, &CancellationToken::new()).unwrap();
    let sweep = match outcome {
        JobOutcome::Completed(sweep) => sweep,
        other => panic!("unexpected outcome {:?}", other),
    };
    // 4 models x 1 normalizer x 4 reductions x 2 searchers x 1 metric
    assert_eq!(sweep.total_candidates, 32);
    assert_eq!(sweep.rows_written + sweep.failures.len(), 32);

    let (header, rows) = read_report(&settings.job_dir("schema").join(REPORT_FILE));
    assert_eq!(&header[..6], &["key", "scaler", "feature_selector", "estimator", "searcher", "scorer"]);
    assert!(rows.iter().all(|r| r.len() == header.len()));

    // Tuned and untuned rows share the header; untuned rows leave train scores empty
    let untuned = rows
        .iter()
        .find(|r| column(&header, r, "key").contains("__nb__"))
        .unwrap();
    assert_eq!(column(&header, untuned, "train_score"), "");
    let tuned = rows
        .iter()
        .find(|r| column(&header, r, "key").ends_with("__lr__random__accuracy"))
        .unwrap();
    assert!(column(&header, tuned, "train_score").parse::<f64>().is_ok());

    let mi = rows
        .iter()
        .find(|r| column(&header, r, "key").contains("__mi-50__"))
        .unwrap();
    let features: Vec<String> = serde_json::from_str(column(&header, mi, "selected_features")).unwrap();
    assert!(!features.is_empty() && features.len() < 5);
}
