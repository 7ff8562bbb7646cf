//! Kolosal Sweep CLI Module
//!
//! Command-line interface for running pipeline searches and reading their reports.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::{SearchParameters, SweepSettings};
use crate::data::DataLoader;
use crate::export::{create_model, ExportedModel, ModelRequest, MODEL_FILE, MODEL_METRICS_FILE};
use crate::enumerator::list_pipelines;
use crate::job::{JobManager, JobOutcome, JobRequest, METADATA_FILE, REPORT_FILE};
use crate::registry::Registry;
use crate::report::summarize_report;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-sweep")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Exhaustive pipeline search for binary classification")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Exclusions and search options shared by `search` and `pipelines`
#[derive(Args, Debug, Clone, Default)]
pub struct SearchOptions {
    /// Comma-separated model ids to skip (lr, knn, nb, svm)
    #[arg(long, default_value = "")]
    pub ignore_estimator: String,

    /// Comma-separated feature reduction ids to skip
    #[arg(long, default_value = "")]
    pub ignore_feature_selector: String,

    /// Comma-separated normalizer ids to skip
    #[arg(long, default_value = "")]
    pub ignore_scaler: String,

    /// Comma-separated search strategy ids to skip (none, grid, random)
    #[arg(long, default_value = "")]
    pub ignore_searcher: String,

    /// Comma-separated scoring metric ids to skip
    #[arg(long, default_value = "")]
    pub ignore_scorer: String,

    /// Do not shuffle cross-validation folds
    #[arg(long)]
    pub no_shuffle: bool,

    /// Custom search ranges as JSON, e.g. '{"grid": {"knn": {"n_neighbors": [3, 5]}}}'
    #[arg(long)]
    pub hyper_parameters: Option<String>,
}

impl SearchOptions {
    /// Job parameter map equivalent to these options
    pub fn to_parameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        for (key, value) in [
            ("ignore_estimator", &self.ignore_estimator),
            ("ignore_feature_selector", &self.ignore_feature_selector),
            ("ignore_scaler", &self.ignore_scaler),
            ("ignore_searcher", &self.ignore_searcher),
            ("ignore_scorer", &self.ignore_scorer),
        ] {
            if !value.trim().is_empty() {
                params.insert(key.to_string(), value.clone());
            }
        }
        if self.no_shuffle {
            params.insert("ignore_shuffle".to_string(), "true".to_string());
        }
        if let Some(raw) = &self.hyper_parameters {
            params.insert("hyper_parameters".to_string(), raw.clone());
        }
        params
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate every pipeline on a dataset
    Search {
        /// Training data (CSV); split into train and test
        #[arg(long)]
        train: PathBuf,

        /// Generalization data (CSV)
        #[arg(long)]
        test: PathBuf,

        /// Binary label column
        #[arg(short, long)]
        label: String,

        /// Job id; a completed job with the same id is not rerun
        #[arg(long)]
        job_id: Option<String>,

        /// Parent directory for job outputs (overrides JOBS_DIR)
        #[arg(long)]
        jobs_dir: Option<PathBuf>,

        /// Number of cross-validation folds (overrides CV_FOLDS)
        #[arg(long)]
        cv_folds: Option<usize>,

        #[command(flatten)]
        options: SearchOptions,
    },

    /// List the pipelines a search would evaluate
    Pipelines {
        #[command(flatten)]
        options: SearchOptions,
    },

    /// Refit one report candidate and save it with its held-out metrics
    Create {
        /// Training data (CSV) the search was run on
        #[arg(long)]
        train: PathBuf,

        /// Generalization data (CSV)
        #[arg(long)]
        test: PathBuf,

        /// Binary label column
        #[arg(short, long)]
        label: String,

        /// Candidate key from the report
        #[arg(short, long)]
        key: String,

        /// Job whose report provides the parameters and features
        #[arg(long)]
        job_id: Option<String>,

        /// Parent directory for job outputs (overrides JOBS_DIR)
        #[arg(long)]
        jobs_dir: Option<PathBuf>,

        /// Hyperparameters as JSON, e.g. '{"n_neighbors": 5}'
        #[arg(long)]
        params: Option<String>,

        /// Comma-separated selected features
        #[arg(long)]
        features: Option<String>,

        /// Output directory (defaults to the job directory, or the current one)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate an exported model on labelled data
    Assess {
        /// Exported model file
        #[arg(long)]
        model: PathBuf,

        /// Labelled data (CSV) with the model's feature columns
        #[arg(long)]
        data: PathBuf,
    },

    /// Rank the rows of a report
    Summary {
        /// Report CSV file
        report: PathBuf,

        /// Number of rows to show
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_search(
    train: PathBuf,
    test: PathBuf,
    label: String,
    job_id: Option<String>,
    jobs_dir: Option<PathBuf>,
    cv_folds: Option<usize>,
    options: &SearchOptions,
) -> anyhow::Result<()> {
    let mut settings = SweepSettings::from_env();
    if let Some(dir) = jobs_dir {
        settings = settings.with_jobs_dir(dir);
    }
    if let Some(folds) = cv_folds {
        settings = settings.with_cv_folds(folds);
    }

    let mut request = JobRequest::new(train, test, label).with_parameters(options.to_parameters());
    if let Some(id) = job_id {
        request = request.with_job_id(id);
    }
    let job_dir = settings.job_dir(&request.job_id);

    println!();
    line_box_top();
    line_box(&format!("{}", "Kolosal Sweep".white().bold()));
    line_box(&kv("Job     ", &request.job_id));
    line_box(&kv("Output  ", &job_dir.display().to_string()));
    line_box(&kv("CV folds", &settings.cv_folds.to_string()));
    line_box_bottom();

    let (manager, mut progress) = JobManager::with_progress_channel(settings);
    let start = Instant::now();
    let mut submission = manager.submit(request)?;
    step_ok(&format!("{} pipelines queued", submission.pipelines.len()));

    let job_id = submission.job_id.clone();
    let outcome = loop {
        tokio::select! {
            result = &mut submission.handle => break result??,
            Some(event) = progress.recv() => {
                print!("\r  {} {}/{} configurations", accent("›"), event.completed, event.total);
                let _ = std::io::stdout().flush();
            }
            _ = tokio::signal::ctrl_c() => {
                if manager.cancel(&job_id) {
                    println!();
                    println!("  {}", "Cancelling after the current candidate...".yellow());
                }
            }
        }
    };
    println!();

    match outcome {
        JobOutcome::AlreadyCompleted => {
            step_ok("Job already completed, nothing to do");
        }
        JobOutcome::AlreadyRunning => {
            step_ok("Job is already running, nothing to do");
        }
        JobOutcome::Cancelled(sweep) => {
            println!(
                "  {} {} of {} candidates written before cancellation",
                "!".yellow(),
                sweep.rows_written,
                sweep.total_candidates
            );
        }
        JobOutcome::Completed(sweep) => {
            step_ok(&format!(
                "{} candidates in {:.1}s ({} fits, {} failed)",
                sweep.rows_written,
                start.elapsed().as_secs_f64(),
                sweep.total_fits(),
                sweep.failures.len()
            ));
            if let Some(best) = sweep.summary.best() {
                section("Best model");
                println!("  {:<12} {}", muted("Key"), best.key.cyan());
                println!("  {:<12} {}", muted("ROC AUC"), format!("{:.4}", best.auc).white().bold());
                println!("  {:<12} {:.4}", muted("Accuracy"), best.accuracy);
                println!("  {:<12} {:.4}", muted("F1"), best.f1);
            }
        }
    }

    println!();
    println!("  {:<12} {}", muted("Report"), job_dir.join(REPORT_FILE).display());
    println!("  {:<12} {}", muted("Metadata"), job_dir.join(METADATA_FILE).display());
    println!();
    Ok(())
}

pub fn cmd_pipelines(options: &SearchOptions) -> anyhow::Result<()> {
    section("Pipelines");

    let params = SearchParameters::from_map(&options.to_parameters())?;
    let pipelines = list_pipelines(Registry::standard(), &params)?;
    for (key, name) in &pipelines {
        println!("  {:<40} {}", key.cyan(), dim(name));
    }

    println!();
    println!("  {} {}", muted("Total"), pipelines.len().to_string().white().bold());
    println!();
    Ok(())
}

/// Arguments of the `create` command
pub struct CreateArgs {
    pub train: PathBuf,
    pub test: PathBuf,
    pub label: String,
    pub key: String,
    pub job_id: Option<String>,
    pub jobs_dir: Option<PathBuf>,
    pub params: Option<String>,
    pub features: Option<String>,
    pub output: Option<PathBuf>,
}

impl CreateArgs {
    /// Export request: report values first, explicit flags on top
    pub fn to_request(&self, settings: &SweepSettings) -> anyhow::Result<ModelRequest> {
        let mut request = match &self.job_id {
            Some(id) if self.params.is_none() || self.features.is_none() => {
                ModelRequest::from_report(settings.job_dir(id).join(REPORT_FILE), &self.key)?
            }
            _ => ModelRequest::new(self.key.clone()),
        };
        if let Some(raw) = &self.params {
            request.best_params = serde_json::from_str(raw)?;
        }
        if let Some(raw) = &self.features {
            request.selected_features = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(request)
    }
}

pub fn cmd_create(args: CreateArgs) -> anyhow::Result<()> {
    let mut settings = SweepSettings::from_env();
    if let Some(dir) = &args.jobs_dir {
        settings = settings.with_jobs_dir(dir.clone());
    }
    let request = args.to_request(&settings)?;
    let output = match (&args.output, &args.job_id) {
        (Some(dir), _) => dir.clone(),
        (None, Some(id)) => settings.job_dir(id),
        (None, None) => PathBuf::from("."),
    };

    section("Create model");
    step_run("Loading data");
    let dataset = DataLoader::new()
        .with_test_size(settings.test_size)
        .with_random_state(settings.random_seed)
        .load(&args.train, &args.test, &args.label)?;
    step_done(&format!("{} training rows", dataset.metadata.train_rows));

    step_run(&format!("Fitting {}", args.key));
    let (model, report) = create_model(&request, &dataset, &output, settings.random_seed)?;
    step_done(&model.name);

    println!();
    println!("  {:<12} {}", muted("Features"), model.features.join(", "));
    println!("  {:<12} {}", muted("ROC AUC"), format!("{:.4}", report.generalization.auc).white().bold());
    println!("  {:<12} {:.4}", muted("Accuracy"), report.generalization.accuracy);
    println!("  {:<12} {:.4}", muted("F1"), report.generalization.f1);
    println!("  {:<12} {}", muted("Model"), output.join(MODEL_FILE).display());
    println!("  {:<12} {}", muted("Metrics"), output.join(MODEL_METRICS_FILE).display());
    println!();
    Ok(())
}

pub fn cmd_assess(model: &PathBuf, data: &PathBuf) -> anyhow::Result<()> {
    section("Assess");

    step_run(&format!("Loading {}", model.display()));
    let exported = ExportedModel::load(model)?;
    step_done(&exported.name);

    let assessment = exported.assess_file(data)?;
    println!();
    println!("  {:<12} {}", muted("Rows"), assessment.rows);
    println!("  {:<12} {}", muted("ROC AUC"), format!("{:.4}", assessment.metrics.auc).white().bold());
    println!("  {:<12} {:.4}", muted("Accuracy"), assessment.metrics.accuracy);
    println!("  {:<12} {:.4}", muted("F1"), assessment.metrics.f1);
    println!("  {:<12} {:.4}", muted("Brier"), assessment.reliability.brier_score);
    println!();
    Ok(())
}

pub fn cmd_summary(report: &PathBuf, top: usize) -> anyhow::Result<()> {
    section("Summary");

    step_run(&format!("Reading {}", report.display()));
    let summary = summarize_report(report)?;
    step_done(&format!("{} rows", summary.len()));
    println!();

    println!(
        "  {:<4} {:<40} {:>8} {:>8} {:>8}",
        muted("#"),
        muted("Key"),
        muted("AUC"),
        muted("Acc"),
        muted("F1")
    );
    println!("  {}", dim(&"─".repeat(72)));
    for (rank, entry) in summary.ranked.iter().take(top).enumerate() {
        println!(
            "  {:<4} {:<40} {:>8.4} {:>8.4} {:>8.4}",
            rank + 1,
            entry.key,
            entry.auc,
            entry.accuracy,
            entry.f1
        );
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_to_parameters() {
        let options = SearchOptions {
            ignore_estimator: "knn, svm".into(),
            no_shuffle: true,
            ..Default::default()
        };
        let params = options.to_parameters();
        assert_eq!(params.get("ignore_estimator").map(String::as_str), Some("knn, svm"));
        assert!(!params.contains_key("ignore_scaler"));

        let parsed = SearchParameters::from_map(&params).unwrap();
        assert!(!parsed.shuffle);
        assert!(parsed.ignore_estimator.contains("svm"));
    }

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "kolosal-sweep",
            "search",
            "--train",
            "train.csv",
            "--test",
            "test.csv",
            "--label",
            "outcome",
            "--ignore-searcher",
            "random",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { label, options, .. } => {
                assert_eq!(label, "outcome");
                assert_eq!(options.ignore_searcher, "random");
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_create_flags_override_report() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SweepSettings::new().with_jobs_dir(dir.path());
        let job_dir = settings.job_dir("job");
        std::fs::create_dir_all(&job_dir).unwrap();
        std::fs::write(
            job_dir.join(REPORT_FILE),
            "key,best_params,selected_features\n\
             std__select-50__knn__grid__accuracy,\"{\"\"n_neighbors\"\":3}\",\"[\"\"b\"\"]\"\n",
        )
        .unwrap();

        let args = CreateArgs {
            train: "train.csv".into(),
            test: "test.csv".into(),
            label: "outcome".into(),
            key: "std__select-50__knn__grid__accuracy".into(),
            job_id: Some("job".into()),
            jobs_dir: None,
            params: None,
            features: Some("a, c".into()),
            output: None,
        };
        let request = args.to_request(&settings).unwrap();
        assert_eq!(request.best_params.len(), 1);
        assert_eq!(request.selected_features, vec!["a", "c"]);

        let missing = CreateArgs {
            key: "std__none__lr__grid__accuracy".into(),
            features: None,
            ..args
        };
        assert!(missing.to_request(&settings).is_err());
    }
}
