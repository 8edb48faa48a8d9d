use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use simcull::core::compare;
use simcull::core::corpus::{self, Corpus, ProgressCallback};
use simcull::core::fingerprint::Extractor;
use simcull::services::report::{Report, ReportFormat, match_groups};
use simcull::services::scanner;
use simcull::Config;

#[derive(Parser, Debug)]
#[command(name = "simcull", version, about = "Find visually similar photos")]
struct Cli {
    /// JSON config file; flags override its values
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log per-image detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find and list groups of similar images
    Scan {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Hide images that matched nothing but themselves
        #[arg(long)]
        only_duplicates: bool,
        #[command(flatten)]
        tuning: Tuning,
    },

    /// Write match groups to an HTML or JSON report
    Report {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Report file to write
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = ReportFormat::Html)]
        format: ReportFormat,
        /// Hide images that matched nothing but themselves
        #[arg(long)]
        only_duplicates: bool,
        #[command(flatten)]
        tuning: Tuning,
    },

    /// Compare two images and show the per-channel verdicts
    Compare {
        first: PathBuf,
        second: PathBuf,
        #[command(flatten)]
        tuning: Tuning,
    },
}

#[derive(Args, Debug)]
struct Tuning {
    /// Longer side of the normalized raster
    #[arg(long, value_name = "PX")]
    max_dimension: Option<u32>,
    /// Grid cell target; each axis gets half of it
    #[arg(long, value_name = "N")]
    split_quadrants: Option<u32>,
    /// Similarity threshold in (0, 1]
    #[arg(long)]
    threshold: Option<f64>,
    /// Share of distinct colors dropped as background
    #[arg(long, value_name = "FRACTION")]
    background_fraction: Option<f64>,
    /// Cap on the number of images considered
    #[arg(long, value_name = "N", conflicts_with = "no_limit")]
    max_images: Option<usize>,
    /// Consider every image found
    #[arg(long)]
    no_limit: bool,
    /// Comma separated file extensions to include
    #[arg(long, value_delimiter = ',', value_name = "EXT")]
    extensions: Option<Vec<String>>,
}

impl Tuning {
    fn apply(&self, config: &mut Config) {
        if let Some(v) = self.max_dimension {
            config.max_dimension = v;
        }
        if let Some(v) = self.split_quadrants {
            config.split_quadrants = v;
        }
        if let Some(v) = self.threshold {
            config.similarity_threshold = v;
        }
        if let Some(v) = self.background_fraction {
            config.background_removal_fraction = v;
        }
        if self.no_limit {
            config.max_images = None;
        } else if let Some(v) = self.max_images {
            config.max_images = Some(v);
        }
        if let Some(v) = &self.extensions {
            config.extensions = v.clone();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Scan {
            path,
            only_duplicates,
            tuning,
        } => {
            let config = load_config(cli.config.as_deref(), &tuning)?;
            println!("▶ Scanning for similar images in: {}", path.display());
            let corpus = build_corpus(&path, &config)?;

            let groups = match_groups(&corpus, only_duplicates);
            if corpus.is_empty() {
                println!("No images could be processed.");
            } else if groups.is_empty() {
                println!("No similar images found.");
            } else {
                println!("Found {} match group(s):", groups.len());
                for (i, group) in groups.iter().enumerate() {
                    println!(" Group {}:", i + 1);
                    for peer in &group.members {
                        println!("   ▶ {}", peer.path);
                    }
                }
            }
            print_failures(&corpus);
        }

        Commands::Report {
            path,
            out,
            format,
            only_duplicates,
            tuning,
        } => {
            let config = load_config(cli.config.as_deref(), &tuning)?;
            println!("▶ Building report for: {}", path.display());
            let corpus = build_corpus(&path, &config)?;

            let report = Report::new(&corpus, &config, only_duplicates);
            report
                .write(&out, format)
                .with_context(|| format!("Failed to write report {:?}", out))?;
            println!(
                "\n✅ Wrote {} group(s) to {}",
                report.groups.len(),
                out.display()
            );
            print_failures(&corpus);
        }

        Commands::Compare {
            first,
            second,
            tuning,
        } => {
            let config = load_config(cli.config.as_deref(), &tuning)?;
            let extractor = Extractor::new(&config);
            let tolerance = config.tolerance();

            let a = corpus::fingerprint_file(&first, &config, &extractor)
                .with_context(|| format!("Failed to fingerprint {:?}", first))?;
            let b = corpus::fingerprint_file(&second, &config, &extractor)
                .with_context(|| format!("Failed to fingerprint {:?}", second))?;

            println!("First:  {} ({}x{})", a.path, a.width, a.height);
            println!("Second: {} ({}x{})", b.path, b.width, b.height);
            let names = ["red", "green", "blue"];
            for ((name, x), y) in names
                .iter()
                .zip(a.fingerprint.channels())
                .zip(b.fingerprint.channels())
            {
                println!(
                    "  {:<5} totals {:>10} / {:<10} within threshold: {}",
                    name,
                    x.total(),
                    y.total(),
                    compare::within_threshold(x, y, tolerance)
                );
            }
            let similar = compare::similar(&a.fingerprint, &b.fingerprint, tolerance);
            println!("Are both images similar?: {}", similar);
        }
    }

    Ok(())
}

fn load_config(file: Option<&Path>, tuning: &Tuning) -> Result<Config> {
    let mut config = match file {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => Config::default(),
    };
    tuning.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    log::debug!("using {:?}", config);
    Ok(config)
}

/// Discover images under `dir`, fingerprint them in parallel and match them.
fn build_corpus(dir: &Path, config: &Config) -> Result<Corpus> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let images = scanner::scan_directory(dir, &config.extensions)
        .with_context(|| format!("Failed to scan {:?}", dir))?;
    spinner.finish_with_message(format!("Found {} image(s)", images.len()));

    let total = config
        .max_images
        .map_or(images.len(), |cap| cap.min(images.len()));
    println!("▶ Parallel fingerprinting {} images…", total);

    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {wide_msg}")?
            .progress_chars("##-"),
    );
    let bar_handle = bar.clone();
    let callback: ProgressCallback = Box::new(move |progress| {
        bar_handle.set_message(progress.current_file);
        bar_handle.inc(1);
    });

    let corpus = benchmark("fingerprinting and matching", || {
        Corpus::build_with_progress(images, config, Some(&callback))
    })?;
    bar.finish_and_clear();
    Ok(corpus)
}

fn print_failures(corpus: &Corpus) {
    if corpus.failures.is_empty() {
        return;
    }
    println!("\n⚠️  Skipped {} file(s):", corpus.failures.len());
    for failure in &corpus.failures {
        println!("   ✗ {}: {}", failure.path, failure.error);
    }
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
