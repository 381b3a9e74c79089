//! CLI binary for prepscan.
//!
//! A thin shim over the library crate that maps subcommands and flags to
//! library calls and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use prepscan::{
    load_artifacts, load_trees, read_table, subtopic_frequencies, topic_frequencies,
    write_study_plan, write_table, BatchProcessor, PipelineConfig,
};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full pipeline: syllabus + a directory of question papers for one tenant
  prepscan run syllabus.pdf papers/ --tenant alice

  # Rasterize one PDF to page images
  prepscan rasterize paper_2023.pdf

  # Flatten extraction artifacts into one CSV table
  prepscan tabulate runs/alice -o runs/alice/questions_db.csv

  # Topic and sub-topic leaderboards
  prepscan analyze runs/alice/questions_db.csv --syllabus runs/alice/syllabus.json

  # Importance buckets + per-topic study tables
  prepscan categorize runs/alice/questions_db.csv --study-dir runs/alice/study

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY              Shared Gemini API key
  GEMINI_API_KEY_FOR_<TENANT> Per-tenant key, takes precedence for that tenant
  PREPSCAN_WORKDIR            Root directory for run artifacts
  PDFIUM_DYNAMIC_LIB_PATH     Path to an existing libpdfium build

SETUP:
  1. Set API key:  export GEMINI_API_KEY=...
  2. Run:          prepscan run syllabus.pdf papers/ --tenant alice
"#;

/// Extract and categorize MCQ questions from scanned exam papers.
#[derive(Parser, Debug)]
#[command(
    name = "prepscan",
    version,
    about = "Extract and categorize MCQ questions from scanned exam papers using Vision LLMs",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PREPSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PREPSCAN_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full pipeline: structure the syllabus, extract every question PDF,
    /// tabulate, analyze, and categorize.
    Run {
        /// Path to the syllabus PDF.
        syllabus: PathBuf,

        /// Directory containing question-paper PDFs.
        questions_dir: PathBuf,

        /// Tenant identifier; artifacts land under <workdir>/<tenant>/.
        #[arg(long, env = "PREPSCAN_TENANT")]
        tenant: String,

        /// Root directory for run artifacts.
        #[arg(long, env = "PREPSCAN_WORKDIR", default_value = "runs")]
        workdir: PathBuf,

        /// Rendering DPI (72-600).
        #[arg(long, env = "PREPSCAN_DPI", default_value_t = 300)]
        dpi: u32,

        /// Ordered backend fallback chain of model IDs.
        #[arg(long, env = "PREPSCAN_MODELS", value_delimiter = ',',
              default_values_t = ["gemini-exp-1206".to_string(), "gemini-1.5-flash".to_string()])]
        models: Vec<String>,

        /// Question PDFs processed before the pacing cooldown.
        #[arg(long, env = "PREPSCAN_REQUEST_LIMIT", default_value_t = 5)]
        request_limit: usize,

        /// Cooldown in seconds after hitting the request limit.
        #[arg(long, env = "PREPSCAN_COOLDOWN", default_value_t = 60)]
        cooldown: u64,

        /// Leaderboard size.
        #[arg(long, env = "PREPSCAN_TOP_N", default_value_t = 10)]
        top_n: usize,
    },

    /// Rasterize one PDF into page_<n>.jpg images.
    Rasterize {
        /// Path to the PDF.
        pdf: PathBuf,

        /// Output directory (default: <stem>/images next to the PDF stem).
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Rendering DPI (72-600).
        #[arg(long, default_value_t = 300)]
        dpi: u32,
    },

    /// Flatten *_output.json artifacts in a directory into one CSV table.
    Tabulate {
        /// Directory containing extraction artifacts.
        artifacts_dir: PathBuf,

        /// Output CSV path.
        #[arg(short, long, default_value = "questions_db.csv")]
        output: PathBuf,
    },

    /// Print topic (and optionally sub-topic) leaderboards from a table.
    Analyze {
        /// Question table CSV.
        table: PathBuf,

        /// Structured syllabus JSON; enables the sub-topic leaderboard.
        #[arg(long)]
        syllabus: Option<PathBuf>,

        /// Leaderboard size.
        #[arg(long, default_value_t = 10)]
        top_n: usize,

        /// Also write leaderboard text files next to the table.
        #[arg(long)]
        save: bool,
    },

    /// Partition topics into importance buckets and write study tables.
    Categorize {
        /// Question table CSV.
        table: PathBuf,

        /// Base directory for the categorized output.
        #[arg(long, default_value = "study")]
        study_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run {
            syllabus,
            questions_dir,
            tenant,
            workdir,
            dpi,
            models,
            request_limit,
            cooldown,
            top_n,
        } => {
            let config = PipelineConfig::builder()
                .workdir(workdir)
                .dpi(dpi)
                .models(models)
                .request_limit(request_limit)
                .cooldown_secs(cooldown)
                .top_n(top_n)
                .build()
                .context("Invalid configuration")?;

            let question_pdfs = list_question_pdfs(&questions_dir)?;
            if question_pdfs.is_empty() {
                anyhow::bail!("No PDF files found in {}", questions_dir.display());
            }

            let processor =
                BatchProcessor::new(config, &tenant).context("Tenant configuration failed")?;

            let spinner = (!cli.quiet).then(|| stage_spinner(&format!(
                "Extracting {} question PDFs for tenant '{}'…",
                question_pdfs.len(),
                tenant
            )));

            let outcome = processor
                .run(&syllabus, &question_pdfs)
                .await
                .context("Batch extraction failed")?;

            if let Some(bar) = &spinner {
                bar.set_message("Tabulating and ranking…");
            }

            // Tabulate.
            let artifacts = load_artifacts(&outcome.workdir)?;
            let records = prepscan::flatten(&artifacts);
            let table_path = outcome.workdir.join("questions_db.csv");
            write_table(&records, &table_path)?;

            // Analyze.
            let topic_freqs = topic_frequencies(&records);
            prepscan::analyze::write_leaderboard(
                &topic_freqs,
                top_n,
                &outcome.workdir.join("topic_leaderboard.txt"),
            )?;
            let trees = load_trees(&outcome.syllabus_json)?;
            if let Some(tree) = trees.first() {
                let sub_freqs = subtopic_frequencies(&records, tree);
                prepscan::analyze::write_leaderboard(
                    &sub_freqs,
                    top_n,
                    &outcome.workdir.join("subtopic_leaderboard.txt"),
                )?;
            }

            // Categorize.
            let (buckets, cuts) = write_study_plan(&records, &outcome.workdir.join("study"))?;

            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }

            eprintln!(
                "✔ {} questions across {} documents → {}",
                records.len(),
                outcome.artifacts.len(),
                outcome.workdir.display()
            );
            eprintln!(
                "  importance cuts: most ≥ {}, moderate ≥ {}  ({}/{}/{} topics)",
                cuts.0,
                cuts.1,
                buckets.most_important.len(),
                buckets.moderately_important.len(),
                buckets.least_important.len()
            );
        }

        Command::Rasterize { pdf, out_dir, dpi } => {
            let stem = pdf
                .file_stem()
                .and_then(|s| s.to_str())
                .context("PDF path has no file stem")?;
            let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(stem).join("images"));

            let written = prepscan::pipeline::render::rasterize_pdf(&pdf, &out_dir, dpi)
                .await
                .context("Rasterisation failed")?;
            println!("Saved {} page images to {}", written.len(), out_dir.display());
        }

        Command::Tabulate {
            artifacts_dir,
            output,
        } => {
            let artifacts = load_artifacts(&artifacts_dir)?;
            let records = prepscan::flatten(&artifacts);
            write_table(&records, &output)?;
            println!("Wrote {} rows to {}", records.len(), output.display());
        }

        Command::Analyze {
            table,
            syllabus,
            top_n,
            save,
        } => {
            let records = read_table(&table)?;
            let topic_freqs = topic_frequencies(&records);
            let ranked = prepscan::rank(&topic_freqs, top_n);

            println!("\nTopic leaderboard:");
            println!("Rank | Name                                     | Frequency");
            println!("--------------------------------------------------------");
            println!("{}", prepscan::render_leaderboard(&ranked));
            if save {
                let out = table.with_file_name("topic_leaderboard.txt");
                prepscan::analyze::write_leaderboard(&topic_freqs, top_n, &out)?;
            }

            if let Some(syllabus_path) = syllabus {
                let trees = load_trees(&syllabus_path)?;
                if let Some(tree) = trees.first() {
                    let sub_freqs = subtopic_frequencies(&records, tree);
                    let ranked = prepscan::rank(&sub_freqs, top_n);
                    println!("\nSub-topic leaderboard:");
                    println!("{}", prepscan::render_leaderboard(&ranked));
                    if save {
                        let out = table.with_file_name("subtopic_leaderboard.txt");
                        prepscan::analyze::write_leaderboard(&sub_freqs, top_n, &out)?;
                    }
                }
            }
        }

        Command::Categorize { table, study_dir } => {
            let records = read_table(&table)?;
            let (buckets, cuts) = write_study_plan(&records, &study_dir)?;
            println!(
                "Ranges: most important >= {}, moderately important >= {}, less important < {}",
                cuts.0, cuts.1, cuts.1
            );
            for bucket in prepscan::ImportanceBucket::ALL {
                println!("  {}: {} topics", bucket.as_str(), buckets.get(bucket).len());
            }
        }
    }

    Ok(())
}

/// List `.pdf` files in a directory, sorted for deterministic batch order.
fn list_question_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Cannot read {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}

/// A steady-tick spinner for long stages.
fn stage_spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
