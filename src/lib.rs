//! # prepscan
//!
//! Extract multiple-choice questions from scanned exam-paper PDFs with a
//! vision LLM, categorize them against a syllabus, and rank topics by how
//! often examiners actually ask about them.
//!
//! This is a best-effort ETL pipeline around a non-deterministic external
//! service: pages are rasterised, shown to a vision model together with the
//! structured syllabus, and the model's JSON-in-markdown replies are logged,
//! parsed, flattened into a question table, and bucketed into importance
//! tiers.
//!
//! ## Pipeline Overview
//!
//! ```text
//! syllabus.pdf ──▶ structurer ──▶ syllabus.json ─────────┐
//!                                                        ▼
//! paper.pdf ──▶ rasterize ──▶ encode ──▶ backend chain ──▶ response log
//!               (pdfium)     (base64)   (Gemini, with      │
//!                                        fallback)         ▼
//!                                              fenced-JSON parse
//!                                                        │
//!            study plan ◀── categorize ◀── analyze ◀── question table (CSV)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prepscan::{BatchProcessor, PipelineConfig};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .workdir("runs")
//!         .build()?;
//!     // API key from GEMINI_API_KEY_FOR_alice or GEMINI_API_KEY
//!     let processor = BatchProcessor::new(config, "alice")?;
//!     let outcome = processor
//!         .run(
//!             "syllabus.pdf".as_ref(),
//!             &[PathBuf::from("paper_2023.pdf"), PathBuf::from("paper_2024.pdf")],
//!         )
//!         .await?;
//!     println!("artifacts: {:?}", outcome.artifacts);
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees (and non-guarantees)
//!
//! The append-only response log is the durability boundary: pages already
//! processed survive a crash and can be re-parsed without resubmission.
//! There is no exactly-once extraction, no schema validation beyond
//! best-effort JSON parsing, and no correctness guarantee on the model's
//! categorization — downstream ranking is only as good as the model's reads.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod backend;
pub mod batch;
pub mod categorize;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod records;
pub mod syllabus;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{rank, render_leaderboard, subtopic_frequencies, topic_frequencies, FrequencyTable};
pub use backend::{Candidate, FinishReason, GeminiBackend, GenerateResponse, VisionBackend};
pub use batch::{resolve_api_key, BatchOutcome, BatchProcessor};
pub use categorize::{categorize, write_study_plan, Buckets, ImportanceBucket};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::PrepscanError;
pub use pipeline::extract::QuestionExtractor;
pub use records::{flatten, load_artifacts, read_table, write_table, PageExtraction, Question, QuestionRecord};
pub use syllabus::{load_trees, SyllabusStructurer, SyllabusTree};
