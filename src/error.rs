//! Error types for the prepscan library.
//!
//! A single fatal error enum covers the whole pipeline. The taxonomy follows
//! how failures surface to the caller:
//!
//! * **Configuration errors** (missing API key, missing input file) are raised
//!   before any network call and never retried.
//! * **Transient backend errors** never appear here directly — the extraction
//!   pipeline consumes them by advancing to the next configured backend. Only
//!   when every backend has failed does the run abort with
//!   [`PrepscanError::BackendsExhausted`].
//! * **Parse errors** are fatal for the syllabus structurer; the extraction
//!   pipeline's post-run parse instead skips the offending block and logs it.
//! * **Empty results** (a page with no questions, an empty merged table) are
//!   warnings, not errors, and never reach this enum.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the prepscan library.
#[derive(Debug, Error)]
pub enum PrepscanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Backend errors ────────────────────────────────────────────────────
    /// No API key configured for the requesting tenant.
    #[error(
        "No API key for tenant '{tenant}'.\n\
         Set GEMINI_API_KEY_FOR_{tenant} or GEMINI_API_KEY in the environment."
    )]
    MissingApiKey { tenant: String },

    /// Every configured backend failed on the same page.
    ///
    /// The backend cursor only ever advances, so once a run reaches this
    /// state no later page can succeed either: the whole run aborts.
    #[error("All {total} backends exhausted on page {page}.\nLast error: {last_error}")]
    BackendsExhausted {
        page: usize,
        total: usize,
        last_error: String,
    },

    /// The backend answered but produced no usable candidate.
    #[error("No valid response from backend '{backend}'")]
    NoValidResponse { backend: String },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// A fenced block was present but did not contain valid JSON.
    #[error("Failed to parse JSON from response: {detail}")]
    JsonParse { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic I/O failure (response log, table reads, directory listing).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encode/decode failure in the tabular store.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
