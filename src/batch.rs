//! Batch driver: one syllabus plus many question PDFs for one tenant.
//!
//! All artifacts land under a tenant-scoped directory, which is what keeps
//! two users' runs isolated: the backend-exhaustion cursor lives inside a
//! single [`QuestionExtractor`] instance, the response logs and output
//! JSONs live under `<workdir>/<tenant>/`, and neither is ever shared.
//!
//! Pacing is a fixed count-then-sleep gate, not a token bucket: after
//! `request_limit` documents the driver sleeps for `cooldown_secs` and
//! resets its count. This is advisory throttling against external rate
//! limits; hard 429s are still handled by the backend fallback chain.

use crate::backend::{GeminiBackend, VisionBackend};
use crate::config::PipelineConfig;
use crate::error::PrepscanError;
use crate::pipeline::extract::QuestionExtractor;
use crate::syllabus::SyllabusStructurer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Resolve the API key for a tenant.
///
/// Checks `GEMINI_API_KEY_FOR_<tenant>` first, then the shared
/// `GEMINI_API_KEY`. Missing both is a configuration error raised before
/// any network call.
pub fn resolve_api_key(tenant: &str) -> Result<String, PrepscanError> {
    let tenant_var = format!("GEMINI_API_KEY_FOR_{}", tenant);
    if let Ok(key) = std::env::var(&tenant_var) {
        if !key.is_empty() {
            return Ok(key);
        }
    }
    match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(PrepscanError::MissingApiKey {
            tenant: tenant.to_string(),
        }),
    }
}

/// True when the pacing gate should engage before the next document.
fn cooldown_due(processed_since_cooldown: usize, request_limit: usize) -> bool {
    processed_since_cooldown >= request_limit
}

/// Artifact paths produced by one batch run.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Tenant-scoped directory every other path lives under.
    pub workdir: PathBuf,
    /// The structured syllabus artifact.
    pub syllabus_json: PathBuf,
    /// One `<stem>_output.json` per processed question PDF, in input order.
    pub artifacts: Vec<PathBuf>,
}

/// Processes a syllabus and a set of question PDFs for one tenant.
pub struct BatchProcessor {
    config: PipelineConfig,
    tenant: String,
    api_key: String,
}

impl BatchProcessor {
    /// Create a processor, resolving the tenant's API key eagerly so a
    /// misconfigured tenant fails before any PDF is touched.
    pub fn new(config: PipelineConfig, tenant: impl Into<String>) -> Result<Self, PrepscanError> {
        let tenant = tenant.into();
        let api_key = resolve_api_key(&tenant)?;
        Ok(Self {
            config,
            tenant,
            api_key,
        })
    }

    /// The tenant-scoped artifact directory.
    pub fn tenant_dir(&self) -> PathBuf {
        self.config.workdir.join(&self.tenant)
    }

    fn extraction_chain(&self) -> Result<Vec<Arc<dyn VisionBackend>>, PrepscanError> {
        self.config
            .models
            .iter()
            .map(|model| {
                GeminiBackend::new(
                    model,
                    &self.api_key,
                    self.config.api_timeout_secs,
                    self.config.temperature,
                    self.config.max_output_tokens,
                )
                .map(|b| Arc::new(b) as Arc<dyn VisionBackend>)
                .map_err(|e| PrepscanError::Internal(format!("Backend init: {}", e)))
            })
            .collect()
    }

    /// Structure the syllabus, then process every question PDF strictly
    /// sequentially with the pacing gate in between.
    pub async fn run(
        &self,
        syllabus_pdf: &Path,
        question_pdfs: &[PathBuf],
    ) -> Result<BatchOutcome, PrepscanError> {
        let tenant_dir = self.tenant_dir();
        std::fs::create_dir_all(&tenant_dir)?;
        info!(
            "Batch run for tenant '{}': {} question PDFs under {}",
            self.tenant,
            question_pdfs.len(),
            tenant_dir.display()
        );

        // Syllabus first: it is the categorization vocabulary for every page.
        let syllabus_backend = Arc::new(
            GeminiBackend::new(
                &self.config.syllabus_model,
                &self.api_key,
                self.config.api_timeout_secs,
                self.config.temperature,
                self.config.max_output_tokens,
            )
            .map_err(|e| PrepscanError::Internal(format!("Backend init: {}", e)))?,
        );
        let structurer = SyllabusStructurer::new(syllabus_backend);
        let syllabus_json = tenant_dir.join("syllabus.json");
        let raw_text = tenant_dir.join("extracted_text.txt");
        structurer
            .process(syllabus_pdf, Some(&raw_text), &syllabus_json)
            .await?;

        // One extractor instance for the whole set: the exhaustion cursor is
        // scoped to this syllabus + PDF set, exactly once.
        let syllabus_content = QuestionExtractor::load_syllabus(&syllabus_json)?;
        let mut scoped_config = self.config.clone();
        scoped_config.workdir = tenant_dir.clone();
        let mut extractor =
            QuestionExtractor::new(self.extraction_chain()?, syllabus_content, scoped_config)?;

        let mut artifacts = Vec::with_capacity(question_pdfs.len());
        let mut processed_since_cooldown = 0usize;

        for pdf in question_pdfs {
            if cooldown_due(processed_since_cooldown, self.config.request_limit) {
                info!(
                    "Reached request limit ({}); cooling down for {}s",
                    self.config.request_limit, self.config.cooldown_secs
                );
                tokio::time::sleep(Duration::from_secs(self.config.cooldown_secs)).await;
                processed_since_cooldown = 0;
            }

            info!("Processing questions from: {}", pdf.display());
            artifacts.push(extractor.run(pdf).await?);
            processed_since_cooldown += 1;
        }

        Ok(BatchOutcome {
            workdir: tenant_dir,
            syllabus_json,
            artifacts,
        })
    }
}
