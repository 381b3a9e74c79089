//! Configuration for the extraction pipeline.
//!
//! Every knob lives in one [`PipelineConfig`] struct built through its
//! [`PipelineConfigBuilder`]. Keeping the configuration in one place makes it
//! trivial to share across a batch run, log it, and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor breaks on every new field. The builder lets callers
//! set only what they care about and rely on documented defaults for the rest.

use crate::error::PrepscanError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a question-extraction pipeline run.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use prepscan::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(300)
///     .models(["gemini-exp-1206", "gemini-1.5-flash"])
///     .request_limit(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 300.
    ///
    /// Exam papers are typically typeset at small point sizes with dense
    /// option lists; 300 DPI keeps sub-scripts and option letters legible to
    /// the vision model. Lower it for large-print papers where upload size
    /// matters more than pixel density.
    pub dpi: u32,

    /// Ordered fallback chain of vision model identifiers. Default:
    /// `["gemini-exp-1206", "gemini-1.5-flash"]`.
    ///
    /// The extraction pipeline submits every page to the first model; on a
    /// transient failure (network error, quota exhaustion) it advances to the
    /// next and retries the same page. The cursor persists for the rest of
    /// the run, so an exhausted model stays excluded for all later pages.
    pub models: Vec<String>,

    /// Model used for the one-shot syllabus structuring call. Default:
    /// `"gemini-1.5-flash"`.
    ///
    /// Structuring is a text-only task; the cheaper flash model is plenty.
    pub syllabus_model: String,

    /// Root directory for per-document artifacts (page images, response logs,
    /// extraction output). Default: `"."`.
    ///
    /// The batch driver scopes this per tenant so two users never share a
    /// response log or output path.
    pub workdir: PathBuf,

    /// Number of question PDFs processed before the pacing gate engages.
    /// Default: 5.
    ///
    /// This is advisory pacing against external rate limits, not a token
    /// bucket: after `request_limit` documents the driver sleeps for
    /// [`cooldown_secs`](Self::cooldown_secs) and resets the count.
    pub request_limit: usize,

    /// Cooldown in seconds after [`request_limit`](Self::request_limit)
    /// documents. Default: 60.
    pub cooldown_secs: u64,

    /// Per-backend-call HTTP timeout in seconds. Default: 120.
    ///
    /// A page submission in flight cannot be cancelled; the timeout is the
    /// only bound on how long one page can hold up the run.
    pub api_timeout_secs: u64,

    /// Sampling temperature for backend completions. Default: 0.1.
    ///
    /// Near-zero keeps the model faithful to what is printed on the page,
    /// which is exactly what transcription wants.
    pub temperature: f32,

    /// Maximum tokens the backend may generate per page. Default: 8192.
    ///
    /// A dense exam page can carry 15+ questions with explanations; setting
    /// this too low silently truncates the JSON mid-object and the block is
    /// then dropped by the post-run parse.
    pub max_output_tokens: usize,

    /// Leaderboard size for frequency analysis. Default: 10.
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            models: vec!["gemini-exp-1206".into(), "gemini-1.5-flash".into()],
            syllabus_model: "gemini-1.5-flash".into(),
            workdir: PathBuf::from("."),
            request_limit: 5,
            cooldown_secs: 60,
            api_timeout_secs: 120,
            temperature: 0.1,
            max_output_tokens: 8192,
            top_n: 10,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn syllabus_model(mut self, model: impl Into<String>) -> Self {
        self.config.syllabus_model = model.into();
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workdir = dir.into();
        self
    }

    pub fn request_limit(mut self, n: usize) -> Self {
        self.config.request_limit = n;
        self
    }

    pub fn cooldown_secs(mut self, secs: u64) -> Self {
        self.config.cooldown_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn top_n(mut self, n: usize) -> Self {
        self.config.top_n = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PrepscanError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(PrepscanError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.models.is_empty() {
            return Err(PrepscanError::InvalidConfig(
                "At least one backend model must be configured".into(),
            ));
        }
        if c.request_limit == 0 {
            return Err(PrepscanError::InvalidConfig(
                "request_limit must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.dpi, 300);
        assert_eq!(config.request_limit, 5);
        assert_eq!(config.cooldown_secs, 60);
        assert_eq!(config.models.len(), 2);
    }

    #[test]
    fn rejects_out_of_range_dpi() {
        let err = PipelineConfig::builder().dpi(10).build().unwrap_err();
        assert!(err.to_string().contains("DPI"));
    }

    #[test]
    fn rejects_empty_model_chain() {
        let err = PipelineConfig::builder()
            .models(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("backend model"));
    }

    #[test]
    fn rejects_zero_request_limit() {
        let err = PipelineConfig::builder().request_limit(0).build().unwrap_err();
        assert!(err.to_string().contains("request_limit"));
    }
}
