//! The extraction pipeline: per-page backend calls, response logging, and
//! post-run parsing.
//!
//! ## Backend fallback
//!
//! A [`QuestionExtractor`] owns an ordered backend chain and a cursor into
//! it. A transient failure (network error, quota, malformed response)
//! advances the cursor and retries the *same page* against the next backend;
//! the cursor never moves backwards, so a backend that failed once stays
//! excluded for every later page of the run. Exhausting the chain is fatal
//! for the whole run. The cursor is instance state — two extractors for two
//! tenants never share it.
//!
//! ## The response log
//!
//! Each page's raw backend output is appended verbatim to
//! `<stem>_responses.txt` and flushed before the next page is submitted.
//! This log is the durability boundary: if the process dies mid-run, the
//! completed pages' responses survive on disk and can be re-parsed without
//! resubmitting them. One append is one write event, not one text line —
//! responses routinely contain embedded newlines from markdown formatting.
//!
//! A page the backend refuses (blocked-for-recitation, or no candidates at
//! all) is recorded as the fenced empty-questions payload, so the post-run
//! parse counts it as zero questions rather than dropping it silently.

use crate::backend::VisionBackend;
use crate::config::PipelineConfig;
use crate::error::PrepscanError;
use crate::pipeline::{encode, fence, render};
use crate::prompts::{extraction_prompt, EMPTY_QUESTIONS_PAYLOAD};
use crate::records::PageExtraction;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Drives question extraction for one document set against one syllabus.
pub struct QuestionExtractor {
    backends: Vec<Arc<dyn VisionBackend>>,
    cursor: usize,
    syllabus_content: String,
    config: PipelineConfig,
}

impl std::fmt::Debug for QuestionExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionExtractor")
            .field("backends", &self.backends.len())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl QuestionExtractor {
    /// Create an extractor over an ordered backend fallback chain.
    pub fn new(
        backends: Vec<Arc<dyn VisionBackend>>,
        syllabus_content: impl Into<String>,
        config: PipelineConfig,
    ) -> Result<Self, PrepscanError> {
        if backends.is_empty() {
            return Err(PrepscanError::InvalidConfig(
                "At least one backend is required".into(),
            ));
        }
        Ok(Self {
            backends,
            cursor: 0,
            syllabus_content: syllabus_content.into(),
            config,
        })
    }

    /// Load the structured syllabus text used for categorization prompts.
    pub fn load_syllabus(path: &Path) -> Result<String, PrepscanError> {
        std::fs::read_to_string(path).map_err(|_| PrepscanError::FileNotFound {
            path: path.to_path_buf(),
        })
    }

    /// Index of the backend currently at the front of the fallback chain.
    pub fn backend_cursor(&self) -> usize {
        self.cursor
    }

    /// Process one page image: submit to the current backend and append the
    /// raw response to the log.
    ///
    /// On a backend error the chain cursor advances and the same page is
    /// retried; the loop (not recursion) bounds the worst case at one attempt
    /// per remaining backend.
    pub async fn process_page(
        &mut self,
        image_path: &Path,
        page_num: usize,
        response_log: &Path,
    ) -> Result<(), PrepscanError> {
        let image = encode::encode_image_file(image_path)?;
        let prompt = extraction_prompt(&self.syllabus_content);

        let mut last_error = String::new();

        while self.cursor < self.backends.len() {
            let backend = &self.backends[self.cursor];
            match backend.generate(&prompt, Some(&image)).await {
                Ok(response) => {
                    let raw = match response.usable_text() {
                        Some(text) => text.to_string(),
                        None => {
                            warn!(
                                "Page {}: backend '{}' returned no usable candidate; recording empty extraction",
                                page_num,
                                backend.name()
                            );
                            EMPTY_QUESTIONS_PAYLOAD.to_string()
                        }
                    };
                    append_response(response_log, &raw).await?;
                    return Ok(());
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        "Page {}: backend '{}' failed ({}); switching to next backend",
                        page_num,
                        backend.name(),
                        last_error
                    );
                    self.cursor += 1;
                }
            }
        }

        Err(PrepscanError::BackendsExhausted {
            page: page_num,
            total: self.backends.len(),
            last_error,
        })
    }

    /// Extract every question from a question-paper PDF.
    ///
    /// Rasterises the PDF into a per-document image directory, processes each
    /// page strictly sequentially in numeric page order, then re-parses the
    /// full response log and persists the merged artifact. Returns the path
    /// of the `<stem>_output.json` artifact.
    pub async fn run(&mut self, pdf_path: &Path) -> Result<PathBuf, PrepscanError> {
        let stem = pdf_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                PrepscanError::Internal(format!("No file stem in {}", pdf_path.display()))
            })?
            .to_string();

        let doc_dir = self.config.workdir.join(&stem);
        let image_dir = doc_dir.join("images");
        render::rasterize_pdf(pdf_path, &image_dir, self.config.dpi).await?;

        let response_log = self.config.workdir.join(format!("{}_responses.txt", stem));
        tokio::fs::write(&response_log, b"").await?;

        let pages = render::sorted_page_images(&image_dir)?;
        info!("Processing {} pages from {}", pages.len(), pdf_path.display());

        for (idx, page) in pages.iter().enumerate() {
            self.process_page(page, idx + 1, &response_log).await?;
        }

        let extractions = parse_response_log(&response_log)?;
        let questions: usize = extractions.iter().map(|p| p.questions.len()).sum();
        if questions == 0 {
            warn!("No questions extracted from {}", pdf_path.display());
        }

        let output_path = self.config.workdir.join(format!("{}_output.json", stem));
        let json = serde_json::to_string_pretty(&extractions)
            .map_err(|e| PrepscanError::Internal(format!("Artifact serialisation: {}", e)))?;
        std::fs::write(&output_path, json).map_err(|e| PrepscanError::OutputWriteFailed {
            path: output_path.clone(),
            source: e,
        })?;

        info!(
            "Extracted {} questions across {} pages → {}",
            questions,
            extractions.len(),
            output_path.display()
        );
        Ok(output_path)
    }
}

/// Append one raw backend response to the log as a single write event.
///
/// The handle is flushed and closed before returning: everything before this
/// point survives a crash during the next page.
async fn append_response(log_path: &Path, raw: &str) -> Result<(), PrepscanError> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .await?;
    file.write_all(raw.as_bytes()).await?;
    file.write_all(b"\n").await?;
    file.flush().await?;
    Ok(())
}

/// Re-parse an entire response log into per-block page extractions.
///
/// Each fenced block parses independently; an invalid block is logged and
/// skipped rather than voiding the whole log.
pub fn parse_response_log(log_path: &Path) -> Result<Vec<PageExtraction>, PrepscanError> {
    let content = std::fs::read_to_string(log_path)?;
    Ok(fence::parse_blocks_lenient(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, Candidate, FinishReason, GenerateResponse};
    use crate::pipeline::encode::ImagePayload;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that always fails with a transient error.
    struct FailingBackend {
        name: String,
        calls: AtomicUsize,
    }

    impl FailingBackend {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VisionBackend for FailingBackend {
        fn name(&self) -> &str {
            &self.name
        }
        async fn generate(
            &self,
            _prompt: &str,
            _image: Option<&ImagePayload>,
        ) -> Result<GenerateResponse, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Api {
                status: 429,
                body: "quota exceeded".into(),
            })
        }
    }

    /// Backend that replies with a fixed text and finish reason.
    struct ScriptedBackend {
        name: String,
        text: String,
        finish_reason: FinishReason,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(name: &str, text: &str, finish_reason: FinishReason) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                text: text.into(),
                finish_reason,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VisionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            &self.name
        }
        async fn generate(
            &self,
            _prompt: &str,
            _image: Option<&ImagePayload>,
        ) -> Result<GenerateResponse, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GenerateResponse {
                candidates: vec![Candidate {
                    text: self.text.clone(),
                    finish_reason: self.finish_reason.clone(),
                }],
            })
        }
    }

    fn test_config(dir: &Path) -> PipelineConfig {
        PipelineConfig::builder().workdir(dir).build().unwrap()
    }

    fn fake_page(dir: &Path) -> PathBuf {
        let path = dir.join("page_1.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        path
    }

    #[tokio::test]
    async fn fallback_reaches_third_backend_and_cursor_sticks() {
        let dir = tempfile::tempdir().unwrap();
        let page = fake_page(dir.path());
        let log = dir.path().join("responses.txt");

        let fail_1 = FailingBackend::new("model-a");
        let fail_2 = FailingBackend::new("model-b");
        let ok = ScriptedBackend::new(
            "model-c",
            "```json\n{\"questions\": []}\n```",
            FinishReason::Stop,
        );

        let mut extractor = QuestionExtractor::new(
            vec![fail_1.clone(), fail_2.clone(), ok.clone()],
            "syllabus",
            test_config(dir.path()),
        )
        .unwrap();

        extractor.process_page(&page, 1, &log).await.unwrap();
        assert_eq!(extractor.backend_cursor(), 2);
        assert_eq!(ok.calls.load(Ordering::SeqCst), 1);

        // A second page goes straight to backend 3 — the exhausted backends
        // stay excluded for the rest of the run.
        extractor.process_page(&page, 2, &log).await.unwrap();
        assert_eq!(fail_1.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fail_2.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ok.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausting_all_backends_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let page = fake_page(dir.path());
        let log = dir.path().join("responses.txt");

        let mut extractor = QuestionExtractor::new(
            vec![FailingBackend::new("a"), FailingBackend::new("b")],
            "syllabus",
            test_config(dir.path()),
        )
        .unwrap();

        let err = extractor.process_page(&page, 1, &log).await.unwrap_err();
        match err {
            PrepscanError::BackendsExhausted { page, total, .. } => {
                assert_eq!(page, 1);
                assert_eq!(total, 2);
            }
            other => panic!("expected BackendsExhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn recitation_block_records_fenced_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        let page = fake_page(dir.path());
        let log = dir.path().join("responses.txt");

        let blocked = ScriptedBackend::new("model-a", "verbatim textbook", FinishReason::Recitation);
        let mut extractor =
            QuestionExtractor::new(vec![blocked], "syllabus", test_config(dir.path())).unwrap();

        extractor.process_page(&page, 1, &log).await.unwrap();

        // The fallback payload is fenced, so it parses as zero questions
        // instead of vanishing from the final output.
        let extractions = parse_response_log(&log).unwrap();
        assert_eq!(extractions.len(), 1);
        assert!(extractions[0].questions.is_empty());
    }

    #[tokio::test]
    async fn response_log_accumulates_across_pages() {
        let dir = tempfile::tempdir().unwrap();
        let page = fake_page(dir.path());
        let log = dir.path().join("responses.txt");

        let two = "```json\n{\"questions\": [{\"question_no\": 1}, {\"question_no\": 2}]}\n```";
        let backend = ScriptedBackend::new("model-a", two, FinishReason::Stop);
        let mut extractor =
            QuestionExtractor::new(vec![backend], "syllabus", test_config(dir.path())).unwrap();

        extractor.process_page(&page, 1, &log).await.unwrap();
        extractor.process_page(&page, 2, &log).await.unwrap();

        let extractions = parse_response_log(&log).unwrap();
        let total: usize = extractions.iter().map(|p| p.questions.len()).sum();
        assert_eq!(extractions.len(), 2);
        assert_eq!(total, 4);
    }

    #[test]
    fn three_fenced_blocks_yield_three_questions() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("responses.txt");
        std::fs::write(
            &log,
            "```json\n{\"questions\": [{\"question_no\": 1}, {\"question_no\": 2}]}\n```\n\
             ```json\n{\"questions\": []}\n```\n\
             ```json\n{\"questions\": [{\"question_no\": 3}]}\n```\n",
        )
        .unwrap();

        let extractions = parse_response_log(&log).unwrap();
        let total: usize = extractions.iter().map(|p| p.questions.len()).sum();
        assert_eq!(extractions.len(), 3);
        assert_eq!(total, 3);
    }

    #[test]
    fn empty_backend_list_is_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = QuestionExtractor::new(Vec::new(), "syllabus", test_config(dir.path()))
            .unwrap_err();
        assert!(matches!(err, PrepscanError::InvalidConfig(_)));
    }
}
