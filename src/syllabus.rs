//! Syllabus data model and the syllabus structurer.
//!
//! The structurer turns a syllabus PDF into the categorization vocabulary
//! the extraction pipeline prompts with: raw page text is extracted with
//! page delimiters, submitted once to a text-only backend call, and every
//! returned fenced block is parsed **strictly** — a syllabus with one
//! corrupt block is rejected outright, because a half-parsed vocabulary
//! would silently miscategorize every question downstream.
//!
//! The persisted artifact is a JSON *list* of trees: each successfully
//! parsed fenced block becomes one element. In practice exactly one element
//! is expected, but the format tolerates more.

use crate::backend::VisionBackend;
use crate::error::PrepscanError;
use crate::pipeline::{fence, render};
use crate::prompts::syllabus_prompt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// The hierarchical unit → topic → sub-topic vocabulary for one syllabus.
///
/// Built once per syllabus document and read-only afterward.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyllabusTree {
    #[serde(default)]
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    #[serde(default)]
    pub unit_no: u32,
    #[serde(default)]
    pub unit_name: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    #[serde(default)]
    pub topic_name: String,
    #[serde(default)]
    pub sub_topics: Vec<String>,
}

impl SyllabusTree {
    /// Topic name → set of sub-topic names.
    ///
    /// When two units declare topics with the same name their sub-topic sets
    /// are merged, so a question categorized under the shared name credits
    /// every sub-topic either unit listed.
    pub fn topic_lookup(&self) -> HashMap<String, BTreeSet<String>> {
        let mut lookup: HashMap<String, BTreeSet<String>> = HashMap::new();
        for unit in &self.units {
            for topic in &unit.topics {
                lookup
                    .entry(topic.topic_name.clone())
                    .or_default()
                    .extend(topic.sub_topics.iter().cloned());
            }
        }
        lookup
    }
}

/// Load a persisted syllabus artifact (a JSON list of trees).
pub fn load_trees(path: &Path) -> Result<Vec<SyllabusTree>, PrepscanError> {
    let text = std::fs::read_to_string(path).map_err(|_| PrepscanError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    serde_json::from_str(&text).map_err(|e| PrepscanError::JsonParse {
        detail: format!("{}: {}", path.display(), e),
    })
}

/// Converts a syllabus PDF into structured [`SyllabusTree`] JSON via the
/// external backend.
pub struct SyllabusStructurer {
    backend: Arc<dyn VisionBackend>,
}

impl SyllabusStructurer {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self { backend }
    }

    /// Extract concatenated page text with `--- Page N ---` delimiters,
    /// optionally persisting the raw text.
    pub async fn extract_text(
        &self,
        pdf_path: &Path,
        out_txt: Option<&Path>,
    ) -> Result<String, PrepscanError> {
        let text = render::extract_document_text(pdf_path).await?;
        if let Some(path) = out_txt {
            std::fs::write(path, &text).map_err(|e| PrepscanError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
            info!("Raw syllabus text saved to {}", path.display());
        }
        Ok(text)
    }

    /// Ask the backend to structure raw syllabus text into trees.
    ///
    /// Zero candidates → [`PrepscanError::NoValidResponse`]; any fenced block
    /// that is not valid JSON aborts the whole conversion (strict-or-nothing).
    pub async fn structure_text(
        &self,
        syllabus_text: &str,
    ) -> Result<Vec<SyllabusTree>, PrepscanError> {
        let prompt = syllabus_prompt(syllabus_text);
        let response = self
            .backend
            .generate(&prompt, None)
            .await
            .map_err(|e| PrepscanError::Internal(format!("Syllabus call failed: {}", e)))?;

        let Some(candidate) = response.candidates.first() else {
            return Err(PrepscanError::NoValidResponse {
                backend: self.backend.name().to_string(),
            });
        };

        let trees: Vec<SyllabusTree> = fence::parse_blocks_strict(&candidate.text)?;
        if trees.is_empty() {
            warn!("Syllabus response contained no fenced JSON blocks");
        }
        Ok(trees)
    }

    /// Full conversion: extract text, structure it, persist both artifacts.
    pub async fn process(
        &self,
        pdf_path: &Path,
        out_txt: Option<&Path>,
        out_json: &Path,
    ) -> Result<Vec<SyllabusTree>, PrepscanError> {
        info!("Extracting text from syllabus: {}", pdf_path.display());
        let text = self.extract_text(pdf_path, out_txt).await?;

        info!("Structuring syllabus text via '{}'", self.backend.name());
        let trees = self.structure_text(&text).await?;

        if let Some(parent) = out_json.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&trees)
            .map_err(|e| PrepscanError::Internal(format!("Syllabus serialisation: {}", e)))?;
        std::fs::write(out_json, json).map_err(|e| PrepscanError::OutputWriteFailed {
            path: out_json.to_path_buf(),
            source: e,
        })?;

        info!("Syllabus JSON saved to {}", out_json.display());
        Ok(trees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, Candidate, FinishReason, GenerateResponse};
    use crate::pipeline::encode::ImagePayload;
    use async_trait::async_trait;

    struct TextBackend {
        reply: String,
    }

    #[async_trait]
    impl VisionBackend for TextBackend {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn generate(
            &self,
            _prompt: &str,
            _image: Option<&ImagePayload>,
        ) -> Result<GenerateResponse, BackendError> {
            if self.reply.is_empty() {
                return Ok(GenerateResponse::default());
            }
            Ok(GenerateResponse {
                candidates: vec![Candidate {
                    text: self.reply.clone(),
                    finish_reason: FinishReason::Stop,
                }],
            })
        }
    }

    fn sample_tree_json() -> &'static str {
        r#"{
  "units": [
    {
      "unit_no": 1,
      "unit_name": "Mechanics",
      "topics": [
        { "topic_name": "Kinematics", "sub_topics": ["Velocity", "Acceleration"] }
      ]
    },
    {
      "unit_no": 2,
      "unit_name": "Waves",
      "topics": [
        { "topic_name": "Kinematics", "sub_topics": ["Wave speed"] },
        { "topic_name": "Sound", "sub_topics": ["Resonance"] }
      ]
    }
  ]
}"#
    }

    #[test]
    fn topic_lookup_merges_collisions_across_units() {
        let tree: SyllabusTree = serde_json::from_str(sample_tree_json()).unwrap();
        let lookup = tree.topic_lookup();

        let kinematics = &lookup["Kinematics"];
        assert!(kinematics.contains("Velocity"));
        assert!(kinematics.contains("Wave speed"));
        assert_eq!(kinematics.len(), 3);
        assert_eq!(lookup["Sound"].len(), 1);
    }

    #[tokio::test]
    async fn structure_text_parses_fenced_tree() {
        let structurer = SyllabusStructurer::new(Arc::new(TextBackend {
            reply: format!("Here you go:\n```json\n{}\n```\n", sample_tree_json()),
        }));
        let trees = structurer.structure_text("raw syllabus").await.unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].units.len(), 2);
    }

    #[tokio::test]
    async fn structure_text_rejects_invalid_block() {
        let structurer = SyllabusStructurer::new(Arc::new(TextBackend {
            reply: "```json\n{broken\n```".into(),
        }));
        let err = structurer.structure_text("raw").await.unwrap_err();
        assert!(matches!(err, PrepscanError::JsonParse { .. }));
    }

    #[tokio::test]
    async fn structure_text_without_candidates_is_no_valid_response() {
        let structurer = SyllabusStructurer::new(Arc::new(TextBackend {
            reply: String::new(),
        }));
        let err = structurer.structure_text("raw").await.unwrap_err();
        assert!(matches!(err, PrepscanError::NoValidResponse { .. }));
    }

    #[test]
    fn load_trees_round_trips_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syllabus.json");
        let tree: SyllabusTree = serde_json::from_str(sample_tree_json()).unwrap();
        std::fs::write(&path, serde_json::to_string(&vec![tree.clone()]).unwrap()).unwrap();

        let loaded = load_trees(&path).unwrap();
        assert_eq!(loaded, vec![tree]);
    }
}
