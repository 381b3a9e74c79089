//! Question data model and the tabular loader.
//!
//! The extraction pipeline persists per-page [`PageExtraction`] artifacts;
//! this module flattens them into [`QuestionRecord`] rows and persists the
//! combined set as a delimited table, the unit of consumption for frequency
//! analysis and categorization.
//!
//! Every field of [`Question`] is optional: the backend emits best-effort
//! JSON and absent fields must stay absent (empty cells in the table), never
//! the string `"None"` or a fabricated default.

use crate::error::PrepscanError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// One extracted multiple-choice question, as emitted by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Question {
    #[serde(default)]
    pub question_no: Option<i64>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub category: Category,
}

/// Option letters a–d. Four entries are expected but not enforced.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Options {
    #[serde(default)]
    pub a: Option<String>,
    #[serde(default)]
    pub b: Option<String>,
    #[serde(default)]
    pub c: Option<String>,
    #[serde(default)]
    pub d: Option<String>,
}

/// Syllabus placement assigned by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Category {
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

/// One page's worth of extracted questions — one per parsed fenced block.
///
/// A page with no questions is a legal, empty extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageExtraction {
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// One flattened row of the question table. No nested structures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuestionRecord {
    pub question_no: Option<i64>,
    pub question: Option<String>,
    pub option_a: Option<String>,
    pub option_b: Option<String>,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    pub answer: Option<String>,
    pub explanation: Option<String>,
    pub unit: Option<String>,
    pub topic: Option<String>,
}

impl From<Question> for QuestionRecord {
    fn from(q: Question) -> Self {
        QuestionRecord {
            question_no: q.question_no,
            question: q.question,
            option_a: q.options.a,
            option_b: q.options.b,
            option_c: q.options.c,
            option_d: q.options.d,
            answer: q.answer,
            explanation: q.explanation,
            unit: q.category.unit,
            topic: q.category.topic,
        }
    }
}

/// Flatten extraction artifacts into rows, preserving input order.
pub fn flatten(artifacts: &[Vec<PageExtraction>]) -> Vec<QuestionRecord> {
    artifacts
        .iter()
        .flatten()
        .flat_map(|page| page.questions.iter().cloned())
        .map(QuestionRecord::from)
        .collect()
}

/// Load every `*_output.json` artifact under `dir`, in lexicographic order.
///
/// Lexicographic ordering keeps repeated runs deterministic; the row order
/// within one artifact is the page order the extraction pipeline wrote.
pub fn load_artifacts(dir: &Path) -> Result<Vec<Vec<PageExtraction>>, PrepscanError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_output.json"))
        })
        .collect();
    paths.sort();

    let mut artifacts = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(&path)?;
        let pages: Vec<PageExtraction> =
            serde_json::from_str(&text).map_err(|e| PrepscanError::JsonParse {
                detail: format!("{}: {}", path.display(), e),
            })?;
        info!("Loaded {} page extractions from {}", pages.len(), path.display());
        artifacts.push(pages);
    }
    Ok(artifacts)
}

/// Persist records as a CSV table with the fixed header.
///
/// An empty record set succeeds with a warning — the file still gets its
/// header row so downstream readers see a well-formed, empty table.
pub fn write_table(records: &[QuestionRecord], path: &Path) -> Result<(), PrepscanError> {
    if records.is_empty() {
        warn!(
            "No question records to write; emitting header-only table at {}",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    if records.is_empty() {
        // Serde-driven headers only appear when at least one row is written.
        writer.write_record([
            "question_no",
            "question",
            "option_a",
            "option_b",
            "option_c",
            "option_d",
            "answer",
            "explanation",
            "unit",
            "topic",
        ])?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!("Wrote {} question rows to {}", records.len(), path.display());
    Ok(())
}

/// Read a question table back into records.
///
/// Empty cells deserialize to `None`, so a write/read round-trip reproduces
/// every present field verbatim and every absent field as absent.
pub fn read_table(path: &Path) -> Result<Vec<QuestionRecord>, PrepscanError> {
    if !path.exists() {
        return Err(PrepscanError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question() -> Question {
        Question {
            question_no: Some(7),
            question: Some("Which law relates pressure and volume?".into()),
            options: Options {
                a: Some("Boyle's law".into()),
                b: Some("Charles's law".into()),
                c: Some("Ohm's law".into()),
                d: Some("Hooke's law".into()),
            },
            answer: Some("a".into()),
            explanation: Some("At constant temperature, PV is constant.".into()),
            category: Category {
                unit: Some("Thermal Physics".into()),
                topic: Some("Gas Laws".into()),
            },
        }
    }

    #[test]
    fn flatten_preserves_input_order() {
        let artifacts = vec![
            vec![
                PageExtraction {
                    questions: vec![
                        Question {
                            question_no: Some(1),
                            ..Default::default()
                        },
                        Question {
                            question_no: Some(2),
                            ..Default::default()
                        },
                    ],
                },
                PageExtraction::default(),
            ],
            vec![PageExtraction {
                questions: vec![Question {
                    question_no: Some(3),
                    ..Default::default()
                }],
            }],
        ];

        let rows = flatten(&artifacts);
        let nos: Vec<_> = rows.iter().map(|r| r.question_no).collect();
        assert_eq!(nos, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn question_deserialises_with_missing_fields() {
        let raw = r#"{"question": "Define entropy."}"#;
        let q: Question = serde_json::from_str(raw).unwrap();
        assert_eq!(q.question.as_deref(), Some("Define entropy."));
        assert!(q.question_no.is_none());
        assert!(q.options.a.is_none());
        assert!(q.category.topic.is_none());
    }

    #[test]
    fn csv_round_trip_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.csv");

        let full: QuestionRecord = sample_question().into();
        let sparse = QuestionRecord {
            question: Some("Orphan question".into()),
            ..Default::default()
        };

        write_table(&[full.clone(), sparse.clone()], &path).unwrap();
        let back = read_table(&path).unwrap();

        assert_eq!(back.len(), 2);
        assert_eq!(back[0], full);
        assert_eq!(back[1], sparse);
        // Absent stays absent — never the string "None".
        assert!(back[1].answer.is_none());
    }

    #[test]
    fn empty_table_succeeds_with_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        write_table(&[], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("question_no,question,option_a"));
        assert_eq!(text.lines().count(), 1);
        assert!(read_table(&path).unwrap().is_empty());
    }

    #[test]
    fn load_artifacts_is_lexicographic() {
        let dir = tempfile::tempdir().unwrap();
        for (name, no) in [("b_output.json", 2), ("a_output.json", 1)] {
            let pages = vec![PageExtraction {
                questions: vec![Question {
                    question_no: Some(no),
                    ..Default::default()
                }],
            }];
            std::fs::write(dir.path().join(name), serde_json::to_string(&pages).unwrap()).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let artifacts = load_artifacts(dir.path()).unwrap();
        let rows = flatten(&artifacts);
        assert_eq!(
            rows.iter().map(|r| r.question_no).collect::<Vec<_>>(),
            vec![Some(1), Some(2)]
        );
    }
}
