//! Importance bucketing: partition topics into three tiers by frequency and
//! write per-bucket study artifacts.
//!
//! A topic's bucket is a pure function of its frequency and the global
//! (max, min) range of the current dataset; nothing is stored on the topic
//! itself and the partition is recomputed whenever the dataset changes.
//!
//! The thresholding rule is range-based with integer division:
//! `cut1 = max - range/3`, `cut2 = cut1 - range/3`. When every topic shares
//! one frequency the range is zero, both cuts equal that frequency, and
//! everything lands in the most-important tier — deliberate behavior, not a
//! degenerate-input bug.

use crate::analyze::{rank, FrequencyTable};
use crate::error::PrepscanError;
use crate::records::QuestionRecord;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// One frequency-derived importance tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportanceBucket {
    MostImportant,
    ModeratelyImportant,
    LeastImportant,
}

impl ImportanceBucket {
    pub const ALL: [ImportanceBucket; 3] = [
        ImportanceBucket::MostImportant,
        ImportanceBucket::ModeratelyImportant,
        ImportanceBucket::LeastImportant,
    ];

    /// Directory / file-prefix name for the bucket.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportanceBucket::MostImportant => "most_important",
            ImportanceBucket::ModeratelyImportant => "moderately_important",
            ImportanceBucket::LeastImportant => "least_important",
        }
    }
}

/// The three tiers, each holding (topic, frequency) pairs in descending
/// frequency order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets {
    pub most_important: Vec<(String, u64)>,
    pub moderately_important: Vec<(String, u64)>,
    pub least_important: Vec<(String, u64)>,
}

impl Buckets {
    pub fn get(&self, bucket: ImportanceBucket) -> &[(String, u64)] {
        match bucket {
            ImportanceBucket::MostImportant => &self.most_important,
            ImportanceBucket::ModeratelyImportant => &self.moderately_important,
            ImportanceBucket::LeastImportant => &self.least_important,
        }
    }

    pub fn total_topics(&self) -> usize {
        self.most_important.len() + self.moderately_important.len() + self.least_important.len()
    }
}

/// Partition topics into importance tiers.
///
/// Returns the buckets plus the two numeric cut points `(cut1, cut2)`:
/// `most >= cut1`, `cut2 <= moderate < cut1`, `least < cut2`. Every input
/// topic appears in exactly one bucket. An empty table yields empty buckets
/// and cuts of `(0, 0)`.
pub fn categorize(frequencies: &FrequencyTable) -> (Buckets, (u64, u64)) {
    if frequencies.is_empty() {
        return (Buckets::default(), (0, 0));
    }

    let sorted = rank(frequencies, frequencies.len());
    let max_freq = sorted.first().map(|(_, f)| *f).unwrap_or(0);
    let min_freq = sorted.last().map(|(_, f)| *f).unwrap_or(0);
    let range = max_freq - min_freq;

    let cut1 = max_freq - range / 3;
    let cut2 = cut1 - range / 3;

    let mut buckets = Buckets::default();
    for (topic, freq) in sorted {
        if freq >= cut1 {
            buckets.most_important.push((topic, freq));
        } else if freq >= cut2 {
            buckets.moderately_important.push((topic, freq));
        } else {
            buckets.least_important.push((topic, freq));
        }
    }

    (buckets, (cut1, cut2))
}

/// Per-topic study row: the question columns without categorization fields.
#[derive(Debug, Serialize)]
struct StudyRow<'a> {
    question: Option<&'a str>,
    option_a: Option<&'a str>,
    option_b: Option<&'a str>,
    option_c: Option<&'a str>,
    option_d: Option<&'a str>,
    answer: Option<&'a str>,
    explanation: Option<&'a str>,
}

impl<'a> From<&'a QuestionRecord> for StudyRow<'a> {
    fn from(r: &'a QuestionRecord) -> Self {
        StudyRow {
            question: r.question.as_deref(),
            option_a: r.option_a.as_deref(),
            option_b: r.option_b.as_deref(),
            option_c: r.option_c.as_deref(),
            option_d: r.option_d.as_deref(),
            answer: r.answer.as_deref(),
            explanation: r.explanation.as_deref(),
        }
    }
}

/// Topic label used for bucketing a record; mirrors
/// [`crate::analyze::topic_frequencies`].
fn record_topic(record: &QuestionRecord) -> &str {
    record.topic.as_deref().unwrap_or("Unknown Topic")
}

/// `/` would split a topic into path segments; flatten it.
fn sanitize_topic(topic: &str) -> String {
    topic.replace('/', "_")
}

/// Write the full study plan under `study_dir`.
///
/// Produces `topics.txt` (unique topics, first-seen order), one directory
/// per bucket containing a `<bucket>_topics.csv` summary and one
/// `<topic>.csv` per topic with that topic's question rows. Returns the
/// computed cut points.
pub fn write_study_plan(
    records: &[QuestionRecord],
    study_dir: &Path,
) -> Result<(Buckets, (u64, u64)), PrepscanError> {
    std::fs::create_dir_all(study_dir)?;

    let frequencies = crate::analyze::topic_frequencies(records);

    let topics_file = study_dir.join("topics.txt");
    let unique: Vec<&str> = frequencies.keys().map(String::as_str).collect();
    std::fs::write(&topics_file, unique.join("\n")).map_err(|e| {
        PrepscanError::OutputWriteFailed {
            path: topics_file.clone(),
            source: e,
        }
    })?;

    let (buckets, cuts) = categorize(&frequencies);
    info!(
        "Ranges: most important >= {}, moderately important >= {}, least important < {}",
        cuts.0, cuts.1, cuts.1
    );

    for bucket in ImportanceBucket::ALL {
        let bucket_dir = study_dir.join(bucket.as_str());
        std::fs::create_dir_all(&bucket_dir)?;

        // Summary table of (topic, frequency) pairs.
        let summary_path = bucket_dir.join(format!("{}_topics.csv", bucket.as_str()));
        let mut writer = csv::Writer::from_path(&summary_path)?;
        writer.write_record(["Topic", "Frequency"])?;
        for (topic, freq) in buckets.get(bucket) {
            writer.write_record([topic.as_str(), &freq.to_string()])?;
        }
        writer.flush()?;

        // One question table per topic.
        for (topic, _) in buckets.get(bucket) {
            let topic_path = bucket_dir.join(format!("{}.csv", sanitize_topic(topic)));
            let mut writer = csv::Writer::from_path(&topic_path)?;
            for record in records.iter().filter(|r| record_topic(r) == topic) {
                writer.serialize(StudyRow::from(record))?;
            }
            writer.flush()?;
        }
    }

    info!(
        "Categorized {} topics into {} under {}",
        buckets.total_topics(),
        ImportanceBucket::ALL.map(|b| b.as_str()).join(", "),
        study_dir.display()
    );
    Ok((buckets, cuts))
}
