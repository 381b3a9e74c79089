//! Frequency analysis: topic and sub-topic counts, ranking, leaderboards.
//!
//! Frequency tables are ephemeral — recomputed from the question table on
//! every analysis run, persisted only as rank-ordered leaderboard text.
//! Tables keep first-seen insertion order ([`indexmap`]), which doubles as
//! the documented tie-break for [`rank`]: equal counts stay in the order
//! their names first appeared in the dataset.

use crate::error::PrepscanError;
use crate::records::QuestionRecord;
use crate::syllabus::SyllabusTree;
use indexmap::IndexMap;
use std::path::Path;
use tracing::info;

/// Name → occurrence count, in first-seen order.
pub type FrequencyTable = IndexMap<String, u64>;

/// Count how many questions fall under each topic.
///
/// Records without a topic are grouped under `"Unknown Topic"`.
pub fn topic_frequencies(records: &[QuestionRecord]) -> FrequencyTable {
    let mut table = FrequencyTable::new();
    for record in records {
        let topic = record.topic.as_deref().unwrap_or("Unknown Topic");
        *table.entry(topic.to_string()).or_insert(0) += 1;
    }
    table
}

/// Count sub-topic exposure based on the syllabus vocabulary.
///
/// Questions are categorized at topic granularity only, so each question
/// credits every sub-topic of its topic once. Records whose topic is not in
/// the syllabus contribute nothing.
pub fn subtopic_frequencies(records: &[QuestionRecord], tree: &SyllabusTree) -> FrequencyTable {
    let lookup = tree.topic_lookup();
    let mut table = FrequencyTable::new();
    for record in records {
        let Some(topic) = record.topic.as_deref() else {
            continue;
        };
        let Some(sub_topics) = lookup.get(topic) else {
            continue;
        };
        for sub_topic in sub_topics {
            *table.entry(sub_topic.clone()).or_insert(0) += 1;
        }
    }
    table
}

/// Rank a frequency table descending by count, keeping at most `top_n`
/// entries. Ties preserve the table's first-seen order (stable sort).
///
/// Reapplying `rank` to a table built from its own output is a no-op.
pub fn rank(table: &FrequencyTable, top_n: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> =
        table.iter().map(|(name, &count)| (name.clone(), count)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(top_n);
    entries
}

/// Render ranked entries as fixed-width leaderboard lines:
/// rank right-justified to 4, name left-justified to 40.
pub fn render_leaderboard(ranked: &[(String, u64)]) -> String {
    ranked
        .iter()
        .enumerate()
        .map(|(i, (name, freq))| format!("{:>4} | {:<40} | {}", i + 1, name, freq))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rank a table and persist its leaderboard.
pub fn write_leaderboard(
    table: &FrequencyTable,
    top_n: usize,
    path: &Path,
) -> Result<(), PrepscanError> {
    let ranked = rank(table, top_n);
    let rendered = render_leaderboard(&ranked);
    std::fs::write(path, rendered).map_err(|e| PrepscanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!("Leaderboard ({} entries) saved to {}", ranked.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syllabus::{Topic, Unit};

    fn record(topic: Option<&str>) -> QuestionRecord {
        QuestionRecord {
            topic: topic.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn topic_counts_and_unknown_bucket() {
        let records = vec![
            record(Some("Optics")),
            record(Some("Optics")),
            record(None),
            record(Some("Waves")),
        ];
        let table = topic_frequencies(&records);
        assert_eq!(table["Optics"], 2);
        assert_eq!(table["Unknown Topic"], 1);
        assert_eq!(table["Waves"], 1);
    }

    #[test]
    fn subtopic_counts_credit_each_subtopic_per_question() {
        let tree = SyllabusTree {
            units: vec![Unit {
                unit_no: 1,
                unit_name: "Light".into(),
                topics: vec![Topic {
                    topic_name: "Optics".into(),
                    sub_topics: vec!["Refraction".into(), "Lenses".into()],
                }],
            }],
        };
        let records = vec![
            record(Some("Optics")),
            record(Some("Optics")),
            record(Some("Not In Syllabus")),
        ];
        let table = subtopic_frequencies(&records, &tree);
        assert_eq!(table["Refraction"], 2);
        assert_eq!(table["Lenses"], 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn rank_is_descending_and_bounded() {
        let mut table = FrequencyTable::new();
        table.insert("A".into(), 3);
        table.insert("B".into(), 9);
        table.insert("C".into(), 5);

        let ranked = rank(&table, 2);
        assert_eq!(
            ranked,
            vec![("B".to_string(), 9), ("C".to_string(), 5)]
        );
    }

    #[test]
    fn rank_tie_break_is_first_seen_order() {
        let mut table = FrequencyTable::new();
        table.insert("First".into(), 4);
        table.insert("Second".into(), 4);
        table.insert("Third".into(), 4);

        let ranked = rank(&table, 10);
        let names: Vec<&str> = ranked.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn rank_is_idempotent_on_its_own_output() {
        let mut table = FrequencyTable::new();
        table.insert("A".into(), 7);
        table.insert("B".into(), 7);
        table.insert("C".into(), 2);

        let once = rank(&table, 10);
        let rebuilt: FrequencyTable = once.iter().cloned().collect();
        assert_eq!(rank(&rebuilt, 10), once);
    }

    #[test]
    fn leaderboard_renders_fixed_width_columns() {
        let ranked = vec![
            ("Thermodynamics".to_string(), 12),
            ("Optics".to_string(), 5),
        ];
        let rendered = render_leaderboard(&ranked);
        let lines: Vec<&str> = rendered.lines().collect();
        // Rank right-justified to 4, name left-justified to 40.
        assert_eq!(lines[0], format!("   1 | Thermodynamics{} | 12", " ".repeat(26)));
        assert_eq!(lines[1], format!("   2 | Optics{} | 5", " ".repeat(34)));
    }

    #[test]
    fn long_names_are_not_truncated() {
        let name = "A".repeat(50);
        let rendered = render_leaderboard(&[(name.clone(), 1)]);
        assert!(rendered.contains(&name));
    }
}
