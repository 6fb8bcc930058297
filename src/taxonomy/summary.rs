//! Topic and subtopic summary of a row sequence.

use std::collections::HashSet;

use crate::models::{SubtopicSummary, TaxonomyRow, TopicSummary};
use crate::taxonomy::identity;

/// Group rows by topic, listing each topic and each of its subtopics once,
/// in the order they first appear.
///
/// Works on raw rows, so rows the tree builder would drop or reject still
/// contribute their topic and subtopic.
pub fn summarize(rows: &[TaxonomyRow]) -> Vec<TopicSummary> {
    let mut topics: Vec<TopicSummary> = Vec::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for row in rows {
        let position = match topics.iter().position(|t| t.name == row.topic) {
            Some(position) => position,
            None => {
                topics.push(TopicSummary {
                    id: identity::topic_id(&row.topic),
                    name: row.topic.clone(),
                    subtopics: Vec::new(),
                });
                topics.len() - 1
            }
        };

        if seen.insert((row.topic.as_str(), row.subtopic.as_str())) {
            topics[position].subtopics.push(SubtopicSummary {
                id: identity::subtopic_id(&row.topic, &row.subtopic),
                name: row.subtopic.clone(),
            });
        }
    }

    topics
}
