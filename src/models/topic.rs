use serde::{Deserialize, Serialize};

/// A distinct topic and the distinct subtopics seen under it, both in
/// first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub id: String,
    pub name: String,
    pub subtopics: Vec<SubtopicSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtopicSummary {
    pub id: String,
    pub name: String,
}
