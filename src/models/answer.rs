use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A free-text answer to one taxonomy node.
///
/// `node_id` is not checked against any built tree: answers for ids that
/// no longer (or never) appear in the taxonomy are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub node_id: String,
    pub value: String,
}

/// A stored answer together with the time it was last written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub node_id: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Input for saving a single answer.
///
/// Both fields are optional at the wire level so that a missing field is a
/// validation error rather than a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerInput {
    pub node_id: Option<String>,
    pub value: Option<String>,
}

/// Input for saving many answers at once, keyed by node id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveAnswersInput {
    pub answers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerResponse {
    pub message: String,
    #[serde(flatten)]
    pub answer: Answer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAnswersResponse {
    pub message: String,
    pub count: usize,
}
