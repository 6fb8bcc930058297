//! Content-derived identifiers for nodes, topics and subtopics.
//!
//! Each identifier is the hex SHA-256 of a domain tag followed by its input
//! fields, every field prefixed with its byte length. The length prefix keeps
//! the encoding injective, so `("a-b", "c")` and `("a", "b-c")` never share an
//! id, and the tag keeps node, topic and subtopic ids apart.
//!
//! A node id depends on `(topic, subtopic, question label)` only. Two rows
//! asking the same question under the same subtopic share an id, and
//! therefore share an answer, wherever they sit in the tree.

use sha2::{Digest, Sha256};

use crate::models::NodeId;

const NODE_TAG: &[u8] = b"node";
const TOPIC_TAG: &[u8] = b"topic";
const SUBTOPIC_TAG: &[u8] = b"subtopic";

fn digest(tag: &[u8], fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    for field in fields {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Identifier of the node for a `(topic, subtopic, label)` triple.
pub fn node_id(topic: &str, subtopic: &str, label: &str) -> NodeId {
    NodeId::new(digest(NODE_TAG, &[topic, subtopic, label]))
}

pub fn topic_id(topic: &str) -> String {
    digest(TOPIC_TAG, &[topic])
}

/// Subtopic ids are scoped by topic: the same subtopic name under two
/// topics yields two ids.
pub fn subtopic_id(topic: &str, subtopic: &str) -> String {
    digest(SUBTOPIC_TAG, &[topic, subtopic])
}
