//! ASCII tree rendering for question forests.

use std::collections::BTreeMap;

use crate::models::TaxonomyNode;

const ANSWERED: char = '●';
const UNANSWERED: char = '○';

/// Render a forest as ASCII art, marking each question as answered or not.
///
/// Example output:
/// ```text
/// ○ Total GHG emissions
/// ├── ● Scope 1
/// └── ○ Scope 2
///     └── ○ Market-based
/// ● Board size
/// ```
pub fn render_tree(nodes: &[TaxonomyNode], answers: &BTreeMap<String, String>) -> String {
    let mut output = String::new();
    for (i, node) in nodes.iter().enumerate() {
        let is_last = i == nodes.len() - 1;
        render_node(&mut output, node, answers, "", is_last, true);
    }
    output
}

fn render_node(
    output: &mut String,
    node: &TaxonomyNode,
    answers: &BTreeMap<String, String>,
    prefix: &str,
    is_last: bool,
    is_root: bool,
) {
    if !is_root {
        output.push_str(prefix);
        output.push_str(if is_last { "└── " } else { "├── " });
    }
    let symbol = if answers.contains_key(node.id.as_str()) {
        ANSWERED
    } else {
        UNANSWERED
    };
    output.push(symbol);
    output.push(' ');
    output.push_str(&node.question_label);
    output.push('\n');

    // Children of a root start flush left under it
    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    for (i, child) in node.children.iter().enumerate() {
        let child_is_last = i == node.children.len() - 1;
        render_node(output, child, answers, &child_prefix, child_is_last, false);
    }
}
