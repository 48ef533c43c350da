//! The category tree of a mix request.
//!
//! The root covers the whole corpus; each child node narrows it with a
//! metadata condition and carries the ratio the mixed sub-corpus must
//! honor. Node sizes are filled from the live-attribute store before
//! solving.

use std::fmt;

use super::expression::ExpressionJoin;

#[derive(Debug, Clone)]
pub struct CategoryTreeNode {
    pub node_id: usize,
    pub parent_id: Option<usize>,
    pub ratio: f64,
    pub metadata_condition: Option<ExpressionJoin>,
    /// Available positions matching the condition; filled by sizing.
    pub size: i64,
    pub children: Vec<CategoryTreeNode>,
}

impl CategoryTreeNode {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

impl fmt::Display for CategoryTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CategoryTreeNode(id: {}, parent: {:?}, ratio: {:.3}, size: {}, num children: {})",
            self.node_id,
            self.parent_id,
            self.ratio,
            self.size,
            self.children.len(),
        )
    }
}

/// Build a two-level tree: the root plus one child per category
/// condition. Ratios are normalized to sum to one.
pub fn build_tree(conditions: Vec<(ExpressionJoin, f64)>) -> CategoryTreeNode {
    let ratio_sum: f64 = conditions.iter().map(|(_, r)| r.max(0.0)).sum();
    let children = conditions
        .into_iter()
        .enumerate()
        .map(|(i, (condition, ratio))| CategoryTreeNode {
            node_id: i + 1,
            parent_id: Some(0),
            ratio: if ratio_sum > 0.0 {
                ratio.max(0.0) / ratio_sum
            } else {
                0.0
            },
            metadata_condition: Some(condition),
            size: 0,
            children: Vec::new(),
        })
        .collect();
    CategoryTreeNode {
        node_id: 0,
        parent_id: None,
        ratio: 1.0,
        metadata_condition: None,
        size: 0,
        children,
    }
}
