// src/models/category.rs

//! Category tree (root, country, league, season) and the paths that key matches.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Ordered label sequence identifying where a match was found.
///
/// Equality and hashing are structural, so a path works both as a grouping
/// key and as a display key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryPath(Vec<String>);

impl CategoryPath {
    pub fn new(labels: Vec<String>) -> Self {
        Self(labels)
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Label at `index`, or an empty string when the path is shorter.
    pub fn label(&self, index: usize) -> &str {
        self.0.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn country(&self) -> &str {
        self.label(1)
    }

    pub fn league(&self) -> &str {
        self.label(2)
    }

    pub fn season(&self) -> &str {
        self.label(3)
    }

    fn child(&self, label: &str) -> Self {
        let mut labels = self.0.clone();
        labels.push(label.to_string());
        Self(labels)
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" / "))
    }
}

impl From<Vec<&str>> for CategoryPath {
    fn from(labels: Vec<&str>) -> Self {
        Self(labels.into_iter().map(str::to_string).collect())
    }
}

/// One node of the discovered category tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
    /// Display label
    pub label: String,

    /// Listing URL, present on leaves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    pub fn branch(label: impl Into<String>, children: Vec<CategoryNode>) -> Self {
        Self {
            label: label.into(),
            url: None,
            children,
        }
    }

    pub fn leaf(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: Some(url.into()),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Count leaves below (and including) this node.
    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(CategoryNode::leaf_count).sum()
        }
    }

    /// Expand this node to its leaf categories.
    ///
    /// `parent` is the path of the node's parent and `order` its 1-based
    /// position among its siblings.
    pub fn leaves(&self, parent: &CategoryPath, order: usize) -> Vec<LeafCategory> {
        let mut out = Vec::new();
        self.collect_leaves(parent, order, &mut out);
        out
    }

    fn collect_leaves(&self, parent: &CategoryPath, order: usize, out: &mut Vec<LeafCategory>) {
        let path = parent.child(&self.label);
        if self.is_leaf() {
            match &self.url {
                Some(url) => out.push(LeafCategory {
                    path,
                    url: url.clone(),
                    order,
                }),
                None => log::warn!("Leaf category {} has no listing URL, skipping", path),
            }
            return;
        }
        for (index, child) in self.children.iter().enumerate() {
            child.collect_leaves(&path, index + 1, out);
        }
    }

    /// Load a category forest from a JSON file.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// A concrete, fetchable match listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCategory {
    pub path: CategoryPath,
    pub url: String,
    /// 1-based position among siblings
    pub order: usize,
}

/// Resolve user selections (label paths from a root) to leaf categories.
///
/// An empty selection list selects every root. Leaves reached through
/// overlapping selections are returned once, in first-reached order.
pub fn select_leaves(roots: &[CategoryNode], selections: &[Vec<String>]) -> Result<Vec<LeafCategory>> {
    let mut leaves = Vec::new();

    if selections.is_empty() {
        for (index, root) in roots.iter().enumerate() {
            leaves.extend(root.leaves(&CategoryPath::default(), index + 1));
        }
    } else {
        for selection in selections {
            let (parent, node, order) = find_node(roots, selection).ok_or_else(|| {
                AppError::validation(format!("Unknown category '{}'", selection.join(" / ")))
            })?;
            leaves.extend(node.leaves(&parent, order));
        }
    }

    let mut seen = HashSet::new();
    leaves.retain(|leaf| seen.insert(leaf.url.clone()));
    Ok(leaves)
}

/// Walk `labels` down from the roots, returning the parent path, node and sibling order.
fn find_node<'a>(
    roots: &'a [CategoryNode],
    labels: &[String],
) -> Option<(CategoryPath, &'a CategoryNode, usize)> {
    let mut parent = CategoryPath::default();
    let mut siblings = roots;
    let mut found: Option<(CategoryPath, &'a CategoryNode, usize)> = None;

    for label in labels {
        if let Some((_, node, _)) = found {
            parent = parent.child(&node.label);
            siblings = &node.children;
        }
        let (index, node) = siblings
            .iter()
            .enumerate()
            .find(|(_, n)| n.label.eq_ignore_ascii_case(label.trim()))?;
        found = Some((parent.clone(), node, index + 1));
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Vec<CategoryNode> {
        vec![CategoryNode::branch(
            "National",
            vec![
                CategoryNode::branch(
                    "England",
                    vec![CategoryNode::branch(
                        "Premier League",
                        vec![
                            CategoryNode::leaf("2023/2024", "https://example.com/pl/2023/results/"),
                            CategoryNode::leaf("2022/2023", "https://example.com/pl/2022/results/"),
                        ],
                    )],
                ),
                CategoryNode::branch(
                    "Spain",
                    vec![CategoryNode::branch(
                        "La Liga",
                        vec![CategoryNode::leaf("2023/2024", "https://example.com/ll/2023/results/")],
                    )],
                ),
            ],
        )]
    }

    #[test]
    fn test_leaves_carry_path_and_sibling_order() {
        let roots = sample_tree();
        let leaves = roots[0].leaves(&CategoryPath::default(), 1);
        assert_eq!(leaves.len(), 3);
        assert_eq!(
            leaves[1].path,
            CategoryPath::from(vec!["National", "England", "Premier League", "2022/2023"])
        );
        assert_eq!(leaves[0].order, 1);
        assert_eq!(leaves[1].order, 2);
        assert_eq!(leaves[2].order, 1);
    }

    #[test]
    fn test_select_nested_node() {
        let roots = sample_tree();
        let selection = vec![vec![
            "National".to_string(),
            "England".to_string(),
            "Premier League".to_string(),
        ]];
        let leaves = select_leaves(&roots, &selection).unwrap();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].path.league(), "Premier League");
        assert_eq!(leaves[0].path.country(), "England");
    }

    #[test]
    fn test_select_single_leaf_keeps_its_order() {
        let roots = sample_tree();
        let selection = vec![vec![
            "National".to_string(),
            "England".to_string(),
            "Premier League".to_string(),
            "2022/2023".to_string(),
        ]];
        let leaves = select_leaves(&roots, &selection).unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].order, 2);
        assert_eq!(leaves[0].path.season(), "2022/2023");
    }

    #[test]
    fn test_overlapping_selection_is_deduplicated() {
        let roots = sample_tree();
        let selection = vec![
            vec!["National".to_string()],
            vec!["National".to_string(), "Spain".to_string()],
        ];
        let leaves = select_leaves(&roots, &selection).unwrap();
        assert_eq!(leaves.len(), 3);
    }

    #[test]
    fn test_unknown_selection_is_error() {
        let roots = sample_tree();
        let selection = vec![vec!["National".to_string(), "Narnia".to_string()]];
        assert!(select_leaves(&roots, &selection).is_err());
    }

    #[test]
    fn test_path_display() {
        let path = CategoryPath::from(vec!["National", "Spain"]);
        assert_eq!(path.to_string(), "National / Spain");
        assert_eq!(path.season(), "");
    }
}
