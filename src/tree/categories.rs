//! Defect categories and the category tree.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{GroupAddHook, LeafMerge, TreeData, TreeItem, build_tree};
use crate::error::Result;
use crate::model::{Status, TestResult};

/// Declarative category, as it appears in report configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    /// Statuses the category applies to. Empty matches any status.
    #[serde(default)]
    pub matched_statuses: Vec<Status>,
    /// Must match the whole error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_regex: Option<String>,
    /// Must match the whole error trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flaky: Option<bool>,
}

impl Category {
    #[must_use]
    pub fn new(name: impl Into<String>, matched_statuses: Vec<Status>) -> Self {
        Self {
            name: name.into(),
            matched_statuses,
            ..Self::default()
        }
    }
}

/// The two defect categories every report shows when none are configured.
#[must_use]
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new("Product defects", vec![Status::Failed]),
        Category::new("Test defects", vec![Status::Broken]),
    ]
}

/// A [`Category`] with its patterns compiled.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    name: String,
    statuses: Vec<Status>,
    message: Option<Regex>,
    trace: Option<Regex>,
    flaky: Option<bool>,
}

impl CategoryMatcher {
    /// Compile a category. Patterns are anchored at both ends.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Regex` if a pattern does not compile.
    pub fn compile(category: &Category) -> Result<Self> {
        Ok(Self {
            name: category.name.clone(),
            statuses: category.matched_statuses.clone(),
            message: category.message_regex.as_deref().map(full_match).transpose()?,
            trace: category.trace_regex.as_deref().map(full_match).transpose()?,
            flaky: category.flaky,
        })
    }

    /// Compile a list, preserving order.
    ///
    /// # Errors
    ///
    /// Fails on the first pattern that does not compile.
    pub fn compile_all(categories: &[Category]) -> Result<Vec<Self>> {
        categories.iter().map(Self::compile).collect()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Does `tr` belong to this category?
    #[must_use]
    pub fn matches(&self, tr: &TestResult) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&tr.status) {
            return false;
        }
        if self.flaky.is_some_and(|flaky| flaky != tr.flaky) {
            return false;
        }
        let error = tr.error.as_ref();
        let message = error.and_then(|e| e.message.as_deref()).unwrap_or("");
        let trace = error.and_then(|e| e.trace.as_deref()).unwrap_or("");
        self.message.as_ref().is_none_or(|re| re.is_match(message))
            && self.trace.as_ref().is_none_or(|re| re.is_match(trace))
    }
}

fn full_match(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("(?s)^(?:{pattern})$"))?)
}

/// Names of every matcher `tr` satisfies, in matcher order.
#[must_use]
pub fn match_categories(matchers: &[CategoryMatcher], tr: &TestResult) -> Vec<String> {
    matchers
        .iter()
        .filter(|m| m.matches(tr))
        .map(|m| m.name.clone())
        .collect()
}

/// Group `items` under the categories `categorize` assigns them.
///
/// `categorize` returns one list of values per tree level, the same way
/// label values feed [`create_tree_by_labels`](super::create_tree_by_labels).
/// Items with no category at level 0 become root leaves.
pub fn create_tree_by_categories<T, L, G>(
    items: &[T],
    categorize: impl Fn(&T) -> Vec<Vec<String>>,
    leaf_factory: impl Fn(&T) -> L,
    leaf_merge: Option<LeafMerge<'_, T, L>>,
    on_group_add: Option<GroupAddHook<'_, T, G>>,
) -> TreeData<L, G>
where
    T: TreeItem,
    G: Default,
{
    build_tree(items, categorize, leaf_factory, leaf_merge, on_group_add)
}
