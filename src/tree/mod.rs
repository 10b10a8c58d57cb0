//! Label-driven trees of test results.
//!
//! A tree is a flat pair of maps (`groups_by_id`, `leaves_by_id`) plus a
//! root that lists the top-level ids. Groups and leaves reference children
//! by id only, so sorting, filtering and transforming never move nodes
//! between maps.
//!
//! Building:
//! - [`create_tree_by_labels`] groups items level by level on label values.
//! - [`create_tree_by_categories`](categories::create_tree_by_categories)
//!   groups on caller-supplied category matches.
//!
//! Both share one engine. Multi-valued labels fan an item out into one
//! branch per value combination. An item stops descending at the first
//! level it has no value for and becomes a leaf of the deepest group it
//! reached; items without a level-0 value are root leaves.
//!
//! Leaf node ids are per placement: a root leaf uses the item id, a leaf
//! inside a group uses `md5(<group id>/<item id>)`. Every id therefore has
//! exactly one parent even when an item is fanned out.

pub mod categories;
pub mod ops;

pub use categories::{
    Category, CategoryMatcher, create_tree_by_categories, default_categories, match_categories,
};
pub use ops::{filter_tree, sort_tree, transform_tree};

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{Status, TestResult};
use crate::stats::{Statistic, increment_statistic};
use crate::util::hash::md5_hex;

/// Something the tree builder can place.
pub trait TreeItem {
    /// Stable id of the source item.
    fn item_id(&self) -> &str;

    /// Values the item carries for label `name`, in label order.
    fn label_values(&self, name: &str) -> Vec<&str>;
}

impl TreeItem for TestResult {
    fn item_id(&self) -> &str {
        &self.id
    }

    fn label_values(&self, name: &str) -> Vec<&str> {
        Self::label_values(self, name)
    }
}

impl<T: TreeItem + ?Sized> TreeItem for &T {
    fn item_id(&self) -> &str {
        (**self).item_id()
    }

    fn label_values(&self, name: &str) -> Vec<&str> {
        (**self).label_values(name)
    }
}

/// Top-level children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeRoot {
    pub groups: Vec<String>,
    pub leaves: Vec<String>,
}

/// A grouping node. `data` is the caller's per-group payload, usually a
/// [`Statistic`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeGroup<G> {
    pub node_id: String,
    pub name: String,
    pub groups: Vec<String>,
    pub leaves: Vec<String>,
    #[serde(flatten)]
    pub data: G,
}

/// A leaf node wrapping the caller's projection of a source item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeLeaf<L> {
    pub node_id: String,
    #[serde(flatten)]
    pub data: L,
}

/// A built tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeData<L, G> {
    pub root: TreeRoot,
    pub groups_by_id: BTreeMap<String, TreeGroup<G>>,
    pub leaves_by_id: BTreeMap<String, TreeLeaf<L>>,
}

impl<L, G> Default for TreeData<L, G> {
    fn default() -> Self {
        Self {
            root: TreeRoot::default(),
            groups_by_id: BTreeMap::new(),
            leaves_by_id: BTreeMap::new(),
        }
    }
}

impl<L, G> TreeData<L, G> {
    /// True if the group has no leaves anywhere beneath it.
    ///
    /// Filtering never prunes groups, so renderers use this to hide groups
    /// that filtering emptied. Unknown ids count as empty.
    #[must_use]
    pub fn is_group_empty(&self, group_id: &str) -> bool {
        let Some(group) = self.groups_by_id.get(group_id) else {
            return true;
        };
        group.leaves.is_empty() && group.groups.iter().all(|id| self.is_group_empty(id))
    }

    /// Number of leaves reachable from the root.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.root.leaves.len()
            + self
                .root
                .groups
                .iter()
                .map(|id| self.group_leaf_count(id))
                .sum::<usize>()
    }

    fn group_leaf_count(&self, group_id: &str) -> usize {
        self.groups_by_id.get(group_id).map_or(0, |group| {
            group.leaves.len()
                + group
                    .groups
                    .iter()
                    .map(|id| self.group_leaf_count(id))
                    .sum::<usize>()
        })
    }

    /// Leaf payload by node id.
    #[must_use]
    pub fn leaf(&self, node_id: &str) -> Option<&L> {
        self.leaves_by_id.get(node_id).map(|leaf| &leaf.data)
    }

    /// Group by node id.
    #[must_use]
    pub fn group(&self, node_id: &str) -> Option<&TreeGroup<G>> {
        self.groups_by_id.get(node_id)
    }

    /// Find the root-level group with this name.
    #[must_use]
    pub fn root_group_by_name(&self, name: &str) -> Option<&TreeGroup<G>> {
        self.root
            .groups
            .iter()
            .filter_map(|id| self.groups_by_id.get(id))
            .find(|group| group.name == name)
    }

    /// Child group of `parent` with this name.
    #[must_use]
    pub fn child_group_by_name(&self, parent: &TreeGroup<G>, name: &str) -> Option<&TreeGroup<G>> {
        parent
            .groups
            .iter()
            .filter_map(|id| self.groups_by_id.get(id))
            .find(|group| group.name == name)
    }
}

/// Reconciles a second placement of the same item at the same position.
pub type LeafMerge<'f, T, L> = &'f dyn Fn(&mut L, &T);

/// Called once per (group, item) for every group on the item's paths.
pub type GroupAddHook<'f, T, G> = &'f mut dyn FnMut(&mut TreeGroup<G>, &T);

/// Node id of the group named `value` under `parent` (`None` = root).
#[must_use]
pub fn group_node_id(parent: Option<&str>, value: &str) -> String {
    md5_hex(&format!("{}/{value}", parent.unwrap_or("")))
}

/// Node id of `item_id` placed under `parent` (`None` = root).
#[must_use]
pub fn leaf_node_id(parent: Option<&str>, item_id: &str) -> String {
    parent.map_or_else(
        || item_id.to_string(),
        |group| md5_hex(&format!("{group}/{item_id}")),
    )
}

/// Group `items` by the values of `label_names`, one tree level per name.
pub fn create_tree_by_labels<T, L, G>(
    items: &[T],
    label_names: &[&str],
    leaf_factory: impl Fn(&T) -> L,
    leaf_merge: Option<LeafMerge<'_, T, L>>,
    on_group_add: Option<GroupAddHook<'_, T, G>>,
) -> TreeData<L, G>
where
    T: TreeItem,
    G: Default,
{
    build_tree(
        items,
        |item: &T| {
            label_names
                .iter()
                .map(|name| item.label_values(name).into_iter().map(ToString::to_string).collect())
                .collect()
        },
        leaf_factory,
        leaf_merge,
        on_group_add,
    )
}

/// Shared tree engine. `levels_of` yields, per tree level, the values an
/// item has at that level; descent stops at the first empty level.
pub(crate) fn build_tree<T, L, G>(
    items: &[T],
    levels_of: impl Fn(&T) -> Vec<Vec<String>>,
    leaf_factory: impl Fn(&T) -> L,
    leaf_merge: Option<LeafMerge<'_, T, L>>,
    mut on_group_add: Option<GroupAddHook<'_, T, G>>,
) -> TreeData<L, G>
where
    T: TreeItem,
    G: Default,
{
    let mut tree = TreeData::<L, G>::default();

    for item in items {
        let mut frontier: Vec<Option<String>> = vec![None];

        for values in levels_of(item) {
            let values = dedup_preserving_order(values);
            if values.is_empty() {
                break;
            }

            let mut next = Vec::with_capacity(frontier.len() * values.len());
            for parent in &frontier {
                for value in &values {
                    let group_id = group_node_id(parent.as_deref(), value);
                    if !tree.groups_by_id.contains_key(&group_id) {
                        tree.groups_by_id.insert(
                            group_id.clone(),
                            TreeGroup {
                                node_id: group_id.clone(),
                                name: value.clone(),
                                groups: Vec::new(),
                                leaves: Vec::new(),
                                data: G::default(),
                            },
                        );
                        match parent {
                            None => tree.root.groups.push(group_id.clone()),
                            Some(parent_id) => {
                                if let Some(parent_group) = tree.groups_by_id.get_mut(parent_id) {
                                    parent_group.groups.push(group_id.clone());
                                }
                            }
                        }
                    }
                    if let Some(hook) = on_group_add.as_mut() {
                        if let Some(group) = tree.groups_by_id.get_mut(&group_id) {
                            hook(group, item);
                        }
                    }
                    next.push(Some(group_id));
                }
            }
            frontier = next;
        }

        for parent in &frontier {
            let node_id = leaf_node_id(parent.as_deref(), item.item_id());
            if let Some(existing) = tree.leaves_by_id.get_mut(&node_id) {
                match leaf_merge {
                    Some(merge) => merge(&mut existing.data, item),
                    None => existing.data = leaf_factory(item),
                }
                continue;
            }
            tree.leaves_by_id.insert(
                node_id.clone(),
                TreeLeaf {
                    node_id: node_id.clone(),
                    data: leaf_factory(item),
                },
            );
            match parent {
                None => tree.root.leaves.push(node_id),
                Some(parent_id) => {
                    if let Some(parent_group) = tree.groups_by_id.get_mut(parent_id) {
                        parent_group.leaves.push(node_id);
                    }
                }
            }
        }
    }

    tree
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Default leaf projection of a test result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultLeaf {
    /// Test result id.
    pub id: String,
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    pub flaky: bool,
    /// 1-based position inside the parent, stamped after sorting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_order: Option<usize>,
}

impl From<&TestResult> for TestResultLeaf {
    fn from(tr: &TestResult) -> Self {
        Self {
            id: tr.id.clone(),
            name: tr.name.clone(),
            status: tr.status,
            start: tr.start,
            duration: tr.duration,
            flaky: tr.flaky,
            group_order: None,
        }
    }
}

/// Group test results by labels with a running [`Statistic`] per group.
#[must_use]
pub fn create_test_results_tree(
    results: &[&TestResult],
    label_names: &[&str],
) -> TreeData<TestResultLeaf, Statistic> {
    let mut add_statistic = |group: &mut TreeGroup<Statistic>, tr: &&TestResult| {
        increment_statistic(&mut group.data, *tr, 1);
    };
    create_tree_by_labels(
        results,
        label_names,
        |tr: &&TestResult| TestResultLeaf::from(*tr),
        None,
        Some(&mut add_statistic),
    )
}
