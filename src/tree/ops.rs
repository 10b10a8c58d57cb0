//! In-place tree passes: sort, filter, transform.

use std::cmp::Ordering;

use super::TreeData;

/// Sort the root's and every group's `leaves` by `cmp` over leaf payloads.
///
/// The sort is stable. Groups keep their relative order.
pub fn sort_tree<L, G>(tree: &mut TreeData<L, G>, cmp: impl Fn(&L, &L) -> Ordering) {
    let TreeData {
        root,
        groups_by_id,
        leaves_by_id,
    } = tree;

    let by_payload = |a: &String, b: &String| match (leaves_by_id.get(a), leaves_by_id.get(b)) {
        (Some(a), Some(b)) => cmp(&a.data, &b.data),
        _ => Ordering::Equal,
    };

    root.leaves.sort_by(|a, b| by_payload(a, b));
    for group in groups_by_id.values_mut() {
        group.leaves.sort_by(|a, b| by_payload(a, b));
    }
}

/// Drop leaves whose payload fails `keep`, at every depth.
///
/// Filtered leaves are removed from `leaves_by_id` too. Groups are never
/// pruned; see [`TreeData::is_group_empty`].
pub fn filter_tree<L, G>(tree: &mut TreeData<L, G>, keep: impl Fn(&L) -> bool) {
    let TreeData {
        root,
        groups_by_id,
        leaves_by_id,
    } = tree;

    leaves_by_id.retain(|_, leaf| keep(&leaf.data));
    root.leaves.retain(|id| leaves_by_id.contains_key(id));
    for group in groups_by_id.values_mut() {
        group.leaves.retain(|id| leaves_by_id.contains_key(id));
    }
}

/// Replace every leaf payload with `f(payload, index)`, where `index` is
/// the leaf's 0-based position in its parent's current `leaves`.
pub fn transform_tree<L, G>(tree: &mut TreeData<L, G>, mut f: impl FnMut(L, usize) -> L) {
    let TreeData {
        root,
        groups_by_id,
        leaves_by_id,
    } = tree;

    let mut apply = |ids: &[String]| {
        for (index, id) in ids.iter().enumerate() {
            if let Some(mut leaf) = leaves_by_id.remove(id) {
                leaf.data = f(leaf.data, index);
                leaves_by_id.insert(id.clone(), leaf);
            }
        }
    };

    apply(&root.leaves);
    for group in groups_by_id.values() {
        apply(&group.leaves);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{TestResultLeaf, TreeItem, create_tree_by_labels};
    use crate::util::compare::{compare_by, nulls_last, ordinal, reverse};

    struct Item {
        id: String,
        suite: &'static str,
        start: Option<i64>,
    }

    impl TreeItem for Item {
        fn item_id(&self) -> &str {
            &self.id
        }

        fn label_values(&self, name: &str) -> Vec<&str> {
            if name == "suite" { vec![self.suite] } else { Vec::new() }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Leaf {
        id: String,
        start: Option<i64>,
        order: usize,
    }

    fn build(items: &[Item]) -> TreeData<Leaf, ()> {
        create_tree_by_labels(
            items,
            &["suite"],
            |i: &Item| Leaf {
                id: i.id.clone(),
                start: i.start,
                order: 0,
            },
            None,
            None,
        )
    }

    fn items() -> Vec<Item> {
        vec![
            Item { id: "a".into(), suite: "s1", start: Some(3) },
            Item { id: "b".into(), suite: "s1", start: None },
            Item { id: "c".into(), suite: "s1", start: Some(7) },
            Item { id: "d".into(), suite: "s2", start: Some(1) },
        ]
    }

    fn leaf_ids(tree: &TreeData<Leaf, ()>, group: &str) -> Vec<String> {
        let g = tree.root_group_by_name(group).unwrap();
        g.leaves.iter().map(|id| tree.leaf(id).unwrap().id.clone()).collect()
    }

    #[test]
    fn sort_then_stamp_dense_order() {
        let items = items();
        let mut tree = build(&items);
        sort_tree(
            &mut tree,
            compare_by(|l: &Leaf| l.start, nulls_last(reverse(ordinal::<i64>()))),
        );
        assert_eq!(leaf_ids(&tree, "s1"), vec!["c", "a", "b"]);

        transform_tree(&mut tree, |leaf, index| Leaf {
            order: index + 1,
            ..leaf
        });
        let s1 = tree.root_group_by_name("s1").unwrap();
        let orders: Vec<usize> = s1.leaves.iter().map(|id| tree.leaf(id).unwrap().order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        let s2 = tree.root_group_by_name("s2").unwrap();
        assert_eq!(tree.leaf(&s2.leaves[0]).unwrap().order, 1);
    }

    #[test]
    fn filter_removes_failing_leaves_everywhere() {
        let items = items();
        let mut tree = build(&items);
        filter_tree(&mut tree, |leaf| leaf.start.is_some_and(|s| s > 2));
        assert_eq!(leaf_ids(&tree, "s1"), vec!["a", "c"]);
        assert!(leaf_ids(&tree, "s2").is_empty());
        assert_eq!(tree.leaves_by_id.len(), 2);
        assert_eq!(tree.groups_by_id.len(), 2);
        let s2_id = tree.root_group_by_name("s2").unwrap().node_id.clone();
        assert!(tree.is_group_empty(&s2_id));
    }

    #[test]
    fn transform_test_result_leaves_with_group_order() {
        use crate::model::{Label, SourceMetadata, Status, TestResult};

        let make = |id: &str, start: i64| TestResult {
            id: id.to_string(),
            name: id.to_string(),
            full_name: None,
            history_id: None,
            test_case: None,
            status: Status::Passed,
            error: None,
            start: Some(start),
            stop: None,
            duration: None,
            description: None,
            description_html: None,
            flaky: false,
            muted: false,
            known: false,
            hidden: false,
            environment: "default".to_string(),
            labels: vec![Label::new("suite", "s")],
            parameters: Vec::new(),
            links: Vec::new(),
            steps: Vec::new(),
            source_metadata: SourceMetadata::default(),
        };
        let a = make("a", 2);
        let b = make("b", 1);
        let results = [&a, &b];
        let mut tree = crate::tree::create_test_results_tree(&results, &["suite"]);
        sort_tree(&mut tree, compare_by(|l: &TestResultLeaf| l.start, nulls_last(ordinal::<i64>())));
        transform_tree(&mut tree, |leaf, index| TestResultLeaf {
            group_order: Some(index + 1),
            ..leaf
        });
        let s = tree.root_group_by_name("s").unwrap();
        assert_eq!(s.data.total, 2);
        let first = tree.leaf(&s.leaves[0]).unwrap();
        assert_eq!(first.id, "b");
        assert_eq!(first.group_order, Some(1));
    }
}
