//! Composable comparators.
//!
//! Small builders that return `Fn(&T, &T) -> Ordering` closures so sort
//! orders can be assembled at the call site:
//!
//! ```
//! use allure_store::util::compare::{compare_by, nulls_last, ordinal, reverse};
//!
//! let mut starts = vec![Some(1), None, Some(3)];
//! starts.sort_by(nulls_last(reverse(ordinal::<i32>())));
//! assert_eq!(starts, vec![Some(3), Some(1), None]);
//!
//! let mut words = vec!["bb", "a", "ccc"];
//! words.sort_by(compare_by(|w: &&str| w.len(), ordinal::<usize>()));
//! assert_eq!(words, vec!["a", "bb", "ccc"]);
//! ```

use std::cmp::Ordering;

/// Natural order via `PartialOrd`. Incomparable values are treated as equal.
pub fn ordinal<T: PartialOrd + ?Sized>() -> impl Fn(&T, &T) -> Ordering + Clone {
    |a: &T, b: &T| a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Invert a comparator.
pub fn reverse<T: ?Sized, C>(cmp: C) -> impl Fn(&T, &T) -> Ordering + Clone
where
    C: Fn(&T, &T) -> Ordering + Clone,
{
    move |a: &T, b: &T| cmp(b, a)
}

/// Order `None` after every `Some`, whatever order `cmp` imposes on values.
pub fn nulls_last<T, C>(cmp: C) -> impl Fn(&Option<T>, &Option<T>) -> Ordering + Clone
where
    C: Fn(&T, &T) -> Ordering + Clone,
{
    move |a: &Option<T>, b: &Option<T>| match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Compare by a derived key.
pub fn compare_by<T: ?Sized, K, F, C>(key: F, cmp: C) -> impl Fn(&T, &T) -> Ordering + Clone
where
    F: Fn(&T) -> K + Clone,
    C: Fn(&K, &K) -> Ordering + Clone,
{
    move |a: &T, b: &T| cmp(&key(a), &key(b))
}

/// Use `second` to break ties left by `first`.
pub fn then<T: ?Sized, A, B>(first: A, second: B) -> impl Fn(&T, &T) -> Ordering + Clone
where
    A: Fn(&T, &T) -> Ordering + Clone,
    B: Fn(&T, &T) -> Ordering + Clone,
{
    move |a: &T, b: &T| first(a, b).then_with(|| second(a, b))
}
