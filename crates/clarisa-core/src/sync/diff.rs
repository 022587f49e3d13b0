//! Set differences between a remote snapshot and a local snapshot.
//!
//! Every function borrows its inputs and returns freshly allocated vectors.
//! Items of the remote side always end up in exactly one of the insert set or
//! the update-candidate set.

use std::collections::HashSet;
use std::hash::Hash;

/// Remote items that have no matching local item.
pub fn insert_set<R, L, F>(remote: &[R], local: &[L], key_eq: F) -> Vec<R>
where
    R: Clone,
    F: Fn(&R, &L) -> bool,
{
    remote
        .iter()
        .filter(|r| !local.iter().any(|l| key_eq(*r, l)))
        .cloned()
        .collect()
}

/// Remote items that already exist locally.
pub fn update_candidates<R, L, F>(remote: &[R], local: &[L], key_eq: F) -> Vec<R>
where
    R: Clone,
    F: Fn(&R, &L) -> bool,
{
    remote
        .iter()
        .filter(|r| local.iter().any(|l| key_eq(*r, l)))
        .cloned()
        .collect()
}

/// Local items that the remote snapshot no longer contains.
pub fn remove_candidates<L, R, F>(local: &[L], remote: &[R], key_eq: F) -> Vec<L>
where
    L: Clone,
    F: Fn(&R, &L) -> bool,
{
    local
        .iter()
        .filter(|l| !remote.iter().any(|r| key_eq(r, *l)))
        .cloned()
        .collect()
}

/// All three sets of a keyed comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedDiff<R, L> {
    pub to_insert: Vec<R>,
    pub to_update: Vec<R>,
    pub to_remove: Vec<L>,
}

impl<R, L> KeyedDiff<R, L> {
    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty()
    }
}

/// Hash-based diff for keys that are scalars or tuples of scalars.
///
/// Equivalent to [`insert_set`], [`update_candidates`] and
/// [`remove_candidates`] with `remote_key(r) == local_key(l)` as the
/// predicate, in O(n + m).
pub fn diff_by_key<R, L, K, FR, FL>(
    remote: &[R],
    local: &[L],
    remote_key: FR,
    local_key: FL,
) -> KeyedDiff<R, L>
where
    R: Clone,
    L: Clone,
    K: Eq + Hash,
    FR: Fn(&R) -> K,
    FL: Fn(&L) -> K,
{
    let local_keys: HashSet<K> = local.iter().map(&local_key).collect();
    let remote_keys: HashSet<K> = remote.iter().map(&remote_key).collect();

    let (to_update, to_insert): (Vec<R>, Vec<R>) = remote
        .iter()
        .cloned()
        .partition(|r| local_keys.contains(&remote_key(r)));

    let to_remove = local
        .iter()
        .filter(|l| !remote_keys.contains(&local_key(*l)))
        .cloned()
        .collect();

    KeyedDiff {
        to_insert,
        to_update,
        to_remove,
    }
}

/// Keep the first item of every key, preserving order.
pub fn dedup_by_key<T, K, F>(items: &[T], key: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(key(*item)))
        .cloned()
        .collect()
}
