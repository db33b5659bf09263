//! Matching images to labels by file stem.
//!
//! An image `a.jpg` and a label `a.txt` describe the same item. Reconciling two
//! collections drops every entry whose stem has no partner on the other side.

use log::debug;
use std::collections::HashSet;

use crate::stem::{stem, stem_set};

/// Remove every entry of `list_a` whose stem does not appear in `list_b`.
///
/// Survivors keep their relative order and `list_b` is untouched. Returns the
/// number of removed entries. Filtering one side only is order dependent; use
/// [`reconcile`] to bring both sides to the same set of stems.
pub fn retain_by_stems(list_a: &mut Vec<String>, list_b: &[String]) -> usize {
    let b_stems: HashSet<String> = stem_set(list_b).into_iter().map(str::to_owned).collect();
    retain_stems(list_a, &b_stems)
}

/// Stems present in both collections.
pub fn common_stems<A, B>(list_a: &[A], list_b: &[B]) -> HashSet<String>
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let b_stems = stem_set(list_b);
    stem_set(list_a)
        .into_iter()
        .filter(|s| b_stems.contains(s))
        .map(str::to_owned)
        .collect()
}

/// Keep only the entries whose stem is in `stems`, returning how many were dropped.
pub fn retain_stems(list: &mut Vec<String>, stems: &HashSet<String>) -> usize {
    let before = list.len();
    list.retain(|name| {
        let keep = stems.contains(stem(name));
        if !keep {
            debug!("Removed {} (no counterpart for '{}')", name, stem(name));
        }
        keep
    });
    before - list.len()
}

/// Filter both collections down to their shared stems.
///
/// The intersection is computed once up front, so the result does not depend
/// on which side is passed first.
pub fn reconcile(mut list_a: Vec<String>, mut list_b: Vec<String>) -> (Vec<String>, Vec<String>) {
    let shared = common_stems(&list_a, &list_b);
    let removed_a = retain_stems(&mut list_a, &shared);
    let removed_b = retain_stems(&mut list_b, &shared);
    if removed_a + removed_b > 0 {
        log::info!(
            "Reconciled file lists: {} shared stem(s), dropped {} + {} unmatched entries",
            shared.len(),
            removed_a,
            removed_b
        );
    }
    (list_a, list_b)
}
