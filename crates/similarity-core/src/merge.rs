//! Identifier-based deduplication and merging of result sets.
//!
//! Within one retrieval call fragment ids are unique: the first occurrence
//! of an id wins and later duplicates are dropped.

use std::collections::HashSet;

use crate::models::{Fragment, FragmentId};

/// Drop every fragment whose id was already seen, keeping first-seen order.
pub fn dedup_by_id(fragments: Vec<Fragment>) -> Vec<Fragment> {
    let mut seen: HashSet<FragmentId> = HashSet::with_capacity(fragments.len());
    fragments
        .into_iter()
        .filter(|f| seen.insert(f.id.clone()))
        .collect()
}

/// Append `extra` to `primary`, skipping ids `primary` already holds.
///
/// Appended fragments are stripped of any score so they sort after the
/// scored primary results. Fragments already in `primary` keep their
/// score untouched. Returns the number of fragments appended.
pub fn merge_unscored(primary: &mut Vec<Fragment>, extra: Vec<Fragment>) -> usize {
    let mut seen: HashSet<FragmentId> = primary.iter().map(|f| f.id.clone()).collect();
    let before = primary.len();

    for mut fragment in extra {
        if !seen.insert(fragment.id.clone()) {
            continue;
        }
        fragment.score = None;
        primary.push(fragment);
    }

    primary.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_first_seen_wins() {
        let fragments = vec![
            Fragment::new("a", "first a"),
            Fragment::new("b", "b"),
            Fragment::new("a", "second a"),
        ];
        let deduped = dedup_by_id(fragments);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].text, "first a");
        assert_eq!(deduped[1].id, FragmentId::from("b"));
    }

    #[test]
    fn test_merge_keeps_primary_score() {
        let mut primary = vec![
            Fragment::new("p1", "x").with_score(0.91),
            Fragment::new("shared", "x").with_score(0.42),
        ];
        let extra = vec![
            Fragment::new("shared", "from term match"),
            Fragment::new("t1", "term hit").with_score(3.0),
        ];

        let added = merge_unscored(&mut primary, extra);

        assert_eq!(added, 1);
        assert_eq!(primary.len(), 3);
        let shared: Vec<&Fragment> = primary
            .iter()
            .filter(|f| f.id == FragmentId::from("shared"))
            .collect();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].score, Some(0.42));
        assert_eq!(primary[2].id, FragmentId::from("t1"));
        assert_eq!(primary[2].score, None);
    }

    #[test]
    fn test_merge_into_empty() {
        let mut primary = Vec::new();
        let added = merge_unscored(
            &mut primary,
            vec![Fragment::new("a", "x"), Fragment::new("a", "y")],
        );
        assert_eq!(added, 1);
        assert_eq!(primary[0].text, "x");
    }
}
