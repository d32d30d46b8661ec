//! In-process ranking of candidate fragments by cosine similarity.

use std::cmp::Ordering;

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Fragment;
use crate::similarity::cosine;

/// Score every candidate against `query_vec`, sort descending, keep `top_n`.
///
/// The sort is stable: candidates with equal scores keep their original
/// relative order. `top_n <= 0` yields an empty result.
///
/// # Errors
///
/// Propagates [`Error::DimensionMismatch`] and [`Error::ZeroMagnitude`]
/// from the scorer. A candidate without a vector is reported as a
/// dimension mismatch against length `0`.
pub fn rank(query_vec: &[f32], candidates: Vec<Fragment>, top_n: i64) -> Result<Vec<Fragment>> {
    let mut scored = Vec::with_capacity(candidates.len());

    for mut fragment in candidates {
        let score = match fragment.vector.as_deref() {
            Some(v) => cosine(query_vec, v)?,
            None => {
                return Err(Error::DimensionMismatch {
                    left: query_vec.len(),
                    right: 0,
                })
            }
        };
        fragment.score = Some(score);
        scored.push(fragment);
    }

    sort_by_score(&mut scored);
    scored.truncate(top_n.max(0) as usize);

    for fragment in &scored {
        debug!(
            id = %fragment.id,
            relatedness = fragment.score.unwrap_or_default(),
            "ranked fragment"
        );
    }

    Ok(scored)
}

/// Stable sort, highest score first. Unscored fragments sink to the end
/// and keep their relative order.
pub fn sort_by_score(fragments: &mut [Fragment]) {
    fragments.sort_by(|a, b| compare_scores(a.score, b.score));
}

fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FragmentId;

    /// A 2-d unit vector whose cosine against `[1, 0]` is exactly `score`.
    fn unit_for(score: f32) -> Vec<f32> {
        vec![score, (1.0 - score * score).sqrt()]
    }

    fn candidate(id: &str, score: f32) -> Fragment {
        Fragment::new(id, format!("text {}", id)).with_vector(unit_for(score))
    }

    fn ids(fragments: &[Fragment]) -> Vec<FragmentId> {
        fragments.iter().map(|f| f.id.clone()).collect()
    }

    fn expected(names: &[&str]) -> Vec<FragmentId> {
        names.iter().map(|n| FragmentId::from(*n)).collect()
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let candidates = vec![
            candidate("a", 0.9),
            candidate("b", 0.95),
            candidate("c", 0.1),
        ];
        let ranked = rank(&[1.0, 0.0], candidates, 2).unwrap();
        assert_eq!(ids(&ranked), expected(&["b", "a"]));
        assert!((ranked[0].score.unwrap() - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_rank_output_is_non_increasing() {
        let candidates: Vec<Fragment> = [0.3, 0.8, -0.2, 0.8, 0.5, 0.0]
            .iter()
            .enumerate()
            .map(|(i, s)| candidate(&format!("f{}", i), *s))
            .collect();
        let ranked = rank(&[1.0, 0.0], candidates, 10).unwrap();
        assert_eq!(ranked.len(), 6);
        for pair in ranked.windows(2) {
            assert!(pair[0].score.unwrap() >= pair[1].score.unwrap());
        }
    }

    #[test]
    fn test_rank_ties_keep_candidate_order() {
        let candidates = vec![
            candidate("first", 0.5),
            candidate("second", 0.5),
            candidate("third", 0.5),
        ];
        let ranked = rank(&[1.0, 0.0], candidates, 3).unwrap();
        assert_eq!(ids(&ranked), expected(&["first", "second", "third"]));
    }

    #[test]
    fn test_rank_top_n_bounds() {
        let make = || vec![candidate("a", 0.1), candidate("b", 0.2)];
        assert!(rank(&[1.0, 0.0], make(), 0).unwrap().is_empty());
        assert!(rank(&[1.0, 0.0], make(), -3).unwrap().is_empty());
        assert_eq!(rank(&[1.0, 0.0], make(), 5).unwrap().len(), 2);
    }

    #[test]
    fn test_rank_propagates_scorer_errors() {
        let bad_dims = vec![Fragment::new(1i64, "x").with_vector(vec![1.0, 0.0, 0.0])];
        assert!(matches!(
            rank(&[1.0, 0.0], bad_dims, 5),
            Err(Error::DimensionMismatch { left: 2, right: 3 })
        ));

        let zero = vec![Fragment::new(1i64, "x").with_vector(vec![0.0, 0.0])];
        assert!(matches!(
            rank(&[1.0, 0.0], zero, 5),
            Err(Error::ZeroMagnitude)
        ));

        let missing = vec![Fragment::new(1i64, "x")];
        assert!(matches!(
            rank(&[1.0, 0.0], missing, 5),
            Err(Error::DimensionMismatch { right: 0, .. })
        ));
    }

    #[test]
    fn test_sort_by_score_puts_unscored_last() {
        let mut fragments = vec![
            Fragment::new("u1", "x"),
            Fragment::new("s1", "x").with_score(0.2),
            Fragment::new("u2", "x"),
            Fragment::new("s2", "x").with_score(0.7),
        ];
        sort_by_score(&mut fragments);
        assert_eq!(ids(&fragments), expected(&["s2", "s1", "u1", "u2"]));
    }
}
