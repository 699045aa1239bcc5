//! Near-neighbor candidates
//!
//! Per tree, the candidates are the samples under the grandparent of the
//! leaf the query descends to (the leaf, its sibling subtree and cousins).
//! A candidate survives when its distance to the query is within the
//! requested percentile of the distances from the query to every sample the
//! tree holds.

use crate::tree::RandomCutTree;

/// Ancestor levels above the reached leaf whose samples are candidates
const NEIGHBORHOOD_LEVELS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub point: Vec<f64>,
    pub distance: f64,
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Nearest-rank percentile of an unsorted slice; `None` when empty
pub fn percentile_value(values: &mut [f64], percentile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let n = values.len();
    let rank = ((percentile / 100.0) * n as f64).ceil() as usize;
    Some(values[rank.clamp(1, n) - 1])
}

/// Candidates from one tree, in left-to-right order; `percentile` in [0, 100]
pub fn near_neighbors(tree: &RandomCutTree, point: &[f64], percentile: f64) -> Vec<Candidate> {
    let traversal = tree.traverse(point);
    let path = traversal.path();
    if path.is_empty() {
        return Vec::new();
    }

    let mut distances: Vec<f64> = tree
        .samples()
        .iter()
        .map(|s| euclidean(&s.point, point))
        .collect();
    let Some(threshold) = percentile_value(&mut distances, percentile) else {
        return Vec::new();
    };

    let anchor = path[path.len().saturating_sub(NEIGHBORHOOD_LEVELS + 1)];
    tree.samples_under(anchor)
        .into_iter()
        .filter_map(|sample| {
            let distance = euclidean(&sample.point, point);
            (distance <= threshold).then(|| Candidate {
                point: sample.point.clone(),
                distance,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::CutRng;
    use crate::scoring::test_support::cluster_tree;
    use crate::types::Sample;

    #[test]
    fn test_euclidean() {
        assert_eq!(euclidean(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_percentile_value() {
        let mut values = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(percentile_value(&mut values, 0.0), Some(1.0));
        assert_eq!(percentile_value(&mut values, 20.0), Some(1.0));
        assert_eq!(percentile_value(&mut values, 50.0), Some(3.0));
        assert_eq!(percentile_value(&mut values, 100.0), Some(5.0));
        assert_eq!(percentile_value(&mut [], 50.0), None);
    }

    #[test]
    fn test_full_percentile_keeps_whole_neighborhood() {
        let tree = cluster_tree(1, 64);
        let found = near_neighbors(&tree, &[0.5, 0.5], 100.0);
        assert!(!found.is_empty());
        assert!(found.len() <= 64);
    }

    #[test]
    fn test_existing_point_is_its_own_neighbor() {
        let tree = cluster_tree(2, 64);
        let existing = tree.samples()[10].point.clone();
        let found = near_neighbors(&tree, &existing, 0.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].point, existing);
        assert_eq!(found[0].distance, 0.0);
    }

    #[test]
    fn test_threshold_filters() {
        let mut rng = CutRng::seeded(3);
        let mut tree = RandomCutTree::new(1, 8);
        for (i, v) in [0.0, 1.0, 2.0, 3.0].iter().enumerate() {
            tree.insert(Sample::new(vec![*v], i as u64, i as u64), &mut rng).unwrap();
        }
        let found = near_neighbors(&tree, &[0.0], 50.0);
        assert!(found.iter().all(|c| c.distance <= 1.0));
        assert!(found.iter().any(|c| c.distance == 0.0));
    }

    #[test]
    fn test_empty_tree() {
        let tree = RandomCutTree::new(2, 4);
        assert!(near_neighbors(&tree, &[0.0, 0.0], 50.0).is_empty());
    }
}
