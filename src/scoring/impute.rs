//! Missing-value imputation
//!
//! Descends one tree with a partially known query. Cuts on a known axis are
//! followed as usual; a cut on a missing axis says nothing about where the
//! query belongs, so both children are explored, nearer box first. Of the
//! leaves reached, the one closest to the known coordinates supplies the
//! missing ones. Subtrees whose box is already farther than the best leaf
//! are skipped.

use crate::tree::{BoundingBox, NodeId, RandomCutTree};

/// Squared distance from the known coordinates of `point` to `bbox`
fn known_gap(bbox: &BoundingBox, point: &[f64], missing: &[bool]) -> f64 {
    let (low, high) = bbox.gaps(point);
    (0..point.len())
        .filter(|&i| !missing[i])
        .map(|i| {
            let gap = low[i] + high[i];
            gap * gap
        })
        .sum()
}

/// `point` with every index in `missing` filled in; `None` for an empty tree.
/// Values at missing indices of `point` are ignored.
pub fn impute(tree: &RandomCutTree, point: &[f64], missing: &[usize]) -> Option<Vec<f64>> {
    let mut mask = vec![false; point.len()];
    for &i in missing {
        if let Some(slot) = mask.get_mut(i) {
            *slot = true;
        }
    }

    let root = tree.root()?;
    let mut best: Option<(f64, NodeId)> = None;
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        let gap = known_gap(&node.bbox, point, &mask);
        if best.is_some_and(|(distance, _)| gap >= distance) {
            continue;
        }
        match node.split() {
            None => best = Some((gap, id)),
            Some((cut, left, right)) if !mask[cut.dimension] => {
                stack.push(if cut.goes_left(point) { left } else { right });
            }
            Some((_, left, right)) => {
                let gl = known_gap(&tree.node(left).bbox, point, &mask);
                let gr = known_gap(&tree.node(right).bbox, point, &mask);
                // nearer child on top of the stack
                if gl <= gr {
                    stack.push(right);
                    stack.push(left);
                } else {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }

    let (_, current) = best?;
    let sample = tree.node(current).sample()?;
    Some(
        point
            .iter()
            .zip(&sample.point)
            .zip(&mask)
            .map(|((&known, &filled), &is_missing)| if is_missing { filled } else { known })
            .collect(),
    )
}
