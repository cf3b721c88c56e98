use std::collections::{BTreeMap, BTreeSet};

use crate::conjunction::kdtree::KdTree;
use crate::conjunction::types::CandidatePair;
use crate::propagation::Vec3;

/// Broad phase: every pair of objects whose snapshot positions lie within
/// `radius_km` of each other.
///
/// One k-d tree build plus one radius query per object keeps this near
/// O(N log N + N k) instead of comparing all N² pairs.
pub fn prune_pairs(positions: &BTreeMap<u32, Vec3>, radius_km: f64) -> BTreeSet<CandidatePair> {
    let mut pairs = BTreeSet::new();
    if positions.len() < 2 {
        return pairs;
    }

    let (ids, points): (Vec<u32>, Vec<Vec3>) = positions.iter().map(|(id, p)| (*id, *p)).unzip();
    let tree = KdTree::build(&points);

    for (i, point) in points.iter().enumerate() {
        for j in tree.within_radius(*point, radius_km) {
            // ids come sorted from the map, so j > i means ids[j] > ids[i]
            if j <= i {
                continue;
            }
            if let Some(pair) = CandidatePair::new(ids[i], ids[j]) {
                pairs.insert(pair);
            }
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::vector::distance_squared;
    use proptest::prelude::*;

    fn brute_force(positions: &BTreeMap<u32, Vec3>, radius: f64) -> BTreeSet<CandidatePair> {
        let mut pairs = BTreeSet::new();
        for (a, pa) in positions {
            for (b, pb) in positions {
                if a < b && distance_squared(*pa, *pb) <= radius * radius {
                    pairs.insert(CandidatePair::new(*a, *b).unwrap());
                }
            }
        }
        pairs
    }

    fn positions_strategy() -> impl Strategy<Value = BTreeMap<u32, Vec3>> {
        prop::collection::btree_map(
            0u32..500,
            (-1000.0f64..1000.0, -1000.0f64..1000.0, -1000.0f64..1000.0)
                .prop_map(|(x, y, z)| [x, y, z]),
            0..60,
        )
    }

    #[test]
    fn fewer_than_two_objects() {
        let mut positions = BTreeMap::new();
        assert!(prune_pairs(&positions, 100.0).is_empty());
        positions.insert(1, [0.0, 0.0, 0.0]);
        assert!(prune_pairs(&positions, 100.0).is_empty());
    }

    #[test]
    fn close_pair_found_once() {
        let positions = BTreeMap::from([
            (49044, [6800.0, 0.0, 0.0]),
            (25544, [6800.0, 0.005, 0.0]),
            (1, [-6800.0, 0.0, 0.0]),
        ]);
        let pairs = prune_pairs(&positions, 300.0);
        assert_eq!(pairs.len(), 1);
        let pair = pairs.iter().next().unwrap();
        assert_eq!((pair.first(), pair.second()), (25544, 49044));
    }

    proptest! {
        #[test]
        fn matches_brute_force(positions in positions_strategy(), radius in 0.0f64..800.0) {
            let pairs = prune_pairs(&positions, radius);
            prop_assert_eq!(&pairs, &brute_force(&positions, radius));
            for pair in &pairs {
                prop_assert!(pair.first() < pair.second());
            }
        }

        #[test]
        fn radius_is_monotone(positions in positions_strategy(), r1 in 0.0f64..500.0, extra in 0.0f64..500.0) {
            let small = prune_pairs(&positions, r1);
            let large = prune_pairs(&positions, r1 + extra);
            prop_assert!(small.is_subset(&large));
        }
    }
}
