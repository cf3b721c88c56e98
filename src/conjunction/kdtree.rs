use std::cmp::Ordering;

use crate::propagation::vector::{distance_squared, Vec3};

/// Static 3-d tree over a point set, stored implicitly: each sub-slice keeps
/// its splitting point at the middle index, smaller coordinates to the left.
pub struct KdTree {
    points: Vec<(usize, Vec3)>,
}

impl KdTree {
    pub fn build(positions: &[Vec3]) -> Self {
        let mut points: Vec<(usize, Vec3)> = positions.iter().copied().enumerate().collect();
        build_recursive(&mut points, 0);
        Self { points }
    }

    /// Indices (into the build slice) of all points within `radius` of `center`, inclusive.
    pub fn within_radius(&self, center: Vec3, radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        if radius >= 0.0 {
            search(&self.points, 0, center, radius, radius * radius, &mut out);
        }
        out
    }
}

fn build_recursive(points: &mut [(usize, Vec3)], depth: usize) {
    if points.len() <= 1 {
        return;
    }
    let axis = depth % 3;
    let mid = points.len() / 2;
    points.select_nth_unstable_by(mid, |a, b| {
        a.1[axis].partial_cmp(&b.1[axis]).unwrap_or(Ordering::Equal)
    });

    let (left, rest) = points.split_at_mut(mid);
    build_recursive(left, depth + 1);
    build_recursive(&mut rest[1..], depth + 1);
}

fn search(
    points: &[(usize, Vec3)],
    depth: usize,
    center: Vec3,
    radius: f64,
    radius_sq: f64,
    out: &mut Vec<usize>,
) {
    if points.is_empty() {
        return;
    }
    let axis = depth % 3;
    let mid = points.len() / 2;
    let (index, point) = points[mid];

    if distance_squared(point, center) <= radius_sq {
        out.push(index);
    }

    if center[axis] - radius <= point[axis] {
        search(&points[..mid], depth + 1, center, radius, radius_sq, out);
    }
    if center[axis] + radius >= point[axis] {
        search(&points[mid + 1..], depth + 1, center, radius, radius_sq, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_neighbours_including_boundary() {
        let points = [
            [0.0, 0.0, 0.0],
            [10.0, 0.0, 0.0],
            [0.0, 10.0, 0.0],
            [0.0, 0.0, 10.5],
            [100.0, 100.0, 100.0],
        ];
        let tree = KdTree::build(&points);
        let mut found = tree.within_radius([0.0, 0.0, 0.0], 10.0);
        found.sort();
        assert_eq!(found, vec![0, 1, 2]);
    }

    #[test]
    fn empty_tree_returns_nothing() {
        let tree = KdTree::build(&[]);
        assert!(tree.within_radius([0.0; 3], 1e9).is_empty());
    }
}
