use super::EdgeBundlingParams;
use crate::geometry::line_intersection;
use crate::routing::{RoutingInput, VertexShape};
use crate::{EdgeId, Point, Vec2, VertexId, EPSILON};
use std::collections::{BTreeMap, HashSet};
use tracing::trace;

/// Link from one edge group to a compatible one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compatibility {
    /// Index of the partner group
    pub group: usize,
    /// Product of the four compatibility factors
    pub score: f32,
    /// The partner runs the other way, control point indices are mirrored
    pub reversed: bool,
}

/// Bundling state of all the edges from one vertex to another
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeGroupData {
    pub source: VertexId,
    pub target: VertexId,
    /// Anchor on the source boundary
    pub v1: Point,
    /// Anchor on the target boundary
    pub v2: Point,
    pub middle: Point,
    pub length: f32,
    /// Spring constant between two consecutive control points
    pub k: f32,
    /// Parallel edges sharing this group, ascending
    pub edges: Vec<EdgeId>,
    pub compatible: Vec<Compatibility>,
}

impl EdgeGroupData {
    pub fn new(
        source: VertexId,
        target: VertexId,
        v1: Point,
        v2: Point,
        params: &EdgeBundlingParams,
    ) -> Self {
        let length = v1.distance(v2);
        let segments = (params.subdivision_points + 1) as f32;
        let k = if length > EPSILON {
            (params.spring_constant / (length * segments)).min(0.5)
        } else {
            0.5
        };
        Self {
            source,
            target,
            v1,
            v2,
            middle: v1.midpoint(v2),
            length,
            k,
            edges: Vec::new(),
            compatible: Vec::new(),
        }
    }

    pub fn multiplicity(&self) -> usize {
        self.edges.len()
    }

    pub fn vector(&self) -> Vec2 {
        self.v2 - self.v1
    }

    /// `subdivisions` evenly spaced points between the anchors, anchors included
    pub fn straight_points(&self, subdivisions: usize) -> impl Iterator<Item = Point> + '_ {
        let segments = subdivisions + 1;
        (0..=segments).map(move |i| match i {
            0 => self.v1,
            i if i == segments => self.v2,
            i => self.v1.lerp(self.v2, i as f32 / segments as f32),
        })
    }

    fn same_endpoints(&self, other: &Self) -> bool {
        (self.source, self.target, &self.edges) == (other.source, other.target, &other.edges)
    }
}

/// Compatibility of two groups, `None` when any factor is below `threshold`
///
/// Returns the score and whether the groups run in opposite directions. The
/// result does not depend on the argument order.
pub fn compatibility(a: &EdgeGroupData, b: &EdgeGroupData, threshold: f32) -> Option<(f32, bool)> {
    if a.length < EPSILON || b.length < EPSILON {
        return None;
    }
    let average = (a.length + b.length) / 2.0;

    let scale = (4.0 * a.length * b.length / (a.length + b.length).powi(2)).powi(2);
    if scale < threshold {
        return None;
    }
    let position = average / (average + a.middle.distance(b.middle));
    if position < threshold {
        return None;
    }
    let angle = (a.vector().dot(b.vector()) / (a.length * b.length)).abs();
    if angle < threshold {
        return None;
    }
    let visibility = visibility(a, b).min(visibility(b, a));
    if visibility < threshold {
        return None;
    }

    let same = a.v1.distance(b.v1) + a.v2.distance(b.v2);
    let cross = a.v1.distance(b.v2) + a.v2.distance(b.v1);
    Some((scale * position * angle * visibility, cross < same))
}

/// How much of `q` is visible from `p`, projecting `q` onto the line of `p`
fn visibility(p: &EdgeGroupData, q: &EdgeGroupData) -> f32 {
    let normal = p.vector().perpendicular();
    let (Some(i0), Some(i1)) = (
        line_intersection(p.v1, p.v2, q.v1, q.v1 + normal),
        line_intersection(p.v1, p.v2, q.v2, q.v2 + normal),
    ) else {
        return 0.0;
    };
    let span = i0.distance(i1);
    if span < EPSILON {
        return 0.0;
    }
    (1.0 - 2.0 * p.middle.distance(i0.midpoint(i1)) / span).max(0.0)
}

/// One group per ordered vertex pair, sorted by source then target
pub fn collect_groups(input: &RoutingInput<'_>, params: &EdgeBundlingParams) -> Vec<EdgeGroupData> {
    let mut pairs: BTreeMap<(VertexId, VertexId), Vec<EdgeId>> = BTreeMap::new();
    for edge in input.routable_edges() {
        pairs
            .entry((edge.source, edge.target))
            .or_default()
            .push(edge.id);
    }

    pairs
        .into_iter()
        .filter_map(|((source, target), mut edges)| {
            let source_rect = input.rect(source)?;
            let target_rect = input.rect(target)?;
            let [v1, v2] =
                VertexShape::Rectangle.endpoints(&source_rect, &target_rect, Vec2::zero());
            let mut group = EdgeGroupData::new(source, target, v1, v2, params);
            edges.sort();
            group.edges = edges;
            Some(group)
        })
        .collect()
}

/// Whether two group lists describe the same edges between the same vertices
pub fn same_groups(a: &[EdgeGroupData], b: &[EdgeGroupData]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.same_endpoints(b))
}

/// Fill in the compatible partners of the groups
///
/// With `affected`, only pairs involving one of those groups are scored again,
/// links between two unaffected groups are kept as they are. Groups shorter
/// than the minimum length never get a partner.
pub fn link_compatible(
    groups: &mut [EdgeGroupData],
    params: &EdgeBundlingParams,
    affected: Option<&HashSet<usize>>,
) -> usize {
    let touched = |i: usize| affected.map_or(true, |set| set.contains(&i));
    for (i, group) in groups.iter_mut().enumerate() {
        if touched(i) {
            group.compatible.clear();
        } else {
            group.compatible.retain(|c| !touched(c.group));
        }
    }

    let eligible: Vec<bool> = groups
        .iter()
        .map(|group| {
            let long_enough = group.length >= params.min_group_length;
            if !long_enough {
                trace!(
                    "Edge group {} -> {} is too short to bundle ({})",
                    group.source,
                    group.target,
                    group.length
                );
            }
            long_enough
        })
        .collect();

    let mut links = Vec::new();
    for i in 0..groups.len() {
        for j in i + 1..groups.len() {
            if !(eligible[i] && eligible[j] && (touched(i) || touched(j))) {
                continue;
            }
            if let Some((score, reversed)) =
                compatibility(&groups[i], &groups[j], params.threshold)
            {
                links.push((i, j, score, reversed));
            }
        }
    }

    let count = links.len();
    for (i, j, score, reversed) in links {
        groups[i].compatible.push(Compatibility {
            group: j,
            score,
            reversed,
        });
        groups[j].compatible.push(Compatibility {
            group: i,
            score,
            reversed,
        });
    }
    for group in groups.iter_mut() {
        group.compatible.sort_by_key(|c| c.group);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn group(v1: (f32, f32), v2: (f32, f32)) -> EdgeGroupData {
        EdgeGroupData::new(
            VertexId(0),
            VertexId(1),
            Point::new(v1.0, v1.1),
            Point::new(v2.0, v2.1),
            &EdgeBundlingParams::default(),
        )
    }

    #[test]
    fn test_compatibility_is_symmetric() {
        let groups = [
            group((0.0, 0.0), (300.0, 0.0)),
            group((0.0, 30.0), (300.0, 45.0)),
            group((310.0, 60.0), (5.0, 50.0)),
            group((50.0, -20.0), (200.0, 10.0)),
            group((0.0, 0.0), (0.0, 300.0)),
            group((100.0, 100.0), (180.0, 140.0)),
        ];
        for a in &groups {
            for b in &groups {
                assert_eq!(compatibility(a, b, 0.0), compatibility(b, a, 0.0));
            }
        }
    }

    #[test]
    fn test_parallel_neighbours_are_compatible() {
        let a = group((0.0, 0.0), (300.0, 0.0));
        let b = group((0.0, 30.0), (300.0, 30.0));
        let (score, reversed) = compatibility(&a, &b, 0.2).unwrap();
        assert!((score - 300.0 / 330.0).abs() < 1e-4, "{score}");
        assert!(!reversed);

        let c = group((300.0, 30.0), (0.0, 30.0));
        let (_, reversed) = compatibility(&a, &c, 0.2).unwrap();
        assert!(reversed);
    }

    #[test]
    fn test_incompatible_pairs_are_rejected() {
        let a = group((0.0, 0.0), (300.0, 0.0));
        // Perpendicular
        assert_eq!(compatibility(&a, &group((150.0, 10.0), (150.0, 310.0)), 0.2), None);
        // Far away
        assert_eq!(compatibility(&a, &group((0.0, 3000.0), (300.0, 3000.0)), 0.2), None);
        // Very different lengths
        assert_eq!(compatibility(&a, &group((0.0, 10.0), (10.0, 10.0)), 0.2), None);
    }

    #[test]
    fn test_zero_length_groups_are_never_compatible() {
        let a = group((0.0, 0.0), (300.0, 0.0));
        let b = group((10.0, 10.0), (10.0, 10.0));
        assert_eq!(b.length, 0.0);
        assert!(b.k.is_finite());
        assert_eq!(compatibility(&a, &b, 0.0), None);
        assert_eq!(compatibility(&b, &b, 0.0), None);
    }

    #[test]
    fn test_partial_linking_keeps_unaffected_links() {
        let params = EdgeBundlingParams::default();
        let mut groups = vec![
            group((0.0, 0.0), (300.0, 0.0)),
            group((0.0, 30.0), (300.0, 30.0)),
            group((0.0, 60.0), (300.0, 60.0)),
        ];
        assert_eq!(link_compatible(&mut groups, &params, None), 3);
        let before = groups.clone();

        // Move the last group away, only its links change
        groups[2] = group((0.0, 5000.0), (300.0, 5000.0));
        let affected = HashSet::from([2]);
        assert_eq!(link_compatible(&mut groups, &params, Some(&affected)), 0);

        assert!(groups[2].compatible.is_empty());
        assert_eq!(groups[0].compatible, before[0].compatible[..1]);
        assert_eq!(groups[1].compatible, before[1].compatible[..1]);
    }
}
