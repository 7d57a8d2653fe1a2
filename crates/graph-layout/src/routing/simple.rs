use super::{oriented, EdgeRoutes, EdgeRouting, RoutingInput};
use crate::{CancellationToken, EdgeId, LayoutError, Point, Rect, Vec2, VertexId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Outline used to find where an edge leaves a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VertexShape {
    #[default]
    Rectangle,
    /// Circle inscribed in the vertex rectangle
    Circle,
}

impl VertexShape {
    fn exit_point(self, rect: &Rect, origin: Point, direction: Vec2) -> Point {
        match self {
            VertexShape::Rectangle => rect.exit_point(origin, direction),
            VertexShape::Circle => rect.circle_exit_point(origin, direction),
        }
    }

    /// Vertex center moved by `shift`, kept inside the shape
    fn anchor(self, rect: &Rect, shift: Vec2) -> Point {
        match self {
            VertexShape::Rectangle => rect.clamp(rect.center() + shift),
            VertexShape::Circle => {
                let radius = rect.width.min(rect.height) / 2.0;
                let length = shift.length();
                if length > radius {
                    rect.center() + shift * (radius / length)
                } else {
                    rect.center() + shift
                }
            }
        }
    }

    /// Straight connection between two vertex outlines
    pub(crate) fn endpoints(self, source: &Rect, target: &Rect, shift: Vec2) -> [Point; 2] {
        let from = self.anchor(source, shift);
        let to = self.anchor(target, shift);
        let direction = to - from;
        [
            self.exit_point(source, from, direction),
            self.exit_point(target, to, -direction),
        ]
    }
}

/// Straight edges from boundary to boundary
///
/// Edges sharing the same pair of vertices, in either direction, are spread
/// apart by `parallel_edge_distance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleRouter {
    pub shape: VertexShape,
    pub parallel_edge_distance: f32,
}

impl Default for SimpleRouter {
    fn default() -> Self {
        Self {
            shape: VertexShape::Rectangle,
            parallel_edge_distance: 10.0,
        }
    }
}

impl SimpleRouter {
    /// Lateral offset of every routable edge
    ///
    /// Offsets are measured along the left normal of the direction going from
    /// the lower to the higher vertex id. Within a vertex pair, edges in that
    /// direction come first, then the opposite ones, each by ascending id, and
    /// the offsets are centered on zero. A lone edge gets no offset.
    pub fn parallel_offsets(&self, input: &RoutingInput<'_>) -> HashMap<EdgeId, f32> {
        let mut pairs: BTreeMap<(VertexId, VertexId), (Vec<EdgeId>, Vec<EdgeId>)> =
            BTreeMap::new();
        for edge in input.routable_edges() {
            let key = (edge.source.min(edge.target), edge.source.max(edge.target));
            let (forward, backward) = pairs.entry(key).or_default();
            if edge.source == key.0 {
                forward.push(edge.id);
            } else {
                backward.push(edge.id);
            }
        }

        let mut offsets = HashMap::new();
        for (forward, backward) in pairs.into_values() {
            let middle = (forward.len() + backward.len() - 1) as f32 / 2.0;
            for (i, id) in forward.into_iter().chain(backward).enumerate() {
                offsets.insert(id, (i as f32 - middle) * self.parallel_edge_distance);
            }
        }
        offsets
    }
}

impl EdgeRouting for SimpleRouter {
    fn compute(
        &mut self,
        input: &RoutingInput<'_>,
        _cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError> {
        let offsets = self.parallel_offsets(input);
        let mut routes = EdgeRoutes::new();

        for edge in input.routable_edges() {
            let (Some(source), Some(target)) = (input.rect(edge.source), input.rect(edge.target))
            else {
                continue;
            };

            let offset = offsets.get(&edge.id).copied().unwrap_or(0.0);
            let shift = if offset == 0.0 {
                Vec2::zero()
            } else {
                let (low, high) = if edge.source < edge.target {
                    (source, target)
                } else {
                    (target, source)
                };
                (high.center() - low.center()).normalized().perpendicular() * offset
            };

            let route = self.shape.endpoints(&source, &target, shift).to_vec();
            routes.insert(edge.id, oriented(edge, route));
        }
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::tests::row;
    use crate::{LayoutGraph, PositionMap, RectMap};
    use test_log::test;

    fn assert_near(a: Point, b: Point) {
        assert!(a.distance(b) < 1e-3, "{a:?} != {b:?}");
    }

    fn two_squares(target: Point) -> (LayoutGraph, EdgeId, PositionMap, RectMap) {
        let mut graph = LayoutGraph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let edge = graph.add_edge(a, b).unwrap();
        let positions: PositionMap = [(a, Point::origin()), (b, target)].into();
        let rects = positions
            .iter()
            .map(|(&id, &p)| (id, Rect::from_position(p, Vec2::new(20.0, 20.0))))
            .collect();
        (graph, edge, positions, rects)
    }

    #[test]
    fn test_endpoints_lie_on_the_facing_sides() {
        let (graph, edge, positions, rects) = two_squares(Point::new(80.0, 0.0));
        let routes = SimpleRouter::default()
            .compute(
                &RoutingInput::new(&graph, &positions, &rects),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(routes[&edge].len(), 2);
        assert_near(routes[&edge][0], Point::new(20.0, 10.0));
        assert_near(routes[&edge][1], Point::new(80.0, 10.0));

        let (graph, edge, positions, rects) = two_squares(Point::new(100.0, 0.0));
        let routes = SimpleRouter::default()
            .compute(
                &RoutingInput::new(&graph, &positions, &rects),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_near(routes[&edge][0], Point::new(20.0, 10.0));
        assert_near(routes[&edge][1], Point::new(100.0, 10.0));
    }

    #[test]
    fn test_circle_endpoints_lie_on_the_inscribed_circle() {
        let (graph, edge, positions, rects) = two_squares(Point::new(100.0, 100.0));
        let mut router = SimpleRouter {
            shape: VertexShape::Circle,
            ..Default::default()
        };
        let routes = router
            .compute(
                &RoutingInput::new(&graph, &positions, &rects),
                &CancellationToken::new(),
            )
            .unwrap();
        let d = 10.0 / 2.0f32.sqrt();
        assert_near(routes[&edge][0], Point::new(10.0 + d, 10.0 + d));
        assert_near(routes[&edge][1], Point::new(110.0 - d, 110.0 - d));
    }

    #[test]
    fn test_parallel_edges_get_distinct_symmetric_offsets() {
        let (mut graph, ids, positions, rects) = row(2);
        let forward = [
            graph.add_edge(ids[0], ids[1]).unwrap(),
            graph.add_edge(ids[0], ids[1]).unwrap(),
        ];
        let backward = [
            graph.add_edge(ids[1], ids[0]).unwrap(),
            graph.add_edge(ids[1], ids[0]).unwrap(),
        ];
        let input = RoutingInput::new(&graph, &positions, &rects);
        let mut router = SimpleRouter {
            parallel_edge_distance: 4.0,
            ..Default::default()
        };

        let offsets = router.parallel_offsets(&input);
        let mut values: Vec<f32> = offsets.values().copied().collect();
        values.sort_by(f32::total_cmp);
        assert_eq!(values, vec![-6.0, -2.0, 2.0, 6.0]);
        assert!(forward.iter().all(|id| offsets[id] < 0.0));
        assert!(backward.iter().all(|id| offsets[id] > 0.0));

        // Horizontal pair, the offsets end up on the y axis
        let routes = router.compute(&input, &CancellationToken::new()).unwrap();
        let mut ys: Vec<f32> = routes.values().map(|route| route[0].y).collect();
        ys.sort_by(f32::total_cmp);
        assert_eq!(ys, vec![4.0, 8.0, 12.0, 16.0]);
        for route in routes.values() {
            assert_eq!(route[0].y, route[1].y);
        }
    }

    #[test]
    fn test_single_edge_has_no_offset() {
        let (mut graph, ids, positions, rects) = row(2);
        let edge = graph.add_edge(ids[1], ids[0]).unwrap();
        let offsets = SimpleRouter::default()
            .parallel_offsets(&RoutingInput::new(&graph, &positions, &rects));
        assert_eq!(offsets[&edge], 0.0);
    }
}
