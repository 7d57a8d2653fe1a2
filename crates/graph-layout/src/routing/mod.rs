//! Edge routing
//!
//! Routers turn final vertex rectangles into one polyline per edge, from the
//! source boundary to the target boundary. Self-loops never get a route, the
//! renderer draws them as a fixed shape next to their vertex.

pub mod bundling;
mod pathfinder;
mod simple;

pub use bundling::{EdgeBundler, EdgeBundlingParams, EdgeGroupData};
pub use pathfinder::PathFinderRouter;
pub use simple::{SimpleRouter, VertexShape};

use crate::geometry::bounding_rect;
use crate::{
    CancellationToken, Edge, EdgeId, LayoutError, LayoutGraph, Point, PositionMap, Rect, RectMap,
    Vec2, VertexId,
};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Edge id to routed polyline, from the source boundary to the target one
///
/// Routes of edges flagged with `reverse_path` run from target to source.
pub type EdgeRoutes = HashMap<EdgeId, Vec<Point>>;

/// Everything an edge router reads
#[derive(Debug, Clone, Copy)]
pub struct RoutingInput<'a> {
    pub graph: &'a LayoutGraph,
    pub positions: &'a PositionMap,
    /// Final vertex rectangles, after overlap removal
    pub rectangles: &'a RectMap,
}

impl<'a> RoutingInput<'a> {
    pub fn new(
        graph: &'a LayoutGraph,
        positions: &'a PositionMap,
        rectangles: &'a RectMap,
    ) -> Self {
        Self {
            graph,
            positions,
            rectangles,
        }
    }

    /// Rectangle of a vertex, a point at its position when it has no size
    pub fn rect(&self, vertex: VertexId) -> Option<Rect> {
        self.rectangles.get(&vertex).copied().or_else(|| {
            self.positions
                .get(&vertex)
                .map(|&position| Rect::from_position(position, Vec2::zero()))
        })
    }

    /// Edges that get a route: no self-loops, both endpoints placed
    pub fn routable_edges(&self) -> impl Iterator<Item = &'a Edge> + '_ {
        self.graph.edges().filter(move |edge| {
            !edge.is_self_loop()
                && self.rect(edge.source).is_some()
                && self.rect(edge.target).is_some()
        })
    }

    pub(crate) fn bounds(&self) -> Option<Rect> {
        let rects: Vec<Rect> = self
            .graph
            .vertices()
            .filter_map(|vertex| self.rect(vertex.id))
            .collect();
        bounding_rect(&rects)
    }
}

/// An edge routing strategy
#[enum_dispatch]
pub trait EdgeRouting {
    /// Route every routable edge of the graph
    fn compute(
        &mut self,
        input: &RoutingInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError>;

    /// Recompute the routes of `edges`, merging them into `routes`
    ///
    /// Routes of unrelated edges are left untouched.
    fn recompute_edges(
        &mut self,
        input: &RoutingInput<'_>,
        edges: &[EdgeId],
        routes: &mut EdgeRoutes,
        cancel: &CancellationToken,
    ) -> Result<(), LayoutError> {
        let mut fresh = self.compute(input, cancel)?;
        for id in edges {
            match fresh.remove(id) {
                Some(route) => {
                    routes.insert(*id, route);
                }
                None => {
                    routes.remove(id);
                }
            }
        }
        Ok(())
    }
}

/// Router instances, the bundler keeps its edge groups between runs
#[enum_dispatch(EdgeRouting)]
#[derive(Debug, Clone)]
pub enum EdgeRouter {
    Simple(SimpleRouter),
    PathFinder(PathFinderRouter),
    Bundling(EdgeBundler),
}

/// Built-in router parameters, one variant per routing algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoutingParams {
    Simple(SimpleRouter),
    PathFinder(PathFinderRouter),
    Bundling(EdgeBundlingParams),
}

impl From<RoutingParams> for EdgeRouter {
    fn from(params: RoutingParams) -> Self {
        match params {
            RoutingParams::Simple(router) => EdgeRouter::Simple(router),
            RoutingParams::PathFinder(router) => EdgeRouter::PathFinder(router),
            RoutingParams::Bundling(params) => EdgeRouter::Bundling(EdgeBundler::new(params)),
        }
    }
}

/// Reverse a source to target route for edges drawn the other way
pub(crate) fn oriented(edge: &Edge, mut route: Vec<Point>) -> Vec<Point> {
    if edge.reverse_path {
        route.reverse();
    }
    route
}

/// Routes stored on the edges by a previous computation
pub fn existing_routes(graph: &LayoutGraph) -> EdgeRoutes {
    graph
        .edges()
        .filter_map(|edge| Some((edge.id, edge.routing_points.clone()?)))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use test_log::test;

    /// Vertices in a row of 20x20 squares, 100 apart
    pub(crate) fn row(count: usize) -> (LayoutGraph, Vec<VertexId>, PositionMap, RectMap) {
        let mut graph = LayoutGraph::new();
        let ids: Vec<_> = (0..count).map(|_| graph.add_vertex()).collect();
        let positions: PositionMap = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, Point::new(i as f32 * 100.0, 0.0)))
            .collect();
        let rects = positions
            .iter()
            .map(|(&id, &p)| (id, Rect::from_position(p, Vec2::new(20.0, 20.0))))
            .collect();
        (graph, ids, positions, rects)
    }

    pub(crate) fn all_routers() -> Vec<EdgeRouter> {
        vec![
            EdgeRouter::from(RoutingParams::Simple(SimpleRouter::default())),
            EdgeRouter::from(RoutingParams::PathFinder(PathFinderRouter::default())),
            EdgeRouter::from(RoutingParams::Bundling(EdgeBundlingParams {
                use_threading: false,
                ..Default::default()
            })),
        ]
    }

    #[test]
    fn test_self_loops_are_never_routed() {
        let (mut graph, ids, positions, rects) = row(2);
        let edge = graph.add_edge(ids[0], ids[1]).unwrap();
        let self_loop = graph.add_edge(ids[0], ids[0]).unwrap();

        for mut router in all_routers() {
            let input = RoutingInput::new(&graph, &positions, &rects);
            let routes = router.compute(&input, &CancellationToken::new()).unwrap();
            assert!(routes.contains_key(&edge), "{router:?}");
            assert!(!routes.contains_key(&self_loop), "{router:?}");
        }
    }

    #[test]
    fn test_routes_start_and_end_on_the_boundaries() {
        let (mut graph, ids, positions, rects) = row(3);
        let edges = [
            graph.add_edge(ids[0], ids[1]).unwrap(),
            graph.add_edge(ids[1], ids[2]).unwrap(),
            graph.add_edge(ids[2], ids[0]).unwrap(),
        ];
        let input = RoutingInput::new(&graph, &positions, &rects);
        let on_boundary = |rect: &Rect, p: Point| {
            rect.inflate(0.01, 0.01).contains(p) && !rect.inflate(-0.01, -0.01).contains(p)
        };

        for mut router in all_routers() {
            let routes = router.compute(&input, &CancellationToken::new()).unwrap();
            for id in edges {
                let edge = graph.edge(id).unwrap();
                let route = &routes[&id];
                assert!(route.len() >= 2, "{router:?}");
                assert!(route.iter().all(|p| p.is_finite()), "{router:?}");
                let (first, last) = (route[0], route[route.len() - 1]);
                assert!(on_boundary(&rects[&edge.source], first), "{router:?} {first:?}");
                assert!(on_boundary(&rects[&edge.target], last), "{router:?} {last:?}");
            }
        }
    }

    #[test]
    fn test_reverse_path_flips_the_route() {
        let (mut graph, ids, positions, rects) = row(2);
        let plain = graph.add_edge(ids[0], ids[1]).unwrap();
        let flipped = graph.add_edge(ids[0], ids[1]).unwrap();
        graph.edge_mut(flipped).unwrap().reverse_path = true;
        let input = RoutingInput::new(&graph, &positions, &rects);

        for mut router in all_routers() {
            let routes = router.compute(&input, &CancellationToken::new()).unwrap();
            let (plain, flipped) = (&routes[&plain], &routes[&flipped]);
            assert!(rects[&ids[0]].inflate(0.01, 0.01).contains(plain[0]), "{router:?}");
            assert!(rects[&ids[1]].inflate(0.01, 0.01).contains(flipped[0]), "{router:?}");
        }
    }

    #[test]
    fn test_routing_is_idempotent() {
        let (mut graph, ids, positions, rects) = row(4);
        for (a, b) in [(0, 1), (1, 2), (0, 2), (0, 3), (3, 1)] {
            graph.add_edge(ids[a], ids[b]).unwrap();
        }
        let input = RoutingInput::new(&graph, &positions, &rects);

        for mut router in all_routers() {
            let first = router.compute(&input, &CancellationToken::new()).unwrap();
            let second = router.compute(&input, &CancellationToken::new()).unwrap();
            assert_eq!(first.len(), second.len());
            for (id, route) in &first {
                let other = &second[id];
                assert_eq!(route.len(), other.len(), "{router:?}");
                for (a, b) in route.iter().zip(other) {
                    assert!(a.distance(*b) < 1e-3, "{router:?} {a:?} {b:?}");
                }
            }
        }
    }

    #[test]
    fn test_recompute_merges_only_the_requested_edges() {
        let (mut graph, ids, positions, rects) = row(3);
        let kept = graph.add_edge(ids[0], ids[1]).unwrap();
        let moved = graph.add_edge(ids[1], ids[2]).unwrap();
        let stale = vec![Point::new(-1.0, -1.0), Point::new(-2.0, -2.0)];

        for mut router in all_routers() {
            let mut routes: EdgeRoutes = [(kept, stale.clone()), (moved, stale.clone())].into();
            router
                .recompute_edges(
                    &RoutingInput::new(&graph, &positions, &rects),
                    &[moved],
                    &mut routes,
                    &CancellationToken::new(),
                )
                .unwrap();
            assert_eq!(routes[&kept], stale, "{router:?}");
            assert_ne!(routes[&moved], stale, "{router:?}");
        }
    }
}
