mod crossings;
mod layers;
mod positions;

use crate::layout::{LayoutAlgorithm, LayoutInput};
use crate::{CancellationToken, LayoutError, Point, PositionMap, Vec2, VertexSizes};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{IntoNeighborsDirected, IntoNodeIdentifiers};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

use crossings::minimize_crossings;
use layers::{acyclic_copy, assign_layers};
use positions::assign_coordinates;

/// Configuration for the layered (Sugiyama-style) layout
///
/// Layers run from left to right, vertices of a layer are stacked vertically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayeredLayout {
    /// Horizontal and vertical margins between vertices
    pub margin: Vec2,

    /// Maximum iterations for crossing minimization
    pub max_crossing_iterations: usize,

    /// Maximum iterations for vertical position optimization
    pub max_position_iterations: usize,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self {
            margin: Vec2::new(20.0, 20.0),
            max_crossing_iterations: 10,
            max_position_iterations: 50,
        }
    }
}

impl LayeredLayout {
    /// Create a new layered layout with the given margin
    pub fn new(margin: Vec2) -> Self {
        Self {
            margin,
            ..Default::default()
        }
    }
}

/// Layer structure that can be cached and reused
#[derive(Debug, Clone)]
pub struct Layers<N>
where
    N: Copy + Ord + Hash,
{
    /// Acyclic copy of the graph for efficient edge lookups
    pub(crate) graph: DiGraphMap<N, ()>,

    /// Vertices organized into topological layers
    pub nodes: Vec<Vec<N>>,

    /// Number of edge crossings (quality metric)
    pub crossings: usize,

    /// Edges that were reversed to break cycles, in their original direction
    pub reversed: Vec<(N, N)>,
}

impl LayeredLayout {
    /// Compute layer structure (expensive, cache this)
    ///
    /// This phase breaks cycles, assigns vertices to layers and minimizes edge
    /// crossings. It only depends on the graph structure, not on vertex sizes.
    pub fn compute_layers<G>(&self, graph: G, cancel: &CancellationToken) -> Layers<G::NodeId>
    where
        G: IntoNodeIdentifiers + IntoNeighborsDirected,
        G::NodeId: Copy + Ord + Hash,
    {
        let (acyclic, reversed) = acyclic_copy(graph);
        let layers = assign_layers(&acyclic);
        let (layers, crossings) =
            minimize_crossings(&acyclic, layers, self.max_crossing_iterations, cancel);

        Layers {
            graph: acyclic,
            nodes: layers,
            crossings,
            reversed,
        }
    }

    /// Compute positions from cached layers (cheap, rerun when sizes change)
    ///
    /// This phase assigns coordinates to vertices based on their layer
    /// structure and current sizes. It can be called repeatedly as sizes change.
    pub fn compute_positions<N, S>(
        &self,
        layers: &Layers<N>,
        sizes: &S,
        cancel: &CancellationToken,
    ) -> HashMap<N, Point>
    where
        N: Copy + Ord + Hash,
        S: VertexSizes<N>,
    {
        assign_coordinates(
            &layers.nodes,
            &layers.graph,
            sizes,
            self.margin,
            self.max_position_iterations,
            cancel,
        )
    }
}

impl LayoutAlgorithm for LayeredLayout {
    fn compute(
        &self,
        input: &LayoutInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError> {
        if input.is_trivial() {
            return Ok(input.passthrough());
        }

        let graph = input.graph.directed_view();
        let layers = self.compute_layers(&graph, cancel);
        debug!(
            "Layered {} vertices into {} layers, {} crossings, {} reversed edges",
            graph.node_count(),
            layers.nodes.len(),
            layers.crossings,
            layers.reversed.len()
        );

        let positions = self.compute_positions(&layers, input.sizes, cancel);
        Ok(input.complete(positions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LayoutGraph, SizeMap};
    use test_log::test;

    #[test]
    fn test_layers_follow_edge_direction() {
        let mut graph = DiGraphMap::new();
        graph.add_edge(1, 2, ());
        graph.add_edge(2, 3, ());
        graph.add_edge(1, 3, ());

        let layout = LayeredLayout::default();
        let layers = layout.compute_layers(&graph, &CancellationToken::new());
        assert_eq!(layers.nodes, vec![vec![1], vec![2], vec![3]]);
        assert!(layers.reversed.is_empty());

        let sizes = |_node| Vec2::new(100.0, 50.0);
        let positions = layout.compute_positions(&layers, &sizes, &CancellationToken::new());
        assert_eq!(positions[&1].x, 0.0);
        assert_eq!(positions[&2].x, 120.0);
        assert_eq!(positions[&3].x, 240.0);
    }

    #[test]
    fn test_cycles_are_broken_instead_of_failing() {
        let mut graph = DiGraphMap::new();
        graph.add_edge(1, 2, ());
        graph.add_edge(2, 3, ());
        graph.add_edge(3, 1, ());

        let layers = LayeredLayout::default().compute_layers(&graph, &CancellationToken::new());
        assert_eq!(layers.reversed, vec![(3, 1)]);
        assert_eq!(layers.nodes.iter().map(Vec::len).sum::<usize>(), 3);
    }

    #[test]
    fn test_vertices_in_a_layer_do_not_overlap() {
        let mut graph = LayoutGraph::new();
        let root = graph.add_vertex();
        let children: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
        for &child in &children {
            graph.add_edge(root, child).unwrap();
        }
        let sizes: SizeMap = graph
            .vertices()
            .map(|v| (v.id, Vec2::new(30.0, 40.0)))
            .collect();

        let positions = LayeredLayout::default()
            .compute(&LayoutInput::new(&graph, &sizes), &CancellationToken::new())
            .unwrap();

        let mut ys: Vec<f32> = children.iter().map(|c| positions[c].y).collect();
        ys.sort_by(f32::total_cmp);
        for pair in ys.windows(2) {
            assert!(pair[1] - pair[0] >= 60.0 - 1e-3);
        }
    }
}
