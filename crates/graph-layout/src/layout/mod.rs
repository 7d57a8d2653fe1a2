//! Vertex placement algorithms
//!
//! Every algorithm implements [`LayoutAlgorithm`]. The built-in ones are
//! gathered in the [`LayoutParams`] sum type, whose variants double as the
//! parameter objects of each algorithm.

pub mod force;
pub mod layered;
mod random;
mod tree;

pub use force::{FruchtermanReingold, Isom, KamadaKawai, LinLog};
pub use layered::{LayeredLayout, Layers};
pub use random::RandomLayout;
pub use tree::{TreeLayout, TreeStyle};

use crate::{
    CancellationToken, LayoutError, LayoutGraph, Point, PositionMap, SizeMap, VertexId,
    VertexSizes,
};
use enum_dispatch::enum_dispatch;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a layout algorithm reads
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    pub graph: &'a LayoutGraph,
    /// Measured vertex sizes, missing entries count as zero
    pub sizes: &'a SizeMap,
    /// Existing positions to start from
    pub seeds: Option<&'a PositionMap>,
}

impl<'a> LayoutInput<'a> {
    pub fn new(graph: &'a LayoutGraph, sizes: &'a SizeMap) -> Self {
        Self {
            graph,
            sizes,
            seeds: None,
        }
    }

    pub fn with_seeds(mut self, seeds: &'a PositionMap) -> Self {
        self.seeds = Some(seeds);
        self
    }

    pub(crate) fn seed(&self, vertex: VertexId) -> Option<Point> {
        self.seeds.and_then(|seeds| seeds.get(&vertex)).copied()
    }

    /// Seed positions for every vertex, origin where there is none
    pub(crate) fn passthrough(&self) -> PositionMap {
        self.graph
            .vertices()
            .map(|v| (v.id, self.seed(v.id).unwrap_or_default()))
            .collect()
    }

    /// Graphs with fewer than two participating vertices need no layout
    pub(crate) fn is_trivial(&self) -> bool {
        self.graph.layout_vertices().nth(1).is_none()
    }

    /// Fill in the vertices an algorithm did not place
    pub(crate) fn complete(&self, mut positions: PositionMap) -> PositionMap {
        for vertex in self.graph.vertices() {
            positions
                .entry(vertex.id)
                .or_insert_with(|| self.seed(vertex.id).unwrap_or_default());
        }
        positions
    }

    /// Convert vertex centers to top-left positions
    pub(crate) fn from_centers(&self, centers: HashMap<VertexId, Point>) -> PositionMap {
        let positions = centers
            .into_iter()
            .map(|(id, center)| (id, center - self.sizes.size(id) / 2.0))
            .collect();
        self.complete(positions)
    }
}

/// A vertex placement strategy
#[enum_dispatch]
pub trait LayoutAlgorithm {
    /// Compute a position for every vertex of the graph
    ///
    /// Iterative algorithms poll `cancel` at each outer iteration and return
    /// the positions of the last completed iteration once it is set.
    fn compute(
        &self,
        input: &LayoutInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError>;
}

/// Built-in layout algorithms, each variant carrying its parameters
#[enum_dispatch(LayoutAlgorithm)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayoutParams {
    KamadaKawai(KamadaKawai),
    FruchtermanReingold(FruchtermanReingold),
    Isom(Isom),
    LinLog(LinLog),
    Layered(LayeredLayout),
    Tree(TreeLayout),
    Random(RandomLayout),
}

impl LayoutParams {
    /// Fix the random seed of the algorithms that use one
    pub fn set_seed(&mut self, seed: u64) {
        match self {
            LayoutParams::KamadaKawai(params) => params.seed = Some(seed),
            LayoutParams::FruchtermanReingold(params) => params.seed = Some(seed),
            LayoutParams::Isom(params) => params.seed = Some(seed),
            LayoutParams::LinLog(params) => params.seed = Some(seed),
            LayoutParams::Random(params) => params.seed = Some(seed),
            LayoutParams::Layered(_) | LayoutParams::Tree(_) => {}
        }
    }
}

/// Layout implemented outside of this crate
pub type CustomLayout = Arc<dyn LayoutAlgorithm + Send + Sync>;

/// Random generator seeded for reproducible runs when a seed is given
pub(crate) fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Vec2;
    use test_log::test;

    /// A square with one diagonal, all vertices 20x10
    pub(crate) fn sample_graph() -> (LayoutGraph, SizeMap) {
        let mut graph = LayoutGraph::new();
        let ids: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)] {
            graph.add_edge(ids[a], ids[b]).unwrap();
        }
        let sizes = ids.iter().map(|&id| (id, Vec2::new(20.0, 10.0))).collect();
        (graph, sizes)
    }

    pub(crate) fn all_algorithms() -> Vec<LayoutParams> {
        vec![
            LayoutParams::KamadaKawai(KamadaKawai {
                seed: Some(1),
                ..Default::default()
            }),
            LayoutParams::FruchtermanReingold(FruchtermanReingold {
                seed: Some(1),
                ..Default::default()
            }),
            LayoutParams::Isom(Isom {
                seed: Some(1),
                ..Default::default()
            }),
            LayoutParams::LinLog(LinLog {
                seed: Some(1),
                ..Default::default()
            }),
            LayoutParams::Layered(LayeredLayout::default()),
            LayoutParams::Tree(TreeLayout::default()),
            LayoutParams::Random(RandomLayout {
                seed: Some(1),
                ..Default::default()
            }),
        ]
    }

    #[test]
    fn test_trivial_graphs_short_circuit() {
        let sizes = SizeMap::new();
        let empty = LayoutGraph::new();

        let mut single = LayoutGraph::new();
        let v = single.add_vertex();
        let seeds: PositionMap = [(v, Point::new(3.0, 4.0))].into();

        let mut skipped = LayoutGraph::new();
        let a = skipped.add_vertex();
        let b = skipped.add_vertex();
        skipped.add_edge(a, b).unwrap();
        skipped.set_skip(b, true).unwrap();

        for algorithm in all_algorithms() {
            let positions = algorithm
                .compute(&LayoutInput::new(&empty, &sizes), &CancellationToken::new())
                .unwrap();
            assert!(positions.is_empty());

            let positions = algorithm
                .compute(
                    &LayoutInput::new(&single, &sizes).with_seeds(&seeds),
                    &CancellationToken::new(),
                )
                .unwrap();
            assert_eq!(positions[&v], Point::new(3.0, 4.0));

            let positions = algorithm
                .compute(&LayoutInput::new(&skipped, &sizes), &CancellationToken::new())
                .unwrap();
            assert_eq!(positions.len(), 2);
            assert_eq!(positions[&a], Point::origin());
        }
    }

    #[test]
    fn test_every_vertex_gets_a_finite_position() {
        let (graph, sizes) = sample_graph();
        for algorithm in all_algorithms() {
            let positions = algorithm
                .compute(&LayoutInput::new(&graph, &sizes), &CancellationToken::new())
                .unwrap();
            assert_eq!(positions.len(), graph.vertex_count(), "{algorithm:?}");
            assert!(positions.values().all(|p| p.is_finite()), "{algorithm:?}");
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let (graph, sizes) = sample_graph();
        for algorithm in all_algorithms() {
            let input = LayoutInput::new(&graph, &sizes);
            let first = algorithm.compute(&input, &CancellationToken::new()).unwrap();
            let second = algorithm.compute(&input, &CancellationToken::new()).unwrap();
            assert_eq!(first, second, "{algorithm:?}");
        }
    }

    #[test]
    fn test_cancelled_run_returns_complete_positions() {
        let (graph, sizes) = sample_graph();
        let cancel = CancellationToken::new();
        cancel.cancel();
        for algorithm in all_algorithms() {
            let positions = algorithm
                .compute(&LayoutInput::new(&graph, &sizes), &cancel)
                .unwrap();
            assert_eq!(positions.len(), graph.vertex_count(), "{algorithm:?}");
            assert!(positions.values().all(|p| p.is_finite()), "{algorithm:?}");
        }
    }
}
