//! Force-directed layouts
//!
//! All of them work on vertex centers in an index-addressed arena and convert
//! back to top-left positions once done.

mod fruchterman_reingold;
mod isom;
mod kamada_kawai;
mod linlog;

pub use fruchterman_reingold::FruchtermanReingold;
pub use isom::Isom;
pub use kamada_kawai::KamadaKawai;
pub use linlog::LinLog;

use super::LayoutInput;
use crate::{Point, Vec2, VertexId, VertexSizes};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{HashMap, VecDeque};

/// Undirected, index-addressed copy of the participating part of a graph
pub(crate) struct ForceGraph {
    pub ids: Vec<VertexId>,
    /// `(u, v, multiplicity)` with `u != v`
    pub edges: Vec<(usize, usize, f32)>,
    pub neighbors: Vec<Vec<usize>>,
}

impl ForceGraph {
    pub fn new(input: &LayoutInput<'_>) -> Self {
        let view = input.graph.undirected_view();
        let mut ids: Vec<VertexId> = view.nodes().collect();
        ids.sort();
        let index: HashMap<VertexId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut edges = Vec::new();
        let mut neighbors = vec![Vec::new(); ids.len()];
        for (a, b, &weight) in view.all_edges() {
            let (u, v) = (index[&a], index[&b]);
            edges.push((u, v, weight as f32));
            neighbors[u].push(v);
            neighbors[v].push(u);
        }
        edges.sort_by_key(|&(u, v, _)| (u, v));
        for list in &mut neighbors {
            list.sort_unstable();
        }

        Self {
            ids,
            edges,
            neighbors,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Hop distances from `source`, `None` for unreachable vertices
    pub fn bfs_distances(&self, source: usize) -> Vec<Option<usize>> {
        let mut distances = vec![None; self.len()];
        let mut queue = VecDeque::from([source]);
        distances[source] = Some(0);
        while let Some(u) = queue.pop_front() {
            let next = distances[u].map_or(0, |d| d + 1);
            for &v in &self.neighbors[u] {
                if distances[v].is_none() {
                    distances[v] = Some(next);
                    queue.push_back(v);
                }
            }
        }
        distances
    }

    /// Starting centers: seeds when available, random within `extent` otherwise
    pub fn initial_centers(
        &self,
        input: &LayoutInput<'_>,
        rng: &mut StdRng,
        extent: f32,
    ) -> Vec<Point> {
        self.ids
            .iter()
            .map(|&id| {
                // Always draw so seeded and unseeded vertices get stable streams
                let random = Point::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent));
                input
                    .seed(id)
                    .map(|seed| seed + input.sizes.size(id) / 2.0)
                    .unwrap_or(random)
            })
            .collect()
    }

    pub fn into_centers(&self, centers: Vec<Point>) -> HashMap<VertexId, Point> {
        self.ids.iter().copied().zip(centers).collect()
    }
}

/// Small deterministic push apart for coincident vertices
pub(crate) fn jitter(i: usize, j: usize) -> Vec2 {
    let angle = (i * 31 + j * 17) as f32;
    Vec2::new(angle.cos(), angle.sin()) * 0.01
}
