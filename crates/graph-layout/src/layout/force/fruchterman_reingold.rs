use super::{jitter, ForceGraph};
use crate::layout::{rng, LayoutAlgorithm, LayoutInput};
use crate::{CancellationToken, LayoutError, PositionMap, Vec2, EPSILON};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fruchterman-Reingold spring embedder with linear cooling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FruchtermanReingold {
    pub iterations: usize,
    /// Distance at which attraction and repulsion balance
    pub ideal_edge_length: f32,
    /// Maximum displacement in the first iteration, decreases linearly to zero
    pub initial_temperature: f32,
    pub seed: Option<u64>,
}

impl Default for FruchtermanReingold {
    fn default() -> Self {
        Self {
            iterations: 200,
            ideal_edge_length: 80.0,
            initial_temperature: 100.0,
            seed: None,
        }
    }
}

impl LayoutAlgorithm for FruchtermanReingold {
    fn compute(
        &self,
        input: &LayoutInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError> {
        if input.is_trivial() {
            return Ok(input.passthrough());
        }

        let graph = ForceGraph::new(input);
        let n = graph.len();
        let k = self.ideal_edge_length.max(EPSILON);
        let extent = (k * (n as f32).sqrt() * 2.0).max(1.0);
        let mut rng = rng(self.seed);
        let mut centers = graph.initial_centers(input, &mut rng, extent);

        let mut iteration = 0;
        while iteration < self.iterations && !cancel.is_cancelled() {
            let temperature =
                self.initial_temperature * (1.0 - iteration as f32 / self.iterations as f32);
            let mut displacement = vec![Vec2::zero(); n];

            for i in 0..n {
                for j in i + 1..n {
                    let mut delta = centers[i] - centers[j];
                    if delta.length() < EPSILON {
                        delta = jitter(i, j);
                    }
                    let distance = delta.length().max(0.01);
                    let force = delta / distance * (k * k / distance);
                    displacement[i] += force;
                    displacement[j] -= force;
                }
            }

            for &(u, v, weight) in &graph.edges {
                let delta = centers[u] - centers[v];
                let distance = delta.length();
                if distance < EPSILON {
                    continue;
                }
                let force = delta / distance * (distance * distance / k * weight);
                displacement[u] -= force;
                displacement[v] += force;
            }

            for (center, offset) in centers.iter_mut().zip(&displacement) {
                let length = offset.length();
                if length > EPSILON {
                    *center += *offset / length * length.min(temperature);
                }
            }

            iteration += 1;
        }

        debug!(
            "Fruchterman-Reingold placed {n} vertices in {iteration} iterations{}",
            if cancel.is_cancelled() { " (cancelled)" } else { "" }
        );

        Ok(input.from_centers(graph.into_centers(centers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LayoutGraph, Point, SizeMap};
    use test_log::test;

    #[test]
    fn test_connected_vertices_end_up_closer() {
        // a - b, c alone
        let mut graph = LayoutGraph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let c = graph.add_vertex();
        graph.add_edge(a, b).unwrap();
        let sizes = SizeMap::new();

        let layout = FruchtermanReingold {
            seed: Some(7),
            ..Default::default()
        };
        let positions = layout
            .compute(&LayoutInput::new(&graph, &sizes), &CancellationToken::new())
            .unwrap();

        let ab = positions[&a].distance(positions[&b]);
        let ac = positions[&a].distance(positions[&c]);
        let bc = positions[&b].distance(positions[&c]);
        assert!(ab < ac && ab < bc, "ab={ab} ac={ac} bc={bc}");
    }

    #[test]
    fn test_coincident_seeds_are_separated() {
        let mut graph = LayoutGraph::new();
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        graph.add_edge(a, b).unwrap();
        let sizes = SizeMap::new();
        let seeds = [(a, Point::origin()), (b, Point::origin())].into();

        let positions = FruchtermanReingold::default()
            .compute(
                &LayoutInput::new(&graph, &sizes).with_seeds(&seeds),
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(positions[&a].distance(positions[&b]) > 1.0);
    }
}
