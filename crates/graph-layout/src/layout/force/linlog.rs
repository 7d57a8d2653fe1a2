use super::{jitter, ForceGraph};
use crate::layout::{rng, LayoutAlgorithm, LayoutInput};
use crate::{CancellationToken, LayoutError, Point, PositionMap, Vec2, EPSILON};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Noack's LinLog energy model
///
/// Edges attract linearly with distance, vertex pairs repel logarithmically
/// (weighted by degree, the edge-repulsion variant), and a weak gravitation
/// keeps components together. Minimised by gradient descent in a unit space,
/// scaled to drawing units at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinLog {
    pub iterations: usize,
    pub attraction_exponent: f32,
    pub gravitation: f32,
    /// Maximum step of a vertex in unit space during the first iteration
    pub initial_step: f32,
    /// Drawing units per unit of the energy space
    pub scale: f32,
    pub seed: Option<u64>,
}

impl Default for LinLog {
    fn default() -> Self {
        Self {
            iterations: 150,
            attraction_exponent: 1.0,
            gravitation: 0.05,
            initial_step: 0.5,
            scale: 100.0,
            seed: None,
        }
    }
}

impl LinLog {
    fn gradient(
        &self,
        graph: &ForceGraph,
        centers: &[Point],
        weights: &[f32],
        repulsion: f32,
    ) -> Vec<Vec2> {
        let n = graph.len();
        let mut gradient = vec![Vec2::zero(); n];

        for &(u, v, weight) in &graph.edges {
            let delta = centers[u] - centers[v];
            let distance = delta.length();
            if distance < EPSILON {
                continue;
            }
            let force = delta / distance
                * (weight * distance.powf(self.attraction_exponent - 1.0));
            gradient[u] += force;
            gradient[v] -= force;
        }

        for i in 0..n {
            for j in i + 1..n {
                let mut delta = centers[i] - centers[j];
                if delta.length() < EPSILON {
                    delta = jitter(i, j);
                }
                let distance = delta.length().max(0.01);
                let force = delta / (distance * distance) * (repulsion * weights[i] * weights[j]);
                gradient[i] -= force;
                gradient[j] += force;
            }
        }

        let barycenter = centers.iter().fold(Vec2::zero(), |acc, c| acc + c.to_vec()) / n as f32;
        for (i, center) in centers.iter().enumerate() {
            let delta = center.to_vec() - barycenter;
            let distance = delta.length();
            if distance > EPSILON {
                gradient[i] += delta / distance * (self.gravitation * weights[i]);
            }
        }

        gradient
    }
}

impl LayoutAlgorithm for LinLog {
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
        let scale = self.scale.max(EPSILON);

        // Vertices without edges still repel a little
        let mut weights = vec![0.0f32; n];
        for &(u, v, weight) in &graph.edges {
            weights[u] += weight;
            weights[v] += weight;
        }
        for weight in &mut weights {
            *weight = weight.max(1.0);
        }
        let total_edge_weight: f32 = graph.edges.iter().map(|e| e.2).sum::<f32>().max(1.0);
        let total_weight: f32 = weights.iter().sum();
        let repulsion = total_edge_weight / (total_weight * total_weight) * n as f32;

        let mut rng = rng(self.seed);
        let extent = (n as f32).sqrt().max(1.0) * scale;
        let mut centers: Vec<Point> = graph
            .initial_centers(input, &mut rng, extent)
            .into_iter()
            .map(|c| Point::new(c.x / scale, c.y / scale))
            .collect();

        let mut iteration = 0;
        while iteration < self.iterations && !cancel.is_cancelled() {
            let step = self.initial_step * (1.0 - iteration as f32 / self.iterations as f32);
            let gradient = self.gradient(&graph, &centers, &weights, repulsion);
            for (center, g) in centers.iter_mut().zip(&gradient) {
                let length = g.length();
                if length > EPSILON {
                    *center -= *g / length * length.min(step);
                }
            }
            iteration += 1;
        }

        debug!("LinLog placed {n} vertices in {iteration} iterations");

        let centers = centers
            .into_iter()
            .map(|c| Point::new(c.x * scale, c.y * scale))
            .collect();
        Ok(input.from_centers(graph.into_centers(centers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LayoutGraph, SizeMap};
    use test_log::test;

    #[test]
    fn test_clusters_are_tighter_than_the_bridge() {
        // Two triangles joined by a single edge
        let mut graph = LayoutGraph::new();
        let ids: Vec<_> = (0..6).map(|_| graph.add_vertex()).collect();
        for (a, b) in [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (2, 3)] {
            graph.add_edge(ids[a], ids[b]).unwrap();
        }
        let sizes = SizeMap::new();
        let layout = LinLog {
            seed: Some(5),
            ..Default::default()
        };
        let positions = layout
            .compute(&LayoutInput::new(&graph, &sizes), &CancellationToken::new())
            .unwrap();

        let inner = positions[&ids[0]].distance(positions[&ids[1]]);
        let across = positions[&ids[0]].distance(positions[&ids[5]]);
        assert!(inner < across, "inner={inner} across={across}");
    }
}
