use super::ForceGraph;
use crate::layout::{rng, LayoutAlgorithm, LayoutInput};
use crate::{CancellationToken, LayoutError, Point, PositionMap};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Inverted self-organizing map (Meyer)
///
/// Each epoch draws a random stimulus, pulls the closest vertex towards it and
/// drags its graph neighbourhood along with a strength halving per hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Isom {
    pub max_epochs: usize,
    /// Epochs between two neighbourhood radius decrements
    pub radius_constant_time: usize,
    pub initial_radius: usize,
    pub min_radius: usize,
    pub initial_adaption: f32,
    pub min_adaption: f32,
    pub cooling_factor: f32,
    /// Side of the square stimuli are drawn from, scaled by the square root of
    /// the vertex count
    pub extent_per_vertex: f32,
    pub seed: Option<u64>,
}

impl Default for Isom {
    fn default() -> Self {
        Self {
            max_epochs: 2000,
            radius_constant_time: 100,
            initial_radius: 5,
            min_radius: 1,
            initial_adaption: 0.9,
            min_adaption: 0.0,
            cooling_factor: 2.0,
            extent_per_vertex: 100.0,
            seed: None,
        }
    }
}

impl Isom {
    fn adapt(
        &self,
        graph: &ForceGraph,
        centers: &mut [Point],
        winner: usize,
        stimulus: Point,
        radius: usize,
        adaption: f32,
    ) {
        let mut distances = vec![usize::MAX; graph.len()];
        let mut queue = VecDeque::from([winner]);
        distances[winner] = 0;

        while let Some(u) = queue.pop_front() {
            let hops = distances[u];
            let factor = adaption / 2f32.powi(hops as i32);
            let center = centers[u];
            centers[u] = center.lerp(stimulus, factor);

            if hops < radius {
                for &v in &graph.neighbors[u] {
                    if distances[v] == usize::MAX {
                        distances[v] = hops + 1;
                        queue.push_back(v);
                    }
                }
            }
        }
    }
}

impl LayoutAlgorithm for Isom {
    fn compute(
        &self,
        input: &LayoutInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError> {
        if input.is_trivial() {
            return Ok(input.passthrough());
        }

        let graph = ForceGraph::new(input);
        let extent = (self.extent_per_vertex * (graph.len() as f32).sqrt()).max(1.0);
        let mut rng = rng(self.seed);
        let mut centers = graph.initial_centers(input, &mut rng, extent);
        let mut radius = self.initial_radius;

        let mut epoch = 0;
        while epoch < self.max_epochs && !cancel.is_cancelled() {
            let progress = epoch as f32 / self.max_epochs as f32;
            let adaption = (self.initial_adaption * (-self.cooling_factor * progress).exp())
                .max(self.min_adaption);
            if self.radius_constant_time > 0
                && epoch > 0
                && epoch % self.radius_constant_time == 0
                && radius > self.min_radius
            {
                radius -= 1;
            }

            let stimulus = Point::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent));
            let winner = centers
                .iter()
                .enumerate()
                .min_by(|a, b| {
                    a.1.distance(stimulus)
                        .total_cmp(&b.1.distance(stimulus))
                        .then(a.0.cmp(&b.0))
                })
                .map(|(i, _)| i);

            if let Some(winner) = winner {
                self.adapt(&graph, &mut centers, winner, stimulus, radius, adaption);
            }
            epoch += 1;
        }

        debug!("ISOM placed {} vertices in {epoch} epochs", graph.len());

        Ok(input.from_centers(graph.into_centers(centers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LayoutGraph, SizeMap};
    use test_log::test;

    #[test]
    fn test_positions_stay_near_stimulus_area() {
        let mut graph = LayoutGraph::new();
        let ids: Vec<_> = (0..9).map(|_| graph.add_vertex()).collect();
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1]).unwrap();
        }
        let sizes = SizeMap::new();
        let layout = Isom {
            seed: Some(11),
            ..Default::default()
        };
        let positions = layout
            .compute(&LayoutInput::new(&graph, &sizes), &CancellationToken::new())
            .unwrap();

        // Vertices only ever move towards stimuli drawn inside the square
        let extent = layout.extent_per_vertex * 3.0;
        for position in positions.values() {
            assert!((0.0..=extent).contains(&position.x));
            assert!((0.0..=extent).contains(&position.y));
        }
    }
}
