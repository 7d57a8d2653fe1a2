use super::{jitter, ForceGraph};
use crate::layout::{rng, LayoutAlgorithm, LayoutInput};
use crate::{CancellationToken, LayoutError, Point, PositionMap, EPSILON};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kamada-Kawai spring energy minimisation
///
/// Every vertex pair is joined by a spring whose rest length is proportional
/// to their graph theoretical distance. The vertex with the largest energy
/// gradient is moved by Newton-Raphson steps until all gradients fall below
/// `epsilon` or `max_iterations` is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KamadaKawai {
    pub max_iterations: usize,
    /// Newton-Raphson steps per moved vertex
    pub inner_iterations: usize,
    /// Desired length of a single edge
    pub edge_length: f32,
    /// Spring strength
    pub strength: f32,
    /// Stop when every vertex gradient is below this value
    pub epsilon: f32,
    /// Distance, in hops, used between vertices of different components,
    /// relative to the graph diameter
    pub disconnected_factor: f32,
    pub seed: Option<u64>,
}

impl Default for KamadaKawai {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            inner_iterations: 10,
            edge_length: 80.0,
            strength: 1.0,
            epsilon: 0.1,
            disconnected_factor: 1.5,
            seed: None,
        }
    }
}

struct Springs {
    /// Rest lengths
    length: Vec<Vec<f32>>,
    /// Spring constants
    strength: Vec<Vec<f32>>,
}

impl KamadaKawai {
    fn springs(&self, graph: &ForceGraph) -> Springs {
        let n = graph.len();
        let hops: Vec<Vec<Option<usize>>> = (0..n).map(|i| graph.bfs_distances(i)).collect();
        let diameter = hops.iter().flatten().flatten().copied().max().unwrap_or(1).max(1);
        let disconnected = (diameter as f32 * self.disconnected_factor).max(1.0);

        let mut length = vec![vec![0.0; n]; n];
        let mut strength = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let d = hops[i][j].map_or(disconnected, |d| d as f32);
                length[i][j] = self.edge_length * d;
                strength[i][j] = self.strength / (d * d);
            }
        }
        Springs { length, strength }
    }

    /// First derivatives of the energy with respect to vertex `m`
    fn gradient(m: usize, centers: &[Point], springs: &Springs) -> (f32, f32) {
        let mut dx = 0.0;
        let mut dy = 0.0;
        for (i, center) in centers.iter().enumerate() {
            if i == m {
                continue;
            }
            let delta = centers[m] - *center;
            let distance = delta.length();
            if distance < EPSILON {
                continue;
            }
            let k = springs.strength[m][i];
            let l = springs.length[m][i];
            dx += k * (delta.x - l * delta.x / distance);
            dy += k * (delta.y - l * delta.y / distance);
        }
        (dx, dy)
    }

    /// Second derivatives of the energy with respect to vertex `m`
    fn hessian(m: usize, centers: &[Point], springs: &Springs) -> (f32, f32, f32) {
        let mut dxx = 0.0;
        let mut dyy = 0.0;
        let mut dxy = 0.0;
        for (i, center) in centers.iter().enumerate() {
            if i == m {
                continue;
            }
            let delta = centers[m] - *center;
            let distance = delta.length();
            if distance < EPSILON {
                continue;
            }
            let k = springs.strength[m][i];
            let l = springs.length[m][i];
            let cube = distance * distance * distance;
            dxx += k * (1.0 - l * delta.y * delta.y / cube);
            dyy += k * (1.0 - l * delta.x * delta.x / cube);
            dxy += k * l * delta.x * delta.y / cube;
        }
        (dxx, dyy, dxy)
    }

    /// Move coincident vertices an edge length apart, the energy has no
    /// gradient between them
    fn separate_coincident(&self, centers: &mut [Point]) {
        for j in 1..centers.len() {
            for i in 0..j {
                if (centers[j] - centers[i]).length() < EPSILON {
                    centers[j] += jitter(i, j).normalized() * self.edge_length;
                }
            }
        }
    }
}

impl LayoutAlgorithm for KamadaKawai {
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
        let springs = self.springs(&graph);
        let extent = (self.edge_length * (n as f32).sqrt()).max(1.0);
        let mut rng = rng(self.seed);
        let mut centers = graph.initial_centers(input, &mut rng, extent);
        self.separate_coincident(&mut centers);

        let mut iteration = 0;
        let mut converged = false;
        while iteration < self.max_iterations && !cancel.is_cancelled() {
            iteration += 1;

            let Some((m, delta)) = (0..n)
                .map(|m| {
                    let (dx, dy) = Self::gradient(m, &centers, &springs);
                    (m, dx.hypot(dy))
                })
                .max_by(|a, b| a.1.total_cmp(&b.1))
            else {
                break;
            };

            if delta < self.epsilon {
                converged = true;
                break;
            }

            for _ in 0..self.inner_iterations {
                let (dx, dy) = Self::gradient(m, &centers, &springs);
                if dx.hypot(dy) < self.epsilon {
                    break;
                }
                let (dxx, dyy, dxy) = Self::hessian(m, &centers, &springs);
                let determinant = dxx * dyy - dxy * dxy;
                if determinant.abs() < EPSILON {
                    break;
                }
                let step_x = (dxy * dy - dyy * dx) / determinant;
                let step_y = (dxy * dx - dxx * dy) / determinant;
                if !(step_x.is_finite() && step_y.is_finite()) {
                    break;
                }
                centers[m].x += step_x;
                centers[m].y += step_y;
            }
        }

        debug!("Kamada-Kawai placed {n} vertices in {iteration} iterations (converged: {converged})");

        Ok(input.from_centers(graph.into_centers(centers)))
    }
}
