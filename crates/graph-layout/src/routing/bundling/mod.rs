//! Force directed edge bundling
//!
//! Edges are grouped by ordered vertex pair. Each group is subdivided into
//! control points which are pulled towards the matching control points of
//! compatible groups, while springs between consecutive points keep the
//! polyline smooth. Every pass reads the control points of the previous pass
//! only, so the groups can be relaxed in parallel.

mod group;

pub use group::{compatibility, Compatibility, EdgeGroupData};

use super::{oriented, EdgeRoutes, EdgeRouting, RoutingInput};
use crate::{CancellationToken, ConfigError, EdgeId, LayoutError, Point, Rect, Vec2, EPSILON};
use group::{collect_groups, link_compatible, same_groups};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use tracing::{debug, trace};

/// Passes run after the main iterations, halving the step each time
const COOLDOWN_PASSES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeBundlingParams {
    /// Movable control points per edge group
    pub subdivision_points: usize,
    pub iterations: usize,
    pub spring_constant: f32,
    /// Minimum value of each compatibility factor, in [0, 1]
    pub threshold: f32,
    /// Push apart compatible groups running in opposite directions
    pub repulse_opposite: bool,
    /// Scale of the attraction between opposite groups, negative to repulse
    pub repulsion_coefficient: f32,
    /// Blend towards the straight line applied after relaxation, in [0, 1]
    pub straightening: f32,
    /// Shorter groups are left straight
    pub min_group_length: f32,
    pub use_threading: bool,
    /// Worker count, the available parallelism when unset
    pub threads: Option<usize>,
}

impl Default for EdgeBundlingParams {
    fn default() -> Self {
        Self {
            subdivision_points: 15,
            iterations: 250,
            spring_constant: 10.0,
            threshold: 0.2,
            repulse_opposite: false,
            repulsion_coefficient: -0.1,
            straightening: 0.15,
            min_group_length: 10.0,
            use_threading: true,
            threads: None,
        }
    }
}

impl EdgeBundlingParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name, reason: &str| ConfigError::InvalidParameter {
            name,
            reason: reason.to_string(),
        };
        if self.subdivision_points == 0 {
            return Err(invalid("subdivision_points", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(invalid("threshold", "must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.straightening) {
            return Err(invalid("straightening", "must be within [0, 1]"));
        }
        if !(self.spring_constant.is_finite() && self.spring_constant >= 0.0) {
            return Err(invalid("spring_constant", "must be a non-negative number"));
        }
        if !self.repulsion_coefficient.is_finite() {
            return Err(invalid("repulsion_coefficient", "must be a finite number"));
        }
        if self.threads == Some(0) {
            return Err(invalid("threads", "must be at least 1"));
        }
        Ok(())
    }

    fn worker_count(&self) -> usize {
        if !self.use_threading {
            return 1;
        }
        self.threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Edge bundling router
///
/// Keeps the edge groups and control points of the last run so that
/// [`EdgeBundler::bundle_single_edges`] can rebundle a few edges without
/// touching the others.
#[derive(Debug, Clone, Default)]
pub struct EdgeBundler {
    pub params: EdgeBundlingParams,
    groups: Vec<EdgeGroupData>,
    /// Control points of all groups, `subdivision_points + 2` per group
    points: Vec<Point>,
    stride: usize,
}

/// Read-only state shared by the workers of one pass
struct Relaxation<'a> {
    groups: &'a [EdgeGroupData],
    params: &'a EdgeBundlingParams,
    stride: usize,
    bounds: Rect,
}

impl Relaxation<'_> {
    /// New control points of `group` into `out`, anchors copied as they are
    fn relax_group(&self, current: &[Point], group: usize, out: &mut [Point], cooldown: f32) {
        let data = &self.groups[group];
        let points = &current[group * self.stride..(group + 1) * self.stride];
        let last = self.stride - 1;
        out[0] = points[0];
        out[last] = points[last];

        for j in 1..last {
            let p = points[j];
            let spring = ((points[j - 1] - p) + (points[j + 1] - p)) * data.k;

            let mut attraction = Vec2::zero();
            let mut weight = 0.0f32;
            for partner in &data.compatible {
                let index = if partner.reversed { last - j } else { j };
                let q = current[partner.group * self.stride + index];
                let delta = q - p;
                let distance = delta.length();
                if distance < EPSILON {
                    continue;
                }
                let w = partner.score * self.groups[partner.group].multiplicity() as f32;
                let mut force = delta * (w / distance.max(1.0));
                if partner.reversed && self.params.repulse_opposite {
                    force = force * self.params.repulsion_coefficient;
                }
                attraction += force;
                weight += w;
            }
            let attraction = attraction / weight.max(1.0);

            out[j] = self.bounds.clamp(p + (spring + attraction) * cooldown);
        }
    }

    /// One pass over the active groups, `next` holds the result
    fn step(
        &self,
        current: &[Point],
        next: &mut [Point],
        active: &[bool],
        cooldown: f32,
        workers: usize,
    ) -> Result<(), LayoutError> {
        let stride = self.stride;
        if workers <= 1 || self.groups.len() < 2 {
            for (group, out) in next.chunks_mut(stride).enumerate() {
                if active[group] {
                    self.relax_group(current, group, out, cooldown);
                }
            }
            return Ok(());
        }

        let per_worker = self.groups.len().div_ceil(workers);
        crossbeam::thread::scope(|scope| {
            for (chunk_index, chunk) in next.chunks_mut(per_worker * stride).enumerate() {
                let first = chunk_index * per_worker;
                scope.spawn(move |_| {
                    for (offset, out) in chunk.chunks_mut(stride).enumerate() {
                        if active[first + offset] {
                            self.relax_group(current, first + offset, out, cooldown);
                        }
                    }
                });
            }
        })
        .map_err(|_| LayoutError::WorkerPanicked)
    }

    /// Run every pass, returns the number of passes completed
    fn run(
        &self,
        points: &mut Vec<Point>,
        active: &[bool],
        cancel: &CancellationToken,
    ) -> Result<usize, LayoutError> {
        let workers = self.params.worker_count();
        let mut scratch = points.clone();
        let passes = self.params.iterations + COOLDOWN_PASSES;

        for pass in 0..passes {
            if cancel.is_cancelled() {
                debug!("Edge bundling cancelled after {pass} of {passes} passes");
                return Ok(pass);
            }
            let cooldown = match pass.checked_sub(self.params.iterations) {
                Some(extra) => 0.5f32.powi(extra as i32 + 1),
                None => 1.0,
            };
            self.step(points, &mut scratch, active, cooldown, workers)?;
            std::mem::swap(points, &mut scratch);
            trace!("Edge bundling pass {pass} done");
        }
        Ok(passes)
    }
}

impl EdgeBundler {
    pub fn new(params: EdgeBundlingParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Edge groups of the last run
    pub fn groups(&self) -> &[EdgeGroupData] {
        &self.groups
    }

    /// Control points of a group, anchors included
    pub fn control_points(&self, group: usize) -> &[Point] {
        &self.points[group * self.stride..(group + 1) * self.stride]
    }

    fn reset_points(&mut self, group: usize) {
        let subdivisions = self.params.subdivision_points;
        let range = group * self.stride..(group + 1) * self.stride;
        for (slot, point) in self.points[range].iter_mut().zip(
            self.groups[group].straight_points(subdivisions),
        ) {
            *slot = point;
        }
    }

    /// Blend the control points of the active groups towards their straight line
    fn straighten(&mut self, active: &[bool]) {
        let amount = self.params.straightening;
        if amount <= 0.0 {
            return;
        }
        let subdivisions = self.params.subdivision_points;
        for (group, data) in self.groups.iter().enumerate() {
            if !active[group] {
                continue;
            }
            let points = &mut self.points[group * self.stride..(group + 1) * self.stride];
            for (point, straight) in points.iter_mut().zip(data.straight_points(subdivisions)) {
                *point = point.lerp(straight, amount);
            }
        }
    }

    fn relax(
        &mut self,
        input: &RoutingInput<'_>,
        active: &[bool],
        cancel: &CancellationToken,
    ) -> Result<(), LayoutError> {
        let Some(bounds) = input.bounds() else {
            return Ok(());
        };
        let relaxation = Relaxation {
            groups: &self.groups,
            params: &self.params,
            stride: self.stride,
            bounds,
        };
        relaxation.run(&mut self.points, active, cancel)?;
        self.straighten(active);
        Ok(())
    }

    fn routes(&self, input: &RoutingInput<'_>, active: &[bool]) -> EdgeRoutes {
        let mut routes = EdgeRoutes::new();
        for (group, data) in self.groups.iter().enumerate() {
            if !active[group] {
                continue;
            }
            for id in &data.edges {
                if let Some(edge) = input.graph.edge(*id) {
                    routes.insert(*id, oriented(edge, self.control_points(group).to_vec()));
                }
            }
        }
        routes
    }

    /// Bundle every edge of the graph from scratch
    pub fn bundle(
        &mut self,
        input: &RoutingInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError> {
        self.stride = self.params.subdivision_points.max(1) + 2;
        self.groups = collect_groups(input, &self.params);
        let links = link_compatible(&mut self.groups, &self.params, None);
        debug!(
            "Bundling {} edge groups with {} compatible pairs",
            self.groups.len(),
            links
        );

        self.points = vec![Point::origin(); self.groups.len() * self.stride];
        for group in 0..self.groups.len() {
            self.reset_points(group);
        }

        let active = vec![true; self.groups.len()];
        self.relax(input, &active, cancel)?;
        Ok(self.routes(input, &active))
    }

    /// Rebundle the groups holding `edges` and merge their routes into `routes`
    ///
    /// The other groups keep their control points, they still attract the
    /// rebundled ones. Falls back to a full bundle when the edges between
    /// vertex pairs changed since the last run.
    pub fn bundle_single_edges(
        &mut self,
        input: &RoutingInput<'_>,
        edges: &[EdgeId],
        routes: &mut EdgeRoutes,
        cancel: &CancellationToken,
    ) -> Result<(), LayoutError> {
        let fresh = collect_groups(input, &self.params);
        let stride = self.params.subdivision_points.max(1) + 2;
        let reuse = stride == self.stride && same_groups(&self.groups, &fresh);

        let affected: HashSet<usize> = fresh
            .iter()
            .enumerate()
            .filter(|(_, group)| group.edges.iter().any(|id| edges.contains(id)))
            .map(|(index, _)| index)
            .collect();
        let active: Vec<bool> = (0..fresh.len()).map(|i| affected.contains(&i)).collect();

        if reuse {
            for &group in &affected {
                self.groups[group] = fresh[group].clone();
                self.reset_points(group);
            }
            let links = link_compatible(&mut self.groups, &self.params, Some(&affected));
            debug!(
                "Rebundling {} of {} edge groups with {} compatible pairs",
                affected.len(),
                self.groups.len(),
                links
            );
            self.relax(input, &active, cancel)?;
        } else {
            debug!("Edge groups changed since the last run, bundling everything");
            self.bundle(input, cancel)?;
        }

        for id in edges {
            routes.remove(id);
        }
        routes.extend(self.routes(input, &active));
        Ok(())
    }
}

impl EdgeRouting for EdgeBundler {
    fn compute(
        &mut self,
        input: &RoutingInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError> {
        self.bundle(input, cancel)
    }

    fn recompute_edges(
        &mut self,
        input: &RoutingInput<'_>,
        edges: &[EdgeId],
        routes: &mut EdgeRoutes,
        cancel: &CancellationToken,
    ) -> Result<(), LayoutError> {
        self.bundle_single_edges(input, edges, routes, cancel)
    }
}
