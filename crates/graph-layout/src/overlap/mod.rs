//! Overlap removal
//!
//! Rectangles are grown by half the configured gap on each side, then scanned
//! along an axis in order of their centers. A scan pushes every rectangle
//! forward past the already visited rectangles it collides with, so visited
//! rectangles never move again within the scan. Candidate pairs for the
//! convergence check come from a sweep along the x axis.

mod fsa;
mod one_way;

pub use fsa::Fsa;
pub use one_way::{OneWayDirection, OneWayFsa};

use crate::{CancellationToken, Rect, RectMap, Vec2, VertexId};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Overlaps smaller than this are considered resolved
const OVERLAP_TOLERANCE: f32 = 1e-3;

#[enum_dispatch]
pub trait OverlapRemoval {
    /// Move the rectangles apart, sizes are left untouched
    ///
    /// Always terminates: the number of passes is capped, and a cancelled run
    /// returns the rectangles of the last completed pass.
    fn compute(&self, rectangles: &RectMap, cancel: &CancellationToken) -> RectMap;
}

/// Built-in overlap removal algorithms, each variant carrying its parameters
#[enum_dispatch(OverlapRemoval)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OverlapParams {
    Fsa(Fsa),
    OneWayFsa(OneWayFsa),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    X,
    Y,
}

impl Axis {
    fn other(self) -> Self {
        match self {
            Self::X => Self::Y,
            Self::Y => Self::X,
        }
    }

    fn center(self, rect: &Rect) -> f32 {
        match self {
            Self::X => rect.center().x,
            Self::Y => rect.center().y,
        }
    }

    fn span(self, rect: &Rect) -> (f32, f32) {
        match self {
            Self::X => (rect.left(), rect.right()),
            Self::Y => (rect.top(), rect.bottom()),
        }
    }

    fn move_start(self, rect: &mut Rect, start: f32) {
        match self {
            Self::X => rect.x = start,
            Self::Y => rect.y = start,
        }
    }
}

fn span_overlap(a: (f32, f32), b: (f32, f32)) -> f32 {
    a.1.min(b.1) - a.0.max(b.0)
}

/// Rectangles grown by half the gaps, indexed in ascending vertex id order
pub(crate) struct Boxes {
    ids: Vec<VertexId>,
    pub rects: Vec<Rect>,
    half_gap: (f32, f32),
}

impl Boxes {
    pub fn new(rectangles: &RectMap, horizontal_gap: f32, vertical_gap: f32) -> Self {
        let mut ids: Vec<_> = rectangles.keys().copied().collect();
        ids.sort();
        let half_gap = (horizontal_gap.max(0.0) / 2.0, vertical_gap.max(0.0) / 2.0);
        let rects = ids
            .iter()
            .map(|id| rectangles[id].inflate(half_gap.0, half_gap.1))
            .collect();
        Self {
            ids,
            rects,
            half_gap,
        }
    }

    pub fn overlap(&self, a: usize, b: usize) -> Option<Vec2> {
        self.rects[a]
            .overlap(&self.rects[b])
            .filter(|o| o.x > OVERLAP_TOLERANCE && o.y > OVERLAP_TOLERANCE)
    }

    /// Overlapping pairs `(a, b)` with `a < b`, sorted
    pub fn overlapping_pairs(&self) -> Vec<(usize, usize)> {
        let mut order: Vec<usize> = (0..self.rects.len()).collect();
        order.sort_by(|&a, &b| {
            self.rects[a]
                .left()
                .total_cmp(&self.rects[b].left())
                .then(a.cmp(&b))
        });

        let mut pairs = Vec::new();
        let mut active: Vec<usize> = Vec::new();
        for &current in &order {
            let left = self.rects[current].left();
            active.retain(|&other| self.rects[other].right() - left > OVERLAP_TOLERANCE);
            for &other in &active {
                if self.overlap(current, other).is_some() {
                    pairs.push((current.min(other), current.max(other)));
                }
            }
            active.push(current);
        }
        pairs.sort_unstable();
        pairs
    }

    pub fn has_overlap(&self) -> bool {
        !self.overlapping_pairs().is_empty()
    }

    /// One force scan along `axis`
    ///
    /// Rectangles are visited by ascending center, lower ids first on ties.
    /// With `shallow_only` a pair is only resolved when it overlaps less along
    /// `axis` than across it. Otherwise every pair sharing an interval across
    /// `axis` ends up apart, and a single scan leaves no overlap.
    pub fn scan(&mut self, axis: Axis, shallow_only: bool) {
        let mut order: Vec<usize> = (0..self.rects.len()).collect();
        order.sort_by(|&a, &b| {
            axis.center(&self.rects[a])
                .total_cmp(&axis.center(&self.rects[b]))
                .then(a.cmp(&b))
        });

        for (visited, &current) in order.iter().enumerate() {
            for &other in &order[..visited] {
                let (fixed, moving) = (&self.rects[other], &self.rects[current]);
                let along = span_overlap(axis.span(fixed), axis.span(moving));
                let across = span_overlap(axis.other().span(fixed), axis.other().span(moving));
                let collides = if shallow_only {
                    along > OVERLAP_TOLERANCE && across > OVERLAP_TOLERANCE && along <= across
                } else {
                    across > OVERLAP_TOLERANCE
                };
                if collides {
                    let end = axis.span(fixed).1;
                    if end > axis.span(moving).0 {
                        axis.move_start(&mut self.rects[current], end);
                    }
                }
            }
        }
    }

    /// Run `pass` until no overlap is left, at most `max_iterations` times
    ///
    /// Returns whether the rectangles are free of overlaps.
    pub fn separate<F>(
        &mut self,
        max_iterations: usize,
        cancel: &CancellationToken,
        mut pass: F,
    ) -> bool
    where
        F: FnMut(&mut Self),
    {
        for done in 0..max_iterations {
            if cancel.is_cancelled() {
                debug!("Overlap removal cancelled after {done} passes");
                return false;
            }
            if !self.has_overlap() {
                debug!("Overlap removal converged after {done} passes");
                return true;
            }
            pass(self);
        }
        let settled = !self.has_overlap();
        if !settled {
            debug!("Overlap removal reached the {max_iterations} pass cap");
        }
        settled
    }

    /// Shrink back to the original sizes
    pub fn into_rectangles(self) -> RectMap {
        let (dx, dy) = self.half_gap;
        self.ids
            .into_iter()
            .zip(self.rects)
            .map(|(id, rect)| (id, rect.inflate(-dx, -dy)))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use test_log::test;

    /// No pair overlaps once grown by the gaps, allowing for rounding
    pub(crate) fn assert_separated(rects: &RectMap, horizontal_gap: f32, vertical_gap: f32) {
        let boxes = Boxes::new(rects, horizontal_gap - 0.01, vertical_gap - 0.01);
        let pairs = boxes.overlapping_pairs();
        assert!(pairs.is_empty(), "overlapping pairs left: {pairs:?}");
    }

    #[test]
    fn test_sweep_finds_only_overlapping_pairs() {
        let rects: RectMap = [
            (VertexId(0), Rect::new(0.0, 0.0, 10.0, 10.0)),
            (VertexId(1), Rect::new(5.0, 5.0, 10.0, 10.0)),
            (VertexId(2), Rect::new(100.0, 0.0, 10.0, 10.0)),
            (VertexId(3), Rect::new(8.0, 50.0, 10.0, 10.0)),
        ]
        .into();
        let boxes = Boxes::new(&rects, 0.0, 0.0);
        assert_eq!(boxes.overlapping_pairs(), vec![(0, 1)]);

        // A gap makes touching neighbours overlap
        let rects: RectMap = [
            (VertexId(0), Rect::new(0.0, 0.0, 10.0, 10.0)),
            (VertexId(1), Rect::new(10.0, 0.0, 10.0, 10.0)),
        ]
        .into();
        assert!(Boxes::new(&rects, 0.0, 0.0).overlapping_pairs().is_empty());
        assert_eq!(Boxes::new(&rects, 4.0, 0.0).overlapping_pairs(), vec![(0, 1)]);
    }

    #[test]
    fn test_zero_size_rectangles_are_points() {
        let rects: RectMap = [
            (VertexId(0), Rect::new(5.0, 5.0, 0.0, 0.0)),
            (VertexId(1), Rect::new(5.0, 5.0, 0.0, 0.0)),
        ]
        .into();
        let out = OverlapParams::from(Fsa {
            horizontal_gap: 0.0,
            vertical_gap: 0.0,
            ..Default::default()
        })
        .compute(&rects, &CancellationToken::new());
        assert_eq!(out, rects);
    }
}
