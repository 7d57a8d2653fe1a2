use super::{Axis, Boxes, OverlapRemoval};
use crate::{CancellationToken, ConfigError, RectMap};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Force scan overlap removal
///
/// Each pass scans horizontally, then vertically, resolving a pair along the
/// axis where it overlaps the least. The rectangle visited first (the lower
/// vertex id when centers coincide) stays, the other one is pushed forward.
/// Overlaps left after the pass cap are removed by a final vertical scan that
/// separates every pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fsa {
    pub horizontal_gap: f32,
    pub vertical_gap: f32,
    /// Cap on the number of horizontal and vertical scan pairs
    pub max_iterations: usize,
}

impl Default for Fsa {
    fn default() -> Self {
        Self {
            horizontal_gap: 10.0,
            vertical_gap: 10.0,
            max_iterations: 50,
        }
    }
}

impl Fsa {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_gaps(self.horizontal_gap, self.vertical_gap)
    }
}

impl OverlapRemoval for Fsa {
    fn compute(&self, rectangles: &RectMap, cancel: &CancellationToken) -> RectMap {
        let mut boxes = Boxes::new(rectangles, self.horizontal_gap, self.vertical_gap);
        let settled = boxes.separate(self.max_iterations, cancel, |boxes| {
            boxes.scan(Axis::X, true);
            boxes.scan(Axis::Y, true);
        });
        if !settled && !cancel.is_cancelled() {
            debug!("Separating the remaining overlaps vertically");
            boxes.scan(Axis::Y, false);
        }
        boxes.into_rectangles()
    }
}

pub(super) fn validate_gaps(horizontal: f32, vertical: f32) -> Result<(), ConfigError> {
    for (name, gap) in [("horizontal_gap", horizontal), ("vertical_gap", vertical)] {
        if !(gap.is_finite() && gap >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name,
                reason: format!("must be a non-negative number, got {gap}"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::tests::assert_separated;
    use crate::{Rect, VertexId};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use test_log::test;

    #[test]
    fn test_coincident_rectangles_resolve_by_id() {
        let rects: RectMap = (0..3)
            .map(|i| (VertexId(i), Rect::new(0.0, 0.0, 50.0, 50.0)))
            .collect();
        let fsa = Fsa {
            horizontal_gap: 10.0,
            vertical_gap: 10.0,
            ..Default::default()
        };
        let out = fsa.compute(&rects, &CancellationToken::new());

        assert_separated(&out, 10.0, 10.0);
        for a in 0..3 {
            for b in a + 1..3 {
                let (ra, rb) = (out[&VertexId(a)], out[&VertexId(b)]);
                let dx = (ra.center().x - rb.center().x).abs();
                let dy = (ra.center().y - rb.center().y).abs();
                assert!(dx >= 60.0 - 0.01 || dy >= 60.0 - 0.01, "{a} {b}: {dx} {dy}");
            }
        }
        // Lower ids end up first
        assert!(out[&VertexId(0)].x < out[&VertexId(1)].x);
        assert!(out[&VertexId(0)].x < out[&VertexId(2)].x);

        let again = fsa.compute(&rects, &CancellationToken::new());
        assert_eq!(out, again);
    }

    #[test]
    fn test_grid_of_overlapping_rectangles() {
        let rects: RectMap = (0..9)
            .map(|i| {
                let (x, y) = ((i % 3) as f32 * 15.0, (i / 3) as f32 * 15.0);
                (VertexId(i), Rect::new(x, y, 30.0, 20.0))
            })
            .collect();
        let fsa = Fsa::default();
        let out = fsa.compute(&rects, &CancellationToken::new());

        assert_separated(&out, fsa.horizontal_gap, fsa.vertical_gap);
        for (id, rect) in &out {
            assert_eq!(rect.size(), rects[id].size());
        }
    }

    #[test]
    fn test_many_coincident_rectangles() {
        let rects: RectMap = (0..20)
            .map(|i| (VertexId(i), Rect::new(0.0, 0.0, 50.0, 50.0)))
            .collect();
        let out = Fsa::default().compute(&rects, &CancellationToken::new());
        assert_separated(&out, 10.0, 10.0);
        for i in 1..20 {
            assert!(out[&VertexId(i - 1)].x < out[&VertexId(i)].x);
        }
    }

    #[test]
    fn test_clustered_rectangles_with_default_cap() {
        let mut rng = StdRng::seed_from_u64(11);
        for count in [30, 60, 100] {
            let rects: RectMap = (0..count)
                .map(|i| {
                    let rect = Rect::new(
                        rng.gen_range(0.0..200.0),
                        rng.gen_range(0.0..200.0),
                        rng.gen_range(40.0..80.0),
                        rng.gen_range(20.0..40.0),
                    );
                    (VertexId(i), rect)
                })
                .collect();
            let out = Fsa::default().compute(&rects, &CancellationToken::new());
            assert_separated(&out, 10.0, 10.0);
        }
    }

    #[test]
    fn test_final_scan_separates_without_passes() {
        let rects: RectMap = (0..9)
            .map(|i| (VertexId(i), Rect::new(i as f32 * 5.0, 0.0, 30.0, 30.0)))
            .collect();
        let fsa = Fsa {
            max_iterations: 0,
            ..Default::default()
        };
        let out = fsa.compute(&rects, &CancellationToken::new());
        assert_separated(&out, 10.0, 10.0);
        for (id, rect) in &out {
            assert_eq!(rect.x, rects[id].x);
        }
    }

    #[test]
    fn test_separated_rectangles_do_not_move() {
        let rects: RectMap = [
            (VertexId(0), Rect::new(0.0, 0.0, 10.0, 10.0)),
            (VertexId(1), Rect::new(30.0, 0.0, 10.0, 10.0)),
        ]
        .into();
        assert_eq!(Fsa::default().compute(&rects, &CancellationToken::new()), rects);
    }

    #[test]
    fn test_negative_gap_is_rejected() {
        let fsa = Fsa {
            vertical_gap: -1.0,
            ..Default::default()
        };
        assert!(fsa.validate().is_err());
    }
}
