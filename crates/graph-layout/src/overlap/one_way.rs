use super::fsa::validate_gaps;
use super::{Axis, Boxes, OverlapRemoval};
use crate::{CancellationToken, ConfigError, RectMap};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OneWayDirection {
    /// Push to the right
    #[default]
    Horizontal,
    /// Push downwards
    Vertical,
}

/// Overlap removal moving rectangles along a single axis
///
/// Rectangles sharing an interval across the axis are pushed forward past the
/// ones before them along it (the lower id goes first when both are level).
/// A single scan removes every overlap. Rectangles never move backwards, so the relative order on
/// the axis is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneWayFsa {
    pub direction: OneWayDirection,
    pub horizontal_gap: f32,
    pub vertical_gap: f32,
    pub max_iterations: usize,
}

impl Default for OneWayFsa {
    fn default() -> Self {
        Self {
            direction: OneWayDirection::Horizontal,
            horizontal_gap: 10.0,
            vertical_gap: 10.0,
            max_iterations: 200,
        }
    }
}

impl OneWayFsa {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_gaps(self.horizontal_gap, self.vertical_gap)
    }
}

impl OverlapRemoval for OneWayFsa {
    fn compute(&self, rectangles: &RectMap, cancel: &CancellationToken) -> RectMap {
        let mut boxes = Boxes::new(rectangles, self.horizontal_gap, self.vertical_gap);
        let axis = match self.direction {
            OneWayDirection::Horizontal => Axis::X,
            OneWayDirection::Vertical => Axis::Y,
        };
        // One scan is always enough
        boxes.separate(self.max_iterations.max(1), cancel, |boxes| {
            boxes.scan(axis, false)
        });
        boxes.into_rectangles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::tests::assert_separated;
    use crate::{Rect, VertexId};
    use test_log::test;

    fn row() -> RectMap {
        [
            (VertexId(0), Rect::new(0.0, 0.0, 40.0, 20.0)),
            (VertexId(1), Rect::new(20.0, 5.0, 40.0, 20.0)),
            (VertexId(2), Rect::new(30.0, 0.0, 40.0, 20.0)),
        ]
        .into()
    }

    #[test]
    fn test_horizontal_only_moves_right() {
        let rects = row();
        let fsa = OneWayFsa::default();
        let out = fsa.compute(&rects, &CancellationToken::new());

        assert_separated(&out, fsa.horizontal_gap, fsa.vertical_gap);
        for (id, rect) in &out {
            assert_eq!(rect.y, rects[id].y);
            assert!(rect.x >= rects[id].x);
        }
        assert_eq!(out[&VertexId(0)], rects[&VertexId(0)]);
        assert!(out[&VertexId(0)].x < out[&VertexId(1)].x);
        assert!(out[&VertexId(1)].x < out[&VertexId(2)].x);
    }

    #[test]
    fn test_vertical_only_moves_down() {
        let rects = row();
        let fsa = OneWayFsa {
            direction: OneWayDirection::Vertical,
            ..Default::default()
        };
        let out = fsa.compute(&rects, &CancellationToken::new());

        assert_separated(&out, fsa.horizontal_gap, fsa.vertical_gap);
        for (id, rect) in &out {
            assert_eq!(rect.x, rects[id].x);
            assert!(rect.y >= rects[id].y);
        }
    }

    #[test]
    fn test_level_rectangles_push_the_higher_id() {
        let rects: RectMap = [
            (VertexId(4), Rect::new(0.0, 0.0, 10.0, 10.0)),
            (VertexId(9), Rect::new(0.0, 0.0, 10.0, 10.0)),
        ]
        .into();
        let out = OneWayFsa::default().compute(&rects, &CancellationToken::new());
        assert_eq!(out[&VertexId(4)], rects[&VertexId(4)]);
        assert!((out[&VertexId(9)].x - 20.0).abs() < 1e-3);
    }
}
