use super::{rng, LayoutAlgorithm, LayoutInput};
use crate::{CancellationToken, LayoutError, Point, PositionMap};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Uniform scatter inside a `width` x `height` box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomLayout {
    pub width: f32,
    pub height: f32,
    pub seed: Option<u64>,
}

impl Default for RandomLayout {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            seed: None,
        }
    }
}

impl LayoutAlgorithm for RandomLayout {
    fn compute(
        &self,
        input: &LayoutInput<'_>,
        _cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError> {
        if input.is_trivial() {
            return Ok(input.passthrough());
        }

        let mut rng = rng(self.seed);
        let positions = input
            .graph
            .layout_vertices()
            .map(|id| {
                let x = rng.gen::<f32>() * self.width.max(0.0);
                let y = rng.gen::<f32>() * self.height.max(0.0);
                (id, Point::new(x, y))
            })
            .collect();
        Ok(input.complete(positions))
    }
}
