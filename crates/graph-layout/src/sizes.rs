use crate::{Point, Rect, Vec2, VertexId};
use std::collections::HashMap;
use std::hash::Hash;

/// Vertex id to top-left position
pub type PositionMap = HashMap<VertexId, Point>;

/// Vertex id to measured size
pub type SizeMap = HashMap<VertexId, Vec2>;

/// Vertex id to rectangle (position and size)
pub type RectMap = HashMap<VertexId, Rect>;

/// Trait for providing vertex sizes during layout computation
///
/// Sizes are measured by the rendering layer, the algorithms only read them.
pub trait VertexSizes<N> {
    /// Get the size of a vertex
    fn size(&self, vertex: N) -> Vec2;
}

// Blanket implementation for closures
impl<N, F> VertexSizes<N> for F
where
    F: Fn(N) -> Vec2,
{
    fn size(&self, vertex: N) -> Vec2 {
        self(vertex)
    }
}

// Implementation for HashMap
impl<N: Eq + Hash + Copy> VertexSizes<N> for HashMap<N, Vec2> {
    fn size(&self, vertex: N) -> Vec2 {
        self.get(&vertex).copied().unwrap_or(Vec2::zero())
    }
}

/// Combine positions and sizes into rectangles
///
/// Vertices without a position are left out.
pub fn rectangles(positions: &PositionMap, sizes: &SizeMap) -> RectMap {
    positions
        .iter()
        .map(|(&id, &position)| (id, Rect::from_position(position, sizes.size(id))))
        .collect()
}
