use super::{LayoutAlgorithm, LayoutInput};
use crate::{CancellationToken, LayoutError, Point, PositionMap, VertexId, VertexSizes};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::f32::consts::TAU;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TreeStyle {
    /// Roots on top, children centered below their parent
    #[default]
    TopDown,
    /// Roots in the middle, depth mapped to concentric rings
    Radial,
}

/// Tree layout over a BFS spanning forest of the graph
///
/// Roots are the vertices without predecessors. Vertices left unreached
/// (cycles) start a new tree from the lowest remaining id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeLayout {
    pub style: TreeStyle,
    /// Horizontal gap between sibling subtrees
    pub sibling_gap: f32,
    /// Vertical gap between two levels
    pub layer_gap: f32,
    /// Ring spacing of the radial style
    pub layer_distance: f32,
}

impl Default for TreeLayout {
    fn default() -> Self {
        Self {
            style: TreeStyle::TopDown,
            sibling_gap: 20.0,
            layer_gap: 40.0,
            layer_distance: 100.0,
        }
    }
}

/// BFS spanning forest, vertices listed in visit order
struct Forest {
    roots: Vec<VertexId>,
    order: Vec<VertexId>,
    children: HashMap<VertexId, Vec<VertexId>>,
    depth: HashMap<VertexId, usize>,
}

impl Forest {
    fn new(input: &LayoutInput<'_>) -> Self {
        let graph = input.graph.directed_view();
        let mut ids: Vec<VertexId> = graph.nodes().collect();
        ids.sort();

        let mut candidates: VecDeque<VertexId> = ids
            .iter()
            .copied()
            .filter(|&id| {
                graph
                    .neighbors_directed(id, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();

        let mut forest = Forest {
            roots: Vec::new(),
            order: Vec::new(),
            children: HashMap::new(),
            depth: HashMap::new(),
        };
        let mut visited = HashSet::new();
        let mut remaining = ids.iter();

        loop {
            let root = match candidates.pop_front() {
                Some(root) => root,
                None => match remaining.by_ref().find(|id| !visited.contains(*id)) {
                    Some(&root) => root,
                    None => break,
                },
            };
            if !visited.insert(root) {
                continue;
            }

            forest.roots.push(root);
            forest.depth.insert(root, 0);
            let mut queue = VecDeque::from([root]);
            while let Some(parent) = queue.pop_front() {
                forest.order.push(parent);
                let mut successors: Vec<_> = graph
                    .neighbors_directed(parent, Direction::Outgoing)
                    .collect();
                successors.sort();
                let depth = forest.depth[&parent] + 1;
                for child in successors {
                    if visited.insert(child) {
                        forest.children.entry(parent).or_default().push(child);
                        forest.depth.insert(child, depth);
                        queue.push_back(child);
                    }
                }
            }
        }

        forest
    }

    fn children(&self, vertex: VertexId) -> &[VertexId] {
        self.children.get(&vertex).map_or(&[], Vec::as_slice)
    }
}

impl TreeLayout {
    fn top_down(&self, input: &LayoutInput<'_>, forest: &Forest) -> HashMap<VertexId, Point> {
        let sizes = input.sizes;

        // Level offsets from the tallest vertex of each level
        let max_depth = forest.depth.values().copied().max().unwrap_or(0);
        let mut level_height = vec![0.0f32; max_depth + 1];
        for (&id, &depth) in &forest.depth {
            level_height[depth] = level_height[depth].max(sizes.size(id).y);
        }
        let mut level_y = Vec::with_capacity(level_height.len());
        let mut y = 0.0;
        for height in &level_height {
            level_y.push(y + height / 2.0);
            y += height + self.layer_gap;
        }

        // Subtree widths, children before parents
        let mut width: HashMap<VertexId, f32> = HashMap::new();
        for &id in forest.order.iter().rev() {
            let children = forest.children(id);
            let children_width: f32 = children.iter().map(|c| width[c]).sum::<f32>()
                + self.sibling_gap * children.len().saturating_sub(1) as f32;
            width.insert(id, children_width.max(sizes.size(id).x));
        }

        let mut centers = HashMap::new();
        let mut left = 0.0;
        for &root in &forest.roots {
            let mut stack = vec![(root, left)];
            while let Some((id, start)) = stack.pop() {
                let subtree = width[&id];
                centers.insert(id, Point::new(start + subtree / 2.0, level_y[forest.depth[&id]]));

                let children = forest.children(id);
                let children_width: f32 = children.iter().map(|c| width[c]).sum::<f32>()
                    + self.sibling_gap * children.len().saturating_sub(1) as f32;
                let mut child_start = start + (subtree - children_width) / 2.0;
                for child in children {
                    stack.push((*child, child_start));
                    child_start += width[child] + self.sibling_gap;
                }
            }
            left += width[&root] + self.sibling_gap;
        }
        centers
    }

    fn radial(&self, forest: &Forest) -> HashMap<VertexId, Point> {
        let mut leaves: HashMap<VertexId, usize> = HashMap::new();
        for &id in forest.order.iter().rev() {
            let count = forest.children(id).iter().map(|c| leaves[c]).sum::<usize>();
            leaves.insert(id, count.max(1));
        }

        // Several trees hang off an implicit center so they share the rings
        let ring_offset = usize::from(forest.roots.len() > 1);
        let mut wedges: Vec<(VertexId, f32, f32)> = Vec::new();
        let total: usize = forest.roots.iter().map(|r| leaves[r]).sum();
        let mut start = 0.0;
        for root in &forest.roots {
            let span = TAU * leaves[root] as f32 / total.max(1) as f32;
            wedges.push((*root, start, span));
            start += span;
        }

        let mut centers = HashMap::new();
        while let Some((id, start, span)) = wedges.pop() {
            let ring = forest.depth[&id] + ring_offset;
            let radius = ring as f32 * self.layer_distance;
            let angle = start + span / 2.0;
            centers.insert(id, Point::new(radius * angle.cos(), radius * angle.sin()));

            let mut child_start = start;
            for child in forest.children(id) {
                let child_span = span * leaves[child] as f32 / leaves[&id] as f32;
                wedges.push((*child, child_start, child_span));
                child_start += child_span;
            }
        }
        centers
    }
}

impl LayoutAlgorithm for TreeLayout {
    fn compute(
        &self,
        input: &LayoutInput<'_>,
        _cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError> {
        if input.is_trivial() {
            return Ok(input.passthrough());
        }

        let forest = Forest::new(input);
        debug!(
            "Tree layout of {} vertices from {} roots",
            forest.order.len(),
            forest.roots.len()
        );

        let centers = match self.style {
            TreeStyle::TopDown => self.top_down(input, &forest),
            TreeStyle::Radial => self.radial(&forest),
        };
        Ok(input.from_centers(centers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LayoutGraph, SizeMap, Vec2};
    use test_log::test;

    fn binary_tree() -> (LayoutGraph, Vec<VertexId>, SizeMap) {
        let mut graph = LayoutGraph::new();
        let ids: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        graph.add_edge(ids[0], ids[1]).unwrap();
        graph.add_edge(ids[0], ids[2]).unwrap();
        graph.add_edge(ids[2], ids[3]).unwrap();
        let sizes = ids.iter().map(|&id| (id, Vec2::new(20.0, 10.0))).collect();
        (graph, ids, sizes)
    }

    #[test]
    fn test_top_down_places_parent_above_and_between_children() {
        let (graph, ids, sizes) = binary_tree();
        let positions = TreeLayout::default()
            .compute(&LayoutInput::new(&graph, &sizes), &CancellationToken::new())
            .unwrap();

        let root = positions[&ids[0]];
        let left = positions[&ids[1]];
        let right = positions[&ids[2]];
        assert!(root.y < left.y);
        assert_eq!(left.y, right.y);
        assert!(left.x < root.x && root.x < right.x);
        assert!(positions[&ids[3]].y > right.y);
        // Siblings do not overlap
        assert!(right.x - left.x >= 20.0);
    }

    #[test]
    fn test_radial_puts_root_in_the_middle() {
        let (graph, ids, sizes) = binary_tree();
        let layout = TreeLayout {
            style: TreeStyle::Radial,
            ..Default::default()
        };
        let positions = layout
            .compute(&LayoutInput::new(&graph, &sizes), &CancellationToken::new())
            .unwrap();

        let center = |id| positions[&id] + Vec2::new(10.0, 5.0);
        assert!(center(ids[0]).distance(Point::origin()) < 1e-3);
        assert!((center(ids[1]).distance(Point::origin()) - 100.0).abs() < 1e-3);
        assert!((center(ids[3]).distance(Point::origin()) - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_cycle_still_gets_a_root() {
        let mut graph = LayoutGraph::new();
        let ids: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
        graph.add_edge(ids[0], ids[1]).unwrap();
        graph.add_edge(ids[1], ids[2]).unwrap();
        graph.add_edge(ids[2], ids[0]).unwrap();
        let sizes = SizeMap::new();

        let positions = TreeLayout::default()
            .compute(&LayoutInput::new(&graph, &sizes), &CancellationToken::new())
            .unwrap();
        assert!(positions[&ids[0]].y < positions[&ids[1]].y);
        assert!(positions[&ids[1]].y < positions[&ids[2]].y);
    }
}
