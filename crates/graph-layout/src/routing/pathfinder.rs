use super::{oriented, EdgeRoutes, EdgeRouting, RoutingInput, VertexShape};
use crate::geometry::bounding_rect;
use crate::{CancellationToken, LayoutError, Point, Rect, Vec2, VertexId, EPSILON};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

const DIRECTIONS: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];
const STEP_COST: u32 = 10;

/// Obstacle avoiding router
///
/// Searches a uniform grid spanning all vertices with A*, treating the
/// rectangles of every vertex but the edge's own endpoints as obstacles.
/// Moves are orthogonal and each change of direction is penalized, which
/// keeps the routes close to orthogonal polylines. Edges without a path fall
/// back to a straight line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathFinderRouter {
    pub cell_size: f32,
    /// Clearance kept around the obstacles
    pub obstacle_margin: f32,
    /// Cost of a turn, in grid steps
    pub turn_penalty: f32,
    /// Larger grids are not searched, every edge is routed straight
    pub max_cells: usize,
    /// Search states expanded per edge before giving up
    pub max_expansions: usize,
}

impl Default for PathFinderRouter {
    fn default() -> Self {
        Self {
            cell_size: 10.0,
            obstacle_margin: 5.0,
            turn_penalty: 2.0,
            max_cells: 250_000,
            max_expansions: 200_000,
        }
    }
}

struct RoutingGrid {
    cell: f32,
    origin: Point,
    cols: i32,
    rows: i32,
    /// Vertices whose inflated rectangle touches each cell
    owners: Vec<Vec<VertexId>>,
}

impl RoutingGrid {
    fn new(obstacles: &[(VertexId, Rect)], cell: f32, max_cells: usize) -> Option<Self> {
        let bounds = bounding_rect(obstacles.iter().map(|(_, rect)| rect))?;
        let bounds = bounds.inflate(2.0 * cell, 2.0 * cell);
        let cols = ((bounds.width / cell).ceil() as i32).checked_add(1)?;
        let rows = ((bounds.height / cell).ceil() as i32).checked_add(1)?;
        // Cell indices are computed in i32
        let cells = usize::try_from(cols.checked_mul(rows)?).ok()?;
        if cells > max_cells {
            return None;
        }

        let mut grid = Self {
            cell,
            origin: bounds.position(),
            cols,
            rows,
            owners: vec![Vec::new(); cells],
        };
        for &(id, rect) in obstacles {
            let (start_x, start_y) = grid.clamped_cell(rect.position());
            let (end_x, end_y) = grid.clamped_cell(Point::new(rect.right(), rect.bottom()));
            for iy in start_y..=end_y {
                for ix in start_x..=end_x {
                    let index = grid.index(ix, iy);
                    grid.owners[index].push(id);
                }
            }
        }
        Some(grid)
    }

    fn index(&self, ix: i32, iy: i32) -> usize {
        (iy * self.cols + ix) as usize
    }

    fn clamped_cell(&self, point: Point) -> (i32, i32) {
        let ix = ((point.x - self.origin.x) / self.cell).floor() as i32;
        let iy = ((point.y - self.origin.y) / self.cell).floor() as i32;
        (ix.clamp(0, self.cols - 1), iy.clamp(0, self.rows - 1))
    }

    fn cell(&self, point: Point) -> Option<(i32, i32)> {
        let ix = ((point.x - self.origin.x) / self.cell).floor() as i32;
        let iy = ((point.y - self.origin.y) / self.cell).floor() as i32;
        (ix >= 0 && iy >= 0 && ix < self.cols && iy < self.rows).then_some((ix, iy))
    }

    fn center(&self, ix: i32, iy: i32) -> Point {
        Point::new(
            self.origin.x + (ix as f32 + 0.5) * self.cell,
            self.origin.y + (iy as f32 + 0.5) * self.cell,
        )
    }

    fn blocked(&self, ix: i32, iy: i32, endpoints: [VertexId; 2]) -> bool {
        self.owners[self.index(ix, iy)]
            .iter()
            .any(|owner| !endpoints.contains(owner))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct GridState {
    x: i32,
    y: i32,
    dir: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct GridEntry {
    estimate: u32,
    cost: u32,
    state: GridState,
}

// Min-heap on the estimate, ties broken on position for stable routes
impl Ord for GridEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .cmp(&self.estimate)
            .then_with(|| other.cost.cmp(&self.cost))
            .then_with(|| self.state.y.cmp(&other.state.y))
            .then_with(|| self.state.x.cmp(&other.state.x))
            .then_with(|| self.state.dir.cmp(&other.state.dir))
    }
}

impl PartialOrd for GridEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PathFinderRouter {
    fn search(
        &self,
        grid: &RoutingGrid,
        start: Point,
        end: Point,
        endpoints: [VertexId; 2],
    ) -> Option<Vec<Point>> {
        let (start_x, start_y) = grid.cell(start)?;
        let (end_x, end_y) = grid.cell(end)?;
        if (start_x, start_y) == (end_x, end_y) {
            return Some(vec![start, end]);
        }

        let turn_cost = (self.turn_penalty.max(0.0) * STEP_COST as f32).round() as u32;
        let state_index = |s: GridState| grid.index(s.x, s.y) * 4 + s.dir as usize;
        let states = (grid.cols * grid.rows * 4) as usize;
        let mut best_cost = vec![u32::MAX; states];
        let mut previous: Vec<Option<GridState>> = vec![None; states];
        let mut heap = BinaryHeap::new();

        for dir in 0..4 {
            let state = GridState {
                x: start_x,
                y: start_y,
                dir,
            };
            best_cost[state_index(state)] = 0;
            heap.push(GridEntry {
                estimate: 0,
                cost: 0,
                state,
            });
        }

        let mut found = None;
        let mut expansions = 0;
        while let Some(GridEntry { cost, state, .. }) = heap.pop() {
            expansions += 1;
            if expansions > self.max_expansions {
                break;
            }
            if cost != best_cost[state_index(state)] {
                continue;
            }
            if (state.x, state.y) == (end_x, end_y) {
                found = Some(state);
                break;
            }

            for (dir, (dx, dy)) in DIRECTIONS.iter().enumerate() {
                let (nx, ny) = (state.x + dx, state.y + dy);
                if nx < 0 || ny < 0 || nx >= grid.cols || ny >= grid.rows {
                    continue;
                }
                if grid.blocked(nx, ny, endpoints) {
                    continue;
                }
                let mut next_cost = cost.saturating_add(STEP_COST);
                if state.dir != dir as u8 {
                    next_cost = next_cost.saturating_add(turn_cost);
                }
                let next = GridState {
                    x: nx,
                    y: ny,
                    dir: dir as u8,
                };
                if next_cost >= best_cost[state_index(next)] {
                    continue;
                }
                best_cost[state_index(next)] = next_cost;
                previous[state_index(next)] = Some(state);
                let manhattan = (nx - end_x).unsigned_abs() + (ny - end_y).unsigned_abs();
                heap.push(GridEntry {
                    estimate: next_cost.saturating_add(manhattan.saturating_mul(STEP_COST)),
                    cost: next_cost,
                    state: next,
                });
            }
        }

        let mut cells = Vec::new();
        let mut current = found?;
        loop {
            cells.push(grid.center(current.x, current.y));
            match previous[state_index(current)] {
                Some(state) => current = state,
                None => break,
            }
        }
        cells.reverse();

        let mut points = Vec::with_capacity(cells.len() + 2);
        points.push(start);
        points.extend(cells);
        points.push(end);
        Some(simplify(&points))
    }
}

/// Drop repeated points and the middle of collinear runs, keeping both ends
fn simplify(points: &[Point]) -> Vec<Point> {
    let Some((&last, rest)) = points.split_last() else {
        return Vec::new();
    };
    let collinear = |out: &[Point], next: Point| {
        matches!(out, [.., a, b] if (*b - *a).cross(next - *b).abs() < EPSILON)
    };

    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &point in rest {
        if out.last().is_some_and(|p| p.distance(point) < EPSILON) {
            continue;
        }
        if collinear(&out, point) {
            out.pop();
        }
        out.push(point);
    }
    if collinear(&out, last) {
        out.pop();
    }
    if out.len() > 1 && out.last().is_some_and(|p| p.distance(last) < EPSILON) {
        out.pop();
    }
    out.push(last);
    out
}

impl EdgeRouting for PathFinderRouter {
    fn compute(
        &mut self,
        input: &RoutingInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError> {
        let obstacles: Vec<(VertexId, Rect)> = input
            .graph
            .vertices()
            .filter_map(|vertex| Some((vertex.id, input.rect(vertex.id)?)))
            .map(|(id, rect)| (id, rect.inflate(self.obstacle_margin, self.obstacle_margin)))
            .collect();
        let grid = RoutingGrid::new(&obstacles, self.cell_size.max(1.0), self.max_cells);
        if grid.is_none() && !obstacles.is_empty() {
            debug!("Routing grid exceeds {} cells, routing straight", self.max_cells);
        }

        let mut routes = EdgeRoutes::new();
        let mut fallbacks = 0;
        for edge in input.routable_edges() {
            let (Some(source), Some(target)) = (input.rect(edge.source), input.rect(edge.target))
            else {
                continue;
            };
            let [start, end] = VertexShape::Rectangle.endpoints(&source, &target, Vec2::zero());

            let route = grid
                .as_ref()
                .filter(|_| !cancel.is_cancelled())
                .and_then(|grid| self.search(grid, start, end, [edge.source, edge.target]));
            let route = route.unwrap_or_else(|| {
                fallbacks += 1;
                vec![start, end]
            });
            routes.insert(edge.id, oriented(edge, route));
        }

        debug!(
            "Routed {} edges around obstacles, {} straight fallbacks",
            routes.len(),
            fallbacks
        );
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::tests::row;
    use test_log::test;

    #[test]
    fn test_route_goes_around_the_vertex_in_between() {
        let (mut graph, ids, positions, rects) = row(3);
        let edge = graph.add_edge(ids[0], ids[2]).unwrap();
        let routes = PathFinderRouter::default()
            .compute(
                &RoutingInput::new(&graph, &positions, &rects),
                &CancellationToken::new(),
            )
            .unwrap();

        let route = &routes[&edge];
        assert!(route.len() > 2);
        assert_eq!(route[0], Point::new(20.0, 10.0));
        assert_eq!(route[route.len() - 1], Point::new(200.0, 10.0));

        let obstacle = rects[&ids[1]];
        for segment in route.windows(2) {
            for step in 0..=20 {
                let p = segment[0].lerp(segment[1], step as f32 / 20.0);
                assert!(!obstacle.contains(p), "{p:?} inside {obstacle:?}");
            }
        }
    }

    #[test]
    fn test_clear_line_of_sight_stays_straight() {
        let (mut graph, ids, positions, rects) = row(2);
        let edge = graph.add_edge(ids[0], ids[1]).unwrap();
        let routes = PathFinderRouter::default()
            .compute(
                &RoutingInput::new(&graph, &positions, &rects),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(
            routes[&edge],
            vec![Point::new(20.0, 10.0), Point::new(100.0, 10.0)]
        );
    }

    #[test]
    fn test_oversized_grid_falls_back_to_straight_lines() {
        let (mut graph, ids, positions, rects) = row(3);
        let edge = graph.add_edge(ids[0], ids[2]).unwrap();
        let mut router = PathFinderRouter {
            max_cells: 10,
            ..Default::default()
        };
        let routes = router
            .compute(
                &RoutingInput::new(&graph, &positions, &rects),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(
            routes[&edge],
            vec![Point::new(20.0, 10.0), Point::new(200.0, 10.0)]
        );
    }

    #[test]
    fn test_unbounded_cell_cap_with_distant_vertices() {
        let (mut graph, ids, mut positions, mut rects) = row(2);
        let far = Rect::new(1e6, 1e6, 20.0, 20.0);
        rects.insert(ids[1], far);
        positions.insert(ids[1], far.position());
        let edge = graph.add_edge(ids[0], ids[1]).unwrap();
        let mut router = PathFinderRouter {
            cell_size: 1.0,
            max_cells: usize::MAX,
            ..Default::default()
        };
        let routes = router
            .compute(
                &RoutingInput::new(&graph, &positions, &rects),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(routes[&edge].len(), 2);
    }

    #[test]
    fn test_simplify_collapses_collinear_points() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(10.0, 10.0),
        ];
        assert_eq!(
            simplify(&points),
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0)
            ]
        );
    }
}
