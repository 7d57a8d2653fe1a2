use crate::{CancellationToken, Point, Vec2, VertexSizes};
use petgraph::graphmap::DiGraphMap;
use std::collections::HashMap;
use std::hash::Hash;

/// Assign coordinates to vertices based on their layer structure and sizes
pub(crate) fn assign_coordinates<N, S>(
    layers: &[Vec<N>],
    graph: &DiGraphMap<N, ()>,
    sizes: &S,
    margin: Vec2,
    max_position_iterations: usize,
    cancel: &CancellationToken,
) -> HashMap<N, Point>
where
    N: Copy + Ord + Hash,
    S: VertexSizes<N>,
{
    let mut positions = HashMap::new();

    // First pass: Horizontal positioning
    assign_horizontal_positions(layers, sizes, &mut positions, margin);

    // Second pass: Vertical positioning
    assign_vertical_positions(
        layers,
        graph,
        &mut positions,
        sizes,
        margin,
        max_position_iterations,
        cancel,
    );

    positions
}

/// Assign horizontal positions based on layers
fn assign_horizontal_positions<N, S>(
    layers: &[Vec<N>],
    sizes: &S,
    positions: &mut HashMap<N, Point>,
    margin: Vec2,
) where
    N: Copy + Ord + Hash,
    S: VertexSizes<N>,
{
    // Calculate the maximum width for each layer
    let layer_dimensions: Vec<Vec2> = layers
        .iter()
        .map(|layer| {
            layer
                .iter()
                .map(|&vertex| sizes.size(vertex))
                .fold(Vec2::zero(), Vec2::max)
        })
        .collect();

    let mut x = 0.0;
    for (layer_index, layer) in layers.iter().enumerate() {
        let layer_size = layer_dimensions[layer_index];
        for &vertex in layer {
            let vertex_size = sizes.size(vertex);
            positions.insert(
                vertex,
                Point::new(x + (layer_size.x - vertex_size.x) / 2.0, 0.0),
            );
        }
        x += layer_size.x + margin.x;
    }
}

/// Assign vertical positions with barycenter optimization
fn assign_vertical_positions<N, S>(
    layers: &[Vec<N>],
    graph: &DiGraphMap<N, ()>,
    positions: &mut HashMap<N, Point>,
    sizes: &S,
    margin: Vec2,
    max_iterations: usize,
    cancel: &CancellationToken,
) where
    N: Copy + Ord + Hash,
    S: VertexSizes<N>,
{
    // Initial positioning
    initial_vertical_positioning(layers, positions, sizes, margin);

    // Iterative optimization
    for _ in 0..max_iterations {
        if cancel.is_cancelled() {
            break;
        }
        let mut changed = false;

        for layer_idx in (0..layers.len().saturating_sub(1)).rev() {
            let layer = &layers[layer_idx];
            for &vertex in layer {
                let Some(new_y) =
                    calculate_barycenter(vertex, &layers[layer_idx + 1], graph, positions, sizes)
                else {
                    continue;
                };

                let Some(pos) = positions.get_mut(&vertex) else {
                    continue;
                };

                if (new_y - pos.y).abs() > 0.1 {
                    pos.y = new_y;
                    changed = true;
                }
            }

            // Enforce minimum vertical distance between vertices
            let mut ordered: Vec<_> = layer.to_vec();
            ordered.sort_by(|a, b| positions[a].y.total_cmp(&positions[b].y));

            for i in 1..ordered.len() {
                let above = ordered[i - 1];
                let below = ordered[i];
                let prev_bottom = positions[&above].y + sizes.size(above).y;
                let Some(curr) = positions.get_mut(&below) else {
                    continue;
                };

                if curr.y < prev_bottom + margin.y {
                    curr.y = prev_bottom + margin.y;
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }

    // Final adjustments
    normalize_vertical_positions(positions);
}

/// Calculate the barycenter (average position) of connected vertices
fn calculate_barycenter<N, S>(
    vertex: N,
    next_layer: &[N],
    graph: &DiGraphMap<N, ()>,
    positions: &HashMap<N, Point>,
    sizes: &S,
) -> Option<f32>
where
    N: Copy + Ord + Hash,
    S: VertexSizes<N>,
{
    let mut sum_y = 0.0;
    let mut count = 0;

    for &next_vertex in next_layer {
        if graph.contains_edge(vertex, next_vertex) {
            if let Some(pos) = positions.get(&next_vertex) {
                let next_height = sizes.size(next_vertex).y;
                sum_y += pos.y + next_height / 2.0;
                count += 1;
            }
        }
    }

    let vertex_height = sizes.size(vertex).y;

    if count > 0 {
        Some((sum_y / count as f32) - vertex_height / 2.0)
    } else {
        None
    }
}

/// Initial vertical positioning with uniform spacing
fn initial_vertical_positioning<N, S>(
    layers: &[Vec<N>],
    positions: &mut HashMap<N, Point>,
    sizes: &S,
    margin: Vec2,
) where
    N: Copy + Ord + Hash,
    S: VertexSizes<N>,
{
    for layer in layers {
        let mut y = 0.0;
        for &vertex in layer {
            if let Some(pos) = positions.get_mut(&vertex) {
                pos.y = y;
                y += margin.y + sizes.size(vertex).y;
            }
        }
    }
}

/// Normalize vertical positions to start from y=0
fn normalize_vertical_positions<N>(positions: &mut HashMap<N, Point>)
where
    N: Copy + Ord + Hash,
{
    let min_y = positions
        .values()
        .map(|pos| pos.y)
        .reduce(f32::min)
        .unwrap_or(0.0);

    for pos in positions.values_mut() {
        pos.y -= min_y;
    }
}
