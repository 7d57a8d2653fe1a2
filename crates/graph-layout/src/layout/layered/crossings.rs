use crate::CancellationToken;
use petgraph::visit::IntoNeighborsDirected;
use petgraph::Direction;
use std::hash::Hash;
use tracing::trace;

/// Minimize edge crossings by swapping adjacent vertices in layers
///
/// Uses a greedy local search approach with multiple iterations
pub(crate) fn minimize_crossings<G>(
    graph: G,
    mut layers: Vec<Vec<G::NodeId>>,
    max_iterations: usize,
    cancel: &CancellationToken,
) -> (Vec<Vec<G::NodeId>>, usize)
where
    G: IntoNeighborsDirected,
    G::NodeId: Copy + Ord + Hash,
{
    for iteration in 0..max_iterations {
        if cancel.is_cancelled() {
            break;
        }
        let mut improved = false;

        for layer_index in 0..layers.len() {
            let layer_len = layers[layer_index].len();
            for i in 0..layer_len.saturating_sub(1) {
                let crossings_before = count_crossings(graph, &layers);
                layers[layer_index].swap(i, i + 1);
                let crossings_after = count_crossings(graph, &layers);

                if crossings_after > crossings_before
                    || (crossings_after == crossings_before
                        && layers[layer_index][i] > layers[layer_index][i + 1])
                {
                    // Swap back if no improvement
                    layers[layer_index].swap(i, i + 1);
                } else {
                    improved = true;
                }
            }
        }

        if !improved {
            trace!("Crossing minimization settled after {iteration} iterations");
            break;
        }
    }

    let crossings = count_crossings(graph, &layers);
    (layers, crossings)
}

/// Count the number of edge crossings in the current layout
fn count_crossings<G>(graph: G, layers: &[Vec<G::NodeId>]) -> usize
where
    G: IntoNeighborsDirected,
    G::NodeId: Copy + Ord + Hash,
{
    let mut crossings = 0;

    for i in 0..layers.len().saturating_sub(1) {
        let upper_layer = &layers[i];
        let lower_layer = &layers[i + 1];

        for (idx1, &first) in upper_layer.iter().enumerate() {
            for (idx2, &second) in upper_layer.iter().enumerate().skip(idx1 + 1) {
                for first_target in graph.neighbors_directed(first, Direction::Outgoing) {
                    for second_target in graph.neighbors_directed(second, Direction::Outgoing) {
                        let pos1 = lower_layer.iter().position(|&n| n == first_target);
                        let pos2 = lower_layer.iter().position(|&n| n == second_target);
                        if let (Some(pos1), Some(pos2)) = (pos1, pos2) {
                            if (idx1 < idx2) != (pos1 < pos2) {
                                crossings += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    crossings
}
