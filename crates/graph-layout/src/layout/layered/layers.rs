use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{IntoNeighborsDirected, IntoNodeIdentifiers};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Copy the graph into a `DiGraphMap`, reversing DFS back edges
///
/// Returns the acyclic copy and the reversed edges in their original
/// direction. Self-loops are dropped.
pub(crate) fn acyclic_copy<G>(graph: G) -> (DiGraphMap<G::NodeId, ()>, Vec<(G::NodeId, G::NodeId)>)
where
    G: IntoNodeIdentifiers + IntoNeighborsDirected,
    G::NodeId: Copy + Ord + Hash,
{
    let mut nodes: Vec<_> = graph.node_identifiers().collect();
    nodes.sort();

    let mut acyclic = DiGraphMap::new();
    for &node in &nodes {
        acyclic.add_node(node);
    }

    let mut reversed = Vec::new();
    let mut finished = HashSet::new();
    let mut on_stack = HashSet::new();

    for &start in &nodes {
        if finished.contains(&start) {
            continue;
        }

        // Iterative DFS keeping the remaining successors of each frame
        let mut stack = vec![(start, sorted_successors(graph, start))];
        on_stack.insert(start);

        while let Some((node, successors)) = stack.last_mut() {
            let node = *node;
            let Some(succ) = successors.pop() else {
                stack.pop();
                on_stack.remove(&node);
                finished.insert(node);
                continue;
            };

            if succ == node {
                continue;
            }
            if on_stack.contains(&succ) {
                reversed.push((node, succ));
                acyclic.add_edge(succ, node, ());
            } else {
                acyclic.add_edge(node, succ, ());
                if !finished.contains(&succ) {
                    on_stack.insert(succ);
                    stack.push((succ, sorted_successors(graph, succ)));
                }
            }
        }
    }

    (acyclic, reversed)
}

/// Successors in descending order, so popping visits them ascending
fn sorted_successors<G>(graph: G, node: G::NodeId) -> Vec<G::NodeId>
where
    G: IntoNeighborsDirected,
    G::NodeId: Copy + Ord,
{
    let mut successors: Vec<_> = graph.neighbors_directed(node, Direction::Outgoing).collect();
    successors.sort_by(|a, b| b.cmp(a));
    successors.dedup();
    successors
}

/// Assign layers to vertices based on topological order
///
/// Uses a two-pass approach to minimize edge lengths:
/// - First pass: assign each vertex to the layer after its predecessors
/// - Second pass: move vertices closer to their successors when possible
pub(crate) fn assign_layers<N>(graph: &DiGraphMap<N, ()>) -> Vec<Vec<N>>
where
    N: Copy + Ord + Hash,
{
    // The graph is acyclic, fall back to id order all the same
    let topo_order = toposort(graph, None).unwrap_or_else(|_| {
        let mut nodes: Vec<_> = graph.nodes().collect();
        nodes.sort();
        nodes
    });
    let mut layer_map: HashMap<_, usize> = HashMap::new();

    // First pass: forward, assign each vertex to layer after its predecessors
    for &node in &topo_order {
        let max_pred_layer = graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|pred| layer_map.get(&pred).unwrap_or(&0) + 1)
            .max()
            .unwrap_or(0);
        layer_map.insert(node, max_pred_layer);
    }

    // Second pass: backward, move vertices closer to their successors
    for &node in topo_order.iter().rev() {
        let layer = *layer_map.get(&node).unwrap_or(&0);
        let min_succ_layer = graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|succ| *layer_map.get(&succ).unwrap_or(&0))
            .min()
            .unwrap_or(0);

        if min_succ_layer > layer + 1 {
            layer_map.insert(node, min_succ_layer.saturating_sub(1));
        }
    }

    // Group vertices by layer, ordered by id for stable results
    let max_layer = *layer_map.values().max().unwrap_or(&0);
    let mut layers = vec![Vec::new(); max_layer + 1];
    for (node, &layer) in &layer_map {
        layers[layer].push(*node);
    }
    for layer in &mut layers {
        layer.sort();
    }

    layers
}
