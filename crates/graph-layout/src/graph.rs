use crate::error::GraphError;
use crate::geometry::Point;
use derive_more::{Display, From, Into};
use petgraph::graphmap::{DiGraphMap, UnGraphMap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Stable vertex identifier
#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    From,
    Into,
    Serialize,
    Deserialize,
)]
#[display("v{_0}")]
pub struct VertexId(pub u64);

/// Stable edge identifier
#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    From,
    Into,
    Serialize,
    Deserialize,
)]
#[display("e{_0}")]
pub struct EdgeId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    /// Excluded from layout and overlap removal, still part of the graph
    #[serde(default)]
    pub skip: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: VertexId,
    pub target: VertexId,
    /// Routing points from a previous computation, if any
    #[serde(default)]
    pub routing_points: Option<Vec<Point>>,
    /// The renderer draws this edge from target to source
    #[serde(default)]
    pub reverse_path: bool,
}

impl Edge {
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Directed multigraph keyed by stable integer ids
///
/// Parallel edges and self-loops are allowed. Every edge endpoint must be a
/// vertex of the graph, [`LayoutGraph::validate`] checks it.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    vertices: BTreeMap<VertexId, Vertex>,
    edges: BTreeMap<EdgeId, Edge>,
}

impl LayoutGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex with the next free id
    pub fn add_vertex(&mut self) -> VertexId {
        let id = self.next_vertex_id();
        self.vertices.insert(id, Vertex { id, skip: false });
        id
    }

    /// Insert a vertex with a caller-assigned id
    pub fn insert_vertex(&mut self, vertex: Vertex) -> Result<(), GraphError> {
        if self.vertices.contains_key(&vertex.id) {
            return Err(GraphError::DuplicateVertex(vertex.id));
        }
        self.vertices.insert(vertex.id, vertex);
        Ok(())
    }

    /// Add an edge with the next free id
    pub fn add_edge(&mut self, source: VertexId, target: VertexId) -> Result<EdgeId, GraphError> {
        let id = self.next_edge_id();
        self.insert_edge(Edge {
            id,
            source,
            target,
            routing_points: None,
            reverse_path: false,
        })?;
        Ok(id)
    }

    /// Insert an edge with a caller-assigned id
    pub fn insert_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if self.edges.contains_key(&edge.id) {
            return Err(GraphError::DuplicateEdge(edge.id));
        }
        for vertex in [edge.source, edge.target] {
            if !self.vertices.contains_key(&vertex) {
                return Err(GraphError::MissingVertex {
                    edge: edge.id,
                    vertex,
                });
            }
        }
        self.edges.insert(edge.id, edge);
        Ok(())
    }

    /// Remove a vertex and every edge touching it
    pub fn remove_vertex(&mut self, id: VertexId) -> Option<Vertex> {
        let vertex = self.vertices.remove(&id)?;
        self.edges
            .retain(|_, edge| edge.source != id && edge.target != id);
        Some(vertex)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        self.edges.remove(&id)
    }

    pub fn set_skip(&mut self, id: VertexId, skip: bool) -> Result<(), GraphError> {
        let vertex = self
            .vertices
            .get_mut(&id)
            .ok_or(GraphError::UnknownVertex(id))?;
        vertex.skip = skip;
        Ok(())
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    /// Vertices in ascending id order
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// Edges in ascending id order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Ids of the vertices taking part in layout, in ascending order
    pub fn layout_vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.values().filter(|v| !v.skip).map(|v| v.id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges having `vertex` as source or target
    pub fn incident_edges(&self, vertex: VertexId) -> impl Iterator<Item = &Edge> {
        self.edges
            .values()
            .filter(move |edge| edge.source == vertex || edge.target == vertex)
    }

    /// One past the largest vertex id, or the lowest free id once the largest
    /// id is `u64::MAX`
    pub fn next_vertex_id(&self) -> VertexId {
        VertexId(fresh_id(self.vertices.keys().map(|id| id.0)))
    }

    pub fn next_edge_id(&self) -> EdgeId {
        EdgeId(fresh_id(self.edges.keys().map(|id| id.0)))
    }

    /// Check that every edge endpoint is a vertex of the graph
    pub fn validate(&self) -> Result<(), GraphError> {
        for edge in self.edges.values() {
            for vertex in [edge.source, edge.target] {
                if !self.vertices.contains_key(&vertex) {
                    return Err(GraphError::MissingVertex {
                        edge: edge.id,
                        vertex,
                    });
                }
            }
        }
        Ok(())
    }

    /// Directed view over the non-skipped vertices
    ///
    /// Parallel edges collapse into one edge weighted by their count and
    /// self-loops are dropped.
    pub fn directed_view(&self) -> DiGraphMap<VertexId, usize> {
        let mut graph = DiGraphMap::new();
        for id in self.layout_vertices() {
            graph.add_node(id);
        }
        for edge in self.layout_edges() {
            if let Some(weight) = graph.edge_weight_mut(edge.source, edge.target) {
                *weight += 1;
            } else {
                graph.add_edge(edge.source, edge.target, 1);
            }
        }
        graph
    }

    /// Undirected view over the non-skipped vertices, see [`LayoutGraph::directed_view`]
    pub fn undirected_view(&self) -> UnGraphMap<VertexId, usize> {
        let mut graph = UnGraphMap::new();
        for id in self.layout_vertices() {
            graph.add_node(id);
        }
        for edge in self.layout_edges() {
            if let Some(weight) = graph.edge_weight_mut(edge.source, edge.target) {
                *weight += 1;
            } else {
                graph.add_edge(edge.source, edge.target, 1);
            }
        }
        graph
    }

    /// Non self-loop edges between two non-skipped vertices
    fn layout_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(|edge| {
            !edge.is_self_loop()
                && [edge.source, edge.target].iter().all(|id| {
                    self.vertices
                        .get(id)
                        .is_some_and(|vertex| !vertex.skip)
                })
        })
    }
}

/// Persisted vertex, the id is assigned on load when missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VertexRecord {
    pub id: Option<VertexId>,
    pub skip: bool,
    pub width: f32,
    pub height: f32,
    pub position: Option<Point>,
}

/// Persisted edge, the id is assigned on load when missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(default)]
    pub id: Option<EdgeId>,
    pub source: VertexId,
    pub target: VertexId,
    #[serde(default)]
    pub routing_points: Option<Vec<Point>>,
    #[serde(default)]
    pub reverse_path: bool,
}

/// Serialized form of a graph and its per-vertex data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphData {
    pub vertices: Vec<VertexRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// Graph rebuilt from [`GraphData`], with the per-vertex data split out
#[derive(Debug, Clone, Default)]
pub struct LoadedGraph {
    pub graph: LayoutGraph,
    pub sizes: HashMap<VertexId, crate::Vec2>,
    pub positions: HashMap<VertexId, Point>,
}

/// Next id for ascending `ids`, filling the lowest gap when the largest is
/// `u64::MAX`
fn fresh_id(ids: impl DoubleEndedIterator<Item = u64> + Clone) -> u64 {
    match ids.clone().next_back() {
        None => 0,
        Some(last) => last.checked_add(1).unwrap_or_else(|| {
            let mut expected = 0;
            for id in ids {
                if id != expected {
                    break;
                }
                expected = id.saturating_add(1);
            }
            expected
        }),
    }
}

/// Smallest id above every id in `ids`, `None` once `u64::MAX` is taken
fn first_fresh(ids: impl Iterator<Item = u64>) -> Option<u64> {
    ids.max().map_or(Some(0), |max| max.checked_add(1))
}

fn take_fresh(next: &mut Option<u64>) -> Result<u64, GraphError> {
    let id = next.ok_or(GraphError::IdsExhausted)?;
    *next = id.checked_add(1);
    Ok(id)
}

impl GraphData {
    /// Rebuild the graph, assigning ids to records that have none
    ///
    /// Fresh ids start above the largest id present in the data, so an id
    /// already used by a record is never handed out twice.
    pub fn load(self) -> Result<LoadedGraph, GraphError> {
        let mut next_vertex = first_fresh(self.vertices.iter().filter_map(|v| v.id.map(|id| id.0)));
        let mut next_edge = first_fresh(self.edges.iter().filter_map(|e| e.id.map(|id| id.0)));

        let mut loaded = LoadedGraph::default();
        for record in self.vertices {
            let id = match record.id {
                Some(id) => id,
                None => VertexId(take_fresh(&mut next_vertex)?),
            };
            loaded.graph.insert_vertex(Vertex {
                id,
                skip: record.skip,
            })?;
            loaded
                .sizes
                .insert(id, crate::Vec2::new(record.width, record.height));
            if let Some(position) = record.position {
                loaded.positions.insert(id, position);
            }
        }

        for record in self.edges {
            let id = match record.id {
                Some(id) => id,
                None => EdgeId(take_fresh(&mut next_edge)?),
            };
            loaded.graph.insert_edge(Edge {
                id,
                source: record.source,
                target: record.target,
                routing_points: record.routing_points,
                reverse_path: record.reverse_path,
            })?;
        }

        Ok(loaded)
    }

    /// Snapshot of a graph with the results of a computation
    ///
    /// Edges without a new route keep the routing points they already had.
    pub fn store(
        graph: &LayoutGraph,
        sizes: &HashMap<VertexId, crate::Vec2>,
        positions: &HashMap<VertexId, Point>,
        routes: &HashMap<EdgeId, Vec<Point>>,
    ) -> Self {
        let vertices = graph
            .vertices()
            .map(|vertex| {
                let size = sizes.get(&vertex.id).copied().unwrap_or_default();
                VertexRecord {
                    id: Some(vertex.id),
                    skip: vertex.skip,
                    width: size.x,
                    height: size.y,
                    position: positions.get(&vertex.id).copied(),
                }
            })
            .collect();
        let edges = graph
            .edges()
            .map(|edge| EdgeRecord {
                id: Some(edge.id),
                source: edge.source,
                target: edge.target,
                routing_points: routes
                    .get(&edge.id)
                    .or(edge.routing_points.as_ref())
                    .cloned(),
                reverse_path: edge.reverse_path,
            })
            .collect();
        Self { vertices, edges }
    }
}
