use crate::{EdgeId, VertexId};
use thiserror::Error;

/// Structural problems in the input graph
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("vertex {0} is already part of the graph")]
    DuplicateVertex(VertexId),

    #[error("edge {0} is already part of the graph")]
    DuplicateEdge(EdgeId),

    #[error("edge {edge} references vertex {vertex} which is not part of the graph")]
    MissingVertex { edge: EdgeId, vertex: VertexId },

    #[error("unknown vertex {0}")]
    UnknownVertex(VertexId),

    #[error("no identifier is left above the largest one in use")]
    IdsExhausted,
}

/// Invalid or incomplete computation request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("vertex sizes are required by the selected algorithms but none were provided")]
    MissingSizes,

    #[error("parameters for {params} cannot configure a {kind} algorithm")]
    ParameterMismatch { kind: String, params: String },

    #[error("custom layout selected without an algorithm instance or seed positions")]
    MissingCustomLayout,

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Errors that abort a layout computation
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("layout produced no position for vertex {0}")]
    IncompleteLayout(VertexId),

    #[error("layout produced a non-finite position for vertex {0}")]
    NonFinitePosition(VertexId),

    #[error("a layout worker thread panicked")]
    WorkerPanicked,
}
