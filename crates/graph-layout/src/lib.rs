//! Graph layout engine
//!
//! Places the vertices of a graph, pushes overlapping vertices apart and
//! routes the edges between the final vertex rectangles.
//!
//! # Layout algorithms
//!
//! - [`KamadaKawai`], [`FruchtermanReingold`], [`Isom`], [`LinLog`]: force directed
//! - [`LayeredLayout`]: Sugiyama-style layered layout
//! - [`TreeLayout`]: top-down or radial trees
//! - [`RandomLayout`]: uniform scatter
//!
//! # Edge routers
//!
//! - [`SimpleRouter`]: straight lines from boundary to boundary
//! - [`PathFinderRouter`]: orthogonal paths around the other vertices
//! - [`EdgeBundler`]: force directed edge bundling
//!
//! # Example
//!
//! ```
//! use graphwerk_layout::{
//!     CancellationToken, LayoutAlgorithmKind, LayoutGraph, LayoutRequest, Pipeline,
//!     PipelineConfig, PipelineState, Vec2,
//! };
//!
//! let mut graph = LayoutGraph::new();
//! let a = graph.add_vertex();
//! let b = graph.add_vertex();
//! let edge = graph.add_edge(a, b).unwrap();
//!
//! let sizes = [(a, Vec2::new(100.0, 50.0)), (b, Vec2::new(100.0, 50.0))].into();
//! let request = LayoutRequest::new(graph).with_sizes(sizes);
//!
//! let mut pipeline = Pipeline::new(PipelineConfig {
//!     layout: LayoutAlgorithmKind::Layered,
//!     ..Default::default()
//! })
//! .unwrap();
//! let output = pipeline.run(&request, &CancellationToken::new()).unwrap();
//!
//! assert_eq!(output.state, PipelineState::Done);
//! assert_eq!(output.routes[&edge].len(), 2);
//! ```

mod cancel;
mod error;
mod factory;
mod geometry;
mod graph;
mod pipeline;
mod sizes;

pub mod layout;
pub mod overlap;
pub mod routing;

pub use cancel::CancellationToken;
pub use error::{ConfigError, GraphError, LayoutError};
pub use factory::{
    create_layout, create_overlap_removal, create_router, LayoutAlgorithmKind,
    OverlapAlgorithmKind, RoutingAlgorithmKind, SelectedLayout,
};
pub use geometry::{
    angle, bounding_rect, line_intersection, segment_intersection, Point, Rect, Vec2, EPSILON,
};
pub use graph::{
    Edge, EdgeId, EdgeRecord, GraphData, LayoutGraph, LoadedGraph, Vertex, VertexId, VertexRecord,
};
pub use layout::{
    CustomLayout, FruchtermanReingold, Isom, KamadaKawai, LayeredLayout, LayoutAlgorithm,
    LayoutInput, LayoutParams, LinLog, RandomLayout, TreeLayout, TreeStyle,
};
pub use overlap::{Fsa, OneWayDirection, OneWayFsa, OverlapParams, OverlapRemoval};
pub use pipeline::{
    LayoutRequest, Pipeline, PipelineConfig, PipelineHandle, PipelineOutput, PipelineState,
    StageEvent,
};
pub use routing::{
    EdgeBundler, EdgeBundlingParams, EdgeRouter, EdgeRouting, EdgeRoutes, PathFinderRouter,
    RoutingInput, RoutingParams, SimpleRouter, VertexShape,
};
pub use sizes::{rectangles, PositionMap, RectMap, SizeMap, VertexSizes};
