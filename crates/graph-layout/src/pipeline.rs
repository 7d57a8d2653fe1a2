//! Layout, overlap removal and routing chained into one request
//!
//! A request moves through `Idle -> LayoutRunning -> OverlapRunning ->
//! RoutingRunning -> Done`, or ends in `Cancelled` as soon as its token is set.
//! Whatever the outcome, the maps of a [`PipelineOutput`] cover every vertex
//! and agree with one another.

use crate::factory::{
    create_layout, create_overlap_removal, create_router, LayoutAlgorithmKind,
    OverlapAlgorithmKind, RoutingAlgorithmKind, SelectedLayout,
};
use crate::layout::{CustomLayout, LayoutAlgorithm, LayoutInput, LayoutParams};
use crate::overlap::{OverlapParams, OverlapRemoval};
use crate::routing::{
    existing_routes, EdgeRouter, EdgeRouting, EdgeRoutes, RoutingInput, RoutingParams,
};
use crate::sizes::rectangles;
use crate::{
    CancellationToken, ConfigError, EdgeId, GraphError, LayoutError, LayoutGraph, Point,
    PositionMap, Rect, RectMap, SizeMap, Vec2, VertexId,
};
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{self, Receiver};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Algorithms selected for a pipeline
///
/// Parameters are optional, the defaults of the selected kind are used when
/// they are missing. Parameters that do not match the kind are rejected.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub layout: LayoutAlgorithmKind,
    pub layout_params: Option<LayoutParams>,
    /// `None` disables overlap removal
    pub overlap: Option<OverlapAlgorithmKind>,
    pub overlap_params: Option<OverlapParams>,
    /// `None` disables edge routing
    pub routing: Option<RoutingAlgorithmKind>,
    pub routing_params: Option<RoutingParams>,
    /// Algorithm run for [`LayoutAlgorithmKind::Custom`]
    #[serde(skip)]
    pub custom_layout: Option<CustomLayout>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: LayoutAlgorithmKind::default(),
            layout_params: None,
            overlap: Some(OverlapAlgorithmKind::default()),
            overlap_params: None,
            routing: Some(RoutingAlgorithmKind::default()),
            routing_params: None,
            custom_layout: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("layout", &self.layout)
            .field("layout_params", &self.layout_params)
            .field("overlap", &self.overlap)
            .field("overlap_params", &self.overlap_params)
            .field("routing", &self.routing)
            .field("routing_params", &self.routing_params)
            .field("custom_layout", &self.custom_layout.is_some())
            .finish()
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    LayoutRunning,
    OverlapRunning,
    RoutingRunning,
    Done,
    Cancelled,
}

impl PipelineState {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Self::LayoutRunning | Self::OverlapRunning | Self::RoutingRunning
        )
    }
}

/// Notification sent each time a stage completes
///
/// Stage events carry the full result of their stage, so a view can be updated
/// progressively. A cancelled stage sends nothing, only the final event.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    LayoutFinished(PositionMap),
    OverlapFinished(RectMap),
    RoutingFinished(EdgeRoutes),
    PipelineFinished(PipelineState),
}

/// Graph snapshot a pipeline runs on
#[derive(Debug, Clone, Default)]
pub struct LayoutRequest {
    pub graph: LayoutGraph,
    /// Measured vertex sizes, required by some layouts and by overlap removal
    pub sizes: Option<SizeMap>,
    /// Positions to start from
    pub seeds: Option<PositionMap>,
}

impl LayoutRequest {
    pub fn new(graph: LayoutGraph) -> Self {
        Self {
            graph,
            ..Default::default()
        }
    }

    pub fn with_sizes(mut self, sizes: SizeMap) -> Self {
        self.sizes = Some(sizes);
        self
    }

    pub fn with_seeds(mut self, seeds: PositionMap) -> Self {
        self.seeds = Some(seeds);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// `Done` or `Cancelled`
    pub state: PipelineState,
    /// Top-left position of every vertex
    pub positions: PositionMap,
    /// Vertex rectangles after overlap removal
    pub rectangles: RectMap,
    pub routes: EdgeRoutes,
}

/// Configured chain of algorithms
///
/// The router is kept between requests, so [`Pipeline::move_vertex`] can
/// reuse the state of the last run.
#[derive(Debug)]
pub struct Pipeline {
    layout_kind: LayoutAlgorithmKind,
    layout: SelectedLayout,
    overlap: Option<OverlapParams>,
    router: Option<EdgeRouter>,
    state: Arc<AtomicCell<PipelineState>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        let layout = create_layout(config.layout, config.layout_params, config.custom_layout)?;
        let overlap = optional_stage(config.overlap, config.overlap_params, create_overlap_removal)?;
        let router = optional_stage(config.routing, config.routing_params, create_router)?;
        Ok(Self {
            layout_kind: config.layout,
            layout,
            overlap,
            router,
            state: Arc::default(),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state.load()
    }

    pub fn router(&self) -> Option<&EdgeRouter> {
        self.router.as_ref()
    }

    fn overlap_stage(&self) -> Option<&OverlapParams> {
        self.overlap
            .as_ref()
            .filter(|_| self.layout_kind.needs_overlap_removal())
    }

    fn needs_sizes(&self) -> bool {
        self.layout_kind.needs_sizes() || self.overlap_stage().is_some()
    }

    /// Run a request on the calling thread
    pub fn run(
        &mut self,
        request: &LayoutRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, LayoutError> {
        self.run_observed(request, cancel, |_| {})
    }

    /// Run a request on the calling thread, reporting each finished stage
    pub fn run_observed(
        &mut self,
        request: &LayoutRequest,
        cancel: &CancellationToken,
        mut on_event: impl FnMut(StageEvent),
    ) -> Result<PipelineOutput, LayoutError> {
        match self.execute(request, cancel, &mut on_event) {
            Ok(output) => {
                debug!("Pipeline finished: {}", output.state);
                self.state.store(output.state);
                on_event(StageEvent::PipelineFinished(output.state));
                Ok(output)
            }
            Err(err) => {
                debug!("Pipeline rejected the request: {err}");
                self.state.store(PipelineState::Idle);
                Err(err)
            }
        }
    }

    fn execute(
        &mut self,
        request: &LayoutRequest,
        cancel: &CancellationToken,
        on_event: &mut dyn FnMut(StageEvent),
    ) -> Result<PipelineOutput, LayoutError> {
        let graph = &request.graph;
        graph.validate()?;
        if request.sizes.is_none() && self.needs_sizes() {
            return Err(ConfigError::MissingSizes.into());
        }
        if matches!(self.layout, SelectedLayout::Passthrough) && request.seeds.is_none() {
            return Err(ConfigError::MissingCustomLayout.into());
        }
        let no_sizes = SizeMap::new();
        let sizes = request.sizes.as_ref().unwrap_or(&no_sizes);

        self.state.store(PipelineState::LayoutRunning);
        debug!(
            "Running {} layout on {} vertices",
            self.layout_kind,
            graph.vertex_count()
        );
        let mut input = LayoutInput::new(graph, sizes);
        if let Some(seeds) = &request.seeds {
            input = input.with_seeds(seeds);
        }
        let mut positions = self.layout.compute(&input, cancel)?;
        check_positions(graph, &positions)?;
        let mut rects = rectangles(&positions, sizes);
        if cancel.is_cancelled() {
            return Ok(cancelled(graph, positions, rects));
        }
        on_event(StageEvent::LayoutFinished(positions.clone()));

        if let Some(overlap) = self.overlap_stage() {
            self.state.store(PipelineState::OverlapRunning);
            debug!("Removing overlaps");
            let movable: RectMap = graph
                .layout_vertices()
                .filter_map(|id| Some((id, *rects.get(&id)?)))
                .collect();
            for (id, rect) in overlap.compute(&movable, cancel) {
                positions.insert(id, rect.position());
                rects.insert(id, rect);
            }
            check_positions(graph, &positions)?;
            if cancel.is_cancelled() {
                return Ok(cancelled(graph, positions, rects));
            }
            on_event(StageEvent::OverlapFinished(rects.clone()));
        } else if self.overlap.is_some() {
            debug!(
                "Skipping overlap removal, {} layouts do not overlap vertices",
                self.layout_kind
            );
        }

        let routes = match self.router.as_mut() {
            Some(router) => {
                self.state.store(PipelineState::RoutingRunning);
                debug!("Routing {} edges", graph.edge_count());
                let routes =
                    router.compute(&RoutingInput::new(graph, &positions, &rects), cancel)?;
                if cancel.is_cancelled() {
                    return Ok(cancelled(graph, positions, rects));
                }
                on_event(StageEvent::RoutingFinished(routes.clone()));
                routes
            }
            None => existing_routes(graph),
        };

        Ok(PipelineOutput {
            state: PipelineState::Done,
            positions,
            rectangles: rects,
            routes,
        })
    }

    /// Move one vertex of a finished output and reroute its edges
    ///
    /// The vertex keeps its size. Routes of edges not touching it are left as
    /// they are. On error `output` is unchanged.
    pub fn move_vertex(
        &mut self,
        graph: &LayoutGraph,
        output: &mut PipelineOutput,
        vertex: VertexId,
        position: Point,
        cancel: &CancellationToken,
    ) -> Result<(), LayoutError> {
        move_vertex_with(self.router.as_mut(), graph, output, vertex, position, cancel)
    }

    /// Run a request on a background thread
    pub fn spawn(mut self, request: LayoutRequest) -> io::Result<PipelineHandle> {
        let cancel = CancellationToken::new();
        let state = Arc::clone(&self.state);
        let (tx, rx) = channel::unbounded();

        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name("graphwerk-pipeline".into())
            .spawn(move || -> Result<(Pipeline, PipelineOutput), LayoutError> {
                let output = self.run_observed(&request, &token, |event| {
                    // The receiver may be gone, the output is still returned by join
                    let _ = tx.send(event);
                })?;
                Ok((self, output))
            })?;

        Ok(PipelineHandle {
            events: rx,
            state,
            cancel,
            handle: Some(handle),
        })
    }
}

fn optional_stage<K, P, T>(
    kind: Option<K>,
    params: Option<P>,
    create: impl FnOnce(K, Option<P>) -> Result<T, ConfigError>,
) -> Result<Option<T>, ConfigError>
where
    K: for<'a> From<&'a P> + fmt::Display,
{
    match (kind, params) {
        (Some(kind), params) => create(kind, params).map(Some),
        (None, None) => Ok(None),
        (None, Some(params)) => Err(ConfigError::ParameterMismatch {
            kind: "disabled stage".into(),
            params: K::from(&params).to_string(),
        }),
    }
}

/// Every vertex of the graph must have a finite position
fn check_positions(graph: &LayoutGraph, positions: &PositionMap) -> Result<(), LayoutError> {
    for vertex in graph.vertices() {
        match positions.get(&vertex.id) {
            None => return Err(LayoutError::IncompleteLayout(vertex.id)),
            Some(position) if !position.is_finite() => {
                return Err(LayoutError::NonFinitePosition(vertex.id))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn cancelled(graph: &LayoutGraph, positions: PositionMap, rectangles: RectMap) -> PipelineOutput {
    PipelineOutput {
        state: PipelineState::Cancelled,
        positions,
        rectangles,
        routes: existing_routes(graph),
    }
}

/// Request running on a background thread
///
/// Dropping the handle cancels the request and waits for the thread.
#[derive(Debug)]
pub struct PipelineHandle {
    events: Receiver<StageEvent>,
    state: Arc<AtomicCell<PipelineState>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<Result<(Pipeline, PipelineOutput), LayoutError>>>,
}

impl PipelineHandle {
    /// Stage notifications, the channel closes once the request is over
    pub fn events(&self) -> &Receiver<StageEvent> {
        &self.events
    }

    pub fn state(&self) -> PipelineState {
        self.state.load()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the output, the pipeline is handed back for further updates
    pub fn join(mut self) -> Result<(Pipeline, PipelineOutput), LayoutError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| LayoutError::WorkerPanicked)?,
            None => Err(LayoutError::WorkerPanicked),
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel.cancel();
            let _ = handle.join();
        }
    }
}

/// Reroute into copies of the maps, committed once routing succeeded
fn move_vertex_with<R: EdgeRouting>(
    router: Option<&mut R>,
    graph: &LayoutGraph,
    output: &mut PipelineOutput,
    vertex: VertexId,
    position: Point,
    cancel: &CancellationToken,
) -> Result<(), LayoutError> {
    if !graph.contains_vertex(vertex) {
        return Err(GraphError::UnknownVertex(vertex).into());
    }
    if !position.is_finite() {
        return Err(LayoutError::NonFinitePosition(vertex));
    }
    let size = output
        .rectangles
        .get(&vertex)
        .map_or(Vec2::zero(), Rect::size);
    let mut positions = output.positions.clone();
    let mut rects = output.rectangles.clone();
    positions.insert(vertex, position);
    rects.insert(vertex, Rect::from_position(position, size));

    let mut routes = output.routes.clone();
    if let Some(router) = router {
        let edges: Vec<EdgeId> = graph
            .incident_edges(vertex)
            .filter(|edge| !edge.is_self_loop())
            .map(|edge| edge.id)
            .collect();
        debug!("Rerouting {} edges of {vertex}", edges.len());
        let input = RoutingInput::new(graph, &positions, &rects);
        router.recompute_edges(&input, &edges, &mut routes, cancel)?;
    }

    output.positions = positions;
    output.rectangles = rects;
    output.routes = routes;
    Ok(())
}
