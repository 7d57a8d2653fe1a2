use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam::channel::RecvTimeoutError;
use graphwerk_layout::{
    CancellationToken, EdgeBundlingParams, GraphData, LayoutAlgorithmKind, LayoutRequest,
    OverlapAlgorithmKind, Pipeline, PipelineConfig, PipelineOutput, RoutingAlgorithmKind,
    RoutingParams, StageEvent,
};
use tracing::{debug, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    KamadaKawai,
    FruchtermanReingold,
    Isom,
    LinLog,
    Layered,
    Tree,
    Random,
    /// Keep the positions stored in the input
    Custom,
}

impl From<LayoutArg> for LayoutAlgorithmKind {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::KamadaKawai => Self::KamadaKawai,
            LayoutArg::FruchtermanReingold => Self::FruchtermanReingold,
            LayoutArg::Isom => Self::Isom,
            LayoutArg::LinLog => Self::LinLog,
            LayoutArg::Layered => Self::Layered,
            LayoutArg::Tree => Self::Tree,
            LayoutArg::Random => Self::Random,
            LayoutArg::Custom => Self::Custom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OverlapArg {
    Fsa,
    OneWayFsa,
    None,
}

impl From<OverlapArg> for Option<OverlapAlgorithmKind> {
    fn from(arg: OverlapArg) -> Self {
        match arg {
            OverlapArg::Fsa => Some(OverlapAlgorithmKind::Fsa),
            OverlapArg::OneWayFsa => Some(OverlapAlgorithmKind::OneWayFsa),
            OverlapArg::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RoutingArg {
    Simple,
    PathFinder,
    Bundling,
    None,
}

impl From<RoutingArg> for Option<RoutingAlgorithmKind> {
    fn from(arg: RoutingArg) -> Self {
        match arg {
            RoutingArg::Simple => Some(RoutingAlgorithmKind::Simple),
            RoutingArg::PathFinder => Some(RoutingAlgorithmKind::PathFinder),
            RoutingArg::Bundling => Some(RoutingAlgorithmKind::Bundling),
            RoutingArg::None => None,
        }
    }
}

/// Lay out a graph document and route its edges
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Graph document (RON)
    input: PathBuf,
    /// Pipeline configuration (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,
    #[arg(long, value_enum)]
    overlap: Option<OverlapArg>,
    #[arg(long, value_enum)]
    routing: Option<RoutingArg>,
    /// Random seed of the layout algorithm
    #[arg(long)]
    seed: Option<u64>,
    /// Bundle edges on the calling thread only
    #[arg(long)]
    no_threads: bool,
    /// Run the pipeline on a background thread
    #[arg(long = "async")]
    background: bool,
    /// Cancel a background run after this many milliseconds
    #[arg(long, requires = "background")]
    timeout: Option<u64>,
    /// Where to write the result, stdout when missing
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    ron::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Apply the command line selection on top of the config file
///
/// Parameters left over for a different kind are dropped so the new kind runs
/// with its defaults.
fn apply_overrides(config: &mut PipelineConfig, args: &Args) {
    if let Some(layout) = args.layout {
        config.layout = layout.into();
        if config
            .layout_params
            .as_ref()
            .is_some_and(|params| LayoutAlgorithmKind::from(params) != config.layout)
        {
            warn!("Ignoring layout parameters, {} was selected", config.layout);
            config.layout_params = None;
        }
    }
    if let Some(overlap) = args.overlap {
        config.overlap = overlap.into();
        if config.overlap_params.as_ref().is_some_and(|params| {
            config.overlap != Some(OverlapAlgorithmKind::from(params))
        }) {
            warn!("Ignoring overlap removal parameters");
            config.overlap_params = None;
        }
    }
    if let Some(routing) = args.routing {
        config.routing = routing.into();
        if config.routing_params.as_ref().is_some_and(|params| {
            config.routing != Some(RoutingAlgorithmKind::from(params))
        }) {
            warn!("Ignoring routing parameters");
            config.routing_params = None;
        }
    }

    if let Some(seed) = args.seed {
        if config.layout_params.is_none() {
            config.layout_params = config.layout.default_params();
        }
        if let Some(params) = config.layout_params.as_mut() {
            params.set_seed(seed);
        }
    }

    if args.no_threads && config.routing == Some(RoutingAlgorithmKind::Bundling) {
        let params = config
            .routing_params
            .get_or_insert_with(|| RoutingParams::Bundling(EdgeBundlingParams::default()));
        if let RoutingParams::Bundling(params) = params {
            params.use_threading = false;
        }
    }
}

fn describe(event: &StageEvent) -> String {
    match event {
        StageEvent::LayoutFinished(positions) => {
            format!("layout finished, {} vertices placed", positions.len())
        }
        StageEvent::OverlapFinished(rectangles) => {
            format!("overlap removal finished, {} rectangles", rectangles.len())
        }
        StageEvent::RoutingFinished(routes) => {
            format!("routing finished, {} edges routed", routes.len())
        }
        StageEvent::PipelineFinished(state) => format!("pipeline finished: {state}"),
    }
}

fn run_in_background(
    pipeline: Pipeline,
    request: LayoutRequest,
    timeout: Option<u64>,
) -> Result<PipelineOutput> {
    let handle = pipeline
        .spawn(request)
        .context("Failed to start the pipeline thread")?;

    let mut deadline = timeout.map(|ms| Instant::now() + Duration::from_millis(ms));
    loop {
        let event = match deadline {
            Some(at) => match handle.events().recv_deadline(at) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Timed out, cancelling the pipeline");
                    handle.cancel();
                    deadline = None;
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match handle.events().recv() {
                Ok(event) => event,
                Err(_) => break,
            },
        };
        eprintln!("{}", describe(&event));
    }

    let (_, output) = handle.join()?;
    Ok(output)
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    debug!("Pipeline config: {config:?}");

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read graph {}", args.input.display()))?;
    let data: GraphData = ron::from_str(&text)
        .with_context(|| format!("Failed to parse graph {}", args.input.display()))?;
    let loaded = data.load().context("Invalid graph")?;

    let mut request = LayoutRequest::new(loaded.graph).with_sizes(loaded.sizes);
    if !loaded.positions.is_empty() {
        request = request.with_seeds(loaded.positions);
    }

    let mut pipeline = Pipeline::new(config).context("Invalid pipeline config")?;
    let output = if args.background {
        run_in_background(pipeline, request.clone(), args.timeout)?
    } else {
        pipeline.run_observed(&request, &CancellationToken::new(), |event| {
            eprintln!("{}", describe(&event))
        })?
    };

    let sizes = request.sizes.unwrap_or_default();
    let result = GraphData::store(&request.graph, &sizes, &output.positions, &output.routes);
    let text = ron::ser::to_string_pretty(&result, ron::ser::PrettyConfig::default())
        .context("Failed to serialize the result")?;
    match &args.output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{text}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphwerk_layout::{LayoutParams, TreeLayout};
    use test_log::test;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(["graphwerk", "graph.ron"].into_iter().chain(extra.iter().copied()))
    }

    #[test]
    fn test_layout_override_drops_foreign_parameters() {
        let mut config = PipelineConfig {
            layout: LayoutAlgorithmKind::Tree,
            layout_params: Some(LayoutParams::Tree(TreeLayout::default())),
            ..Default::default()
        };
        apply_overrides(&mut config, &args(&["--layout", "lin-log"]));
        assert_eq!(config.layout, LayoutAlgorithmKind::LinLog);
        assert_eq!(config.layout_params, None);
        assert!(Pipeline::new(config).is_ok());
    }

    #[test]
    fn test_seed_fills_in_default_parameters() {
        let mut config = PipelineConfig::default();
        apply_overrides(&mut config, &args(&["--layout", "random", "--seed", "9"]));
        assert!(matches!(
            config.layout_params,
            Some(LayoutParams::Random(ref random)) if random.seed == Some(9)
        ));
    }

    #[test]
    fn test_disabling_stages_and_threads() {
        let mut config = PipelineConfig::default();
        apply_overrides(
            &mut config,
            &args(&["--overlap", "none", "--routing", "bundling", "--no-threads"]),
        );
        assert_eq!(config.overlap, None);
        assert!(matches!(
            config.routing_params,
            Some(RoutingParams::Bundling(EdgeBundlingParams {
                use_threading: false,
                ..
            }))
        ));
    }
}
