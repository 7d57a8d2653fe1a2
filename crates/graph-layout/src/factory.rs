//! Algorithm selection
//!
//! Callers pick an algorithm by kind and may pass a parameter object. The
//! factory checks that both agree, falls back to the default parameters of the
//! kind and validates them.

use crate::layout::{CustomLayout, LayoutAlgorithm, LayoutInput, LayoutParams};
use crate::overlap::{Fsa, OneWayFsa, OverlapParams};
use crate::routing::{EdgeBundlingParams, EdgeRouter, PathFinderRouter, RoutingParams, SimpleRouter};
use crate::{CancellationToken, ConfigError, LayoutError, PositionMap};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutAlgorithmKind {
    #[default]
    KamadaKawai,
    FruchtermanReingold,
    Isom,
    LinLog,
    Layered,
    Tree,
    Random,
    /// Caller supplied algorithm or positions
    Custom,
}

impl LayoutAlgorithmKind {
    /// Whether the algorithm reads vertex sizes
    pub fn needs_sizes(self) -> bool {
        matches!(self, Self::Layered | Self::Tree)
    }

    /// Default parameters of a built-in algorithm
    pub fn default_params(self) -> Option<LayoutParams> {
        let params = match self {
            Self::KamadaKawai => LayoutParams::KamadaKawai(Default::default()),
            Self::FruchtermanReingold => LayoutParams::FruchtermanReingold(Default::default()),
            Self::Isom => LayoutParams::Isom(Default::default()),
            Self::LinLog => LayoutParams::LinLog(Default::default()),
            Self::Layered => LayoutParams::Layered(Default::default()),
            Self::Tree => LayoutParams::Tree(Default::default()),
            Self::Random => LayoutParams::Random(Default::default()),
            Self::Custom => return None,
        };
        Some(params)
    }

    /// Whether vertices may overlap after this layout
    pub fn needs_overlap_removal(self) -> bool {
        matches!(
            self,
            Self::KamadaKawai | Self::FruchtermanReingold | Self::Isom | Self::LinLog | Self::Random
        )
    }
}

impl From<&LayoutParams> for LayoutAlgorithmKind {
    fn from(params: &LayoutParams) -> Self {
        match params {
            LayoutParams::KamadaKawai(_) => Self::KamadaKawai,
            LayoutParams::FruchtermanReingold(_) => Self::FruchtermanReingold,
            LayoutParams::Isom(_) => Self::Isom,
            LayoutParams::LinLog(_) => Self::LinLog,
            LayoutParams::Layered(_) => Self::Layered,
            LayoutParams::Tree(_) => Self::Tree,
            LayoutParams::Random(_) => Self::Random,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OverlapAlgorithmKind {
    #[default]
    Fsa,
    OneWayFsa,
}

impl From<&OverlapParams> for OverlapAlgorithmKind {
    fn from(params: &OverlapParams) -> Self {
        match params {
            OverlapParams::Fsa(_) => Self::Fsa,
            OverlapParams::OneWayFsa(_) => Self::OneWayFsa,
        }
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoutingAlgorithmKind {
    #[default]
    Simple,
    PathFinder,
    Bundling,
}

impl From<&RoutingParams> for RoutingAlgorithmKind {
    fn from(params: &RoutingParams) -> Self {
        match params {
            RoutingParams::Simple(_) => Self::Simple,
            RoutingParams::PathFinder(_) => Self::PathFinder,
            RoutingParams::Bundling(_) => Self::Bundling,
        }
    }
}

fn mismatch(kind: impl fmt::Display, params: impl fmt::Display) -> ConfigError {
    ConfigError::ParameterMismatch {
        kind: kind.to_string(),
        params: params.to_string(),
    }
}

/// Layout algorithm resolved from a kind
#[derive(Clone)]
pub enum SelectedLayout {
    Builtin(LayoutParams),
    Custom(CustomLayout),
    /// Custom kind without an instance, the seed positions are the layout
    Passthrough,
}

impl fmt::Debug for SelectedLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(params) => f.debug_tuple("Builtin").field(params).finish(),
            Self::Custom(_) => f.write_str("Custom"),
            Self::Passthrough => f.write_str("Passthrough"),
        }
    }
}

impl LayoutAlgorithm for SelectedLayout {
    fn compute(
        &self,
        input: &LayoutInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<PositionMap, LayoutError> {
        match self {
            Self::Builtin(params) => params.compute(input, cancel),
            Self::Custom(layout) => layout.compute(input, cancel),
            Self::Passthrough => Ok(input.passthrough()),
        }
    }
}

pub fn create_layout(
    kind: LayoutAlgorithmKind,
    params: Option<LayoutParams>,
    custom: Option<CustomLayout>,
) -> Result<SelectedLayout, ConfigError> {
    if kind == LayoutAlgorithmKind::Custom {
        if let Some(params) = params {
            return Err(mismatch(kind, LayoutAlgorithmKind::from(&params)));
        }
        return Ok(custom.map_or(SelectedLayout::Passthrough, SelectedLayout::Custom));
    }
    if custom.is_some() {
        return Err(mismatch(kind, LayoutAlgorithmKind::Custom));
    }

    let params = match params {
        Some(params) if LayoutAlgorithmKind::from(&params) == kind => params,
        Some(params) => return Err(mismatch(kind, LayoutAlgorithmKind::from(&params))),
        None => kind
            .default_params()
            .ok_or(ConfigError::MissingCustomLayout)?,
    };
    Ok(SelectedLayout::Builtin(params))
}

pub fn create_overlap_removal(
    kind: OverlapAlgorithmKind,
    params: Option<OverlapParams>,
) -> Result<OverlapParams, ConfigError> {
    let params = match params {
        Some(params) if OverlapAlgorithmKind::from(&params) == kind => params,
        Some(params) => return Err(mismatch(kind, OverlapAlgorithmKind::from(&params))),
        None => match kind {
            OverlapAlgorithmKind::Fsa => OverlapParams::Fsa(Fsa::default()),
            OverlapAlgorithmKind::OneWayFsa => OverlapParams::OneWayFsa(OneWayFsa::default()),
        },
    };
    match &params {
        OverlapParams::Fsa(fsa) => fsa.validate()?,
        OverlapParams::OneWayFsa(fsa) => fsa.validate()?,
    }
    Ok(params)
}

pub fn create_router(
    kind: RoutingAlgorithmKind,
    params: Option<RoutingParams>,
) -> Result<EdgeRouter, ConfigError> {
    let params = match params {
        Some(params) if RoutingAlgorithmKind::from(&params) == kind => params,
        Some(params) => return Err(mismatch(kind, RoutingAlgorithmKind::from(&params))),
        None => match kind {
            RoutingAlgorithmKind::Simple => RoutingParams::Simple(SimpleRouter::default()),
            RoutingAlgorithmKind::PathFinder => {
                RoutingParams::PathFinder(PathFinderRouter::default())
            }
            RoutingAlgorithmKind::Bundling => {
                RoutingParams::Bundling(EdgeBundlingParams::default())
            }
        },
    };
    if let RoutingParams::Bundling(bundling) = &params {
        bundling.validate()?;
    }
    Ok(EdgeRouter::from(params))
}
