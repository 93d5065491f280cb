use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine error. Cloneable so one parse outcome can be handed to every
/// caller waiting on the same file.
#[derive(Error, Debug, Clone)]
pub enum PlotError {
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Invalid FITS data: {0}")]
    Parse(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Plot state is stale: {0}")]
    Staleness(String),

    #[error("Stretch did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Resource limit exceeded: {0}")]
    Resource(String),

    #[error("Access denied: {0}")]
    Security(String),

    #[error("Invalid zoom: {0}")]
    InvalidZoom(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Unknown plot context: {0}")]
    UnknownContext(String),

    #[error("Band {0} is not part of this plot")]
    MissingBand(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for PlotError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl PlotError {
    /// I/O error that names the file it happened on.
    pub fn io_at(path: &Path, err: std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io(Arc::new(std::io::Error::new(
            kind,
            format!("{}: {err}", path.display()),
        )))
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry(message.into())
    }

    /// Failures that mean the files behind a plot are gone or unusable and
    /// a recreation from the original request may fix them.
    pub fn is_stale_source(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Parse(_) | Self::Staleness(_))
    }

    /// Structured reason for callers on the far side of the command layer.
    pub fn reason(&self) -> FailureReason {
        let brief = match self {
            Self::Io(_) => "File could not be read",
            Self::Parse(_) => "File is not a valid FITS image",
            Self::Geometry(_) => "Geometric operation failed",
            Self::Staleness(_) => "Plot could not be recreated",
            Self::Timeout(_) => "Image stretch timed out",
            Self::Resource(_) => "File is too large",
            Self::Security(_) => "Access not permitted",
            Self::InvalidZoom(_) => "Invalid zoom level",
            Self::InvalidDimensions { .. } => "Invalid image dimensions",
            Self::UnknownContext(_) => "Plot no longer exists",
            Self::MissingBand(_) => "Band not available",
            Self::Config(_) => "Invalid configuration",
        };
        FailureReason {
            brief: brief.to_string(),
            detail: self.to_string(),
        }
    }
}

/// Brief + detailed failure description handed back across the external
/// boundary in place of a raw error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub brief: String,
    pub detail: String,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.brief, self.detail)
    }
}

pub type Result<T> = std::result::Result<T, PlotError>;
