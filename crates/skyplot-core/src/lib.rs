pub mod cache;
pub mod color_table;
pub mod config;
pub mod consts;
pub mod context;
pub mod error;
pub mod group;
pub mod histogram;
pub mod io;
pub mod plane;
pub mod request;
pub mod state;
pub mod stretch;
pub mod transform;
pub mod wcs;
pub mod writer;
pub mod zoom;
pub mod zscale;

pub use config::EngineConfig;
pub use context::{PlotContextManager, PlotPhase, PlotView};
pub use error::{PlotError, Result};
pub use plane::ImagePlane;
pub use request::PlotRequest;
pub use state::{Band, ContextKey, PlotState};
