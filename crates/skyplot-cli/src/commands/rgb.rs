use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use skyplot_core::zoom::ZoomPolicy;
use skyplot_core::{Band, PlotContextManager, PlotRequest};
use tracing::warn;

use super::{load_config, save_png, GeometryArgs, RangeArgs};

#[derive(Args)]
pub struct RgbArgs {
    /// Red band FITS file
    #[arg(long)]
    pub red: Option<PathBuf>,

    /// Green band FITS file
    #[arg(long)]
    pub green: Option<PathBuf>,

    /// Blue band FITS file
    #[arg(long)]
    pub blue: Option<PathBuf>,

    #[command(flatten)]
    pub range: RangeArgs,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    /// Scale all bands by a shared intensity to keep star colors
    #[arg(long)]
    pub preserve_hue: bool,

    /// Zoom level
    #[arg(long, default_value = "1.0")]
    pub zoom: f32,

    /// Output file path
    #[arg(short, long, default_value = "rgb.png")]
    pub output: PathBuf,
}

pub fn run(args: &RgbArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let mut range = args.range.to_range(&config.default_range);
    range.preserve_hue = args.preserve_hue;
    let ops = args.geometry.ops();

    let mut requests = BTreeMap::new();
    for (band, file) in [
        (Band::Red, &args.red),
        (Band::Green, &args.green),
        (Band::Blue, &args.blue),
    ] {
        let Some(file) = file else { continue };
        let mut request = PlotRequest::new(file)
            .with_range(range.clone())
            .with_zoom(ZoomPolicy::Explicit(args.zoom));
        for op in &ops {
            request = request.with_op(op.clone());
        }
        requests.insert(band, request);
    }
    if requests.is_empty() {
        anyhow::bail!("Give at least one of --red, --green or --blue");
    }

    println!("Combining {} band(s)", requests.len());
    for (band, request) in &requests {
        println!("  {:<8}{}", band.to_string(), request.source.display());
    }

    let manager = PlotContextManager::from_config(config).context("Failed to start engine")?;
    let view = manager
        .create_three_color_plot(requests)
        .context("Failed to create three-color plot")?;
    save_png(&view.image, view.state.color_table, view.state.zoom_level, &args.output)?;
    if !manager.flush_writes(Duration::from_secs(30)) {
        warn!("derived files still being written at exit");
    }

    println!("Saved to {}", args.output.display());
    Ok(())
}
