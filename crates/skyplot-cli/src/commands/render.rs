use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use skyplot_core::writer::base_name;
use skyplot_core::zoom::ZoomPolicy;
use skyplot_core::{PlotContextManager, PlotRequest};
use tracing::{debug, warn};

use super::{load_config, save_png, GeometryArgs, RangeArgs};
use crate::summary::{print_render_summary, RenderSummary};

#[derive(Args)]
pub struct RenderArgs {
    /// Input FITS files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Image plane to render from each file
    #[arg(long, default_value = "0")]
    pub plane: usize,

    #[command(flatten)]
    pub range: RangeArgs,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    /// Zoom level
    #[arg(long, conflicts_with = "width")]
    pub zoom: Option<f32>,

    /// Scale output to this width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Color table id (0 gray, 1 reverse, 2 heat, 3 cool, 4 rainbow)
    #[arg(long, default_value = "0")]
    pub color_table: u32,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

pub fn run(args: &RenderArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let range = args.range.to_range(&config.default_range);
    let ops = args.geometry.ops();
    let zoom = match (args.zoom, args.width) {
        (_, Some(w)) => ZoomPolicy::ToWidth(w),
        (Some(z), None) => ZoomPolicy::Explicit(z),
        (None, None) => ZoomPolicy::default(),
    };

    print_render_summary(&RenderSummary {
        inputs: &args.files,
        output: &args.output,
        range: &range,
        ops: &ops,
        zoom,
        color_table: args.color_table,
        work_dir: &config.work_dir,
    });

    let manager = PlotContextManager::from_config(config).context("Failed to start engine")?;

    let pb = ProgressBar::new(args.files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Rendering [{bar:40}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let outputs = output_paths(&args.files, &args.output);
    let results: Vec<(PathBuf, Result<PathBuf>)> = args
        .files
        .par_iter()
        .zip(outputs.par_iter())
        .map(|(file, out)| {
            let mut request = PlotRequest::new(file)
                .with_plane(args.plane)
                .with_range(range.clone())
                .with_zoom(zoom)
                .with_color_table(args.color_table);
            for op in &ops {
                request = request.with_op(op.clone());
            }
            let result = render_one(&manager, request, out);
            pb.inc(1);
            (file.clone(), result)
        })
        .collect();
    pb.finish_with_message("Done");

    if !manager.flush_writes(Duration::from_secs(30)) {
        warn!("derived files still being written at exit");
        eprintln!("Warning: some derived files were still being written");
    }

    let mut failed = 0;
    for (file, result) in &results {
        match result {
            Ok(out) => println!("{} -> {}", file.display(), out.display()),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e:#}", file.display());
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed", results.len());
    }
    Ok(())
}

/// One PNG per input, named after the file. Inputs sharing a name get a
/// numeric suffix in command-line order.
fn output_paths(files: &[PathBuf], out_dir: &Path) -> Vec<PathBuf> {
    let stems: Vec<String> = files.iter().map(|f| base_name(f)).collect();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    stems
        .iter()
        .map(|stem| {
            let shared = stems.iter().filter(|s| *s == stem).count() > 1;
            let n = seen.entry(stem.as_str()).or_insert(0);
            *n += 1;
            if shared {
                out_dir.join(format!("{stem}-{n}.png"))
            } else {
                out_dir.join(format!("{stem}.png"))
            }
        })
        .collect()
}

fn render_one(manager: &PlotContextManager, request: PlotRequest, out: &Path) -> Result<PathBuf> {
    let view = manager
        .create_plot(request)
        .with_context(|| "Failed to create plot")?;
    save_png(&view.image, view.state.color_table, view.state.zoom_level, out)?;
    debug!(
        file = %out.display(),
        width = view.image.width,
        height = view.image.height,
        "preview saved"
    );
    manager.delete_plot(&view.state.context_key);
    Ok(out.to_path_buf())
}
