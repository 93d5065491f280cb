use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use skyplot_core::io::FitsReader;

#[derive(Args)]
pub struct InfoArgs {
    /// Input FITS file (may be gzip compressed)
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let reader = FitsReader::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    println!("File:        {}", args.file.display());
    println!("HDUs:        {}", reader.hdus().len());
    for hdu in reader.hdus() {
        let kind = if hdu.is_image { "image" } else { "skipped" };
        println!(
            "  [{}] BITPIX {:>3}  axes {:?}  {}",
            hdu.index, hdu.bitpix, hdu.axes, kind
        );
    }

    let planes = reader.read_planes()?;
    println!("Planes:      {}", planes.len());
    for plane in &planes {
        let hist = plane.histogram();
        let cube = plane
            .cube_plane()
            .map(|c| format!(" slice {c}"))
            .unwrap_or_default();
        println!();
        println!("Plane {} (HDU {}{})", plane.index(), plane.hdu_index(), cube);
        println!("  Dimensions:  {}x{}", plane.width(), plane.height());
        println!("  Projection:  {}", plane.projection());
        if let Some(scale) = plane.pixel_scale_arcsec() {
            println!("  Pixel scale: {:.3}\"", scale);
        }
        println!("  Data range:  {:.6} .. {:.6}", hist.data_min(), hist.data_max());
        println!("  Good pixels: {}", hist.good_pixels());
        let size_mb = plane.byte_size() as f64 / (1024.0 * 1024.0);
        println!("  Memory:      {:.1} MB", size_mb);
    }

    Ok(())
}
