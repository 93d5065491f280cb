use std::path::{Path, PathBuf};

use console::Style;
use skyplot_core::color_table;
use skyplot_core::stretch::{BoundKind, RangeSpec, StretchAlgorithm};
use skyplot_core::transform::TransformOp;
use skyplot_core::zoom::ZoomPolicy;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub struct RenderSummary<'a> {
    pub inputs: &'a [PathBuf],
    pub output: &'a Path,
    pub range: &'a RangeSpec,
    pub ops: &'a [TransformOp],
    pub zoom: ZoomPolicy,
    pub color_table: u32,
    pub work_dir: &'a Path,
}

pub fn print_render_summary(summary: &RenderSummary<'_>) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Skyplot Render"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(14)));
    println!();

    if let [single] = summary.inputs {
        println!("  {:<14}{}", s.label.apply_to("Input"), s.path.apply_to(single.display()));
    } else {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Inputs"),
            s.value.apply_to(format!("{} files", summary.inputs.len()))
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(summary.output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Work dir"),
        s.path.apply_to(summary.work_dir.display())
    );
    println!();

    // Stretch
    let range = summary.range;
    println!("  {}", s.header.apply_to("Stretch"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Algorithm"),
        s.method.apply_to(range.algorithm)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Lower"),
        s.value.apply_to(bound_text(range.lower.kind, range.lower.value))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Upper"),
        s.value.apply_to(bound_text(range.upper.kind, range.upper.value))
    );
    match range.algorithm {
        StretchAlgorithm::Asinh => println!(
            "    {:<12}{}",
            s.label.apply_to("Q"),
            s.value.apply_to(range.asinh_q)
        ),
        StretchAlgorithm::PowerLawGamma => println!(
            "    {:<12}{}",
            s.label.apply_to("Gamma"),
            s.value.apply_to(range.gamma)
        ),
        _ => {}
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Colors"),
        s.value.apply_to(color_table::name(summary.color_table))
    );
    println!();

    // Geometry
    if summary.ops.is_empty() {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Geometry"),
            s.disabled.apply_to("none")
        );
    } else {
        println!("  {}", s.header.apply_to("Geometry"));
        for (i, op) in summary.ops.iter().enumerate() {
            println!("    {:<12}{}", s.label.apply_to(i + 1), s.method.apply_to(op));
        }
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Zoom"),
        s.value.apply_to(summary.zoom)
    );
    println!();
}

fn bound_text(kind: BoundKind, value: f64) -> String {
    match kind {
        BoundKind::Percentage => format!("{value}%"),
        BoundKind::Sigma => format!("{value} sigma"),
        BoundKind::Absolute => format!("{value}"),
        BoundKind::Zscale => "zscale".into(),
    }
}
