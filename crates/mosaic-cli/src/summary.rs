use std::path::Path;

use console::Style;
use mosaic_core::pipeline::config::MosaicConfig;
use mosaic_core::pipeline::{MosaicPipeline, MosaicRunSummary};
use mosaic_core::render::{FrameSequence, RenderConfig};

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

fn title(s: &Styles, text: &str) {
    println!();
    println!("  {}", s.title.apply_to(text));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(text.chars().count())));
    println!();
}

pub fn print_mosaic_summary(config: &MosaicConfig) {
    let s = Styles::new();
    title(&s, "Stamp Mosaic");

    println!(
        "  {:<14}{}",
        s.label.apply_to("Stamps"),
        s.value.apply_to(config.sources.len())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output.dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Prefix"),
        s.value.apply_to(&config.output.prefix)
    );
    println!();

    println!("  {}", s.header.apply_to("Time Steps"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Request"),
        s.method.apply_to(config.time_steps)
    );
    if config.step > 1 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Every"),
            s.value.apply_to(config.step)
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Compositing"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Detector"),
        s.value.apply_to(format!("{}x{}", config.detector.width, config.detector.height))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Overlap"),
        s.method.apply_to(config.overlap)
    );
    let workers = match config.workers {
        0 => "all cores".to_string(),
        1 => "sequential".to_string(),
        n => format!("{n} threads"),
    };
    println!(
        "    {:<12}{}",
        s.label.apply_to("Workers"),
        s.value.apply_to(workers)
    );
    println!();

    println!("  {}", s.header.apply_to("Lookup"));
    for (label, dir) in [
        ("Local", &config.lookup.local_override),
        ("Mirror", &config.lookup.mirror),
    ] {
        match dir {
            Some(d) => println!(
                "    {:<12}{}",
                s.label.apply_to(label),
                s.path.apply_to(d.display())
            ),
            None => println!(
                "    {:<12}{}",
                s.label.apply_to(label),
                s.disabled.apply_to("none")
            ),
        }
    }
    println!();
}

pub fn print_run_summary(pipeline: &MosaicPipeline, summary: &MosaicRunSummary) {
    let s = Styles::new();
    println!();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Detector"),
        s.value.apply_to(pipeline.detector_id())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Written"),
        s.value.apply_to(format!("{} rasters", summary.len()))
    );
    if let (Some(first), Some(last)) = (summary.written.first(), summary.written.last()) {
        println!(
            "  {:<14}{}",
            s.label.apply_to("First"),
            s.path.apply_to(first.1.display())
        );
        if summary.len() > 1 {
            println!(
                "  {:<14}{}",
                s.label.apply_to("Last"),
                s.path.apply_to(last.1.display())
            );
        }
    }
}

pub fn print_movie_summary(sequence: &FrameSequence, config: &RenderConfig, output: &Path) {
    let s = Styles::new();
    title(&s, "Mosaic Animation");

    println!(
        "  {:<14}{}",
        s.label.apply_to("Detector"),
        s.value.apply_to(sequence.detector_id())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(sequence.len())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!();

    println!("  {}", s.header.apply_to("Stretch"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Scale"),
        s.method.apply_to(config.stretch.scale)
    );
    match config.stretch.fixed_cuts() {
        Some((lo, hi)) => println!(
            "    {:<12}{}",
            s.label.apply_to("Cuts"),
            s.value.apply_to(format!("{lo}..{hi}"))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Cuts"),
            s.disabled.apply_to(format!(
                "auto ({}% / {}%)",
                config.stretch.low_percentile, config.stretch.high_percentile
            ))
        ),
    }
    println!();

    println!("  {}", s.header.apply_to("Layout"));
    for (label, range) in [("Rows", config.rows), ("Columns", config.cols)] {
        match range {
            Some(r) => println!("    {:<12}{}", s.label.apply_to(label), s.value.apply_to(r)),
            None => println!(
                "    {:<12}{}",
                s.label.apply_to(label),
                s.disabled.apply_to("fit to data")
            ),
        }
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Zoom"),
        s.value.apply_to(format!("{}x", config.zoom))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("FPS"),
        s.value.apply_to(config.fps)
    );
    println!();
}
