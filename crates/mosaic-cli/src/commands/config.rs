use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mosaic_core::pipeline::config::MosaicConfig;
use mosaic_core::render::RenderConfig;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the animation render config instead of the mosaic config
    #[arg(long)]
    pub movie: bool,
}

/// Print or save a full default config as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let toml_str = if args.movie {
        toml::to_string_pretty(&RenderConfig::default())?
    } else {
        let config = MosaicConfig {
            sources: vec!["ktwo210854069-c04_lpd-targ.stamp".to_string()],
            ..Default::default()
        };
        toml::to_string_pretty(&config)?
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
