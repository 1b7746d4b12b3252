//! CLI entry point for rfx-bindgen.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// rfx-bindgen — generate Rust bindings from C headers.
#[derive(Parser, Debug)]
#[command(name = "rfx-bindgen", version, about)]
struct Cli {
    /// Path to the rfx-bindgen.toml configuration file.
    #[arg(default_value = "rfx-bindgen.toml")]
    config: PathBuf,

    /// Output file path (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rfx_bindgen=info")),
        )
        .init();

    let cli = Cli::parse();
    rfx_bindgen::run(&cli.config, cli.output.as_deref())?;
    Ok(())
}
