//! Write the OpenAPI document of the user API
//!
//! Usage:
//!   cargo run --bin export_openapi > openapi.json
//!   cargo run --bin export_openapi -- --output docs/openapi.json

use anyhow::Context;
use clap::Parser;
use gophermart::gateway::openapi::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

#[derive(Parser)]
#[command(about = "Export the Gophermart OpenAPI document as JSON")]
struct Args {
    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("OpenAPI document exported to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
