//! Providers command - list mount providers and their capabilities.

use anyhow::Result;
use clap::Args as ClapArgs;
use comfy_table::{Cell, Color, Table};
use tracing::instrument;

use oxcrypt_mount::{ProviderInfo, ProviderRegistry};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Include providers that are not supported on this system
    #[arg(long)]
    pub all: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::providers", skip_all)]
pub fn execute(args: &Args, registry: &ProviderRegistry) -> Result<()> {
    let providers: Vec<ProviderInfo> = registry
        .provider_info()
        .into_iter()
        .filter(|p| args.all || p.supported)
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&providers)?);
        return Ok(());
    }

    if providers.is_empty() {
        eprintln!("No mount providers available on this system.");
        eprintln!("Use 'oxcrypt providers --all' to see every known provider.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Supported", "Features", "Description"]);
    for provider in &providers {
        let supported = if provider.supported {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&provider.id),
            Cell::new(&provider.name),
            supported,
            Cell::new(provider.features.to_string()),
            Cell::new(&provider.description),
        ]);
    }
    println!("{table}");
    Ok(())
}
