//! MTA CLI - Command-line interface for descriptor binding
//!
//! - `bind`: resolve a descriptor against a snapshot of published
//!   configuration entries and print it with its subscriptions
//! - `publish`: bind a descriptor, then print the entries it publishes in
//!   the snapshot format `bind` reads

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mta_binding::{
    Binder, BinderConfig, ConfigurationEntryRegistry, InMemoryConfigurationRegistry,
    InMemorySubscriptionStore,
};
use mta_model::{ConfigurationEntry, DeploymentDescriptor, DescriptorParser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod output;

use output::OutputFormat;

/// MTA binding CLI
#[derive(Parser)]
#[command(name = "mta-bind")]
#[command(about = "Resolve MTA descriptors against published configuration", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MTA_BIND_CONFIG")]
    config: Option<String>,

    /// Organization of the deployment target
    #[arg(long)]
    org: Option<String>,

    /// Space of the deployment target
    #[arg(long)]
    space: Option<String>,

    /// Output format (json, yaml)
    #[arg(short, long, default_value = "json")]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Resolve a descriptor and bind its configuration resources
    Bind {
        /// Descriptor file (YAML, or JSON with a .json extension)
        descriptor: PathBuf,

        /// JSON list of published configuration entries
        #[arg(short, long)]
        registry: Option<PathBuf>,
    },

    /// Bind a descriptor and print the configuration entries it publishes
    Publish {
        /// Descriptor file (YAML, or JSON with a .json extension)
        descriptor: PathBuf,

        /// JSON list of published configuration entries
        #[arg(short, long)]
        registry: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for results
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config =
        BinderConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(org) = cli.org {
        config.target.org = org;
    }
    if let Some(space) = cli.space {
        config.target.space = space;
    }
    tracing::debug!(?config, "Loaded configuration");

    let registry = Arc::new(InMemoryConfigurationRegistry::new());
    let binder = Binder::new(
        config,
        registry.clone(),
        Arc::new(InMemorySubscriptionStore::default()),
    );

    match cli.command {
        Commands::Bind {
            descriptor,
            registry: snapshot,
        } => {
            load_snapshot(&registry, snapshot.as_deref()).await?;
            let outcome = binder.bind(&read_descriptor(&descriptor)?).await?;
            output::print(&outcome, cli.output)
        }
        Commands::Publish {
            descriptor,
            registry: snapshot,
        } => {
            load_snapshot(&registry, snapshot.as_deref()).await?;
            let outcome = binder.bind(&read_descriptor(&descriptor)?).await?;
            let entries = binder.publish(&outcome.descriptor).await?;
            output::print(&entries, cli.output)
        }
    }
}

async fn load_snapshot(registry: &InMemoryConfigurationRegistry, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let entries: Vec<ConfigurationEntry> = serde_json::from_str(&text)
        .with_context(|| format!("invalid registry snapshot {}", path.display()))?;
    for entry in entries {
        registry.save(entry).await?;
    }
    Ok(())
}

fn read_descriptor(path: &Path) -> Result<DeploymentDescriptor> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => DescriptorParser::from_json_str(&text),
        _ => DescriptorParser::from_yaml_str(&text),
    };
    parsed.with_context(|| format!("invalid descriptor {}", path.display()))
}
