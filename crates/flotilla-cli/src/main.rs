//! Flotilla - MTA Descriptor Resolution
//!
//! Usage:
//!   flotilla resolve mtad.yaml --org dev-org --space dev    # Resolve a descriptor
//!   flotilla order mtad.yaml                                # Service processing layers
//!   flotilla actions --requested 2 --running 0 --requested-state stopped
//!   flotilla entries entries.json --org dev-org --space dev # Inspect a snapshot

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flotilla_core::commands::{
    ActionsCommand, ActionsOptions, ActionsReport, EntriesCommand, EntriesOptions, EntriesReport,
    OrderCommand, OrderOptions, OrderReport, ResolveCommand, ResolveOptions,
};
use flotilla_core::lifecycle::{
    ApplicationSnapshot, ApplicationStartupState, RequestedState, StartupIntent,
};
use flotilla_core::registry::CloudTarget;
use flotilla_core::resolve::ResolutionReport;

#[derive(Parser)]
#[command(name = "flotilla")]
#[command(about = "MTA descriptor resolution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a deployment descriptor against a registry snapshot
    Resolve {
        /// Path to the deployment descriptor YAML
        descriptor: PathBuf,

        /// Deployment target org
        #[arg(long)]
        org: String,

        /// Deployment target space
        #[arg(long)]
        space: String,

        /// Registry snapshot JSON with published entries
        #[arg(long)]
        entries: Option<PathBuf>,

        /// Space GUID recorded on subscriptions
        #[arg(long)]
        space_guid: Option<String>,

        /// Global configuration space, as "<org> <space>"
        #[arg(long)]
        global_target: Option<String>,

        /// Dependency name to leave unresolved (repeatable)
        #[arg(long = "ignore")]
        ignore: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Compute service processing layers for a descriptor
    Order {
        /// Path to the deployment descriptor YAML
        descriptor: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Calculate lifecycle actions for an application
    Actions {
        /// Requested instance count
        #[arg(long)]
        requested: u32,

        /// Running instance count
        #[arg(long)]
        running: u32,

        /// Platform-requested state (started or stopped)
        #[arg(long)]
        requested_state: String,

        /// Application runs one-off work to completion
        #[arg(long)]
        execute_only: bool,

        /// Deploy without starting
        #[arg(long)]
        no_start: bool,

        /// Explicit desired state, overriding intent flags
        #[arg(long)]
        desired: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Inspect configuration entries in a registry snapshot
    Entries {
        /// Path to the registry snapshot JSON
        snapshot: PathBuf,

        /// Consumer org
        #[arg(long)]
        org: String,

        /// Consumer space
        #[arg(long)]
        space: String,

        /// Narrow to one provider id
        #[arg(long)]
        provider: Option<String>,

        /// Version requirement applied with the provider filter
        #[arg(long)]
        version: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flotilla=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    run_cli(cli.command)
}

fn run_cli(command: Commands) -> Result<()> {
    match command {
        Commands::Resolve {
            descriptor,
            org,
            space,
            entries,
            space_guid,
            global_target,
            ignore,
            format,
        } => run_resolve(
            descriptor,
            org,
            space,
            entries,
            space_guid,
            global_target,
            ignore,
            format,
        ),
        Commands::Order { descriptor, format } => run_order(descriptor, format),
        Commands::Actions {
            requested,
            running,
            requested_state,
            execute_only,
            no_start,
            desired,
            format,
        } => run_actions(
            requested,
            running,
            &requested_state,
            execute_only,
            no_start,
            desired.as_deref(),
            format,
        ),
        Commands::Entries {
            snapshot,
            org,
            space,
            provider,
            version,
            format,
        } => run_entries(snapshot, org, space, provider, version, format),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_resolve(
    descriptor: PathBuf,
    org: String,
    space: String,
    entries: Option<PathBuf>,
    space_guid: Option<String>,
    global_target: Option<String>,
    ignore: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut options = ResolveOptions::new(descriptor, org, space).with_ignore(ignore);
    if let Some(path) = entries {
        options = options.with_entries(path);
    }
    if let Some(guid) = space_guid {
        options = options.with_space_guid(guid);
    }
    if let Some(target) = global_target {
        options = options.with_global_target(CloudTarget::parse_implicit(&target)?);
    }

    let report = ResolveCommand::new().run(&options)?;
    match format {
        OutputFormat::Table => print_resolution(&report)?,
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

fn run_order(descriptor: PathBuf, format: OutputFormat) -> Result<()> {
    let report = OrderCommand::new().run(&OrderOptions::new(descriptor))?;
    match format {
        OutputFormat::Table => print_layers(&report),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

fn run_actions(
    requested: u32,
    running: u32,
    requested_state: &str,
    execute_only: bool,
    no_start: bool,
    desired: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = ApplicationSnapshot {
        requested_instances: requested,
        running_instances: running,
        requested_state: parse_requested_state(requested_state)?,
    };
    let mut options = ActionsOptions::new(snapshot).with_intent(StartupIntent {
        execute_only,
        no_start,
    });
    if let Some(state) = desired {
        options = options.with_desired(parse_startup_state(state)?);
    }

    let report = ActionsCommand::new().run(&options)?;
    match format {
        OutputFormat::Table => print_actions(&report),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

fn run_entries(
    snapshot: PathBuf,
    org: String,
    space: String,
    provider: Option<String>,
    version: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut options = EntriesOptions::new(snapshot, org, space);
    if let Some(provider) = provider {
        options = options.with_provider(provider);
    }
    if let Some(version) = version {
        options = options.with_version(version);
    }

    let report = EntriesCommand::new().run(&options)?;
    match format {
        OutputFormat::Table => print_entries(&report),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

fn parse_requested_state(s: &str) -> Result<RequestedState> {
    match s.to_lowercase().as_str() {
        "started" => Ok(RequestedState::Started),
        "stopped" => Ok(RequestedState::Stopped),
        _ => anyhow::bail!("unknown requested state '{s}': use started or stopped"),
    }
}

fn parse_startup_state(s: &str) -> Result<ApplicationStartupState> {
    match s.to_uppercase().as_str() {
        "STARTED" => Ok(ApplicationStartupState::Started),
        "STOPPED" => Ok(ApplicationStartupState::Stopped),
        "EXECUTED" => Ok(ApplicationStartupState::Executed),
        "INCONSISTENT" => Ok(ApplicationStartupState::Inconsistent),
        _ => anyhow::bail!("unknown application state '{s}'"),
    }
}

fn print_resolution(report: &ResolutionReport) -> Result<()> {
    println!("MTA: {}", report.descriptor.id);
    if !report.resolved_entries.is_empty() {
        println!("Configuration references:");
        for (resource, ids) in &report.resolved_entries {
            let rendered: Vec<String> = ids.iter().map(i64::to_string).collect();
            println!("  {} -> entries [{}]", resource, rendered.join(", "));
        }
    }
    if !report.subscriptions.is_empty() {
        println!("Subscriptions:");
        for subscription in &report.subscriptions {
            println!(
                "  {} on {} ({})",
                subscription.owner.name(),
                subscription.resource_name,
                if subscription.active { "active" } else { "inactive" }
            );
        }
    }
    println!();
    print!("{}", serde_yaml::to_string(&report.descriptor)?);
    Ok(())
}

fn print_layers(report: &OrderReport) {
    if report.layers.is_empty() {
        println!("No service resources to order");
        return;
    }
    for (index, layer) in report.layers.iter().enumerate() {
        println!("Layer {}: {}", index + 1, layer.join(", "));
    }
}

fn print_actions(report: &ActionsReport) {
    println!("Current: {}", report.current);
    println!("Desired: {}", report.desired);
    if report.actions.is_empty() {
        println!("Actions: none");
    } else {
        let rendered: Vec<String> = report.actions.iter().map(ToString::to_string).collect();
        println!("Actions: {}", rendered.join(", "));
    }
}

fn print_entries(report: &EntriesReport) {
    if let Some(criteria) = &report.criteria {
        println!("Criteria: {}", criteria);
        println!();
    }
    if report.entries.is_empty() {
        println!("No matching entries");
        return;
    }
    println!(
        "{:<6} {:<30} {:<12} {:<20} {}",
        "ID", "PROVIDER", "VERSION", "TARGET", "STATE"
    );
    for entry in &report.entries {
        let version = entry
            .provider_version
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<30} {:<12} {:<20} {}",
            entry.id,
            entry.provider_id,
            version,
            entry.target_space.to_string(),
            if entry.active { "active" } else { "inactive" }
        );
    }
}

fn print_json<T: serde::Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
