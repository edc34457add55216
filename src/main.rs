//! servicegen CLI entrypoint
//! Parses command-line arguments and dispatches to the service manager.
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use servicegen::application::{self, RegistryBackend, ServiceManager};
use servicegen::core::Config;
use servicegen::entity::{EntityCatalog, EntityDefinition, FileEntityCatalog, TypeCatalog, load_entity_file};
use servicegen::registry::ServiceRecord;

#[derive(Parser)]
#[command(name = "servicegen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Keep the registry in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate, build and start a service from an entity document
    Generate {
        /// Entity document (JSON or YAML)
        entity_file: PathBuf,
    },
    /// Inspect and remove generated services
    Services {
        #[command(subcommand)]
        command: ServiceCommands,
    },
    /// Inspect entity documents
    Entities {
        #[command(subcommand)]
        command: EntityCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ServiceCommands {
    /// List all registered services
    List,
    /// Show one service
    Show { name: String },
    /// Services generated from an entity
    ByEntity { entity: String },
    /// Stop containers, delete files and unregister a service
    Remove {
        name: String,
        /// Leave the container image in place
        #[arg(long)]
        keep_image: bool,
    },
}

#[derive(clap::Subcommand, Debug)]
enum EntityCommands {
    /// List the entity documents in a directory
    List { dir: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    if let Commands::Entities {
        command: EntityCommands::List { dir },
    } = &cli.command
    {
        return list_entities(dir, cli.json).await;
    }

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let backend = if cli.ephemeral {
        RegistryBackend::Memory
    } else {
        RegistryBackend::Sqlite
    };
    let manager = application::build(config, backend)
        .await
        .context("Failed to initialize servicegen")?;

    let result = match cli.command {
        Commands::Generate { entity_file } => generate(&manager, &entity_file, cli.json).await,
        Commands::Services { command } => run_service_command(&manager, command, cli.json).await,
        Commands::Entities { .. } => Ok(()),
    };
    manager.shutdown().await;
    result
}

async fn generate(manager: &ServiceManager, entity_file: &Path, json: bool) -> anyhow::Result<()> {
    let entity = load_entity_file(entity_file, &TypeCatalog::builtin())
        .await
        .with_context(|| format!("Failed to load entity from {}", entity_file.display()))?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling generation");
            trigger.cancel();
        }
    });

    info!(entity = %entity.name, "Generating service");
    let record = manager.generate(entity, &cancel).await;
    print_record(&record, json)?;
    if !record.is_running() {
        anyhow::bail!("Generation of {} ended with status {}", record.name, record.status);
    }
    Ok(())
}

async fn run_service_command(
    manager: &ServiceManager,
    command: ServiceCommands,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        ServiceCommands::List => print_records(&manager.list(), json),
        ServiceCommands::Show { name } => {
            let record = manager
                .get(&name)
                .ok_or_else(|| servicegen::Error::service_not_found(&name))?;
            print_record(&record, json)
        }
        ServiceCommands::ByEntity { entity } => print_records(&manager.get_by_entity(&entity), json),
        ServiceCommands::Remove { name, keep_image } => {
            let report = manager
                .remove_with_report(&name, keep_image, &CancellationToken::new())
                .await;
            if !report.registered {
                return Err(servicegen::Error::service_not_found(&name).into());
            }
            for failure in &report.failures {
                warn!(service = %name, failure = %failure, "Cleanup incomplete");
            }
            println!("Removed {name}");
            Ok(())
        }
    }
}

async fn list_entities(dir: &Path, json: bool) -> anyhow::Result<()> {
    let catalog = FileEntityCatalog::new(dir, TypeCatalog::builtin());
    let entities = catalog
        .list()
        .await
        .with_context(|| format!("Failed to read entities from {}", dir.display()))?;
    if json {
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }
    for entity in &entities {
        println!("{}", describe_entity(entity));
    }
    Ok(())
}

fn describe_entity(entity: &EntityDefinition) -> String {
    let fields: Vec<String> = entity
        .fields
        .iter()
        .map(|f| format!("{}: {}", f.name, f.field_type.id))
        .collect();
    format!("{} ({}) [{}]", entity.name, entity.service_name(), fields.join(", "))
}

fn print_record(record: &ServiceRecord, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        println!("{}", summarize(record));
    }
    Ok(())
}

fn print_records(records: &[ServiceRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No services registered");
    }
    for record in records {
        println!("{}", summarize(record));
    }
    Ok(())
}

fn summarize(record: &ServiceRecord) -> String {
    format!(
        "{} v{} [{}] {} image={} db_port={}",
        record.name, record.version, record.status, record.url, record.image_tag, record.db_port
    )
}
