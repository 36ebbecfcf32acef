//! `shardline`: sharding rule inspection and schema uniformity checks.
//!
//! # Usage
//!
//! ```text
//! shardline check -c deploy.toml                       # validate the rule, print topology
//! shardline nodes t_order -c deploy.toml               # list a table's data nodes
//! shardline verify t_order --schemas ./schemas         # load one logical table
//! shardline verify --all --schemas ./schemas --check   # check every table on every shard
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shardline_meta::{FileSchemaLoader, MetaDataError, ShardingMetaDataLoader};
use shardline_rule::ShardingRule;
use shardline_types::TableMetaData;
use tracing::{error, info};

use config::DeployConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "shardline",
    version,
    about = "Sharding rule inspection and schema uniformity checks"
)]
struct Cli {
    /// Path to the TOML deployment file.
    #[arg(
        short,
        long,
        global = true,
        env = "SHARDLINE_CONFIG",
        default_value = "shardline.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the sharding rule and print its topology.
    Check,

    /// Print the data nodes of one logical table, in index order.
    Nodes {
        /// Logical table name.
        table: String,
    },

    /// Load logical table metadata from schema snapshot files.
    Verify {
        /// Logical table name.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        table: Option<String>,

        /// Verify every table rule and broadcast table.
        #[arg(long)]
        all: bool,

        /// Directory holding `<data source>/<table>.toml` snapshots.
        #[arg(short, long)]
        schemas: PathBuf,

        /// Compare every shard instead of trusting the first one.
        #[arg(long)]
        check: bool,

        /// Override `max-connections-size-per-query`.
        #[arg(long)]
        max_connections: Option<usize>,

        /// Override the per-node load timeout in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = DeployConfig::load(&cli.config).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Check => cmd_check(&config),
        Commands::Nodes { table } => cmd_nodes(&config, &table),
        Commands::Verify {
            table,
            all: _,
            schemas,
            check,
            max_connections,
            timeout_ms,
        } => {
            // CLI args override config file values.
            if check {
                config.props.check_table_metadata_enabled = true;
            }
            if let Some(n) = max_connections {
                config.props.max_connections_size_per_query = n;
            }
            if let Some(ms) = timeout_ms {
                config.props.metadata_load_timeout_ms = ms;
            }
            cmd_verify(config, table.as_deref(), schemas).await
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// -----------------------------------------------------------------------
// shardline check
// -----------------------------------------------------------------------

fn cmd_check(config: &DeployConfig) -> Result<()> {
    let rule = config.build_rule()?;

    println!("Data sources: {}", rule.data_source_names().join(", "));
    println!("Tables: {}", rule.table_rules().len());
    for table_rule in rule.table_rules() {
        let key = table_rule
            .generate_key_column()
            .map(|column| format!(" key={column}"))
            .unwrap_or_default();
        println!(
            "  {} nodes={} data-sources={}{key}",
            table_rule.logic_table(),
            table_rule.actual_data_nodes().len(),
            table_rule.actual_data_source_names().join(","),
        );
    }

    println!("Binding groups: {}", rule.binding_table_rules().len());
    for group in rule.binding_table_rules() {
        println!("  {}", group.all_logic_tables().join(", "));
    }

    println!("Broadcast tables: {}", rule.broadcast_tables().len());
    for table in rule.broadcast_tables() {
        println!("  {table}");
    }

    info!(
        tables = rule.table_rules().len(),
        data_sources = rule.data_source_names().len(),
        "sharding rule is valid"
    );
    Ok(())
}

// -----------------------------------------------------------------------
// shardline nodes
// -----------------------------------------------------------------------

fn cmd_nodes(config: &DeployConfig, table: &str) -> Result<()> {
    let rule = config.build_rule()?;
    let table_rule = rule.get_table_rule(table)?;
    for (index, node) in table_rule.actual_data_nodes().iter().enumerate() {
        println!("{index}  {node}");
    }
    Ok(())
}

// -----------------------------------------------------------------------
// shardline verify
// -----------------------------------------------------------------------

async fn cmd_verify(config: DeployConfig, table: Option<&str>, schemas: PathBuf) -> Result<()> {
    let rule = config.build_rule()?;
    info!(
        schemas = %schemas.display(),
        database_type = %config.database_type,
        check = config.props.check_table_metadata_enabled,
        "verifying table metadata"
    );
    let loader = ShardingMetaDataLoader::new(
        Arc::new(FileSchemaLoader::new(schemas)),
        config.database_type,
        config.props,
    );

    let loaded = match table {
        Some(table) => verify_one(&loader, &rule, table).await,
        None => loader.load_all(&rule).await.map(|tables| {
            for table in tables.values() {
                print_table(table);
            }
        }),
    };
    if let Err(e) = loaded {
        report(&e);
        return Err(e.into());
    }
    Ok(())
}

async fn verify_one(
    loader: &ShardingMetaDataLoader,
    rule: &ShardingRule,
    table: &str,
) -> Result<(), MetaDataError> {
    match loader.load(rule, table).await? {
        Some(metadata) => print_table(&metadata),
        None => println!("{table}: not found on any data node"),
    }
    Ok(())
}

fn print_table(table: &TableMetaData) {
    println!("{}", table.name);
    for column in &table.columns {
        let mut flags = String::new();
        if column.primary_key {
            flags.push_str(" primary-key");
        }
        if column.generated {
            flags.push_str(" generated");
        }
        println!("  {} {}{flags}", column.name, column.data_type);
    }
    for index in &table.indexes {
        println!("  index {}", index.name);
    }
}

fn report(e: &MetaDataError) {
    match e {
        MetaDataError::Inconsistent {
            logic_table,
            reference,
            violations,
        } => {
            println!("{logic_table}: schema differs from {reference} on");
            for violation in violations {
                println!("  {}", violation.data_node);
            }
        }
        MetaDataError::MissingTables {
            logic_table,
            missing,
        } => {
            println!("{logic_table}: table missing on");
            for node in missing {
                println!("  {node}");
            }
        }
        _ => error!(%e, "metadata load failed"),
    }
}
