//! hive-rdbc - inspect and validate Hive JDBC source configurations
//!
//! # Usage
//!
//! ```bash
//! # Validate a source configuration (decodes the password, never prints it)
//! hive-rdbc -c hive.yaml validate
//!
//! # Show the bundled dialect
//! hive-rdbc dialect
//!
//! # Print the configuration JSON schema
//! hive-rdbc schema --format yaml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hive_rdbc::conf::{HiveJdbcConf, EXTERNAL_QUERY_SUPPORTED, HIVE_DRIVER, SOURCE_LABEL};
use hive_rdbc::dialect::{DialectDescriptor, SqlDialect};
use hive_rdbc::plugin::{NoCredentials, NoOptions, SourceConf};

#[derive(Parser)]
#[command(name = "hive-rdbc")]
#[command(version, about = "Hive JDBC source configuration tool")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "hive.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file and assemble the plugin configuration
    Validate,
    /// Show the bundled dialect definition
    Dialect,
    /// Show the configuration JSON schema
    Schema {
        /// Output format (json, yaml)
        #[arg(long, default_value = "json")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Validate => {
            let conf = HiveJdbcConf::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
            validate_config(&conf)
        }
        Commands::Dialect => show_dialect(),
        Commands::Schema { format } => show_schema(&format),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn validate_config(conf: &HiveJdbcConf) -> Result<()> {
    let plugin = conf
        .build_plugin_config(&NoCredentials, &NoOptions)
        .context("Source cannot be activated")?;
    info!(source = SOURCE_LABEL, "configuration valid");

    println!("✓ Configuration valid!\n");
    println!("Source: {} ({})", SOURCE_LABEL, conf.source_type());
    println!(
        "  Connection string: {}",
        conf.connection_string.as_deref().unwrap_or_default()
    );
    println!("  Username: {}", conf.username.as_deref().unwrap_or_default());
    println!("  Password: [REDACTED]");
    println!("  Driver: {}", HIVE_DRIVER);
    println!("  Fetch size: {}", plugin.fetch_size());
    println!("  Max idle connections: {}", conf.max_idle_connections);
    println!("  Idle timeout: {}s", conf.idle_timeout_seconds);
    println!("  Dialect: {}", plugin.dialect().name());
    Ok(())
}

fn show_dialect() -> Result<()> {
    let dialect = hive_rdbc::conf::hive_dialect().context("Failed to load dialect")?;
    print_dialect(&dialect);
    Ok(())
}

fn print_dialect(dialect: &DialectDescriptor) {
    println!("Dialect: {} ({})", dialect.name(), dialect.metadata.apiname);
    println!("  Identifier quote: {}", dialect.syntax.identifier_quote);
    println!("  Catalogs: {}", enabled(dialect.supports_catalogs()));
    println!("  Schemas: {}", enabled(dialect.supports_schemas()));
    println!("  External queries: {}", enabled(EXTERNAL_QUERY_SUPPORTED));
    println!(
        "  LIMIT pushdown: {}",
        dialect
            .limit_offset_sql(Some(10), None)
            .unwrap_or_else(|| "disabled".to_string())
    );
    println!();

    println!("Type mappings:");
    for mapping in &dialect.data_types.mappings {
        println!("  {:<12} -> {}", mapping.source.name, mapping.engine.name);
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

fn show_schema(format: &str) -> Result<()> {
    use schemars::schema_for;

    let schema = serde_json::to_value(schema_for!(HiveJdbcConf))?;
    match format {
        "yaml" => println!("{}", serde_yaml::to_string(&schema)?),
        _ => println!("{}", serde_json::to_string_pretty(&schema)?),
    }
    Ok(())
}
