use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use tenantry_core::{Principal, TenantryConfig};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "tenantry", version, about = "Tenant scoping for SQL queries")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show how a query is rewritten for a tenant.
    Explain {
        /// Configuration file (tenantry.yaml). Built-in defaults when omitted.
        #[arg(long, short = 'c', env = "TENANTRY_CONFIG")]
        config: Option<PathBuf>,

        /// Run as an ordinary user of this tenant. Without --tenant or
        /// --admin the context is unresolved and scoped tables are refused.
        #[arg(long, conflicts_with = "admin")]
        tenant: Option<i64>,

        /// Run as an administrator (no tenant scoping).
        #[arg(long, default_value_t = false)]
        admin: bool,

        /// Print the result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// A single-table SELECT * or DELETE statement.
        sql: String,
    },

    /// Validate a configuration file.
    Check {
        /// Configuration file (tenantry.yaml).
        #[arg(long, short = 'c', env = "TENANTRY_CONFIG", default_value = "tenantry.yaml")]
        config: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TenantryConfig> {
    match path {
        Some(path) => TenantryConfig::load_with_context(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(TenantryConfig::default()),
    }
}

fn init_logging(config: &TenantryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Explain {
            config,
            tenant,
            admin,
            json,
            sql,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(&config);

            let actor = match (admin, tenant) {
                (true, _) => Some(Principal::administrator("cli")),
                (false, Some(tenant_id)) => Some(Principal::user("cli", tenant_id)),
                (false, None) => None,
            };
            commands::explain::run(&config, actor.as_ref(), &sql, json)?;
        }
        Command::Check { config } => {
            init_logging(&TenantryConfig::default());
            commands::check::run(&config)?;
        }
    }

    Ok(())
}
