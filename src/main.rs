//! account-health - Customer health scoring with MCP support.

use account_health::auth::{AuthResolver, PrincipalDirectory, TransportAuth};
use account_health::config::Config;
use account_health::ledger::Ledger;
use account_health::mcp::McpServer;
use account_health::signals::build_fetcher;
use account_health::workflow::{HealthRequest, HealthWorkflow, Segment};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "account-health")]
#[command(about = "Role-gated customer health scoring with MCP support for AI assistants")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute account health once and print JSON
    Health {
        /// Account segment: all, inactive, highValue
        #[arg(short, long, default_value = "all")]
        segment: Segment,

        /// Comparison window length in days
        #[arg(short, long, default_value = "30")]
        window_days: u32,

        /// Maximum accounts to return
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Include reasons per account
        #[arg(short, long)]
        reasons: bool,

        /// Credential to use instead of the environment fallback
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Show the identity resolved for a credential
    Whoami {
        /// Credential to use instead of the environment fallback
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Run MCP server over stdio
    Mcp,

    /// Validate configuration
    Validate,

    /// Write an example configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    // Default locations
    let candidates = [
        dirs::config_dir().map(|p| p.join("account-health/config.toml")),
        Some(PathBuf::from("/etc/account-health/config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    // Return default even if it doesn't exist
    Config::default_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
}

fn init_tracing() {
    // stdout belongs to the MCP channel and JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config_path = get_config_path(cli.config);

    match cli.command {
        Commands::Health {
            segment,
            window_days,
            limit,
            reasons,
            token,
        } => {
            let config = Config::load_from(&config_path)?;
            let request = HealthRequest {
                segment,
                window_days,
                limit,
                include_reasons: reasons,
            };
            cmd_health(config, request, token).await?;
        }
        Commands::Whoami { token } => {
            let config = Config::load_from(&config_path)?;
            cmd_whoami(config, token)?;
        }
        Commands::Mcp => {
            let config = Config::load_from(&config_path)?;
            cmd_mcp(config).await?;
        }
        Commands::Validate => {
            let config = Config::load_from(&config_path)?;
            cmd_validate(config)?;
        }
        Commands::Init { force } => {
            cmd_init(&config_path, force)?;
        }
    }

    Ok(())
}

fn build_resolver(config: &Config) -> anyhow::Result<AuthResolver> {
    let directory = if config.identities.is_empty() {
        PrincipalDirectory::builtin()
    } else {
        PrincipalDirectory::from_identities(&config.identities)?
    };
    Ok(AuthResolver::from_env(directory, &config.auth.fallback_token_env))
}

fn build_workflow(config: &Config) -> anyhow::Result<HealthWorkflow> {
    let ledger = match &config.ledger.path {
        Some(path) => Ledger::load_from(path)?,
        None => Ledger::sample(chrono::Utc::now()),
    };
    let fetcher = build_fetcher(
        &config.sources,
        Duration::from_millis(config.scoring.fetch_timeout_ms),
    );
    Ok(HealthWorkflow::new(
        Arc::new(ledger),
        fetcher,
        config.scoring.safety_cap,
    ))
}

fn transport_for(token: Option<String>) -> Option<TransportAuth> {
    token.map(|token| TransportAuth {
        token,
        client_id: Some("cli".to_string()),
        ..Default::default()
    })
}

async fn cmd_health(
    config: Config,
    request: HealthRequest,
    token: Option<String>,
) -> anyhow::Result<()> {
    request.validate()?;

    let resolver = build_resolver(&config)?;
    let workflow = build_workflow(&config)?;

    let context = resolver.resolve(transport_for(token).as_ref());
    if !context.authenticated {
        eprintln!(
            "Warning: no valid credential (set {} or pass --token)",
            config.auth.fallback_token_env
        );
    }

    let report = workflow.compute_account_health(&context, &request).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn cmd_whoami(config: Config, token: Option<String>) -> anyhow::Result<()> {
    let resolver = build_resolver(&config)?;
    let context = resolver.resolve(transport_for(token).as_ref());

    match &context.principal {
        Some(principal) => {
            println!("{} ({})", principal.display_name, principal.id);
            println!("Role: {}", principal.role);
            let permissions: Vec<String> =
                principal.permissions.iter().map(|p| p.to_string()).collect();
            if permissions.is_empty() {
                println!("Permissions: (none)");
            } else {
                println!("Permissions: {}", permissions.join(", "));
            }
        }
        None => println!("Not authenticated"),
    }

    Ok(())
}

async fn cmd_mcp(config: Config) -> anyhow::Result<()> {
    let resolver = build_resolver(&config)?;
    let workflow = build_workflow(&config)?;
    let server = McpServer::new(resolver, workflow);
    server.run().await?;
    Ok(())
}

fn cmd_validate(config: Config) -> anyhow::Result<()> {
    println!("Validating configuration...\n");

    let mut all_valid = true;

    match build_resolver(&config) {
        Ok(resolver) => {
            println!("  Identities: {} registered", resolver.directory().len());
            for principal in resolver.directory().principals() {
                println!("    {} ({})", principal.id, principal.role);
            }
        }
        Err(e) => {
            println!("  Identities: FAILED - {}", e);
            all_valid = false;
        }
    }

    match build_workflow(&config) {
        Ok(workflow) => {
            let ledger = workflow.ledger();
            println!(
                "  Ledger: {} customers, {} orders",
                ledger.customers.len(),
                ledger.orders.len()
            );
        }
        Err(e) => {
            println!("  Ledger: FAILED - {}", e);
            all_valid = false;
        }
    }

    println!("  Satisfaction source: {}", config.sources.satisfaction.kind());
    println!("  Support source: {}", config.sources.support.kind());
    println!(
        "  Safety cap: {} accounts, fetch timeout: {}ms",
        config.scoring.safety_cap, config.scoring.fetch_timeout_ms
    );

    if config.scoring.safety_cap == 0 {
        println!("  Safety cap must be greater than zero");
        all_valid = false;
    }

    println!();

    if all_valid {
        println!("Configuration is valid.");
    } else {
        println!("Configuration has errors.");
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file {} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::example().save_to(path)?;
    println!("Wrote example configuration to {}", path.display());
    Ok(())
}
