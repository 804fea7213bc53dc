use anyhow::Context;
use clap::{Parser, Subcommand};
use edubot::config;
use edubot::fallback::FallbackResponder;
use edubot::knowledge::SqliteKnowledgeStore;
use edubot::resolver::Resolver;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "edubot")]
#[command(about = "EduBot WhatsApp course assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: EDUBOT_CONFIG_PATH or ~/.edubot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the webhook gateway.
    Serve {
        /// Config file path (default: EDUBOT_CONFIG_PATH or ~/.edubot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default: PORT, then config, then 5000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Create the database schema and load the demo catalog, replacing existing rows.
    Seed {
        /// Config file path (default: EDUBOT_CONFIG_PATH or ~/.edubot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Resolve one message locally and print the reply (nothing is sent).
    Ask {
        /// Config file path (default: EDUBOT_CONFIG_PATH or ~/.edubot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Message text, as a student would send it.
        message: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: could not load .env: {}", e);
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("edubot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Seed { config }) => {
            if let Err(e) = run_seed(config).await {
                log::error!("seed failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask { config, message }) => {
            if let Err(e) = run_ask(config, &message).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    let dir = edubot::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = config::load_config(config_path)?;
    config.gateway.port = port.unwrap_or_else(|| config::resolve_port(&config));
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    edubot::gateway::run_gateway(config, path).await
}

async fn open_store(
    config: &config::Config,
    config_path: &std::path::Path,
) -> anyhow::Result<SqliteKnowledgeStore> {
    let url = config::resolve_database_url(config, config_path);
    let store = SqliteKnowledgeStore::connect(&url, config.database.max_connections)
        .await
        .with_context(|| format!("opening knowledge store {}", url))?;
    Ok(store)
}

async fn run_seed(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, path) = config::load_config(config_path)?;
    let store = open_store(&config, &path).await?;
    let (courses, faqs) = store
        .seed_demo_catalog()
        .await
        .context("seeding demo catalog")?;
    println!("seeded {} courses and {} faqs", courses, faqs);
    Ok(())
}

async fn run_ask(config_path: Option<PathBuf>, message: &str) -> anyhow::Result<()> {
    let (config, path) = config::load_config(config_path)?;
    let url = config::resolve_database_url(&config, &path);
    // An unreachable store still answers, with the store-unavailable reply.
    let store = SqliteKnowledgeStore::open(&url, config.database.max_connections)
        .await
        .with_context(|| format!("opening knowledge store {}", url))?;
    let resolver = Resolver::new(Arc::new(store), FallbackResponder::from_config(&config));
    let resolution = resolver.resolve(message).await;
    log::debug!("reply source: {:?}", resolution.source);
    println!("{}", resolution.reply);
    Ok(())
}
