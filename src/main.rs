use clap::{Parser, Subcommand};
use shopdesk::config::Config;
use shopdesk_core::{LocalMirror, ShopStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ConfigCommand, EntryCommand, OutputFormat, ShopRef};

#[derive(Parser)]
#[command(name = "shopdesk")]
#[command(version)]
#[command(about = "Edit shop documents on remote hosts, with backups", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured servers
    Servers,

    /// List configured currencies
    Currencies,

    /// List shops on a server
    Shops {
        /// Server ID
        server: String,
    },

    /// Show a shop document
    Show(ShopRef),

    /// Show the slot grid of one page
    Grid {
        #[command(flatten)]
        target: ShopRef,

        /// Page number
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Mark entries whose id or item contains this text
        #[arg(long)]
        filter: Option<String>,
    },

    /// Create a shop from the template
    Create {
        #[command(flatten)]
        target: ShopRef,

        /// Shop title
        #[arg(long)]
        title: Option<String>,
    },

    /// Delete a shop (a backup is kept)
    Delete {
        #[command(flatten)]
        target: ShopRef,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// List backups of a shop, newest first
    Backups(ShopRef),

    /// Restore a shop from a backup
    Restore {
        #[command(flatten)]
        target: ShopRef,

        /// Backup file name (default: newest)
        #[arg(long)]
        backup: Option<String>,
    },

    /// Edit entries of a shop
    Entry(EntryCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;
    let store = ShopStore::new(
        Arc::new(config.catalog()),
        Arc::new(LocalMirror::new(config.mirror_root.value.clone())),
        config.credentials(),
    );
    let format = cli.format;

    match cli.command {
        Some(Commands::Servers) => commands::list_servers(&store, format)?,
        Some(Commands::Currencies) => commands::list_currencies(&store, format)?,
        Some(Commands::Shops { server }) => commands::list_shops(&store, &server, format).await?,
        Some(Commands::Show(target)) => commands::show_shop(&store, &target, format).await?,
        Some(Commands::Grid {
            target,
            page,
            filter,
        }) => commands::show_grid(&store, &target, page, filter.as_deref(), format).await?,
        Some(Commands::Create { target, title }) => {
            commands::create_shop(&store, &target, title.as_deref(), format).await?
        }
        Some(Commands::Delete { target, force }) => {
            commands::delete_shop(&store, &target, force, format).await?
        }
        Some(Commands::Backups(target)) => commands::list_backups(&store, &target, format).await?,
        Some(Commands::Restore { target, backup }) => {
            commands::restore(&store, &target, backup.as_deref(), format).await?
        }
        Some(Commands::Entry(cmd)) => cmd.run(&store, format).await?,
        Some(Commands::Config(cmd)) => cmd.run(&config, format)?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
