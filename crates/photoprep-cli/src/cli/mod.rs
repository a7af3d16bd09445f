//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use photoprep_core::config;
use tracing_subscriber::{EnvFilter, fmt};

mod client;
mod commands;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "PHOTOPREP_LOG";

#[derive(Parser)]
#[command(name = "photoprep")]
#[command(version)]
#[command(about = "Upload product photos, process them remotely and download the results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Complete a browser login by passing the callback URL
    Login {
        /// URL the login page redirected to (contains `#session_id=...`)
        #[arg(value_name = "CALLBACK_URL")]
        callback: String,
    },
    /// End the session and forget the stored credential
    Logout,
    /// Show the logged-in user
    Whoami {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check the server and the stored credential
    Status,
    /// Upload, process and download images
    Process {
        /// Image files to process
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Directory for processed results (default: config download_dir, then ".")
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Only process; do not download results
        #[arg(long = "no-download")]
        no_download: bool,
    },
    /// List previously processed images
    History {
        /// Print the history as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an image from the server
    Delete {
        /// Server image id (see `photoprep history`)
        #[arg(value_name = "IMAGE_ID")]
        id: String,
    },
    /// Show or change the subscription plan
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Show account details and usage
    Profile {
        /// Print the profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum PlanCommands {
    /// List the configured plans
    List,
    /// Upgrade to a paid plan
    Upgrade {
        #[arg(value_name = "PLAN")]
        plan: String,
    },
    /// Return to the free plan
    Downgrade,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    // The core is single-threaded; one current-thread runtime drives it.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("create tokio runtime")?;

    rt.block_on(dispatch(cli))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Err(e) = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("tracing init failed: {e}");
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;

    match cli.command {
        Commands::Login { callback } => commands::auth::login(&config, &callback).await,
        Commands::Logout => commands::auth::logout(&config).await,
        Commands::Whoami { json } => commands::auth::whoami(&config, json).await,
        Commands::Status => commands::status::run(&config).await,
        Commands::Process {
            files,
            out,
            no_download,
        } => {
            commands::images::process(
                &config,
                &files,
                commands::images::DownloadOptions::new(out, no_download),
            )
            .await
        }
        Commands::History { json } => commands::images::history(&config, json).await,
        Commands::Delete { id } => commands::images::delete(&config, &id).await,
        Commands::Plan { command } => match command {
            PlanCommands::List => {
                commands::account::plans(&config);
                Ok(())
            }
            PlanCommands::Upgrade { plan } => commands::account::upgrade(&config, &plan).await,
            PlanCommands::Downgrade => commands::account::downgrade(&config).await,
        },
        Commands::Profile { json } => commands::account::profile(&config, json).await,
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
