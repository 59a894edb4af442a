//! retarget - Resilient element targeting for browser automation
//!
//! Main entry point for the CLI application.

use clap::{Parser, Subcommand};
use retarget::{cli::commands, Config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// retarget - Scan pages into element descriptors and replay action plans
#[derive(Parser, Debug)]
#[command(name = "retarget")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    /// Run in headed browser mode (visible window)
    #[arg(long, global = true)]
    headed: bool,

    /// agent-browser session name
    #[arg(long, global = true)]
    session: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a page and print its element descriptors
    Scan {
        /// Page to scan
        url: String,

        /// Write the scan JSON to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Save a screenshot after scanning
        #[arg(long)]
        screenshot: Option<PathBuf>,
    },

    /// Execute an action plan against a live page
    Run {
        /// Plan JSON file
        plan: PathBuf,

        /// Scan JSON the plan refers to
        #[arg(long)]
        scan: PathBuf,

        /// Open this URL instead of the scanned one
        #[arg(long)]
        url: Option<String>,
    },

    /// Show the effective configuration
    Config {
        /// Write the default config file
        #[arg(long)]
        init: bool,
    },
}

fn init_tracing(config: &Config) {
    let level = if config.agent.debug {
        "debug"
    } else {
        config.agent.log_level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("retarget={}", level))),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if args.debug {
        config.agent.debug = true;
    }

    if args.headed {
        config.browser.headed = true;
    }

    if let Some(ref session) = args.session {
        config.browser.session_name = session.clone();
    }

    init_tracing(&config);

    let output = match args.command {
        Commands::Scan {
            url,
            output,
            screenshot,
        } => commands::scan(&config, &url, output.as_deref(), screenshot.as_deref()).await?,
        Commands::Run { plan, scan, url } => {
            commands::run(&config, &plan, &scan, url.as_deref()).await?
        }
        Commands::Config { init } => commands::config(&config, init)?,
    };

    println!("{}", output);
    Ok(())
}
