use clap::{Parser, Subcommand};
use std::path::PathBuf;

use aria_config::{AriaConfig, ConfigLoader, WarningSeverity};
use aria_core::{AriaError, Result};

mod chat;
mod device;
mod serve;

/// Aria: a phone operator driven by an LLM
#[derive(Parser)]
#[command(name = "aria", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to aria.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the automation protocol server backed by ADB
    Serve {
        /// Listen address (overrides automation.listen)
        #[arg(long)]
        listen: Option<String>,
    },
    /// Run the HTTP chat API
    ServeApi {
        /// Listen address (overrides api.listen)
        #[arg(long)]
        listen: Option<String>,
    },
    /// Interactive chat in the terminal
    Chat {
        /// Session ID to use
        #[arg(short, long, default_value = "cli")]
        session: String,
    },
    /// Send one request and print the reply
    Ask {
        /// What to ask the phone operator
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Session ID to use
        #[arg(short, long, default_value = "cli")]
        session: String,
    },
    /// Ping a running automation server
    Ping,
    /// Print the current screen as seen by the automation server
    Screen {
        /// Dump raw elements as JSON
        #[arg(long)]
        json: bool,
    },
    /// List devices attached over ADB
    Devices,
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check the configuration for problems
    Doctor,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // --verbose > --quiet > --log-level > config; RUST_LOG beats all of them
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };
        init_tracing(log_level, &config.logging.format);

        match self.command {
            Commands::Serve { listen } => serve::cmd_serve(config, listen).await,
            Commands::ServeApi { listen } => serve::cmd_serve_api(config, listen).await,
            Commands::Chat { session } => chat::cmd_chat(config, session).await,
            Commands::Ask { text, session } => chat::cmd_ask(config, session, text.join(" ")).await,
            Commands::Ping => device::cmd_ping(config).await,
            Commands::Screen { json } => device::cmd_screen(config, json).await,
            Commands::Devices => device::cmd_devices(config).await,
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Doctor => Self::cmd_doctor(config),
        }
    }

    fn cmd_config(config: AriaConfig, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| AriaError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_doctor(config: AriaConfig) -> Result<()> {
        println!("Aria doctor: configuration audit");
        println!();

        let warnings = match config.validate() {
            Ok(w) => w,
            Err(e) => {
                println!("{e}");
                return Err(AriaError::Config("configuration has errors".into()));
            }
        };

        let warn_count = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Warning)
            .count();
        for w in &warnings {
            println!("  {w}");
        }

        if !warnings.is_empty() {
            println!();
        }
        println!("  {warn_count} warnings");
        Ok(())
    }
}

fn init_tracing(level: &str, format: &str) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
    };

    if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .json()
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(false)
            .init();
    }
}
