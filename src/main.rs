use clap::{Parser, Subcommand};
use dotenv::dotenv;
use env_logger::Env;
use log::{info, error};
use std::process;

use user_auth_handlers::cli::{self, HandlerName};
use user_auth_handlers::config;

/// User auth handlers - register, log in and list users from the command line
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Sets the configuration file
    #[clap(short, long, value_name = "FILE", default_value = "config.toml")]
    config: String,

    /// Turn debugging information on
    #[clap(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the user datastore
    Init {},

    /// Run a handler on a request envelope and print the response envelope
    Invoke {
        /// Handler to run
        #[clap(value_enum)]
        handler: HandlerName,

        /// File holding the request envelope (stdin when omitted)
        #[clap(short, long, value_name = "FILE")]
        event: Option<String>,
    },

    /// Validate a token and print its claims
    VerifyToken {
        /// Token returned by a successful login
        token: String,
    },
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logger, verbosity from the debug flag
    let default_level = match cli.debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let config = match config::load_config(&cli.config) {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config::apply_env_overrides(config)
        }
        Err(err) => {
            error!("Failed to load configuration: {}", err);
            process::exit(1);
        }
    };

    let result = match &cli.command {
        Commands::Init {} => cli::init_datastore(&config),
        Commands::Invoke { handler, event } => run_handler(&config, *handler, event.as_deref()).await,
        Commands::VerifyToken { token } => cli::verify_token(&config, token).and_then(|claims| {
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(())
        }),
    };

    if let Err(err) = result {
        error!("{:#}", err);
        process::exit(1);
    }
}

async fn run_handler(config: &config::Config, handler: HandlerName, event: Option<&str>) -> anyhow::Result<()> {
    let controller = cli::build_controller(config)?;
    let request = cli::read_event(event)?;

    let response = cli::invoke(&controller, handler, &request).await;
    println!("{}", serde_json::to_string(&response)?);

    Ok(())
}
