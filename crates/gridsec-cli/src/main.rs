//! Gridsec - directory-backed security for the data grid
//!
//! Loads a security configuration, authenticates one user and prints the
//! authorities the directory groups map to.

use clap::Parser;
use gridsec_auth::DirectorySecurityManager;
use gridsec_core::types::UserDetails;
use gridsec_core::{SecurityProperties, SPRING_SECURITY_CONFIG_LOCATION};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MASKED_PASSWORD: &str = "********";

#[derive(Parser)]
#[command(name = "gridsec")]
#[command(author = "Gridsec Team")]
#[command(version = gridsec_core::VERSION)]
#[command(about = "Authenticate a user against a Gridsec security configuration", long_about = None)]
struct Cli {
    /// Security configuration file (XML, TOML or JSON)
    config_location: String,

    /// User to authenticate
    username: String,

    /// Password of the user
    password: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GRIDSEC_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    let properties = security_properties(&cli);

    let manager = DirectorySecurityManager::new();
    manager.init(&properties)?;

    let result = manager
        .authenticate(&UserDetails::new(cli.username.as_str(), cli.password.as_str()))
        .await;
    manager.close();

    let authentication = result?;
    let user = authentication.user_details();
    let authorities = user
        .authorities()
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>();

    info!("Authenticated {} at {}", user.username(), authentication.authenticated_at());
    println!(
        "user: {} password: {} authorities: [{}]",
        user.username(),
        MASKED_PASSWORD,
        authorities.join(", ")
    );

    Ok(())
}

/// The positional location is the only source of the config location
fn security_properties(cli: &Cli) -> SecurityProperties {
    SecurityProperties::new().with(SPRING_SECURITY_CONFIG_LOCATION, cli.config_location.as_str())
}
