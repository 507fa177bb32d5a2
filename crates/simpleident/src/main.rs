//! simpleident - Entry Point

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use simpleident::config::{AdminCredentials, Config, defaults};
use simpleident::server::IdentityServer;

#[derive(Parser, Debug)]
#[command(name = "simpleident")]
#[command(about = "Identity provider and OAuth 2.0 authorization server")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value_t = defaults::PORT, env = "PORT")]
    port: u16,

    /// Directory holding the JSON documents
    #[arg(long, default_value = defaults::DATA_DIR, env = "SIMPLEIDENT_DATA_DIR")]
    data_dir: PathBuf,

    /// Keep all records in memory
    #[arg(long, env = "SIMPLEIDENT_IN_MEMORY")]
    in_memory: bool,

    /// Admin API username (the admin API is disabled without credentials)
    #[arg(long, env = "SIMPLEIDENT_ADMIN_USER", requires = "admin_password")]
    admin_user: Option<String>,

    /// Admin API password
    #[arg(long, env = "SIMPLEIDENT_ADMIN_PASSWORD", requires = "admin_user")]
    admin_password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        let data_dir = if self.in_memory { None } else { Some(self.data_dir) };
        let admin = match (self.admin_user, self.admin_password) {
            (Some(username), Some(password)) => Some(AdminCredentials { username, password }),
            _ => None,
        };

        let mut config = Config::new(data_dir, admin);
        config.port = self.port;
        config
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        in_memory = cli.in_memory,
        "Starting simpleident"
    );

    let config = cli.into_config();
    if !config.has_admin() {
        tracing::warn!("No admin credentials configured, admin API disabled");
    }

    IdentityServer::new(config).await?.run_http().await
}
