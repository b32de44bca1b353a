use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wiki_oauth_login::store::{AccountStore, MemoryAccountStore, SqliteAccountStore};
use wiki_oauth_login::{ClientConfig, LoginServer, LoginService, ServerConfig};

#[derive(Debug, Parser)]
#[command(
    name = "wiki-oauth-login",
    about = "Log in to the wiki through an OAuth 2.0 identity provider. Provider settings are read from WIKI_OAUTH2_* variables."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the login endpoints.
    Serve {
        #[arg(long, env = "WIKI_OAUTH2_BIND", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// SQLite URL for accounts and links; accounts are kept in memory when unset.
        #[arg(long, env = "WIKI_OAUTH2_DATABASE_URL")]
        database_url: Option<String>,

        #[arg(long, env = "WIKI_OAUTH2_BASE_PATH", default_value = "/oauth2")]
        base_path: String,

        /// Send the session cookie over plain HTTP too.
        #[arg(long)]
        insecure_cookie: bool,
    },
    /// Print an authorization URL for the configured provider and exit.
    AuthorizeUrl,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;

    match cli.command {
        Command::Serve {
            bind,
            database_url,
            base_path,
            insecure_cookie,
        } => {
            let store: Arc<dyn AccountStore> = match database_url {
                Some(url) => Arc::new(SqliteAccountStore::connect(&url).await?),
                None => {
                    tracing::warn!("no database configured, accounts will not survive a restart");
                    Arc::new(MemoryAccountStore::new())
                }
            };
            let service = LoginService::new(&config, store)?;
            let server_config = ServerConfig::new(bind)
                .with_base_path(base_path)
                .with_secure_cookie(!insecure_cookie);

            LoginServer::new(service, server_config).serve().await?;
        }
        Command::AuthorizeUrl => {
            let service = LoginService::new(&config, Arc::new(MemoryAccountStore::new()))?;
            let start = service.begin(None).await?;
            println!("{}", start.authorization_url);
        }
    }

    Ok(())
}
