use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use keydash_core::api_key::{generate_key, CreateApiKey};
use keydash_llm::ChatService;
use keydash_service::{key_fingerprint, HttpService, KeyService, LocalService};
use tokio::net::TcpListener;
use tracing::info;

use keydash_server::config::ServerConfig;

#[derive(Parser)]
#[command(name = "keydash-server", about = "API key dashboard backend and chat proxy")]
struct Cli {
    #[command(flatten)]
    config: ServerConfig,

    /// Run key commands against a running server instead of the local database
    #[arg(long, env = "KEYDASH_SERVER_URL")]
    server_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and store a new API key
    Keygen {
        /// Human-readable name for the key
        #[arg(long)]
        name: Option<String>,
        /// Prefix for the generated key (defaults to --key-prefix)
        #[arg(long)]
        prefix: Option<String>,
    },
    /// List all API keys
    ListKeys,
    /// Revoke (delete) an API key by ID
    RevokeKey {
        /// The API key ID to revoke
        id: String,
    },
    /// Flip a key between active and inactive
    ToggleKey {
        /// The API key ID to toggle
        id: String,
    },
    /// Check a key the way the gated chat endpoint does
    ValidateKey {
        /// The raw key to check
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return serve(&cli.config).await;
    };

    let service: Arc<dyn KeyService> = match &cli.server_url {
        Some(url) => {
            let http = HttpService::new(url);
            http.health_check().await?;
            Arc::new(http)
        }
        None => {
            let db = keydash_db::open_database(&cli.config.db_config()).await?;
            Arc::new(LocalService::new(db).with_key_prefix(cli.config.key_prefix.as_str()))
        }
    };

    match command {
        Commands::Keygen { name, prefix } => {
            let prefix = prefix.unwrap_or_else(|| cli.config.key_prefix.clone());
            let input = CreateApiKey {
                name,
                key: Some(generate_key(&prefix)),
                status: None,
            };
            let api_key = service.create_key(&input).await?;
            eprintln!("Created API key (id: {})", api_key.id);
            eprintln!("  name: {}", api_key.name);
            // Print the raw key to stdout so it can be captured
            println!("{}", api_key.key);
        }
        Commands::ListKeys => {
            let keys = service.list_keys().await?;
            if keys.is_empty() {
                eprintln!("No API keys found.");
            } else {
                println!(
                    "{:<38} {:<24} {:<10} {:<14} {:<22} LAST USED",
                    "ID", "NAME", "STATUS", "FINGERPRINT", "CREATED"
                );
                for key in keys {
                    println!(
                        "{:<38} {:<24} {:<10} {:<14} {:<22} {}",
                        key.id,
                        key.name,
                        key.status.display_name(),
                        key_fingerprint(&key.key),
                        key.created_at.format("%Y-%m-%d %H:%M:%S"),
                        key.last_used
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                            .unwrap_or_else(|| "never".into()),
                    );
                }
            }
        }
        Commands::RevokeKey { id } => {
            service.delete_key(&id).await?;
            eprintln!("Revoked API key {id}");
        }
        Commands::ToggleKey { id } => {
            let key = service.get_key(&id).await?;
            service.toggle_key_status(&id, key.status).await?;
            eprintln!(
                "API key {id}: {} -> {}",
                key.status.display_name(),
                key.status.toggled().display_name()
            );
        }
        Commands::ValidateKey { key } => {
            let outcome = service.validate_key(&key).await;
            println!("{outcome}");
        }
    }

    Ok(())
}

async fn serve(config: &ServerConfig) -> Result<()> {
    let db = keydash_db::open_database(&config.db_config()).await?;
    let service = Arc::new(LocalService::new(db).with_key_prefix(config.key_prefix.as_str()));
    let chat = Arc::new(ChatService::from_env());
    info!(model = %chat.settings().model, "chat proxy configured");

    let addr = config.addr();
    let listener = TcpListener::bind(addr).await?;
    info!("keydash-server listening on http://{addr}");

    keydash_server::serve(listener, service, chat).await
}
