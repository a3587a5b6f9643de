use clap::Parser;
use reqwest::Client;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{error, info};

mod background;
mod commands;
mod constants;
mod error;
mod gateway;
mod helpers;
mod memory;
mod state;
mod stats;
mod traits;

use memory::{MemoryConfig, MemoryStore};
use state::{Config, Metrics, State};
use traits::{DiscordHttpApi, LlmHttpClient};

#[derive(Parser)]
#[command(name = "parley", about = "Discord LLM relay bot")]
struct Args {
    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN")]
    token: String,

    /// Discord application id (interaction edits and command deployment)
    #[arg(long, env = "APPLICATION_ID")]
    application_id: String,

    /// Discord REST API base URL
    #[arg(long, default_value = "https://discord.com/api/v10", env = "PARLEY_API_URL")]
    api_url: String,

    /// LLM completion API base URL
    #[arg(long, default_value = "https://api.zpi.my.id/v1/ai", env = "PARLEY_LLM_URL")]
    llm_url: String,

    /// Default LLM model for mentions and /ask without an explicit choice
    #[arg(long, default_value = "copilot", env = "PARLEY_MODEL")]
    model: String,

    /// Max messages remembered per channel (1-100; invalid values fall back)
    #[arg(long, env = "MEMORY_LIMIT")]
    memory_limit: Option<String>,

    /// Hours of channel inactivity before memory is purged (1-168)
    #[arg(long, env = "MEMORY_CLEANUP_INTERVAL_HOURS")]
    cleanup_interval_hours: Option<String>,

    /// Character budget for the context block prepended to prompts
    #[arg(long, default_value_t = constants::DEFAULT_CONTEXT_CHARS, env = "PARLEY_CONTEXT_CHARS")]
    context_chars: usize,

    /// Serve /healthz and stats JSON on this local port
    #[arg(long, env = "PARLEY_STATS_PORT")]
    stats_port: Option<u16>,

    /// Register the global slash commands and exit
    #[arg(long)]
    deploy_commands: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let memory_config = MemoryConfig::resolve(
        args.memory_limit.as_deref(),
        args.cleanup_interval_hours.as_deref(),
    );

    let http = Client::new();
    let state = Arc::new(State {
        config: Config {
            token: args.token.clone(),
            api_url: args.api_url.clone(),
            default_model: args.model,
            max_context_chars: args.context_chars,
        },
        metrics: Metrics {
            start_time: Instant::now(),
            message_count: AtomicU64::new(0),
            llm_error_count: AtomicU64::new(0),
        },
        memory: MemoryStore::new(memory_config),
        bot_user: RwLock::new(None),
        discord: Box::new(DiscordHttpApi {
            http: http.clone(),
            api_url: args.api_url,
            token: args.token,
            application_id: args.application_id,
        }),
        llm: Box::new(LlmHttpClient {
            http: http.clone(),
            base_url: args.llm_url,
        }),
    });

    if args.deploy_commands {
        commands::deploy_commands(&state).await;
        return;
    }

    info!("parley starting");
    background::spawn_shutdown_handler();
    background::spawn_memory_sweeper(&state.memory);

    if let Some(port) = args.stats_port {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind stats port");
        tokio::spawn(stats::run_stats_server(listener, Arc::clone(&state)));
    }

    let mut backoff = 1u64;
    loop {
        match gateway::connect_and_listen(&state, &http).await {
            Ok(()) => {
                info!("Gateway closed cleanly, reconnecting...");
                backoff = 1;
            }
            Err(e) => {
                error!("Gateway error: {e}, reconnecting in {backoff}s...");
            }
        }
        tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
        backoff = (backoff * 2).min(60);
    }
}
