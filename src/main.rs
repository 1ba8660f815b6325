// Copyright 2026 The Ragrelay Project
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use ragrelay::config::{self, Environment};
use ragrelay::server;
use ragrelay::session::{InMemorySessionStore, SessionStore};
use ragrelay::upstream::{RagflowClient, UpstreamApi};

use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ragrelay", about = "Streaming chat relay for an agent-based RAG provider")]
struct Cli {
    /// Run mode: dev, test, or prod
    #[arg(long, default_value = "dev", env = "RAGRELAY_ENV")]
    env: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8778, env = "RAGRELAY_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let environment: Environment = match cli.env.parse() {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("invalid run mode: {e}");
            std::process::exit(1);
        }
    };

    let config = match config::load_config(environment) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        environment = %config.environment,
        upstream = %config.upstream.base_url(),
        lang = %config.lang,
        "config loaded"
    );

    let upstream: Arc<dyn UpstreamApi> = Arc::new(RagflowClient::new(
        reqwest::Client::new(),
        config.upstream.base_url(),
        config.upstream.agent_id.clone(),
        config.upstream.api_key.clone(),
    ));
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());

    let state = server::AppState::new(config, upstream, store);
    let app = server::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind to address");

    tracing::info!(%addr, "ragrelay listening");

    axum::serve(listener, app)
        .await
        .expect("server error");
}
