use std::{path::Path, sync::Arc};

use anyhow::Context;
use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use readsync_offline::{
    ReadsyncResult,
    config::Config,
    connectivity::ConnectivityMonitor,
    local_api::{AppState, OfflineApi},
    remote_client::{RemoteAuthority, RemoteClient},
    storage::SqliteStore,
    sync::{SyncContext, SyncOutcome},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

#[tokio::main]
async fn main() -> ReadsyncResult<()> {
    // RUST_LOG wins; otherwise info for this crate and warn for chatty deps
    let default_filter = format!(
        "{}=info,poem=info,reqwest=warn,h2=warn,sea_orm=warn,sqlx=warn",
        env!("CARGO_CRATE_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting readsync offline companion"
    );

    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let store = SqliteStore::connect(&config.db_connection_string)
        .await
        .with_context(|| "Failed to open offline store")?;

    let remote = RemoteClient::new(&config.remote_base_url)?.with_api_key(&config.api_token);
    let has_api_key = !config.api_token.is_empty();
    tracing::info!(remote_base = %config.remote_base_url, has_api_key, "configured remote client");
    let remote: Arc<dyn RemoteAuthority> = Arc::new(remote);

    let online = match remote.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::info!(error = %e, "remote unreachable at startup, starting offline");
            false
        }
    };
    let monitor = ConnectivityMonitor::new(online);
    let ctx = SyncContext::new(Arc::new(store), remote.clone(), Arc::new(monitor.clone()));
    let state = AppState::new(ctx, monitor.clone(), config.progress_debounce);

    let _probe = monitor.spawn_probe(remote, config.connectivity_probe_interval);
    let _reconnect = state.spawn_reconnect_sync();

    if online {
        for user_id in state.users_to_sync().await {
            if let SyncOutcome::Completed(report) = state.engine.sync_all(&user_id).await {
                tracing::info!(%user_id, failed = report.failed, "startup reconciliation done");
            }
        }
    }

    run_poem(state, &config).await
}

pub async fn run_poem(state: AppState, config: &Config) -> ReadsyncResult<()> {
    let version = env!("CARGO_PKG_VERSION");
    let bind_addr = config.bind_addr.clone();
    let api_service = OpenApiService::new(OfflineApi::new(state), "Readsync Offline API", version)
        .server(format!("http://{}", bind_addr));
    let ui = api_service.rapidoc();
    let spec = api_service.spec();
    let route = Route::new()
        .nest("/", api_service)
        .nest("/ui", ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
        .with(Cors::new())
        .with(PoemTracing);

    tracing::info!(%bind_addr, "starting HTTP server");
    Server::new(TcpListener::bind(bind_addr)).run(route).await?;
    Ok(())
}
