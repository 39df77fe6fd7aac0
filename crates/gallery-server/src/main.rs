mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use gallery_api::{AppStateInner, TokenIssuer, reconcile};
use gallery_blob::{BlobStore, HttpBlobStore, LocalBlobStore};
use gallery_db::Database;

use crate::config::{BlobBackend, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gallery=debug,gallery_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {:#}", e);
            error!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init DB
    let db = Arc::new(Database::open(&config.db_path)?);

    // Blob storage
    let (blobs, upload_dir) = match &config.blob_backend {
        BlobBackend::Local { dir } => {
            let public_base = format!("{}/uploads", config.public_url);
            let store = LocalBlobStore::new(dir.clone(), public_base).await?;
            info!("Storing uploads in {}", store.dir().display());
            let dir = store.dir().to_path_buf();
            let store: Arc<dyn BlobStore> = Arc::new(store);
            (store, Some(dir))
        }
        BlobBackend::Remote { endpoint, token } => {
            info!("Storing uploads at {}", endpoint);
            let store: Arc<dyn BlobStore> =
                Arc::new(HttpBlobStore::new(endpoint.clone(), token.clone())?);
            (store, None)
        }
    };

    let tokens = TokenIssuer::new(&config.jwt_secret, config.jwt_ttl);
    let state = AppStateInner::new(db.clone(), blobs, tokens, config.max_file_size);

    // Background orphan sweep
    if config.reconcile_interval_secs > 0 {
        tokio::spawn(reconcile::run_reconcile_loop(
            state.clone(),
            config.reconcile_interval_secs,
            Duration::from_secs(config.orphan_grace_secs),
        ));
    } else {
        warn!("Orphan blob sweep disabled");
    }

    let cors = match &config.frontend_url {
        Some(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(HeaderValue::from_str(origin)?))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
        None => {
            warn!("GALLERY_FRONTEND_URL not set, allowing any origin");
            CorsLayer::permissive()
        }
    };

    let mut app = gallery_api::router(state);
    if let Some(dir) = upload_dir {
        app = app.nest_service("/uploads", ServeDir::new(dir));
    }
    let app = app.layer(cors).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Gallery server listening on {}", addr);
    info!(
        "Uploads up to {} bytes, tokens valid for {} hours",
        config.max_file_size,
        config.jwt_ttl.num_hours()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = db.close() {
        warn!("WAL checkpoint on shutdown failed: {}", e);
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
