//! main.rs — geoloc-backend entry point.
//!
//! Serves `/health` and `/locate` over the SQLite observation store.
//! Configuration is environment-driven: GEOLOC_DB, GEOLOC_ALGORITHM,
//! GEOLOC_WORKERS, PORT, CORS_ORIGINS.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use geoloc_backend::handlers::{locate, AppState, SharedState};
use geoloc_backend::store;
use geoloc_engine::Algorithm;

// ─── Global startup time (for uptime reporting) ──────────────────────────────
static STARTUP_MS: AtomicU64 = AtomicU64::new(0);

// ─── Config ──────────────────────────────────────────────────────────────────

struct ServerConfig {
    db_path: String,
    default_algorithm: Algorithm,
    workers: usize,
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let default_algorithm = std::env::var("GEOLOC_ALGORITHM")
            .ok()
            .and_then(|s| match Algorithm::from_str(&s) {
                Ok(a) => Some(a),
                Err(e) => {
                    warn!("{e}, falling back to {}", Algorithm::default());
                    None
                }
            })
            .unwrap_or_default();

        Self {
            db_path: std::env::var("GEOLOC_DB").unwrap_or_else(|_| "geo.db".into()),
            default_algorithm,
            workers: std::env::var("GEOLOC_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3001),
        }
    }
}

// ─── Health Endpoint ─────────────────────────────────────────────────────────
// GET /health → { status, version, uptimeSecs }

async fn health_check() -> axum::Json<serde_json::Value> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let startup = STARTUP_MS.load(Ordering::Relaxed);
    let uptime_secs = if startup > 0 { (now_ms - startup) / 1000 } else { 0 };
    axum::Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": uptime_secs,
    }))
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let startup_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    STARTUP_MS.store(startup_ms, Ordering::Relaxed);

    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geoloc_backend=info,geoloc_engine=info".into()),
        )
        .init();

    let config = ServerConfig::default();
    info!(
        "📡 Geolocation backend v{} starting — db: {}, default algorithm: {}, {} workers",
        env!("CARGO_PKG_VERSION"),
        config.db_path,
        config.default_algorithm,
        config.workers
    );

    let pool = store::connect(&config.db_path).await?;
    let state: SharedState = Arc::new(AppState {
        pool,
        default_algorithm: config.default_algorithm,
        workers: Arc::new(Semaphore::new(config.workers)),
    });

    // CORS — local dev origins by default; set CORS_ORIGINS=* to open up
    let cors_origins_env = std::env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

    let cors = if cors_origins_env.trim() == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = cors_origins_env
            .split(',')
            .filter_map(|o| o.trim().parse::<HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/locate", get(locate))
        .with_state(state)
        .layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("🚀 Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
