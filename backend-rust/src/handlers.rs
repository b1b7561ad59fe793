//! handlers.rs — the device-location HTTP surface.
//!
//! `GET /locate?devEui=<comma-list>&algorithm=<selector>&aggregate=<bool>`
//! loads each device's observation rows, runs the engine on a bounded
//! blocking worker pool, and returns per-device estimates with counters,
//! plus an optional trimmed summary fix.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use geoloc_engine::aggregator::{aggregate, AggregateOutcome, ErrorBands, WeightedFix};
use geoloc_engine::driver::{locate_device, LocateConfig, LocateReport};
use geoloc_engine::Algorithm;
use lora_types::{validate_euis, TimeBase};

pub struct AppState {
    pub pool: SqlitePool,
    pub default_algorithm: Algorithm,
    /// Bounds concurrently solving devices (engine work is CPU-bound).
    pub workers: Arc<Semaphore>,
}

pub type SharedState = Arc<AppState>;

// ── Request / response shapes ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocateParams {
    /// Comma-separated device EUIs
    pub dev_eui: String,
    /// Estimator selector; server default when omitted
    pub algorithm: Option<String>,
    /// Also reduce each device's fixes to a single trimmed estimate
    #[serde(default)]
    pub aggregate: bool,
    /// Tick unit of stored arrival times; nanoseconds when omitted
    pub time_base: Option<TimeBase>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocateResponse {
    pub algorithm: Algorithm,
    pub devices: Vec<DeviceLocations>,
    /// EUIs from the request that failed validation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected_euis: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLocations {
    pub dev_eui: String,
    #[serde(flatten)]
    pub report: LocateReport,
    pub error_bands: ErrorBands,
    /// Present when aggregation was requested and the device is stationary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<WeightedFix>,
    /// True when aggregation was requested but ground truth drifted
    pub moving: bool,
}

// ── Handler ───────────────────────────────────────────────────────────────────

pub async fn locate(
    State(state): State<SharedState>,
    Query(params): Query<LocateParams>,
) -> Result<Json<LocateResponse>, (StatusCode, String)> {
    let algorithm = match &params.algorithm {
        Some(selector) => Algorithm::from_str(selector)
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        None => state.default_algorithm,
    };

    let euis = validate_euis(&params.dev_eui);
    let rejected_euis: Vec<String> = params
        .dev_eui
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && !lora_types::is_valid_eui(t))
        .map(str::to_owned)
        .collect();
    if euis.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "no valid device EUIs in request".into(),
        ));
    }
    for eui in &rejected_euis {
        warn!("rejected malformed EUI: {eui}");
    }

    let config = LocateConfig::new(algorithm, params.time_base.unwrap_or_default());

    let mut tasks = Vec::with_capacity(euis.len());
    for eui in euis {
        let rows = crate::store::fetch_device_rows(&state.pool, &eui)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))?;

        // a permit per device keeps at most `workers` solves in flight
        let permit = Arc::clone(&state.workers)
            .acquire_owned()
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

        let config = config.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            let report = locate_device(&eui, &rows, &config);
            drop(permit);
            (eui, report)
        }));
    }

    let mut devices = Vec::with_capacity(tasks.len());
    for task in tasks {
        let (eui, report) = task
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

        let (summary, moving) = if params.aggregate {
            match aggregate(&report.estimates) {
                Some(AggregateOutcome::Fix(fix)) => (Some(fix), false),
                Some(AggregateOutcome::Moving) => (None, true),
                None => (None, false),
            }
        } else {
            (None, false)
        };

        info!(
            "{eui}: located {} of {} bursts",
            report.estimates.len(),
            report.total_bursts
        );
        devices.push(DeviceLocations {
            dev_eui: eui,
            error_bands: ErrorBands::classify(&report.estimates),
            report,
            summary,
            moving,
        });
    }

    Ok(Json(LocateResponse {
        algorithm,
        devices,
        rejected_euis,
    }))
}
