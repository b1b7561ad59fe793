//! store.rs — SQLite access to the `Geo` observation table.
//!
//! Schema: Geo(devEui TEXT, bstnEui TEXT, seqNo INTEGER, time INTEGER,
//! bstnLat REAL, bstnLng REAL, devLat REAL, devLng REAL). Loaders write a
//! zero coordinate when a position was never surveyed; this layer turns
//! those into `None` so downstream code never mistakes "unset" for the
//! equator.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use lora_types::GeoRow;

/// Open a pooled connection to the observation database.
pub async fn connect(db_path: &str) -> Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&format!("sqlite://{db_path}"))
        .await
        .with_context(|| format!("opening observation db {db_path}"))
}

/// All rows for one device, ordered the way the driver expects. A malformed
/// row is a data-integrity problem and fails the whole load.
pub async fn fetch_device_rows(pool: &SqlitePool, dev_eui: &str) -> Result<Vec<GeoRow>> {
    let rows = sqlx::query(
        "SELECT bstnEui, seqNo, time, bstnLat, bstnLng, devLat, devLng \
         FROM Geo WHERE devEui = ? ORDER BY seqNo, time",
    )
    .bind(dev_eui)
    .fetch_all(pool)
    .await
    .with_context(|| format!("loading observations for {dev_eui}"))?;

    rows.iter()
        .map(|row| {
            Ok(GeoRow {
                dev_eui: dev_eui.to_owned(),
                bstn_eui: row.try_get("bstnEui")?,
                seq_no: row.try_get("seqNo")?,
                time: row.try_get("time")?,
                bstn_lat: stored_coordinate(row.try_get("bstnLat")?),
                bstn_lng: stored_coordinate(row.try_get("bstnLng")?),
                dev_lat: stored_coordinate(row.try_get("devLat")?),
                dev_lng: stored_coordinate(row.try_get("devLng")?),
            })
        })
        .collect()
}

/// Zero in storage means "never set"; anything else is a real coordinate.
fn stored_coordinate(value: f64) -> Option<f64> {
    if value == 0.0 {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_absent_anything_else_is_a_coordinate() {
        assert_eq!(stored_coordinate(0.0), None);
        assert_eq!(stored_coordinate(43.05), Some(43.05));
        assert_eq!(stored_coordinate(-70.78), Some(-70.78));
    }
}
