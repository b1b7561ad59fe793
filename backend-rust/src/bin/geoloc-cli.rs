//! geoloc-cli — run the location engine against a stored observation set and
//! report how the estimates compare to surveyed device positions.
//!
//! ```text
//! geoloc-cli --eui 00000000FFFFFFFF --db geo.db --algorithm taylorSeries --aggregate
//! ```

use std::str::FromStr;

use anyhow::bail;
use clap::Parser;

use geoloc_backend::store;
use geoloc_engine::aggregator::{aggregate, AggregateOutcome, ErrorBands};
use geoloc_engine::driver::{locate_device, LocateConfig};
use geoloc_engine::Algorithm;
use lora_types::{validate_euis, TimeBase};

#[derive(Parser, Debug)]
#[command(name = "geoloc-cli", about = "Locate LoRa devices from stored TDOA observations")]
struct Args {
    /// Comma-separated device EUIs
    #[arg(short, long)]
    eui: String,
    /// SQLite observation database
    #[arg(short, long, default_value = "geo.db")]
    db: String,
    /// Estimator selector
    #[arg(short, long, default_value = "taylorSeries")]
    algorithm: String,
    /// Reduce each device's fixes to a single trimmed estimate
    #[arg(long)]
    aggregate: bool,
    /// Arrival times are microsecond ticks instead of nanoseconds
    #[arg(long)]
    microseconds: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geoloc_engine=warn".into()),
        )
        .init();

    let args = Args::parse();
    let algorithm = Algorithm::from_str(&args.algorithm)?;
    let time_base = if args.microseconds {
        TimeBase::Microseconds
    } else {
        TimeBase::Nanoseconds
    };

    let euis = validate_euis(&args.eui);
    if euis.is_empty() {
        bail!("no valid device EUIs in `{}`", args.eui);
    }

    let pool = store::connect(&args.db).await?;
    let config = LocateConfig::new(algorithm, time_base);
    let separator = "-".repeat(50);

    for eui in euis {
        println!("{separator}");
        println!("Device: {eui} ({algorithm})");

        let rows = store::fetch_device_rows(&pool, &eui).await?;
        let report = locate_device(&eui, &rows, &config);

        println!("      Number of transactions: {}", report.total_bursts);
        println!(
            "Number of valid transactions: {}",
            report.total_bursts - report.skipped_bursts
        );
        println!(
            " Number of successful fixes: {}",
            report.estimates.len()
        );

        let bands = ErrorBands::classify(&report.estimates);
        if bands.total > 0 {
            println!("{bands}");
        } else {
            println!("Cannot compute location errors!");
        }

        if args.aggregate {
            match aggregate(&report.estimates) {
                Some(AggregateOutcome::Fix(fix)) => {
                    println!("Aggregated position: {:.6}, {:.6}", fix.lat, fix.lng);
                }
                Some(AggregateOutcome::Moving) => {
                    println!("Device is moving; fixes were not aggregated.");
                }
                None => println!("Nothing to aggregate."),
            }
        }
    }
    println!("{separator}");

    Ok(())
}
