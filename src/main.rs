use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use weather_fanout::persist::{CsvSink, SqliteSink};
use weather_fanout::{
    FetchPipeline, FetcherConfig, PersistenceFanout, TemperatureUnit, WeatherError, convert,
    format_table, logging,
};

const ABOUT: &str = "Fetch, merge and persist current weather for many locations";

const LONG_ABOUT: &str = "
Fetches current conditions for each location from the primary weather API and
visibility from the auxiliary forecast page, concurrently. The merged records are
printed as a table and written to a CSV file, a SQLite table and an HTML map.

The primary API key is read from the config file (primary.api_key) or the
WEATHER_FANOUT_PRIMARY__API_KEY environment variable.
";

#[derive(Parser, Debug)]
#[command(version, about = ABOUT, long_about = LONG_ABOUT)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch weather for the given locations and persist it
    Fetch {
        #[arg(required = true)]
        locations: Vec<String>,

        /// Temperature unit for output (celsius or fahrenheit)
        #[arg(short, long, default_value = "celsius")]
        unit: TemperatureUnit,

        /// Records released per chunk (defaults to pipeline.chunk_size)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Create the weather_data table
    InitDb,
    /// Print every stored row
    ShowDb,
    /// Delete every stored row
    ClearDb,
    /// Truncate the CSV file
    ClearCsv,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = FetcherConfig::load_from_path(args.config.clone())
        .context("Failed to load configuration")?;
    logging::init(&config.logging, args.verbose)?;

    let outcome = match args.command {
        Command::Fetch {
            locations,
            unit,
            chunk_size,
        } => fetch(&config, locations, unit, chunk_size).await,
        Command::InitDb => init_db(&config).await,
        Command::ShowDb => show_db(&config).await,
        Command::ClearDb => clear_db(&config).await,
        Command::ClearCsv => clear_csv(&config).await,
    };

    outcome.map_err(|e| {
        match e.downcast_ref::<WeatherError>().map(WeatherError::user_message) {
            Some(message) => e.context(message),
            None => e,
        }
    })
}

async fn fetch(
    config: &FetcherConfig,
    locations: Vec<String>,
    unit: TemperatureUnit,
    chunk_size: Option<usize>,
) -> Result<()> {
    let pipeline = FetchPipeline::from_config(config)?;
    let fanout = PersistenceFanout::from_config(config)?;
    let chunk_size = chunk_size.unwrap_or(config.pipeline.chunk_size);

    let mut run = pipeline.run(locations, chunk_size)?;
    let mut batch = Vec::with_capacity(run.len());
    while let Some(chunk) = run.next_chunk().await {
        let chunk = chunk?;
        info!("Received {} records", chunk.len());
        batch.extend(chunk);
    }

    let batch = convert(&batch, unit);
    println!("{}", format_table(&batch));

    let report = fanout.persist(&batch).await;
    print!("{report}");

    if !report.all_succeeded() {
        let failed: Vec<&str> = report.failures().map(|o| o.sink.as_str()).collect();
        bail!("{} sink(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

async fn init_db(config: &FetcherConfig) -> Result<()> {
    SqliteSink::new(&config.output.database_path)
        .create_table()
        .await?;
    println!(
        "weather_data table ready in {}",
        config.output.database_path.display()
    );
    Ok(())
}

async fn show_db(config: &FetcherConfig) -> Result<()> {
    let rows = SqliteSink::new(&config.output.database_path).rows().await?;
    if rows.is_empty() {
        println!("No stored weather data");
        return Ok(());
    }

    println!(
        "{:<5} {:<15} {:<12} {:<10} {:<10} {:<12} {:<10}",
        "ID", "Location", "Temperature", "Humidity", "Pressure", "Wind Speed", "Visibility"
    );
    for row in rows {
        println!(
            "{:<5} {:<15} {:<12.1} {:<10} {:<10} {:<12.1} {:<10}",
            row.id,
            row.location,
            row.temperature,
            row.humidity,
            row.pressure,
            row.wind_speed,
            row.visibility
        );
    }
    Ok(())
}

async fn clear_db(config: &FetcherConfig) -> Result<()> {
    let deleted = SqliteSink::new(&config.output.database_path)
        .clear()
        .await?;
    println!("Deleted {deleted} rows");
    Ok(())
}

async fn clear_csv(config: &FetcherConfig) -> Result<()> {
    let sink = CsvSink::new(&config.output.csv_path);
    if let Err(e) = sink.clear().await {
        warn!("Could not clear {}: {}", sink.path().display(), e);
        return Err(e.into());
    }
    println!("Cleared {}", sink.path().display());
    Ok(())
}
