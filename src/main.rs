//! CLI interface for rust-flight-borders

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_flight_borders::{
    attribute_time, extract_track, read_record_table, write_record_table, CountryIndex,
    CountryReport, Markup, PipelineConfig, RawRecord, TrackOverview,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "rust-flight-borders")]
#[command(about = "Attribute flight time to the countries flown over, from a rendered track log")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub settings: Settings,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Default)]
pub struct Settings {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Characters in the time window
    #[arg(long, global = true)]
    pub time_len: Option<usize>,
    /// Characters from the end of the time to the latitude
    #[arg(long, global = true)]
    pub to_lat: Option<usize>,
    /// Characters in the latitude window
    #[arg(long, global = true)]
    pub lat_len: Option<usize>,
    /// Characters from the end of the latitude to the longitude
    #[arg(long, global = true)]
    pub to_long: Option<usize>,
    /// Characters in the longitude window
    #[arg(long, global = true)]
    pub long_len: Option<usize>,
    /// Polygon property holding the country name
    #[arg(long, global = true)]
    pub country_column: Option<String>,
    /// CRS of the polygon dataset when the file itself declares none (e.g. EPSG:4326)
    #[arg(long, global = true)]
    pub declared_crs: Option<String>,
    /// Write JSON logs to a daily rotating file in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract the raw record table from rendered markup
    Extract {
        /// Rendered track-log page
        #[arg(short, long)]
        markup: PathBuf,
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Attribute time to countries from an existing record table
    Report {
        /// Record table CSV
        #[arg(short, long)]
        records: PathBuf,
        /// Country polygons (GeoJSON FeatureCollection)
        #[arg(short, long)]
        countries: PathBuf,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Export the track overview (points, polyline, center) as GeoJSON
    Track {
        /// Record table CSV
        #[arg(short, long)]
        records: PathBuf,
        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Extract and report in one go
    Run {
        /// Rendered track-log page
        #[arg(short, long)]
        markup: PathBuf,
        /// Country polygons (GeoJSON FeatureCollection)
        #[arg(short, long)]
        countries: PathBuf,
        /// Also keep the record table here
        #[arg(long)]
        records_out: Option<PathBuf>,
        /// Also write the track overview GeoJSON here
        #[arg(long)]
        track_out: Option<PathBuf>,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Settings {
    /// File configuration (or defaults) with command-line overrides applied
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        let layout = &mut config.layout;
        if let Some(value) = self.time_len {
            layout.time_len = value;
        }
        if let Some(value) = self.to_lat {
            layout.to_lat = value;
        }
        if let Some(value) = self.lat_len {
            layout.lat_len = value;
        }
        if let Some(value) = self.to_long {
            layout.to_long = value;
        }
        if let Some(value) = self.long_len {
            layout.long_len = value;
        }
        if let Some(column) = &self.country_column {
            config.country_column = column.clone();
        }
        if let Some(crs) = &self.declared_crs {
            config.declared_crs = Some(crs.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(log_dir: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rust_flight_borders=info"));

    match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "rust-flight-borders.log");
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file_appender)
                        .with_ansi(false)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true)
                        .json(),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false),
                )
                .init();
        }
    }
    Ok(())
}

fn read_markup(path: &Path) -> Result<Markup> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read markup {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read rendered markup");
    Ok(Markup::from_bytes(&bytes))
}

fn load_countries(path: &Path, config: &PipelineConfig) -> Result<CountryIndex> {
    CountryIndex::from_geojson_file(path, &config.country_column, config.declared_crs.as_deref())
        .with_context(|| format!("Failed to load country polygons {}", path.display()))
}

fn emit_report(report: &CountryReport, output: Option<&Path>) -> Result<()> {
    if let Some(output_file) = output {
        let json = serde_json::to_string_pretty(report)?;
        fs::write(output_file, &json)
            .with_context(|| format!("Failed to write {}", output_file.display()))?;
        println!("Results saved to {}", output_file.display());
    }

    print!("{report}");
    println!("\nTotal attributed: {:.0} seconds", report.total_seconds());
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.settings.resolve()?;
    debug!(config = ?config, "Resolved configuration");

    match cli.command {
        Commands::Extract { markup, output } => {
            let markup = read_markup(&markup)?;
            let records = extract_track(&markup, &config.layout)?;
            write_record_table(&output, &records)
                .with_context(|| format!("Failed to write record table {}", output.display()))?;
            println!("Extracted {} rows to {}", records.len(), output.display());
        }
        Commands::Report {
            records,
            countries,
            output,
        } => {
            let rows = read_record_table(&records)
                .with_context(|| format!("Failed to read record table {}", records.display()))?;
            let countries = load_countries(&countries, &config)?;
            let report = attribute_time(&rows, &countries)?;
            emit_report(&report, output.as_deref())?;
        }
        Commands::Track { records, output } => {
            let rows = read_record_table(&records)
                .with_context(|| format!("Failed to read record table {}", records.display()))?;
            write_track(&rows, &output)?;
        }
        Commands::Run {
            markup,
            countries,
            records_out,
            track_out,
            output,
        } => {
            let markup = read_markup(&markup)?;
            let records = extract_track(&markup, &config.layout)?;
            if let Some(path) = &records_out {
                write_record_table(path, &records)
                    .with_context(|| format!("Failed to write record table {}", path.display()))?;
            }
            if let Some(path) = &track_out {
                write_track(&records, path)?;
            }

            let countries = load_countries(&countries, &config)?;
            let report = attribute_time(&records, &countries)?;
            emit_report(&report, output.as_deref())?;
        }
    }

    Ok(())
}

fn write_track(records: &[RawRecord], output: &Path) -> Result<()> {
    let overview = TrackOverview::from_records(records)?;
    overview
        .write_geojson(output)
        .with_context(|| format!("Failed to write track overview {}", output.display()))?;
    println!(
        "Track with {} points written to {}",
        overview.points.len(),
        output.display()
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.settings.log_dir.as_deref()) {
        eprintln!("Error initializing logging: {e:#}");
        std::process::exit(1);
    }
    info!("rust-flight-borders started");

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
