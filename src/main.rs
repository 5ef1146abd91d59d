pub mod types;
pub mod config;
pub mod data;
pub mod style;
pub mod processing;
pub mod render;
pub mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the interactive map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Render the map once and write it as JSON
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Portfolio to include (repeatable, default all)
        #[arg(short, long)]
        portfolio: Vec<String>,
        /// Ranking to include (repeatable, default all)
        #[arg(short, long)]
        ranking: Vec<i64>,
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Figure)]
        format: ExportFormat,
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Figure,
    Geojson,
}

fn load_table(config: &config::AppConfig) -> Result<processing::PreparedTable> {
    let records = data::load_records(&config.input)?;
    let style = style::StyleTable::from_config(&config.processing)?;
    Ok(processing::prepare(records, style, config.processing.offset))
}

/// Flags left empty keep every value in the table.
fn export_selection(
    table: &processing::PreparedTable,
    portfolio: Vec<String>,
    ranking: Vec<i64>,
) -> render::Selection {
    let mut selection = render::Selection::all(table);
    if !portfolio.is_empty() {
        selection.portfolios = portfolio.into_iter().collect();
    }
    if !ranking.is_empty() {
        selection.rankings = ranking.into_iter().collect();
    }
    selection
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            info!("Serving map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;
            let table = load_table(&app_config)?;
            server::start_server(app_config, table).await?;
        }
        Commands::Export { config, portfolio, ranking, format, output } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            let table = load_table(&app_config)?;

            let selection = export_selection(&table, portfolio, ranking);
            let groups = render::render(&table, &selection);
            let json = match format {
                ExportFormat::Figure => {
                    serde_json::to_string_pretty(&render::build_figure(&groups, &app_config.layout))?
                }
                ExportFormat::Geojson => serde_json::to_string_pretty(&render::to_geojson(&groups))?,
            };

            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("Failed to write output file: {:?}", path))?;
                    info!("Wrote {:?}", path);
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}
