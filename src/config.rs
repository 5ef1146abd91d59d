use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

pub const LONG_RANKING_HEADER: &str = "Ranking (3 is highest, indicated by darkest color)";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub path: PathBuf,
    #[serde(default = "default_sheet")]
    pub sheet: String,
    // Renamed to "Ranking" before the required-column check
    #[serde(default = "default_ranking_header")]
    pub ranking_header: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Degrees added to latitude (and taken from longitude) per duplicate.
    pub offset: f64,
    pub fallback_color: String,
    pub fallback_size: u32,
    /// Legend order: every portfolio in turn, rankings nested in this order.
    pub rankings: Vec<i64>,
    pub portfolios: Vec<PortfolioConfig>,
    pub sizes: Vec<SizeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortfolioConfig {
    pub name: String,
    pub shades: Vec<ShadeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShadeConfig {
    pub ranking: i64,
    pub color: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SizeConfig {
    pub ranking: i64,
    pub size: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LayoutConfig {
    pub heading: String,
    pub title: String,
    pub legend_title: String,
    pub land_color: String,
    pub ocean_color: String,
    pub country_color: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: PathBuf,
}

fn default_sheet() -> String {
    "data".to_string()
}

fn default_ranking_header() -> String {
    LONG_RANKING_HEADER.to_string()
}

fn portfolio(name: &str, shades: [&str; 3]) -> PortfolioConfig {
    PortfolioConfig {
        name: name.to_string(),
        shades: [3, 2, 1]
            .into_iter()
            .zip(shades)
            .map(|(ranking, color)| ShadeConfig { ranking, color: color.to_string() })
            .collect(),
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            offset: 0.2,
            fallback_color: "#808080".to_string(),
            fallback_size: 5,
            rankings: vec![3, 2, 1],
            portfolios: vec![
                portfolio("Fungicide", ["darkgreen", "green", "lightgreen"]),
                portfolio("Herbicide", ["darkred", "red", "lightcoral"]),
                portfolio("Insecticide", ["#520154", "#f503fc", "#fc99ff"]),
                portfolio("Nematicide", ["#758204", "#edff4d", "#eaf590"]),
            ],
            sizes: vec![
                SizeConfig { ranking: 3, size: 20 },
                SizeConfig { ranking: 2, size: 15 },
                SizeConfig { ranking: 1, size: 10 },
            ],
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            heading: "Portfolio Distribution Map".to_string(),
            title: "Portfolio Distribution with Ranking across the US".to_string(),
            legend_title: "Portfolio and Ranking".to_string(),
            land_color: "lightgrey".to_string(),
            ocean_color: "lightblue".to_string(),
            country_color: "black".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8050,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
