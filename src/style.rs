//! Color, size and legend-order lookup tables.

use crate::config::ProcessingConfig;
use crate::types::category_label;
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub portfolio: String,
    pub ranking: i64,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct StyleTable {
    // Portfolio -> Ranking -> color
    colors: HashMap<String, HashMap<i64, String>>,
    sizes: HashMap<i64, u32>,
    fallback_color: String,
    fallback_size: u32,
    order: Vec<Category>,
    // Portfolio -> Ranking -> legend index
    priority: HashMap<String, HashMap<i64, usize>>,
}

impl StyleTable {
    /// Builds the tables, rejecting configs whose legend would repeat a category.
    pub fn from_config(config: &ProcessingConfig) -> Result<Self> {
        let mut rankings = HashSet::new();
        for ranking in &config.rankings {
            if !rankings.insert(*ranking) {
                bail!("Ranking {} is listed more than once in processing.rankings", ranking);
            }
        }

        let mut portfolios = HashSet::new();
        for p in &config.portfolios {
            if !portfolios.insert(p.name.as_str()) {
                bail!("Portfolio '{}' is configured more than once", p.name);
            }
        }

        Ok(Self::build(config))
    }

    fn build(config: &ProcessingConfig) -> Self {
        let colors = config
            .portfolios
            .iter()
            .map(|p| {
                let shades = p.shades.iter().map(|s| (s.ranking, s.color.clone())).collect();
                (p.name.clone(), shades)
            })
            .collect();

        let sizes = config.sizes.iter().map(|s| (s.ranking, s.size)).collect();

        let order: Vec<Category> = config
            .portfolios
            .iter()
            .flat_map(|p| {
                config.rankings.iter().map(|&ranking| Category {
                    portfolio: p.name.clone(),
                    ranking,
                    label: category_label(&p.name, ranking),
                })
            })
            .collect();

        let mut priority: HashMap<String, HashMap<i64, usize>> = HashMap::new();
        for (index, category) in order.iter().enumerate() {
            priority
                .entry(category.portfolio.clone())
                .or_default()
                .insert(category.ranking, index);
        }

        Self {
            colors,
            sizes,
            fallback_color: config.fallback_color.clone(),
            fallback_size: config.fallback_size,
            order,
            priority,
        }
    }

    pub fn color(&self, portfolio: &str, ranking: i64) -> &str {
        self.colors
            .get(portfolio)
            .and_then(|shades| shades.get(&ranking))
            .map(String::as_str)
            .unwrap_or(self.fallback_color.as_str())
    }

    pub fn size(&self, ranking: i64) -> u32 {
        self.sizes.get(&ranking).copied().unwrap_or(self.fallback_size)
    }

    pub fn priority(&self, portfolio: &str, ranking: i64) -> Option<usize> {
        self.priority
            .get(portfolio)
            .and_then(|rankings| rankings.get(&ranking))
            .copied()
    }

    /// Categories in legend order.
    pub fn categories(&self) -> &[Category] {
        &self.order
    }
}

// The built-in tables have no repeats
impl Default for StyleTable {
    fn default() -> Self {
        Self::build(&ProcessingConfig::default())
    }
}
