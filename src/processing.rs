use crate::style::StyleTable;
use crate::types::{category_label, PreparedRecord, Record};
use geo::Point;
use std::collections::HashMap;
use tracing::{debug, info};

/// The annotated, legend-ordered table. Built once and only read afterwards.
#[derive(Debug, Clone)]
pub struct PreparedTable {
    pub records: Vec<PreparedRecord>,
    pub style: StyleTable,
}

impl PreparedTable {
    /// Distinct portfolios in table order.
    pub fn portfolios(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for r in &self.records {
            if !seen.contains(&r.record.portfolio) {
                seen.push(r.record.portfolio.clone());
            }
        }
        seen
    }

    /// Distinct rankings in table order.
    pub fn rankings(&self) -> Vec<i64> {
        let mut seen = Vec::new();
        for r in &self.records {
            if !seen.contains(&r.record.ranking) {
                seen.push(r.record.ranking);
            }
        }
        seen
    }
}

// -0.0 and 0.0 are one location
fn coordinate_key(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

pub fn prepare(records: Vec<Record>, style: StyleTable, offset: f64) -> PreparedTable {
    info!("Preparing {} records...", records.len());

    let mut seen: HashMap<(String, u64, u64), usize> = HashMap::new();
    let mut prepared: Vec<PreparedRecord> = records
        .into_iter()
        .map(|record| {
            let key = (
                record.name.clone(),
                coordinate_key(record.latitude),
                coordinate_key(record.longitude),
            );
            let counter = seen.entry(key).or_insert(0);
            let id = *counter;
            *counter += 1;

            let shift = id as f64 * offset;
            let point = Point::new(record.longitude - shift, record.latitude + shift);

            PreparedRecord {
                id,
                point,
                color: style.color(&record.portfolio, record.ranking).to_string(),
                category: category_label(&record.portfolio, record.ranking),
                size: style.size(record.ranking),
                priority: style.priority(&record.portfolio, record.ranking),
                record,
            }
        })
        .collect();

    let shifted = prepared.iter().filter(|r| r.id > 0).count();
    debug!("Offset {} duplicate locations", shifted);

    // Stable: equal categories keep input order, unlisted categories go last
    prepared.sort_by_key(|r| (r.priority.is_none(), r.priority));

    PreparedTable {
        records: prepared,
        style,
    }
}
