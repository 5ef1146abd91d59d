use crate::config::InputConfig;
use crate::types::Record;
use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use tracing::info;

pub const REQUIRED_COLUMNS: [&str; 6] = [
    "Name",
    "Portfolio",
    "Ranking",
    "State",
    "city lat",
    "city long",
];

pub fn load_records(input: &InputConfig) -> Result<Vec<Record>> {
    info!("Loading records from {:?}...", input.path);

    let extension = input.path.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input file {:?} has no extension", input.path))?;

    let rows = match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(input)?,
        "csv" => read_csv(input)?,
        _ => return Err(anyhow!("Unsupported input format: {}", extension)),
    };

    let records = parse_rows(rows, &input.ranking_header)?;
    info!("Loaded {} records", records.len());
    Ok(records)
}

fn read_workbook(input: &InputConfig) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(&input.path)
        .with_context(|| format!("Failed to open workbook: {:?}", input.path))?;
    let range = workbook.worksheet_range(&input.sheet)
        .with_context(|| format!("Failed to read sheet '{}' from {:?}", input.sheet, input.path))?;

    Ok(range.rows().map(|row| row.iter().map(cell_text).collect()).collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Excel stores every number as a float; keep whole numbers integral
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

fn read_csv(input: &InputConfig) -> Result<Vec<Vec<String>>> {
    let file = File::open(&input.path)
        .with_context(|| format!("Failed to open CSV file: {:?}", input.path))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.with_context(|| format!("Failed to read CSV file: {:?}", input.path))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Turns raw sheet rows (header first) into records.
pub fn parse_rows(rows: Vec<Vec<String>>, ranking_header: &str) -> Result<Vec<Record>> {
    let mut rows = rows.into_iter();
    let headers = rows.next().ok_or_else(|| anyhow!("Input sheet is empty"))?;

    let col_indices: HashMap<String, usize> = headers.iter().enumerate()
        .map(|(i, h)| {
            let h = h.trim();
            let name = if h == ranking_header.trim() { "Ranking" } else { h };
            (name.to_string(), i)
        })
        .collect();

    let mut idx = [0usize; 6];
    for (slot, column) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = *col_indices.get(column)
            .ok_or_else(|| anyhow!("Required column '{}' not found in input", column))?;
    }
    let [name, portfolio, ranking, state, lat, long] = idx;

    let mut records = Vec::new();
    // Header is line 1
    for (line, row) in rows.enumerate().map(|(i, r)| (i + 2, r)) {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");

        records.push(Record {
            name: cell(name).to_string(),
            portfolio: cell(portfolio).to_string(),
            ranking: parse_ranking(cell(ranking))
                .with_context(|| format!("Row {}: invalid value in column 'Ranking'", line))?,
            state: cell(state).to_string(),
            latitude: parse_coordinate(cell(lat))
                .with_context(|| format!("Row {}: invalid value in column 'city lat'", line))?,
            longitude: parse_coordinate(cell(long))
                .with_context(|| format!("Row {}: invalid value in column 'city long'", line))?,
        });
    }

    Ok(records)
}

fn parse_ranking(raw: &str) -> Result<i64> {
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(value);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
        _ => Err(anyhow!("'{}' is not an integer", raw)),
    }
}

fn parse_coordinate(raw: &str) -> Result<f64> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(anyhow!("'{}' is not a number", raw)),
    }
}
