use geo::Point;

/// One row of the source sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub portfolio: String,
    pub ranking: i64,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    pub record: Record,
    // Position among rows sharing (name, latitude, longitude)
    pub id: usize,
    // Offset location, x = longitude, y = latitude
    pub point: Point<f64>,
    pub color: String,
    pub category: String,
    pub size: u32,
    // Index into the legend order, None when the category is not listed
    pub priority: Option<usize>,
}

impl PreparedRecord {
    pub fn latitude(&self) -> f64 {
        self.point.y()
    }

    pub fn longitude(&self) -> f64 {
        self.point.x()
    }
}

/// Legend label for a portfolio/ranking pair, e.g. `Herbicide (Ranking 2)`.
pub fn category_label(portfolio: &str, ranking: i64) -> String {
    format!("{} (Ranking {})", portfolio, ranking)
}
