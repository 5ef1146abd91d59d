use crate::config::LayoutConfig;
use crate::processing::PreparedTable;
use crate::types::PreparedRecord;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// The two dropdown filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub portfolios: BTreeSet<String>,
    pub rankings: BTreeSet<i64>,
}

impl Selection {
    /// Initial dashboard state: every value present in the table.
    pub fn all(table: &PreparedTable) -> Self {
        Self {
            portfolios: table.portfolios().into_iter().collect(),
            rankings: table.rankings().into_iter().collect(),
        }
    }

    /// Whether the record lands in one of the map's groups.
    pub fn shows(&self, r: &PreparedRecord) -> bool {
        r.priority.is_some()
            && self.portfolios.contains(&r.record.portfolio)
            && self.rankings.contains(&r.record.ranking)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub name: String,
    pub portfolio: String,
    pub latitude: f64,
    pub longitude: f64,
    pub state: String,
    pub ranking: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointGroup {
    pub category: String,
    pub color: String,
    pub size: u32,
    pub points: Vec<MapPoint>,
}

/// One group per legend category, in legend order, empty groups included.
pub fn render(table: &PreparedTable, selection: &Selection) -> Vec<PointGroup> {
    let mut groups: Vec<PointGroup> = table
        .style
        .categories()
        .iter()
        .map(|c| PointGroup {
            category: c.label.clone(),
            color: table.style.color(&c.portfolio, c.ranking).to_string(),
            size: table.style.size(c.ranking),
            points: Vec::new(),
        })
        .collect();

    for r in table.records.iter().filter(|r| selection.shows(r)) {
        let Some(group) = r.priority.and_then(|p| groups.get_mut(p)) else {
            continue;
        };
        group.points.push(MapPoint {
            name: r.record.name.clone(),
            portfolio: r.record.portfolio.clone(),
            latitude: r.latitude(),
            longitude: r.longitude(),
            state: r.record.state.clone(),
            ranking: r.record.ranking,
        });
    }

    groups
}

/// Plotly figure with one `scattergeo` trace per group.
pub fn build_figure(groups: &[PointGroup], layout: &LayoutConfig) -> Value {
    let traces: Vec<Value> = groups
        .iter()
        .map(|g| {
            let lon: Vec<f64> = g.points.iter().map(|p| p.longitude).collect();
            let lat: Vec<f64> = g.points.iter().map(|p| p.latitude).collect();
            let text: Vec<&str> = g.points.iter().map(|p| p.name.as_str()).collect();
            let customdata: Vec<Value> = g
                .points
                .iter()
                .map(|p| json!([p.ranking, p.state]))
                .collect();

            json!({
                "type": "scattergeo",
                "locationmode": "USA-states",
                "lon": lon,
                "lat": lat,
                "text": text,
                "customdata": customdata,
                "mode": "markers+text",
                "textposition": "top center",
                "name": g.category,
                "marker": {
                    "size": g.size,
                    "color": g.color,
                    "opacity": 0.8,
                    "line": { "width": 0.5, "color": "black" }
                },
                "hovertemplate": "<b>Name:</b> %{text}<br><b>Ranking:</b> %{customdata[0]}<br><b>State:</b> %{customdata[1]}<br><extra></extra>"
            })
        })
        .collect();

    json!({
        "data": traces,
        "layout": {
            "title": { "text": layout.title, "x": 0.5 },
            "geo": {
                "scope": "usa",
                "showland": true,
                "landcolor": layout.land_color,
                "showcountries": true,
                "countrycolor": layout.country_color,
                "showocean": true,
                "oceancolor": layout.ocean_color
            },
            "legend": { "title": { "text": layout.legend_title } }
        }
    })
}

pub fn to_geojson(groups: &[PointGroup]) -> FeatureCollection {
    let features = groups
        .iter()
        .flat_map(|g| {
            g.points.iter().map(move |p| {
                let mut properties = JsonObject::new();
                properties.insert("name".to_string(), json!(p.name));
                properties.insert("state".to_string(), json!(p.state));
                properties.insert("portfolio".to_string(), json!(p.portfolio));
                properties.insert("ranking".to_string(), json!(p.ranking));
                properties.insert("category".to_string(), json!(g.category));
                properties.insert("color".to_string(), json!(g.color));
                properties.insert("size".to_string(), json!(g.size));

                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(geojson::Value::Point(vec![
                        p.longitude,
                        p.latitude,
                    ]))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::prepare;
    use crate::style::StyleTable;
    use crate::types::Record;

    const LEGEND: [&str; 12] = [
        "Fungicide (Ranking 3)", "Fungicide (Ranking 2)", "Fungicide (Ranking 1)",
        "Herbicide (Ranking 3)", "Herbicide (Ranking 2)", "Herbicide (Ranking 1)",
        "Insecticide (Ranking 3)", "Insecticide (Ranking 2)", "Insecticide (Ranking 1)",
        "Nematicide (Ranking 3)", "Nematicide (Ranking 2)", "Nematicide (Ranking 1)",
    ];

    fn record(name: &str, portfolio: &str, ranking: i64) -> Record {
        Record {
            name: name.to_string(),
            portfolio: portfolio.to_string(),
            ranking,
            state: "KS".to_string(),
            latitude: 38.0,
            longitude: -97.0,
        }
    }

    fn table() -> PreparedTable {
        prepare(
            vec![
                record("n", "Nematicide", 1),
                record("h", "Herbicide", 2),
                record("f3", "Fungicide", 3),
                record("f1", "Fungicide", 1),
                record("i", "Insecticide", 3),
                record("f3b", "Fungicide", 3),
                record("seed", "Seed", 3),
            ],
            StyleTable::default(),
            0.2,
        )
    }

    fn selection(portfolios: &[&str], rankings: &[i64]) -> Selection {
        Selection {
            portfolios: portfolios.iter().map(|p| p.to_string()).collect(),
            rankings: rankings.iter().copied().collect(),
        }
    }

    fn member_names(groups: &[PointGroup]) -> Vec<&str> {
        groups
            .iter()
            .flat_map(|g| g.points.iter().map(|p| p.name.as_str()))
            .collect()
    }

    #[test]
    fn filters_with_and_semantics() {
        let groups = render(&table(), &selection(&["Fungicide"], &[3]));
        assert_eq!(member_names(&groups), ["f3", "f3b"]);
        assert!(groups
            .iter()
            .flat_map(|g| &g.points)
            .all(|p| p.portfolio == "Fungicide" && p.ranking == 3));
    }

    #[test]
    fn empty_selection_renders_empty_groups() {
        let table = table();
        let groups = render(&table, &selection(&[], &[1, 2, 3]));
        assert_eq!(groups.len(), 12);
        assert!(member_names(&groups).is_empty());

        let groups = render(&table, &selection(&["Fungicide"], &[]));
        assert!(member_names(&groups).is_empty());

        let groups = render(&table, &selection(&["Rodenticide"], &[7]));
        assert!(member_names(&groups).is_empty());
    }

    #[test]
    fn groups_follow_legend_order_for_any_selection() {
        let table = table();
        for sel in [
            Selection::all(&table),
            selection(&["Nematicide", "Herbicide"], &[1, 2]),
            selection(&[], &[]),
        ] {
            let labels: Vec<String> = render(&table, &sel).into_iter().map(|g| g.category).collect();
            assert_eq!(labels, LEGEND);
        }
    }

    #[test]
    fn default_selection_keeps_every_listed_record() {
        let table = table();
        let groups = render(&table, &Selection::all(&table));
        assert_eq!(member_names(&groups), ["f3", "f3b", "f1", "h", "i", "n"]);

        let herbicide = &groups[4];
        assert_eq!(herbicide.color, "red");
        assert_eq!(herbicide.size, 15);
    }

    #[test]
    fn figure_has_a_trace_per_group() {
        let table = table();
        let groups = render(&table, &selection(&["Fungicide"], &[3]));
        let figure = build_figure(&groups, &LayoutConfig::default());

        let traces = figure["data"].as_array().unwrap();
        assert_eq!(traces.len(), 12);
        assert_eq!(traces[0]["name"], "Fungicide (Ranking 3)");
        assert_eq!(traces[0]["marker"]["color"], "darkgreen");
        assert_eq!(traces[0]["marker"]["size"], 20);
        assert_eq!(traces[0]["text"], json!(["f3", "f3b"]));
        assert_eq!(traces[0]["customdata"][0], json!([3, "KS"]));
        assert_eq!(traces[1]["lat"], json!([]));
        assert_eq!(figure["layout"]["geo"]["scope"], "usa");
        assert_eq!(figure["layout"]["legend"]["title"]["text"], "Portfolio and Ranking");
    }

    #[test]
    fn geojson_carries_offset_points() {
        let table = table();
        let groups = render(&table, &selection(&["Fungicide"], &[3]));
        let collection = to_geojson(&groups);
        assert_eq!(collection.features.len(), 2);

        let second = &collection.features[1];
        assert_eq!(second.property("name"), Some(&json!("f3b")));
        assert_eq!(second.property("category"), Some(&json!("Fungicide (Ranking 3)")));
        match &second.geometry.as_ref().unwrap().value {
            geojson::Value::Point(coords) => {
                // different names at one site are not stacked
                assert_eq!(coords, &vec![-97.0, 38.0]);
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }
}
