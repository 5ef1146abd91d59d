use crate::config::AppConfig;
use crate::processing::PreparedTable;
use crate::render::{build_figure, render, to_geojson, Selection};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info};

// Wrapper for RTree indexing
pub struct RecordIndex {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for RecordIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for RecordIndex {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

pub struct AppState {
    pub table: PreparedTable,
    pub tree: RTree<RecordIndex>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, table: PreparedTable) -> Self {
        let tree_items: Vec<RecordIndex> = table.records.iter().enumerate()
            .map(|(index, r)| RecordIndex {
                index,
                position: [r.longitude(), r.latitude()],
            })
            .collect();
        let tree = RTree::bulk_load(tree_items);
        Self { table, tree, config }
    }
}

/// Comma-separated filter values. An absent parameter selects everything.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    portfolios: Option<String>,
    rankings: Option<String>,
}

impl FilterParams {
    fn selection(&self, table: &PreparedTable) -> Result<Selection, String> {
        let mut selection = Selection::all(table);
        if let Some(raw) = &self.portfolios {
            selection.portfolios = split_list(raw).map(str::to_string).collect();
        }
        if let Some(raw) = &self.rankings {
            selection.rankings = split_list(raw)
                .map(|token| {
                    token.parse::<i64>()
                        .map_err(|_| format!("Invalid ranking '{}'", token))
                })
                .collect::<Result<_, _>>()?;
        }
        Ok(selection)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Deserialize)]
pub struct NearestParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
pub struct NearestResponse {
    name: String,
    portfolio: String,
    ranking: i64,
    state: String,
    category: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize)]
pub struct OptionsResponse {
    heading: String,
    portfolios: Vec<String>,
    rankings: Vec<i64>,
}

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, String)>;

pub fn router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/api/options", get(options_handler))
        .route("/api/figure", get(figure_handler))
        .route("/api/points", get(points_handler))
        .route("/api/nearest", get(nearest_handler))
        .fallback_service(static_service)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, table: PreparedTable) -> Result<()> {
    info!("Building spatial index for API...");
    let state = Arc::new(AppState::new(config.clone(), table));

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn options_handler(State(state): State<Arc<AppState>>) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        heading: state.config.layout.heading.clone(),
        portfolios: state.table.portfolios(),
        rankings: state.table.rankings(),
    })
}

async fn figure_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> ApiResult<Value> {
    let selection = params.selection(&state.table)
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    debug!(?selection, "Rendering figure");

    let groups = render(&state.table, &selection);
    Ok(Json(build_figure(&groups, &state.config.layout)))
}

async fn points_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> ApiResult<geojson::FeatureCollection> {
    let selection = params.selection(&state.table)
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let groups = render(&state.table, &selection);
    Ok(Json(to_geojson(&groups)))
}

/// Closest record currently drawn on the map, honoring the same filters as `/api/figure`.
async fn nearest_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearestParams>,
    Query(filters): Query<FilterParams>,
) -> ApiResult<Option<NearestResponse>> {
    let selection = filters.selection(&state.table)
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let nearest = state.tree.nearest_neighbor_iter(&[params.lon, params.lat])
        .filter_map(|candidate| state.table.records.get(candidate.index))
        .find(|r| selection.shows(r));

    Ok(Json(nearest.map(|r| NearestResponse {
        name: r.record.name.clone(),
        portfolio: r.record.portfolio.clone(),
        ranking: r.record.ranking,
        state: r.record.state.clone(),
        category: r.category.clone(),
        latitude: r.latitude(),
        longitude: r.longitude(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InputConfig, LayoutConfig, ProcessingConfig, ServerConfig};
    use crate::processing::prepare;
    use crate::style::StyleTable;
    use crate::types::Record;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn record(name: &str, portfolio: &str, ranking: i64, lat: f64, lon: f64) -> Record {
        Record {
            name: name.to_string(),
            portfolio: portfolio.to_string(),
            ranking,
            state: "MO".to_string(),
            latitude: lat,
            longitude: lon,
        }
    }

    fn app() -> Router {
        let config = AppConfig {
            input: InputConfig {
                path: "unused.csv".into(),
                sheet: "data".to_string(),
                ranking_header: "Ranking".to_string(),
            },
            processing: ProcessingConfig::default(),
            layout: LayoutConfig::default(),
            server: ServerConfig::default(),
        };
        let table = prepare(
            vec![
                record("Acme", "Herbicide", 2, 40.0, -90.0),
                record("Acme", "Herbicide", 1, 40.0, -90.0),
                record("Delta", "Fungicide", 3, 33.0, -112.0),
                record("Hidden", "Seed", 3, 40.19, -90.21),
            ],
            StyleTable::default(),
            0.2,
        );
        router(Arc::new(AppState::new(config, table)))
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn names_in(figure: &Value) -> Vec<String> {
        figure["data"]
            .as_array()
            .unwrap()
            .iter()
            .flat_map(|t| t["text"].as_array().unwrap().clone())
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn options_list_table_values() {
        let (status, body) = get_json("/api/options").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["portfolios"], serde_json::json!(["Fungicide", "Herbicide", "Seed"]));
        assert_eq!(body["rankings"], serde_json::json!([3, 2, 1]));
    }

    #[tokio::test]
    async fn figure_defaults_to_everything() {
        let (status, body) = get_json("/api/figure").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 12);
        assert_eq!(names_in(&body), ["Delta", "Acme", "Acme"]);
    }

    #[tokio::test]
    async fn figure_applies_filters() {
        let (_, body) = get_json("/api/figure?portfolios=Herbicide&rankings=1,3").await;
        assert_eq!(names_in(&body), ["Acme"]);
        let trace = &body["data"][5];
        assert_eq!(trace["name"], "Herbicide (Ranking 1)");
        assert_eq!(trace["marker"]["color"], "lightcoral");

        let (_, body) = get_json("/api/figure?portfolios=&rankings=1,2,3").await;
        assert!(names_in(&body).is_empty());
    }

    #[tokio::test]
    async fn bad_ranking_is_rejected() {
        let (status, _) = get_json("/api/figure?rankings=top").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn points_are_geojson() {
        let (status, body) = get_json("/api/points?rankings=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"].as_array().unwrap().len(), 1);
        assert_eq!(body["features"][0]["properties"]["name"], "Delta");
    }

    #[tokio::test]
    async fn nearest_finds_offset_duplicate() {
        let (status, body) = get_json("/api/nearest?lat=40.19&lon=-90.21").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Acme");
        assert_eq!(body["ranking"], 1);
        assert_eq!(body["category"], "Herbicide (Ranking 1)");
    }

    #[tokio::test]
    async fn nearest_skips_records_the_map_hides() {
        let (_, body) = get_json("/api/nearest?lat=40.19&lon=-90.21&rankings=2").await;
        assert_eq!(body["name"], "Acme");
        assert_eq!(body["ranking"], 2);

        let (_, body) = get_json("/api/nearest?lat=40.19&lon=-90.21&portfolios=Fungicide").await;
        assert_eq!(body["name"], "Delta");

        let (status, body) = get_json("/api/nearest?lat=40.19&lon=-90.21&portfolios=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
    }
}
