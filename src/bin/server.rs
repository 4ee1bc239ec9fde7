use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pricematch_engine::{
    error::MatchEngineError, percentage_difference, providers::marketplace::MarketplaceClient,
    quality_rating, similarity::IndelScorer, ComparisonEngine, ComparisonReport, FetchConfig,
    PriceDifference, TargetListing,
};

#[derive(Clone)]
struct AppState {
    engines: Arc<Engines>,
    listings: Arc<MarketplaceClient>,
}

/// One engine per scorer, sharing the same source configuration
struct Engines {
    gestalt: ComparisonEngine,
    indel: ComparisonEngine,
}

impl Engines {
    fn get(&self, scorer: &str) -> Result<&ComparisonEngine, AppError> {
        match scorer {
            "gestalt" => Ok(&self.gestalt),
            "indel" => Ok(&self.indel),
            other => Err(AppError(MatchEngineError::InvalidInput(format!(
                "unknown scorer '{}'",
                other
            )))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompareRequest {
    #[serde(flatten)]
    listing: TargetListing,
    #[serde(default = "default_scorer")]
    scorer: String,
}

#[derive(Debug, Deserialize)]
struct CompareUrlRequest {
    url: String,
    #[serde(default = "default_scorer")]
    scorer: String,
}

fn default_scorer() -> String {
    "gestalt".to_string()
}

#[derive(Debug, Deserialize)]
struct RatingRequest {
    initial_price: f64,
    final_price: f64,
    #[serde(default)]
    days_listed: i64,
}

#[derive(Debug, Serialize)]
struct RatingResponse {
    rating: f64,
}

#[derive(Debug, Deserialize)]
struct DifferenceRequest {
    list_price: f64,
    best_price: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pricematch_server=info,pricematch_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8090);

    let mut config = FetchConfig::default();
    if let Ok(base_url) = std::env::var("EBAY_BASE_URL") {
        config.base_url = base_url;
    }

    tracing::info!("🚀 Starting Pricematch Engine Server");
    tracing::info!("🛒 Source: {}", config.base_url);
    tracing::info!("🔌 Port: {}", port);

    let listings = MarketplaceClient::new(Duration::from_secs(config.timeout_secs))?;
    let gestalt = ComparisonEngine::with_ebay(config.clone())?;
    let indel = ComparisonEngine::with_ebay(config)?.with_scorer(Arc::new(IndelScorer::new()));

    let state = AppState {
        engines: Arc::new(Engines { gestalt, indel }),
        listings: Arc::new(listings),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/compare", post(compare_handler))
        .route("/v1/compare-url", post(compare_url_handler))
        .route("/v1/rating", post(rating_handler))
        .route("/v1/difference", post(difference_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("💸 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: pricematch_engine::VERSION.to_string(),
    })
}

async fn compare_handler(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<ComparisonReport>, AppError> {
    tracing::debug!("Compare request: {:?}", req);

    let engine = state.engines.get(&req.scorer)?;
    let report = engine.compare(&req.listing).await?;

    tracing::info!(
        "✅ {} → {} ({}%, {:.0}ms)",
        req.listing.title,
        report.best.title,
        report.best_score,
        report.latency_ms
    );

    Ok(Json(report))
}

async fn compare_url_handler(
    State(state): State<AppState>,
    Json(req): Json<CompareUrlRequest>,
) -> Result<Json<ComparisonReport>, AppError> {
    tracing::debug!("Compare URL request: {:?}", req);

    let engine = state.engines.get(&req.scorer)?;
    let report = engine.compare_url(&state.listings, &req.url).await?;

    tracing::info!(
        "✅ {} → {} ({}%, {:.0}ms)",
        req.url,
        report.best.title,
        report.best_score,
        report.latency_ms
    );

    Ok(Json(report))
}

async fn rating_handler(Json(req): Json<RatingRequest>) -> Result<Json<RatingResponse>, AppError> {
    let rating = quality_rating(req.initial_price, req.final_price, req.days_listed)?;
    Ok(Json(RatingResponse { rating }))
}

async fn difference_handler(
    Json(req): Json<DifferenceRequest>,
) -> Result<Json<PriceDifference>, AppError> {
    Ok(Json(percentage_difference(req.list_price, req.best_price)?))
}

// Error handling
struct AppError(MatchEngineError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_invalid_input() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_request_failed() {
            StatusCode::BAD_GATEWAY
        } else if matches!(self.0, MatchEngineError::NoViableCandidates(_)) {
            StatusCode::NOT_FOUND
        } else if matches!(self.0, MatchEngineError::ListingMissing(_)) {
            StatusCode::GONE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let message = self.0.to_string();

        tracing::error!("❌ Error: {} - {}", status, message);

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<MatchEngineError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
