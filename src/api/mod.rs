mod costs;
pub mod error;

pub use error::{ApiError, ErrorCode};

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Cost reports
    let cost_routes = Router::new()
        .route(
            "/api/:version/costs/aws/total/:start_date/:end_date",
            get(costs::get_total),
        )
        .route(
            "/api/:version/costs/aws/recent/:view/:interval",
            get(costs::get_recent),
        )
        .route(
            "/api/:version/costs/aws/billing-range",
            get(costs::get_billing_range),
        )
        .route(
            "/api/:version/costs/aws/:view/:start_date/:end_date/:interval",
            get(costs::get_view),
        );

    Router::new()
        .route("/health", get(health_check))
        .merge(cost_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
