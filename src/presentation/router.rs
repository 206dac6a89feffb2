// Route table
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_isu, get_isu_conditions, get_isu_graph, get_trend, health_check, list_isus,
    post_isu_condition,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/isu", get(list_isus))
        .route("/api/isu/:jia_isu_uuid", get(get_isu))
        .route("/api/isu/:jia_isu_uuid/graph", get(get_isu_graph))
        .route(
            "/api/condition/:jia_isu_uuid",
            get(get_isu_conditions).post(post_isu_condition),
        )
        .route("/api/trend", get(get_trend))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
