//! Pipeline endpoints

use axum::extract::State;
use axum::Json;
use tracing::info;

use super::middleware::RateLimited;
use super::state::AppState;
use super::types::{ApiError, ClassifyResponse, QueryBody, RetrieveResponse};
use crate::domain::PipelineResult;
use crate::infrastructure::text::truncate_text;

const LOG_PREVIEW_CHARS: usize = 50;

/// Run the full pipeline
pub async fn process(
    State(state): State<AppState>,
    limit: RateLimited,
    QueryBody(query): QueryBody,
) -> Result<Json<PipelineResult>, ApiError> {
    info!(
        client = %limit.client,
        query = %truncate_text(query.text(), LOG_PREVIEW_CHARS),
        "Processing query"
    );

    let result = state.pipeline.process_query(query).await?;
    Ok(Json(result))
}

/// Classification only
pub async fn classify(
    State(state): State<AppState>,
    _limit: RateLimited,
    QueryBody(query): QueryBody,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let classification = state.pipeline.classify_only(query.text()).await?;
    Ok(Json(ClassifyResponse { classification }))
}

/// Retrieval only, whatever the classifier would decide
pub async fn retrieve(
    State(state): State<AppState>,
    _limit: RateLimited,
    QueryBody(query): QueryBody,
) -> Result<Json<RetrieveResponse>, ApiError> {
    let docs = state.pipeline.retrieve_only(query.text()).await?;
    Ok(Json(RetrieveResponse::new(query.text(), docs)))
}
