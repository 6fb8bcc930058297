use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{internal_error, ApiError, AppState, ErrorBody};
use crate::models::*;
use crate::taxonomy::render_tree;

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Route not found")))
}

// ============================================================
// Taxonomy
// ============================================================

/// Optional filters for the taxonomy forest, using the ids published by
/// `/topics`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyQuery {
    pub topic_id: Option<String>,
    pub subtopic_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaxonomyResponse {
    pub status: String,
    pub data: Vec<TaxonomyNode>,
}

pub async fn get_taxonomy(
    State(state): State<AppState>,
    Query(query): Query<TaxonomyQuery>,
) -> Result<Json<TaxonomyResponse>, ApiError> {
    let taxonomy = state.load_taxonomy().await?;
    let data = taxonomy
        .forest
        .filter(query.topic_id.as_deref(), query.subtopic_id.as_deref())
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(TaxonomyResponse {
        status: "success".to_string(),
        data,
    }))
}

/// Plain-text rendering of the forest, marking answered questions.
pub async fn get_taxonomy_tree(
    State(state): State<AppState>,
    Query(query): Query<TaxonomyQuery>,
) -> Result<String, ApiError> {
    let taxonomy = state.load_taxonomy().await?;
    let roots: Vec<TaxonomyNode> = taxonomy
        .forest
        .filter(query.topic_id.as_deref(), query.subtopic_id.as_deref())
        .into_iter()
        .cloned()
        .collect();

    let mut ids = Vec::new();
    for root in &roots {
        root.walk(&mut |node| ids.push(node.id.as_str()));
    }
    let answers = state.answers.get_bulk(&ids).map_err(internal_error)?;

    Ok(render_tree(&roots, &answers))
}

pub async fn get_topics(
    State(state): State<AppState>,
) -> Result<Json<Vec<TopicSummary>>, ApiError> {
    let taxonomy = state.load_taxonomy().await?;
    Ok(Json(taxonomy.topics.clone()))
}

// ============================================================
// Answers
// ============================================================

pub async fn save_answer(
    State(state): State<AppState>,
    Json(input): Json<SaveAnswerInput>,
) -> Result<(StatusCode, Json<SaveAnswerResponse>), ApiError> {
    let (Some(node_id), Some(value)) = (input.node_id, input.value) else {
        return Err(ApiError::BadRequest(
            "nodeId and value are required".to_string(),
        ));
    };
    if node_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "nodeId and value are required".to_string(),
        ));
    }

    state
        .answers
        .save(&node_id, &value)
        .map_err(internal_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SaveAnswerResponse {
            message: "Answer saved successfully".to_string(),
            answer: Answer { node_id, value },
        }),
    ))
}

pub async fn get_answer(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<AnswerRecord>, ApiError> {
    state
        .answers
        .get_record(&node_id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Answer not found".to_string()))
}

/// Query parameters for fetching several answers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAnswersQuery {
    /// Comma-separated node ids.
    pub node_ids: Option<String>,
}

pub async fn get_answers(
    State(state): State<AppState>,
    Query(query): Query<GetAnswersQuery>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    let raw = query.node_ids.as_deref().unwrap_or_default();
    if raw.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "nodeIds query parameter is required".to_string(),
        ));
    }

    // A list of only separators is valid and matches nothing
    let node_ids: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect();

    state
        .answers
        .get_bulk(&node_ids)
        .map(Json)
        .map_err(internal_error)
}

pub async fn save_answers(
    State(state): State<AppState>,
    Json(input): Json<SaveAnswersInput>,
) -> Result<(StatusCode, Json<SaveAnswersResponse>), ApiError> {
    let Some(answers) = input.answers else {
        return Err(ApiError::BadRequest(
            "answers object is required".to_string(),
        ));
    };
    if answers.keys().any(|id| id.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "nodeId must not be empty".to_string(),
        ));
    }

    let count = state.answers.save_bulk(&answers).map_err(internal_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SaveAnswersResponse {
            message: "Answers saved successfully".to_string(),
            count,
        }),
    ))
}
