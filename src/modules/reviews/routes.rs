use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use shelf_authz::Caller;
use shelf_http::error::AppError;

use super::models::{Review, ReviewDraft};
use crate::response::{json_body, Envelope};
use crate::state::AppState;

/// POST /api/books/{id}/reviews
pub async fn add_review(
    State(state): State<AppState>,
    caller: Caller,
    Path(book_id): Path<String>,
    body: Result<Json<ReviewDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Review>>), AppError> {
    let review = state.reviews.add(&caller, &book_id, json_body(body)?).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(review))))
}

/// PUT /api/reviews/{id}
pub async fn update_review(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<ReviewDraft>, JsonRejection>,
) -> Result<Json<Envelope<Review>>, AppError> {
    let review = state.reviews.update(&caller, &id, json_body(body)?).await?;
    Ok(Json(Envelope::ok(review)))
}

/// DELETE /api/reviews/{id}
pub async fn delete_review(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Envelope<serde_json::Value>>, AppError> {
    state.reviews.delete(&caller, &id).await?;
    Ok(Json(Envelope::empty()))
}
