use std::collections::HashMap;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use shelf_authz::Caller;
use shelf_http::error::AppError;

use super::models::{Book, BookDetail, BookDraft};
use crate::response::{json_body, query_params, Envelope};
use crate::state::AppState;

/// GET /api/books
pub async fn list_books(
    State(state): State<AppState>,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Envelope<Vec<serde_json::Value>>>, AppError> {
    let list = state.books.list(&query_params(params)?).await?;
    let count = list.items.len();

    Ok(Json(
        Envelope::ok(list.items)
            .with_count(count)
            .paginated(list.total, list.pagination),
    ))
}

/// GET /api/books/{id}
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Envelope<BookDetail>>, AppError> {
    let detail = state.books.get(&id, &query_params(params)?).await?;
    Ok(Json(Envelope::ok(detail)))
}

/// POST /api/books
pub async fn create_book(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<BookDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Book>>), AppError> {
    let book = state.books.create(&caller, json_body(body)?).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(book))))
}

/// DELETE /api/books/{id}
pub async fn delete_book(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Envelope<serde_json::Value>>, AppError> {
    state.books.delete(&caller, &id).await?;
    Ok(Json(Envelope::empty()))
}
