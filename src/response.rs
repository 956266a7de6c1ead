//! Success envelope shared by every endpoint.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;
use serde::Serialize;
use shelf_http::error::AppError;

use crate::query::Pagination;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    /// Number of records in `data`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Number of records matching the request across all pages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            count: None,
            total: None,
            pagination: None,
            data,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn paginated(mut self, total: u64, pagination: Pagination) -> Self {
        self.total = Some(total);
        self.pagination = Some(pagination);
        self
    }
}

impl Envelope<serde_json::Value> {
    /// `data: {}`, returned by deletions.
    pub fn empty() -> Self {
        Self::ok(serde_json::json!({}))
    }
}

/// Unwrap a JSON body, reporting malformed input as a bad request.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// Unwrap query-string parameters, reporting undecodable input as a bad
/// request.
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}
