pub mod service;

use async_trait::async_trait;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use shelf_http::error::AppError;
use shelf_kernel::Module;

use crate::modules::books::models::Book;
use crate::response::{query_params, Envelope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// GET /api/search?query=
pub async fn search_books(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Envelope<Vec<Book>>>, AppError> {
    let params = query_params(params)?;
    let books = state.search.search(params.query.as_deref()).await?;
    let count = books.len();
    Ok(Json(Envelope::ok(books).with_count(count)))
}

/// Free-text lookup over titles and authors
pub struct SearchModule {
    state: AppState,
}

impl SearchModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for SearchModule {
    fn name(&self) -> &'static str {
        "search"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(search_books))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Search books by title or author",
                        "tags": ["Search"],
                        "parameters": [
                            {
                                "name": "query",
                                "in": "query",
                                "required": true,
                                "schema": { "type": "string" }
                            }
                        ],
                        "responses": {
                            "200": {
                                "description": "Matching books, newest first",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BookList" }
                                    }
                                }
                            },
                            "400": {
                                "description": "Missing query",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }))
    }
}

/// Create a new instance of the search module
pub fn create_module(state: AppState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(SearchModule::new(state))
}
