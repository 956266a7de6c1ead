pub mod models;
pub mod routes;
pub mod service;

use async_trait::async_trait;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use serde_json::json;
use shelf_kernel::{InitCtx, Module};

use crate::modules::reviews;
use crate::state::AppState;

/// Book catalogue: listing, lookup, creation and deletion
pub struct BooksModule {
    state: AppState,
}

impl BooksModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            default_limit = ctx.settings.pagination.default_limit,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(routes::list_books).post(routes::create_book))
            .route("/{id}", get(routes::get_book).delete(routes::delete_book))
            .route("/{id}/reviews", post(reviews::routes::add_review))
            .layer(middleware::from_fn_with_state(
                self.state.identity.clone(),
                shelf_authz::authenticate,
            ))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let id_param = json!({
            "name": "id",
            "in": "path",
            "required": true,
            "schema": { "type": "string" }
        });
        let page_params = json!([
            { "name": "page", "in": "query", "schema": { "type": "integer", "minimum": 1, "default": 1 } },
            { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1, "default": 10 } }
        ]);

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "description": "Any book field may be used as a filter, with `field[gt|gte|lt|lte|in]` for comparisons.",
                        "tags": ["Books"],
                        "parameters": [
                            { "name": "select", "in": "query", "schema": { "type": "string" } },
                            { "name": "sort", "in": "query", "schema": { "type": "string", "default": "-createdAt" } },
                            page_params[0],
                            page_params[1]
                        ],
                        "responses": {
                            "200": {
                                "description": "One page of books",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/BookList" }
                                    }
                                }
                            },
                            "400": error("Unknown field, operator or value")
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreateBook" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Book created",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": error("Validation failed"),
                            "401": error("Not authenticated")
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book with its reviews",
                        "tags": ["Books"],
                        "parameters": [id_param, page_params[0], page_params[1]],
                        "responses": {
                            "200": { "description": "Book, live average rating and one page of reviews" },
                            "404": error("Book not found")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book and its reviews",
                        "tags": ["Books"],
                        "security": [{ "bearer": [] }],
                        "parameters": [id_param],
                        "responses": {
                            "200": { "description": "Book deleted" },
                            "401": error("Not authenticated or not the owner"),
                            "404": error("Book not found")
                        }
                    }
                },
                "/{id}/reviews": {
                    "post": {
                        "summary": "Review a book",
                        "tags": ["Reviews"],
                        "security": [{ "bearer": [] }],
                        "parameters": [id_param],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ReviewInput" }
                                }
                            }
                        },
                        "responses": {
                            "201": { "description": "Review created" },
                            "400": error("Validation failed or already reviewed"),
                            "401": error("Not authenticated"),
                            "404": error("Book not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string", "maxLength": 100 },
                            "author": { "type": "string" },
                            "genre": { "$ref": "#/components/schemas/Genre" },
                            "description": { "type": "string" },
                            "publishedYear": { "type": "integer" },
                            "isbn": { "type": "string" },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "user": { "type": "string", "description": "Id of the owning user" },
                            "averageRating": { "type": "number" }
                        },
                        "required": ["id", "title", "author", "genre", "description", "createdAt", "user", "averageRating"]
                    },
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "maxLength": 100 },
                            "author": { "type": "string" },
                            "genre": { "$ref": "#/components/schemas/Genre" },
                            "description": { "type": "string" },
                            "publishedYear": { "type": "integer" },
                            "isbn": { "type": "string" }
                        },
                        "required": ["title", "author", "genre", "description"]
                    },
                    "BookList": {
                        "type": "object",
                        "properties": {
                            "success": { "type": "boolean" },
                            "count": { "type": "integer" },
                            "total": { "type": "integer" },
                            "pagination": { "type": "object" },
                            "data": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/Book" }
                            }
                        }
                    },
                    "Genre": {
                        "type": "string",
                        "enum": models::Genre::ALL.iter().map(|g| g.label()).collect::<Vec<_>>()
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module(state: AppState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new(state))
}
