pub mod models;
pub mod routes;
pub mod service;

use async_trait::async_trait;
use axum::{middleware, routing::put, Router};
use serde_json::json;
use shelf_kernel::{InitCtx, Module};

use crate::state::AppState;

/// Editing and removal of existing reviews. Creation lives under
/// `/api/books/{id}/reviews`.
pub struct ReviewsModule {
    state: AppState,
}

impl ReviewsModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for ReviewsModule {
    fn name(&self) -> &'static str {
        "reviews"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "reviews module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route(
                "/{id}",
                put(routes::update_review).delete(routes::delete_review),
            )
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

        Some(json!({
            "paths": {
                "/{id}": {
                    "put": {
                        "summary": "Update your review",
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
                            "200": {
                                "description": "Review updated",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Review" }
                                    }
                                }
                            },
                            "400": error("Validation failed"),
                            "401": error("Not authenticated or not the author"),
                            "404": error("Review not found")
                        }
                    },
                    "delete": {
                        "summary": "Delete your review",
                        "tags": ["Reviews"],
                        "security": [{ "bearer": [] }],
                        "parameters": [id_param],
                        "responses": {
                            "200": { "description": "Review deleted" },
                            "401": error("Not authenticated or not the author"),
                            "404": error("Review not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Review": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "rating": { "type": "integer", "minimum": models::MIN_RATING, "maximum": models::MAX_RATING },
                            "title": { "type": "string" },
                            "text": { "type": "string" },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "book": { "type": "string" },
                            "user": { "type": "string" }
                        },
                        "required": ["id", "rating", "title", "text", "createdAt", "book", "user"]
                    },
                    "ReviewInput": {
                        "type": "object",
                        "properties": {
                            "rating": { "type": "integer", "minimum": models::MIN_RATING, "maximum": models::MAX_RATING },
                            "title": { "type": "string" },
                            "text": { "type": "string" }
                        }
                    }
                }
            }
        }))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "reviews module stopped");
        Ok(())
    }
}

/// Create a new instance of the reviews module
pub fn create_module(state: AppState) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(ReviewsModule::new(state))
}
