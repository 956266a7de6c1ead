//! Shelf application library
//!
//! Books, reader reviews and the services behind the `/api` routes.

pub mod modules;
pub mod query;
pub mod rating;
pub mod response;
pub mod state;
pub mod store;
pub mod utils;

use axum::Router;
use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use state::AppState;

/// Registry holding every application module, wired to `state`.
pub fn build_registry(state: &AppState) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, state);
    registry
}

/// Full HTTP router for `state`, with middleware and API docs.
pub fn app_router(state: &AppState, settings: &Settings) -> Router {
    shelf_http::build_router(&build_registry(state), settings)
}

/// Run the API server until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let state = AppState::in_memory(&settings).await?;
    let registry = build_registry(&state);
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;
    tracing::info!(modules = registry.len(), "shelf modules started");

    let served = shelf_http::start_server(&registry, &settings).await;

    if let Err(err) = registry.stop_all().await {
        tracing::error!(error = %err, "module shutdown failed");
    }

    served
}
