use async_trait::async_trait;
use axum::Router;

use crate::settings::Settings;

/// What a module sees of the application while it boots
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
}

/// A self-contained slice of the API: its routes, its OpenAPI fragment and
/// its lifecycle hooks
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name; also the mount point under `/api`
    fn name(&self) -> &'static str;

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes mounted under `/api/{name}`, with state and any per-module
    /// middleware already applied
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment with `paths` relative to the mount point and
    /// optional `components.schemas`
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Called once every module has initialized
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called on shutdown, in reverse registration order
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
