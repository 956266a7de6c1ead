pub mod books;
pub mod reviews;
pub mod search;

use shelf_kernel::ModuleRegistry;

use crate::state::AppState;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, state: &AppState) {
    registry.register(books::create_module(state.clone()));
    registry.register(reviews::create_module(state.clone()));
    registry.register(search::create_module(state.clone()));
}
