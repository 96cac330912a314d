mod cache;
mod content;
mod health;
mod state;
mod templates;

pub use state::AdminState;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::middleware::{Surface, trace_requests};

/// JSON administration surface. Every write goes through the invalidation coordinator.
pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route(
            "/admin/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/admin/templates/validate",
            post(templates::validate_template),
        )
        .route(
            "/admin/templates/preview",
            post(templates::preview_template),
        )
        .route(
            "/admin/templates/{id}",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route(
            "/admin/templates/{id}/activate",
            post(templates::activate_template),
        )
        .route(
            "/admin/contents",
            get(content::list_contents).post(content::create_content),
        )
        .route(
            "/admin/contents/{id}",
            get(content::get_content)
                .put(content::update_content)
                .delete(content::delete_content),
        )
        .route("/admin/cache/purge", post(cache::purge_cache))
        .route("/admin/invalidations", get(cache::list_invalidations))
        .route("/_health/db", get(health::admin_health))
        .with_state(state)
        .layer(middleware::from_fn_with_state(Surface::Admin, trace_requests))
}
