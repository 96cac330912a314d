use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{Path, State},
    http::{
        HeaderName, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::site::{ServedPage, SiteService},
    cache::PageKey,
    infra::db::PostgresRepositories,
};

use super::{
    db_health_response,
    middleware::{PageServed, Surface, trace_requests},
};

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Clone)]
pub struct HttpState {
    pub site: Arc<SiteService>,
    /// Advertised to clients as `max-age`.
    pub page_ttl: Duration,
    pub db: Option<Arc<PostgresRepositories>>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/_health/db", get(public_health))
        .route("/{slug}", get(page))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn_with_state(Surface::Public, trace_requests))
}

async fn index(State(state): State<HttpState>) -> Response {
    match state.site.homepage().await {
        Ok(served) => page_response(PageKey::Homepage, served, state.page_ttl),
        Err(err) => err.into_response(),
    }
}

async fn page(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    match state.site.page_by_slug(&slug).await {
        Ok(Some(served)) => page_response(PageKey::for_slug(&slug), served, state.page_ttl),
        Ok(None) => not_found().await,
        Err(err) => err.into_response(),
    }
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.as_ref()).await
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn page_response(page_key: PageKey, served: ServedPage, ttl: Duration) -> Response {
    let mut response = (StatusCode::OK, served.body).into_response();
    response.extensions_mut().insert(PageServed {
        page_key,
        origin: served.origin,
    });
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", ttl.as_secs())) {
        headers.insert(CACHE_CONTROL, value);
    }
    headers.insert(
        X_CACHE,
        HeaderValue::from_static(served.origin.as_header_value()),
    );
    response
}
