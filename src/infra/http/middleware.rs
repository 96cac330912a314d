//! One log line per request for both routers.
//!
//! Handlers leave breadcrumbs in the response extensions: public pages a
//! [`PageServed`] naming the page key and whether the page cache answered,
//! failures an [`ErrorReport`]. This layer consumes them, so neither leaks
//! past the router.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::application::site::PageOrigin;
use crate::cache::PageKey;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Which listener a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Public,
    Admin,
}

impl Surface {
    fn as_str(self) -> &'static str {
        match self {
            Surface::Public => "public",
            Surface::Admin => "admin",
        }
    }
}

/// Attached by the public router to every page it serves.
#[derive(Debug, Clone)]
pub struct PageServed {
    pub page_key: PageKey,
    pub origin: PageOrigin,
}

pub async fn trace_requests(
    State(surface): State<Surface>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    let served = response.extensions_mut().remove::<PageServed>();
    let report = response.extensions_mut().remove::<ErrorReport>();

    if let Some(report) = report {
        let detail = report
            .messages
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available");
        if status.is_server_error() {
            error!(
                target = "vellum::http::response",
                surface = surface.as_str(),
                status = status.as_u16(),
                %method,
                %path,
                elapsed_ms,
                source = report.source,
                detail,
                chain = ?report.messages,
                request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "vellum::http::response",
                surface = surface.as_str(),
                status = status.as_u16(),
                %method,
                %path,
                elapsed_ms,
                source = report.source,
                detail,
                request_id,
                "client request error",
            );
        }
    } else if let Some(served) = served {
        debug!(
            target = "vellum::http::page",
            page_key = %served.page_key,
            cache = served.origin.as_header_value(),
            elapsed_ms,
            request_id,
            "page served",
        );
    } else {
        debug!(
            target = "vellum::http::response",
            surface = surface.as_str(),
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            request_id,
            "request completed",
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        http::StatusCode,
        middleware,
        response::{IntoResponse, Response},
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;

    async fn cached_page() -> Response {
        let mut response = "<p>hi</p>".into_response();
        response.extensions_mut().insert(PageServed {
            page_key: PageKey::for_slug("hello"),
            origin: PageOrigin::Cache,
        });
        response
    }

    async fn broken() -> Response {
        let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
        ErrorReport::from_message("test", StatusCode::SERVICE_UNAVAILABLE, "db down")
            .attach(&mut response);
        response
    }

    fn router() -> Router {
        Router::new()
            .route("/hello", get(cached_page))
            .route("/broken", get(broken))
            .layer(middleware::from_fn_with_state(Surface::Public, trace_requests))
    }

    async fn call(path: &str) -> Response {
        router()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn breadcrumbs_are_consumed_and_request_id_is_returned() {
        let page = call("/hello").await;
        assert_eq!(page.status(), StatusCode::OK);
        assert!(page.extensions().get::<PageServed>().is_none());
        let id = page.headers().get(X_REQUEST_ID).expect("request id header");
        assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());

        let failed = call("/broken").await;
        assert_eq!(failed.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(failed.extensions().get::<ErrorReport>().is_none());
        assert!(failed.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn each_request_gets_its_own_id() {
        let first = call("/hello").await;
        let second = call("/hello").await;
        assert_ne!(
            first.headers().get(X_REQUEST_ID),
            second.headers().get(X_REQUEST_ID)
        );
    }
}
