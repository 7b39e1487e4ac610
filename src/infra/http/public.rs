//! Public listener: sitemap documents, the stylesheet and redirect rules in
//! front of the host site.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        HeaderValue, Method, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION},
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use crate::application::{
    dispatch::{DispatchOutcome, Dispatcher},
    error::{ErrorReport, HttpError},
    sitemap::STYLESHEET,
};
use crate::domain::types::RedirectType;

use super::middleware::{log_responses, set_request_context};

const XML_CONTENT_TYPE: &str = "text/xml; charset=UTF-8";
const XSL_CONTENT_TYPE: &str = "text/xsl; charset=UTF-8";

#[derive(Clone)]
pub struct HttpState {
    pub dispatcher: Arc<Dispatcher>,
    pub stylesheet_max_age: Duration,
}

/// Everything the dispatcher passes through lands on the fallback, which
/// stands in for the host site's own content handling.
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state, dispatch_public))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn dispatch_public(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    match state.dispatcher.dispatch(&path).await {
        Ok(DispatchOutcome::PassThrough) => next.run(request).await,
        Ok(DispatchOutcome::Sitemap(body)) => xml_response(body.to_string()),
        Ok(DispatchOutcome::Stylesheet) => stylesheet_response(state.stylesheet_max_age),
        Ok(DispatchOutcome::Redirect { location, kind }) => redirect_response(&location, kind),
        Ok(DispatchOutcome::NotFound) => {
            let mut response = not_found_response();
            ErrorReport::from_message(
                "infra::http::public::dispatch",
                StatusCode::NOT_FOUND,
                format!("sitemap document `{path}` is disabled or unknown"),
            )
            .attach(&mut response);
            response
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn not_found() -> Response {
    not_found_response()
}

fn not_found_response() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn xml_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE))],
        body,
    )
        .into_response()
}

fn stylesheet_response(max_age: Duration) -> Response {
    let mut response = (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static(XSL_CONTENT_TYPE))],
        STYLESHEET,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age.as_secs())) {
        response.headers_mut().insert(CACHE_CONTROL, value);
    }
    response
}

fn redirect_response(location: &str, kind: RedirectType) -> Response {
    let status = match kind {
        RedirectType::Permanent => StatusCode::MOVED_PERMANENTLY,
        RedirectType::Found => StatusCode::FOUND,
    };
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(LOCATION, value)]).into_response(),
        Err(err) => HttpError::new(
            "infra::http::public::redirect",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid redirect target",
            format!("`{location}` is not a valid header value: {err}"),
        )
        .into_response(),
    }
}
