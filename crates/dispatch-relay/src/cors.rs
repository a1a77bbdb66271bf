//! Cross-origin headers on every response, errors and preflights included.

use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, VARY,
        },
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const ALLOW_METHODS: &str = "GET,POST,OPTIONS";
pub const ALLOW_HEADERS: &str = "content-type,authorization";

#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    origin: Option<HeaderValue>,
}

impl CorsPolicy {
    pub fn new(origin: Option<&str>) -> anyhow::Result<Self> {
        let origin = origin
            .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {o:?}")))
            .transpose()?;
        Ok(Self { origin })
    }

    /// The configured origin, else the request's `Origin`, else `*`.
    pub fn allow_origin(&self, request_origin: Option<&HeaderValue>) -> HeaderValue {
        self.origin
            .as_ref()
            .or(request_origin)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("*"))
    }

    fn apply(&self, request_origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin(request_origin));
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        if self.origin.is_none() {
            headers.append(VARY, HeaderValue::from_static("origin"));
        }
    }
}

/// Answers every `OPTIONS` with 204 and adds the headers to all other
/// responses.
pub async fn cors(State(policy): State<CorsPolicy>, req: Request, next: Next) -> Response {
    let origin = req.headers().get(ORIGIN).cloned();
    let mut resp = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    policy.apply(origin.as_ref(), resp.headers_mut());
    resp
}
