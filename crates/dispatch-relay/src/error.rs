use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dispatch_core::{ErrorBody, Procedure};
use thiserror::Error;
use tracing::warn;

use crate::rpc::RpcError;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("No row returned")]
    NotFound,

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("unexpected {procedure} result: {source}")]
    Shape {
        procedure: Procedure,
        #[source]
        source: serde_json::Error,
    },
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            RelayError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorBody::bad_request(*msg)),
            RelayError::NotFound => (StatusCode::NOT_FOUND, ErrorBody::not_found()),
            RelayError::Rpc(_) | RelayError::Shape { .. } => {
                warn!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::server_error(self.to_string()),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
