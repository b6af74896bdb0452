// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! HTTP error bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use buzz_core::BuzzError;
use buzz_proto::{ErrorBody, MessageBody};
use tracing::error;

/// Failure of a single request, rendered as a JSON body.
#[derive(Debug)]
pub(crate) enum ApiError {
    /// 400 with the validation message.
    BadRequest(String),
    /// 401; admin credential missing or wrong.
    Unauthorized,
    /// 404 for unknown routes.
    NotFound,
    /// 500 naming the failed operation plus the storage error.
    Storage {
        context: &'static str,
        error: String,
    },
    /// 500 without detail (panics, failed blocking tasks).
    Internal,
}

impl ApiError {
    /// Map an engine error raised while performing `context`.
    pub(crate) fn from_buzz(err: BuzzError, context: &'static str) -> Self {
        match err {
            BuzzError::Validation(v) => Self::BadRequest(v.to_string()),
            BuzzError::Storage(s) => {
                error!(err = %s, "{context}");
                Self::Storage {
                    context,
                    error: s.to_string(),
                }
            }
        }
    }
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (
        status,
        Json(MessageBody {
            message: text.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(text) => message(StatusCode::BAD_REQUEST, text),
            Self::Unauthorized => message(StatusCode::UNAUTHORIZED, "Unauthorized"),
            Self::NotFound => message(StatusCode::NOT_FOUND, "Not Found"),
            Self::Storage { context, error } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    message: context.to_string(),
                    error,
                }),
            )
                .into_response(),
            Self::Internal => message(StatusCode::INTERNAL_SERVER_ERROR, "Server Error"),
        }
    }
}
