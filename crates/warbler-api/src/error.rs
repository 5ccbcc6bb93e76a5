use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::error;

use crate::flash::{Deferred, Flash};

const NOT_FOUND_PAGE: &str = include_str!("../templates/404.html");

/// Failures that end a request. Form validation problems are not errors;
/// those re-render the form with notices.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("access unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized => {
                let mut resp = Redirect::to("/").into_response();
                resp.extensions_mut()
                    .insert(Deferred(Flash::danger("Access unauthorized.")));
                resp
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response(),
            AppError::Internal(_) | AppError::Join(_) => {
                error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong.").into_response()
            }
        }
    }
}
