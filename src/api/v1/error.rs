use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(err) = err.find::<ApiErrorCode>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(err.clone(), err.to_string()));
        Ok(warp::reply::with_status(json, err.status()))
    } else if err.is_not_found() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::NotFound,
            ApiErrorCode::NotFound.to_string(),
        ));
        Ok(warp::reply::with_status(json, StatusCode::NOT_FOUND))
    } else {
        let json = warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiError {
                code: ApiErrorCode::InternalError,
                message: format!("Unhandled error: {:?}", err),
            }),
        });
        Ok(warp::reply::with_status(
            json,
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Sign in required")]
    AuthRequired,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Session is no longer valid: {0}")]
    SessionInvalid(String),
    #[error("Could not update bookmarks: {0}")]
    MutationFailed(String),
    #[error("Destructive action needs confirmation")]
    ConfirmationRequired,
    #[error("Not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::AuthRequired | ApiErrorCode::SessionInvalid(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiErrorCode::MutationFailed(_) => StatusCode::BAD_GATEWAY,
            ApiErrorCode::ConfirmationRequired => StatusCode::PRECONDITION_REQUIRED,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::AuthRequired => ApiErrorCode::AuthRequired,
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::SessionInvalid(e) => ApiErrorCode::SessionInvalid(e),
        }
    }
}

impl From<BookmarkError> for ApiErrorCode {
    fn from(error: BookmarkError) -> Self {
        match error {
            BookmarkError::AuthRequired => ApiErrorCode::AuthRequired,
            BookmarkError::SessionInvalid(e) => ApiErrorCode::SessionInvalid(e),
            BookmarkError::MutationFailed(e) => ApiErrorCode::MutationFailed(e),
            BookmarkError::ConfirmationRequired => ApiErrorCode::ConfirmationRequired,
            BookmarkError::FetchFailed(e) => ApiErrorCode::internal(e),
        }
    }
}
