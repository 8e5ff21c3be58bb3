use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use broker::error::{Error as BrokerError, ErrorKind};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(BrokerError);

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.0.error_kind
    }

    fn status_code(&self) -> StatusCode {
        match self.0.error_kind {
            ErrorKind::Identity | ErrorKind::AuthMismatch => StatusCode::UNAUTHORIZED,
            ErrorKind::DuplicateConnection => StatusCode::FORBIDDEN,
            ErrorKind::Transport | ErrorKind::NotInitialized => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }

        let body = match self.0.error_kind {
            ErrorKind::AuthMismatch => "401: Incorrect app ID",
            ErrorKind::DuplicateConnection => "403: Connection exists for app ID",
            ErrorKind::NotInitialized => "500: Broker not initialized",
            _ => status.canonical_reason().unwrap_or("ERROR"),
        };

        (status, body).into_response()
    }
}

impl<E> From<E> for Error
where
    E: Into<BrokerError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
