pub(crate) mod authenticated_peer;

use axum::http::StatusCode;

type RejectionType = (StatusCode, String);
