use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::extractors::authenticated_peer::AuthenticatedPeer;
use crate::{AppState, Error};
use broker::error::not_found_error;
use broker::model::{Service, ServiceList};
use log::*;

/// GET all registered producer services
#[utoipa::path(
    get,
    path = "/services",
    responses(
        (status = 200, description = "Successfully retrieved all registered services", body = ServiceList),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("peer_certificate" = [])
    )
)]
pub async fn index(
    AuthenticatedPeer(identity): AuthenticatedPeer,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET services for {identity}");

    let services = app_state.broker_ref().directory().list();

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), services)))
}

/// POST register (or update) the calling producer's service record
///
/// The record's URN is always the one derived from the caller's identity.
#[utoipa::path(
    post,
    path = "/services",
    request_body = Service,
    responses(
        (status = 200, description = "Service registered", body = Service),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Identity is not of the form namespace:id")
    ),
    security(
        ("peer_certificate" = [])
    )
)]
pub async fn register(
    AuthenticatedPeer(identity): AuthenticatedPeer,
    State(app_state): State<AppState>,
    Json(service): Json<Service>,
) -> Result<impl IntoResponse, Error> {
    let urn = identity.urn()?;
    debug!("POST register service {urn}");

    let service = app_state.broker_ref().directory().register(urn, service);

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), service)))
}

/// DELETE the calling producer's service record
#[utoipa::path(
    delete,
    path = "/services",
    responses(
        (status = 204, description = "Service deregistered"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No service registered for this identity"),
        (status = 422, description = "Identity is not of the form namespace:id")
    ),
    security(
        ("peer_certificate" = [])
    )
)]
pub async fn deregister(
    AuthenticatedPeer(identity): AuthenticatedPeer,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    let urn = identity.urn()?;
    debug!("DELETE service {urn}");

    if !app_state.broker_ref().directory().deregister(&urn) {
        return Err(not_found_error(&format!("No service registered for {urn}")).into());
    }

    Ok(StatusCode::NO_CONTENT)
}
