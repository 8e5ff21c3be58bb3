use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::extractors::authenticated_peer::AuthenticatedPeer;
use crate::{AppState, Error};
use broker::error::invalid_error;
use broker::model::{Subscription, SubscriptionList};
use log::*;

/// A body URN, when present, has to name the same target as the path.
fn check_target(
    subscription: &Subscription,
    namespace: &str,
    service_id: Option<&str>,
) -> Result<(), Error> {
    if let Some(urn) = &subscription.urn {
        let id_matches = service_id.map_or(urn.id.is_empty(), |id| urn.id == id);
        if urn.namespace != namespace || !id_matches {
            return Err(invalid_error(&format!(
                "Subscription URN {urn} does not match the requested target"
            ))
            .into());
        }
    }
    Ok(())
}

/// GET all subscriptions held by the calling consumer
#[utoipa::path(
    get,
    path = "/subscriptions",
    responses(
        (status = 200, description = "Successfully retrieved the caller's subscriptions", body = SubscriptionList),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Broker not initialized")
    ),
    security(
        ("peer_certificate" = [])
    )
)]
pub async fn index(
    AuthenticatedPeer(identity): AuthenticatedPeer,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET subscriptions of {identity}");

    let subscriptions = app_state
        .broker_ref()
        .subscription_handler()
        .subscriptions_of(&identity)?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), subscriptions)))
}

/// POST subscribe to notifications from any service in a namespace
#[utoipa::path(
    post,
    path = "/subscriptions/{namespace}",
    params(
        ("namespace" = String, Path, description = "Namespace whose services the caller subscribes to"),
    ),
    request_body = Subscription,
    responses(
        (status = 200, description = "Subscribed; returns the caller's subscriptions", body = SubscriptionList),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 500, description = "Broker not initialized")
    ),
    security(
        ("peer_certificate" = [])
    )
)]
pub async fn subscribe_to_namespace(
    AuthenticatedPeer(identity): AuthenticatedPeer,
    State(app_state): State<AppState>,
    Path(namespace): Path<String>,
    Json(subscription): Json<Subscription>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST subscribe {identity} to namespace {namespace}: {subscription:?}");
    check_target(&subscription, &namespace, None)?;

    let handler = app_state.broker_ref().subscription_handler();
    handler.subscribe_to_namespace(&identity, &namespace, &subscription.notifications)?;
    let subscriptions = handler.subscriptions_of(&identity)?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), subscriptions)))
}

/// POST subscribe to notifications from one specific service
#[utoipa::path(
    post,
    path = "/subscriptions/{namespace}/{service_id}",
    params(
        ("namespace" = String, Path, description = "Namespace of the producing service"),
        ("service_id" = String, Path, description = "Id of the producing service"),
    ),
    request_body = Subscription,
    responses(
        (status = 200, description = "Subscribed; returns the caller's subscriptions", body = SubscriptionList),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 500, description = "Broker not initialized")
    ),
    security(
        ("peer_certificate" = [])
    )
)]
pub async fn subscribe_to_service(
    AuthenticatedPeer(identity): AuthenticatedPeer,
    State(app_state): State<AppState>,
    Path((namespace, service_id)): Path<(String, String)>,
    Json(subscription): Json<Subscription>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST subscribe {identity} to {namespace}:{service_id}: {subscription:?}");
    check_target(&subscription, &namespace, Some(&service_id))?;

    let handler = app_state.broker_ref().subscription_handler();
    handler.subscribe_to_service(
        &identity,
        &namespace,
        &service_id,
        &subscription.notifications,
    )?;
    let subscriptions = handler.subscriptions_of(&identity)?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), subscriptions)))
}

/// DELETE namespace-wide subscriptions
#[utoipa::path(
    delete,
    path = "/subscriptions/{namespace}",
    params(
        ("namespace" = String, Path, description = "Namespace to unsubscribe from"),
    ),
    request_body = Subscription,
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 500, description = "Broker not initialized")
    ),
    security(
        ("peer_certificate" = [])
    )
)]
pub async fn unsubscribe_from_namespace(
    AuthenticatedPeer(identity): AuthenticatedPeer,
    State(app_state): State<AppState>,
    Path(namespace): Path<String>,
    Json(subscription): Json<Subscription>,
) -> Result<impl IntoResponse, Error> {
    debug!("DELETE subscription of {identity} to namespace {namespace}");
    check_target(&subscription, &namespace, None)?;

    app_state
        .broker_ref()
        .subscription_handler()
        .unsubscribe_from_namespace(&identity, &namespace, &subscription.notifications)?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE service-scoped subscriptions
#[utoipa::path(
    delete,
    path = "/subscriptions/{namespace}/{service_id}",
    params(
        ("namespace" = String, Path, description = "Namespace of the producing service"),
        ("service_id" = String, Path, description = "Id of the producing service"),
    ),
    request_body = Subscription,
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 500, description = "Broker not initialized")
    ),
    security(
        ("peer_certificate" = [])
    )
)]
pub async fn unsubscribe_from_service(
    AuthenticatedPeer(identity): AuthenticatedPeer,
    State(app_state): State<AppState>,
    Path((namespace, service_id)): Path<(String, String)>,
    Json(subscription): Json<Subscription>,
) -> Result<impl IntoResponse, Error> {
    debug!("DELETE subscription of {identity} to {namespace}:{service_id}");
    check_target(&subscription, &namespace, Some(&service_id))?;

    app_state
        .broker_ref()
        .subscription_handler()
        .unsubscribe_from_service(
            &identity,
            &namespace,
            &service_id,
            &subscription.notifications,
        )?;

    Ok(StatusCode::NO_CONTENT)
}
