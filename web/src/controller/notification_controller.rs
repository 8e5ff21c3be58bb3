use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::ApiResponse;
use crate::extractors::authenticated_peer::AuthenticatedPeer;
use crate::{AppState, Error};
use broker::dispatch::DeliveryReport;
use broker::message::NotificationFromProducer;
use log::*;

/// POST publish a notification to every subscribed consumer
///
/// The producer is named by its own identity, which must read `namespace:id`.
/// Delivery is best effort; the report lists who got it and who did not.
#[utoipa::path(
    post,
    path = "/notifications",
    request_body = NotificationFromProducer,
    responses(
        (status = 200, description = "Notification fanned out to its subscribers", body = DeliveryReport),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Producer identity or notification is malformed"),
        (status = 500, description = "Broker not initialized")
    ),
    security(
        ("peer_certificate" = [])
    )
)]
pub async fn publish(
    AuthenticatedPeer(identity): AuthenticatedPeer,
    State(app_state): State<AppState>,
    Json(notification): Json<NotificationFromProducer>,
) -> Result<impl IntoResponse, Error> {
    let producer = identity.urn()?;
    debug!(
        "POST notification {} {} from {producer}",
        notification.name, notification.version
    );

    let report = app_state
        .broker_ref()
        .dispatch(&producer, &notification)
        .await?;

    if !report.failed.is_empty() {
        info!(
            "Notification {} from {producer} missed {} of {} subscribers",
            notification.name,
            report.failed.len(),
            report.attempted()
        );
    }

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), report)))
}
