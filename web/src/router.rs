use crate::{
    controller::{
        health_check_controller, notification_controller, service_controller,
        subscription_controller,
    },
    middleware::peer_identity::forward_peer_identity,
    socket::handler as socket_handler,
    AppState,
};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Edge Notification Broker API"
        ),
        paths(
            health_check_controller::health_check,
            socket_handler::socket_handler,
            notification_controller::publish,
            subscription_controller::index,
            subscription_controller::subscribe_to_namespace,
            subscription_controller::subscribe_to_service,
            subscription_controller::unsubscribe_from_namespace,
            subscription_controller::unsubscribe_from_service,
            service_controller::index,
            service_controller::register,
            service_controller::deregister,
        ),
        components(
            schemas(
                broker::identity::Identity,
                broker::model::Urn,
                broker::model::NotificationDescriptor,
                broker::model::Service,
                broker::model::ServiceList,
                broker::model::Subscription,
                broker::model::SubscriptionList,
                broker::message::NotificationFromProducer,
                broker::message::NotificationToConsumer,
                broker::dispatch::DeliveryReport,
                broker::dispatch::DeliveryFailure,
                broker::dispatch::FailureReason,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "edge_broker", description = "Edge application notification broker API")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Peers authenticate with a client certificate. When a TLS-terminating proxy sits in
// front of the broker it forwards the certificate common name in a header.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "peer_certificate",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-ssl-client-cn",
                    "Common name of the verified client certificate, as forwarded by the TLS proxy",
                ))),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    let mut router = Router::new()
        .merge(health_routes())
        .merge(notification_routes(app_state.clone()))
        .merge(subscription_routes(app_state.clone()))
        .merge(service_routes(app_state.clone()));

    if !app_state.config.is_production() {
        router = router.merge(
            RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"),
        );
    }

    router.layer(from_fn_with_state(app_state, forward_peer_identity))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn notification_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/notifications",
            get(socket_handler::socket_handler).post(notification_controller::publish),
        )
        .with_state(app_state)
}

fn subscription_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/subscriptions", get(subscription_controller::index))
        .route(
            "/subscriptions/:namespace",
            post(subscription_controller::subscribe_to_namespace)
                .delete(subscription_controller::unsubscribe_from_namespace),
        )
        .route(
            "/subscriptions/:namespace/:service_id",
            post(subscription_controller::subscribe_to_service)
                .delete(subscription_controller::unsubscribe_from_service),
        )
        .with_state(app_state)
}

fn service_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/services",
            get(service_controller::index)
                .post(service_controller::register)
                .delete(service_controller::deregister),
        )
        .with_state(app_state)
}
