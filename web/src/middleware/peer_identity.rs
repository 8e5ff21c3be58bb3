use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use broker::identity::PeerCredential;
use log::*;
use service::AppState;

/// Attaches a `PeerCredential` taken from the configured identity header when the
/// connection itself did not carry one. Only enabled when a TLS-terminating proxy
/// in front of the broker is configured to forward the client certificate name.
pub async fn forward_peer_identity(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<PeerCredential>().is_none() {
        if let Some(header) = app_state.config.peer_identity_header() {
            let forwarded = request
                .headers()
                .get(header)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(PeerCredential::new);

            match forwarded {
                Some(credential) => {
                    trace!("Peer identity {} forwarded via {header}", credential.common_name());
                    request.extensions_mut().insert(credential);
                }
                None => trace!("No peer identity forwarded via {header}"),
            }
        }
    }

    next.run(request).await
}
