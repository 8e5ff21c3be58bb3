use crate::extractors::RejectionType;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use broker::identity::{self, Identity, PeerCredential};
use log::*;

/// The caller's identity, taken from the verified peer credential attached to the
/// request. Requests without one are rejected with 401.
pub(crate) struct AuthenticatedPeer(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedPeer
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match identity::resolve(parts.extensions.get::<PeerCredential>()) {
            Ok(identity) => Ok(AuthenticatedPeer(identity)),
            Err(e) => {
                debug!("Rejecting {} {}: {e}", parts.method, parts.uri.path());
                Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()))
            }
        }
    }
}
