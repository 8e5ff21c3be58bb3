use crate::error::{identity_error, invalid_error, Error};
use crate::model::Urn;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Separator between the namespace and id portions of a producer identity.
const URN_SEPARATOR: char = ':';

/// Canonical identity of a peer, taken from its certificate common name.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interprets a `namespace:id` identity as a producer URN.
    pub fn urn(&self) -> Result<Urn, Error> {
        match self.0.split_once(URN_SEPARATOR) {
            Some((namespace, id)) if !namespace.is_empty() && !id.is_empty() => {
                Ok(Urn::new(namespace, id))
            }
            _ => Err(invalid_error(&format!(
                "Identity {} is not of the form namespace:id",
                self.0
            ))),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A peer credential that has already been verified by the TLS layer.
///
/// Inserted into request extensions by whatever terminates TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCredential {
    common_name: String,
}

impl PeerCredential {
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
        }
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }
}

/// Extracts the peer identity from a verified credential.
pub fn resolve(credential: Option<&PeerCredential>) -> Result<Identity, Error> {
    let credential = credential.ok_or_else(|| identity_error("No verified peer credential"))?;

    let common_name = credential.common_name().trim();
    if common_name.is_empty() {
        return Err(identity_error("Peer credential has an empty common name"));
    }

    Ok(Identity::new(common_name))
}
