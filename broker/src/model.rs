//! Exchange objects shared between producers, consumers and the broker.
//!
//! All of these serialize as JSON records with optional or empty fields omitted.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Names a producer (or a class of producers when `id` is empty).
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct Urn {
    /// The per-namespace unique portion of the URN.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// The non-unique portion of the URN that identifies the class.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

impl Urn {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

/// A notification type a producing service can emit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct NotificationDescriptor {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Human readable description of the notification
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl NotificationDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
        }
    }
}

/// A producer's registration: what it is, where it lives and what it emits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Service {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<Urn>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint_uri: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<NotificationDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServiceList {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
}

/// A set of notification types a consumer wants, optionally scoped to one producer.
///
/// When `urn.id` is empty the subscription covers any producer in `urn.namespace`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<Urn>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<NotificationDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionList {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscriptions: Vec<Subscription>,
}
