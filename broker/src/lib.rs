//! Notification broker core for edge applications.
//!
//! Producers emit typed notifications; consumers subscribe to them by namespace
//! or by specific producing service and receive them over one long-lived duplex
//! connection. Every participant is identified by the common name of its
//! verified client certificate.
//!
//! # Architecture
//!
//! - **Single connection per identity**: `ConnectionRegistry` binds each consumer
//!   identity to at most one live connection. A second attempt is rejected and the
//!   first connection is left untouched.
//! - **Subscription index**: `SubscriptionIndex` maps namespace + notification type
//!   to ordered, deduplicated subscriber lists per producing service, plus a
//!   namespace-wide list for "any producer" subscriptions.
//! - **Best-effort fan-out**: `Dispatcher` reads the index to decide who gets a
//!   notification and the registry to decide where it goes. Each send is bounded by
//!   a timeout; failures are reported, never retried.
//! - **Ephemeral**: nothing is persisted. A subscriber without a live connection
//!   simply misses the notification.
//!
//! # Message Flow
//!
//! 1. Consumer connects; its identity comes from the peer credential
//! 2. `Manager::register_connection` reserves the identity and runs the upgrade
//! 3. Consumer subscribes via `SubscriptionRequestHandler`
//! 4. Producer submits a notification; `Manager::dispatch` fans it out
//! 5. The connection task writes each queued `NotificationToConsumer` to the wire
//!    and drops its `ConnectionGuard` when the transport closes
//!
//! # Modules
//!
//! - `identity`: peer credential → `Identity`, and producer URN parsing
//! - `connection`: `ConnectionRegistry`, handles, registrations and teardown guards
//! - `subscription`: `SubscriptionIndex` and its key types
//! - `handler`: subscribe/unsubscribe request validation and application
//! - `dispatch`: `Dispatcher` and `DeliveryReport`
//! - `directory`: in-memory producer service directory
//! - `manager`: `Manager`, one broker instance
//! - `model` / `message`: exchange objects

pub mod connection;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod identity;
pub mod manager;
pub mod message;
pub mod model;
pub mod subscription;

pub use manager::Manager;
