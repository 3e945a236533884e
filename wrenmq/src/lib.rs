#![deny(unsafe_code)]

//! Bootstrap and eventing core for an MQTT-family message broker.
//!
//! Wires the broker's pluggable collaborators together — persistent storage,
//! subscription registry, authentication, authorization and third-party
//! observers — and fans lifecycle events out to observers on a background
//! worker so the protocol path never waits on them.
//!
//! # Overall Example
//! ```rust,no_run
//! use wrenmq::broker::Broker;
//! use wrenmq::settings::Settings;
//!
//! #[tokio::main]
//! async fn main() -> wrenmq::Result<()> {
//!     let broker = Broker::new(Settings::load(None)?);
//!     let engine = broker.init(Vec::new(), None, None).await?;
//!
//!     // hand `engine` to the protocol front end here ...
//!
//!     broker.shutdown().await?;
//!     Ok(())
//! }
//! ```

/// Core Broker Components
pub mod broker; // Bootstrap orchestration
pub mod intercept; // Async observer dispatch
pub mod resolver; // Collaborator factory registry

/// Security
pub mod acl; // Access Control List rules and file parsing
pub mod auth; // Authenticator/authorizator capabilities

/// Collaborator Surfaces
pub mod storage; // Persistent store interfaces
pub mod subscriptions; // Subscription registry

/// Common
pub mod event; // Lifecycle event snapshots
pub mod settings; // Configuration
pub mod types; // Common data types

mod error;

pub use error::{BrokerError, Result};
