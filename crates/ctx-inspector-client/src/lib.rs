//! HTTP access to the context inspector backend.
//!
//! - [`transport`]: the [`Transport`] seam and its reqwest implementation
//! - [`client`]: [`InspectorClient`], one typed method per backend operation
//! - [`config`]: [`InspectorConfig`] with defaults and JSON file loading

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod transport;

pub use client::InspectorClient;
pub use config::{ConfigError, InspectorConfig};
pub use transport::{HttpTransport, Method, Transport, TransportResponse};
