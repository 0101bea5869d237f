//! REST API client module for the RescueBox backend.
//!
//! This module provides the `ApiClient` for authenticated requests and
//! the `SessionRepository` capability over the identity endpoints.
//!
//! The API uses bearer token authentication; expired tokens are renewed
//! transparently through the single-flight refresh protocol in
//! `crate::auth`.

pub mod client;
pub mod error;
pub mod session;

pub use client::ApiClient;
pub use error::ApiError;
pub use session::{HttpSessionRepository, SessionRepository};
