//! Authentication lifecycle for the RescueBox client.
//!
//! This module provides:
//! - `AuthManager`: observable tri-state auth signal plus initialize,
//!   login, and logout operations
//! - `RefreshCoordinator`: single-flight 401 recovery shared by all
//!   in-flight requests
//! - `LoginCoordinator`: one-shot bridging of the social-login SDK
//!   callback

pub mod login;
pub mod refresh;
pub mod state;

pub use login::{LoginCoordinator, LoginError};
pub use refresh::RefreshCoordinator;
pub use state::{AuthManager, AuthState};
