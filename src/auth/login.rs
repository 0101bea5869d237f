//! Bridging for the external social-login SDK.
//!
//! The platform SDK reports its outcome through a callback on its own
//! thread. `LoginCoordinator` turns that callback into a one-shot result
//! the login flow can await, instead of a long-lived delegate object or
//! process-wide mutable state.

use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Why an external login attempt produced no token.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoginError {
    #[error("login cancelled")]
    Cancelled,
    #[error("login provider error: {0}")]
    Provider(String),
}

type LoginOutcome = Result<String, LoginError>;

/// One-shot bridge between the SDK callback and the awaiting login flow.
#[derive(Default)]
pub struct LoginCoordinator {
    pending: Mutex<Option<oneshot::Sender<LoginOutcome>>>,
}

impl LoginCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a login attempt, returning the receiver the flow awaits.
    /// Starting a new attempt resolves any previous one as cancelled.
    pub fn start_login(&self) -> oneshot::Receiver<LoginOutcome> {
        let (tx, rx) = oneshot::channel();
        if let Some(previous) = self
            .pending
            .lock()
            .expect("login coordinator poisoned")
            .replace(tx)
        {
            debug!("superseding a pending login attempt");
            let _ = previous.send(Err(LoginError::Cancelled));
        }
        rx
    }

    /// Deliver the SDK's outcome to the pending attempt. Returns false
    /// when no attempt was waiting (late or duplicate callback).
    pub fn handle_result(&self, result: LoginOutcome) -> bool {
        match self
            .pending
            .lock()
            .expect("login coordinator poisoned")
            .take()
        {
            Some(tx) => tx.send(result).is_ok(),
            None => {
                debug!("login result delivered with no pending attempt");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_the_external_token_once() {
        let coordinator = LoginCoordinator::new();
        let rx = coordinator.start_login();

        assert!(coordinator.handle_result(Ok("line-token".into())));
        assert_eq!(rx.await.unwrap(), Ok("line-token".into()));

        // The attempt is consumed; a second callback has nowhere to go.
        assert!(!coordinator.handle_result(Ok("late".into())));
    }

    #[tokio::test]
    async fn new_attempt_cancels_the_previous_one() {
        let coordinator = LoginCoordinator::new();
        let first = coordinator.start_login();
        let second = coordinator.start_login();

        assert_eq!(first.await.unwrap(), Err(LoginError::Cancelled));

        assert!(coordinator.handle_result(Err(LoginError::Provider("denied".into()))));
        assert_eq!(
            second.await.unwrap(),
            Err(LoginError::Provider("denied".into()))
        );
    }
}
