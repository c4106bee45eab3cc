//! The explicit session object injected into every controller.

use std::sync::Arc;

use flowline_core::Session;
use tokio::sync::watch;

use crate::error::{ClientError, ClientResult};

/// Shared handle to the signed-in session, if any.
///
/// Cloning is cheap; all clones observe the same session. Receivers from
/// [`subscribe`](Self::subscribe) see sign-in and sign-out, so a shell can
/// switch between the login screen and the workspace.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionHandle {
    /// A handle with nobody signed in.
    pub fn signed_out() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn signed_in(session: Session) -> Self {
        let handle = Self::signed_out();
        handle.set(session);
        handle
    }

    /// Install a new or refreshed session.
    pub fn set(&self, session: Session) {
        tracing::debug!(user_id = %session.user.id, "Session installed");
        self.tx.send_replace(Some(session));
    }

    pub fn clear(&self) {
        if self.tx.send_replace(None).is_some() {
            tracing::debug!("Session cleared");
        }
    }

    /// The live session, or [`ClientError::AuthRequired`] when nobody is
    /// signed in or the token has expired.
    pub fn current(&self) -> ClientResult<Session> {
        match self.tx.borrow().as_ref() {
            Some(session) if !session.is_expired() => Ok(session.clone()),
            _ => Err(ClientError::AuthRequired),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_ok()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::signed_out()
    }
}
