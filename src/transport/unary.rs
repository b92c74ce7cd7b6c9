//! One request body in, one response body out.
//!
//! The adapter is bound to sessions through the `Mcp-Session-Id` header: a
//! session becomes addressable once an `initialize` on it succeeds, and is
//! dispatched as a fresh `Uninitialized` session otherwise.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::mcp::{
    dispatcher::Dispatcher,
    rpc::ResponseEnvelope,
    session::{Session, SessionStore},
};

pub const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Debug)]
pub enum UnaryReply {
    /// Transport-level rejection, never a protocol envelope.
    BadRequest(&'static str),
    /// A notification was accepted; there is no body.
    Accepted,
    Body(ResponseEnvelope),
}

#[derive(Debug)]
pub struct UnaryOutcome {
    pub reply: UnaryReply,
    pub session_id: Option<String>,
}

#[derive(Clone)]
pub struct UnaryAdapter {
    dispatcher: Arc<Dispatcher>,
    sessions: SessionStore,
}

impl UnaryAdapter {
    pub fn new(dispatcher: Arc<Dispatcher>, sessions: SessionStore) -> Self {
        Self {
            dispatcher,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn handle(&self, session_id: Option<&str>, body: &[u8]) -> UnaryOutcome {
        if body.is_empty() {
            return UnaryOutcome {
                reply: UnaryReply::BadRequest("Request body required"),
                session_id: None,
            };
        }

        let known = session_id.and_then(|id| self.sessions.get(id).map(|s| (id.to_string(), s)));
        let was_known = known.is_some();
        let (id, mut session) =
            known.unwrap_or_else(|| (Uuid::new_v4().to_string(), Session::new()));

        let response = self.dispatcher.handle_raw(&mut session, body).await;

        let session_id = if session.is_initialized() {
            if !was_known {
                info!(session_id = %id, "unary session created");
                self.sessions.insert(id.clone(), session);
            }
            Some(id)
        } else {
            None
        };

        UnaryOutcome {
            reply: response.map_or(UnaryReply::Accepted, UnaryReply::Body),
            session_id,
        }
    }

    /// Tears down a session; `false` when the id was unknown.
    pub fn close(&self, session_id: &str) -> bool {
        let closed = self.sessions.remove(session_id).is_some();
        if closed {
            info!(session_id = %session_id, "unary session closed");
        }
        closed
    }
}
