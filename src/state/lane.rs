//! Lane actor.
//!
//! A lane is one tokio task that exclusively owns the sessions bound to it.
//! Everything that touches a session, from its own inbound records to frames
//! other lanes want delivered to it, arrives as a [`LaneEvent`] and is
//! handled in mailbox order.

use relay_proto::{Outbound, Record};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info};

use super::hub::Hub;
use super::lanes::LaneHandle;
use super::session::{Session, SessionId};

/// Why a session's transport ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed the connection.
    Eof,
    /// Read or decode failure.
    Transport(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => f.write_str("connection closed"),
            Self::Transport(err) => write!(f, "transport error: {err}"),
        }
    }
}

#[derive(Debug)]
pub enum LaneEvent {
    /// Bind a freshly accepted session to this lane.
    Attach { session: Session },
    /// A decoded record from the session's peer.
    Inbound { session_id: SessionId, record: Record },
    /// A frame for one of this lane's sessions.
    Deliver { session_id: SessionId, frame: Outbound },
    /// The session's outbound queue has room for its backlog again.
    Flush { session_id: SessionId },
    /// The session's transport has ended.
    Closed {
        session_id: SessionId,
        reason: CloseReason,
    },
}

pub struct LaneActor {
    index: usize,
    sessions: HashMap<SessionId, Session>,
    hub: Weak<Hub>,
}

impl LaneActor {
    /// Start a lane task and return its handle.
    pub fn spawn(index: usize, hub: Weak<Hub>) -> LaneHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Self {
            index,
            sessions: HashMap::new(),
            hub,
        };

        let span = crate::telemetry::spans::lane(index);
        tokio::spawn(actor.run(rx).instrument(span));

        LaneHandle::new(index, tx)
    }

    /// The main actor loop. Ends once every mailbox sender is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<LaneEvent>) {
        while let Some(event) = rx.recv().await {
            let Some(hub) = self.hub.upgrade() else {
                break;
            };
            self.handle_event(&hub, event).await;
        }
        debug!(lane = self.index, sessions = self.sessions.len(), "Lane stopped");
    }

    async fn handle_event(&mut self, hub: &Arc<Hub>, event: LaneEvent) {
        match event {
            LaneEvent::Attach { session } => {
                info!(session = %session.id, addr = %session.addr, lane = self.index, "New client connected");
                self.sessions.insert(session.id, session);
            }
            LaneEvent::Inbound { session_id, record } => {
                let Some(session) = self.sessions.get_mut(&session_id) else {
                    debug!(session = %session_id, "Record for unknown session dropped");
                    return;
                };
                crate::handlers::dispatch(hub, session, record).await;
            }
            LaneEvent::Deliver { session_id, frame } => match self.sessions.get_mut(&session_id) {
                Some(session) => hub.send(session, frame),
                None => hub.redeliver(session_id, frame).await,
            },
            LaneEvent::Flush { session_id } => {
                if let Some(session) = self.sessions.get_mut(&session_id) {
                    hub.flush(session);
                }
            }
            LaneEvent::Closed { session_id, reason } => {
                // A second Closed for the same session finds nothing here.
                match self.sessions.remove(&session_id) {
                    Some(session) => hub.session_closed(session, &reason).await,
                    None => debug!(session = %session_id, "Duplicate disconnect ignored"),
                }
            }
        }
    }
}
