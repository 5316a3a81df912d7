//! The Hub - shared coordination state for the relay.
//!
//! Holds the lane pool, the name directory and the offline store. Lanes own
//! sessions; the hub only ever reaches a session by posting to its lane.
//!
//! # Route lock
//!
//! Resolving a destination (directory lookup, then live handoff or offline
//! enqueue) and the login sequence (register, then drain) both run under
//! `route_lock`. A message therefore can never be parked for a name after
//! that name's queue was drained, and queued messages always reach the
//! recipient's lane before any live message for it.
//!
//! # Backpressure
//!
//! Only a session's own lane writes to its outbound queue. Chat messages
//! that do not fit wait in the session backlog; a helper task waits for
//! queue capacity and posts [`LaneEvent::Flush`] back to the lane. Whatever
//! is still backlogged when the session closes is routed again.

use relay_proto::{ChatMessage, Outbound, Record};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, MutexGuard, mpsc};
use tracing::{debug, info, warn};

use super::directory::Directory;
use super::lane::{CloseReason, LaneActor, LaneEvent};
use super::lanes::{LaneHandle, LanePool};
use super::session::{SendOutcome, Session, SessionId, SessionIdGenerator};
use crate::error::RelayError;
use crate::offline::{OfflineStore, QueuedMessage};

/// Construction parameters derived from config.
#[derive(Debug, Clone)]
pub struct HubParams {
    pub server_name: String,
    pub lanes: usize,
    pub outbound_queue: usize,
}

/// What the transport keeps to feed a session's lane.
#[derive(Debug, Clone)]
pub struct SessionKey {
    pub id: SessionId,
    lane: LaneHandle,
}

impl SessionKey {
    pub fn lane(&self) -> usize {
        self.lane.index()
    }
}

/// How a routed message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the recipient's lane.
    Live,
    /// Parked in the offline store.
    Queued,
}

pub struct Hub {
    pub server_name: String,
    pool: LanePool,
    directory: Directory,
    offline: Arc<dyn OfflineStore>,
    route_lock: Mutex<()>,
    ids: SessionIdGenerator,
    outbound_queue: usize,
    weak: Weak<Hub>,
}

impl Hub {
    pub fn new(params: HubParams, offline: Arc<dyn OfflineStore>) -> Arc<Self> {
        let pool = LanePool::new(params.lanes);
        info!(
            lanes = pool.capacity(),
            backend = offline.backend(),
            "Hub ready"
        );
        Arc::new_cyclic(|weak| Self {
            server_name: params.server_name,
            pool,
            directory: Directory::new(),
            offline,
            route_lock: Mutex::new(()),
            ids: SessionIdGenerator::new(),
            outbound_queue: params.outbound_queue.max(1),
            weak: weak.clone(),
        })
    }

    /// Capacity for a new session's outbound queue.
    pub fn outbound_queue(&self) -> usize {
        self.outbound_queue
    }

    /// Bind a newly accepted connection to a lane.
    pub fn attach(&self, addr: SocketAddr, outbound: mpsc::Sender<Outbound>) -> SessionKey {
        let id = self.ids.next();
        let lane = self
            .pool
            .assign(|index| LaneActor::spawn(index, self.weak.clone()));

        crate::metrics::inc_connected();
        lane.post(LaneEvent::Attach {
            session: Session::new(id, addr, lane.index(), outbound),
        });

        SessionKey { id, lane }
    }

    /// Forward a record from the session's peer to its lane.
    pub fn inbound(&self, key: &SessionKey, record: Record) {
        key.lane.post(LaneEvent::Inbound {
            session_id: key.id,
            record,
        });
    }

    /// Report that the session's transport has ended.
    pub fn disconnect(&self, key: &SessionKey, reason: CloseReason) {
        key.lane.post(LaneEvent::Closed {
            session_id: key.id,
            reason,
        });
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn offline(&self) -> &dyn OfflineStore {
        self.offline.as_ref()
    }

    pub fn lane_handle(&self, index: usize) -> Option<LaneHandle> {
        self.pool.handle(index)
    }

    pub fn lane_loads(&self) -> Vec<usize> {
        self.pool.loads()
    }

    /// Serialise against routing and login.
    pub async fn route_lock(&self) -> MutexGuard<'_, ()> {
        self.route_lock.lock().await
    }

    /// Deliver a message to its destination, or park it for later.
    pub async fn route(&self, message: ChatMessage) -> Result<Delivery, RelayError> {
        let Some(destination) = message.destination_name().map(str::to_owned) else {
            return Err(RelayError::Malformed("destination"));
        };

        let _gate = self.route_lock().await;

        if let Some(handle) = self.directory.find(&destination) {
            let frame = Outbound::Message(message.clone());
            if handle.lane.post(LaneEvent::Deliver {
                session_id: handle.id,
                frame,
            }) {
                debug!(sender = %message.sender, destination = %destination, "Message relayed");
                crate::metrics::record_relayed();
                return Ok(Delivery::Live);
            }
        }

        self.offline
            .enqueue(&destination, QueuedMessage::new(message))
            .await?;
        debug!(destination = %destination, "Message queued for offline recipient");
        crate::metrics::record_queued();
        Ok(Delivery::Queued)
    }

    /// Hand a frame to a session owned by the calling lane.
    pub fn send(&self, session: &mut Session, frame: Outbound) {
        if session.send(frame) == SendOutcome::Backlogged {
            self.schedule_flush(session);
        }
    }

    /// Push a session's backlog into its outbound queue.
    pub(super) fn flush(&self, session: &mut Session) {
        match session.flush() {
            SendOutcome::Backlogged => self.schedule_flush(session),
            SendOutcome::Closed => {
                debug!(session = %session.id, held = session.backlog_len(), "Writer gone, backlog kept for reroute");
            }
            _ => {}
        }
    }

    fn schedule_flush(&self, session: &mut Session) {
        let Some(outbound) = session.arm_flush() else {
            return;
        };
        let Some(lane) = self.pool.handle(session.lane) else {
            return;
        };
        let session_id = session.id;
        tokio::spawn(async move {
            // The slot is released right away; only the lane fills it.
            if let Ok(permit) = outbound.reserve().await {
                drop(permit);
                lane.post(LaneEvent::Flush { session_id });
            }
        });
    }

    /// Post a frame to every authenticated session except `exclude`.
    pub fn broadcast_except(&self, exclude: SessionId, frame: &Outbound) -> usize {
        let mut sent = 0;
        for handle in self.directory.others(exclude) {
            if handle.lane.post(LaneEvent::Deliver {
                session_id: handle.id,
                frame: frame.clone(),
            }) {
                sent += 1;
            }
        }
        sent
    }

    /// A frame reached a lane after its session left.
    ///
    /// Chat messages are routed again, which parks them unless the name has
    /// come back in the meantime. Announcements are dropped.
    pub(super) async fn redeliver(&self, session_id: SessionId, frame: Outbound) {
        match frame {
            Outbound::Message(message) => {
                debug!(session = %session_id, "Recipient left before delivery, rerouting");
                if let Err(e) = self.route(message).await {
                    warn!(error = %e, "Failed to reroute message");
                    crate::metrics::record_handler_error("message", e.error_code());
                }
            }
            other => {
                debug!(session = %session_id, kind = other.kind(), "Frame for departed session dropped");
            }
        }
    }

    /// Tear down a session its lane has just removed.
    pub(super) async fn session_closed(&self, mut session: Session, reason: &CloseReason) {
        self.pool.release(session.lane);
        crate::metrics::dec_connected();
        debug!(lane = session.lane, loads = ?self.lane_loads(), "Lane released");

        match session.name() {
            Some(name) => {
                self.directory.unregister(name, session.id);
                crate::metrics::set_authenticated(self.directory.len());
                info!(session = %session.id, name = %name, %reason, "{name} disconnected");
                self.broadcast_except(session.id, &Outbound::user_disconnected(name));
            }
            None => {
                info!(session = %session.id, addr = %session.addr, %reason, "Anonymous client disconnected");
            }
        }

        let undelivered = session.take_undelivered();
        if !undelivered.is_empty() {
            debug!(session = %session.id, count = undelivered.len(), "Rerouting undelivered messages");
        }
        for message in undelivered {
            if let Err(e) = self.route(message).await {
                warn!(error = %e, "Failed to reroute message");
                crate::metrics::record_handler_error("message", e.error_code());
            }
        }
    }
}
