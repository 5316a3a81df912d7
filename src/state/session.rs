//! Per-connection session state.
//!
//! A `Session` is owned by exactly one lane for its whole life. Nothing
//! outside that lane ever holds a `&mut Session`; other lanes reach it by
//! posting events to the lane's mailbox.

use relay_proto::{ChatMessage, Outbound};
use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::directory::SessionHandle;
use super::lanes::LaneHandle;
use crate::error::RelayError;

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    #[cfg(test)]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", base36_encode_6(self.0))
    }
}

/// Generates session identifiers in accept order.
pub struct SessionIdGenerator {
    counter: AtomicU64,
}

impl SessionIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> SessionId {
        SessionId(self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a number as a 6-character base36 string.
fn base36_encode_6(mut n: u64) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut result = [b'A'; 6];

    for slot in result.iter_mut().rev() {
        *slot = CHARS[(n % 36) as usize];
        n /= 36;
    }

    String::from_utf8_lossy(&result).into_owned()
}

/// Authentication status of a session.
///
/// `Anonymous -> Authenticated` is the only transition. A session never goes
/// back to `Anonymous`; it leaves `Authenticated` only by disconnecting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated { name: String },
}

impl AuthState {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { name } => Some(name),
        }
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    pub fn authenticate(&mut self, name: String) -> Result<(), RelayError> {
        match self {
            Self::Anonymous => {
                *self = Self::Authenticated { name };
                Ok(())
            }
            Self::Authenticated { .. } => Err(RelayError::AlreadyAuthenticated),
        }
    }
}

/// What happened to a frame handed to [`Session::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Held in the session backlog until the outbound queue has room.
    Backlogged,
    /// An announcement hit a full queue and was dropped.
    Dropped,
    /// The writer has already exited.
    Closed,
}

/// A connected client.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub addr: SocketAddr,
    /// Index of the owning lane.
    pub lane: usize,
    pub state: AuthState,
    outbound: mpsc::Sender<Outbound>,
    /// Frames waiting for outbound capacity, in delivery order.
    backlog: VecDeque<Outbound>,
    flush_armed: bool,
}

impl Session {
    pub fn new(
        id: SessionId,
        addr: SocketAddr,
        lane: usize,
        outbound: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            id,
            addr,
            lane,
            state: AuthState::Anonymous,
            outbound,
            backlog: VecDeque::new(),
            flush_armed: false,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.state.name()
    }

    /// Directory entry for this session under `name`, reachable via `lane`.
    pub fn handle(&self, name: &str, lane: LaneHandle) -> SessionHandle {
        debug_assert_eq!(lane.index(), self.lane);
        SessionHandle {
            id: self.id,
            name: name.to_string(),
            lane,
        }
    }

    /// Queue a frame for the peer without waiting.
    ///
    /// Chat messages are never dropped: while the outbound queue is full (or
    /// once the writer is gone) they wait in the backlog, and every later
    /// frame queues behind them. Announcements that hit a full queue with an
    /// empty backlog are dropped.
    pub fn send(&mut self, frame: Outbound) -> SendOutcome {
        if !self.backlog.is_empty() {
            self.backlog.push_back(frame);
            return SendOutcome::Backlogged;
        }

        match self.outbound.try_send(frame) {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(frame @ Outbound::Message(_))) => {
                debug!(session = %self.id, "Outbound queue full, holding message");
                crate::metrics::record_outbound_backlogged();
                self.backlog.push_back(frame);
                SendOutcome::Backlogged
            }
            Err(TrySendError::Full(frame)) => {
                warn!(session = %self.id, kind = frame.kind(), "Outbound queue full, dropping frame");
                crate::metrics::record_outbound_dropped();
                SendOutcome::Dropped
            }
            Err(TrySendError::Closed(frame)) => {
                debug!(session = %self.id, kind = frame.kind(), "Outbound queue closed");
                if matches!(frame, Outbound::Message(_)) {
                    self.backlog.push_back(frame);
                }
                SendOutcome::Closed
            }
        }
    }

    /// Move as much of the backlog as fits into the outbound queue.
    pub fn flush(&mut self) -> SendOutcome {
        self.flush_armed = false;
        while let Some(frame) = self.backlog.pop_front() {
            match self.outbound.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => {
                    self.backlog.push_front(frame);
                    return SendOutcome::Backlogged;
                }
                Err(TrySendError::Closed(frame)) => {
                    self.backlog.push_front(frame);
                    return SendOutcome::Closed;
                }
            }
        }
        SendOutcome::Queued
    }

    /// Claim the right to wait for outbound capacity.
    ///
    /// Returns a sender to wait on when the backlog is non-empty and no
    /// wait is already pending.
    pub fn arm_flush(&mut self) -> Option<mpsc::Sender<Outbound>> {
        if self.backlog.is_empty() || self.flush_armed {
            return None;
        }
        self.flush_armed = true;
        Some(self.outbound.clone())
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Chat messages that never reached the outbound queue.
    pub fn take_undelivered(&mut self) -> Vec<ChatMessage> {
        self.backlog
            .drain(..)
            .filter_map(|frame| match frame {
                Outbound::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}
