//! Unified error handling for relayd.
//!
//! Handlers return [`RelayError`]; the lane that ran the handler turns it
//! into a metric label and, for policy violations only, a client-visible
//! reply. Malformed input is dropped without a reply.

use relay_proto::Outbound;
use thiserror::Error;

use crate::offline::OfflineError;
use crate::state::DirectoryError;

/// Errors that can occur while handling an inbound record.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or wrong-typed fields, or empty text after trimming.
    #[error("malformed input: {0}")]
    Malformed(&'static str),

    /// Another authenticated session already holds the name.
    #[error("duplicate username: {0}")]
    DuplicateName(String),

    /// The session tried to authenticate twice.
    #[error("session already authenticated")]
    AlreadyAuthenticated,

    /// The session's lane is no longer in the pool.
    #[error("lane {0} is not running")]
    LaneStopped(usize),

    /// The offline store refused a write.
    #[error("offline store: {0}")]
    Offline(#[from] OfflineError),
}

impl RelayError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::DuplicateName(_) => "duplicate_username",
            Self::AlreadyAuthenticated => "already_authenticated",
            Self::LaneStopped(_) => "lane_stopped",
            Self::Offline(_) => "offline_store",
        }
    }

    /// Convert to a reply frame.
    ///
    /// Returns `None` for errors that don't warrant a client-visible reply.
    pub fn to_reply(&self) -> Option<Outbound> {
        match self {
            Self::DuplicateName(_) => Some(Outbound::login_rejected("duplicate username")),
            Self::Malformed(_) => None,
            Self::AlreadyAuthenticated => None,
            Self::LaneStopped(_) => None,
            Self::Offline(_) => None,
        }
    }
}

impl From<DirectoryError> for RelayError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::DuplicateName(name) => Self::DuplicateName(name),
        }
    }
}

/// Result type for handlers.
pub type HandlerResult = Result<(), RelayError>;
