//! Inbound record handlers.
//!
//! Every record a peer sends is dispatched by the owning lane according to
//! the session's authentication state: anonymous sessions may only log in,
//! authenticated sessions may only send messages.

mod login;
mod routing;

pub use login::LoginHandler;
pub use routing::MessageHandler;

use async_trait::async_trait;
use relay_proto::Record;
use std::sync::Arc;
use tracing::{Instrument, debug, info, warn};

use crate::error::{HandlerResult, RelayError};
use crate::state::{Hub, Session};
use crate::telemetry::RecordTimer;

/// Handler context, built by the lane for each record.
pub struct Context<'a> {
    /// Shared relay state.
    pub hub: &'a Arc<Hub>,
    /// The session that sent the record. Only its lane holds this borrow.
    pub session: &'a mut Session,
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context<'_>, record: &Record) -> HandlerResult;
}

/// Run the handler matching the session's state and report any failure.
pub async fn dispatch(hub: &Arc<Hub>, session: &mut Session, record: Record) {
    let authenticated = session.state.is_authenticated();
    let kind = if authenticated { "message" } else { "login" };
    let handler: &dyn Handler = if authenticated {
        &MessageHandler
    } else {
        &LoginHandler
    };

    let span = crate::telemetry::spans::record(kind, &session.id.to_string(), session.name());
    let _timer = RecordTimer::new(kind);

    let mut ctx = Context { hub, session };
    let result = handler.handle(&mut ctx, &record).instrument(span).await;

    if let Err(e) = result {
        report(&mut ctx, kind, e);
    }
}

fn report(ctx: &mut Context<'_>, kind: &'static str, err: RelayError) {
    crate::metrics::record_handler_error(kind, err.error_code());

    match &err {
        RelayError::Malformed(_) | RelayError::AlreadyAuthenticated => {
            debug!(session = %ctx.session.id, error = %err, "Record dropped");
        }
        RelayError::DuplicateName(name) => {
            info!(session = %ctx.session.id, name = %name, "Login refused: name in use");
        }
        RelayError::LaneStopped(_) | RelayError::Offline(_) => {
            warn!(session = %ctx.session.id, error = %err, "Handler failed");
        }
    }

    if let Some(reply) = err.to_reply() {
        ctx.hub.send(ctx.session, reply);
    }
}
