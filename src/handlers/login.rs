//! Login: the Anonymous to Authenticated transition.

use async_trait::async_trait;
use relay_proto::{Outbound, Record, is_type, simplified, str_field};
use tracing::{info, warn};

use super::{Context, Handler};
use crate::error::{HandlerResult, RelayError};
use crate::offline::QueuedMessage;
use crate::state::LaneEvent;

pub struct LoginHandler;

#[async_trait]
impl Handler for LoginHandler {
    async fn handle(&self, ctx: &mut Context<'_>, record: &Record) -> HandlerResult {
        if !is_type(record, "login") {
            return Err(RelayError::Malformed("expected a login request"));
        }

        let name = str_field(record, "username")
            .map(simplified)
            .filter(|name| !name.is_empty())
            .ok_or(RelayError::Malformed("username"))?;

        let hub = ctx.hub;
        let session = &mut *ctx.session;
        let lane = hub
            .lane_handle(session.lane)
            .ok_or(RelayError::LaneStopped(session.lane))?;

        // Held until the replays are posted so no live message overtakes them.
        let _gate = hub.route_lock().await;

        if let Err(e) = hub.directory().register(session.handle(&name, lane.clone())) {
            crate::metrics::record_login(false);
            return Err(e.into());
        }
        session.state.authenticate(name.clone())?;
        crate::metrics::record_login(true);
        crate::metrics::set_authenticated(hub.directory().len());
        info!(session = %session.id, name = %name, lane = lane.index(), "User logged in");

        hub.send(session, Outbound::login_ok());
        hub.broadcast_except(session.id, &Outbound::new_user(&name));

        let queued = match hub.offline().drain_all(&name).await {
            Ok(queued) => queued,
            Err(e) => {
                // Nothing was removed; the entries wait for the next login.
                warn!(name = %name, error = %e, "Failed to drain offline queue");
                crate::metrics::record_handler_error("login", e.error_code());
                Vec::new()
            }
        };

        if !queued.is_empty() {
            info!(name = %name, count = queued.len(), "Replaying offline messages");
            crate::metrics::record_replayed(queued.len());
        }
        for QueuedMessage { message, .. } in queued {
            lane.post(LaneEvent::Deliver {
                session_id: session.id,
                frame: message.into(),
            });
        }

        Ok(())
    }
}
