//! Directed message routing for authenticated sessions.

use async_trait::async_trait;
use relay_proto::{ChatMessage, Record, is_type, str_field};

use super::{Context, Handler};
use crate::error::{HandlerResult, RelayError};

pub struct MessageHandler;

#[async_trait]
impl Handler for MessageHandler {
    async fn handle(&self, ctx: &mut Context<'_>, record: &Record) -> HandlerResult {
        if !is_type(record, "message") {
            return Err(RelayError::Malformed("expected a message"));
        }

        let text = str_field(record, "text")
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or(RelayError::Malformed("text"))?;

        let sender = ctx
            .session
            .name()
            .ok_or(RelayError::Malformed("sender is not logged in"))?;

        let message = ChatMessage {
            text: text.to_string(),
            sender: sender.to_string(),
            source: record.get("source").cloned(),
            destination: record.get("destination").cloned(),
        };

        if message.destination_name().is_none_or(str::is_empty) {
            return Err(RelayError::Malformed("destination"));
        }

        ctx.hub.route(message).await?;
        Ok(())
    }
}
