//! Web chat channel
//!
//! JSON channel for browser clients. Inbound messages are recorded in the
//! user's transcript and acknowledged with an outbound message referencing
//! them.

use anyhow::Context as _;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::transcript::{TranscriptStore, is_valid_user_id};
use crate::auth::Principal;
use crate::channel::{Channel, ChannelMessage, ChannelRegistry};
use crate::context::HostContext;
use crate::error::{HostError, Result};
use crate::module::{AppState, HostEnvironment, HostModule, ServiceCollection};

pub const NAME: &str = "webchat";

/// Maximum accepted text length in characters
const MAX_TEXT_LEN: usize = 4096;

/// Inbound JSON payload
#[derive(Debug, Deserialize)]
struct InboundPayload {
    user_id: String,
    #[serde(default)]
    text: Option<String>,
}

/// JSON wire format for browser clients
pub struct WebChatChannel;

impl Channel for WebChatChannel {
    fn name(&self) -> &str {
        NAME
    }

    fn parse_inbound(&self, payload: &[u8]) -> Result<ChannelMessage> {
        let payload: InboundPayload = serde_json::from_slice(payload)
            .map_err(|e| HostError::BadRequest(format!("Invalid message: {}", e)))?;

        if !is_valid_user_id(&payload.user_id) {
            return Err(HostError::BadRequest("Invalid user_id".into()));
        }
        if let Some(text) = &payload.text
            && text.chars().count() > MAX_TEXT_LEN
        {
            return Err(HostError::BadRequest(format!(
                "Text longer than {} characters",
                MAX_TEXT_LEN
            )));
        }

        Ok(ChannelMessage::inbound(NAME, &payload.user_id, payload.text))
    }

    fn build_outbound(&self, message: &ChannelMessage) -> Result<String> {
        serde_json::to_string(message)
            .map_err(|e| HostError::Internal(format!("Failed to encode message: {}", e)))
    }
}

/// Registers the web chat channel and its routes
pub struct WebChatModule;

impl HostModule for WebChatModule {
    fn name(&self) -> &str {
        NAME
    }

    fn register_services(
        &self,
        services: &mut ServiceCollection,
        context: &HostContext,
    ) -> anyhow::Result<()> {
        let channels = services
            .get::<ChannelRegistry>()
            .context("channel registry is not registered")?;
        channels.register(Arc::new(WebChatChannel));

        let dir = context.data_path()?.join(NAME);
        info!("Web chat transcripts in {:?}", dir);
        services.add(TranscriptStore::new(dir));
        Ok(())
    }

    fn configure_pipeline(
        &self,
        router: Router<AppState>,
        _env: &HostEnvironment,
    ) -> anyhow::Result<Router<AppState>> {
        Ok(router
            .route("/webchat/messages", post(receive_message))
            .route("/webchat/conversations/{user_id}", get(conversation)))
    }
}

fn channel(state: &AppState) -> Result<Arc<dyn Channel>> {
    state
        .services
        .get::<ChannelRegistry>()
        .and_then(|channels| channels.get(NAME))
        .ok_or_else(|| HostError::Internal("web chat channel is not registered".into()))
}

fn transcripts(state: &AppState) -> Result<Arc<TranscriptStore>> {
    state
        .services
        .get::<TranscriptStore>()
        .ok_or_else(|| HostError::Internal("transcript store is not registered".into()))
}

/// Receive a message from a browser client
///
/// The conversation is recorded under the caller's own transcripts.
async fn receive_message(
    principal: Principal,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response> {
    let channel = channel(&state)?;
    let transcripts = transcripts(&state)?;

    let inbound = channel.parse_inbound(&body)?;
    info!("Received web chat message {} from {}", inbound.id, inbound.user_id);

    let ack = inbound.reply(None);
    transcripts
        .append(&principal.subject, &[&inbound, &ack])
        .await
        .map_err(|e| {
            HostError::Internal(format!("Failed to record message {}: {:#}", inbound.id, e))
        })?;

    let body = channel.build_outbound(&ack)?;
    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}

/// List the caller's recorded messages with a user
async fn conversation(
    principal: Principal,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ChannelMessage>>> {
    if !is_valid_user_id(&user_id) {
        return Err(HostError::BadRequest("Invalid user_id".into()));
    }

    let messages = transcripts(&state)?
        .load(&principal.subject, &user_id)
        .await
        .map_err(|e| HostError::Internal(format!("{:#}", e)))?;
    Ok(Json(messages))
}
