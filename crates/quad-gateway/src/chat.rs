use thiserror::Error;
use tokio::task;
use tracing::warn;
use uuid::Uuid;

use quad_types::events::GatewayEvent;
use quad_types::models::{ChatMessage, NotificationKind};

use crate::GatewayState;

/// How much of the message text lands in the notification body.
const PREVIEW_LEN: usize = 140;

#[derive(Debug, Error)]
pub enum SendMessageError {
    #[error("Not a participant in this conversation")]
    NotAParticipant,
    #[error("Message could not be saved")]
    Store(#[source] anyhow::Error),
}

/// Full SendMessage command handling: deliver, then answer the sending
/// connection with a MessageAck when one was requested. Send failures
/// surface through the ack error field, never as a dropped message.
pub async fn send_message(
    state: &GatewayState,
    conn_id: Uuid,
    sender_id: Uuid,
    conversation_id: Uuid,
    content: String,
    attachments: Vec<String>,
    ack: Option<u64>,
) {
    match deliver_message(state, sender_id, conversation_id, content, attachments).await {
        Ok(message) => {
            if let Some(ack) = ack {
                state.dispatcher.send_to_connection(
                    conn_id,
                    GatewayEvent::MessageAck {
                        ack,
                        success: true,
                        message: Some(message),
                        error: None,
                    },
                );
            }
        }
        Err(e) => {
            warn!("send from {sender_id} into {conversation_id} failed: {e}");
            if let Some(ack) = ack {
                state.dispatcher.send_to_connection(
                    conn_id,
                    GatewayEvent::MessageAck {
                        ack,
                        success: false,
                        message: None,
                        error: Some(e.to_string()),
                    },
                );
            }
        }
    }
}

/// Participant check, persist, room broadcast, then notification fan-out
/// to the other participants. The broadcast is issued on this task right
/// after the insert returns, which keeps per-conversation delivery in
/// persisted order.
pub async fn deliver_message(
    state: &GatewayState,
    sender_id: Uuid,
    conversation_id: Uuid,
    content: String,
    attachments: Vec<String>,
) -> Result<ChatMessage, SendMessageError> {
    let db = state.db.clone();
    let cid = conversation_id.to_string();
    let participants = task::spawn_blocking(move || db.participant_ids(&cid))
        .await
        .map_err(|e| SendMessageError::Store(anyhow::anyhow!("blocking task failed: {e}")))?
        .map_err(SendMessageError::Store)?;
    let sender = sender_id.to_string();
    if !participants.iter().any(|p| p == &sender) {
        return Err(SendMessageError::NotAParticipant);
    }

    let message_id = Uuid::new_v4();
    let db = state.db.clone();
    let cid = conversation_id.to_string();
    let sid = sender_id.to_string();
    let attachments_json = serde_json::to_string(&attachments).unwrap_or_else(|_| "[]".into());
    let row = task::spawn_blocking(move || {
        db.insert_message(&message_id.to_string(), &cid, &sid, &content, &attachments_json)
    })
    .await
    .map_err(|e| SendMessageError::Store(anyhow::anyhow!("blocking task failed: {e}")))?
    .map_err(SendMessageError::Store)?;
    let message = row.into_model().map_err(SendMessageError::Store)?;

    state.dispatcher.broadcast_to_room(
        conversation_id,
        GatewayEvent::NewMessage {
            conversation_id,
            message: message.clone(),
        },
    );

    let preview: String = message.content.chars().take(PREVIEW_LEN).collect();
    for participant in &participants {
        let Ok(recipient) = participant.parse::<Uuid>() else {
            continue;
        };
        if recipient == sender_id {
            continue;
        }
        state.notifier.notify(
            recipient,
            NotificationKind::Message,
            &format!("New message from {}", message.sender_username),
            &preview,
            serde_json::json!({
                "conversation_id": conversation_id,
                "message_id": message.id,
            }),
            &format!("/conversations/{conversation_id}"),
        );
    }

    Ok(message)
}
