use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use quad_types::api::Claims;
use quad_types::events::{GatewayCommand, GatewayEvent};

use crate::GatewayState;
use crate::chat;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh connection has to present its Identify token.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection: Identify handshake, Ready, then
/// the command/event loop until the transport closes.
pub async fn handle_connection(socket: WebSocket, state: GatewayState) {
    let (mut sender, mut receiver) = socket.split();

    // No registry state exists until the handshake succeeds, so a rejected
    // connection leaves nothing to clean up.
    let (user_id, username) = match wait_for_identify(&mut receiver, &state).await {
        Some(identity) => identity,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", username, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    run_connection_loop(sender, receiver, state, user_id, username).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    state: GatewayState,
    user_id: Uuid,
    username: String,
) {
    let (conn_id, mut user_rx) = state.dispatcher.register(user_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Forward queued events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!(
                                "Heartbeat timeout (missed {} pongs), dropping connection",
                                missed_heartbeats
                            );
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_state = state.clone();
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&recv_state, conn_id, user_id, &username_recv, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            username_recv,
                            user_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Drops the personal channel and implicitly leaves every joined room.
    state.dispatcher.unregister(conn_id);
    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    state: &GatewayState,
) -> Option<(Uuid, String)> {
    let handshake = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;
                    let user_id = token_data.claims.sub;

                    // A valid token can outlive its account.
                    let db = state.db.clone();
                    let id = user_id.to_string();
                    let user = task::spawn_blocking(move || db.get_user_by_id(&id))
                        .await
                        .ok()?
                        .ok()??;

                    return Some((user_id, user.username));
                }
            }
        }
        None
    });

    handshake.await.ok().flatten()
}

async fn handle_command(
    state: &GatewayState,
    conn_id: Uuid,
    user_id: Uuid,
    username: &str,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // already handled at handshake

        GatewayCommand::JoinConversation { conversation_id } => {
            // Room members receive every broadcast, so only participants
            // may join.
            let db = state.db.clone();
            let cid = conversation_id.to_string();
            let uid = user_id.to_string();
            let allowed = matches!(
                task::spawn_blocking(move || db.is_participant(&cid, &uid)).await,
                Ok(Ok(true))
            );
            if allowed {
                state.dispatcher.join_room(conversation_id, conn_id);
            } else {
                warn!(
                    "{} ({}) denied joining conversation {}",
                    username, user_id, conversation_id
                );
            }
        }

        GatewayCommand::LeaveConversation { conversation_id } => {
            state.dispatcher.leave_room(conversation_id, conn_id);
        }

        GatewayCommand::SendMessage {
            conversation_id,
            content,
            attachments,
            ack,
        } => {
            chat::send_message(state, conn_id, user_id, conversation_id, content, attachments, ack)
                .await;
        }
    }
}
