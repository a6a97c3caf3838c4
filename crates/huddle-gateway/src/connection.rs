use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{info, warn};
use uuid::Uuid;

use huddle_types::api::Claims;
use huddle_types::events::{GatewayCommand, GatewayEvent};
use huddle_types::models::StreamScope;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a single WebSocket connection: Identify handshake, then the
/// event loop.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let (user_id, username) = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", username, user_id);

    // Step 2: Send Ready event
    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    run_connection_loop(sender, receiver, dispatcher, user_id, username).await;
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).unwrap();
    sender.send(Message::Text(text.into())).await
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    user_id: Uuid,
    username: String,
) {
    // Snapshot who is online before registering, so the replay covers
    // everyone but this user.
    let existing_users = dispatcher.online_users().await;

    let (conn_id, mut user_rx) = dispatcher.connect(user_id, username.clone()).await;

    for (uid, uname) in &existing_users {
        let event = GatewayEvent::PresenceUpdate {
            user_id: *uid,
            username: uname.clone(),
            online: true,
        };
        if send_event(&mut sender, &event).await.is_err() {
            dispatcher.disconnect(user_id, conn_id).await;
            return;
        }
    }

    let mut broadcast_rx = dispatcher.subscribe();
    let dispatcher_clone = dispatcher.clone();

    // Per-connection channel subscriptions (shared between send and recv tasks).
    let subscribed_channels: Arc<std::sync::RwLock<HashSet<Uuid>>> =
        Arc::new(std::sync::RwLock::new(HashSet::new()));
    let send_subscriptions = subscribed_channels.clone();

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    match event.scope() {
                        Some(StreamScope::Channel(channel_id)) => {
                            let subs = send_subscriptions.read()
                                .expect("subscription lock poisoned");
                            if !subs.contains(&channel_id) {
                                continue;
                            }
                        }
                        // Conversation events never take the broadcast
                        // path; drop any that do.
                        Some(StreamScope::Conversation(_)) => continue,
                        None => {}
                    }

                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };

                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
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
    let username_recv = username.clone();
    let recv_subscriptions = subscribed_channels.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_clone, user_id, &username_recv, cmd, &recv_subscriptions);
                    }
                    Err(e) => {
                        warn!("Malformed gateway command from {}: {}", username_recv, e);
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

    // If either task exits, tear the connection down
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} ({}) disconnected from gateway", username, user_id);
    dispatcher.disconnect(user_id, conn_id).await;
}

fn handle_command(
    dispatcher: &Dispatcher,
    user_id: Uuid,
    username: &str,
    cmd: GatewayCommand,
    subscriptions: &Arc<std::sync::RwLock<HashSet<Uuid>>>,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {
            // Already identified; ignore.
        }
        GatewayCommand::Subscribe { channel_ids } => {
            let mut subs = subscriptions.write().expect("subscription lock poisoned");
            *subs = channel_ids.into_iter().collect();
        }
        GatewayCommand::StartTyping { channel_id } => {
            dispatcher.broadcast(GatewayEvent::TypingStart {
                scope: StreamScope::Channel(channel_id),
                user_id,
                username: username.to_string(),
            });
        }
    }
}

/// Wait for the client's Identify command and validate its JWT.
async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<(Uuid, String)> {
    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else {
            continue;
        };

        let Ok(GatewayCommand::Identify { token }) = serde_json::from_str::<GatewayCommand>(&text)
        else {
            warn!("Expected Identify as first gateway command");
            return None;
        };

        let token_data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .ok()?;

        return Some((token_data.claims.sub, token_data.claims.username));
    }

    None
}
