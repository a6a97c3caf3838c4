use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use huddle_types::events::GatewayEvent;

/// Events a slow consumer may lag behind before the broadcast channel
/// starts dropping on them.
const EVENT_BUFFER: usize = 1024;

/// One authenticated WebSocket connection's server-side record. The
/// conn_id distinguishes a reconnect from the connection it replaced, so
/// the old connection's teardown cannot evict the new session.
struct Session {
    conn_id: Uuid,
    username: String,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

/// Routes gateway events to connections.
///
/// Two delivery paths: channel-scoped and global events go out on one
/// broadcast channel and each connection filters against its own channel
/// subscription set; conversation-scoped events go through the session's
/// targeted sender for exactly the two participants. Presence is derived
/// from the session map, so a user is online precisely while a session of
/// theirs is registered.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Fan an event out to every connection. Nobody listening is fine;
    /// fan-out never fails the mutation that triggered it.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a session for an authenticated connection and announce the
    /// user online. A second connection for the same user replaces the
    /// first session; the replaced connection's targeted receiver closes,
    /// which ends its send loop.
    pub async fn connect(
        &self,
        user_id: Uuid,
        username: String,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner.sessions.write().await.insert(
            user_id,
            Session {
                conn_id,
                username: username.clone(),
                tx,
            },
        );

        self.broadcast(GatewayEvent::PresenceUpdate {
            user_id,
            username,
            online: true,
        });

        (conn_id, rx)
    }

    /// Tear down a session and announce the user offline, but only when
    /// `conn_id` still owns it. A stale teardown racing a reconnect is a
    /// no-op.
    pub async fn disconnect(&self, user_id: Uuid, conn_id: Uuid) {
        let removed = {
            let mut sessions = self.inner.sessions.write().await;
            match sessions.get(&user_id) {
                Some(session) if session.conn_id == conn_id => sessions.remove(&user_id),
                _ => None,
            }
        };

        if let Some(session) = removed {
            self.broadcast(GatewayEvent::PresenceUpdate {
                user_id,
                username: session.username,
                online: false,
            });
        }
    }

    /// Deliver an event to one user's session. No session, no delivery.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let sessions = self.inner.sessions.read().await;
        if let Some(session) = sessions.get(&user_id) {
            let _ = session.tx.send(event);
        }
    }

    /// Snapshot of everyone currently online, for replay to a connection
    /// that just completed its handshake.
    pub async fn online_users(&self) -> Vec<(Uuid, String)> {
        self.inner
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, session)| (*id, session.username.clone()))
            .collect()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::models::StreamScope;

    fn typing(user_id: Uuid) -> GatewayEvent {
        GatewayEvent::TypingStart {
            scope: StreamScope::Channel(Uuid::new_v4()),
            user_id,
            username: "alice".into(),
        }
    }

    #[tokio::test]
    async fn connect_and_disconnect_drive_presence() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let mut rx = dispatcher.subscribe();

        let (conn_id, _user_rx) = dispatcher.connect(alice, "alice".into()).await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            GatewayEvent::PresenceUpdate { online: true, .. }
        ));
        assert_eq!(dispatcher.online_users().await.len(), 1);

        dispatcher.disconnect(alice, conn_id).await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            GatewayEvent::PresenceUpdate { online: false, .. }
        ));
        assert!(dispatcher.online_users().await.is_empty());
    }

    #[tokio::test]
    async fn stale_disconnect_does_not_evict_a_reconnect() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();

        let (old_conn, _old_rx) = dispatcher.connect(alice, "alice".into()).await;
        let (_new_conn, mut new_rx) = dispatcher.connect(alice, "alice".into()).await;

        // The first connection's teardown arrives late.
        dispatcher.disconnect(alice, old_conn).await;

        assert_eq!(dispatcher.online_users().await.len(), 1);
        dispatcher.send_to_user(alice, typing(alice)).await;
        assert!(matches!(
            new_rx.recv().await.unwrap(),
            GatewayEvent::TypingStart { .. }
        ));
    }

    #[tokio::test]
    async fn targeted_delivery_skips_absent_users() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (_conn, mut alice_rx) = dispatcher.connect(alice, "alice".into()).await;

        // Nobody holds a session for bob; this must be a silent no-op.
        dispatcher.send_to_user(bob, typing(bob)).await;

        dispatcher.send_to_user(alice, typing(alice)).await;
        assert!(matches!(
            alice_rx.recv().await.unwrap(),
            GatewayEvent::TypingStart { .. }
        ));
    }
}
