use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use quad_types::events::GatewayEvent;

/// Connection registry for the realtime gateway: per-user personal
/// channels (all of a user's live connections) and per-conversation rooms.
///
/// All methods are synchronous, so a caller can broadcast immediately
/// after its database write returns; that is what keeps per-conversation
/// delivery in persisted order.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// conn_id -> the connection's user and outbound queue
    connections: RwLock<HashMap<Uuid, Handle>>,
    /// Personal channels: user_id -> every live connection of that user.
    users: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
    /// Rooms: conversation_id -> member connections.
    rooms: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

struct Handle {
    user_id: Uuid,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                connections: RwLock::new(HashMap::new()),
                users: RwLock::new(HashMap::new()),
                rooms: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new connection under the user's personal channel.
    /// Returns (conn_id, receiver); the receiver is the connection's
    /// outbound event queue.
    pub fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner
            .connections
            .write()
            .expect("dispatcher lock poisoned")
            .insert(conn_id, Handle { user_id, tx });
        self.inner
            .users
            .write()
            .expect("dispatcher lock poisoned")
            .entry(user_id)
            .or_default()
            .insert(conn_id);

        (conn_id, rx)
    }

    /// Remove a connection entirely: drops the personal-channel entry and
    /// implicitly leaves every room the connection was in.
    pub fn unregister(&self, conn_id: Uuid) {
        let handle = self
            .inner
            .connections
            .write()
            .expect("dispatcher lock poisoned")
            .remove(&conn_id);

        if let Some(handle) = handle {
            let mut users = self.inner.users.write().expect("dispatcher lock poisoned");
            if let Some(conns) = users.get_mut(&handle.user_id) {
                conns.remove(&conn_id);
                if conns.is_empty() {
                    users.remove(&handle.user_id);
                }
            }
        }

        let mut rooms = self.inner.rooms.write().expect("dispatcher lock poisoned");
        rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Idempotent: joining a room the connection is already in is a no-op.
    pub fn join_room(&self, conversation_id: Uuid, conn_id: Uuid) {
        self.inner
            .rooms
            .write()
            .expect("dispatcher lock poisoned")
            .entry(conversation_id)
            .or_default()
            .insert(conn_id);
    }

    /// Idempotent: leaving a room the connection is not in is a no-op.
    pub fn leave_room(&self, conversation_id: Uuid, conn_id: Uuid) {
        let mut rooms = self.inner.rooms.write().expect("dispatcher lock poisoned");
        if let Some(members) = rooms.get_mut(&conversation_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(&conversation_id);
            }
        }
    }

    pub fn send_to_connection(&self, conn_id: Uuid, event: GatewayEvent) {
        let connections = self
            .inner
            .connections
            .read()
            .expect("dispatcher lock poisoned");
        if let Some(handle) = connections.get(&conn_id) {
            let _ = handle.tx.send(event);
        }
    }

    /// Deliver to every live connection of a user. Returns false when the
    /// user has no live connection (the event is simply dropped; persisted
    /// state is the caller's concern).
    pub fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        let users = self.inner.users.read().expect("dispatcher lock poisoned");
        let Some(conns) = users.get(&user_id) else {
            return false;
        };

        let connections = self
            .inner
            .connections
            .read()
            .expect("dispatcher lock poisoned");
        let mut delivered = false;
        for conn_id in conns {
            if let Some(handle) = connections.get(conn_id) {
                let _ = handle.tx.send(event.clone());
                delivered = true;
            }
        }
        delivered
    }

    /// Deliver to every connection currently in a conversation's room.
    pub fn broadcast_to_room(&self, conversation_id: Uuid, event: GatewayEvent) {
        let rooms = self.inner.rooms.read().expect("dispatcher lock poisoned");
        let Some(members) = rooms.get(&conversation_id) else {
            return;
        };

        let connections = self
            .inner
            .connections
            .read()
            .expect("dispatcher lock poisoned");
        for conn_id in members {
            if let Some(handle) = connections.get(conn_id) {
                let _ = handle.tx.send(event.clone());
            }
        }
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.inner
            .users
            .read()
            .expect("dispatcher lock poisoned")
            .contains_key(&user_id)
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

    fn ready(user_id: Uuid) -> GatewayEvent {
        GatewayEvent::Ready {
            user_id,
            username: "test".into(),
        }
    }

    #[test]
    fn personal_channel_reaches_every_connection_of_the_user() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (_c1, mut rx1) = dispatcher.register(user);
        let (_c2, mut rx2) = dispatcher.register(user);

        assert!(dispatcher.send_to_user(user, ready(user)));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());

        // Nobody listening for a stranger
        assert!(!dispatcher.send_to_user(Uuid::new_v4(), ready(user)));
    }

    #[test]
    fn send_to_connection_targets_exactly_one() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (c1, mut rx1) = dispatcher.register(user);
        let (_c2, mut rx2) = dispatcher.register(user);

        dispatcher.send_to_connection(c1, ready(user));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn room_join_is_idempotent_and_leave_unknown_is_noop() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let room = Uuid::new_v4();
        let (conn, mut rx) = dispatcher.register(user);

        dispatcher.join_room(room, conn);
        dispatcher.join_room(room, conn);
        dispatcher.broadcast_to_room(room, ready(user));

        // One membership, one delivery
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        dispatcher.leave_room(room, conn);
        dispatcher.leave_room(room, conn);
        dispatcher.leave_room(Uuid::new_v4(), conn);
        dispatcher.broadcast_to_room(room, ready(user));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unregister_drops_personal_channel_and_rooms() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let room = Uuid::new_v4();
        let (conn, mut rx) = dispatcher.register(user);
        dispatcher.join_room(room, conn);
        assert!(dispatcher.is_online(user));

        dispatcher.unregister(conn);

        assert!(!dispatcher.is_online(user));
        assert!(!dispatcher.send_to_user(user, ready(user)));
        dispatcher.broadcast_to_room(room, ready(user));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unregister_leaves_other_connections_online() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (c1, _rx1) = dispatcher.register(user);
        let (_c2, mut rx2) = dispatcher.register(user);

        dispatcher.unregister(c1);

        assert!(dispatcher.is_online(user));
        assert!(dispatcher.send_to_user(user, ready(user)));
        assert!(rx2.try_recv().is_ok());
    }
}
