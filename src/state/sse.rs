use tokio::sync::{Mutex, broadcast};

use crate::dto::sse::ServerEvent;

/// Both SSE streams plus the admin token guard.
pub struct SseState {
    public: SseHub,
    admin: SseHub,
    admin_token: Mutex<Option<String>>,
}

impl SseState {
    /// Build both hubs with the same channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            public: SseHub::new(capacity),
            admin: SseHub::new(capacity),
            admin_token: Mutex::new(None),
        }
    }

    /// Hub feeding the projector and the waiting screens.
    pub fn public(&self) -> &SseHub {
        &self.public
    }

    /// Hub feeding the single admin console.
    pub fn admin(&self) -> &SseHub {
        &self.admin
    }

    /// Token held by the admin stream currently connected, if any.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        &self.admin_token
    }
}

/// Broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers. Nobody listening is not an error.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
