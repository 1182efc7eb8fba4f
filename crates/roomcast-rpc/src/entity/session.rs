use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Room, Store, User};

/// Failure to hand a frame to a session's transport.
#[derive(Debug, thiserror::Error)]
pub enum OutboundError {
    /// Transport closed or writer gone.
    #[error("session {0} is closed")]
    Closed(String),
    /// Message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One live connection.
///
/// Outbound frames go through a bounded queue drained by the transport's
/// writer. Cancelling `closed` marks the transport as closed; sends fail
/// from then on.
pub struct Session {
    id: String,
    authenticated: AtomicBool,
    user: RwLock<Option<Arc<User>>>,
    tx: mpsc::Sender<String>,
    closed: CancellationToken,
    store: Store,
}

impl Session {
    /// Create a session that writes to `tx`.
    pub fn new(tx: mpsc::Sender<String>) -> Arc<Self> {
        Arc::new(Self {
            id: uuid::Uuid::now_v7().to_string(),
            authenticated: AtomicBool::new(false),
            user: RwLock::new(None),
            tx,
            closed: CancellationToken::new(),
            store: Store::new(),
        })
    }

    /// Unique session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether `authenticate` has succeeded on this session.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Mark the session authenticated.
    pub fn authenticate(&self) {
        self.authenticated.store(true, Ordering::Release);
    }

    /// Owning user, if linked.
    pub fn user(&self) -> Option<Arc<User>> {
        self.user.read().clone()
    }

    /// Room of the owning user, if any.
    pub fn room(&self) -> Option<Arc<Room>> {
        self.user().and_then(|user| user.room())
    }

    /// Per-session scratch store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Queue a raw text frame for the transport.
    pub async fn send_frame(&self, frame: String) -> Result<(), OutboundError> {
        if self.closed.is_cancelled() {
            return Err(OutboundError::Closed(self.id.clone()));
        }
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(OutboundError::Closed(self.id.clone())),
            sent = self.tx.send(frame) => sent.map_err(|_| OutboundError::Closed(self.id.clone())),
        }
    }

    /// Serialize and queue a message.
    pub async fn send_message<T: Serialize + ?Sized>(
        &self,
        message: &T,
    ) -> Result<(), OutboundError> {
        let frame = serde_json::to_string(message)?;
        self.send_frame(frame).await
    }

    /// Close the transport side. Idempotent.
    pub fn close_transport(&self) {
        self.closed.cancel();
    }

    /// Whether the transport has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled when the transport closes.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Detach from the owning user and drop authentication.
    ///
    /// When this was the user's last session the user leaves its room and
    /// the directory.
    pub fn close(&self) {
        self.detach_user();
    }

    pub(crate) fn bind_user(&self, user: Arc<User>) {
        *self.user.write() = Some(user);
    }

    /// Unlink the owning user. Authentication belongs to that link, so it
    /// is dropped too.
    pub(crate) fn detach_user(&self) {
        self.authenticated.store(false, Ordering::Release);
        let user = self.user.write().take();
        if let Some(user) = user {
            debug!(session = %self.id, login = user.login(), "detaching session from user");
            user.release_session(&self.id);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("authenticated", &self.is_authenticated())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
