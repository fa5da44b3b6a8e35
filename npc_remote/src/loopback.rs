//! In-process transport connecting a client to an [`NpcServer`].

use crate::server::NpcServer;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use npc_ipc::{MessageEnvelope, MessageId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

const CHANNEL_CAPACITY: usize = 64;

type PendingTable = Mutex<HashMap<MessageId, oneshot::Sender<MessageEnvelope>>>;

fn lock(table: &PendingTable) -> MutexGuard<'_, HashMap<MessageId, oneshot::Sender<MessageEnvelope>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a pending entry when its waiter goes away
struct PendingGuard<'a> {
    table: &'a PendingTable,
    id: MessageId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.table).remove(&self.id);
    }
}

/// Tokio channel transport with a pending-reply table keyed by request id
///
/// Dropping the transport closes the server's inbound channel, which
/// cancels every call still running on the server.
pub struct LoopbackTransport {
    requests: mpsc::Sender<MessageEnvelope>,
    pending: Arc<PendingTable>,
}

impl LoopbackTransport {
    /// Spawns `server` and a response pump on the current Tokio runtime
    pub fn connect(server: Arc<NpcServer>) -> Self {
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (response_tx, mut response_rx) = mpsc::channel::<MessageEnvelope>(CHANNEL_CAPACITY);
        tokio::spawn(server.serve(request_rx, response_tx));

        let pending: Arc<PendingTable> = Arc::new(Mutex::new(HashMap::new()));
        let table = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(response) = response_rx.recv().await {
                let waiter = response
                    .correlation_id
                    .and_then(|id| lock(&table).remove(&id));
                match waiter {
                    Some(waiter) => {
                        if waiter.send(response).is_err() {
                            tracing::debug!("waiter dropped before response arrived");
                        }
                    }
                    None => {
                        tracing::debug!(correlation_id = ?response.correlation_id, "dropping uncorrelated response");
                    }
                }
            }
        });

        Self {
            requests: request_tx,
            pending,
        }
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn exchange(&self, request: MessageEnvelope) -> Result<MessageEnvelope, TransportError> {
        let (waiter, response) = oneshot::channel();
        let id = request.id;
        lock(&self.pending).insert(id, waiter);
        let _guard = PendingGuard {
            table: &self.pending,
            id,
        };

        self.requests
            .send(request)
            .await
            .map_err(|_| TransportError::Closed)?;
        response.await.map_err(|_| TransportError::Closed)
    }

    async fn notify(&self, message: MessageEnvelope) -> Result<(), TransportError> {
        self.requests
            .send(message)
            .await
            .map_err(|_| TransportError::Closed)
    }
}
