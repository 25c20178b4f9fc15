//! Correlation of outstanding calls with their responses

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

use turul_peer_json_rpc::{JsonRpcResponse, RequestId};

use crate::error::{ProtocolError, TransportError};

/// What a suspended caller eventually receives
pub type CallOutcome = Result<JsonRpcResponse, TransportError>;

/// Table of outstanding calls keyed by correlation id.
///
/// Whoever removes an entry resolves it, so every call is resolved exactly once: by its
/// response, by teardown, or by the caller abandoning it.
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: Mutex<HashMap<RequestId, oneshot::Sender<CallOutcome>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call. Fails if `id` is already outstanding.
    pub fn register(&self, id: RequestId) -> Result<oneshot::Receiver<CallOutcome>, ProtocolError> {
        let mut calls = self.calls.lock();
        if calls.contains_key(&id) {
            return Err(ProtocolError::DuplicateRequestId(id));
        }
        let (sender, receiver) = oneshot::channel();
        calls.insert(id, sender);
        Ok(receiver)
    }

    /// Resolve the call matching `response.id`. Hands the response back if nobody waits for it.
    pub fn resolve(&self, response: JsonRpcResponse) -> Result<(), JsonRpcResponse> {
        let sender = self.calls.lock().remove(&response.id);
        match sender {
            // A receiver dropped in the meantime is an abandoned call; nothing left to do
            Some(sender) => {
                let _ = sender.send(Ok(response));
                Ok(())
            }
            None => Err(response),
        }
    }

    /// Drop the entry for `id` without resolving it
    pub fn release(&self, id: &RequestId) -> bool {
        self.calls.lock().remove(id).is_some()
    }

    /// Resolve every outstanding call with [`TransportError::Cancelled`]. Returns how many.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.calls.lock().drain().collect();
        let count = drained.len();
        for (_, sender) in drained {
            let _ = sender.send(Err(TransportError::Cancelled));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

/// Releases a pending entry if the caller stops waiting before it is resolved
pub(crate) struct PendingGuard<'a> {
    calls: &'a PendingCalls,
    id: Option<RequestId>,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(calls: &'a PendingCalls, id: RequestId) -> Self {
        Self { calls, id: Some(id) }
    }

    /// The entry was resolved; leave the table alone on drop
    pub(crate) fn disarm(mut self) {
        self.id = None;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take()
            && self.calls.release(&id)
        {
            tracing::debug!(id = %id, "Released abandoned call");
        }
    }
}

/// Correlation id source: `"{random prefix}-{counter}"`
#[derive(Debug)]
pub struct RequestIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self {
            prefix: format!("{:016x}", rand::random::<u64>()),
            counter: AtomicU64::new(0),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_id(&self) -> RequestId {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        RequestId::String(format!("{}-{}", self.prefix, counter))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
