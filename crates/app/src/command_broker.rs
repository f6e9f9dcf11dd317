//! Command broker — turns the publish/subscribe bus into request/response.
//!
//! Flow:
//! 1. A producer calls [`CommandBroker::register`] with the command's
//!    correlation key and deadline, and receives a [`PendingResponse`]
//! 2. The producer publishes the request
//! 3. The inbound router sees the device's reply and calls
//!    [`resolve`](CommandBroker::resolve) or [`reject`](CommandBroker::reject)
//! 4. The producer's `PendingResponse` completes, or fails with
//!    [`CommandError::Timeout`] once the deadline passes
//!
//! At most one command per key is outstanding. Each pending entry owns one
//! timer task that is aborted when the entry is resolved, rejected or
//! cancelled.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use homelink_domain::command::{CorrelationKey, DeviceReply};
use homelink_domain::error::CommandError;
use homelink_domain::id::DeviceId;

type Completion = Result<DeviceReply, CommandError>;

struct PendingCommand {
    /// Distinguishes successive registrations of the same key so that a
    /// stale timer never removes a newer entry.
    seq: u64,
    sender: oneshot::Sender<Completion>,
    timer: AbortHandle,
    created_at: Instant,
}

#[derive(Default)]
struct Registry {
    pending: HashMap<CorrelationKey, PendingCommand>,
    next_seq: u64,
}

impl Registry {
    fn outstanding_for(&self, device_id: &DeviceId) -> usize {
        self.pending
            .keys()
            .filter(|key| &key.device_id == device_id)
            .count()
    }
}

/// Registry of in-flight correlated commands.
///
/// Cloning is cheap and every clone shares the same registry.
#[derive(Clone, Default)]
pub struct CommandBroker {
    registry: Arc<Mutex<Registry>>,
    max_outstanding_per_device: Option<usize>,
}

impl CommandBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of commands a single device may have outstanding.
    #[must_use]
    pub fn with_max_outstanding_per_device(mut self, limit: usize) -> Self {
        self.max_outstanding_per_device = Some(limit);
        self
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a command and arm its deadline.
    ///
    /// Must be called from within a Tokio runtime, before the request is
    /// published, so that a fast reply always finds its entry.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::AlreadyInFlight`] when a command with the same
    /// key is outstanding, or [`CommandError::OutstandingLimit`] when the
    /// device has reached its cap.
    pub fn register(
        &self,
        key: CorrelationKey,
        timeout: Duration,
    ) -> Result<PendingResponse, CommandError> {
        let mut registry = self.registry();
        if registry.pending.contains_key(&key) {
            tracing::warn!(%key, "command already in flight");
            return Err(CommandError::AlreadyInFlight { key });
        }
        if let Some(limit) = self.max_outstanding_per_device
            && registry.outstanding_for(&key.device_id) >= limit
        {
            tracing::warn!(%key, limit, "outstanding command limit reached");
            return Err(CommandError::OutstandingLimit {
                device_id: key.device_id,
                limit,
            });
        }

        let seq = registry.next_seq;
        registry.next_seq += 1;

        let (sender, receiver) = oneshot::channel();
        let timer = tokio::spawn(expire_after(
            Arc::downgrade(&self.registry),
            key.clone(),
            seq,
            timeout,
        ))
        .abort_handle();

        registry.pending.insert(
            key.clone(),
            PendingCommand {
                seq,
                sender,
                timer,
                created_at: Instant::now(),
            },
        );
        tracing::debug!(%key, timeout_ms = timeout.as_millis(), "registered pending command");

        Ok(PendingResponse { key, receiver })
    }

    /// Complete the pending command for `key` with the device's reply.
    ///
    /// Returns `false` when nothing is pending for `key` (late or duplicate
    /// reply); the reply is dropped.
    pub fn resolve(&self, key: &CorrelationKey, reply: DeviceReply) -> bool {
        self.complete(key, Ok(reply), "resolved")
    }

    /// Fail the pending command for `key` with a device-reported reason.
    ///
    /// Returns `false` when nothing is pending for `key`.
    pub fn reject(&self, key: &CorrelationKey, reason: impl Into<String>) -> bool {
        let error = CommandError::Rejected {
            key: key.clone(),
            reason: reason.into(),
        };
        self.complete(key, Err(error), "rejected")
    }

    /// Withdraw the pending command for `key`, e.g. because its request could
    /// not be published.
    pub fn cancel(&self, key: &CorrelationKey) -> bool {
        let error = CommandError::Cancelled { key: key.clone() };
        self.complete(key, Err(error), "cancelled")
    }

    fn complete(&self, key: &CorrelationKey, completion: Completion, outcome: &str) -> bool {
        let Some(entry) = self.registry().pending.remove(key) else {
            tracing::debug!(%key, outcome, "no pending command for key, dropping");
            return false;
        };
        entry.timer.abort();
        let elapsed_ms = entry.created_at.elapsed().as_millis();
        if entry.sender.send(completion).is_err() {
            tracing::debug!(%key, outcome, elapsed_ms, "caller stopped waiting");
        } else {
            tracing::debug!(%key, outcome, elapsed_ms, "pending command completed");
        }
        true
    }

    /// Number of commands currently awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.registry().pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, key: &CorrelationKey) -> bool {
        self.registry().pending.contains_key(key)
    }

    /// Number of commands outstanding for one device.
    #[must_use]
    pub fn outstanding_for(&self, device_id: &DeviceId) -> usize {
        self.registry().outstanding_for(device_id)
    }
}

async fn expire_after(
    registry: Weak<Mutex<Registry>>,
    key: CorrelationKey,
    seq: u64,
    timeout: Duration,
) {
    tokio::time::sleep(timeout).await;
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let entry = {
        let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
        match registry.pending.get(&key) {
            Some(entry) if entry.seq == seq => registry.pending.remove(&key),
            _ => None,
        }
    };
    if let Some(entry) = entry {
        tracing::warn!(%key, timeout_ms = timeout.as_millis(), "device did not answer in time");
        let _ = entry.sender.send(Err(CommandError::Timeout { key, timeout }));
    }
}

/// Awaitable side of a registered command.
///
/// Dropping it does not withdraw the command; the entry stays until the
/// device answers or the deadline passes.
#[derive(Debug)]
pub struct PendingResponse {
    key: CorrelationKey,
    receiver: oneshot::Receiver<Completion>,
}

impl PendingResponse {
    #[must_use]
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }
}

impl Future for PendingResponse {
    type Output = Result<DeviceReply, CommandError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(completion)) => Poll::Ready(completion),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CommandError::Cancelled {
                key: this.key.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}
