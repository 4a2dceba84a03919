//! Correlation of outbound calls with their responses.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::mpsc::SyncSender;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tandem_wire::{RequestId, Response, RpcError};
use thiserror::Error;
use tracing::debug;

const PENDING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pending");

/// One-shot continuation for a pending call.
pub(crate) type Completion = SyncSender<Response>;

/// Reasons a call cannot be registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum RegisterError {
    #[error("call id {0} is already pending")]
    Duplicate(RequestId),
    #[error("connection closed")]
    Closed,
}

impl RegisterError {
    pub(crate) fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::Duplicate(_) => RpcError::internal(self),
            Self::Closed => RpcError::unretryable(self),
        }
    }
}

#[derive(Default)]
struct TableState {
    waiting: HashMap<RequestId, Completion>,
    closed: bool,
}

/// Outstanding calls keyed by id.
///
/// Each entry leaves the table exactly once: through [`resolve`], through
/// [`abandon`], or when [`close`] fails every remaining call. Completions are
/// signalled while the lock is held, so a caller that loses an `abandon` race
/// can rely on its completion already being queued.
///
/// [`resolve`]: CorrelationTable::resolve
/// [`abandon`]: CorrelationTable::abandon
/// [`close`]: CorrelationTable::close
#[derive(Default)]
pub(crate) struct CorrelationTable {
    state: Mutex<TableState>,
}

impl CorrelationTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // Every operation is a single insert or remove, so a poisoned table is
    // still consistent.
    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, id: RequestId, completion: Completion) -> Result<(), RegisterError> {
        let mut state = self.lock();
        if state.closed {
            return Err(RegisterError::Closed);
        }
        match state.waiting.entry(id) {
            Entry::Occupied(occupied) => Err(RegisterError::Duplicate(occupied.key().clone())),
            Entry::Vacant(vacant) => {
                vacant.insert(completion);
                Ok(())
            }
        }
    }

    /// Delivers `response` to its caller. Returns `false` when no call was
    /// waiting for that id.
    pub(crate) fn resolve(&self, response: Response) -> bool {
        let mut state = self.lock();
        let Some(completion) = state.waiting.remove(&response.id) else {
            return false;
        };
        // The channel has room for exactly one message and this is the only
        // send, so the only possible failure is a caller that already left.
        if let Err(error) = completion.try_send(response) {
            debug!(
                target: PENDING_TARGET,
                error = %error,
                "caller departed before its response arrived"
            );
        }
        true
    }

    /// Withdraws a call without signalling it. Returns `false` when the entry
    /// was already consumed.
    pub(crate) fn abandon(&self, id: &RequestId) -> bool {
        self.lock().waiting.remove(id).is_some()
    }

    /// Fails every pending call with `error` and refuses new registrations.
    pub(crate) fn close(&self, error: &RpcError) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let drained: Vec<_> = state.waiting.drain().collect();
        for (id, completion) in &drained {
            if completion
                .try_send(Response::failure(id.clone(), error.clone()))
                .is_err()
            {
                debug!(target: PENDING_TARGET, id = %id, "caller departed before close");
            }
        }
        drained.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().waiting.len()
    }
}
