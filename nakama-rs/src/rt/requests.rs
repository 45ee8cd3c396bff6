//! Correlation table for requests awaiting a reply.
//!
//! Entries are always removed under the lock and completed after it is
//! released, so a continuation may issue new requests without deadlocking.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::error::RtError;
use super::message::EnvelopeMessage;

/// Attempts to find a free id before giving up.
const MAX_RESERVE_ATTEMPTS: usize = 10;

/// Once the table drains, ids above this restart from zero.
const RESET_THRESHOLD: i32 = 9;

type SuccessFn = Box<dyn FnOnce(Option<EnvelopeMessage>) -> Result<(), RtError> + Send>;
type ErrorFn = Box<dyn FnOnce(RtError) + Send>;

/// Continuations of one in-flight request.
pub struct PendingRequest {
    on_success: Option<SuccessFn>,
    on_error: Option<ErrorFn>,
}

impl PendingRequest {
    pub fn new() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }

    /// Called with the reply message. Returning an error routes it to the
    /// error continuation instead.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Option<EnvelopeMessage>) -> Result<(), RtError> + Send + 'static,
    {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RtError) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn has_error_handler(&self) -> bool {
        self.on_error.is_some()
    }

    /// Run the matching continuation. Returns the error back when no
    /// continuation took it.
    pub fn complete(self, outcome: Result<Option<EnvelopeMessage>, RtError>) -> Option<RtError> {
        let err = match outcome {
            Ok(message) => match self.on_success {
                Some(on_success) => match on_success(message) {
                    Ok(()) => return None,
                    Err(e) => e,
                },
                None => return None,
            },
            Err(e) => e,
        };

        match self.on_error {
            Some(on_error) => {
                on_error(err);
                None
            }
            None => Some(err),
        }
    }
}

impl Default for PendingRequest {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner {
    next_cid: i32,
    pending: HashMap<i32, PendingRequest>,
}

/// Maps correlation ids to their pending requests.
pub struct RequestTable {
    inner: Mutex<Inner>,
}

impl RequestTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_cid: 0,
                pending: HashMap::new(),
            }),
        }
    }

    /// Store `request` under a fresh id. Hands the request back if no free id
    /// was found.
    pub fn reserve(&self, request: PendingRequest) -> Result<i32, PendingRequest> {
        let mut inner = self.inner.lock();

        if inner.pending.is_empty() && inner.next_cid > RESET_THRESHOLD {
            inner.next_cid = 0;
        }

        for _ in 0..MAX_RESERVE_ATTEMPTS {
            let cid = inner.next_cid;
            inner.next_cid = inner.next_cid.checked_add(1).unwrap_or(0);

            if inner.pending.contains_key(&cid) {
                tracing::error!("cid {} is already in use", cid);
                continue;
            }

            inner.pending.insert(cid, request);
            return Ok(cid);
        }

        tracing::error!(
            "no free cid after {} attempts, {} requests pending",
            MAX_RESERVE_ATTEMPTS,
            inner.pending.len()
        );
        Err(request)
    }

    /// Remove and return the request registered under `cid`.
    pub fn resolve(&self, cid: i32) -> Option<PendingRequest> {
        self.inner.lock().pending.remove(&cid)
    }

    /// Drain the table and fail every request with `err`.
    ///
    /// Only error continuations run; errors nobody handles are dropped.
    pub fn cancel_all(&self, err: &RtError) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut inner = self.inner.lock();
            inner.pending.drain().map(|(_, request)| request).collect()
        };

        let count = drained.len();
        for request in drained {
            if let Some(on_error) = request.on_error {
                on_error(err.clone());
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().pending.is_empty()
    }

    pub fn contains(&self, cid: i32) -> bool {
        self.inner.lock().pending.contains_key(&cid)
    }
}

impl Default for RequestTable {
    fn default() -> Self {
        Self::new()
    }
}
