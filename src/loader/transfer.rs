//! One in-flight request/response exchange.
//!
//! [`ResourceTransfer`] owns the transport, the cross-thread cancellation
//! flag and the queue of notifications held back while loading is deferred.
//! It knows nothing about policy; loaders embed it and decide what the
//! notifications mean.

use crate::base::error::LoadError;
use crate::base::neterror::NetError;
use crate::http::{LoadRequest, LoadResponse};
use crate::loader::client::Transport;
use crate::loader::config::LoaderConfig;
use crate::policy::{PolicyDecision, PolicyToken};
use bytes::Bytes;
use http::Method;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// A notification held back while loading is deferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Redirect {
        request: LoadRequest,
        redirect_response: LoadResponse,
    },
    Response(LoadResponse),
    Data {
        data: Bytes,
        length_received: i64,
    },
    Finished,
    Failed(NetError),
    Decision {
        token: PolicyToken,
        decision: PolicyDecision,
    },
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    error: OnceLock<LoadError>,
}

/// Thread-safe handle that cancels a transfer.
///
/// Cancelling only raises a flag; the transfer's home task honors it at its
/// next check point, before any further owner-visible call.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel with [`LoadError::Cancelled`].
    pub fn cancel(&self) -> bool {
        self.cancel_with(LoadError::Cancelled)
    }

    /// Cancel, recording `error`. Returns `false` if already cancelled.
    pub fn cancel_with(&self, error: LoadError) -> bool {
        let first = self.inner.error.set(error).is_ok();
        self.inner.cancelled.store(true, Ordering::Release);
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// The error the first cancellation recorded.
    pub fn error(&self) -> Option<&LoadError> {
        self.inner.error.get()
    }
}

/// Reject requests that can never be dispatched.
pub fn check_request(request: &LoadRequest, config: &LoaderConfig) -> Result<(), LoadError> {
    let url = request.url();
    let malformed = |reason| LoadError::MalformedRequest {
        url: url.clone(),
        reason,
    };

    if !config.allows_scheme(url.scheme()) {
        return Err(malformed("scheme not allowed"));
    }
    if matches!(url.scheme(), "http" | "https") && url.host_str().map_or(true, str::is_empty) {
        return Err(malformed("missing host"));
    }
    let bodiless = *request.method() == Method::GET || *request.method() == Method::HEAD;
    if bodiless && request.body().is_some() {
        return Err(malformed("GET or HEAD request with a body"));
    }
    Ok(())
}

/// Generic lifecycle of a single request/response exchange.
pub struct ResourceTransfer {
    transport: Box<dyn Transport>,
    cancel: CancelHandle,
    dispatched: bool,
    transport_stopped: bool,
    defers_loading: bool,
    deferred: VecDeque<Notification>,
    bytes_received: u64,
}

impl ResourceTransfer {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            cancel: CancelHandle::new(),
            dispatched: false,
            transport_stopped: false,
            defers_loading: false,
            deferred: VecDeque::new(),
            bytes_received: 0,
        }
    }

    /// Validate `request` and send it.
    pub fn start(&mut self, request: &LoadRequest, config: &LoaderConfig) -> Result<(), LoadError> {
        check_request(request, config)?;
        self.dispatch(request);
        Ok(())
    }

    fn dispatch(&mut self, request: &LoadRequest) {
        if self.is_cancelled() || self.transport_stopped {
            return;
        }
        tracing::debug!(url = %request.url(), method = %request.method(), "dispatching request");
        self.dispatched = true;
        self.transport.dispatch(request);
    }

    /// Cancel the transfer. Idempotent; the first error wins.
    pub fn cancel(&mut self, error: LoadError) {
        self.cancel.cancel_with(error);
        self.acknowledge_cancel();
    }

    /// Apply a cancellation raised through a [`CancelHandle`]. Returns whether
    /// the transfer is cancelled.
    pub fn acknowledge_cancel(&mut self) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        self.deferred.clear();
        self.stop_transport();
        true
    }

    /// Stop the transport without marking the transfer cancelled, e.g. when
    /// the load finished or was handed to a download. A transport that was
    /// never given a request is not told anything.
    pub fn stop_transport(&mut self) {
        if self.transport_stopped {
            return;
        }
        self.transport_stopped = true;
        if self.dispatched {
            self.transport.cancel();
        }
    }

    /// Whether a request has reached the transport.
    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Record that the transport is done on its own; it is not told to stop.
    pub fn transport_finished(&mut self) {
        self.transport_stopped = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancellation_error(&self) -> Option<&LoadError> {
        self.cancel.error()
    }

    pub fn defers_loading(&self) -> bool {
        self.defers_loading
    }

    /// Returns `true` if the value changed.
    pub fn set_defers_loading(&mut self, defers: bool) -> bool {
        if self.defers_loading == defers {
            return false;
        }
        self.defers_loading = defers;
        true
    }

    /// Queue a notification for replay.
    pub fn defer(&mut self, notification: Notification) {
        tracing::trace!(queued = self.deferred.len() + 1, "deferring notification");
        self.deferred.push_back(notification);
    }

    /// Next notification to replay, unless loading is deferred again.
    pub fn next_deferred(&mut self) -> Option<Notification> {
        if self.defers_loading {
            return None;
        }
        self.deferred.pop_front()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn record_received(&mut self, len: usize) {
        self.bytes_received += len as u64;
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}

impl std::fmt::Debug for ResourceTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTransfer")
            .field("cancelled", &self.is_cancelled())
            .field("dispatched", &self.dispatched)
            .field("transport_stopped", &self.transport_stopped)
            .field("defers_loading", &self.defers_loading)
            .field("deferred", &self.deferred.len())
            .field("bytes_received", &self.bytes_received)
            .finish()
    }
}
