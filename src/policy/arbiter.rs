//! The external decision maker behind the policy gate.

use crate::policy::{PolicyCheck, PolicyToken};
use tokio::sync::mpsc;

/// Receives policy questions and answers them later.
///
/// Implementations must not answer from inside [`check`](Self::check): the
/// answer goes back through the loader's `resolve`, which cannot be entered
/// while the loader is still making the request.
pub trait PolicyArbiter: Send {
    /// A new question. Answer it by resolving `check.token` on the loader.
    fn check(&mut self, check: PolicyCheck);

    /// The question behind `token` was superseded or its load stopped; any
    /// answer to it will be discarded.
    fn withdraw(&mut self, _token: PolicyToken) {}
}

/// Forwards questions over an unbounded channel.
///
/// The receiving side (a UI prompt, a policy service) answers through a
/// [`LoaderHandle`](crate::loader::task::LoaderHandle) or directly on the
/// loader.
#[derive(Debug, Clone)]
pub struct ChannelArbiter {
    tx: mpsc::UnboundedSender<PolicyCheck>,
}

impl ChannelArbiter {
    pub fn new(tx: mpsc::UnboundedSender<PolicyCheck>) -> Self {
        Self { tx }
    }

    /// Create an arbiter and the receiver its questions arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PolicyCheck>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl PolicyArbiter for ChannelArbiter {
    fn check(&mut self, check: PolicyCheck) {
        let token = check.token;
        if self.tx.send(check).is_err() {
            // Nobody is listening; the load stays parked until cancelled.
            tracing::warn!(token = %token, "policy arbiter channel closed");
        }
    }
}
