//! The loader's error type.

use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::policy::PolicyToken;
use thiserror::Error;
use url::Url;

/// Errors produced by a main resource load.
///
/// Every variant except [`LoadError::InvalidState`] and
/// [`LoadError::MalformedRequest`] is terminal for the load it belongs to.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// API misuse, such as starting a loader twice.
    #[error("Operation `{operation}` is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: LoadState,
    },

    /// The request cannot be dispatched at all. No callbacks follow.
    #[error("Malformed request for {url}: {reason}")]
    MalformedRequest { url: Url, reason: &'static str },

    /// Relayed unchanged from the transport.
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] NetError),

    /// A policy change stopped a load whose response the owner had already seen.
    #[error("Frame load for {url} interrupted by policy change")]
    PolicyInterruption { url: Url },

    /// The load was cancelled. Never delivered to the owner.
    #[error("Load cancelled")]
    Cancelled,

    /// A decision arrived for a request that is no longer outstanding.
    /// Logged and swallowed; never delivered to the owner.
    #[error("Stale policy decision for {0}")]
    StaleDecision(PolicyToken),

    /// The task running the loader is gone.
    #[error("Loader task has exited")]
    TaskExited,
}

impl LoadError {
    pub(crate) fn invalid_state(operation: &'static str, state: LoadState) -> Self {
        LoadError::InvalidState { operation, state }
    }

    /// The transport error behind this failure, if any.
    pub fn net_error(&self) -> Option<NetError> {
        match self {
            LoadError::TransportFailure(e) => Some(*e),
            _ => None,
        }
    }

    /// Whether this error tells the owner to clean up after a policy change.
    pub fn is_policy_interruption(&self) -> bool {
        matches!(self, LoadError::PolicyInterruption { .. })
    }
}
