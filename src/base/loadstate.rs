use std::fmt;

/// The current state of a main resource load.
///
/// Exactly one state is live per loader. `Cancelled` and `Failed` are
/// reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Created, `start` not yet called.
    #[default]
    Idle,

    /// A request (initial or redirect target) is about to be checked.
    Requesting,

    /// Waiting for the navigation policy decision. No network I/O for the
    /// pending request has happened yet.
    AwaitingNavigationPolicy,

    /// Dispatched to the transport, waiting for response headers.
    Loading,

    /// Response headers arrived; waiting for the content policy decision.
    /// Body bytes are buffered, not forwarded.
    AwaitingContentPolicy,

    /// Response committed to the owner; body bytes flow through.
    Streaming,

    /// Completed normally, or handed off to a download.
    Finished,

    /// Stopped without an error reaching the owner.
    Cancelled,

    /// Stopped with exactly one failure delivered to the owner.
    Failed,
}

impl LoadState {
    /// Whether no further transitions can happen.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoadState::Finished | LoadState::Cancelled | LoadState::Failed
        )
    }

    /// Whether the load is parked on a policy decision.
    pub fn is_awaiting_policy(self) -> bool {
        matches!(
            self,
            LoadState::AwaitingNavigationPolicy | LoadState::AwaitingContentPolicy
        )
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::Idle => "idle",
            LoadState::Requesting => "requesting",
            LoadState::AwaitingNavigationPolicy => "awaiting-navigation-policy",
            LoadState::Loading => "loading",
            LoadState::AwaitingContentPolicy => "awaiting-content-policy",
            LoadState::Streaming => "streaming",
            LoadState::Finished => "finished",
            LoadState::Cancelled => "cancelled",
            LoadState::Failed => "failed",
        };
        f.write_str(name)
    }
}
