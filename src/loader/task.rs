//! Running a loader on its own tokio task.
//!
//! The loader itself is single-threaded. [`spawn_loader`] gives it a home
//! task and a channel: transport callbacks, policy answers and defer toggles
//! become [`LoaderEvent`]s processed strictly in the order they were sent.
//! Only cancellation bypasses the channel, through the shared
//! [`CancelHandle`].

use crate::base::error::LoadError;
use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::http::{LoadRequest, LoadResponse};
use crate::loader::client::{FrameOwner, OwnerEvent, Transport};
use crate::loader::controller::MainResourceLoader;
use crate::loader::transfer::CancelHandle;
use crate::policy::{PolicyDecision, PolicyToken};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Everything a loader's home task can be asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderEvent {
    Start(LoadRequest),
    WillSendRequest {
        request: LoadRequest,
        redirect_response: LoadResponse,
    },
    ResponseReceived(LoadResponse),
    DataReceived {
        data: Bytes,
        length_received: i64,
    },
    Finished,
    Failed(NetError),
    Decision {
        token: PolicyToken,
        decision: PolicyDecision,
    },
    SetDefersLoading(bool),
    StopForPolicyChange,
    Cancel,
}

impl MainResourceLoader {
    /// Apply one event. Errors are the synchronous API errors of the
    /// corresponding call; load failures go to the owner instead.
    pub fn dispatch(&mut self, event: LoaderEvent) -> Result<(), LoadError> {
        match event {
            LoaderEvent::Start(request) => self.start(request)?,
            LoaderEvent::WillSendRequest {
                request,
                redirect_response,
            } => {
                self.on_will_send_request(request, redirect_response);
            }
            LoaderEvent::ResponseReceived(response) => self.on_response_received(response),
            LoaderEvent::DataReceived {
                data,
                length_received,
            } => self.on_data_received(data, length_received),
            LoaderEvent::Finished => self.on_finished(),
            LoaderEvent::Failed(error) => self.on_failed(error),
            LoaderEvent::Decision { token, decision } => self.resolve(token, decision),
            LoaderEvent::SetDefersLoading(defers) => self.set_defers_loading(defers),
            LoaderEvent::StopForPolicyChange => self.stop_loading_for_policy_change()?,
            LoaderEvent::Cancel => self.cancel(),
        }
        Ok(())
    }
}

/// How a spawned load ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub state: LoadState,
    pub error: Option<LoadError>,
    pub bytes_received: u64,
}

/// Talks to a loader running on its own task.
#[derive(Debug)]
pub struct LoaderHandle {
    tx: mpsc::UnboundedSender<LoaderEvent>,
    cancel: CancelHandle,
    task: JoinHandle<LoadOutcome>,
}

/// Move `loader` onto a new tokio task.
///
/// The task exits once the load reaches a terminal state, or when every
/// sender is gone.
pub fn spawn_loader(loader: MainResourceLoader) -> LoaderHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = loader.cancel_handle();
    let task = tokio::spawn(run(loader, rx));
    LoaderHandle { tx, cancel, task }
}

async fn run(
    mut loader: MainResourceLoader,
    mut rx: mpsc::UnboundedReceiver<LoaderEvent>,
) -> LoadOutcome {
    while let Some(event) = rx.recv().await {
        if let Err(e) = loader.dispatch(event) {
            tracing::debug!(error = %e, "loader event rejected");
        }
        if loader.state().is_terminal() {
            break;
        }
    }
    LoadOutcome {
        state: loader.state(),
        error: loader.error().cloned(),
        bytes_received: loader.bytes_received(),
    }
}

impl LoaderHandle {
    /// Queue an event for the loader's task.
    pub fn send(&self, event: LoaderEvent) -> Result<(), LoadError> {
        self.tx.send(event).map_err(|_| LoadError::TaskExited)
    }

    pub fn start(&self, request: LoadRequest) -> Result<(), LoadError> {
        self.send(LoaderEvent::Start(request))
    }

    pub fn resolve(&self, token: PolicyToken, decision: PolicyDecision) -> Result<(), LoadError> {
        self.send(LoaderEvent::Decision { token, decision })
    }

    pub fn set_defers_loading(&self, defers: bool) -> Result<(), LoadError> {
        self.send(LoaderEvent::SetDefersLoading(defers))
    }

    /// Cancel from any thread. Takes effect before the task's next step even
    /// if earlier events are still queued.
    pub fn cancel(&self) {
        self.cancel.cancel();
        // Wake the task; it may already be gone.
        let _ = self.tx.send(LoaderEvent::Cancel);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait for the task to exit.
    ///
    /// Dropping every other sender first lets a load that never reaches a
    /// terminal state exit too.
    pub async fn join(self) -> Result<LoadOutcome, LoadError> {
        drop(self.tx);
        self.task.await.map_err(|_| LoadError::TaskExited)
    }
}

/// Commands a loader sends to its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    Dispatch(LoadRequest),
    Cancel,
}

/// A [`Transport`] that forwards commands over a channel to whatever
/// performs the I/O.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<TransportCommand>,
}

impl ChannelTransport {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn dispatch(&mut self, request: &LoadRequest) {
        if self.tx.send(TransportCommand::Dispatch(request.clone())).is_err() {
            tracing::warn!(url = %request.url(), "transport channel closed");
        }
    }

    fn cancel(&mut self) {
        let _ = self.tx.send(TransportCommand::Cancel);
    }
}

/// A [`FrameOwner`] that forwards every call as an [`OwnerEvent`].
#[derive(Debug, Clone)]
pub struct ChannelOwner {
    tx: mpsc::UnboundedSender<OwnerEvent>,
}

impl ChannelOwner {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OwnerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: OwnerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("frame owner channel closed");
        }
    }
}

impl FrameOwner for ChannelOwner {
    fn deliver_response(&mut self, response: &LoadResponse) {
        self.send(OwnerEvent::Response(response.clone()));
    }

    fn deliver_data(&mut self, data: &Bytes) {
        self.send(OwnerEvent::Data(data.clone()));
    }

    fn deliver_finished(&mut self) {
        self.send(OwnerEvent::Finished);
    }

    fn deliver_failed(&mut self, error: &LoadError) {
        self.send(OwnerEvent::Failed(error.clone()));
    }
}
