//! Contracts between the loader and its collaborators.

use crate::base::error::LoadError;
use crate::http::{LoadRequest, LoadResponse};
use bytes::Bytes;

/// The component that performs network I/O for a load.
///
/// The loader drives it with these commands; the transport reports back
/// through the loader's `on_*` callbacks.
pub trait Transport: Send {
    /// Send `request`. After a redirect callback this continues the transfer
    /// with the follow-up request; until then the transport holds the redirect.
    fn dispatch(&mut self, request: &LoadRequest);

    /// Stop the transfer. No further callbacks should arrive. Called at most once.
    fn cancel(&mut self);
}

/// The frame or document on whose behalf the load runs.
///
/// This is the only way the owner observes the load.
pub trait FrameOwner: Send {
    fn deliver_response(&mut self, response: &LoadResponse);
    fn deliver_data(&mut self, data: &Bytes);
    fn deliver_finished(&mut self);
    fn deliver_failed(&mut self, error: &LoadError);
}

/// Takes over a load whose policy decision was `Download`.
pub trait DownloadSink: Send {
    /// `response` is `None` when navigation policy chose to download before
    /// anything was fetched.
    fn start_download(&mut self, request: &LoadRequest, response: Option<&LoadResponse>);
}

/// Drops download handoffs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardDownloads;

impl DownloadSink for DiscardDownloads {
    fn start_download(&mut self, request: &LoadRequest, _response: Option<&LoadResponse>) {
        tracing::warn!(url = %request.url(), "download requested but no download sink installed");
    }
}

/// Owner-visible calls, as values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerEvent {
    Response(LoadResponse),
    Data(Bytes),
    Finished,
    Failed(LoadError),
}

impl OwnerEvent {
    /// Whether this event ends the load for the owner.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OwnerEvent::Finished | OwnerEvent::Failed(_))
    }
}
