//! The main resource loader and its collaborators.
//!
//! - [`controller`]: the load state machine ([`MainResourceLoader`])
//! - [`transfer`]: generic exchange lifecycle, cancellation and deferral
//! - [`client`]: transport, owner and download contracts
//! - [`config`]: [`LoaderConfig`]
//! - [`task`]: running a loader on a tokio task

pub mod client;
pub mod config;
pub mod controller;
pub mod task;
pub mod transfer;

pub use client::{DiscardDownloads, DownloadSink, FrameOwner, OwnerEvent, Transport};
pub use config::{ConfigError, LoaderConfig};
pub use controller::MainResourceLoader;
pub use task::{spawn_loader, LoadOutcome, LoaderEvent, LoaderHandle};
pub use transfer::{CancelHandle, ResourceTransfer};
