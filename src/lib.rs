//! # mainload
//!
//! A Chromium/WebKit-inspired loader for a frame's main resource.
//!
//! `mainload` implements the state machine that fetches a frame's top-level
//! document: it asks navigation policy before anything is sent (and again for
//! every redirect), asks content policy before the owner sees a response,
//! splits multipart responses into parts, and supports deferral and
//! cancellation from any thread. Network I/O, the policy arbiter and the
//! frame itself are collaborators behind traits.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mainload::loader::MainResourceLoader;
//! use mainload::http::LoadRequest;
//!
//! let mut loader = MainResourceLoader::new(transport, arbiter, owner);
//! loader.start(LoadRequest::parse("https://example.com")?)?;
//! // arbiter later answers:
//! loader.resolve(token, PolicyDecision::Continue);
//! // transport reports back:
//! loader.on_response_received(response);
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Errors and load states
//! - [`http`] - Request/response values and the multipart splitter
//! - [`policy`] - Policy tokens, the decision gate and arbiters
//! - [`loader`] - The loader, its transfer, configuration and async driver

pub mod base;
pub mod http;
pub mod loader;
pub mod policy;

pub use base::error::LoadError;
pub use base::loadstate::LoadState;
pub use base::neterror::NetError;
pub use loader::MainResourceLoader;
pub use policy::{PolicyDecision, PolicyToken};
