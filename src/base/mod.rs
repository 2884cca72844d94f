//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): transport error codes matching `net_error_list.h`
//! - [`LoadError`](error::LoadError): the loader's own error type
//! - [`LoadState`](loadstate::LoadState): the main resource load state machine

pub mod error;
pub mod loadstate;
pub mod neterror;

#[cfg(test)]
mod tests;
