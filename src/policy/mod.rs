//! Asynchronous policy decisions.
//!
//! A load asks two questions: may this request proceed as a navigation, and
//! what should happen with this response's content. Both are answered by an
//! external [`PolicyArbiter`] at some later time; the [`PolicyGate`] matches
//! answers to questions through [`PolicyToken`]s.

pub mod arbiter;
pub mod gate;
pub mod rules;

pub use arbiter::{ChannelArbiter, PolicyArbiter};
pub use gate::PolicyGate;
pub use rules::DefaultPolicy;

use crate::http::{LoadRequest, LoadResponse};
use std::fmt;

/// Which question a decision answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyClass {
    /// May this request proceed as a frame navigation?
    Navigation,
    /// Render, download or ignore this response?
    Content,
}

/// The outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyDecision {
    Continue,
    Cancel,
    Download,
    Ignore,
}

/// Identifies one outstanding policy request.
///
/// `sequence` is unique per gate; `generation` is the loader's delivery
/// generation when the request was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyToken {
    class: PolicyClass,
    sequence: u64,
    generation: u64,
}

impl PolicyToken {
    pub(crate) fn new(class: PolicyClass, sequence: u64, generation: u64) -> Self {
        Self {
            class,
            sequence,
            generation,
        }
    }

    pub fn class(&self) -> PolicyClass {
        self.class
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for PolicyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}#{} (generation {})",
            self.class, self.sequence, self.generation
        )
    }
}

/// What a policy check is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySubject {
    Navigation(LoadRequest),
    Content {
        mime_type: String,
        response: LoadResponse,
    },
}

impl PolicySubject {
    pub fn class(&self) -> PolicyClass {
        match self {
            PolicySubject::Navigation(_) => PolicyClass::Navigation,
            PolicySubject::Content { .. } => PolicyClass::Content,
        }
    }
}

/// A question handed to the arbiter, answered later with its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyCheck {
    pub token: PolicyToken,
    pub subject: PolicySubject,
}
