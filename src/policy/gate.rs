//! Matches asynchronous policy answers to the questions that asked for them.

use crate::base::error::LoadError;
use crate::http::{LoadRequest, LoadResponse};
use crate::policy::{PolicyArbiter, PolicyCheck, PolicyClass, PolicySubject, PolicyToken};

/// Issues policy requests and validates the decisions that come back.
///
/// At most one request per [`PolicyClass`] is outstanding; a new request
/// supersedes the previous one of the same class. A decision is accepted
/// once, for the latest token of its class only.
pub struct PolicyGate {
    arbiter: Box<dyn PolicyArbiter>,
    next_sequence: u64,
    navigation: Option<PolicyToken>,
    content: Option<PolicyToken>,
}

impl PolicyGate {
    pub fn new(arbiter: Box<dyn PolicyArbiter>) -> Self {
        Self {
            arbiter,
            next_sequence: 1,
            navigation: None,
            content: None,
        }
    }

    /// Ask whether `request` may proceed as a navigation.
    pub fn request_navigation_policy(
        &mut self,
        request: &LoadRequest,
        generation: u64,
    ) -> PolicyToken {
        self.request(PolicySubject::Navigation(request.clone()), generation)
    }

    /// Ask what to do with `response`'s content.
    pub fn request_content_policy(
        &mut self,
        response: &LoadResponse,
        generation: u64,
    ) -> PolicyToken {
        self.request(
            PolicySubject::Content {
                mime_type: response.mime_type().to_string(),
                response: response.clone(),
            },
            generation,
        )
    }

    fn request(&mut self, subject: PolicySubject, generation: u64) -> PolicyToken {
        let class = subject.class();
        let token = PolicyToken::new(class, self.next_sequence, generation);
        self.next_sequence += 1;

        if let Some(previous) = self.slot(class).replace(token) {
            tracing::debug!(token = %previous, "policy request superseded");
            self.arbiter.withdraw(previous);
        }

        self.arbiter.check(PolicyCheck { token, subject });
        token
    }

    /// Validate a decision's token and retire it.
    ///
    /// Fails with [`LoadError::StaleDecision`] unless `token` is the latest
    /// outstanding request of its class.
    pub fn accept(&mut self, token: PolicyToken) -> Result<(), LoadError> {
        let slot = self.slot(token.class());
        if *slot == Some(token) {
            *slot = None;
            Ok(())
        } else {
            Err(LoadError::StaleDecision(token))
        }
    }

    /// The outstanding request of `class`, if any.
    pub fn outstanding(&self, class: PolicyClass) -> Option<PolicyToken> {
        match class {
            PolicyClass::Navigation => self.navigation,
            PolicyClass::Content => self.content,
        }
    }

    /// Withdraw the outstanding request of `class`.
    pub fn withdraw(&mut self, class: PolicyClass) {
        if let Some(token) = self.slot(class).take() {
            self.arbiter.withdraw(token);
        }
    }

    /// Withdraw every outstanding request.
    pub fn withdraw_all(&mut self) {
        self.withdraw(PolicyClass::Navigation);
        self.withdraw(PolicyClass::Content);
    }

    fn slot(&mut self, class: PolicyClass) -> &mut Option<PolicyToken> {
        match class {
            PolicyClass::Navigation => &mut self.navigation,
            PolicyClass::Content => &mut self.content,
        }
    }
}

impl std::fmt::Debug for PolicyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyGate")
            .field("next_sequence", &self.next_sequence)
            .field("navigation", &self.navigation)
            .field("content", &self.content)
            .finish()
    }
}
