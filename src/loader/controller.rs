//! The main resource loader.
//!
//! Loads a frame's top-level document. Every request, including each
//! redirect target, passes navigation policy before it reaches the
//! transport; every response, including each multipart part, passes content
//! policy before the owner sees it.
//!
//! ```text
//! Idle -> Requesting -> AwaitingNavigationPolicy -> Loading
//!      -> AwaitingContentPolicy -> Streaming -> Finished
//!                         (any) -> Cancelled | Failed
//! ```
//!
//! Policy answers arrive later through [`MainResourceLoader::resolve`]. Each
//! answer carries the token of its request and is discarded if a newer
//! request superseded it or the delivery generation moved on.

use crate::base::error::LoadError;
use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::http::{LoadRequest, LoadResponse, MultipartEvent, MultipartParser};
use crate::loader::client::{DiscardDownloads, DownloadSink, FrameOwner, Transport};
use crate::loader::config::LoaderConfig;
use crate::loader::transfer::{check_request, CancelHandle, Notification, ResourceTransfer};
use crate::policy::{PolicyArbiter, PolicyClass, PolicyDecision, PolicyGate, PolicyToken};
use bytes::Bytes;
use http::StatusCode;
use std::collections::VecDeque;

/// Multipart bookkeeping for the current load.
struct Multipart {
    /// The enclosing `multipart/x-mixed-replace` response.
    wrapper: LoadResponse,
    /// Present when the loader splits the body itself.
    parser: Option<MultipartParser>,
}

/// Loads the main resource of a frame.
pub struct MainResourceLoader {
    config: LoaderConfig,
    transfer: ResourceTransfer,
    gate: PolicyGate,
    owner: Box<dyn FrameOwner>,
    downloads: Box<dyn DownloadSink>,
    state: LoadState,
    initial_request: Option<LoadRequest>,
    request: Option<LoadRequest>,
    response: Option<LoadResponse>,
    multipart: Option<Multipart>,
    pending_data: VecDeque<Bytes>,
    pending_bytes: usize,
    pending_finish: bool,
    /// Bumped on every redirect and every new response or part.
    generation: u64,
    redirect_count: u32,
    last_redirect_status: Option<StatusCode>,
    owner_saw_response: bool,
    error: Option<LoadError>,
}

impl MainResourceLoader {
    /// Create a loader with the default configuration.
    pub fn new(
        transport: Box<dyn Transport>,
        arbiter: Box<dyn PolicyArbiter>,
        owner: Box<dyn FrameOwner>,
    ) -> Self {
        Self {
            config: LoaderConfig::default(),
            transfer: ResourceTransfer::new(transport),
            gate: PolicyGate::new(arbiter),
            owner,
            downloads: Box::new(DiscardDownloads),
            state: LoadState::Idle,
            initial_request: None,
            request: None,
            response: None,
            multipart: None,
            pending_data: VecDeque::new(),
            pending_bytes: 0,
            pending_finish: false,
            generation: 0,
            redirect_count: 0,
            last_redirect_status: None,
            owner_saw_response: false,
            error: None,
        }
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_download_sink(mut self, sink: Box<dyn DownloadSink>) -> Self {
        self.downloads = sink;
        self
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Begin loading `request`.
    ///
    /// Asks navigation policy first; nothing is sent until it answers
    /// `Continue`. A malformed request is rejected and leaves the loader
    /// unstarted.
    pub fn start(&mut self, request: LoadRequest) -> Result<(), LoadError> {
        if self.state != LoadState::Idle {
            return Err(LoadError::invalid_state("start", self.state));
        }
        if self.transfer.is_cancelled() {
            self.halted();
            return Err(LoadError::Cancelled);
        }
        check_request(&request, &self.config)?;

        tracing::debug!(url = %request.url(), method = %request.method(), "starting main resource load");
        self.initial_request = Some(request.clone());
        self.request = Some(request);
        self.transition(LoadState::Requesting);
        self.check_navigation_policy();
        Ok(())
    }

    /// Cancel the load. Nothing further reaches the owner.
    pub fn cancel(&mut self) {
        self.cancel_with(LoadError::Cancelled);
    }

    /// Cancel the load, recording `error` as the reason.
    pub fn cancel_with(&mut self, error: LoadError) {
        if self.state.is_terminal() {
            return;
        }
        self.transfer.cancel(error);
        self.halted();
    }

    /// A handle that cancels this load from any thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.transfer.cancel_handle()
    }

    /// Suspend or resume processing of transport notifications and decisions.
    ///
    /// Resuming replays everything queued meanwhile, in arrival order.
    pub fn set_defers_loading(&mut self, defers: bool) {
        if self.halted() {
            return;
        }
        if !self.transfer.set_defers_loading(defers) {
            return;
        }
        tracing::debug!(defers, queued = self.transfer.deferred_len(), "defers loading changed");
        if !defers {
            self.replay_deferred();
        }
    }

    /// Fail the load because a policy that governs it changed.
    ///
    /// The owner receives a `PolicyInterruption` failure so it can clean up.
    pub fn stop_loading_for_policy_change(&mut self) -> Result<(), LoadError> {
        if self.state == LoadState::Idle || self.state.is_terminal() {
            return Err(LoadError::invalid_state(
                "stop_loading_for_policy_change",
                self.state,
            ));
        }
        if self.halted() {
            return Ok(());
        }
        let error = self.interruption_for_policy_change_error();
        self.fail(error);
        Ok(())
    }

    /// Deliver a policy decision for `token`.
    pub fn resolve(&mut self, token: PolicyToken, decision: PolicyDecision) {
        if self.halted() {
            return;
        }
        if self.transfer.defers_loading() {
            self.transfer.defer(Notification::Decision { token, decision });
            return;
        }
        self.handle_decision(token, decision);
    }

    // ---------------------------------------------------------------------
    // Transport callbacks
    // ---------------------------------------------------------------------

    /// The transport is about to follow a redirect to `new_request`.
    ///
    /// Returns `new_request` with method, body and credentials adjusted as
    /// the redirect requires, or `None` if the load is over. The transport
    /// holds the redirect until navigation policy approves it and the loader
    /// dispatches the returned request.
    pub fn on_will_send_request(
        &mut self,
        new_request: LoadRequest,
        redirect_response: LoadResponse,
    ) -> Option<LoadRequest> {
        if self.halted() {
            return None;
        }
        let next = match &self.request {
            Some(current) => current.follow_redirect(new_request, redirect_response.status()),
            None => new_request,
        };

        if self.transfer.defers_loading() {
            self.transfer.defer(Notification::Redirect {
                request: next.clone(),
                redirect_response,
            });
            return Some(next);
        }
        self.handle_redirect(next.clone(), redirect_response);
        if self.state.is_terminal() {
            None
        } else {
            Some(next)
        }
    }

    pub fn on_response_received(&mut self, response: LoadResponse) {
        if self.halted() {
            return;
        }
        if self.transfer.defers_loading() {
            self.transfer.defer(Notification::Response(response));
            return;
        }
        self.handle_response(response);
    }

    pub fn on_data_received(&mut self, data: Bytes, length_received: i64) {
        if self.halted() {
            return;
        }
        if self.transfer.defers_loading() {
            self.transfer.defer(Notification::Data {
                data,
                length_received,
            });
            return;
        }
        self.handle_data(data, length_received);
    }

    pub fn on_finished(&mut self) {
        if self.halted() {
            return;
        }
        if self.transfer.defers_loading() {
            self.transfer.defer(Notification::Finished);
            return;
        }
        self.handle_finished();
    }

    pub fn on_failed(&mut self, error: NetError) {
        if self.halted() {
            return;
        }
        if self.transfer.defers_loading() {
            self.transfer.defer(Notification::Failed(error));
            return;
        }
        self.handle_failed(error);
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn initial_request(&self) -> Option<&LoadRequest> {
        self.initial_request.as_ref()
    }

    /// The request being loaded, after any redirects.
    pub fn current_request(&self) -> Option<&LoadRequest> {
        self.request.as_ref()
    }

    /// The response (or part) currently awaiting policy or being streamed.
    pub fn response(&self) -> Option<&LoadResponse> {
        self.response.as_ref()
    }

    /// The error the load failed with, or the cancellation reason.
    pub fn error(&self) -> Option<&LoadError> {
        self.error
            .as_ref()
            .or_else(|| self.transfer.cancellation_error())
    }

    pub fn is_loading_multipart_content(&self) -> bool {
        self.multipart.is_some()
    }

    pub fn is_waiting_for_content_policy(&self) -> bool {
        self.state == LoadState::AwaitingContentPolicy
    }

    pub fn defers_loading(&self) -> bool {
        self.transfer.defers_loading()
    }

    pub fn redirect_count(&self) -> u32 {
        self.redirect_count
    }

    pub fn bytes_received(&self) -> u64 {
        self.transfer.bytes_received()
    }

    pub fn delivery_generation(&self) -> u64 {
        self.generation
    }

    /// Whether following `new_request` would resubmit form data: it is a
    /// POST, or a 301, 302, 303 or 307 redirect of a load that started as a
    /// POST.
    pub fn is_post_or_redirect_after_post(
        &self,
        new_request: &LoadRequest,
        redirect_response: Option<&LoadResponse>,
    ) -> bool {
        if new_request.is_post() {
            return true;
        }
        let after_post_redirect = redirect_response
            .map(|r| r.status())
            .or(self.last_redirect_status)
            .is_some_and(|status| {
                matches!(status.as_u16(), 301..=303)
                    || status == StatusCode::TEMPORARY_REDIRECT
            });
        after_post_redirect
            && self
                .initial_request
                .as_ref()
                .is_some_and(LoadRequest::is_post)
    }

    // ---------------------------------------------------------------------
    // State machine
    // ---------------------------------------------------------------------

    fn transition(&mut self, next: LoadState) {
        tracing::debug!(from = %self.state, to = %next, "load state transition");
        self.state = next;
    }

    /// Check point run before any work: applies a pending cancellation.
    /// Returns `true` if the load is over and the caller must do nothing.
    fn halted(&mut self) -> bool {
        if self.state.is_terminal() {
            return true;
        }
        if !self.transfer.acknowledge_cancel() {
            return false;
        }
        self.gate.withdraw_all();
        self.clear_pending();
        self.multipart = None;
        self.transition(LoadState::Cancelled);
        true
    }

    fn replay_deferred(&mut self) {
        while let Some(notification) = self.transfer.next_deferred() {
            if self.halted() {
                return;
            }
            match notification {
                Notification::Redirect {
                    request,
                    redirect_response,
                } => self.handle_redirect(request, redirect_response),
                Notification::Response(response) => self.handle_response(response),
                Notification::Data {
                    data,
                    length_received,
                } => self.handle_data(data, length_received),
                Notification::Finished => self.handle_finished(),
                Notification::Failed(error) => self.handle_failed(error),
                Notification::Decision { token, decision } => {
                    self.handle_decision(token, decision)
                }
            }
        }
    }

    fn check_navigation_policy(&mut self) {
        let Some(request) = self.request.as_ref() else {
            return;
        };
        let token = self.gate.request_navigation_policy(request, self.generation);
        tracing::debug!(token = %token, url = %request.url(), "navigation policy requested");
        self.transition(LoadState::AwaitingNavigationPolicy);
    }

    fn handle_redirect(&mut self, request: LoadRequest, redirect_response: LoadResponse) {
        if self.state != LoadState::Loading {
            tracing::warn!(state = %self.state, url = %request.url(), "redirect outside loading state ignored");
            return;
        }

        self.redirect_count += 1;
        if self.redirect_count > self.config.redirect_limit {
            self.fail(LoadError::TransportFailure(NetError::TooManyRedirects));
            return;
        }
        if check_request(&request, &self.config).is_err() {
            self.fail(LoadError::TransportFailure(NetError::UnsafeRedirect));
            return;
        }

        tracing::debug!(
            from = %redirect_response.url(),
            to = %request.url(),
            status = %redirect_response.status(),
            "following redirect"
        );
        // Response-dependent state belongs to the previous hop.
        self.generation += 1;
        self.gate.withdraw(PolicyClass::Content);
        self.response = None;
        self.multipart = None;
        self.clear_pending();
        self.last_redirect_status = Some(redirect_response.status());
        self.request = Some(request);

        self.transition(LoadState::Requesting);
        self.check_navigation_policy();
    }

    fn handle_response(&mut self, response: LoadResponse) {
        match self.state {
            LoadState::Loading if self.multipart.is_none() => self.begin_response(response),
            LoadState::Loading | LoadState::AwaitingContentPolicy | LoadState::Streaming
                if self.multipart.is_some() =>
            {
                self.begin_part(response)
            }
            _ => {
                tracing::warn!(state = %self.state, url = %response.url(), "unexpected response ignored");
            }
        }
    }

    fn begin_response(&mut self, response: LoadResponse) {
        if !response.is_multipart() {
            self.begin_part(response);
            return;
        }

        let parser = if self.config.split_multipart {
            response.multipart_boundary().map(MultipartParser::new)
        } else {
            None
        };
        tracing::debug!(
            url = %response.url(),
            split = parser.is_some(),
            "loading multipart content"
        );
        self.multipart = Some(Multipart {
            wrapper: response,
            parser,
        });
    }

    /// Start a `Loading -> AwaitingContentPolicy` cycle for `response`.
    fn begin_part(&mut self, response: LoadResponse) {
        if !self.pending_data.is_empty() {
            tracing::debug!(
                dropped = self.pending_bytes,
                "part superseded before its content decision"
            );
        }
        self.clear_pending();
        self.generation += 1;

        let token = self.gate.request_content_policy(&response, self.generation);
        tracing::debug!(token = %token, mime = response.mime_type(), "content policy requested");
        self.response = Some(response);
        self.transition(LoadState::AwaitingContentPolicy);
    }

    fn handle_data(&mut self, data: Bytes, length_received: i64) {
        self.transfer.record_received(data.len());
        tracing::trace!(len = data.len(), length_received, "data received");

        let parsed = self
            .multipart
            .as_mut()
            .and_then(|m| m.parser.as_mut())
            .map(|parser| parser.feed(&data));
        match parsed {
            None => self.route_data(data),
            Some(Ok(events)) => self.apply_multipart_events(events),
            Some(Err(e)) => self.fail(LoadError::TransportFailure(e)),
        }
    }

    fn apply_multipart_events(&mut self, events: Vec<MultipartEvent>) {
        for event in events {
            if self.state.is_terminal() {
                return;
            }
            match event {
                MultipartEvent::Part(headers) => {
                    let Some(wrapper) = self.multipart.as_ref().map(|m| &m.wrapper) else {
                        return;
                    };
                    let part =
                        LoadResponse::from_parts(wrapper.url().clone(), wrapper.status(), headers);
                    self.begin_part(part);
                }
                MultipartEvent::Data(bytes) => self.route_data(bytes),
                MultipartEvent::End => tracing::debug!("multipart body complete"),
            }
        }
    }

    fn route_data(&mut self, data: Bytes) {
        match self.state {
            LoadState::Streaming => {
                if !self.halted() {
                    self.owner.deliver_data(&data);
                }
            }
            LoadState::AwaitingContentPolicy => {
                self.pending_bytes += data.len();
                if self.pending_bytes > self.config.max_pending_bytes {
                    self.fail(LoadError::TransportFailure(NetError::NoBufferSpace));
                    return;
                }
                self.pending_data.push_back(data);
            }
            _ => {
                tracing::warn!(state = %self.state, len = data.len(), "data outside a response dropped");
            }
        }
    }

    fn handle_finished(&mut self) {
        self.transfer.transport_finished();

        let flushed = self
            .multipart
            .as_mut()
            .and_then(|m| m.parser.as_mut())
            .map(MultipartParser::finish);
        match flushed {
            Some(Ok(events)) => self.apply_multipart_events(events),
            Some(Err(e)) => {
                self.fail(LoadError::TransportFailure(e));
                return;
            }
            None => {}
        }
        if self.state.is_terminal() {
            return;
        }

        match self.state {
            LoadState::Streaming => self.complete(),
            LoadState::AwaitingContentPolicy => self.pending_finish = true,
            LoadState::Loading => self.fail(LoadError::TransportFailure(NetError::EmptyResponse)),
            _ => {
                tracing::warn!(state = %self.state, "finish outside loading ignored");
            }
        }
    }

    fn handle_failed(&mut self, error: NetError) {
        tracing::debug!(error = %error, "transport failed");
        self.transfer.transport_finished();
        self.fail(LoadError::TransportFailure(error));
    }

    fn handle_decision(&mut self, token: PolicyToken, decision: PolicyDecision) {
        if let Err(stale) = self.gate.accept(token) {
            tracing::debug!(error = %stale, ?decision, "discarding policy decision");
            return;
        }
        let expected_state = match token.class() {
            PolicyClass::Navigation => LoadState::AwaitingNavigationPolicy,
            PolicyClass::Content => LoadState::AwaitingContentPolicy,
        };
        if token.generation() != self.generation || self.state != expected_state {
            tracing::debug!(
                token = %token,
                generation = self.generation,
                state = %self.state,
                ?decision,
                "discarding policy decision from an earlier generation"
            );
            return;
        }

        tracing::debug!(token = %token, ?decision, "policy decided");
        match token.class() {
            PolicyClass::Navigation => self.continue_after_navigation_policy(decision),
            PolicyClass::Content => self.continue_after_content_policy(decision),
        }
    }

    fn continue_after_navigation_policy(&mut self, decision: PolicyDecision) {
        let Some(request) = self.request.clone() else {
            return;
        };
        match decision {
            PolicyDecision::Continue => {
                self.transition(LoadState::Loading);
                if let Err(e) = self.transfer.start(&request, &self.config) {
                    self.fail(e);
                }
            }
            PolicyDecision::Download => self.hand_off_to_download(&request, None),
            PolicyDecision::Cancel | PolicyDecision::Ignore => self.stop_for_policy(decision),
        }
    }

    fn continue_after_content_policy(&mut self, decision: PolicyDecision) {
        let Some(response) = self.response.clone() else {
            return;
        };
        match decision {
            PolicyDecision::Continue => {
                self.transition(LoadState::Streaming);
                if self.halted() {
                    return;
                }
                self.owner_saw_response = true;
                self.owner.deliver_response(&response);

                while let Some(chunk) = self.pending_data.pop_front() {
                    self.pending_bytes -= chunk.len();
                    if self.halted() {
                        return;
                    }
                    self.owner.deliver_data(&chunk);
                }
                if std::mem::take(&mut self.pending_finish) {
                    self.complete();
                }
            }
            PolicyDecision::Download => {
                let request = self
                    .request
                    .clone()
                    .unwrap_or_else(|| LoadRequest::new(response.url().clone()));
                self.hand_off_to_download(&request, Some(&response));
            }
            PolicyDecision::Cancel | PolicyDecision::Ignore => self.stop_for_policy(decision),
        }
    }

    /// `Cancel`/`Ignore`: silent before the owner saw a response, an
    /// interruption error after.
    fn stop_for_policy(&mut self, decision: PolicyDecision) {
        if self.owner_saw_response {
            let error = self.interruption_for_policy_change_error();
            self.fail(error);
            return;
        }
        tracing::debug!(?decision, "load stopped by policy");
        self.transfer.cancel(LoadError::Cancelled);
        self.halted();
    }

    fn hand_off_to_download(&mut self, request: &LoadRequest, response: Option<&LoadResponse>) {
        tracing::debug!(url = %request.url(), "handing load off to download");
        self.gate.withdraw_all();
        self.clear_pending();
        self.transfer.stop_transport();
        self.downloads.start_download(request, response);
        self.transition(LoadState::Finished);
        if self.owner_saw_response && !self.transfer.is_cancelled() {
            self.owner.deliver_finished();
        }
    }

    fn complete(&mut self) {
        if self.halted() {
            return;
        }
        self.gate.withdraw_all();
        self.transfer.stop_transport();
        self.transition(LoadState::Finished);
        self.owner.deliver_finished();
    }

    fn fail(&mut self, error: LoadError) {
        if self.halted() {
            return;
        }
        tracing::debug!(error = %error, "main resource load failed");
        self.gate.withdraw_all();
        self.clear_pending();
        self.transfer.stop_transport();
        self.transition(LoadState::Failed);
        self.owner.deliver_failed(&error);
        self.error = Some(error);
    }

    fn interruption_for_policy_change_error(&self) -> LoadError {
        let url = self
            .request
            .as_ref()
            .or(self.initial_request.as_ref())
            .map(|r| r.url().clone())
            .or_else(|| self.response.as_ref().map(|r| r.url().clone()));
        match url {
            Some(url) => LoadError::PolicyInterruption { url },
            None => LoadError::Cancelled,
        }
    }

    fn clear_pending(&mut self) {
        self.pending_data.clear();
        self.pending_bytes = 0;
        self.pending_finish = false;
    }
}

impl std::fmt::Debug for MainResourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainResourceLoader")
            .field("state", &self.state)
            .field("url", &self.request.as_ref().map(|r| r.url().as_str()))
            .field("generation", &self.generation)
            .field("redirect_count", &self.redirect_count)
            .field("multipart", &self.multipart.is_some())
            .field("transfer", &self.transfer)
            .field("gate", &self.gate)
            .finish()
    }
}
