//! Recording fakes shared by the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use mainload::http::{LoadRequest, LoadResponse};
use mainload::loader::task::TransportCommand;
use mainload::loader::{DownloadSink, FrameOwner, LoaderConfig, MainResourceLoader, OwnerEvent, Transport};
use mainload::policy::{PolicyArbiter, PolicyCheck, PolicyClass, PolicyDecision, PolicyToken};
use mainload::LoadError;
use std::sync::{Arc, Mutex};
use url::Url;

type Shared<T> = Arc<Mutex<Vec<T>>>;

#[derive(Default, Clone)]
pub struct RecordingOwner(Shared<OwnerEvent>);

impl FrameOwner for RecordingOwner {
    fn deliver_response(&mut self, response: &LoadResponse) {
        self.0.lock().unwrap().push(OwnerEvent::Response(response.clone()));
    }

    fn deliver_data(&mut self, data: &Bytes) {
        self.0.lock().unwrap().push(OwnerEvent::Data(data.clone()));
    }

    fn deliver_finished(&mut self) {
        self.0.lock().unwrap().push(OwnerEvent::Finished);
    }

    fn deliver_failed(&mut self, error: &LoadError) {
        self.0.lock().unwrap().push(OwnerEvent::Failed(error.clone()));
    }
}

#[derive(Default, Clone)]
pub struct RecordingTransport(Shared<TransportCommand>);

impl Transport for RecordingTransport {
    fn dispatch(&mut self, request: &LoadRequest) {
        self.0
            .lock()
            .unwrap()
            .push(TransportCommand::Dispatch(request.clone()));
    }

    fn cancel(&mut self) {
        self.0.lock().unwrap().push(TransportCommand::Cancel);
    }
}

#[derive(Default, Clone)]
pub struct QueueArbiter {
    checks: Shared<PolicyCheck>,
    withdrawn: Shared<PolicyToken>,
}

impl PolicyArbiter for QueueArbiter {
    fn check(&mut self, check: PolicyCheck) {
        self.checks.lock().unwrap().push(check);
    }

    fn withdraw(&mut self, token: PolicyToken) {
        self.withdrawn.lock().unwrap().push(token);
    }
}

#[derive(Default, Clone)]
pub struct RecordingDownloads(Shared<(LoadRequest, Option<LoadResponse>)>);

impl DownloadSink for RecordingDownloads {
    fn start_download(&mut self, request: &LoadRequest, response: Option<&LoadResponse>) {
        self.0
            .lock()
            .unwrap()
            .push((request.clone(), response.cloned()));
    }
}

/// A loader wired to recording fakes.
pub struct Harness {
    pub loader: MainResourceLoader,
    owner: RecordingOwner,
    transport: RecordingTransport,
    arbiter: QueueArbiter,
    downloads: RecordingDownloads,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Self {
        let owner = RecordingOwner::default();
        let transport = RecordingTransport::default();
        let arbiter = QueueArbiter::default();
        let downloads = RecordingDownloads::default();
        let loader = MainResourceLoader::new(
            Box::new(transport.clone()),
            Box::new(arbiter.clone()),
            Box::new(owner.clone()),
        )
        .with_config(config)
        .with_download_sink(Box::new(downloads.clone()));
        Self {
            loader,
            owner,
            transport,
            arbiter,
            downloads,
        }
    }

    pub fn owner_events(&self) -> Vec<OwnerEvent> {
        self.owner.0.lock().unwrap().clone()
    }

    pub fn transport_commands(&self) -> Vec<TransportCommand> {
        self.transport.0.lock().unwrap().clone()
    }

    pub fn dispatched_urls(&self) -> Vec<String> {
        self.transport_commands()
            .into_iter()
            .filter_map(|c| match c {
                TransportCommand::Dispatch(r) => Some(r.url().to_string()),
                TransportCommand::Cancel => None,
            })
            .collect()
    }

    pub fn checks(&self) -> Vec<PolicyCheck> {
        self.arbiter.checks.lock().unwrap().clone()
    }

    pub fn withdrawn(&self) -> Vec<PolicyToken> {
        self.arbiter.withdrawn.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<(LoadRequest, Option<LoadResponse>)> {
        self.downloads.0.lock().unwrap().clone()
    }

    /// Token of the most recent check of `class`.
    pub fn last_token(&self, class: PolicyClass) -> PolicyToken {
        self.checks()
            .iter()
            .rev()
            .find(|c| c.token.class() == class)
            .map(|c| c.token)
            .expect("no policy check of that class")
    }

    pub fn decide_navigation(&mut self, decision: PolicyDecision) {
        let token = self.last_token(PolicyClass::Navigation);
        self.loader.resolve(token, decision);
    }

    pub fn decide_content(&mut self, decision: PolicyDecision) {
        let token = self.last_token(PolicyClass::Content);
        self.loader.resolve(token, decision);
    }

    /// Start `url_str` and approve navigation.
    pub fn start_approved(&mut self, url_str: &str) {
        self.loader.start(request(url_str)).unwrap();
        self.decide_navigation(PolicyDecision::Continue);
    }
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn request(s: &str) -> LoadRequest {
    LoadRequest::parse(s).unwrap()
}

pub fn response(s: &str, content_type: &str) -> LoadResponse {
    LoadResponse::ok_with_type(url(s), content_type).unwrap()
}

pub fn redirect(from: &str, status: u16, to: &str) -> LoadResponse {
    LoadResponse::new(url(from), http::StatusCode::from_u16(status).unwrap())
        .with_header("location", to)
        .unwrap()
}

pub fn chunk(len: usize) -> Bytes {
    Bytes::from(vec![b'x'; len])
}

/// Owner events with data lengths instead of bytes, for compact assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Response(String),
    Data(usize),
    Finished,
    Failed(LoadError),
}

pub fn seen(events: &[OwnerEvent]) -> Vec<Seen> {
    events
        .iter()
        .map(|e| match e {
            OwnerEvent::Response(r) => Seen::Response(r.url().to_string()),
            OwnerEvent::Data(d) => Seen::Data(d.len()),
            OwnerEvent::Finished => Seen::Finished,
            OwnerEvent::Failed(err) => Seen::Failed(err.clone()),
        })
        .collect()
}
