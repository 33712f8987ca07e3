// src/utils/test_support.rs
//! Test doubles for tasks, callbacks and the token fetcher

use crate::attestation::request::OutgoingRequest;
use crate::attestation::token::{TokenFetchResult, TokenFetchStatus, TokenFetcher};
use crate::interception::task_identity::{CompletionCallback, NetworkTask, TaskIdentity};
use crate::service::ProtectedTask;
use crate::utils::errors::ForcedFailure;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory network task that records sends and failures
pub(crate) struct MockTask {
    identity: TaskIdentity,
    request: Mutex<OutgoingRequest>,
    sent: Mutex<Vec<OutgoingRequest>>,
    failures: Mutex<Vec<ForcedFailure>>,
}

impl MockTask {
    pub(crate) fn new(url: &str) -> Self {
        Self::with_identity(TaskIdentity::next(), url)
    }

    pub(crate) fn with_identity(identity: TaskIdentity, url: &str) -> Self {
        Self {
            identity,
            request: Mutex::new(OutgoingRequest::get(url).unwrap()),
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_header(&self, name: &str, value: &str) {
        self.request.lock().set_header(name, value).unwrap();
    }

    pub(crate) fn resume_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub(crate) fn last_sent_request(&self) -> Option<OutgoingRequest> {
        self.sent.lock().last().cloned()
    }

    pub(crate) fn failures(&self) -> Vec<ForcedFailure> {
        self.failures.lock().clone()
    }
}

impl NetworkTask for MockTask {
    fn identity(&self) -> TaskIdentity {
        self.identity
    }

    fn resume_now(&self) {
        let request = self.request.lock().clone();
        self.sent.lock().push(request);
    }

    fn complete_with_error(&self, failure: ForcedFailure) {
        self.failures.lock().push(failure);
    }
}

impl ProtectedTask for MockTask {
    fn request(&self) -> OutgoingRequest {
        self.request.lock().clone()
    }

    fn replace_request(&self, request: OutgoingRequest) {
        *self.request.lock() = request;
    }
}

/// Records every invocation of the completion callbacks it hands out
#[derive(Clone, Default)]
pub(crate) struct CallbackProbe {
    received: Arc<Mutex<Vec<ForcedFailure>>>,
}

impl CallbackProbe {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn callback(&self) -> CompletionCallback {
        let received = Arc::clone(&self.received);
        Box::new(move |failure| received.lock().push(failure))
    }

    pub(crate) fn calls(&self) -> usize {
        self.received.lock().len()
    }

    pub(crate) fn last(&self) -> Option<ForcedFailure> {
        self.received.lock().last().cloned()
    }
}

/// Token fetcher returning scripted results
pub(crate) struct ScriptedFetcher {
    token_result: TokenFetchResult,
    secure_strings: HashMap<String, TokenFetchResult>,
    token_hosts: Mutex<Vec<String>>,
    secure_string_keys: Mutex<Vec<String>>,
    data_hashes: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new(token_result: TokenFetchResult) -> Self {
        Self {
            token_result,
            secure_strings: HashMap::new(),
            token_hosts: Mutex::new(Vec::new()),
            secure_string_keys: Mutex::new(Vec::new()),
            data_hashes: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_secure_string(mut self, key: &str, result: TokenFetchResult) -> Self {
        self.secure_strings.insert(key.to_string(), result);
        self
    }

    pub(crate) fn token_hosts(&self) -> Vec<String> {
        self.token_hosts.lock().clone()
    }

    pub(crate) fn secure_string_keys(&self) -> Vec<String> {
        self.secure_string_keys.lock().clone()
    }

    pub(crate) fn data_hashes(&self) -> Vec<String> {
        self.data_hashes.lock().clone()
    }
}

impl TokenFetcher for ScriptedFetcher {
    fn fetch_token<'a>(&'a self, host: &'a str) -> BoxFuture<'a, TokenFetchResult> {
        self.token_hosts.lock().push(host.to_string());
        futures::future::ready(self.token_result.clone()).boxed()
    }

    fn fetch_secure_string<'a>(&'a self, key: &'a str) -> BoxFuture<'a, TokenFetchResult> {
        self.secure_string_keys.lock().push(key.to_string());
        let result = self
            .secure_strings
            .get(key)
            .cloned()
            .unwrap_or_else(|| TokenFetchResult::with_status(TokenFetchStatus::UnknownKey));
        futures::future::ready(result).boxed()
    }

    fn set_data_hash(&self, data: &str) {
        self.data_hashes.lock().push(data.to_string());
    }
}
