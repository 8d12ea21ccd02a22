//! Scripted in-memory `RemoteClient` for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use crate::api::{ApiError, RemoteClient};
use crate::auth::{Credential, VALID_TOKEN_CODE};
use crate::models::{ContentItem, ContentPath};

pub(crate) struct ScriptedClient {
    logins: AtomicUsize,
    fetches: AtomicUsize,
    fail_logins: AtomicBool,
    login_delay: Mutex<Option<Duration>>,
    validate_code: Mutex<Result<String, ApiError>>,
    content: Mutex<HashMap<String, Result<ContentItem, ApiError>>>,
    fetch_barrier: Mutex<Option<Arc<Barrier>>>,
    tokens_seen: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            logins: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            fail_logins: AtomicBool::new(false),
            login_delay: Mutex::new(None),
            validate_code: Mutex::new(Ok(VALID_TOKEN_CODE.to_string())),
            content: Mutex::new(HashMap::new()),
            fetch_barrier: Mutex::new(None),
            tokens_seen: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn credential() -> Credential {
        Credential::new("editor", "hunter2")
    }

    pub(crate) fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }

    pub(crate) fn fail_logins(&self, fail: bool) {
        self.fail_logins.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn delay_logins(&self, delay: Duration) {
        *self.login_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn validate_with(&self, result: Result<String, ApiError>) {
        *self.validate_code.lock().unwrap() = result;
    }

    pub(crate) fn respond(&self, key: &str, result: Result<ContentItem, ApiError>) {
        self.content.lock().unwrap().insert(key.to_string(), result);
    }

    /// Hold every fetch until `n` of them are waiting.
    pub(crate) fn gate_fetches(&self, n: usize) {
        *self.fetch_barrier.lock().unwrap() = Some(Arc::new(Barrier::new(n)));
    }
}

#[async_trait]
impl RemoteClient for ScriptedClient {
    async fn request_token(&self, _credential: &Credential) -> Result<String, ApiError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.login_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_logins.load(Ordering::SeqCst) {
            return Err(ApiError::AccessDenied("incorrect_password".to_string()));
        }
        Ok(format!("token-{}", n))
    }

    async fn validate_token(&self, _token: &str) -> Result<String, ApiError> {
        self.validate_code.lock().unwrap().clone()
    }

    async fn fetch_content(&self, token: &str, path: &ContentPath) -> Result<ContentItem, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().unwrap().push(token.to_string());
        let barrier = self.fetch_barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        self.content
            .lock()
            .unwrap()
            .get(&path.key())
            .cloned()
            .unwrap_or_else(|| Err(ApiError::NotFound(path.key())))
    }
}
