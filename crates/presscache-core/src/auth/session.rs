//! Shared session lifecycle.
//!
//! A `SessionManager` owns the one bearer token the proxy uses for every
//! upstream call. It opens the session (login + validate), hands the token out
//! while it is valid, and re-opens it in the background when a consumer
//! reports that the remote rejected it.
//!
//! Opening is single-flight: while an attempt is running, every further
//! `open()` or `trigger_reopen()` joins it instead of starting a second login.

use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use std::fmt;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::Credential;
use crate::api::{ApiError, RemoteClient};

/// Code the validation endpoint reports for a token it accepts.
pub const VALID_TOKEN_CODE: &str = "jwt_auth_valid_token";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// After a failed open, automatic reopen triggers are dropped for this long.
    pub reopen_cooldown_secs: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            reopen_cooldown_secs: 30,
        }
    }
}

impl SessionOptions {
    pub fn reopen_cooldown(&self) -> Duration {
        Duration::from_secs(self.reopen_cooldown_secs)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(#[source] ApiError),

    #[error("No open session")]
    NoOpenSession,
}

/// The current token and whether the remote vouched for it.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub valid: bool,
    generation: u64,
}

impl Session {
    /// Increases by one every time a new token is installed.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("valid", &self.valid)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Token handed out by `ensure_open`, tagged with the session it came from.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    value: String,
    generation: u64,
}

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Opening,
    Valid,
    Invalid,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Open attempts started (login calls made).
    pub attempts: u64,
    /// Attempts whose login failed or whose token did not validate.
    pub failures: u64,
}

type OpenFuture = Shared<BoxFuture<'static, Result<Session, SessionError>>>;

/// Outcome of an in-flight open. Await it or drop it; the open runs either way.
pub struct ReopenHandle(OpenFuture);

impl IntoFuture for ReopenHandle {
    type Output = Result<Session, SessionError>;
    type IntoFuture = OpenFuture;

    fn into_future(self) -> Self::IntoFuture {
        self.0
    }
}

struct SessionSlot {
    phase: SessionPhase,
    session: Option<Session>,
    next_generation: u64,
    last_failure: Option<Instant>,
}

struct Inner {
    client: Arc<dyn RemoteClient>,
    credential: Credential,
    options: SessionOptions,
    slot: RwLock<SessionSlot>,
    in_flight: Mutex<Option<OpenFuture>>,
    attempts: AtomicU64,
    failures: AtomicU64,
}

/// Owner of the proxy's single upstream session.
/// Clone is cheap - all clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(client: Arc<dyn RemoteClient>, credential: Credential, options: SessionOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                credential,
                options,
                slot: RwLock::new(SessionSlot {
                    phase: SessionPhase::Uninitialized,
                    session: None,
                    next_generation: 1,
                    last_failure: None,
                }),
                in_flight: Mutex::new(None),
                attempts: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    /// Log in and validate the resulting token, joining an attempt that is
    /// already running. The returned session has `valid == false` when the
    /// remote did not vouch for the token.
    pub async fn open(&self) -> Result<Session, SessionError> {
        match self.begin(false) {
            Some(pending) => pending.await,
            None => Err(SessionError::NoOpenSession),
        }
    }

    /// Ask the remote whether `token` is good. Never fails: any trouble
    /// reaching the remote or any unexpected answer counts as not valid.
    pub async fn validate(&self, token: &str) -> bool {
        self.inner.validate(token).await
    }

    /// Install a pre-provisioned token if the remote accepts it.
    pub async fn adopt(&self, token: &str) -> bool {
        if !self.inner.validate(token).await {
            warn!("Configured token was not accepted");
            return false;
        }
        let session = self.inner.install(token.to_string(), true);
        info!(generation = session.generation, "Adopted configured token");
        true
    }

    /// Current token if the session is valid. Never waits for an open in progress.
    pub fn ensure_open(&self) -> Result<BearerToken, SessionError> {
        let slot = self.inner.read_slot();
        match slot.session.as_ref() {
            Some(session) if session.valid => Ok(BearerToken {
                value: session.token.clone(),
                generation: session.generation,
            }),
            _ => Err(SessionError::NoOpenSession),
        }
    }

    /// Start a background open, or join the one already running.
    ///
    /// Returns `None` when the trigger was dropped because the last attempt
    /// failed less than the cool-down ago. Must be called within a tokio runtime.
    pub fn trigger_reopen(&self) -> Option<ReopenHandle> {
        self.begin(true).map(ReopenHandle)
    }

    /// Reopen only if a session was lost or an earlier attempt failed.
    pub fn trigger_reopen_if_invalid(&self) -> Option<ReopenHandle> {
        if self.phase() == SessionPhase::Invalid {
            self.trigger_reopen()
        } else {
            None
        }
    }

    /// Record that the remote rejected the token of session `generation`.
    ///
    /// Invalidates that session and triggers a reopen. Reports about a
    /// session that has since been replaced are ignored.
    pub fn report_unauthorized(&self, generation: u64) -> Option<ReopenHandle> {
        {
            let mut guard = self.inner.write_slot();
            let slot = &mut *guard;
            match slot.session.as_mut() {
                Some(session) if session.generation == generation => {
                    if session.valid {
                        session.valid = false;
                        if slot.phase == SessionPhase::Valid {
                            slot.phase = SessionPhase::Invalid;
                        }
                        warn!(generation, "Session token rejected by remote, invalidating");
                    }
                }
                _ => {
                    debug!(generation, "Ignoring rejection of a superseded session");
                    return None;
                }
            }
        }
        self.trigger_reopen()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.read_slot().phase
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.read_slot().session.clone()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            attempts: self.inner.attempts.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
        }
    }

    fn begin(&self, respect_cooldown: bool) -> Option<OpenFuture> {
        let mut in_flight = self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = in_flight.as_ref() {
            debug!("Joining in-flight session open");
            return Some(pending.clone());
        }

        {
            let mut slot = self.inner.write_slot();
            if respect_cooldown {
                if let Some(failed_at) = slot.last_failure {
                    let cooldown = self.inner.options.reopen_cooldown();
                    if failed_at.elapsed() < cooldown {
                        debug!(?cooldown, "Reopen suppressed, last attempt failed recently");
                        return None;
                    }
                }
            }
            slot.phase = SessionPhase::Opening;
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = inner.run_open().await;
            *inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = None;
            result
        });

        let pending = async move {
            task.await.unwrap_or_else(|e| {
                Err(SessionError::AuthenticationFailed(ApiError::NetworkError(format!(
                    "session open task failed: {}",
                    e
                ))))
            })
        }
        .boxed()
        .shared();

        *in_flight = Some(pending.clone());
        Some(pending)
    }
}

impl Inner {
    fn read_slot(&self) -> RwLockReadGuard<'_, SessionSlot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, SessionSlot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn validate(&self, token: &str) -> bool {
        match self.client.validate_token(token).await {
            Ok(code) if code == VALID_TOKEN_CODE => true,
            Ok(code) => {
                warn!(code = %code, "Token validation returned unexpected code");
                false
            }
            Err(e) => {
                warn!(error = %e, "Token validation failed");
                false
            }
        }
    }

    async fn run_open(&self) -> Result<Session, SessionError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        info!(username = %self.credential.username, "Opening session");

        let token = match self.client.request_token(&self.credential).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, username = %self.credential.username, "Authentication failed");
                self.failures.fetch_add(1, Ordering::Relaxed);
                let mut slot = self.write_slot();
                slot.last_failure = Some(Instant::now());
                slot.phase = match slot.session.as_ref() {
                    Some(session) if session.valid => SessionPhase::Valid,
                    _ => SessionPhase::Invalid,
                };
                return Err(SessionError::AuthenticationFailed(e));
            }
        };

        let valid = self.validate(&token).await;
        let session = self.install(token, valid);
        if valid {
            info!(generation = session.generation, "Session created successfully");
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
            error!(generation = session.generation, "Session could not be validated");
        }
        Ok(session)
    }

    fn install(&self, token: String, valid: bool) -> Session {
        let mut slot = self.write_slot();
        let session = Session {
            token,
            valid,
            generation: slot.next_generation,
        };
        slot.next_generation += 1;
        slot.session = Some(session.clone());
        slot.phase = if valid {
            SessionPhase::Valid
        } else {
            SessionPhase::Invalid
        };
        slot.last_failure = if valid { None } else { Some(Instant::now()) };
        session
    }
}
