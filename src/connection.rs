//! Per-tenant connection state and bounded-retry establishment.

use crate::backend::{BackendResult, Session, VirtBackend};
use crate::config::{ConnectConfig, Credentials, TenantConfig};
use crate::error::BackendError;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Mutable state guarded by the connection's lock.
///
/// Session mutation and credential rotation must be mutually exclusive, so
/// both live behind the same guard.
#[derive(Debug)]
struct ConnState {
    session: Option<Session>,
    credentials: Credentials,
}

/// One tenant's connection to its VC endpoint.
///
/// Exactly one `TenantConnection` exists per configured tenant; every
/// concurrent search shares it. The session handle is owned here and never
/// exposed raw; all access goes through methods that acquire the guard.
/// A session, once established, is valid-enough-to-attempt-use; a remote
/// failure triggers re-establishment on next use via [`invalidate`], not
/// proactive health-checking.
///
/// [`invalidate`]: TenantConnection::invalidate
#[derive(Debug)]
pub struct TenantConnection {
    cfg: TenantConfig,
    state: Mutex<ConnState>,
}

impl TenantConnection {
    /// Create an unconnected tenant connection.
    pub fn new(cfg: TenantConfig) -> Self {
        let credentials = cfg.credentials.clone();
        Self {
            cfg,
            state: Mutex::new(ConnState {
                session: None,
                credentials,
            }),
        }
    }

    /// The tenant's static configuration.
    pub fn config(&self) -> &TenantConfig {
        &self.cfg
    }

    /// The tenant's identifier.
    pub fn tenant_ref(&self) -> &str {
        &self.cfg.tenant_ref
    }

    /// The VC endpoint this tenant connects to.
    pub fn endpoint(&self) -> &str {
        &self.cfg.endpoint
    }

    /// Return the live session, establishing one if needed.
    ///
    /// Idempotent: an already-established session is returned without any
    /// backend call. Otherwise logs in up to `connect.attempts` times with a
    /// fixed `connect.retry_delay` sleep between attempts and returns the
    /// last error if every attempt fails. Both the login call and the retry
    /// sleep observe `token`. Concurrent callers for the same tenant
    /// serialize on the connection guard.
    pub async fn ensure_session(
        &self,
        backend: &dyn VirtBackend,
        connect: &ConnectConfig,
        token: &CancellationToken,
    ) -> BackendResult<Session> {
        let mut state = self.state.lock().await;

        if let Some(session) = &state.session {
            return Ok(session.clone());
        }

        let login_cfg = TenantConfig {
            credentials: state.credentials.clone(),
            ..self.cfg.clone()
        };

        let mut last_err = None;
        for attempt in 1..=connect.attempts {
            if token.is_cancelled() {
                return Err(self.cancelled_err());
            }

            let result = tokio::select! {
                _ = token.cancelled() => return Err(self.cancelled_err()),
                result = backend.connect(&login_cfg) => result,
            };

            match result {
                Ok(session) => {
                    debug!(
                        tenant = %self.cfg.tenant_ref,
                        endpoint = %self.cfg.endpoint,
                        session = %session.id(),
                        attempt,
                        "Session established"
                    );
                    state.session = Some(session.clone());
                    return Ok(session);
                }
                Err(err) => {
                    warn!(
                        tenant = %self.cfg.tenant_ref,
                        endpoint = %self.cfg.endpoint,
                        attempt,
                        error = %err,
                        "Connect attempt failed"
                    );
                    last_err = Some(err);
                }
            }

            if attempt < connect.attempts {
                tokio::select! {
                    _ = token.cancelled() => return Err(self.cancelled_err()),
                    _ = tokio::time::sleep(connect.retry_delay) => {}
                }
            }
        }

        Err(last_err.unwrap_or_else(|| self.cancelled_err()))
    }

    /// Replace the login credentials.
    ///
    /// Takes effect on the next establishment; an existing session keeps
    /// running until it is invalidated or logged out.
    pub async fn update_credentials(&self, username: impl Into<String>, password: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.credentials = Credentials::new(username, password);
        debug!(tenant = %self.cfg.tenant_ref, "Credentials updated");
    }

    /// Drop the session so the next use re-establishes it.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.session.take().is_some() {
            debug!(tenant = %self.cfg.tenant_ref, "Session invalidated");
        }
    }

    /// Log out and drop the session, if one is established.
    pub async fn logout(&self, backend: &dyn VirtBackend) {
        let mut state = self.state.lock().await;
        if let Some(session) = state.session.take() {
            if let Err(err) = backend.logout(&session).await {
                warn!(
                    tenant = %self.cfg.tenant_ref,
                    endpoint = %self.cfg.endpoint,
                    error = %err,
                    "Logout failed"
                );
            }
        }
    }

    fn cancelled_err(&self) -> BackendError {
        BackendError::ConnectFailed {
            endpoint: self.cfg.endpoint.clone(),
            reason: "cancelled".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::SimBackend;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn connect_cfg() -> ConnectConfig {
        ConnectConfig {
            attempts: 3,
            retry_delay: Duration::from_millis(10),
        }
    }

    fn conn(endpoint: &str) -> TenantConnection {
        TenantConnection::new(TenantConfig::new(
            "t1",
            endpoint,
            Credentials::new("admin", "secret"),
        ))
    }

    #[tokio::test]
    async fn establishment_is_idempotent() {
        let backend = SimBackend::new();
        backend.add_center("vc-1");
        let conn = conn("vc-1");
        let token = CancellationToken::new();

        let first = conn
            .ensure_session(&backend, &connect_cfg(), &token)
            .await
            .unwrap();
        let second = conn
            .ensure_session(&backend, &connect_cfg(), &token)
            .await
            .unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(backend.counters().connect_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let backend = SimBackend::new();
        backend.add_center("vc-1");
        backend.fail_next_connects("vc-1", 2);
        let conn = conn("vc-1");

        let session = conn
            .ensure_session(&backend, &connect_cfg(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(session.endpoint(), "vc-1");
        assert_eq!(backend.counters().connect_calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_all_attempts_fail() {
        let backend = SimBackend::new();
        backend.add_center("vc-1");
        backend.set_unreachable("vc-1", true);
        let conn = conn("vc-1");

        let err = conn
            .ensure_session(&backend, &connect_cfg(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::ConnectFailed { .. }));
        assert_eq!(backend.counters().connect_calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn cancelled_token_stops_retrying() {
        let backend = SimBackend::new();
        backend.add_center("vc-1");
        backend.set_unreachable("vc-1", true);
        let conn = conn("vc-1");
        let token = CancellationToken::new();
        token.cancel();

        let err = conn
            .ensure_session(&backend, &connect_cfg(), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::ConnectFailed { .. }));
        assert_eq!(backend.counters().connect_calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn invalidate_forces_reestablishment() {
        let backend = SimBackend::new();
        backend.add_center("vc-1");
        let conn = conn("vc-1");
        let token = CancellationToken::new();

        let first = conn
            .ensure_session(&backend, &connect_cfg(), &token)
            .await
            .unwrap();
        conn.update_credentials("admin", "rotated").await;
        conn.invalidate().await;
        let second = conn
            .ensure_session(&backend, &connect_cfg(), &token)
            .await
            .unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(backend.counters().connect_calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn logout_drops_the_session() {
        let backend = SimBackend::new();
        backend.add_center("vc-1");
        let conn = conn("vc-1");
        let token = CancellationToken::new();

        conn.ensure_session(&backend, &connect_cfg(), &token)
            .await
            .unwrap();
        conn.logout(&backend).await;

        assert_eq!(backend.counters().logout_calls.load(Ordering::Relaxed), 1);

        conn.ensure_session(&backend, &connect_cfg(), &token)
            .await
            .unwrap();
        assert_eq!(backend.counters().connect_calls.load(Ordering::Relaxed), 2);
    }
}
