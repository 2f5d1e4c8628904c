use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info, warn};

use slashgate_core::config::AuthConfig;
use slashgate_core::errors::ApplicationError;
use slashgate_core::ports::{CredentialStore, RateLimiter, StoreError};

use crate::event::InboundEvent;

pub const SIGNATURE_VERSION: &str = "v0";
pub const FAILED_ATTEMPT_EVENT: &str = "auth:failed_ip";

type HmacSha256 = Hmac<Sha256>;

/// Outcome of a successful authentication. Which tenant matched is not kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    TenantPool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("too many failed authentication attempts")]
    RateLimited,
    #[error("signature did not match any active tenant")]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthError> for ApplicationError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::RateLimited => ApplicationError::RateLimited,
            AuthError::Unauthorized => ApplicationError::Unauthorized,
            AuthError::Store(error) => ApplicationError::from(error),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSettings {
    pub enabled: bool,
    pub replay_window: Duration,
    pub failed_limit: u32,
    pub failed_window: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            replay_window: Duration::from_secs(300),
            failed_limit: 50,
            failed_window: Duration::from_secs(3600),
        }
    }
}

impl From<&AuthConfig> for AuthSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            enabled: config.enabled,
            replay_window: Duration::from_secs(config.replay_window_secs),
            failed_limit: config.failed_ip_limit,
            failed_window: Duration::from_secs(config.failed_ip_window_secs),
        }
    }
}

pub struct RequestAuthenticator {
    settings: AuthSettings,
    credentials: Arc<dyn CredentialStore>,
    limiter: Arc<dyn RateLimiter>,
}

impl RequestAuthenticator {
    pub fn new(
        settings: AuthSettings,
        credentials: Arc<dyn CredentialStore>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self { settings, credentials, limiter }
    }

    /// Whether the event carries a timestamp inside the replay window.
    pub fn applies(&self, event: &InboundEvent) -> bool {
        self.applies_at(event, unix_now())
    }

    pub fn applies_at(&self, event: &InboundEvent, now: i64) -> bool {
        let Some(timestamp) = event.timestamp.as_deref().and_then(parse_timestamp) else {
            return false;
        };

        now.abs_diff(timestamp) < self.settings.replay_window.as_secs()
    }

    pub async fn authenticate(&self, event: &InboundEvent) -> Result<Principal, AuthError> {
        let key = failure_key(event);

        let allowed = self
            .limiter
            .allowed(&key, self.settings.failed_limit, self.settings.failed_window)
            .await
            .map_err(|error| self.store_failure(event, error))?;
        if !allowed {
            warn!(
                event_name = "auth.rate_limited",
                correlation_id = %event.correlation_id,
                failure_key = %key,
                "rejecting request after too many failed attempts"
            );
            return Err(AuthError::RateLimited);
        }

        if !self.settings.enabled {
            debug!(
                event_name = "auth.bypassed",
                correlation_id = %event.correlation_id,
                "authentication disabled, accepting request"
            );
            return Ok(Principal::Anonymous);
        }

        let tenants =
            self.credentials.list_active().await.map_err(|error| self.store_failure(event, error))?;

        if let (Some(timestamp), Some(provided)) = (event.timestamp.as_deref(), provided_digest(event))
        {
            let candidates = tenants.iter().filter(|tenant| tenant.is_verifiable());
            for tenant in candidates {
                let Some(expected) =
                    sign(tenant.secret.expose_secret().as_bytes(), timestamp, &event.raw_body)
                else {
                    continue;
                };
                if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
                    info!(
                        event_name = "auth.verified",
                        correlation_id = %event.correlation_id,
                        "request signature matched tenant pool"
                    );
                    return Ok(Principal::TenantPool);
                }
            }
        }

        self.limiter
            .register(&key, self.settings.failed_window)
            .await
            .map_err(|error| self.store_failure(event, error))?;
        warn!(
            event_name = "auth.rejected",
            correlation_id = %event.correlation_id,
            failure_key = %key,
            candidates = tenants.len(),
            "request signature did not match any active tenant"
        );

        Err(AuthError::Unauthorized)
    }

    fn store_failure(&self, event: &InboundEvent, error: StoreError) -> AuthError {
        warn!(
            event_name = "auth.store_unavailable",
            correlation_id = %event.correlation_id,
            error = %error,
            "authentication collaborator failed"
        );
        AuthError::Store(error)
    }
}

/// Lowercase hex HMAC-SHA256 of `v0:{timestamp}:{body}`.
pub fn sign(secret: &[u8], timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Flood key for failed attempts; the same key is read and written.
pub fn failure_key(event: &InboundEvent) -> String {
    let client = event.client_ip.as_deref().filter(|ip| !ip.is_empty()).unwrap_or("unknown");
    format!("{FAILED_ATTEMPT_EVENT}:{client}")
}

fn provided_digest(event: &InboundEvent) -> Option<&str> {
    event.signature.as_deref()?.strip_prefix("v0=")
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use async_trait::async_trait;

    use slashgate_core::domain::tenant::TenantApplication;
    use slashgate_core::ports::{CredentialStore, RateLimiter, StoreError};
    use slashgate_db::repositories::{InMemoryRateLimiter, InMemoryTenantRepository};

    use super::{failure_key, sign, AuthError, AuthSettings, Principal, RequestAuthenticator};
    use crate::event::InboundEvent;

    const BODY: &[u8] = b"command=%2Frepeat&text=hello";

    fn now() -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).expect("clock").as_secs() as i64
    }

    fn signed_event(secret: &str, timestamp: i64) -> InboundEvent {
        let timestamp = timestamp.to_string();
        let signature = sign(secret.as_bytes(), &timestamp, BODY).expect("sign");
        InboundEvent::new(BODY.to_vec(), None)
            .with_signature_headers(Some(timestamp), Some(format!("v0={signature}")))
            .with_client_ip(Some("198.51.100.4".to_owned()))
    }

    fn pool() -> Arc<InMemoryTenantRepository> {
        Arc::new(InMemoryTenantRepository::with_tenants([
            TenantApplication::new("first", "First", "secret-one"),
            TenantApplication::new("second", "Second", "secret-two"),
            TenantApplication::new("retired", "Retired", "secret-old").deactivated(),
        ]))
    }

    fn authenticator(
        settings: AuthSettings,
        credentials: Arc<dyn CredentialStore>,
        limiter: Arc<dyn RateLimiter>,
    ) -> RequestAuthenticator {
        RequestAuthenticator::new(settings, credentials, limiter)
    }

    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialStore for CountingStore {
        async fn list_active(&self) -> Result<Vec<TenantApplication>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl CredentialStore for FailingStore {
        async fn list_active(&self) -> Result<Vec<TenantApplication>, StoreError> {
            Err(StoreError::Unavailable("database is locked".to_owned()))
        }
    }

    #[test]
    fn signature_matches_known_vector() {
        let digest = sign(b"key", "1", b"body").expect("sign");

        assert_eq!(digest, "1ed60689c833c6e0155375486100f66305fb8a6e78a6fd3e3b748a3261fd1eef");
        assert_ne!(sign(b"key", "2", b"body"), Some(digest));
    }

    #[test]
    fn applies_only_inside_replay_window() {
        let auth = authenticator(
            AuthSettings::default(),
            pool(),
            Arc::new(InMemoryRateLimiter::default()),
        );
        let at = 1_700_000_000;

        assert!(auth.applies_at(&signed_event("x", at), at));
        assert!(auth.applies_at(&signed_event("x", at - 299), at));
        assert!(auth.applies_at(&signed_event("x", at + 299), at));
        assert!(!auth.applies_at(&signed_event("x", at - 300), at));
        assert!(!auth.applies_at(&signed_event("x", at + 300), at));
    }

    #[test]
    fn missing_or_non_numeric_timestamp_does_not_apply() {
        let auth = authenticator(
            AuthSettings::default(),
            pool(),
            Arc::new(InMemoryRateLimiter::default()),
        );
        let missing = InboundEvent::new(BODY.to_vec(), None);
        let garbled = InboundEvent::new(BODY.to_vec(), None)
            .with_signature_headers(Some("yesterday".to_owned()), None);

        assert!(!auth.applies(&missing));
        assert!(!auth.applies(&garbled));
    }

    #[tokio::test]
    async fn matching_active_tenant_secret_authenticates() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let auth = authenticator(AuthSettings::default(), pool(), limiter.clone());
        let event = signed_event("secret-two", now());

        assert_eq!(auth.authenticate(&event).await, Ok(Principal::TenantPool));
        assert_eq!(limiter.registered(&failure_key(&event)).await, 0);
    }

    #[tokio::test]
    async fn unknown_secret_is_rejected_and_registered_once() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let auth = authenticator(AuthSettings::default(), pool(), limiter.clone());
        let event = signed_event("not-registered", now());

        assert_eq!(auth.authenticate(&event).await, Err(AuthError::Unauthorized));
        assert_eq!(limiter.registered("auth:failed_ip:198.51.100.4").await, 1);
    }

    #[tokio::test]
    async fn inactive_tenant_secret_is_rejected() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let auth = authenticator(AuthSettings::default(), pool(), limiter.clone());

        let result = auth.authenticate(&signed_event("secret-old", now())).await;

        assert_eq!(result, Err(AuthError::Unauthorized));
        assert_eq!(limiter.registered("auth:failed_ip:198.51.100.4").await, 1);
    }

    #[tokio::test]
    async fn signature_without_version_prefix_never_matches() {
        let auth = authenticator(
            AuthSettings::default(),
            pool(),
            Arc::new(InMemoryRateLimiter::default()),
        );
        let timestamp = now().to_string();
        let digest = sign(b"secret-one", &timestamp, BODY).expect("sign");
        let event = InboundEvent::new(BODY.to_vec(), None)
            .with_signature_headers(Some(timestamp), Some(digest));

        assert_eq!(auth.authenticate(&event).await, Err(AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn tampered_body_is_rejected() {
        let auth = authenticator(
            AuthSettings::default(),
            pool(),
            Arc::new(InMemoryRateLimiter::default()),
        );
        let mut event = signed_event("secret-one", now());
        event.raw_body = b"command=%2Frepeat&text=goodbye".to_vec();

        assert_eq!(auth.authenticate(&event).await, Err(AuthError::Unauthorized));
    }

    #[tokio::test]
    async fn disabled_authentication_accepts_any_signature() {
        let settings = AuthSettings { enabled: false, ..AuthSettings::default() };
        let auth = authenticator(
            settings,
            Arc::new(InMemoryTenantRepository::default()),
            Arc::new(InMemoryRateLimiter::default()),
        );
        let event = InboundEvent::new(BODY.to_vec(), None)
            .with_signature_headers(Some(now().to_string()), Some("v0=deadbeef".to_owned()));

        assert_eq!(auth.authenticate(&event).await, Ok(Principal::Anonymous));
    }

    #[tokio::test]
    async fn rate_limited_client_skips_credential_lookup() {
        let store = Arc::new(CountingStore::default());
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let settings = AuthSettings { failed_limit: 2, ..AuthSettings::default() };
        let auth = authenticator(settings, store.clone(), limiter.clone());
        let event = signed_event("wrong", now());

        assert_eq!(auth.authenticate(&event).await, Err(AuthError::Unauthorized));
        assert_eq!(auth.authenticate(&event).await, Err(AuthError::Unauthorized));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);

        assert_eq!(auth.authenticate(&event).await, Err(AuthError::RateLimited));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.registered(&failure_key(&event)).await, 2);
    }

    #[tokio::test]
    async fn rate_limit_applies_even_when_authentication_is_disabled() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let event = signed_event("anything", now());
        limiter.register(&failure_key(&event), Duration::from_secs(3600)).await.expect("seed");

        let settings = AuthSettings { enabled: false, failed_limit: 1, ..AuthSettings::default() };
        let auth = authenticator(settings, pool(), limiter);

        assert_eq!(auth.authenticate(&event).await, Err(AuthError::RateLimited));
    }

    #[tokio::test]
    async fn store_failure_is_reported_without_registering() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let auth = authenticator(AuthSettings::default(), Arc::new(FailingStore), limiter.clone());
        let event = signed_event("secret-one", now());

        let result = auth.authenticate(&event).await;

        assert!(matches!(result, Err(AuthError::Store(_))));
        assert_eq!(limiter.registered(&failure_key(&event)).await, 0);
    }

    #[test]
    fn failure_key_falls_back_to_unknown_client() {
        let event = InboundEvent::new(Vec::new(), None);

        assert_eq!(failure_key(&event), "auth:failed_ip:unknown");
    }
}
