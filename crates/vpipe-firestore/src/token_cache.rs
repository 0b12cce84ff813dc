//! Access tokens for Firestore requests.
//!
//! Service-account tokens are cached until shortly before expiry and
//! refreshed under a write lock so concurrent callers share one refresh.
//! The local emulator accepts a fixed bearer token instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// TTL assumed when the provider reports an unusable expiry.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore REST access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Bearer token the emulator treats as an admin credential.
pub const EMULATOR_TOKEN: &str = "owner";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

enum Source {
    ServiceAccount {
        provider: Arc<dyn TokenProvider>,
        cached: RwLock<Option<CachedToken>>,
    },
    Emulator,
}

/// Source of bearer tokens.
pub struct TokenCache {
    source: Source,
}

impl TokenCache {
    pub fn service_account(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            source: Source::ServiceAccount {
                provider,
                cached: RwLock::new(None),
            },
        }
    }

    pub fn emulator() -> Self {
        Self {
            source: Source::Emulator,
        }
    }

    /// Whether a 401 may be cured by fetching a new token.
    pub fn can_refresh(&self) -> bool {
        matches!(self.source, Source::ServiceAccount { .. })
    }

    /// Drop the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        if let Source::ServiceAccount { cached, .. } = &self.source {
            *cached.write().await = None;
        }
    }

    pub async fn get_token(&self) -> FirestoreResult<String> {
        let (provider, cached) = match &self.source {
            Source::Emulator => return Ok(EMULATOR_TOKEN.to_string()),
            Source::ServiceAccount { provider, cached } => (provider, cached),
        };

        {
            let guard = cached.read().await;
            if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut guard = cached.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        match provider.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let ttl = (token.expires_at() - Utc::now())
                    .to_std()
                    .unwrap_or(TOKEN_DEFAULT_TTL);
                let access_token = token.as_str().to_string();
                *guard = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at: Instant::now() + ttl,
                });
                debug!("Refreshed Firestore auth token");
                Ok(access_token)
            }
            Err(e) => match guard.as_ref().filter(|t| t.is_usable()) {
                Some(token) => {
                    warn!("Token refresh failed, using existing token: {}", e);
                    Ok(token.access_token.clone())
                }
                None => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                ))),
            },
        }
    }
}
