//! Bearer token sources.
//!
//! Two sources are supported: a fixed access token handed in by the
//! operator, and the GCE metadata server of the VM the daemon runs on.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const DEFAULT_METADATA_ENDPOINT: &str = "http://metadata.google.internal/";

/// Tokens are refreshed this long before the server-reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Upper bound on how long a token is cached, whatever `expires_in` says.
const MAX_CACHE_LIFETIME: Duration = Duration::from_secs(3600);

/// Errors building the authenticated client or fetching a token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("invalid metadata endpoint: {0}")]
    Endpoint(String),

    #[error("token request failed: {0}")]
    Token(String),

    #[error("empty access token")]
    Empty,
}

/// Boxed future returned by [`TokenSource::token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + 'a>>;

/// Supplies bearer tokens for control plane requests.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> TokenFuture<'_>;
}

/// A fixed access token, e.g. from `gcloud auth print-access-token`.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken").finish_non_exhaustive()
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> TokenFuture<'_> {
        Box::pin(async move {
            if self.token.is_empty() {
                return Err(AuthError::Empty);
            }
            Ok(self.token.clone())
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Service account tokens from the GCE metadata server, cached until
/// shortly before they expire.
pub struct MetadataServer {
    http: reqwest::Client,
    token_url: Url,
    cache: Mutex<Option<CachedToken>>,
}

impl MetadataServer {
    /// Token source against the default metadata host, or the host named
    /// by `GCE_METADATA_HOST` when set.
    pub fn new(scopes: &[&str]) -> Result<Self, AuthError> {
        let endpoint = match std::env::var("GCE_METADATA_HOST") {
            Ok(host) if !host.is_empty() => format!("http://{host}/"),
            _ => DEFAULT_METADATA_ENDPOINT.to_string(),
        };
        let endpoint = Url::parse(&endpoint).map_err(|e| AuthError::Endpoint(e.to_string()))?;
        Self::with_endpoint(endpoint, scopes)
    }

    /// Token source against an explicit metadata endpoint.
    pub fn with_endpoint(endpoint: Url, scopes: &[&str]) -> Result<Self, AuthError> {
        let mut token_url = endpoint
            .join("computeMetadata/v1/instance/service-accounts/default/token")
            .map_err(|e| AuthError::Endpoint(e.to_string()))?;
        if !scopes.is_empty() {
            token_url
                .query_pairs_mut()
                .append_pair("scopes", &scopes.join(","));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Client(e.to_string()))?;

        Ok(Self {
            http,
            token_url,
            cache: Mutex::new(None),
        })
    }

    async fn fetch(&self) -> Result<CachedToken, AuthError> {
        let resp = self
            .http
            .get(self.token_url.clone())
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AuthError::Token(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Token(format!(
                "metadata server returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Token(e.to_string()))?;
        if body.access_token.is_empty() {
            return Err(AuthError::Empty);
        }

        debug!(expires_in = body.expires_in, "fetched metadata server token");

        Ok(CachedToken {
            access_token: body.access_token,
            refresh_at: refresh_at(Instant::now(), body.expires_in),
        })
    }
}

/// When a token fetched at `now` with the given `expires_in` must be
/// refreshed. Falls back to `now` (refetch on next use) if the instant
/// cannot be represented.
fn refresh_at(now: Instant, expires_in: u64) -> Instant {
    let lifetime = Duration::from_secs(expires_in)
        .saturating_sub(REFRESH_MARGIN)
        .min(MAX_CACHE_LIFETIME);
    now.checked_add(lifetime).unwrap_or(now)
}

impl std::fmt::Debug for MetadataServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataServer")
            .field("token_url", &self.token_url.as_str())
            .finish_non_exhaustive()
    }
}

impl TokenSource for MetadataServer {
    fn token(&self) -> TokenFuture<'_> {
        Box::pin(async move {
            let mut cache = self.cache.lock().await;
            if let Some(cached) = cache.as_ref()
                && Instant::now() < cached.refresh_at
            {
                return Ok(cached.access_token.clone());
            }

            let fresh = self.fetch().await?;
            let token = fresh.access_token.clone();
            *cache = Some(fresh);
            Ok(token)
        })
    }
}
