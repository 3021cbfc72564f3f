//! Access tokens for the document service.
//!
//! Either a fixed bearer token from the config, or a service-account key
//! that is exchanged for short-lived tokens with a signed JWT grant.

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME: u64 = 3600;
/// Tokens this close to expiry are minted again.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("failed to read service account key {path}: {source}")]
    ReadKey {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid service account key: {0}")]
    InvalidKey(String),

    #[error("failed to sign token request: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("could not reach the token endpoint: {0}")]
    Network(#[from] reqwest::Error),

    #[error("token endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// How requests to the document service are authorized.
pub enum Credentials {
    Anonymous,
    Bearer(String),
    ServiceAccount(ServiceAccountTokens),
}

impl Credentials {
    /// The bearer token to send, minting one if needed.
    pub fn bearer(&self) -> Result<Option<String>, AuthError> {
        match self {
            Credentials::Anonymous => Ok(None),
            Credentials::Bearer(token) => Ok(Some(token.clone())),
            Credentials::ServiceAccount(tokens) => tokens.access_token().map(Some),
        }
    }
}

/// The fields of a service-account JSON key that token minting needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let text = std::fs::read_to_string(path).map_err(|source| AuthError::ReadKey {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| AuthError::InvalidKey(e.to_string()))
    }
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Mints access tokens from a service-account key and caches them until
/// they are about to expire.
pub struct ServiceAccountTokens {
    client: Client,
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(client: Client, key: ServiceAccountKey) -> Result<Self, AuthError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        Ok(Self {
            client,
            client_email: key.client_email,
            key_id: key.private_key_id,
            token_uri: key.token_uri,
            signing_key,
            cached: Mutex::new(None),
        })
    }

    pub fn access_token(&self) -> Result<String, AuthError> {
        // A poisoned cache only means another thread panicked mid-mint
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.token.clone());
        }

        let (token, expires_in) = self.mint()?;
        let lifetime = Duration::from_secs(expires_in).saturating_sub(REFRESH_MARGIN);
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token)
    }

    fn assertion(&self, now: u64) -> Result<String, AuthError> {
        #[derive(Debug, Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: u64,
            exp: u64,
        }

        let claims = Claims {
            iss: &self.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        Ok(jsonwebtoken::encode(&header, &claims, &self.signing_key)?)
    }

    fn mint(&self) -> Result<(String, u64), AuthError> {
        #[derive(Debug, Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default)]
            expires_in: u64,
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let assertion = self.assertion(now)?;

        tracing::debug!(account = %self.client_email, "minting document service token");
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "unable to read token response body".to_string());
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let payload: TokenResponse = response.json()?;
        Ok((payload.access_token, payload.expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use jsonwebtoken::{DecodingKey, Validation};

    const TEST_PRIVATE_KEY: &str = include_str!("testdata/service_account_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("testdata/service_account_key.pub.pem");

    #[derive(Debug, Deserialize)]
    struct SeenClaims {
        iss: String,
        scope: String,
        iat: u64,
        exp: u64,
    }

    #[derive(Clone)]
    struct TokenApi {
        calls: Arc<AtomicUsize>,
        expires_in: u64,
        audience: String,
    }

    /// Serve a fake token endpoint that checks the JWT grant it receives.
    fn spawn_token_api(expires_in: u64) -> (String, Arc<AtomicUsize>) {
        async fn token(
            State(api): State<TokenApi>,
            Form(form): Form<HashMap<String, String>>,
        ) -> Result<Json<serde_json::Value>, StatusCode> {
            if form.get("grant_type").map(String::as_str) != Some(JWT_BEARER_GRANT) {
                return Err(StatusCode::BAD_REQUEST);
            }
            let assertion = form.get("assertion").ok_or(StatusCode::BAD_REQUEST)?;
            let mut validation = Validation::new(Algorithm::RS256);
            validation.set_audience(&[&api.audience]);
            let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes())
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            let claims = jsonwebtoken::decode::<SeenClaims>(assertion, &key, &validation)
                .map_err(|_| StatusCode::UNAUTHORIZED)?
                .claims;
            if claims.iss != "postprod@hunt.iam.gserviceaccount.com"
                || claims.scope != DRIVE_SCOPE
                || claims.exp != claims.iat + ASSERTION_LIFETIME
            {
                return Err(StatusCode::UNAUTHORIZED);
            }

            let n = api.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Json(serde_json::json!({
                "access_token": format!("minted-{n}"),
                "expires_in": api.expires_in,
                "token_type": "Bearer",
            })))
        }

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let state = TokenApi {
            calls: calls.clone(),
            expires_in,
            audience: format!("http://{addr}/token"),
        };
        let app = Router::new()
            .route("/token", post(token))
            .with_state(state);
        std::thread::spawn(move || {
            runtime.block_on(async move {
                axum::serve(listener, app).await.ok();
            });
        });
        (format!("http://{addr}/token"), calls)
    }

    fn key(token_uri: &str) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "postprod@hunt.iam.gserviceaccount.com".to_string(),
            private_key: TEST_PRIVATE_KEY.to_string(),
            private_key_id: Some("key-1".to_string()),
            token_uri: token_uri.to_string(),
        }
    }

    #[test]
    fn test_service_account_token_is_cached() {
        let (token_uri, calls) = spawn_token_api(3600);
        let tokens = ServiceAccountTokens::new(Client::new(), key(&token_uri)).unwrap();

        assert_eq!(tokens.access_token().unwrap(), "minted-1");
        assert_eq!(tokens.access_token().unwrap(), "minted-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nearly_expired_token_is_minted_again() {
        let (token_uri, calls) = spawn_token_api(30);
        let tokens = ServiceAccountTokens::new(Client::new(), key(&token_uri)).unwrap();

        assert_eq!(tokens.access_token().unwrap(), "minted-1");
        assert_eq!(tokens.access_token().unwrap(), "minted-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rejected_grant() {
        let (token_uri, calls) = spawn_token_api(3600);
        let mut wrong_audience = key(&token_uri);
        wrong_audience.token_uri = token_uri.replace("/token", "/token?other");
        let tokens = ServiceAccountTokens::new(Client::new(), wrong_audience).unwrap();

        let err = tokens.access_token().unwrap_err();
        assert!(matches!(err, AuthError::Rejected { status: 401, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_private_key() {
        let mut bad = key("http://127.0.0.1:9/token");
        bad.private_key = "not a key".to_string();
        let result = ServiceAccountTokens::new(Client::new(), bad);
        assert!(matches!(result, Err(AuthError::InvalidKey(_))));
    }

    #[test]
    fn test_key_file_defaults_token_uri() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("key.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "type": "service_account",
                "client_email": "postprod@hunt.iam.gserviceaccount.com",
                "private_key": TEST_PRIVATE_KEY,
            })
            .to_string(),
        )
        .unwrap();

        let key = ServiceAccountKey::from_file(&path).unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(key.private_key_id.is_none());

        let err = ServiceAccountKey::from_file(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, AuthError::ReadKey { .. }));
    }

    #[test]
    fn test_credentials_bearer() {
        assert_eq!(Credentials::Anonymous.bearer().unwrap(), None);
        assert_eq!(
            Credentials::Bearer("fixed".to_string()).bearer().unwrap(),
            Some("fixed".to_string())
        );
    }
}
