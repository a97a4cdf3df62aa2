//! Google OAuth2 credentials for read-only spreadsheet access.
//!
//! [`GoogleAuthorizer`] loads a persisted `authorized_user` token file and
//! trades its refresh token for an access token. When no token file exists it
//! runs the installed-app consent flow once: it listens on a loopback port,
//! logs the consent URL, waits for the redirect carrying the authorization
//! code, exchanges it and persists the refresh token for later runs.

use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

use crate::error::SheetsError;

pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Refresh this long before the provider-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Opaque bearer credential handed to the spreadsheet client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Produces a credential for spreadsheet reads.
#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self) -> Result<Credential, SheetsError>;
}

// ── File formats ────────────────────────────────────────────────────

/// Persisted refresh-token file (`token.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// OAuth client secrets downloaded from the Google console (`credentials.json`).
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

struct CachedToken {
    credential: Credential,
    expires_at: Instant,
}

// ── Google authorizer ───────────────────────────────────────────────

/// File-backed Google OAuth2 authorizer.
pub struct GoogleAuthorizer {
    credentials_path: PathBuf,
    token_path: PathBuf,
    token_endpoint: String,
    auth_endpoint: String,
    redirect_addr: SocketAddr,
    client: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl GoogleAuthorizer {
    pub fn new(credentials_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            auth_endpoint: GOOGLE_AUTH_ENDPOINT.to_string(),
            redirect_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            client: reqwest::Client::new(),
            cache: Mutex::new(None),
        }
    }

    pub fn from_config(config: &tender_core::config::GoogleConfig) -> Self {
        Self::new(config.credentials_path.clone(), config.token_path.clone())
    }

    /// Point the token exchange at a different endpoint.
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into();
        self
    }

    /// Point the consent URL at a different authorization endpoint.
    pub fn with_auth_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.auth_endpoint = endpoint.into();
        self
    }

    /// Loopback address the consent redirect is served on. Port 0 picks a
    /// free port.
    pub fn with_redirect_addr(mut self, addr: SocketAddr) -> Self {
        self.redirect_addr = addr;
        self
    }

    /// Load the persisted refresh token, if any.
    ///
    /// A missing or unreadable file means "not yet authorized".
    pub async fn load_saved(&self) -> Option<AuthorizedUser> {
        let content = tokio::fs::read(&self.token_path).await.ok()?;
        match serde_json::from_slice(&content) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(path = %self.token_path.display(), error = %e, "Ignoring malformed token file");
                None
            }
        }
    }

    async fn save(&self, secrets: &ClientSecrets, refresh_token: &str) -> Result<(), SheetsError> {
        let user = AuthorizedUser {
            kind: "authorized_user".to_string(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            refresh_token: refresh_token.to_string(),
        };
        let payload = serde_json::to_vec(&user)?;
        tokio::fs::write(&self.token_path, payload)
            .await
            .map_err(|source| io_error(&self.token_path, source))?;
        tracing::info!(path = %self.token_path.display(), "Saved OAuth refresh token");
        Ok(())
    }

    async fn load_client_secrets(&self) -> Result<ClientSecrets, SheetsError> {
        let content = tokio::fs::read(&self.credentials_path)
            .await
            .map_err(|source| io_error(&self.credentials_path, source))?;
        let file: ClientSecretsFile = serde_json::from_slice(&content)?;
        file.installed.or(file.web).ok_or_else(|| {
            SheetsError::Auth(format!(
                "{} has neither an `installed` nor a `web` client",
                self.credentials_path.display()
            ))
        })
    }

    async fn refresh(&self, user: &AuthorizedUser) -> Result<TokenResponse, SheetsError> {
        self.exchange(&[
            ("client_id", user.client_id.as_str()),
            ("client_secret", user.client_secret.as_str()),
            ("refresh_token", user.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn exchange(&self, form: &[(&str, &str)]) -> Result<TokenResponse, SheetsError> {
        let response = self.client.post(&self.token_endpoint).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SheetsError::Auth(format!("token endpoint returned {status}: {body}")));
        }
        Ok(response.json().await?)
    }

    fn consent_url(&self, client_id: &str, redirect_uri: &str) -> Result<url::Url, SheetsError> {
        url::Url::parse_with_params(
            &self.auth_endpoint,
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", SHEETS_READONLY_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| SheetsError::Config(format!("invalid auth endpoint: {e}")))
    }

    /// Interactive installed-app flow over a loopback redirect.
    async fn consent(&self) -> Result<TokenResponse, SheetsError> {
        let listener = TcpListener::bind(self.redirect_addr)
            .await
            .map_err(|source| io_error(Path::new(&self.redirect_addr.to_string()), source))?;
        self.consent_on(listener).await
    }

    async fn consent_on(&self, listener: TcpListener) -> Result<TokenResponse, SheetsError> {
        let secrets = self.load_client_secrets().await?;

        let addr = listener
            .local_addr()
            .map_err(|source| io_error(Path::new(&self.redirect_addr.to_string()), source))?;
        let redirect_uri = format!("http://{addr}");

        let consent_url = self.consent_url(&secrets.client_id, &redirect_uri)?;
        tracing::info!(url = %consent_url, "Authorize spreadsheet access by opening this URL");

        let code = await_redirect(listener).await?;
        let token = self
            .exchange(&[
                ("code", code.as_str()),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        match token.refresh_token.as_deref() {
            Some(refresh_token) => self.save(&secrets, refresh_token).await?,
            None => tracing::warn!("Consent returned no refresh token; the next run will ask again"),
        }
        Ok(token)
    }
}

#[async_trait::async_trait]
impl Authorizer for GoogleAuthorizer {
    async fn authorize(&self) -> Result<Credential, SheetsError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < cached.expires_at {
                return Ok(cached.credential.clone());
            }
        }

        let token = match self.load_saved().await {
            Some(user) => self.refresh(&user).await?,
            None => self.consent().await?,
        };

        let credential = Credential::new(token.access_token);
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        *cache = Some(CachedToken {
            credential: credential.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::debug!(expires_in_secs = lifetime.as_secs(), "Spreadsheet credential ready");
        Ok(credential)
    }
}

// ── Consent redirect listener ───────────────────────────────────────

type RedirectSlot = Arc<std::sync::Mutex<Option<oneshot::Sender<Result<String, String>>>>>;

/// Serve the loopback redirect until a request carries `code` or `error`.
///
/// Requests without either (favicon, pre-connects, reloads) are answered and
/// ignored.
async fn await_redirect(listener: TcpListener) -> Result<String, SheetsError> {
    let (code_tx, code_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let slot: RedirectSlot = Arc::new(std::sync::Mutex::new(Some(code_tx)));
    let app = Router::new().route("/", get(redirect)).with_state(slot);

    tokio::spawn(async move {
        let shutdown = async move {
            let _ = stop_rx.await;
        };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            tracing::warn!(error = %e, "OAuth redirect listener failed");
        }
    });

    let outcome = code_rx.await;
    let _ = stop_tx.send(());

    match outcome {
        Ok(Ok(code)) => Ok(code),
        Ok(Err(error)) => Err(SheetsError::Auth(format!("consent denied: {error}"))),
        Err(_) => Err(SheetsError::Auth(
            "OAuth redirect listener stopped before a code arrived".to_string(),
        )),
    }
}

async fn redirect(
    State(slot): State<RedirectSlot>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    let (outcome, reply) = match (params.get("error"), params.get("code")) {
        (Some(error), _) => (Err(error.clone()), "Authentication failed. Check the server logs."),
        (None, Some(code)) => (Ok(code.clone()), "Authentication complete. You may close this window."),
        (None, None) => return (StatusCode::BAD_REQUEST, "Waiting for the authorization code."),
    };

    let sender = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(_) => None,
    };
    match sender {
        Some(tx) => {
            let _ = tx.send(outcome);
            (StatusCode::OK, reply)
        }
        None => (StatusCode::CONFLICT, "Authorization already received."),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SheetsError {
    SheetsError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use std::collections::HashMap;

    async fn spawn_token_endpoint() -> String {
        async fn token(Form(form): Form<HashMap<String, String>>) -> Json<serde_json::Value> {
            assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
            let refresh = form.get("refresh_token").cloned().unwrap_or_default();
            Json(serde_json::json!({
                "access_token": format!("access-for-{refresh}"),
                "expires_in": 3599,
                "token_type": "Bearer",
            }))
        }
        let app = Router::new().route("/token", post(token));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/token")
    }

    fn write_token(dir: &Path) -> PathBuf {
        let path = dir.join("token.json");
        std::fs::write(
            &path,
            r#"{"type":"authorized_user","client_id":"cid","client_secret":"secret","refresh_token":"r1"}"#,
        )
        .unwrap();
        path
    }

    fn write_client_secrets(dir: &Path) -> PathBuf {
        let path = dir.join("credentials.json");
        std::fs::write(&path, r#"{"installed":{"client_id":"cid","client_secret":"secret"}}"#).unwrap();
        path
    }

    /// Token endpoint for the authorization-code grant.
    async fn spawn_code_endpoint(expected_redirect: String) -> String {
        let token = move |Form(form): Form<HashMap<String, String>>| {
            let expected_redirect = expected_redirect.clone();
            async move {
                assert_eq!(form.get("grant_type").map(String::as_str), Some("authorization_code"));
                assert_eq!(form.get("redirect_uri"), Some(&expected_redirect));
                let code = form.get("code").cloned().unwrap_or_default();
                Json(serde_json::json!({
                    "access_token": format!("access-for-{code}"),
                    "expires_in": 3599,
                    "refresh_token": "r-new",
                }))
            }
        };
        let app = Router::new().route("/token", post(token));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/token")
    }

    async fn connect_when_ready(addr: SocketAddr) -> tokio::net::TcpStream {
        for _ in 0..200 {
            if let Ok(stream) = tokio::net::TcpStream::connect(addr).await {
                return stream;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("consent listener never came up on {addr}");
    }

    #[test]
    fn credential_debug_is_redacted() {
        let rendered = format!("{:?}", Credential::new("ya29.secret"));
        assert!(!rendered.contains("ya29"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn consent_url_uses_configured_endpoint() {
        let auth = GoogleAuthorizer::new("credentials.json", "token.json")
            .with_auth_endpoint("https://auth.example.test/o/oauth2/auth");
        let url = auth.consent_url("cid", "http://127.0.0.1:8123").unwrap();
        assert!(url.as_str().starts_with("https://auth.example.test/o/oauth2/auth?"));

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "cid");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:8123");
        assert_eq!(params["scope"], SHEETS_READONLY_SCOPE);
        assert_eq!(params["access_type"], "offline");
    }

    #[tokio::test]
    async fn authorize_without_token_runs_consent_despite_stray_requests() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let redirect_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let endpoint = spawn_code_endpoint(format!("http://{redirect_addr}")).await;

        let auth = Arc::new(
            GoogleAuthorizer::new(write_client_secrets(dir.path()), token_path.clone())
                .with_token_endpoint(endpoint)
                .with_redirect_addr(redirect_addr),
        );
        let task = tokio::spawn({
            let auth = auth.clone();
            async move { auth.authorize().await }
        });

        // A browser pre-connect: opened, then closed without a request.
        drop(connect_when_ready(redirect_addr).await);

        let client = reqwest::Client::new();
        let favicon = client
            .get(format!("http://{redirect_addr}/favicon.ico"))
            .send()
            .await
            .unwrap();
        assert_eq!(favicon.status(), reqwest::StatusCode::NOT_FOUND);
        let bare = client.get(format!("http://{redirect_addr}/")).send().await.unwrap();
        assert_eq!(bare.status(), reqwest::StatusCode::BAD_REQUEST);

        let redirect = client
            .get(format!("http://{redirect_addr}/?code=4%2F0Abc&scope=x"))
            .send()
            .await
            .unwrap();
        assert_eq!(redirect.status(), reqwest::StatusCode::OK);

        let credential = task.await.unwrap().unwrap();
        assert_eq!(credential.access_token(), "access-for-4/0Abc");

        let saved: AuthorizedUser =
            serde_json::from_slice(&std::fs::read(&token_path).unwrap()).unwrap();
        assert_eq!(
            saved,
            AuthorizedUser {
                kind: "authorized_user".to_string(),
                client_id: "cid".to_string(),
                client_secret: "secret".to_string(),
                refresh_token: "r-new".to_string(),
            }
        );

        // Served from cache afterwards; no second consent.
        assert_eq!(auth.authorize().await.unwrap(), credential);
    }

    #[tokio::test]
    async fn denied_consent_is_an_auth_error_and_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let auth = GoogleAuthorizer::new(write_client_secrets(dir.path()), token_path.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let consent = tokio::spawn(async move { auth.consent_on(listener).await.map(|_| ()) });

        let response = reqwest::get(format!("http://{addr}/?error=access_denied"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        match consent.await.unwrap().unwrap_err() {
            SheetsError::Auth(msg) => assert!(msg.contains("access_denied"), "{msg}"),
            other => panic!("expected Auth error, got: {other:?}"),
        }
        assert!(!token_path.exists());
    }

    #[tokio::test]
    async fn load_saved_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let auth = GoogleAuthorizer::new(dir.path().join("credentials.json"), dir.path().join("token.json"));
        assert!(auth.load_saved().await.is_none());
    }

    #[tokio::test]
    async fn load_saved_reads_authorized_user() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = write_token(dir.path());
        let auth = GoogleAuthorizer::new(dir.path().join("credentials.json"), token_path);
        let user = auth.load_saved().await.unwrap();
        assert_eq!(user.kind, "authorized_user");
        assert_eq!(user.refresh_token, "r1");
    }

    #[tokio::test]
    async fn save_persists_client_and_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let auth = GoogleAuthorizer::new(dir.path().join("credentials.json"), dir.path().join("token.json"));
        let secrets = ClientSecrets {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
        };
        auth.save(&secrets, "r9").await.unwrap();

        let user = auth.load_saved().await.unwrap();
        assert_eq!(
            user,
            AuthorizedUser {
                kind: "authorized_user".to_string(),
                client_id: "cid".to_string(),
                client_secret: "secret".to_string(),
                refresh_token: "r9".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn client_secrets_accept_web_section() {
        let dir = tempfile::tempdir().unwrap();
        let creds = dir.path().join("credentials.json");
        std::fs::write(&creds, r#"{"web":{"client_id":"w","client_secret":"s"}}"#).unwrap();
        let auth = GoogleAuthorizer::new(creds, dir.path().join("token.json"));
        let secrets = auth.load_client_secrets().await.unwrap();
        assert_eq!(secrets.client_id, "w");
    }

    #[tokio::test]
    async fn missing_client_secrets_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let auth = GoogleAuthorizer::new(dir.path().join("nope.json"), dir.path().join("token.json"));
        assert!(matches!(auth.load_client_secrets().await, Err(SheetsError::Io { .. })));
    }

    #[tokio::test]
    async fn authorize_refreshes_saved_token_and_caches_it() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = write_token(dir.path());
        let endpoint = spawn_token_endpoint().await;
        let auth = GoogleAuthorizer::new(dir.path().join("credentials.json"), token_path.clone())
            .with_token_endpoint(endpoint);

        let first = auth.authorize().await.unwrap();
        assert_eq!(first.access_token(), "access-for-r1");

        // Cached: a deleted token file no longer matters until expiry.
        std::fs::remove_file(&token_path).unwrap();
        let second = auth.authorize().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn rejected_refresh_is_an_auth_error() {
        async fn reject() -> (axum::http::StatusCode, &'static str) {
            (axum::http::StatusCode::BAD_REQUEST, "invalid_grant")
        }
        let app = Router::new().route("/token", post(reject));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let auth = GoogleAuthorizer::new(dir.path().join("credentials.json"), write_token(dir.path()))
            .with_token_endpoint(format!("http://{addr}/token"));
        match auth.authorize().await.unwrap_err() {
            SheetsError::Auth(msg) => assert!(msg.contains("invalid_grant")),
            other => panic!("expected Auth error, got: {other:?}"),
        }
    }
}
