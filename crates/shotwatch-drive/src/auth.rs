//! OAuth2 authentication for the Google Drive API
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for an
//! installed application, plus refresh-token renewal for the long-running
//! agent.
//!
//! ## Components
//!
//! - [`OAuth2Config`] - Client credentials, endpoints and scopes
//! - [`KeyringTokenStorage`] - Secure token storage using the system keyring
//! - [`PKCEFlow`] - OAuth2 PKCE challenge/exchange/refresh logic
//! - [`LocalCallbackServer`] - Loopback HTTP listener for the OAuth redirect
//! - [`DriveAuthAdapter`] - Orchestrates the interactive login
//! - [`TokenManager`] - Hands out access tokens, refreshing them before expiry

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    Scope, TokenResponse, TokenUrl,
};
use shotwatch_core::config::AuthConfig;
use shotwatch_core::ports::Tokens;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Keyring service name for storing tokens
const KEYRING_SERVICE: &str = "shotwatch";

/// Full Drive scope; folder sharing needs more than `drive.file`
const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/drive"];

/// Tokens expiring sooner than this are refreshed before use
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// How long the login flow waits for the browser redirect
const CALLBACK_TIMEOUT: StdDuration = StdDuration::from_secs(300);

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

// ============================================================================
// OAuth2Config
// ============================================================================

/// Configuration for the OAuth2 flows
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// OAuth client ID from the Google Cloud console
    pub client_id: String,
    /// Client secret issued for installed applications
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    /// Loopback URI the browser is redirected to
    pub redirect_uri: String,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
}

impl OAuth2Config {
    /// Builds the flow configuration from the `auth` config section
    ///
    /// # Errors
    /// Fails if no client ID is configured
    pub fn from_config(auth: &AuthConfig) -> Result<Self> {
        let client_id = auth
            .client_id
            .clone()
            .context("auth.client_id is not configured")?;

        Ok(Self {
            client_id,
            client_secret: auth.client_secret.clone(),
            auth_url: auth.auth_url.clone(),
            token_url: auth.token_url.clone(),
            redirect_uri: auth.redirect_uri.clone(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Creates a config with custom scopes
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Username the tokens are filed under in the keyring
    pub fn keyring_account(&self) -> &str {
        &self.client_id
    }
}

// ============================================================================
// KeyringTokenStorage
// ============================================================================

/// Stores and retrieves OAuth tokens from the system keyring
///
/// Tokens are serialized as JSON under the service name "shotwatch".
pub struct KeyringTokenStorage;

impl KeyringTokenStorage {
    /// Stores tokens in the system keyring under `account`
    pub fn store(account: &str, tokens: &Tokens) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, account)
            .context("Failed to create keyring entry")?;

        let json = serde_json::to_string(tokens).context("Failed to serialize tokens")?;

        entry
            .set_password(&json)
            .context("Failed to store tokens in keyring")?;

        debug!(account, "Stored tokens in keyring");
        Ok(())
    }

    /// Loads tokens for `account`, `None` if nothing is stored
    pub fn load(account: &str) -> Result<Option<Tokens>> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, account)
            .context("Failed to create keyring entry")?;

        match entry.get_password() {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_str(&json)
                    .context("Failed to deserialize tokens from keyring")?;
                debug!(account, "Loaded tokens from keyring");
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(account, "No tokens found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    /// Removes stored tokens for `account`
    pub fn clear(account: &str) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, account)
            .context("Failed to create keyring entry")?;

        match entry.delete_credential() {
            Ok(()) => {
                info!(account, "Cleared tokens from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

// ============================================================================
// PKCEFlow
// ============================================================================

/// OAuth2 PKCE flow implementation using the `oauth2` crate
pub struct PKCEFlow {
    client: ConfiguredClient,
    http: reqwest::Client,
    scopes: Vec<String>,
}

impl PKCEFlow {
    /// Creates a new PKCEFlow with the given configuration
    pub fn new(config: &OAuth2Config) -> Result<Self> {
        let mut client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_auth_uri(AuthUrl::new(config.auth_url.clone()).context("Invalid authorization URL")?)
            .set_token_uri(TokenUrl::new(config.token_url.clone()).context("Invalid token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone()).context("Invalid redirect URI")?,
            );
        if let Some(secret) = &config.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build OAuth HTTP client")?;

        Ok(Self {
            client,
            http,
            scopes: config.scopes.clone(),
        })
    }

    /// Generates an authorization URL with a PKCE challenge
    ///
    /// Google only issues a refresh token for `access_type=offline`, and only
    /// on first consent unless `prompt=consent` forces it.
    ///
    /// # Returns
    /// `(authorization_url, csrf_token, pkce_verifier)`; keep the verifier
    /// until the code exchange.
    pub fn generate_auth_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");

        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_token) = auth_request.set_pkce_challenge(pkce_challenge).url();

        debug!("Generated authorization URL");
        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchanges an authorization code for OAuth tokens
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<Tokens> {
        info!("Exchanging authorization code for tokens");

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .context("Failed to exchange authorization code")?;

        let tokens = Tokens {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result.refresh_token().map(|t| t.secret().to_string()),
            expires_at: expiry_from(token_result.expires_in()),
        };

        if tokens.refresh_token.is_none() {
            warn!("Token endpoint returned no refresh token; the agent will need a new login when this token expires");
        }
        Ok(tokens)
    }

    /// Obtains a fresh access token from a refresh token
    ///
    /// Google usually omits the refresh token from refresh responses, so the
    /// one passed in is carried over.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Tokens> {
        debug!("Refreshing access token");

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .context("Failed to refresh token")?;

        let tokens = Tokens {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| Some(refresh_token.to_string())),
            expires_at: expiry_from(token_result.expires_in()),
        };

        info!(expires_at = %tokens.expires_at, "Refreshed access token");
        Ok(tokens)
    }
}

fn expiry_from(expires_in: Option<StdDuration>) -> chrono::DateTime<Utc> {
    expires_in
        .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
        .unwrap_or_else(|| Utc::now() + Duration::hours(1))
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Parameters extracted from the OAuth2 callback
#[derive(Debug, PartialEq, Eq)]
pub struct CallbackParams {
    /// The authorization code
    pub code: String,
    /// The CSRF state parameter
    pub state: String,
}

/// Loopback HTTP listener that waits for the OAuth2 redirect
///
/// Requests to any other path (browsers like to ask for `/favicon.ico`) get
/// a 404 and the server keeps waiting.
pub struct LocalCallbackServer {
    listener: TcpListener,
    path: String,
}

impl LocalCallbackServer {
    /// Binds the host and port named in `redirect_uri`
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let url = url::Url::parse(redirect_uri).context("Invalid redirect URI")?;
        let host = url.host_str().context("Redirect URI has no host")?.to_string();
        let port = url
            .port_or_known_default()
            .context("Redirect URI has no port")?;

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .with_context(|| format!("Failed to bind callback server to {host}:{port}"))?;

        info!(%host, port, "OAuth callback server listening");
        Ok(Self {
            listener,
            path: url.path().to_string(),
        })
    }

    /// Address actually bound (differs from the URI when port 0 was used)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves connections until one carries an authorization code
    pub async fn wait_for_callback(self) -> Result<CallbackParams> {
        let (tx, mut rx) = mpsc::channel::<CallbackParams>(1);

        loop {
            tokio::select! {
                Some(params) = rx.recv() => {
                    info!("Received OAuth callback with authorization code");
                    return Ok(params);
                }
                accepted = self.listener.accept() => {
                    let (stream, _addr) =
                        accepted.context("Failed to accept connection on callback server")?;
                    let tx = tx.clone();
                    let expected_path = self.path.clone();

                    tokio::spawn(async move {
                        use hyper::server::conn::http1;
                        use hyper::service::service_fn;
                        use hyper_util::rt::TokioIo;

                        let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                            let tx = tx.clone();
                            let expected_path = expected_path.clone();
                            async move {
                                Ok::<_, Infallible>(handle_callback(req.uri(), &expected_path, &tx))
                            }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            warn!("Callback server connection error: {}", e);
                        }
                    });
                }
            }
        }
    }
}

fn handle_callback(
    uri: &hyper::Uri,
    expected_path: &str,
    tx: &mpsc::Sender<CallbackParams>,
) -> Response<Full<Bytes>> {
    if uri.path() != expected_path {
        return html_response(StatusCode::NOT_FOUND, error_html("Not found"));
    }

    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();

    match parse_callback_params(&target) {
        Some(params) => {
            // A second callback after the first was taken is simply ignored
            let _ = tx.try_send(params);
            html_response(StatusCode::OK, success_html())
        }
        None => html_response(
            StatusCode::BAD_REQUEST,
            error_html("Missing authorization code in callback"),
        ),
    }
}

fn html_response(status: StatusCode, html: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(html)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// Parses the authorization code and state from a callback path and query
fn parse_callback_params(target: &str) -> Option<CallbackParams> {
    let url = url::Url::parse(&format!("http://localhost{}", target)).ok()?;
    let mut code = None;
    let mut state = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            _ => {}
        }
    }

    Some(CallbackParams {
        code: code?,
        state: state.unwrap_or_default(),
    })
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Shotwatch - Signed In</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Signed In</h1>
    <p>Shotwatch can now upload to your Google Drive.</p>
    <p>You can close this window.</p>
</body>
</html>"#
        .to_string()
}

fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Shotwatch - Sign-in Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Sign-in Error</h1>
    <p>{}</p>
</body>
</html>"#,
        message
    )
}

// ============================================================================
// DriveAuthAdapter
// ============================================================================

/// Runs the interactive login:
///
/// 1. Binds the loopback callback listener
/// 2. Generates a PKCE authorization URL and opens it in the browser
/// 3. Waits for the redirect and checks its CSRF state
/// 4. Exchanges the code for tokens
pub struct DriveAuthAdapter {
    config: OAuth2Config,
}

impl DriveAuthAdapter {
    pub fn new(config: OAuth2Config) -> Self {
        Self { config }
    }

    /// Performs the login and returns the obtained tokens
    ///
    /// `show_url` receives the authorization URL so the caller can print it
    /// for headless machines where no browser opens.
    pub async fn login(&self, show_url: impl FnOnce(&str)) -> Result<Tokens> {
        info!("Starting OAuth2 PKCE login flow");

        let flow = PKCEFlow::new(&self.config)?;
        let server = LocalCallbackServer::bind(&self.config.redirect_uri).await?;
        let (auth_url, csrf_token, pkce_verifier) = flow.generate_auth_url();

        show_url(&auth_url);
        if let Err(e) = webbrowser::open(&auth_url) {
            warn!("Could not open a browser: {}", e);
        }

        let callback = tokio::time::timeout(CALLBACK_TIMEOUT, server.wait_for_callback())
            .await
            .context("Timed out waiting for the browser sign-in")??;

        if callback.state != *csrf_token.secret() {
            anyhow::bail!("OAuth callback state does not match; refusing the authorization code");
        }

        let tokens = flow.exchange_code(callback.code, pkce_verifier).await?;
        info!("OAuth2 PKCE login completed successfully");
        Ok(tokens)
    }

    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }
}

// ============================================================================
// TokenManager
// ============================================================================

/// Supplies valid access tokens to the remote store
///
/// Holds the current tokens and renews them through [`PKCEFlow::refresh_token`]
/// once they are within five minutes of expiry. Renewed tokens are written
/// back to the keyring when an account is attached.
pub struct TokenManager {
    flow: PKCEFlow,
    tokens: Mutex<Tokens>,
    keyring_account: Option<String>,
}

impl TokenManager {
    pub fn new(flow: PKCEFlow, tokens: Tokens) -> Self {
        Self {
            flow,
            tokens: Mutex::new(tokens),
            keyring_account: None,
        }
    }

    /// Persist refreshed tokens to the keyring under `account`
    pub fn with_keyring_account(mut self, account: impl Into<String>) -> Self {
        self.keyring_account = Some(account.into());
        self
    }

    /// Builds a manager from tokens previously stored by `login`
    ///
    /// # Errors
    /// Fails if the keyring holds no tokens for this client
    pub fn from_keyring(config: &OAuth2Config) -> Result<Self> {
        let account = config.keyring_account().to_string();
        let tokens = KeyringTokenStorage::load(&account)?
            .context("No stored Google credentials; run `shotwatch login` first")?;
        Ok(Self::new(PKCEFlow::new(config)?, tokens).with_keyring_account(account))
    }

    /// Returns an access token valid for at least the refresh margin
    pub async fn access_token(&self) -> Result<String> {
        let mut tokens = self.tokens.lock().await;

        if tokens.expires_within(Duration::minutes(REFRESH_MARGIN_MINUTES)) {
            let refresh = tokens
                .refresh_token
                .clone()
                .context("Access token expired and no refresh token is available")?;
            let renewed = self.flow.refresh_token(&refresh).await?;

            if let Some(account) = &self.keyring_account {
                if let Err(e) = KeyringTokenStorage::store(account, &renewed) {
                    warn!("Failed to persist refreshed tokens: {:#}", e);
                }
            }
            *tokens = renewed;
        }

        Ok(tokens.access_token.clone())
    }
}
