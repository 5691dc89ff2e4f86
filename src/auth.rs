use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration as StdDuration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::AuthSettings;

/// OAuth scope needed to list, delete and insert events.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

// Tokens this close to expiry are refreshed rather than used.
const EXPIRY_MARGIN_SECS: i64 = 60;
const LOGIN_TIMEOUT: StdDuration = StdDuration::from_secs(300);

/// A bearer token for the calendar API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One way of obtaining a [`Credential`].
pub trait CredentialStrategy {
    fn name(&self) -> &'static str;
    fn acquire(&self) -> Result<Credential>;
}

/// Pick a strategy from the environment: service account, then stored token, then interactive login.
pub fn select_strategy(settings: &AuthSettings) -> Result<Box<dyn CredentialStrategy>> {
    if let Some(json) = &settings.service_account_json {
        return Ok(Box::new(ServiceAccount::from_json(json)?));
    }
    if settings.token_path.exists() {
        match AuthorizedUser::load(&settings.token_path) {
            Ok(user) if user.is_usable() => {
                return Ok(Box::new(StoredToken::new(&settings.token_path, user)));
            }
            Ok(_) => warn!(path = %settings.token_path.display(), "Stored token has no refresh token; logging in again"),
            Err(e) => warn!(error = %e, "Ignoring unreadable stored token"),
        }
    }
    Ok(Box::new(InstalledApp::new(&settings.client_secrets_path, &settings.token_path)))
}

/// Acquire a credential once for the run.
#[instrument(level = "info", skip(settings))]
pub fn acquire_credential(settings: &AuthSettings) -> Result<Credential> {
    let strategy = select_strategy(settings)?;
    info!(strategy = strategy.name(), "Acquiring calendar credential");
    strategy.acquire()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in.map(|secs| now + Duration::seconds(secs))
    }
}

fn request_token(token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
    let _span = info_span!("token_request", uri = %token_uri).entered();
    let response = ureq::post(token_uri)
        .send_form(form.iter().copied())
        .with_context(|| format!("Token request to {} failed", token_uri))?;
    response.into_body().read_json::<TokenResponse>().context("Unreadable token response")
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Fields of a service-account key file that the JWT grant uses.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// JWT claim set for the service-account grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JwtClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Service-account credentials, typically from the `GOOGLE_SA` environment variable.
#[derive(Debug)]
pub struct ServiceAccount {
    key: ServiceAccountKey,
}

impl ServiceAccount {
    pub fn from_json(json: &str) -> Result<Self> {
        let key = serde_json::from_str(json).context("GOOGLE_SA is not a valid service-account key")?;
        Ok(Self { key })
    }

    pub fn claims(&self, now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            iss: self.key.client_email.clone(),
            scope: CALENDAR_SCOPE.to_string(),
            aud: self.key.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        }
    }
}

impl CredentialStrategy for ServiceAccount {
    fn name(&self) -> &'static str {
        "service-account"
    }

    fn acquire(&self) -> Result<Credential> {
        let now = Utc::now();
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .context("Service-account private key is not a valid RSA PEM")?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &self.claims(now), &key)
            .context("Failed to sign service-account assertion")?;
        let token = request_token(
            &self.key.token_uri,
            &[("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"), ("assertion", assertion.as_str())],
        )?;
        Ok(Credential { expires_at: token.expires_at(now), access_token: token.access_token })
    }
}

/// Stored user authorization, in the same shape Google's client libraries write to `token.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl AuthorizedUser {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Access token is present and not about to expire.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (Some(_), Some(expiry)) => expiry > now + Duration::seconds(EXPIRY_MARGIN_SECS),
            _ => false,
        }
    }

    /// Either valid now or refreshable.
    pub fn is_usable(&self) -> bool {
        self.is_valid(Utc::now()) || self.refresh_token.is_some()
    }
}

/// Cached user token, refreshed and re-saved when expired.
#[derive(Debug)]
pub struct StoredToken {
    path: PathBuf,
    user: AuthorizedUser,
}

impl StoredToken {
    pub fn new(path: &Path, user: AuthorizedUser) -> Self {
        Self { path: path.to_path_buf(), user }
    }
}

impl CredentialStrategy for StoredToken {
    fn name(&self) -> &'static str {
        "stored-token"
    }

    fn acquire(&self) -> Result<Credential> {
        let now = Utc::now();
        if self.user.is_valid(now) {
            if let Some(token) = &self.user.token {
                return Ok(Credential { access_token: token.clone(), expires_at: self.user.expiry });
            }
        }

        let refresh_token = self
            .user
            .refresh_token
            .as_deref()
            .ok_or_else(|| anyhow!("Stored token expired and has no refresh token"))?;
        info!("Refreshing stored token");
        let token = request_token(
            &self.user.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.user.client_id.as_str()),
                ("client_secret", self.user.client_secret.as_str()),
            ],
        )?;

        let mut refreshed = self.user.clone();
        refreshed.token = Some(token.access_token.clone());
        refreshed.expiry = token.expires_at(now);
        if let Some(rt) = token.refresh_token {
            refreshed.refresh_token = Some(rt);
        }
        refreshed.save(&self.path)?;

        Ok(Credential { access_token: token.access_token, expires_at: refreshed.expiry })
    }
}

#[derive(Debug, Deserialize)]
struct ClientSecrets {
    installed: InstalledClient,
}

#[derive(Debug, Deserialize)]
struct InstalledClient {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

/// Interactive login through a loopback redirect, saving the result for later runs.
#[derive(Debug)]
pub struct InstalledApp {
    client_secrets_path: PathBuf,
    token_path: PathBuf,
}

impl InstalledApp {
    pub fn new(client_secrets_path: &Path, token_path: &Path) -> Self {
        Self { client_secrets_path: client_secrets_path.to_path_buf(), token_path: token_path.to_path_buf() }
    }

    fn load_client(&self) -> Result<InstalledClient> {
        let raw = fs::read_to_string(&self.client_secrets_path)
            .with_context(|| format!("Failed to read {}", self.client_secrets_path.display()))?;
        let secrets: ClientSecrets = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not an installed-app client file", self.client_secrets_path.display()))?;
        Ok(secrets.installed)
    }
}

impl CredentialStrategy for InstalledApp {
    fn name(&self) -> &'static str {
        "installed-app"
    }

    fn acquire(&self) -> Result<Credential> {
        let client = self.load_client()?;
        let listener = TcpListener::bind("127.0.0.1:0").context("Failed to open loopback listener")?;
        let redirect_uri = format!("http://localhost:{}/", listener.local_addr()?.port());
        let state = Uuid::new_v4().simple().to_string();
        let auth_url = authorization_url(&client.auth_uri, &client.client_id, &redirect_uri, &state)?;
        info!(url = %auth_url, "Open this URL in a browser to authorize calendar access");

        let code = wait_for_redirect(&listener, &state, LOGIN_TIMEOUT)?;

        let now = Utc::now();
        let token = request_token(
            &client.token_uri,
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
            ],
        )?;

        let user = AuthorizedUser {
            token: Some(token.access_token.clone()),
            refresh_token: token.refresh_token.clone(),
            token_uri: client.token_uri,
            client_id: client.client_id,
            client_secret: client.client_secret,
            scopes: vec![CALENDAR_SCOPE.to_string()],
            expiry: token.expires_at(now),
        };
        user.save(&self.token_path)?;
        info!(path = %self.token_path.display(), "Saved token for later runs");

        Ok(Credential { access_token: token.access_token, expires_at: user.expiry })
    }
}

/// Consent URL for the installed-app flow. `state` is echoed back on the redirect.
pub fn authorization_url(auth_uri: &str, client_id: &str, redirect_uri: &str, state: &str) -> Result<Url> {
    let mut url = Url::parse(auth_uri).with_context(|| format!("Invalid auth_uri {:?}", auth_uri))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", CALENDAR_SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", state);
    Ok(url)
}

/// Serve loopback connections until one carries the authorization redirect.
///
/// Unrelated requests get a 404 and the loop keeps listening until `timeout`.
pub fn wait_for_redirect(listener: &TcpListener, state: &str, timeout: StdDuration) -> Result<String> {
    listener.set_nonblocking(true)?;
    let deadline = Instant::now() + timeout;
    loop {
        let (mut stream, _) = match listener.accept() {
            Ok(conn) => conn,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    bail!("No authorization redirect within {:?}", timeout);
                }
                thread::sleep(StdDuration::from_millis(100));
                continue;
            }
            Err(e) => return Err(e).context("Failed to accept authorization redirect"),
        };
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(StdDuration::from_secs(10)))?;

        let mut request_line = String::new();
        // Preconnects may close or stall without sending anything.
        if BufReader::new(&stream).read_line(&mut request_line).is_err() {
            continue;
        }
        let outcome = redirect_code(&request_line, state);
        let (status, reply) = match &outcome {
            Ok(Some(_)) => ("200 OK", "Authorization complete. You may close this window."),
            Ok(None) => ("404 Not Found", ""),
            Err(_) => ("400 Bad Request", "Authorization failed."),
        };
        let _ = stream.write_all(
            format!("HTTP/1.1 {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{}\r\n", status, reply)
                .as_bytes(),
        );
        if let Some(code) = outcome? {
            return Ok(code);
        }
        debug!(request = %request_line.trim(), "Ignoring unrelated loopback request");
    }
}

/// Read the authorization code from the redirect's HTTP request line.
///
/// `Ok(None)` means the request is not the redirect (an empty preconnect, a favicon fetch).
/// A refused consent or a `state` that does not match is an error.
pub fn redirect_code(request_line: &str, expected_state: &str) -> Result<Option<String>> {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Ok(None);
    };
    let Ok(url) = Url::parse(&format!("http://localhost{}", target)) else {
        return Ok(None);
    };
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }
    if code.is_none() && error.is_none() {
        return Ok(None);
    }
    if state.as_deref() != Some(expected_state) {
        bail!("Authorization redirect carried the wrong state");
    }
    if let Some(error) = error {
        bail!("Authorization was refused: {}", error);
    }
    Ok(code)
}
