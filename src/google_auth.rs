//! Google OAuth2 access tokens for the Sheets and Drive APIs.
//!
//! Two credential shapes are accepted, both as the JSON files Google issues:
//! - `service_account`: a signed JWT assertion is exchanged for a token
//! - `authorized_user`: a refresh token is exchanged for a token

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{JournalError, Result};

/// Scopes needed to find a spreadsheet by name and edit its cells.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoogleCredentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

impl GoogleCredentials {
    /// Parse a credentials JSON document.
    ///
    /// Keys pasted into secret stores often arrive with literal `\n`
    /// sequences and carriage returns; both are normalised so the PEM decodes.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut creds: GoogleCredentials = serde_json::from_str(json.trim()).map_err(|e| {
            JournalError::Config(format!("Invalid Google credentials: {}", e))
        })?;
        if let GoogleCredentials::ServiceAccount(key) = &mut creds {
            key.private_key = clean_private_key(&key.private_key);
        }
        Ok(creds)
    }

    pub fn token_uri(&self) -> &str {
        match self {
            GoogleCredentials::ServiceAccount(k) => &k.token_uri,
            GoogleCredentials::AuthorizedUser(u) => &u.token_uri,
        }
    }
}

pub fn clean_private_key(key: &str) -> String {
    key.replace("\\n", "\n").replace('\r', "")
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Signed RS256 assertion for the jwt-bearer grant.
fn signed_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String> {
    let claims = Claims {
        iss: &key.client_email,
        scope: SCOPES.join(" "),
        aud: &key.token_uri,
        iat: now.timestamp(),
        exp: (now + Duration::hours(1)).timestamp(),
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(&header, &claims, &encoding_key)?)
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Hands out a valid access token, fetching a new one only when the cached
/// token is about to expire. Concurrent callers share one refresh.
pub struct TokenProvider {
    http: reqwest::Client,
    credentials: GoogleCredentials,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, credentials: GoogleCredentials) -> Self {
        Self {
            http,
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.is_expired(Utc::now()) {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        log::debug!("Google access token refreshed, expires {}", fresh.expires_at);
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn fetch(&self) -> Result<AccessToken> {
        let now = Utc::now();
        let request = match &self.credentials {
            GoogleCredentials::ServiceAccount(key) => {
                let assertion = signed_assertion(key, now)?;
                self.http.post(&key.token_uri).form(&[
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ])
            }
            GoogleCredentials::AuthorizedUser(user) => {
                let mut form = vec![
                    ("client_id", user.client_id.as_str()),
                    ("refresh_token", user.refresh_token.as_str()),
                    ("grant_type", "refresh_token"),
                ];
                if let Some(secret) = user.client_secret.as_deref() {
                    form.push(("client_secret", secret));
                }
                self.http.post(&user.token_uri).form(&form)
            }
        };

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(map_token_error(status.as_u16(), &body));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        Ok(AccessToken {
            token: parsed.access_token,
            expires_at: now + Duration::seconds(parsed.expires_in.unwrap_or(3600)),
        })
    }
}

fn map_token_error(status: u16, body: &str) -> JournalError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let description = parsed
        .as_ref()
        .and_then(|v| {
            v["error_description"]
                .as_str()
                .or_else(|| v["error"].as_str())
        })
        .unwrap_or(body)
        .trim()
        .to_string();
    JournalError::Auth(format!("HTTP {}: {}", status, description))
}
