use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Form,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;
use crate::config::Config;
use crate::error::{JournalError, Result};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session";

/// Login form data
///
/// There are no user accounts; everyone shares the one configured password.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub password: String,
}

/// Text being prepared in a session before it is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Accumulated transcriptions and edits shown in the text area
    pub transcription: String,

    /// Id of the last audio clip sent for transcription, so the same clip is
    /// never transcribed twice
    pub last_audio_id: Option<String>,
}

impl Draft {
    /// Append a transcript, separated from existing text by a blank line.
    pub fn append_transcript(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.transcription.is_empty() {
            self.transcription = text.to_string();
        } else {
            self.transcription.push_str("\n\n");
            self.transcription.push_str(text);
        }
    }
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    /// Time when the session expires
    pub expires_at: SystemTime,

    pub draft: Draft,
}

/// Session id of the authenticated request, inserted by `require_auth`.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

/// All active sessions, keyed by session id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    duration: Duration,
}

impl SessionStore {
    pub fn new(duration: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            duration,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Create and store a new session
    ///
    /// # Returns
    /// * `String` - A unique session ID
    pub fn create(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            expires_at: SystemTime::now() + self.duration,
            draft: Draft::default(),
        };

        let mut sessions = self.write();
        let now = SystemTime::now();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(session_id.clone(), session);

        session_id
    }

    /// Checks if a session exists and has not expired.
    pub fn validate(&self, session_id: &str) -> bool {
        self.read()
            .get(session_id)
            .is_some_and(|s| s.expires_at > SystemTime::now())
    }

    pub fn remove(&self, session_id: &str) {
        self.write().remove(session_id);
    }

    pub fn draft(&self, session_id: &str) -> Option<Draft> {
        self.read().get(session_id).map(|s| s.draft.clone())
    }

    /// Apply `f` to the session's draft. Returns `None` for unknown sessions.
    pub fn update_draft<R>(&self, session_id: &str, f: impl FnOnce(&mut Draft) -> R) -> Option<R> {
        self.write().get_mut(session_id).map(|s| f(&mut s.draft))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash a password using Argon2
///
/// Creates a cryptographically secure hash of a password using Argon2id,
/// suitable for `app_password_hash`.
///
/// # Errors
/// * Returns an error if the password hashing fails
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| JournalError::Config(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored hash
///
/// # Returns
/// * `Result<bool>` - True if the password matches, false if not
///
/// # Errors
/// * Returns an error if the hash is in an invalid format
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| JournalError::Config("Invalid password hash format".to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Check a login attempt against the configured shared password.
///
/// The argon2 hash is used when configured, otherwise the plain password.
/// Either way the comparison goes through argon2, never a byte-by-byte `==`.
pub fn verify_app_password(config: &Config, candidate: &str) -> Result<bool> {
    if let Some(hash) = &config.app_password_hash {
        return verify_password(candidate, hash);
    }
    match &config.app_password {
        Some(password) if password.is_empty() || candidate.is_empty() => Ok(false),
        Some(password) => verify_password(candidate, &hash_password(password)?),
        None => Err(JournalError::Config("No application password configured".to_string())),
    }
}

/// Replace a plain shared password with its argon2 hash so logins do not
/// hash it again on every attempt.
pub fn seal_app_password(config: &mut Config) -> Result<()> {
    if config.app_password_hash.is_some() {
        return Ok(());
    }
    if let Some(password) = config.app_password.as_deref().filter(|p| !p.is_empty()) {
        config.app_password_hash = Some(hash_password(password)?);
        config.app_password = None;
    }
    Ok(())
}

fn session_cookie(session_id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Serve the login page, or go straight to the journal when already signed in.
pub async fn serve_login_page(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if state.sessions.validate(cookie.value()) {
            return Redirect::to("/").into_response();
        }
    }
    match state.pages.login(None) {
        Ok(page) => page.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Handle login requests
///
/// Checks the shared password and creates a session if it matches.
///
/// # Returns
/// * `Response` - Redirect to the journal if successful, or the login page with an error
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let (status, message) = match verify_app_password(&state.config, &form.password) {
        Ok(true) => {
            let session_id = state.sessions.create();
            log::info!("Login succeeded ({} active sessions)", state.sessions.len());
            return (jar.add(session_cookie(session_id)), Redirect::to("/")).into_response();
        }
        Ok(false) => {
            log::warn!("Login failed: wrong password");
            (
                StatusCode::UNAUTHORIZED,
                "Contraseña incorrecta. Intenta nuevamente.",
            )
        }
        Err(e) => {
            log::error!("Login error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error de autenticación.")
        }
    };

    match state.pages.login(Some(message)) {
        Ok(page) => (status, page).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Handle logout
///
/// Drops the session and its draft, clears the cookie and redirects to the login page.
pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    state.sessions.remove(&session_id);
    log::info!("Logged out");
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/login"),
    )
}

/// Authentication middleware
///
/// Lets requests with a valid session through, with the session id in the
/// request extensions. Anything else is sent to the login page, except API
/// calls which get a plain 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if state.sessions.validate(cookie.value()) {
            request
                .extensions_mut()
                .insert(SessionId(cookie.value().to_string()));
            return next.run(request).await;
        }
    }

    if request.uri().path().starts_with("/api/") {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    Redirect::to("/login").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("clave-segura").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("clave-segura", &hash).unwrap());
        assert!(!verify_password("otra", &hash).unwrap());
        assert!(verify_password("x", "not-a-hash").is_err());
    }

    #[test]
    fn app_password_prefers_hash() {
        let mut config = Config::default();
        config.app_password = Some("plain".into());
        assert!(verify_app_password(&config, "plain").unwrap());
        assert!(!verify_app_password(&config, "").unwrap());

        config.app_password_hash = Some(hash_password("hashed").unwrap());
        assert!(verify_app_password(&config, "hashed").unwrap());
        assert!(!verify_app_password(&config, "plain").unwrap());
    }

    #[test]
    fn sealed_plain_password_still_verifies() {
        let mut config = Config::default();
        config.app_password = Some("plain".into());
        seal_app_password(&mut config).unwrap();

        assert!(config.app_password.is_none());
        assert!(config.app_password_hash.is_some());
        assert!(verify_app_password(&config, "plain").unwrap());
        assert!(!verify_app_password(&config, "plai").unwrap());
        assert!(!verify_app_password(&config, "").unwrap());
    }

    #[test]
    fn sealing_keeps_an_existing_hash() {
        let mut config = Config::default();
        config.app_password = Some("plain".into());
        config.app_password_hash = Some(hash_password("hashed").unwrap());
        seal_app_password(&mut config).unwrap();

        assert!(verify_app_password(&config, "hashed").unwrap());
        assert!(!verify_app_password(&config, "plain").unwrap());
    }

    #[test]
    fn no_password_is_an_error() {
        assert!(verify_app_password(&Config::default(), "x").is_err());
    }

    #[test]
    fn sessions_expire() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create();
        assert!(store.validate(&id));
        assert!(!store.validate("unknown"));

        let expired = SessionStore::new(Duration::ZERO);
        let id = expired.create();
        assert!(!expired.validate(&id));
    }

    #[test]
    fn removed_session_is_invalid() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.create();
        store.remove(&id);
        assert!(!store.validate(&id));
        assert!(store.draft(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn draft_updates_are_per_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = store.create();
        let b = store.create();
        store.update_draft(&a, |d| d.append_transcript("hola"));
        assert_eq!(store.draft(&a).unwrap().transcription, "hola");
        assert_eq!(store.draft(&b).unwrap(), Draft::default());
        assert!(store.update_draft("unknown", |_| ()).is_none());
    }

    #[test]
    fn transcripts_are_separated_by_blank_line() {
        let mut draft = Draft::default();
        draft.append_transcript("  primera parte ");
        draft.append_transcript("");
        draft.append_transcript("segunda\n");
        assert_eq!(draft.transcription, "primera parte\n\nsegunda");
    }
}
