#![cfg(feature = "web")]
//! Browser sessions, flash messages and the login/logout/language routes
//!
//! A visitor is identified by a `session` cookie holding a random UUID. The
//! session itself lives in memory: the email of the user who last submitted
//! a form or logged in, the chosen language, and flash messages waiting to
//! be shown on the next page.

use axum::{
    Form,
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::app::{AppState, render_page};
use crate::forms::is_valid_email;
use crate::i18n::{Language, translate};
use crate::worksheet::Tool;

pub const SESSION_COOKIE: &str = "session";

/// A one-shot message shown on the next rendered page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flash {
    /// `success`, `error` or `warning`
    pub category: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_email: Option<String>,
    pub language: Language,
    pub flashes: Vec<Flash>,
    expires_at: Instant,
}

impl Session {
    fn new(ttl: Duration) -> Self {
        Session {
            user_email: None,
            language: Language::default(),
            flashes: Vec::new(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

/// In-memory session table
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new anonymous session
    pub fn create(&self) -> (String, Session) {
        let session_id = Uuid::new_v4().to_string();
        let session = Session::new(self.ttl);
        self.write().insert(session_id.clone(), session.clone());
        (session_id, session)
    }

    /// The session, unless it is unknown or expired
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.read()
            .get(session_id)
            .filter(|session| !session.is_expired())
            .cloned()
    }

    /// Modify a session and push its expiry back; a missing one is recreated
    pub fn update(&self, session_id: &str, f: impl FnOnce(&mut Session)) {
        let mut sessions = self.write();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(self.ttl));
        if session.is_expired() {
            *session = Session::new(self.ttl);
        }
        f(session);
        session.expires_at = Instant::now() + self.ttl;
    }

    pub fn flash(&self, session_id: &str, category: &str, message: String) {
        self.update(session_id, |session| {
            session.flashes.push(Flash {
                category: category.to_string(),
                message,
            })
        });
    }

    /// Pending flashes, removed from the session
    pub fn take_flashes(&self, session_id: &str) -> Vec<Flash> {
        self.write()
            .get_mut(session_id)
            .map(|session| std::mem::take(&mut session.flashes))
            .unwrap_or_default()
    }

    /// Forget the user and language but keep the cookie usable
    pub fn clear(&self, session_id: &str) {
        self.update(session_id, |session| {
            session.user_email = None;
            session.language = Language::default();
            session.flashes.clear();
        });
    }

    pub fn remove(&self, session_id: &str) {
        self.write().remove(session_id);
    }

    /// Drop expired sessions, returning how many were removed
    pub fn purge(&self) -> usize {
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn session_cookie(session_id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// The current visitor: session id, a snapshot of the session and the cookie jar
///
/// A visitor without a valid session cookie gets a fresh session; the jar
/// then carries the new cookie and must be part of the response, which
/// [`Visit::respond`] takes care of.
pub struct Visit {
    pub session_id: String,
    pub session: Session,
    pub referer: Option<String>,
    sessions: Arc<SessionStore>,
    jar: CookieJar,
}

impl Visit {
    pub fn language(&self) -> Language {
        self.session.language
    }

    /// Logged-in email, empty when nobody is logged in
    pub fn user_email(&self) -> &str {
        self.session.user_email.as_deref().unwrap_or("")
    }

    pub fn flash(&self, category: &str, message: String) {
        self.sessions.flash(&self.session_id, category, message);
    }

    /// Flash the translation of `key` in the visitor's language
    pub fn flash_tr(&self, category: &str, key: &str) {
        self.flash(category, translate(key, self.language()));
    }

    pub fn take_flashes(&self) -> Vec<Flash> {
        self.sessions.take_flashes(&self.session_id)
    }

    /// Remember who submitted a form, in the language they chose
    pub fn remember(&mut self, email: &str, language: Language) {
        self.sessions.update(&self.session_id, |session| {
            session.user_email = Some(email.to_string());
            session.language = language;
        });
        self.session.user_email = Some(email.to_string());
        self.session.language = language;
    }

    pub fn set_language(&mut self, language: Language) {
        self.sessions
            .update(&self.session_id, |session| session.language = language);
        self.session.language = language;
    }

    pub fn clear(&mut self) {
        self.sessions.clear(&self.session_id);
        self.session.user_email = None;
        self.session.language = Language::default();
    }

    pub fn respond(self, response: impl IntoResponse) -> Response {
        (self.jar, response).into_response()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Visit
where
    Arc<SessionStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionStore>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let referer = parts
            .headers
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let existing = jar.get(SESSION_COOKIE).and_then(|cookie| {
            sessions
                .get(cookie.value())
                .map(|session| (cookie.value().to_string(), session))
        });

        let (session_id, session, jar) = match existing {
            Some((session_id, session)) => (session_id, session, jar),
            None => {
                let (session_id, session) = sessions.create();
                let jar = jar.add(session_cookie(session_id.clone()));
                (session_id, session, jar)
            }
        };

        Ok(Visit {
            session_id,
            session,
            referer,
            sessions,
            jar,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageForm {
    #[serde(default)]
    pub language: String,
}

pub async fn serve_login_page(State(state): State<AppState>, visit: Visit) -> Response {
    let email = visit.user_email().to_string();
    render_page(&state, visit, "login", json!({ "title": "Login", "email": email, "errors": [] }))
}

/// Log in with an email that has already been used on one of the tools
pub async fn handle_login(
    State(state): State<AppState>,
    mut visit: Visit,
    Form(form): Form<LoginForm>,
) -> Response {
    let email = form.email.trim().to_string();
    let language = visit.language();

    if !is_valid_email(&email) {
        let errors = vec![translate("Invalid email address.", language)];
        return render_page(
            &state,
            visit,
            "login",
            json!({ "title": "Login", "email": email, "errors": errors }),
        );
    }

    let known = match state
        .sheets
        .get_user_data_by_email(&email, Tool::Authentication)
        .await
    {
        Ok(records) => records.into_iter().next(),
        Err(e) => {
            warn!("Login lookup failed for {}: {}", email, e);
            visit.flash_tr("error", "Failed to log in due to server error");
            return visit.respond(Redirect::to("/login"));
        }
    };

    match known {
        Some(record) => {
            let language = Language::parse(record.get("language")).unwrap_or(language);
            visit.remember(&email, language);
            info!("User {} logged in", email);
            visit.flash_tr("success", "Logged in successfully");
            visit.respond(Redirect::to("/index"))
        }
        None => {
            let errors = vec![translate("No records found for this email.", language)];
            render_page(
                &state,
                visit,
                "login",
                json!({ "title": "Login", "email": email, "errors": errors }),
            )
        }
    }
}

pub async fn handle_logout(mut visit: Visit) -> Response {
    visit.clear();
    visit.flash_tr("success", "Logged out successfully");
    visit.respond(Redirect::to("/index"))
}

/// Switch the session language and go back where the visitor came from
pub async fn change_language(mut visit: Visit, Form(form): Form<LanguageForm>) -> Response {
    match Language::parse(&form.language) {
        Some(language) => {
            visit.set_language(language);
            visit.flash_tr("success", "Language changed successfully");
        }
        None => visit.flash_tr("error", "Invalid language selection"),
    }
    let target = visit
        .referer
        .clone()
        .unwrap_or_else(|| "/index".to_string());
    visit.respond(Redirect::to(&target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (id, session) = store.create();
        assert!(session.user_email.is_none());
        assert_eq!(session.language, Language::English);

        store.update(&id, |s| {
            s.user_email = Some("amina@example.com".to_string());
            s.language = Language::Hausa;
        });
        let session = store.get(&id).unwrap();
        assert_eq!(session.user_email.as_deref(), Some("amina@example.com"));
        assert_eq!(session.language, Language::Hausa);

        store.clear(&id);
        let session = store.get(&id).unwrap();
        assert!(session.user_email.is_none());
        assert_eq!(session.language, Language::English);

        store.remove(&id);
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_flashes_are_taken_once() {
        let store = SessionStore::new(Duration::from_secs(60));
        let (id, _) = store.create();
        store.flash(&id, "success", "Saved".to_string());
        store.flash(&id, "error", "Oops".to_string());

        let flashes = store.take_flashes(&id);
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].category, "success");
        assert!(store.take_flashes(&id).is_empty());
    }

    #[test]
    fn test_expired_sessions() {
        let store = SessionStore::new(Duration::from_millis(10));
        let (id, _) = store.create();
        std::thread::sleep(Duration::from_millis(30));
        assert!(store.get(&id).is_none());
        assert_eq!(store.purge(), 1);
        assert!(store.is_empty());
    }
}
