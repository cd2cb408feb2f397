//! Cookie-based session resolution.
//!
//! Anonymous browsers get a UUID token on first contact. The resolver
//! never mutates response state as a hidden effect: it returns the
//! session id together with a jar that carries the Set-Cookie
//! instruction when (and only when) a fresh session was created.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session_id";

const SESSION_TTL_DAYS: i64 = 30;

/// Returns the session id for the request, creating one when the jar
/// carries no session cookie. The returned jar must be included in
/// the response so a new token reaches the client.
pub fn resolve(jar: CookieJar, secure: bool) -> (String, CookieJar) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return (cookie.value().to_string(), jar);
    }

    let token = Uuid::new_v4().to_string();
    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .path("/")
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .build();
    (token, jar.add(cookie))
}
