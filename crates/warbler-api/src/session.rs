//! Request-scoped identity, resolved from the session cookie.

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use tracing::debug;
use uuid::Uuid;

use warbler_db::models::AccountRow;
use warbler_types::SESSION_TTL_DAYS;
use warbler_types::models::Account;

use crate::error::AppError;
use crate::state::{AppState, run_blocking};

pub const SESSION_COOKIE: &str = "warbler_session";

/// Whoever is making the request: an account, or nobody.
pub struct Viewer(pub Option<Account>);

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return Ok(Viewer(None));
        };

        // A stale token (expired, logged out elsewhere, account deleted) just means anonymous.
        let account = run_blocking(state, move |db| db.get_session_account(&token)).await?;
        Ok(Viewer(account.map(AccountRow::into_account)))
    }
}

/// A logged-in account. Rejects anonymous requests with `AppError::Unauthorized`.
pub struct AuthUser(pub Account);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Viewer(account) = Viewer::from_request_parts(parts, state).await?;
        account.map(AuthUser).ok_or(AppError::Unauthorized)
    }
}

/// A record id taken from the path. A malformed id names no record and is
/// rejected with `AppError::NotFound`.
pub struct Id(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for Id {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state).await.map_err(|rejection| {
            debug!("Unresolvable id in {}: {}", parts.uri.path(), rejection);
            AppError::NotFound
        })?;
        Ok(Id(id))
    }
}

/// Bind a fresh session to `account_id`, dropping whatever session the
/// cookie jar carried before.
pub async fn start(state: &AppState, jar: CookieJar, account_id: Uuid) -> Result<CookieJar, AppError> {
    let token = new_token();
    let previous = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let stored = token.clone();
    run_blocking(state, move |db| {
        if let Some(previous) = previous {
            db.delete_session(&previous)?;
        }
        db.create_session(&stored, &account_id.to_string())
    })
    .await?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_TTL_DAYS));
    Ok(jar.add(cookie))
}

/// Forget the session server-side and tell the browser to drop the cookie.
pub async fn end(state: &AppState, jar: CookieJar) -> Result<CookieJar, AppError> {
    if let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        run_blocking(state, move |db| db.delete_session(&token)).await?;
    }
    Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
}

fn new_token() -> String {
    B64.encode(rand::random::<[u8; 32]>())
}
