use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::warn;

use crate::auth::jwt::SessionKeys;
use crate::auth::repo::{SessionUser, User};
use crate::error::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "_token";
pub const LOGIN_PATH: &str = "/auth/login";

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}

/// Why a request could not be given an identity.
///
/// A missing cookie on a guarded route redirects to the login page. A cookie
/// that fails verification (bad signature, expired, unknown user) is cleared
/// before redirecting, so a stale session never proceeds as anonymous.
pub enum AuthRejection {
    MissingSession,
    InvalidSession,
    Backend(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingSession => Redirect::to(LOGIN_PATH).into_response(),
            Self::InvalidSession => {
                let jar = CookieJar::new().add(removal_cookie());
                (jar, Redirect::to(LOGIN_PATH)).into_response()
            }
            Self::Backend(err) => err.into_response(),
        }
    }
}

async fn resolve_session(
    parts: &Parts,
    state: &AppState,
) -> Result<Option<SessionUser>, AuthRejection> {
    let jar = CookieJar::from_headers(&parts.headers);
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };

    let keys = SessionKeys::from_ref(state);
    let claims = keys.verify(cookie.value()).map_err(|e| {
        warn!(error = %e, "session token rejected");
        AuthRejection::InvalidSession
    })?;

    match User::find_session_user(&state.db, claims.sub).await {
        Ok(Some(user)) => Ok(Some(user)),
        Ok(None) => {
            warn!(user_id = %claims.sub, "session token for unknown user");
            Err(AuthRejection::InvalidSession)
        }
        Err(e) => Err(AuthRejection::Backend(AppError::Internal(e))),
    }
}

/// Route guard: handlers that take this never run without an identity.
pub struct CurrentUser(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve_session(parts, state).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(AuthRejection::MissingSession),
        }
    }
}

/// Session middleware for public pages: anonymous is fine, but a cookie that
/// fails verification still fails closed by redirect.
pub struct OptionalUser(pub Option<SessionUser>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(resolve_session(parts, state).await?))
    }
}
