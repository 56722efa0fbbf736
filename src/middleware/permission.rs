use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{rbac::ADMIN, RoleSummary, User},
    state::AppState,
    utils::verify_token,
};

pub const AUTH_COOKIE: &str = "auth_token";
const ADMIN_REQUIRED: &str = "Unauthorized. Admin access required.";

/// The authenticated user for this request, resolved from the session cookie.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub firebase_uid: Option<String>,
    pub roles: Vec<RoleSummary>,
    #[serde(skip)]
    pub session_id: Uuid,
    // Helper properties for templates
    pub is_admin: bool,
}

impl CurrentUser {
    pub fn from_user_and_roles(user: User, roles: Vec<RoleSummary>, session_id: Uuid) -> Self {
        let is_admin = roles.iter().any(|role| role.slug == ADMIN);

        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            firebase_uid: user.firebase_uid,
            roles,
            session_id,
            is_admin,
        }
    }

    pub fn has_role(&self, slug: &str) -> bool {
        self.roles.iter().any(|role| role.slug == slug)
    }
}

/// Same request-format rule the front-end relies on: JSON for XHR or an explicit Accept.
pub fn wants_json(headers: &HeaderMap) -> bool {
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("application/json"))
        .unwrap_or(false);

    let is_xhr = headers
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false);

    accepts_json || is_xhr
}

pub async fn get_current_user(
    cookies: &Cookies,
    state: &AppState,
) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = cookies.get(AUTH_COOKIE).map(|cookie| cookie.value().to_string()) else {
        return Ok(None);
    };

    let claims = match verify_token(&token, &state.config.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            log::debug!("Ignoring invalid session token: {}", e);
            return Ok(None);
        }
    };

    let Some(session) = state.store.find_session(claims.sid).await? else {
        return Ok(None);
    };
    if !session.is_active(Utc::now()) || claims.user_id() != Some(session.user_id) {
        return Ok(None);
    }

    let Some(user) = state.store.find_user(session.user_id).await? else {
        return Ok(None);
    };

    let roles = state
        .store
        .roles_for_user(user.id)
        .await?
        .into_iter()
        .map(RoleSummary::from)
        .collect();

    Ok(Some(CurrentUser::from_user_and_roles(user, roles, session.id)))
}

fn unauthenticated(headers: &HeaderMap) -> Response {
    if wants_json(headers) {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthenticated." }))).into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

fn admin_required(headers: &HeaderMap, authenticated: bool) -> Response {
    if wants_json(headers) {
        return AppError::Forbidden(ADMIN_REQUIRED.to_string()).into_response();
    }

    if authenticated {
        (StatusCode::FORBIDDEN, Html(format!("<h1>403</h1><p>{}</p>", ADMIN_REQUIRED))).into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

async fn resolve(parts: &mut Parts, state: &AppState) -> Result<Option<CurrentUser>, Response> {
    let cookies = Cookies::from_request_parts(parts, state)
        .await
        .map_err(IntoResponse::into_response)?;

    get_current_user(&cookies, state)
        .await
        .map_err(IntoResponse::into_response)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await? {
            Some(user) => Ok(user),
            None => Err(unauthenticated(&parts.headers)),
        }
    }
}

/// A `CurrentUser` holding the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await? {
            Some(user) if user.is_admin => Ok(AdminUser(user)),
            Some(user) => {
                log::warn!("User {} denied access to {}", user.id, parts.uri.path());
                Err(admin_required(&parts.headers, true))
            }
            None => Err(admin_required(&parts.headers, false)),
        }
    }
}
