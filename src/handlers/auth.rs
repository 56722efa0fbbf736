use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use askama::Template;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};

use crate::{
    error::{AppError, FieldErrors},
    filters,
    middleware::{get_current_user, AUTH_COOKIE},
    models::{NewUser, Session, User},
    state::AppState,
    store::StoreError,
    utils::{create_token, hash_password, verify_password},
};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_FIELD_LENGTH: usize = 255;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    error: String,
    email: String,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    error: String,
    name: String,
    email: String,
    code: String,
    invited_role: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    name: String,
    email: String,
    password: String,
    password_confirmation: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterQuery {
    code: Option<String>,
}

/// Creates a session row and hands the browser a signed cookie pointing at it.
pub async fn start_session(
    state: &AppState,
    cookies: &Cookies,
    user_id: i64,
) -> Result<Session, AppError> {
    let ttl_hours = state.config.session_ttl_hours;
    let expires_at = Utc::now() + Duration::hours(ttl_hours);
    let session = state.store.create_session(user_id, expires_at).await?;

    let token = create_token(&session, &state.config.jwt_secret)
        .map_err(|e| AppError::Internal(format!("failed to sign session token: {}", e)))?;

    // Set secure HTTP-only cookie with the session token
    let cookie = Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(ttl_hours))
        .build();
    cookies.add(cookie);

    log::info!("Session {} started for user {}", session.id, user_id);
    Ok(session)
}

pub fn clear_session_cookie(cookies: &Cookies) {
    cookies.remove(Cookie::build((AUTH_COOKIE, "")).path("/").build());
}

pub async fn login_page() -> LoginTemplate {
    LoginTemplate {
        error: String::new(),
        email: String::new(),
    }
}

pub async fn register_page(
    State(state): State<AppState>,
    Query(query): Query<RegisterQuery>,
) -> Result<Html<String>, AppError> {
    let code = query.code.unwrap_or_default();
    let mut template = RegisterTemplate {
        error: String::new(),
        name: String::new(),
        email: String::new(),
        code: code.clone(),
        invited_role: String::new(),
    };

    if !code.is_empty() {
        match state.store.find_invitation_by_code(&code).await? {
            Some(invitation) if invitation.is_valid(Utc::now()) => {
                template.invited_role = invitation.role_slug;
            }
            _ => template.error = "This invitation code is invalid or has expired.".to_string(),
        }
    }

    Ok(Html(template.render()?))
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match authenticate_user(&state, &form.email, &form.password).await? {
        Some(user) => {
            start_session(&state, &cookies, user.id).await?;
            Ok(Redirect::to("/dashboard").into_response())
        }
        None => {
            log::info!("Failed login attempt for {}", form.email);
            let template = LoginTemplate {
                error: "Invalid email or password".to_string(),
                email: form.email,
            };
            Ok((StatusCode::UNAUTHORIZED, Html(template.render()?)).into_response())
        }
    }
}

pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Result<Redirect, AppError> {
    if let Some(user) = get_current_user(&cookies, &state).await? {
        state.store.delete_session(user.session_id).await?;
        log::info!("Session {} ended for user {}", user.session_id, user.id);
    }
    clear_session_cookie(&cookies);
    Ok(Redirect::to("/login"))
}

pub async fn register(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let code = form.code.clone().unwrap_or_default().trim().to_string();

    match create_account(&state, &form, &code).await {
        Ok(user) => {
            start_session(&state, &cookies, user.id).await?;
            Ok(Redirect::to("/dashboard").into_response())
        }
        Err(AppError::Validation(errors)) => {
            let template = RegisterTemplate {
                error: errors.first_message().unwrap_or("Registration failed").to_string(),
                name: form.name,
                email: form.email,
                code,
                invited_role: String::new(),
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(template.render()?)).into_response())
        }
        Err(e) => Err(e),
    }
}

pub fn validate_registration(form: &RegisterForm) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let name = form.name.trim();
    if name.is_empty() {
        errors.add("name", "The name field is required.");
    } else if name.len() > MAX_FIELD_LENGTH {
        errors.add("name", "The name may not be greater than 255 characters.");
    }

    if let Some(message) = email_problem(&form.email) {
        errors.add("email", message);
    }

    if form.password.len() < MIN_PASSWORD_LENGTH {
        errors.add("password", "The password must be at least 8 characters.");
    } else if form.password != form.password_confirmation {
        errors.add("password", "The password confirmation does not match.");
    }

    errors
}

pub fn email_problem(email: &str) -> Option<&'static str> {
    let email = email.trim();
    if email.is_empty() {
        return Some("The email field is required.");
    }
    if email.len() > MAX_FIELD_LENGTH {
        return Some("The email may not be greater than 255 characters.");
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => None,
        _ => Some("The email must be a valid email address."),
    }
}

async fn create_account(state: &AppState, form: &RegisterForm, code: &str) -> Result<User, AppError> {
    validate_registration(form).into_result()?;

    let email = form.email.trim().to_string();
    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::validation("email", "The email has already been taken."));
    }

    let password_hash = hash_password(&form.password)
        .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))?;

    let new_user = NewUser {
        name: form.name.trim().to_string(),
        email,
        password_hash,
        firebase_uid: None,
    };

    let result = if code.is_empty() {
        register_open(state, &new_user).await
    } else {
        register_invited(state, &new_user, code).await
    };

    match result {
        Err(AppError::Conflict(_)) => Err(AppError::validation("email", "The email has already been taken.")),
        other => other,
    }
}

async fn register_open(state: &AppState, new_user: &NewUser) -> Result<User, AppError> {
    let user = state.store.create_user(new_user).await?;

    match state.store.find_role_by_slug(&state.config.default_role).await? {
        Some(role) => {
            state.store.attach_role(user.id, role.id).await?;
        }
        None => log::warn!(
            "Default role {} not found when registering {}",
            state.config.default_role,
            user.email
        ),
    }

    log::info!("Registered user {}", user.id);
    Ok(user)
}

async fn register_invited(state: &AppState, new_user: &NewUser, code: &str) -> Result<User, AppError> {
    let invalid = || AppError::validation("code", "This invitation code is invalid or has expired.");

    let invitation = state
        .store
        .find_invitation_by_code(code)
        .await?
        .filter(|invitation| invitation.is_valid(Utc::now()))
        .ok_or_else(invalid)?;

    let role = state
        .store
        .find_role_by_slug(&invitation.role_slug)
        .await?
        .ok_or_else(|| AppError::Internal(format!("invitation role {} is missing", invitation.role_slug)))?;

    let user = match state.store.register_invited_user(new_user, invitation.id, role.id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(invalid()),
        Err(StoreError::UniqueViolation(_)) => {
            return Err(AppError::validation("email", "The email has already been taken."))
        }
        Err(e) => return Err(e.into()),
    };

    log::info!(
        "Registered user {} as {} with invitation {}",
        user.id,
        filters::role_label(&role.slug).unwrap_or_default(),
        invitation.id
    );
    Ok(user)
}

async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let Some(user) = state.store.find_user_by_email(email.trim()).await? else {
        return Ok(None);
    };

    if verify_password(password, &user.password).unwrap_or(false) {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}
