use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use tower_cookies::Cookies;

use crate::{
    error::{AppError, FieldErrors},
    handlers::auth::{clear_session_cookie, email_problem},
    middleware::{wants_json, CurrentUser},
    models::{RoleSummary, UserResponse},
    state::AppState,
    store::StoreError,
    utils::verify_password,
};

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteProfileRequest {
    #[serde(default)]
    password: String,
}

fn body_error(rejection: JsonRejection) -> AppError {
    AppError::validation("body", rejection.body_text())
}

async fn user_response(state: &AppState, current_user: &CurrentUser) -> Result<UserResponse, AppError> {
    let user = state
        .store
        .find_user(current_user.id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    let roles = state
        .store
        .roles_for_user(user.id)
        .await?
        .into_iter()
        .map(RoleSummary::from)
        .collect();
    Ok(UserResponse::new(user, roles))
}

pub async fn show(
    current_user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = user_response(&state, &current_user).await?;
    Ok(Json(json!({ "user": user })))
}

pub async fn update(
    current_user: CurrentUser,
    State(state): State<AppState>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(request) = payload.map_err(body_error)?;

    let name = request.name.trim();
    let email = request.email.trim();

    let mut errors = FieldErrors::new();
    if name.is_empty() {
        errors.add("name", "The name field is required.");
    } else if name.len() > 255 {
        errors.add("name", "The name may not be greater than 255 characters.");
    }
    if let Some(message) = email_problem(email) {
        errors.add("email", message);
    }
    errors.into_result()?;

    match state.store.update_user_profile(current_user.id, name, email).await {
        Ok(_) => {}
        Err(StoreError::UniqueViolation(_)) => {
            return Err(AppError::validation("email", "The email has already been taken."))
        }
        Err(e) => return Err(e.into()),
    }
    log::info!("User {} updated their profile", current_user.id);

    let user = user_response(&state, &current_user).await?;
    Ok(Json(json!({ "user": user, "message": "Profile updated" })))
}

pub async fn destroy(
    current_user: CurrentUser,
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    payload: Result<Json<DeleteProfileRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(body_error)?;

    let user = state
        .store
        .find_user(current_user.id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    if !verify_password(&request.password, &user.password).unwrap_or(false) {
        return Err(AppError::validation("password", "The password is incorrect."));
    }

    state.store.delete_session(current_user.session_id).await?;
    state.store.delete_user(user.id).await?;
    clear_session_cookie(&cookies);
    log::info!("User {} deleted their account", user.id);

    if wants_json(&headers) {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(Redirect::to("/").into_response())
    }
}
