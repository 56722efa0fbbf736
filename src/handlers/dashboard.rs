use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse, Json, Response},
};
use askama::Template;
use serde_json::json;

use crate::{
    error::AppError,
    filters,
    middleware::{wants_json, CurrentUser},
    models::rbac::{CUSTOMER, SERVICE_PROVIDER},
    state::AppState,
};

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    user_name: String,
    email: String,
    roles: Vec<String>,
    is_admin: bool,
    is_customer: bool,
    is_service_provider: bool,
    can_manage_users: bool,
}

pub async fn dashboard(
    current_user: CurrentUser,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let can_manage_users = state
        .store
        .user_has_permission(current_user.id, "manage-users")
        .await?;

    if wants_json(&headers) {
        return Ok(Json(json!({
            "auth": { "user": current_user },
            "can_manage_users": can_manage_users,
        }))
        .into_response());
    }

    let template = DashboardTemplate {
        is_customer: current_user.has_role(CUSTOMER),
        is_service_provider: current_user.has_role(SERVICE_PROVIDER),
        is_admin: current_user.is_admin,
        roles: current_user.roles.iter().map(|role| role.slug.clone()).collect(),
        user_name: current_user.name,
        email: current_user.email,
        can_manage_users,
    };

    Ok(Html(template.render()?).into_response())
}
