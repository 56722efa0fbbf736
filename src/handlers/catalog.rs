use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Json, Response},
};
use askama::Template;
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    filters,
    middleware::{wants_json, CurrentUser},
    models::{catalog::parse_highlight, Category},
    state::AppState,
};

// Template-friendly subcategory with its highlight flag resolved
#[derive(Debug)]
struct SubCategoryView {
    subcategory_id: i64,
    name: String,
    image_url: String,
    highlighted: bool,
}

#[derive(Template)]
#[template(path = "welcome.html")]
struct WelcomeTemplate {
    user_name: String,
    is_authenticated: bool,
    is_admin: bool,
    roles: Vec<String>,
    categories: Vec<Category>,
}

#[derive(Template)]
#[template(path = "category.html")]
struct CategoryTemplate {
    name: String,
    image_url: String,
    subcategories: Vec<SubCategoryView>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    highlight: Option<String>,
}

pub async fn welcome(
    current_user: Option<CurrentUser>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let categories = state.catalog.categories().to_vec();

    if wants_json(&headers) {
        return Ok(Json(json!({
            "auth": { "user": current_user },
            "categories": categories,
        }))
        .into_response());
    }

    let template = match current_user {
        Some(user) => WelcomeTemplate {
            user_name: user.name,
            is_authenticated: true,
            is_admin: user.is_admin,
            roles: user.roles.into_iter().map(|role| role.slug).collect(),
            categories,
        },
        None => WelcomeTemplate {
            user_name: String::new(),
            is_authenticated: false,
            is_admin: false,
            roles: Vec::new(),
            categories,
        },
    };

    Ok(Html(template.render()?).into_response())
}

pub async fn category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(category_id): Path<i64>,
    Query(query): Query<CategoryQuery>,
) -> Result<Response, AppError> {
    let category = state
        .catalog
        .find(category_id)
        .ok_or(AppError::NotFound("Category"))?;
    let highlighted = parse_highlight(query.highlight.as_deref());

    if wants_json(&headers) {
        return Ok(Json(json!({
            "category": category,
            "highlighted": highlighted,
        }))
        .into_response());
    }

    let template = CategoryTemplate {
        name: category.name.clone(),
        image_url: category.image_url.clone(),
        subcategories: category
            .subcategories
            .iter()
            .map(|sub| SubCategoryView {
                subcategory_id: sub.subcategory_id,
                name: sub.name.clone(),
                image_url: sub.image_url.clone(),
                highlighted: highlighted.contains(&sub.subcategory_id),
            })
            .collect(),
    };

    Ok(Html(template.render()?).into_response())
}
