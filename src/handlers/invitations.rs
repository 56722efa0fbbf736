use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use askama::Template;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDateTime, Utc};
use qrcode::{render::svg, QrCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::{
    error::{AppError, FieldErrors},
    filters,
    middleware::{wants_json, AdminUser},
    models::{
        invitation::{
            generate_code_candidate, INVITATIONS_PER_PAGE, MAX_CODE_ATTEMPTS,
        },
        rbac::INVITABLE_ROLES,
        Invitation, InvitationWithCreator, NewInvitation, Paginated,
    },
    state::AppState,
    store::{InvitationStore, StoreError},
};

const QR_CODE_SIZE: u32 = 300;

#[derive(Debug, Serialize)]
struct InvitationRow {
    id: i64,
    code: String,
    role_slug: String,
    status: String,
    created_by: String,
    created_at: String,
}

impl From<InvitationWithCreator> for InvitationRow {
    fn from(row: InvitationWithCreator) -> Self {
        let now = Utc::now();
        let status = if row.invitation.is_used {
            "Used"
        } else if row.invitation.is_valid(now) {
            "Available"
        } else {
            "Expired"
        };

        Self {
            id: row.invitation.id,
            code: row.invitation.code,
            role_slug: row.invitation.role_slug,
            status: status.to_string(),
            created_by: row.creator.map(|c| c.name).unwrap_or_default(),
            created_at: row.invitation.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "invitations/index.html")]
struct InvitationsTemplate {
    invitations: Vec<InvitationRow>,
    current_page: i64,
    last_page: i64,
    total: i64,
    invitable_roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvitationQuery {
    page: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateInvitationRequest {
    #[serde(default)]
    pub role_slug: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// A validated creation request, ready to be given a code.
#[derive(Debug, Clone, PartialEq)]
pub struct InvitationDraft {
    pub role_slug: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub redirect_url: Option<String>,
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // `<input type="datetime-local">` sends no offset; treat it as UTC
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

impl CreateInvitationRequest {
    pub fn validate(self, now: DateTime<Utc>) -> Result<InvitationDraft, AppError> {
        let mut errors = FieldErrors::new();

        let role_slug = self.role_slug.unwrap_or_default().trim().to_string();
        if role_slug.is_empty() {
            errors.add("role_slug", "The role slug field is required.");
        } else if !INVITABLE_ROLES.contains(&role_slug.as_str()) {
            errors.add("role_slug", "The selected role slug is invalid.");
        }

        let mut expires_at = None;
        if let Some(raw) = self.expires_at.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            match parse_expiry(raw) {
                Some(parsed) if parsed > now => expires_at = Some(parsed),
                Some(_) => errors.add("expires_at", "The expires at must be a date after now."),
                None => errors.add("expires_at", "The expires at is not a valid date."),
            }
        }

        let mut redirect_url = None;
        if let Some(raw) = self.redirect_url.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            match Url::parse(raw) {
                Ok(url) if matches!(url.scheme(), "http" | "https") && raw.len() <= 255 => {
                    redirect_url = Some(raw.to_string())
                }
                _ => errors.add("redirect_url", "The redirect url must be a valid URL."),
            }
        }

        errors.into_result()?;
        Ok(InvitationDraft {
            role_slug,
            expires_at,
            redirect_url,
        })
    }
}

/// Allocates a unique code and stores the invitation.
///
/// A candidate is discarded when it already exists or when the insert hits
/// the unique index (another request won the race). Gives up after
/// `MAX_CODE_ATTEMPTS` candidates.
pub async fn issue_invitation_with<S, G>(
    store: &S,
    created_by: i64,
    draft: &InvitationDraft,
    mut next_code: G,
) -> Result<Invitation, AppError>
where
    S: InvitationStore + ?Sized,
    G: FnMut() -> String + Send,
{
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = next_code();
        if store.invitation_code_exists(&code).await? {
            log::warn!("Invitation code collision on attempt {}", attempt);
            continue;
        }

        let new_invitation = NewInvitation {
            created_by,
            code,
            role_slug: draft.role_slug.clone(),
            redirect_url: draft.redirect_url.clone(),
            expires_at: draft.expires_at,
        };

        match store.insert_invitation(&new_invitation).await {
            Ok(invitation) => return Ok(invitation),
            Err(StoreError::UniqueViolation(_)) => {
                log::warn!("Invitation code taken concurrently on attempt {}", attempt);
            }
            Err(e) => return Err(e.into()),
        }
    }

    log::error!("Gave up allocating an invitation code after {} attempts", MAX_CODE_ATTEMPTS);
    Err(AppError::Conflict("Could not allocate a unique invitation code, please retry".to_string()))
}

pub async fn issue_invitation<S>(
    store: &S,
    created_by: i64,
    draft: &InvitationDraft,
) -> Result<Invitation, AppError>
where
    S: InvitationStore + ?Sized,
{
    issue_invitation_with(store, created_by, draft, || generate_code_candidate(Utc::now())).await
}

/// SVG QR code of `data`, base64 encoded for embedding in JSON.
pub fn qr_code_svg_base64(data: &str) -> Result<String, AppError> {
    let code = QrCode::new(data.as_bytes())
        .map_err(|e| AppError::Internal(format!("failed to encode QR code: {}", e)))?;
    let svg = code
        .render::<svg::Color>()
        .min_dimensions(QR_CODE_SIZE, QR_CODE_SIZE)
        .build();
    Ok(STANDARD.encode(svg))
}

pub async fn index(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<InvitationQuery>,
) -> Result<Response, AppError> {
    // keeps (page - 1) * per_page inside i64
    let page = query.page.unwrap_or(1).clamp(1, i64::MAX / INVITATIONS_PER_PAGE);
    let (data, total) = state
        .store
        .list_invitations(page, INVITATIONS_PER_PAGE)
        .await?;
    let invitations = Paginated::new(data, page, INVITATIONS_PER_PAGE, total);

    if wants_json(&headers) {
        return Ok(Json(json!({ "invitations": invitations })).into_response());
    }

    let template = InvitationsTemplate {
        current_page: invitations.current_page,
        last_page: invitations.last_page,
        total: invitations.total,
        invitations: invitations.data.into_iter().map(InvitationRow::from).collect(),
        invitable_roles: INVITABLE_ROLES.iter().map(|slug| slug.to_string()).collect(),
    };
    Ok(Html(template.render()?).into_response())
}

pub async fn store(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateInvitationRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::validation("body", rejection.body_text()))?;
    let draft = request.validate(Utc::now())?;

    let invitation = issue_invitation(&*state.store, admin.id, &draft).await?;
    let invite_url = invitation.invite_url(&state.config.app_url);
    let qr_code = qr_code_svg_base64(&invite_url)?;

    log::info!(
        "Admin {} created {} invitation {}",
        admin.id,
        filters::role_label(&invitation.role_slug).unwrap_or_default(),
        invitation.id
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "invitation": invitation,
            "qr_code": qr_code,
            "invite_url": invite_url,
        })),
    )
        .into_response())
}

pub async fn destroy(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(invitation_id): Path<i64>,
) -> Result<Response, AppError> {
    let invitation = state
        .store
        .find_invitation(invitation_id)
        .await?
        .ok_or(AppError::NotFound("Invitation"))?;

    // a concurrent delete between the lookup and here is still a 404
    if !state.store.delete_invitation(invitation.id).await? {
        return Err(AppError::NotFound("Invitation"));
    }

    log::info!(
        "Admin {} deleted {} invitation {} ({})",
        admin.id,
        if invitation.is_used { "used" } else { "unused" },
        invitation.id,
        invitation.code
    );

    if wants_json(&headers) {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(Redirect::to("/invitations").into_response())
    }
}

/// Lets the registration page tell whether a code is still usable.
pub async fn check(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let invitation = state
        .store
        .find_invitation_by_code(&code)
        .await?
        .ok_or(AppError::NotFound("Invitation"))?;

    Ok(Json(json!({
        "code": invitation.code,
        "valid": invitation.is_valid(Utc::now()),
        "role_slug": invitation.role_slug,
    })))
}
