use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json, Redirect, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Deserialize;
use serde_json::json;
use tower_cookies::Cookies;

use crate::{
    error::{AppError, FieldErrors},
    handlers::auth::{email_problem, start_session},
    identity::{IdentityError, VerifiedIdentity},
    middleware::wants_json,
    models::{user::name_from_email, NewUser, RoleSummary, User, UserResponse},
    state::AppState,
    store::{RoleStore, StoreError, UserStore},
    utils::placeholder_password_hash,
};

#[derive(Debug, Default, Deserialize)]
pub struct FirebaseLoginRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub firebase_uid: Option<String>,
}

impl FirebaseLoginRequest {
    fn parse(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::validation("body", format!("The request body is not valid JSON: {}", e)))
    }

    fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();

        if let Some(email) = self.email.as_deref() {
            if let Some(message) = email_problem(email) {
                errors.add("email", message);
            }
        }
        if let Some(name) = self.name.as_deref() {
            if name.len() > 255 {
                errors.add("name", "The name may not be greater than 255 characters.");
            }
        }
        if let Some(uid) = self.firebase_uid.as_deref() {
            if uid.trim().is_empty() {
                errors.add("firebase_uid", "The firebase uid must not be empty.");
            }
        }

        errors.into_result()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn identity_failure(err: IdentityError) -> AppError {
    match err {
        IdentityError::Malformed(_) | IdentityError::Rejected(_) => {
            log::warn!("Identity token verification failed: {}", err);
            AppError::Unauthorized("Invalid authentication token".to_string())
        }
        IdentityError::NotConfigured | IdentityError::KeyFetch(_) => {
            AppError::Internal(format!("identity verification unavailable: {}", err))
        }
    }
}

/// Maps a verified external identity onto a local account.
///
/// Only the token's email is trusted. A request email is accepted when it
/// names the same address and refused otherwise. Lookup is by subject id
/// first, then by email. A new account gets a placeholder password and the
/// default role. An email match that has no subject id yet gets it attached,
/// but only when the provider has verified the email. An email match already
/// bound to another subject is refused.
pub async fn reconcile_identity<S>(
    store: &S,
    identity: &VerifiedIdentity,
    email_override: Option<String>,
    name_override: Option<String>,
    default_role: &str,
) -> Result<User, AppError>
where
    S: UserStore + RoleStore + ?Sized,
{
    let email = match (non_empty(email_override), identity.email.clone()) {
        (Some(claimed), Some(verified)) if claimed.eq_ignore_ascii_case(&verified) => verified,
        (Some(_), _) => {
            log::warn!(
                "External login for {} sent an email that does not match its token",
                identity.subject
            );
            return Err(AppError::Unauthorized("Invalid authentication token".to_string()));
        }
        (None, Some(verified)) => verified,
        (None, None) => {
            log::warn!("External login for {} has no email", identity.subject);
            return Err(AppError::validation("email", "Email is required for authentication"));
        }
    };
    let name = non_empty(name_override)
        .or_else(|| identity.name.clone())
        .unwrap_or_else(|| name_from_email(&email));

    let existing = match store.find_user_by_firebase_uid(&identity.subject).await? {
        Some(user) => Some(user),
        None => store.find_user_by_email(&email).await?,
    };

    match existing {
        Some(user) if user.firebase_uid.as_deref() == Some(identity.subject.as_str()) => Ok(user),
        Some(user) if user.firebase_uid.is_none() => {
            if !identity.email_verified {
                log::warn!(
                    "Refusing to link user {} to an identity with an unverified email",
                    user.id
                );
                return Err(AppError::Unauthorized(
                    "The email on this sign-in account is not verified".to_string(),
                ));
            }
            let user = store
                .attach_firebase_uid(user.id, &identity.subject, &name)
                .await?;
            log::info!("Linked external identity to existing user {}", user.id);
            Ok(user)
        }
        Some(user) => {
            log::warn!(
                "User {} is already linked to a different external identity",
                user.id
            );
            Err(AppError::Unauthorized(
                "This email is linked to a different sign-in account".to_string(),
            ))
        }
        None => {
            let password_hash = placeholder_password_hash()
                .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))?;

            let user = store
                .create_user(&NewUser {
                    name,
                    email,
                    password_hash,
                    firebase_uid: Some(identity.subject.clone()),
                })
                .await
                .map_err(|e| match e {
                    StoreError::UniqueViolation(_) => {
                        AppError::Conflict("An account for this email is being created".to_string())
                    }
                    other => other.into(),
                })?;
            log::info!("New user {} created from external identity", user.id);

            match store.find_role_by_slug(default_role).await? {
                Some(role) => {
                    store.attach_role(user.id, role.id).await?;
                    log::info!("Assigned {} role to new user {}", role.slug, user.id);
                }
                None => log::warn!("Default role {} not found when creating user {}", default_role, user.id),
            }

            Ok(user)
        }
    }
}

pub async fn firebase_login(
    State(state): State<AppState>,
    cookies: Cookies,
    headers: HeaderMap,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = FirebaseLoginRequest::parse(&body)?;
    request.validate()?;

    let token = bearer
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
        .or_else(|| request.token.clone())
        .and_then(|token| non_empty(Some(token)))
        .ok_or_else(|| AppError::validation("token", "The token field is required."))?;

    let identity = state.identity.verify(&token).await.map_err(identity_failure)?;

    if let Some(uid) = non_empty(request.firebase_uid.clone()) {
        if uid != identity.subject {
            log::warn!("Supplied firebase_uid does not match the verified token subject");
            return Err(AppError::Unauthorized("Invalid authentication token".to_string()));
        }
    }

    let user = reconcile_identity(
        &*state.store,
        &identity,
        request.email,
        request.name,
        &state.config.default_role,
    )
    .await?;

    start_session(&state, &cookies, user.id).await?;
    log::info!("User {} logged in through the identity provider", user.id);

    if !wants_json(&headers) {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let roles = state
        .store
        .roles_for_user(user.id)
        .await?
        .into_iter()
        .map(RoleSummary::from)
        .collect();

    Ok(Json(json!({
        "user": UserResponse::new(user, roles),
        "message": "Successfully authenticated",
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn identity(subject: &str, email: &str, email_verified: bool) -> VerifiedIdentity {
        VerifiedIdentity {
            subject: subject.to_string(),
            email: Some(email.to_string()),
            email_verified,
            name: None,
        }
    }

    async fn store_with_password_user(email: &str) -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .create_user(&NewUser {
                name: "Victim".to_string(),
                email: email.to_string(),
                password_hash: "x".to_string(),
                firebase_uid: None,
            })
            .await
            .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn request_email_cannot_replace_token_email() {
        let (store, victim) = store_with_password_user("victim@example.com").await;

        let err = reconcile_identity(
            &store,
            &identity("attacker-uid", "attacker@evil.test", true),
            Some("victim@example.com".to_string()),
            None,
            "customer",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Unauthorized(_)));
        let victim = store.find_user(victim.id).await.unwrap().unwrap();
        assert!(victim.firebase_uid.is_none());
    }

    #[tokio::test]
    async fn request_email_matching_token_is_accepted() {
        let (store, existing) = store_with_password_user("ada@example.com").await;

        let user = reconcile_identity(
            &store,
            &identity("uid-ada", "ada@example.com", true),
            Some("ADA@example.com".to_string()),
            None,
            "customer",
        )
        .await
        .unwrap();

        assert_eq!(user.id, existing.id);
        assert_eq!(user.firebase_uid.as_deref(), Some("uid-ada"));
    }

    #[tokio::test]
    async fn unverified_email_is_not_linked_to_existing_account() {
        let (store, existing) = store_with_password_user("ada@example.com").await;

        let err = reconcile_identity(
            &store,
            &identity("uid-ada", "ada@example.com", false),
            None,
            None,
            "customer",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Unauthorized(_)));
        let existing = store.find_user(existing.id).await.unwrap().unwrap();
        assert!(existing.firebase_uid.is_none());
    }

    #[test]
    fn empty_body_parses_to_defaults() {
        let request = FirebaseLoginRequest::parse(b"  ").unwrap();
        assert!(request.token.is_none());
        assert!(request.email.is_none());
    }

    #[test]
    fn broken_json_is_a_validation_error() {
        let err = FirebaseLoginRequest::parse(b"{not json").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn bad_email_override_is_rejected() {
        let request = FirebaseLoginRequest {
            email: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(matches!(request.validate(), Err(AppError::Validation(_))));
    }
}
