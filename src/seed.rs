//! Idempotent seeding of the built-in roles and permissions.

use crate::{
    models::{get_all_permissions, get_all_roles},
    store::{RoleStore, StoreResult},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub roles: usize,
    pub permissions: usize,
}

pub async fn seed_roles_and_permissions<S>(store: &S) -> StoreResult<SeedSummary>
where
    S: RoleStore + ?Sized,
{
    let mut permissions = Vec::new();
    for definition in get_all_permissions() {
        let permission = store
            .upsert_permission(definition.name, definition.slug)
            .await?;
        permissions.push(permission);
    }

    let roles = get_all_roles();
    for definition in &roles {
        let role = store.upsert_role(definition.name, definition.slug).await?;
        for slug in definition.permissions.iter() {
            if let Some(permission) = permissions.iter().find(|p| p.slug == *slug) {
                store.grant_permission(role.id, permission.id).await?;
            }
        }
        log::debug!("Seeded role {}", role.slug);
    }

    log::info!(
        "Seeded {} roles and {} permissions",
        roles.len(),
        permissions.len()
    );
    Ok(SeedSummary {
        roles: roles.len(),
        permissions: permissions.len(),
    })
}
