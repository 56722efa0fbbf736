pub mod permission;

pub use permission::{get_current_user, wants_json, AdminUser, CurrentUser, AUTH_COOKIE};
