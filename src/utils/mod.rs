pub mod auth;
pub mod password;

pub use auth::{create_token, verify_token, Claims};
pub use password::{hash_password, placeholder_password_hash, verify_password};
