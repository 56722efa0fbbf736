use bcrypt::{hash, verify, BcryptError, DEFAULT_COST};
use rand::{distributions::Alphanumeric, Rng};

pub fn hash_password(password: &str) -> Result<String, BcryptError> {
    hash(password, DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, BcryptError> {
    verify(password, hash)
}

/// Hash of a random secret nobody knows. Accounts created through the identity
/// provider get one so the password column is never empty.
pub fn placeholder_password_hash() -> Result<String, BcryptError> {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    hash_password(&secret)
}
