//! Cryptographic utilities for the broker

use rand::RngCore;

/// Default bcrypt cost factor
pub const BCRYPT_COST: u32 = 12;

/// Random bytes behind a subscriber's delivery secret
const SECRET_BYTES: usize = 32;

/// Hash a caller credential with bcrypt
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, BCRYPT_COST)
}

/// Generate a delivery secret for a new subscriber (hex-encoded)
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generate an opaque identifier for sessions, clients and users
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
