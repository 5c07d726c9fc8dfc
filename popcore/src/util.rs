use ed25519_dalek::Keypair;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn generate_keypair() -> Keypair {
    let mut csprng = rand::rngs::OsRng {};
    Keypair::generate(&mut csprng)
}

/// Seconds since the unix epoch
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
