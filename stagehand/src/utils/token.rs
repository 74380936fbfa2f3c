//! Random tokens and run identifiers.

use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

/// Length of a working-area token.
pub const TOKEN_LEN: usize = 12;

/// Generates a lowercase alphanumeric token of [`TOKEN_LEN`] characters.
#[must_use]
pub fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Generates an identifier for one pipeline run, used to correlate logs.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}
