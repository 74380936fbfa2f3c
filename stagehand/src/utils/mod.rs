//! Timestamps, working-area tokens and run identifiers.

pub mod timestamps;
mod token;

pub use timestamps::{epoch_millis, millis_to_datetime};
pub use token::{generate_run_id, random_token, TOKEN_LEN};
