//! Logging setup.

mod logging;

pub use logging::{env_filter, init_logging, subscriber, DEFAULT_FILTER};
