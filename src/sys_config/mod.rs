pub mod core;

pub use self::core::{Config, ConfigError, RateLimitConfig};
