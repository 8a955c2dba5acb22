pub mod cors;
pub mod error;
pub mod response;
pub mod router;
pub mod server;
pub mod state;

pub use self::error::ApiError;
pub use self::server::run_server;
pub use self::state::AppState;
