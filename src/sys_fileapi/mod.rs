pub mod content_type;
pub mod core;
pub mod handlers;

pub use self::content_type::{ContentTypeResolver, MimeGuessResolver};
pub use self::core::FileStorage;
