pub mod core;

pub use self::core::{MetadataError, MetadataStore};
