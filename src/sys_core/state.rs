use crate::sys_config::Config;
use crate::sys_fileapi::{ContentTypeResolver, FileStorage, MimeGuessResolver};
use crate::sys_metadata::MetadataStore;
use crate::sys_ratelimit::RateLimiter;

/// Everything a request handler needs, shared behind an `Arc`.
pub struct AppState {
    pub config: Config,
    pub storage: FileStorage,
    pub metadata: MetadataStore,
    pub limiter: RateLimiter,
    pub content_types: Box<dyn ContentTypeResolver>,
}

impl AppState {
    /// Create the upload directory if needed and load the metadata sidecar.
    pub async fn open(config: Config) -> std::io::Result<Self> {
        let storage = FileStorage::new(&config.upload_dir);
        storage.ensure_root().await?;
        let metadata = MetadataStore::load(&config.metadata_file).await;
        let limiter = RateLimiter::new(config.rate_limits.clone());
        Ok(Self {
            config,
            storage,
            metadata,
            limiter,
            content_types: Box::new(MimeGuessResolver),
        })
    }

    pub fn with_content_types<R: ContentTypeResolver + 'static>(mut self, resolver: R) -> Self {
        self.content_types = Box::new(resolver);
        self
    }
}
