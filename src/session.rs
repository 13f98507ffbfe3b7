//! Session configuration and the session object.
//!
//! Every operation takes an explicit [`Session`] instead of reaching for
//! ambient connection state, so the same code runs against the HTTP store
//! in production and an in-memory store in tests.

use crate::core::{FetchError, Result, DEFAULT_PAGE_SIZE};
use crate::store::{HttpStore, ListStore};
use std::sync::Arc;
use std::time::Duration;

/// Connection settings for a list store site.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the store site.
    pub site_url: String,

    /// Timeout applied to each remote round trip.
    pub request_timeout: Duration,

    /// Page size used when a request does not specify one.
    pub default_page_size: u32,
}

impl SessionConfig {
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.to_string(),
            request_timeout: Duration::from_secs(30),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the default page size
    pub fn default_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.site_url.is_empty() {
            return Err(FetchError::InvalidConfig(
                "site URL cannot be empty".to_string(),
            ));
        }
        if self.default_page_size == 0 {
            return Err(FetchError::InvalidConfig(
                "default_page_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// An authenticated handle to one store site: the configuration plus the
/// transport. Cheap to clone; the store is shared.
#[derive(Clone)]
pub struct Session {
    config: SessionConfig,
    store: Arc<dyn ListStore>,
}

impl Session {
    /// Open a session against the HTTP store described by `config`.
    pub fn connect(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let store = HttpStore::new(&config.site_url, config.request_timeout)?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    /// Open a session over any store implementation. This is the seam used
    /// to test against [`crate::store::MemoryStore`].
    pub fn with_store(config: SessionConfig, store: Arc<dyn ListStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ListStore {
        self.store.as_ref()
    }
}
