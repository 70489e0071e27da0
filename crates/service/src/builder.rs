//! Service construction

use crate::PackageService;
use pkgreg_catalog::{create_pool, run_migrations, Catalog, MemoryCatalog, SqliteCatalog};
use pkgreg_config::{CatalogBackend, Config, UrlConfig};
use pkgreg_errors::{ConfigError, Error};
use pkgreg_events::EventSender;
use pkgreg_store::{BlobStore, FsBlobStore, SignedUrlIssuer, UrlIssuer};
use pkgreg_upload::{RetryPolicy, UploadContext, UploadLimits};
use std::sync::Arc;
use std::time::Duration;

/// Build the URL signer described by `config`
///
/// Without a configured key a random one is generated, so issued URLs only
/// verify within this process.
///
/// # Errors
///
/// Returns a config error if the signing key is not 64 hex characters or
/// the base URL cannot be parsed.
pub fn url_issuer_from_config(config: &UrlConfig) -> Result<SignedUrlIssuer, Error> {
    match config.signing_key_bytes()? {
        Some(key) => SignedUrlIssuer::new(&config.base_url, key),
        None => {
            tracing::debug!("no url signing key configured, generating one");
            SignedUrlIssuer::with_random_key(&config.base_url)
        }
    }
}

/// Builder for [`PackageService`]
///
/// A catalog and a blob store are required; everything else falls back to
/// the configuration (or its defaults).
#[derive(Default)]
pub struct ServiceBuilder {
    catalog: Option<Arc<dyn Catalog>>,
    store: Option<Arc<dyn BlobStore>>,
    urls: Option<Arc<dyn UrlIssuer>>,
    retry: Option<RetryPolicy>,
    tx: Option<EventSender>,
    config: Option<Config>,
}

impl ServiceBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_url_issuer(mut self, urls: Arc<dyn UrlIssuer>) -> Self {
        self.urls = Some(urls);
        self
    }

    /// Override the retry policy derived from the configuration
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Open the blob store and catalog named by the configuration
    ///
    /// Components already supplied are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob directory cannot be created or the
    /// catalog database cannot be opened or migrated.
    pub async fn open_from_config(mut self) -> Result<Self, Error> {
        let config = self.config.get_or_insert_with(Config::default).clone();

        if self.store.is_none() {
            let store = FsBlobStore::new(config.blob_dir());
            store.initialize().await?;
            self.store = Some(Arc::new(store));
        }

        if self.catalog.is_none() {
            let allow_overwrite = config.upload.allow_overwrite;
            let catalog: Arc<dyn Catalog> = match config.catalog.backend {
                CatalogBackend::Sqlite => {
                    let path = config.catalog_path();
                    tracing::debug!(path = %path.display(), "opening sqlite catalog");
                    let pool = create_pool(
                        &path,
                        config.catalog.max_connections,
                        Duration::from_secs(config.catalog.busy_timeout),
                    )
                    .await?;
                    run_migrations(&pool).await?;
                    Arc::new(SqliteCatalog::new(pool).with_overwrite(allow_overwrite))
                }
                CatalogBackend::Memory => {
                    Arc::new(MemoryCatalog::new().with_overwrite(allow_overwrite))
                }
            };
            self.catalog = Some(catalog);
        }

        Ok(self)
    }

    /// Build the service
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or blob store is missing, or the URL
    /// signing key in the configuration is malformed.
    pub fn build(self) -> Result<PackageService, Error> {
        let catalog = self.catalog.ok_or_else(|| missing("catalog"))?;
        let store = self.store.ok_or_else(|| missing("blob store"))?;
        let config = self.config.unwrap_or_default();

        let urls = match self.urls {
            Some(urls) => urls,
            None => Arc::new(url_issuer_from_config(&config.urls)?),
        };
        let retry = self
            .retry
            .unwrap_or_else(|| RetryPolicy::from(&config.retry));

        let mut upload = UploadContext::new(Arc::clone(&catalog), Arc::clone(&store))
            .with_limits(UploadLimits::from(&config.upload))
            .with_retry(retry);
        if let Some(tx) = &self.tx {
            upload = upload.with_events(tx.clone());
        }

        Ok(PackageService {
            catalog,
            store,
            urls,
            upload,
            url_ttl: config.urls.ttl(),
            pending_ttl: config.upload.pending_ttl(),
            events: self.tx,
        })
    }
}

fn missing(component: &str) -> Error {
    ConfigError::Invalid {
        message: format!("package service built without a {component}"),
    }
    .into()
}
