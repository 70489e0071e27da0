#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package registry façade
//!
//! [`PackageService`] exposes the four registry operations (create, delete,
//! get, list) over a shared catalog, blob store and URL issuer, plus the
//! background sweep of abandoned uploads. Callers construct it with
//! [`ServiceBuilder`], either from explicit components or from a [`Config`].
//!
//! [`Config`]: pkgreg_config::Config

mod builder;
mod create;
mod delete;
mod query;
mod sweep;

pub use builder::{url_issuer_from_config, ServiceBuilder};
pub use pkgreg_upload::{RetryPolicy, UploadLimits};

use pkgreg_catalog::Catalog;
use pkgreg_errors::Error;
use pkgreg_events::{EventEmitter, EventSender};
use pkgreg_store::{BlobStore, UrlIssuer};
use pkgreg_types::BlobKey;
use pkgreg_upload::UploadContext;
use std::sync::Arc;
use std::time::Duration;

/// Registry operations over shared storage. Clones share everything.
#[derive(Clone)]
pub struct PackageService {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn BlobStore>,
    urls: Arc<dyn UrlIssuer>,
    upload: UploadContext,
    url_ttl: Duration,
    pending_ttl: Duration,
    events: Option<EventSender>,
}

impl PackageService {
    #[must_use]
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.upload.retry
    }

    /// Remove a blob that no committed record references any more
    ///
    /// Transient failures are retried; a blob that still cannot be removed
    /// is logged and left for an operator.
    async fn remove_blob(&self, key: &BlobKey, identity: &str) -> Result<(), Error> {
        let store = &self.store;
        let result = self
            .upload
            .retry
            .run("store.delete", &self.events, || store.delete(key))
            .await;

        if let Err(err) = &result {
            tracing::warn!(identity, key = %key, error = %err, "blob left orphaned");
            self.events.emit(pkgreg_events::AppEvent::Package(
                pkgreg_events::PackageEvent::BlobOrphaned {
                    identity: identity.to_string(),
                    location: key.to_string(),
                },
            ));
        }
        result
    }
}

impl EventEmitter for PackageService {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl std::fmt::Debug for PackageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageService")
            .field("upload", &self.upload)
            .field("url_ttl", &self.url_ttl)
            .field("pending_ttl", &self.pending_ttl)
            .finish_non_exhaustive()
    }
}
