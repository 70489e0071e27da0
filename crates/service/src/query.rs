//! GetPackage and ListPackages

use crate::PackageService;
use futures::future::try_join_all;
use futures::TryStreamExt;
use pkgreg_errors::{Error, PackageError};
use pkgreg_events::{AppEvent, EventEmitter, FailureContext, PackageEvent};
use pkgreg_types::{
    DownloadDescriptor, GetPackageRequest, ListFilter, ListPackagesRequest, ListPackagesResponse,
    PackageRecord,
};

impl PackageService {
    /// Look up one committed package
    ///
    /// Version `latest` resolves to the newest committed version of the
    /// named package.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentity` for a malformed request, `NotFound` if no
    /// committed record matches, or a storage failure.
    pub async fn get_package(&self, request: GetPackageRequest) -> Result<DownloadDescriptor, Error> {
        let identity = request.identity();
        let result: Result<DownloadDescriptor, Error> = async {
            identity.validate()?;
            let catalog = &self.catalog;
            let record = self
                .upload
                .retry
                .run("catalog.get", &self.events, || catalog.get(&identity))
                .await?;
            self.describe(record, request.include_download_info).await
        }
        .await;

        match &result {
            Ok(descriptor) => self.emit(AppEvent::Package(PackageEvent::Fetched {
                identity: descriptor.record.identity.to_string(),
                download_url: descriptor.url.is_some(),
            })),
            Err(err) => self.report_failure("get_package", Some(identity.to_string()), err),
        }
        result
    }

    /// List the committed packages of one organization
    ///
    /// Results are ordered by name, then version, then type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentity` if the organization id is empty, or a
    /// storage failure.
    pub async fn list_packages(
        &self,
        request: ListPackagesRequest,
    ) -> Result<ListPackagesResponse, Error> {
        let organization_id = request.organization_id.clone();
        let include_url = request.include_download_info;
        let filter = ListFilter {
            organization_id: request.organization_id,
            name: request.name,
            version: request.version,
            package_type: request.package_type,
        };

        let result: Result<ListPackagesResponse, Error> = async {
            if organization_id.trim().is_empty() {
                return Err(PackageError::InvalidIdentity {
                    identity: organization_id.clone(),
                    reason: "organization id must not be empty".to_string(),
                }
                .into());
            }

            let catalog = &self.catalog;
            let records: Vec<PackageRecord> = self
                .upload
                .retry
                .run("catalog.list", &self.events, || {
                    catalog.list(filter.clone()).try_collect()
                })
                .await?;

            let packages = try_join_all(
                records
                    .into_iter()
                    .map(|record| self.describe(record, include_url)),
            )
            .await?;
            Ok::<_, Error>(ListPackagesResponse { packages })
        }
        .await;

        match &result {
            Ok(response) => {
                tracing::debug!(
                    organization = %organization_id,
                    count = response.packages.len(),
                    "packages listed"
                );
                self.emit(AppEvent::Package(PackageEvent::ListCompleted {
                    organization_id,
                    count: response.packages.len(),
                }));
            }
            Err(err) => self.report_failure("list_packages", None, err),
        }
        result
    }

    async fn describe(
        &self,
        record: PackageRecord,
        include_url: bool,
    ) -> Result<DownloadDescriptor, Error> {
        let url = if include_url {
            Some(self.urls.issue(&record.location, self.url_ttl).await?)
        } else {
            None
        };
        Ok(DownloadDescriptor { record, url })
    }

    pub(crate) fn report_failure(&self, operation: &str, identity: Option<String>, err: &Error) {
        tracing::debug!(operation, kind = %err.kind(), error = %err, "operation failed");
        self.emit(AppEvent::Package(PackageEvent::OperationFailed {
            operation: operation.to_string(),
            identity,
            failure: FailureContext::from_error(err),
        }));
    }
}
