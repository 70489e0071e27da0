//! DeletePackage: batch removal with per-identity outcomes

use crate::PackageService;
use pkgreg_errors::Error;
use pkgreg_events::{AppEvent, EventEmitter, PackageEvent};
use pkgreg_types::{DeleteOutcome, DeletePackageRequest, DeletePackageResponse, PackageIdentity};

impl PackageService {
    /// Delete packages of one organization
    ///
    /// Each selector is resolved against the request's organization and
    /// succeeds or fails on its own; the response lists outcomes in request
    /// order. Catalog entries go first, so a blob that cannot be removed
    /// afterwards is orphaned but never reachable.
    pub async fn delete_package(&self, request: DeletePackageRequest) -> DeletePackageResponse {
        let identities: Vec<PackageIdentity> = request
            .packages
            .iter()
            .map(|selector| selector.scoped(&request.organization_id))
            .collect();

        let mut outcomes: Vec<Option<Result<(), Error>>> = vec![None; identities.len()];
        let mut valid = Vec::with_capacity(identities.len());
        let mut positions = Vec::with_capacity(identities.len());
        for (index, identity) in identities.iter().enumerate() {
            match identity.validate() {
                Ok(()) => {
                    valid.push(identity.clone());
                    positions.push(index);
                }
                Err(err) => outcomes[index] = Some(Err(err.into())),
            }
        }

        let deleted = self.catalog.delete(&valid).await;
        for (index, (identity, result)) in positions.into_iter().zip(deleted) {
            let outcome = match result {
                Ok(record) => {
                    tracing::info!(identity = %identity, "package deleted");
                    self.emit(AppEvent::Package(PackageEvent::Deleted {
                        identity: identity.to_string(),
                    }));
                    // The catalog entry is gone, so the delete has succeeded
                    let _ = self
                        .remove_blob(&record.location, &identity.to_string())
                        .await;
                    Ok(())
                }
                Err(err) => {
                    self.report_failure("delete_package", Some(identity.to_string()), &err);
                    Err(err)
                }
            };
            outcomes[index] = Some(outcome);
        }

        let results: Vec<DeleteOutcome> = identities
            .into_iter()
            .zip(outcomes)
            .map(|(identity, result)| DeleteOutcome {
                identity,
                result: result.unwrap_or_else(|| {
                    Err(Error::internal("catalog returned no outcome for identity"))
                }),
            })
            .collect();

        let deleted = results.iter().filter(|o| o.is_deleted()).count();
        self.emit(AppEvent::Package(PackageEvent::DeleteCompleted {
            organization_id: request.organization_id,
            deleted,
            failed: results.len() - deleted,
        }));

        DeletePackageResponse { results }
    }
}
