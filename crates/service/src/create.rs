//! CreatePackage: client-streaming upload

use crate::PackageService;
use futures::{pin_mut, Stream, StreamExt};
use pkgreg_errors::{Error, PackageError};
use pkgreg_types::{CreatePackageRequest, CreatePackageResponse, TransportError};
use pkgreg_upload::UploadSession;

impl PackageService {
    /// Run one upload stream to completion
    ///
    /// The first message must carry the package info; every following
    /// message carries contents. End of stream commits the upload. A
    /// transport failure aborts it.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the upload. When this returns an error
    /// nothing from the stream is visible and no staged bytes remain.
    pub async fn create_package<S>(&self, requests: S) -> Result<CreatePackageResponse, Error>
    where
        S: Stream<Item = Result<CreatePackageRequest, TransportError>> + Send,
    {
        pin_mut!(requests);

        let info = match requests.next().await {
            Some(Ok(CreatePackageRequest::Info(info))) => info,
            Some(Ok(CreatePackageRequest::Contents(_))) => {
                return Err(PackageError::MissingInfo {
                    reason: "first message carried contents".to_string(),
                }
                .into())
            }
            Some(Err(err)) => {
                tracing::debug!(error = %err, "upload stream failed before package info");
                return Err(Error::Cancelled);
            }
            None => {
                return Err(PackageError::MissingInfo {
                    reason: "stream ended before any message".to_string(),
                }
                .into())
            }
        };

        let mut session = UploadSession::open(info, self.upload.clone()).await?;

        while let Some(message) = requests.next().await {
            match message {
                Ok(message) => session.handle(message).await?,
                Err(err) => {
                    let reason = canceled(session.identity().to_string(), &err);
                    return Err(session.abort(reason).await);
                }
            }
        }

        let outcome = session.finish().await?;
        let record = outcome.record;

        if let Some(old) = outcome.superseded {
            // The new record is already visible, so a leftover blob is only garbage
            let _ = self
                .remove_blob(&old.location, &old.identity.to_string())
                .await;
        }

        Ok(CreatePackageResponse {
            size: record.size,
            checksum: record.checksum.ok_or_else(|| {
                Error::internal(format!("committed record {} has no checksum", record.id))
            })?,
            identity: record.identity,
        })
    }
}

fn canceled(identity: String, err: &TransportError) -> Error {
    tracing::debug!(identity = %identity, error = %err, "upload stream interrupted");
    PackageError::Canceled { identity }.into()
}
