//! Contract tests run against every catalog backend

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use pkgreg_catalog::*;
    use pkgreg_errors::ErrorKind;
    use pkgreg_types::{
        BlobKey, Checksum, ChecksumAlgorithm, ListFilter, PackageIdentity, PackageType, RecordId,
        Uuid,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    enum Backend {
        Memory,
        Sqlite,
    }

    struct Fixture {
        catalog: Arc<dyn Catalog>,
        _dir: Option<TempDir>,
    }

    async fn fixture(backend: &Backend, allow_overwrite: bool) -> Fixture {
        match backend {
            Backend::Memory => Fixture {
                catalog: Arc::new(MemoryCatalog::new().with_overwrite(allow_overwrite)),
                _dir: None,
            },
            Backend::Sqlite => {
                let dir = tempfile::tempdir().unwrap();
                let pool = create_pool(&dir.path().join("catalog.sqlite"), 5, Duration::from_secs(5))
                    .await
                    .unwrap();
                run_migrations(&pool).await.unwrap();
                Fixture {
                    catalog: Arc::new(SqliteCatalog::new(pool).with_overwrite(allow_overwrite)),
                    _dir: Some(dir),
                }
            }
        }
    }

    const BACKENDS: [Backend; 2] = [Backend::Memory, Backend::Sqlite];

    fn identity(org: &str, name: &str, version: &str, package_type: PackageType) -> PackageIdentity {
        PackageIdentity::new(org, name, version, package_type).unwrap()
    }

    fn checksum(seed: u8) -> Checksum {
        Checksum::from_digest(ChecksumAlgorithm::Blake3, [seed; 32])
    }

    fn request(record_id: RecordId, seed: u8) -> CommitRequest {
        CommitRequest {
            record_id,
            location: BlobKey::new(format!("packages/{}", Uuid::new_v4().simple())),
            checksum: checksum(seed),
            size: u64::from(seed) * 10,
            declared: None,
        }
    }

    async fn publish(catalog: &dyn Catalog, id: &PackageIdentity, seed: u8) -> CommitOutcome {
        let record_id = catalog
            .create_pending(id, &BlobKey::staging(&Uuid::new_v4()))
            .await
            .unwrap();
        catalog.commit(id, request(record_id, seed)).await.unwrap()
    }

    async fn list_all(catalog: &dyn Catalog, filter: ListFilter) -> Vec<PackageIdentity> {
        catalog
            .list(filter)
            .map_ok(|record| record.identity)
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_pending_records_are_invisible() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let id = identity("acme", "detector", "1.0.0", PackageType::MlModel);

            let record_id = fx
                .catalog
                .create_pending(&id, &BlobKey::staging(&Uuid::new_v4()))
                .await
                .unwrap();

            let err = fx.catalog.get(&id).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            assert!(list_all(&*fx.catalog, ListFilter::for_organization("acme"))
                .await
                .is_empty());

            let outcome = fx.catalog.commit(&id, request(record_id, 3)).await.unwrap();
            assert!(outcome.superseded.is_none());
            assert!(outcome.record.is_committed());

            let fetched = fx.catalog.get(&id).await.unwrap();
            assert_eq!(fetched.id, record_id);
            assert_eq!(fetched.size, 30);
            assert_eq!(fetched.checksum, Some(checksum(3)));
        }
    }

    #[tokio::test]
    async fn test_second_pending_conflicts() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let id = identity("acme", "tool", "2.0", PackageType::Archive);

            fx.catalog
                .create_pending(&id, &BlobKey::staging(&Uuid::new_v4()))
                .await
                .unwrap();
            let err = fx
                .catalog
                .create_pending(&id, &BlobKey::staging(&Uuid::new_v4()))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
            assert_eq!(err.identity(), Some(id.to_string().as_str()));
        }
    }

    #[tokio::test]
    async fn test_committed_identity_rejected_without_overwrite() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let id = identity("acme", "tool", "2.0", PackageType::Archive);
            publish(&*fx.catalog, &id, 1).await;

            let err = fx
                .catalog
                .create_pending(&id, &BlobKey::staging(&Uuid::new_v4()))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        }
    }

    #[tokio::test]
    async fn test_overwrite_supersedes_atomically() {
        for backend in &BACKENDS {
            let fx = fixture(backend, true).await;
            let id = identity("acme", "tool", "2.0", PackageType::Archive);
            let first = publish(&*fx.catalog, &id, 1).await;

            // The old record stays visible until the new one commits
            let record_id = fx
                .catalog
                .create_pending(&id, &BlobKey::staging(&Uuid::new_v4()))
                .await
                .unwrap();
            assert_eq!(fx.catalog.get(&id).await.unwrap().id, first.record.id);

            let second = fx.catalog.commit(&id, request(record_id, 2)).await.unwrap();
            let superseded = second.superseded.unwrap();
            assert_eq!(superseded.id, first.record.id);
            assert_eq!(superseded.location, first.record.location);

            let current = fx.catalog.get(&id).await.unwrap();
            assert_eq!(current.id, record_id);
            assert_eq!(
                list_all(&*fx.catalog, ListFilter::for_organization("acme")).await,
                vec![id.clone()]
            );
        }
    }

    #[tokio::test]
    async fn test_declared_checksum_mismatch_blocks_commit() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let id = identity("acme", "maps", "7", PackageType::SlamMap);
            let record_id = fx
                .catalog
                .create_pending(&id, &BlobKey::staging(&Uuid::new_v4()))
                .await
                .unwrap();

            let mut bad = request(record_id, 5);
            bad.declared = Some(checksum(6));
            let err = fx.catalog.commit(&id, bad).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
            assert!(fx.catalog.get(&id).await.is_err());

            fx.catalog.abort(&id, record_id).await.unwrap();
            // Identity is free again
            publish(&*fx.catalog, &id, 5).await;
        }
    }

    #[tokio::test]
    async fn test_commit_without_pending_is_not_found() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let id = identity("acme", "ghost", "1", PackageType::Module);
            let err = fx
                .catalog
                .commit(&id, request(Uuid::new_v4(), 1))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);

            // Aborting something that was never opened is a no-op
            fx.catalog.abort(&id, Uuid::new_v4()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_list_filters_and_order() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let a = identity("acme", "beta", "1.0", PackageType::Dataset);
            let b = identity("acme", "alpha", "2.0", PackageType::Archive);
            let c = identity("acme", "alpha", "1.0", PackageType::Module);
            let d = identity("acme", "alpha", "1.0", PackageType::Dataset);
            let other_org = identity("globex", "alpha", "1.0", PackageType::Archive);
            for (seed, id) in [&a, &b, &c, &d, &other_org].into_iter().enumerate() {
                publish(&*fx.catalog, id, u8::try_from(seed).unwrap() + 1).await;
            }

            let all = list_all(&*fx.catalog, ListFilter::for_organization("acme")).await;
            assert_eq!(all, vec![d.clone(), c.clone(), b.clone(), a.clone()]);

            let alphas = list_all(
                &*fx.catalog,
                ListFilter::for_organization("acme").with_name("alpha"),
            )
            .await;
            assert_eq!(alphas, vec![d.clone(), c.clone(), b.clone()]);

            let datasets = list_all(
                &*fx.catalog,
                ListFilter::for_organization("acme").with_type(PackageType::Dataset),
            )
            .await;
            assert_eq!(datasets, vec![d.clone(), a.clone()]);

            let exact = list_all(
                &*fx.catalog,
                ListFilter::for_organization("acme")
                    .with_name("alpha")
                    .with_version("1.0")
                    .with_type(PackageType::Module),
            )
            .await;
            assert_eq!(exact, vec![c.clone()]);

            assert!(list_all(&*fx.catalog, ListFilter::for_organization("initech"))
                .await
                .is_empty());

            // A second call is a fresh stream
            let again = list_all(&*fx.catalog, ListFilter::for_organization("acme")).await;
            assert_eq!(again, all);
        }
    }

    #[tokio::test]
    async fn test_partial_delete() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let present = identity("acme", "tool", "1.0", PackageType::Archive);
            let missing = identity("acme", "tool", "9.9", PackageType::Archive);
            let published = publish(&*fx.catalog, &present, 4).await;

            let results = fx
                .catalog
                .delete(&[present.clone(), missing.clone()])
                .await;
            assert_eq!(results.len(), 2);
            assert_eq!(results[0].0, present);
            assert_eq!(
                results[0].1.as_ref().unwrap().location,
                published.record.location
            );
            assert_eq!(results[1].0, missing);
            assert_eq!(
                results[1].1.as_ref().unwrap_err().kind(),
                ErrorKind::NotFound
            );

            assert!(fx.catalog.get(&present).await.is_err());
            // Deleted identity can be uploaded again
            publish(&*fx.catalog, &present, 5).await;
        }
    }

    #[tokio::test]
    async fn test_latest_resolves_newest_commit() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let old = identity("acme", "detector", "1.0", PackageType::MlModel);
            let new = identity("acme", "detector", "0.9-hotfix", PackageType::MlModel);
            let other_type = identity("acme", "detector", "5.0", PackageType::MlTraining);

            publish(&*fx.catalog, &old, 1).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
            publish(&*fx.catalog, &new, 2).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
            publish(&*fx.catalog, &other_type, 3).await;

            let alias = PackageIdentity {
                organization_id: "acme".to_string(),
                name: "detector".to_string(),
                version: "latest".to_string(),
                package_type: PackageType::MlModel,
            };
            assert_eq!(fx.catalog.get(&alias).await.unwrap().identity, new);

            let unknown = PackageIdentity {
                name: "absent".to_string(),
                ..alias
            };
            assert_eq!(
                fx.catalog.get(&unknown).await.unwrap_err().kind(),
                ErrorKind::NotFound
            );
        }
    }

    #[tokio::test]
    async fn test_latest_cannot_be_uploaded() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let id = identity("acme", "detector", "latest", PackageType::MlModel);
            let err = fx
                .catalog
                .create_pending(&id, &BlobKey::staging(&Uuid::new_v4()))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidIdentity);
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_stale_pending_only() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let stale = identity("acme", "stale", "1", PackageType::Archive);
            let fresh = identity("acme", "fresh", "1", PackageType::Archive);
            let done = identity("acme", "done", "1", PackageType::Archive);

            let staging = BlobKey::staging(&Uuid::new_v4());
            fx.catalog.create_pending(&stale, &staging).await.unwrap();
            publish(&*fx.catalog, &done, 1).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
            let cutoff = chrono::Utc::now();
            fx.catalog
                .create_pending(&fresh, &BlobKey::staging(&Uuid::new_v4()))
                .await
                .unwrap();

            let swept = fx.catalog.sweep_pending(cutoff).await.unwrap();
            assert_eq!(swept.len(), 1);
            assert_eq!(swept[0].identity, stale);
            assert_eq!(swept[0].location, staging);

            // The stale identity is free, the fresh one still reserved
            fx.catalog
                .create_pending(&stale, &BlobKey::staging(&Uuid::new_v4()))
                .await
                .unwrap();
            let err = fx
                .catalog
                .create_pending(&fresh, &BlobKey::staging(&Uuid::new_v4()))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
            assert!(fx.catalog.get(&done).await.is_ok());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_has_one_winner() {
        for backend in &BACKENDS {
            let fx = fixture(backend, false).await;
            let id = identity("acme", "race", "1.0", PackageType::Archive);

            let mut handles = Vec::new();
            for _ in 0..8 {
                let catalog = Arc::clone(&fx.catalog);
                let id = id.clone();
                handles.push(tokio::spawn(async move {
                    catalog
                        .create_pending(&id, &BlobKey::staging(&Uuid::new_v4()))
                        .await
                }));
            }

            let mut winners = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => winners += 1,
                    Err(err) => assert!(
                        matches!(err.kind(), ErrorKind::Conflict | ErrorKind::StorageFailure),
                        "unexpected {err}"
                    ),
                }
            }
            assert_eq!(winners, 1);
        }
    }

    #[tokio::test]
    async fn test_pool_pragmas_apply_to_every_connection() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_pool(&dir.path().join("catalog.sqlite"), 3, Duration::from_secs(5))
            .await
            .unwrap();

        // hold all connections at once so each one is a distinct handle
        let mut held = Vec::new();
        for _ in 0..3 {
            held.push(pool.acquire().await.unwrap());
        }
        for conn in &mut held {
            let synchronous: i64 = sqlx::query_scalar("PRAGMA synchronous")
                .fetch_one(&mut **conn)
                .await
                .unwrap();
            let temp_store: i64 = sqlx::query_scalar("PRAGMA temp_store")
                .fetch_one(&mut **conn)
                .await
                .unwrap();
            assert_eq!(synchronous, 1, "synchronous should be NORMAL");
            assert_eq!(temp_store, 2, "temp_store should be MEMORY");
        }
    }
}
