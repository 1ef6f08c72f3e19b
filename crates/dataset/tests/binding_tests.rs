mod common;

use annostore::testing::{RecordingTransfer, TransferCall};
use common::{CountingLoader, settings};
use dataset::{
    AnnotationsLocation, AppContext, DEMO_PATH, Dataset, DatasetError, SessionState,
};
use std::sync::Arc;
use tempfile::tempdir;

fn session(dataset: Option<&str>, csv: Option<&str>) -> SessionState {
    SessionState {
        dataset_path: dataset.map(str::to_string),
        csv_path: csv.map(str::to_string),
        dataset: None,
    }
}

#[tokio::test]
async fn test_session_dataset_uses_annotations_dir() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let transfer = Arc::new(RecordingTransfer::new());
    let matrix = Arc::new(CountingLoader::default());
    let ctx = AppContext::with_loader(
        settings(tmp.path(), "mybucket")?,
        transfer.clone(),
        matrix.clone(),
    )?;

    let binding = ctx
        .load_for_request(&session(Some("s3://mybucket/foo.h5ad"), None))
        .await?;

    assert!(binding.found);
    assert_eq!(binding.path, "s3://mybucket/foo.h5ad");
    let handle = binding.handle.expect("handle");
    assert!(matches!(binding.dataset, Dataset::Loaded(ref h) if Arc::ptr_eq(h, &handle)));

    let expected_dir = tmp.path().join("mybucket").join("foo.h5ad_annotations");
    assert!(expected_dir.is_dir());
    assert_eq!(handle.annotations, AnnotationsLocation::Directory(expected_dir.clone()));

    let config = ctx.current_config().await.expect("current config");
    assert!(config.is_complete());
    assert_eq!(config.server.data_locator_region.as_deref(), Some("eu-west-1"));
    assert_eq!(config.dataset.annotations_directory, Some(expected_dir));
    assert_eq!(config.dataset.annotations_file, None);

    let current = ctx.current_handle().await.expect("current handle");
    assert!(Arc::ptr_eq(&current, &handle));
    assert!(transfer.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_session_csv_is_downloaded_as_annotations_file() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let transfer = Arc::new(RecordingTransfer::new().with_content(b"index,cluster\n"));
    let matrix = Arc::new(CountingLoader::default());
    let ctx = AppContext::with_loader(settings(tmp.path(), "mybucket")?, transfer.clone(), matrix)?;

    let binding = ctx
        .load_for_request(&session(
            Some("s3://mybucket/foo.h5ad"),
            Some("s3://mybucket/labels/foo.csv"),
        ))
        .await?;

    let local = tmp.path().join("mybucket").join("labels/foo.csv");
    assert_eq!(std::fs::read(&local)?, b"index,cluster\n");
    assert_eq!(
        binding.handle.expect("handle").annotations,
        AnnotationsLocation::File(local.clone())
    );
    assert_eq!(
        transfer.calls(),
        vec![TransferCall::Copy {
            src: "s3://mybucket/labels/foo.csv".to_string(),
            dst: local.to_string_lossy().into_owned(),
        }]
    );
    assert!(!tmp.path().join("mybucket").join("foo.h5ad_annotations").exists());
    Ok(())
}

#[tokio::test]
async fn test_no_session_dataset_falls_back_to_demo() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let transfer = Arc::new(RecordingTransfer::new());
    let matrix = Arc::new(CountingLoader::default());
    let ctx = AppContext::with_loader(
        settings(tmp.path(), "mybucket")?,
        transfer.clone(),
        matrix.clone(),
    )?;

    for state in [session(None, None), session(Some(""), Some("s3://mybucket/x.csv"))] {
        let binding = ctx.load_for_request(&state).await?;
        assert!(!binding.found);
        assert_eq!(binding.path, DEMO_PATH);
        assert!(binding.handle.is_none());
        assert!(matches!(binding.dataset, Dataset::Demo("pbmc68k_reduced")));
    }

    assert_eq!(matrix.opens(), 0);
    assert!(transfer.calls().is_empty());
    assert!(ctx.current_handle().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_loader_failure_propagates() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let matrix = Arc::new(CountingLoader::default());
    matrix.fail(true);
    let ctx = AppContext::with_loader(
        settings(tmp.path(), "mybucket")?,
        Arc::new(RecordingTransfer::new()),
        matrix,
    )?;

    let err = ctx
        .load_for_request(&session(Some("s3://mybucket/broken.h5ad"), None))
        .await
        .expect_err("load fails");
    assert!(matches!(err, DatasetError::DatasetAccess { .. }));
    assert_eq!(err.http_status(), 400);
    assert!(err.to_string().starts_with("Invalid dataset: "));
    assert!(ctx.current_handle().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_csv_download_failure_propagates() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let transfer = Arc::new(RecordingTransfer::new());
    transfer.fail_copies(true);
    let matrix = Arc::new(CountingLoader::default());
    let ctx = AppContext::with_loader(settings(tmp.path(), "mybucket")?, transfer, matrix.clone())?;

    let err = ctx
        .load_for_request(&session(
            Some("s3://mybucket/foo.h5ad"),
            Some("s3://mybucket/foo.csv"),
        ))
        .await
        .expect_err("copy fails");
    assert_eq!(err.http_status(), 502);
    assert_eq!(matrix.opens(), 0);
    Ok(())
}

#[tokio::test]
async fn test_csv_from_other_bucket_is_rejected() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let transfer = Arc::new(RecordingTransfer::new());
    let ctx = AppContext::with_loader(
        settings(tmp.path(), "mybucket")?,
        transfer.clone(),
        Arc::new(CountingLoader::default()),
    )?;

    let err = ctx
        .load_for_request(&session(
            Some("s3://mybucket/foo.h5ad"),
            Some("s3://elsewhere/foo.csv"),
        ))
        .await
        .expect_err("other bucket");
    assert!(matches!(err, DatasetError::DatasetAccess { .. }));
    assert!(transfer.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_references_leaving_the_annotations_tree_are_rejected() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let root = tmp.path().join("annotations");
    let transfer = Arc::new(RecordingTransfer::new().with_content(b"obs,label\n"));
    let matrix = Arc::new(CountingLoader::default());
    let ctx = AppContext::with_loader(
        settings(&root, "mybucket")?,
        transfer.clone(),
        matrix.clone(),
    )?;

    let dataset = Some("s3://mybucket/foo.h5ad");
    let cases = [
        session(Some("s3://mybucket/../../escaped.h5ad"), None),
        session(dataset, Some("s3://mybucket/../../dotdot.csv")),
        session(dataset, Some("s3://mybucket///abs/outside.csv")),
    ];
    for case in &cases {
        let err = ctx.load_for_request(case).await.expect_err("escaping key");
        assert!(matches!(err, DatasetError::DatasetAccess { .. }), "{err}");
        assert_eq!(err.http_status(), 400);
    }

    assert!(transfer.calls().is_empty());
    assert_eq!(matrix.opens(), 0);
    assert!(!tmp.path().join("escaped.h5ad_annotations").exists());
    assert!(!tmp.path().join("dotdot.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_rebinding_same_path_keeps_first_handle() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let transfer = Arc::new(RecordingTransfer::new());
    let matrix = Arc::new(CountingLoader::default());
    let ctx = AppContext::with_loader(settings(tmp.path(), "mybucket")?, transfer, matrix.clone())?;

    let first = ctx
        .load_for_request(&session(Some("s3://mybucket/foo.h5ad"), None))
        .await?;
    let second = ctx
        .load_for_request(&session(
            Some("s3://mybucket/foo.h5ad"),
            Some("s3://mybucket/foo.csv"),
        ))
        .await?;

    let first = first.handle.expect("first");
    let second = second.handle.expect("second");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(matrix.opens(), 1);

    // The published config follows the latest session, the handle does not.
    let config = ctx.current_config().await.expect("config");
    assert!(matches!(config.annotations(), AnnotationsLocation::File(_)));
    assert!(matches!(second.annotations, AnnotationsLocation::Directory(_)));
    Ok(())
}

#[tokio::test]
async fn test_last_bind_wins() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let ctx = AppContext::with_loader(
        settings(tmp.path(), "mybucket")?,
        Arc::new(RecordingTransfer::new()),
        Arc::new(CountingLoader::default()),
    )?;

    _ = ctx
        .load_for_request(&session(Some("s3://mybucket/a.h5ad"), None))
        .await?;
    _ = ctx
        .load_for_request(&session(Some("s3://mybucket/b.h5ad"), None))
        .await?;

    let current = ctx.current_handle().await.expect("current");
    assert_eq!(current.location, "s3://mybucket/b.h5ad");

    let reloaded = ctx.reload_current().await?.expect("reloaded");
    assert!(!Arc::ptr_eq(&current, &reloaded));
    assert_eq!(reloaded.location, "s3://mybucket/b.h5ad");
    Ok(())
}

#[tokio::test]
async fn test_file_loader_fetches_from_bucket() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let mut h5ad = vec![0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];
    h5ad.extend_from_slice(&[0u8; 24]);
    let transfer = Arc::new(RecordingTransfer::new().with_content(&h5ad));
    let ctx = AppContext::new(settings(tmp.path(), "mybucket")?, transfer.clone())?;

    let binding = ctx
        .load_for_request(&session(Some("s3://mybucket/pbmc3k.h5ad"), None))
        .await?;
    let handle = binding.handle.expect("handle");
    assert_eq!(handle.local_path, tmp.path().join("mybucket").join("pbmc3k.h5ad"));
    assert_eq!(handle.size_bytes, 32);
    assert_eq!(handle.title, "pbmc3k");
    assert_eq!(transfer.copy_count(), 1);

    let err = ctx
        .load_for_request(&session(Some("s3://elsewhere/pbmc3k.h5ad"), None))
        .await
        .expect_err("other bucket");
    assert_eq!(err.http_status(), 400);
    Ok(())
}
