//! Extraction scheduler behavior over the local transport.

mod common;

use std::sync::Arc;

use common::{write_image_cluster, FailingFactory};
use skyqc_common::AnalysisConfig;
use skyqc_sa::models::ImageDescriptor;
use skyqc_sa::services::session_pool::PoolKey;
use skyqc_sa::services::ExtractionScheduler;
use skyqc_sa::transport::local::{LocalFactory, LocalSession};

fn pool_key(session_id: &str) -> PoolKey {
    PoolKey {
        session_id: session_id.to_string(),
        host: "localhost".to_string(),
        port: 0,
        username: "pilot".to_string(),
    }
}

async fn image_descriptors(root: &std::path::Path, folder: &str) -> Vec<ImageDescriptor> {
    let mut reader = tokio::fs::read_dir(root.join(folder)).await.unwrap();
    let mut images = Vec::new();
    while let Some(entry) = reader.next_entry().await.unwrap() {
        let name = entry.file_name().to_string_lossy().into_owned();
        images.push(ImageDescriptor {
            remote_path: format!("/{}/{}", folder, name),
            size_bytes: entry.metadata().await.unwrap().len(),
            name,
        });
    }
    images
}

#[tokio::test]
async fn test_parallel_extraction_over_pool() {
    let dir = tempfile::tempdir().unwrap();
    write_image_cluster(&dir.path().join("Orbit_1"), 30, 37.0, -122.0, 45.0).await;

    let scheduler = ExtractionScheduler::new(Arc::new(AnalysisConfig::default()));
    let caller = LocalSession::new(dir.path());
    let factory = LocalFactory::new(dir.path());
    let images = image_descriptors(dir.path(), "Orbit_1").await;

    let outcome = scheduler
        .run(&caller, &factory, pool_key("parallel"), "Orbit_1", &images)
        .await;
    assert_eq!(outcome.points.len(), 30);
    assert_eq!(outcome.failures, 0);
    assert!(outcome.points.iter().all(|p| p.folder == "Orbit_1"));
}

#[tokio::test]
async fn test_pool_failure_falls_back_to_sequential() {
    let dir = tempfile::tempdir().unwrap();
    write_image_cluster(&dir.path().join("scan"), 8, 37.0, -122.0, 30.0).await;

    let scheduler = ExtractionScheduler::new(Arc::new(AnalysisConfig::default()));
    let caller = LocalSession::new(dir.path());
    let images = image_descriptors(dir.path(), "scan").await;

    let outcome = scheduler
        .run(&caller, &FailingFactory, pool_key("fallback"), "scan", &images)
        .await;
    assert_eq!(outcome.points.len(), 8);
    assert_eq!(outcome.failures, 0);
}

#[tokio::test]
async fn test_unreadable_images_count_as_failures() {
    let dir = tempfile::tempdir().unwrap();
    write_image_cluster(&dir.path().join("scan"), 3, 37.0, -122.0, 30.0).await;

    let scheduler = ExtractionScheduler::new(Arc::new(AnalysisConfig::default()));
    let caller = LocalSession::new(dir.path());
    let mut images = image_descriptors(dir.path(), "scan").await;
    images.push(ImageDescriptor {
        name: "MISSING.JPG".to_string(),
        remote_path: "/scan/MISSING.JPG".to_string(),
        size_bytes: 0,
    });

    let outcome = scheduler.sequential(&caller, "scan", &images).await;
    assert_eq!(outcome.points.len(), 3);
    assert_eq!(outcome.failures, 1);
}
