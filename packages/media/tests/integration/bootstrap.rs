use media::{AppConfig, MediaService, Metadata};

use crate::common::solid_png;

fn local_config(root: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.local.root = root.display().to_string();
    config
}

#[tokio::test]
async fn disabled_search_is_reported_distinctly() {
    let dir = tempfile::tempdir().unwrap();
    let media = MediaService::from_config(&local_config(dir.path())).await.unwrap();

    let stored = media
        .upload(&solid_png(100, 80, [0, 0, 0]), Some("a.png"), Some("image/png"), 1, 1)
        .await
        .unwrap();
    assert_eq!((stored.width, stored.height), (100, 80));

    let err = media.search_by_text("cats", 1, 10, None).await.unwrap_err();
    assert_eq!(err.code(), "SEARCH_DISABLED");
    let err = media.search_by_similar_id("1", 1, 10).await.unwrap_err();
    assert_eq!(err.code(), "SEARCH_DISABLED");

    let outcome = media
        .process_embedding(&solid_png(4, 4, [1, 2, 3]), "1", 1, Metadata::new())
        .await;
    assert!(!outcome.success);
    assert!(!media.schedule_embedding("1", 1, &stored.storage_path, Metadata::new()));
}

#[tokio::test]
async fn enabled_search_falls_back_to_colour_embeddings() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = local_config(dir.path());
    config.environment = "test".into();
    config.search.enabled = true;
    config.search.dimension = 64;

    let media = MediaService::from_config(&config).await.unwrap();
    assert_eq!(media.search().namespace(), "test-images");

    let outcome = media
        .process_embedding(&solid_png(10, 10, [40, 80, 160]), "1", 1, Metadata::new())
        .await;
    assert!(outcome.success);

    let hits = media
        .search_by_image(&solid_png(10, 10, [40, 80, 160]), 1, 5)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].image_id, "1");
    assert!((hits[0].score - 1.0).abs() < 1e-5);

    let err = media.search_by_text("blue square", 1, 5, None).await.unwrap_err();
    assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn cloud_backend_without_bucket_fails_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = local_config(dir.path());
    config.storage.backend = common::StorageBackendKind::Cloud;
    let err = MediaService::from_config(&config).await.err().unwrap();
    assert_eq!(err.code(), "INTERNAL_ERROR");
}
