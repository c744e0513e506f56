use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use media::{EmbeddingOutcome, EmbeddingSink, Metadata};
use search::{EmbeddingJob, VectorIndex};
use serde_json::json;
use tokio::sync::mpsc;

use crate::common::{DIM, NAMESPACE, TestApp, encode, noise_png, solid_png};

mod process {
    use super::*;

    #[tokio::test]
    async fn stores_vector_with_metadata() {
        let app = TestApp::spawn().await;
        let mut original = Metadata::new();
        original.insert("album".into(), json!("trip"));

        let outcome = app
            .media
            .process_embedding(&solid_png(10, 10, [0, 128, 255]), "17", 3, original)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.embedding_id.as_deref(), Some("17"));
        let record = app.index.fetch(NAMESPACE, "17").await.unwrap().unwrap();
        assert_eq!(record.values.len(), DIM);
        assert_eq!(record.metadata["image_id"], "17");
        assert_eq!(record.metadata["team_id"], "3");
        assert_eq!(record.metadata["embedding_method"], "dominant_color");
        assert_eq!(record.metadata["original_metadata"], json!({ "album": "trip" }));
    }

    #[tokio::test]
    async fn every_vector_has_index_dimension() {
        let app = TestApp::spawn().await;
        // Raw fallback features range from 5 values (solid) to 50 (ten colours),
        // both sides of the index dimension.
        let striped = RgbImage::from_fn(60, 10, |x, _| {
            let band = (x / 6) as u8;
            Rgb([band * 25, 255 - band * 25, ((band as u16 * 97) % 255) as u8])
        });
        let images = [
            solid_png(3, 3, [1, 1, 1]),
            encode(DynamicImage::ImageRgb8(striped), ImageFormat::Png),
            noise_png(40, 40),
            encode(
                DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([5, 90, 200]))),
                ImageFormat::Jpeg,
            ),
        ];

        for (i, data) in images.iter().enumerate() {
            let id = format!("img-{i}");
            let outcome = app.media.process_embedding(data, &id, 1, Metadata::new()).await;
            assert!(outcome.success, "{id}: {:?}", outcome.reason);
            let record = app.index.fetch(NAMESPACE, &id).await.unwrap().unwrap();
            assert_eq!(record.values.len(), DIM);
        }
    }

    #[tokio::test]
    async fn undecodable_bytes_report_failure() {
        let app = TestApp::spawn().await;
        let outcome = app
            .media
            .process_embedding(b"\x89PNG\r\n\x1a\nbroken", "x", 1, Metadata::new())
            .await;
        assert!(!outcome.success);
        assert!(outcome.reason.is_some());
        assert!(app.index.fetch(NAMESPACE, "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reprocessing_overwrites() {
        let app = TestApp::spawn().await;
        let data = solid_png(6, 6, [10, 200, 10]);
        assert!(app.media.process_embedding(&data, "a", 1, Metadata::new()).await.success);
        let first = app.index.fetch(NAMESPACE, "a").await.unwrap().unwrap();
        assert!(app.media.process_embedding(&data, "a", 1, Metadata::new()).await.success);
        let second = app.index.fetch(NAMESPACE, "a").await.unwrap().unwrap();

        assert_eq!(app.index.len(NAMESPACE), 1);
        assert_eq!(first.values, second.values);
    }

    #[tokio::test]
    async fn reprocess_reads_stored_object() {
        let app = TestApp::spawn().await;
        let stored = app
            .media
            .upload(&solid_png(8, 8, [250, 250, 0]), Some("sun.png"), None, 9, 1)
            .await
            .unwrap();

        let outcome = app
            .media
            .reprocess_embedding(&stored.storage_path, "55", 9, Metadata::new())
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(app.index.fetch(NAMESPACE, "55").await.unwrap().is_some());

        let err = app
            .media
            .reprocess_embedding("tenants/9/images/2024/02/none.png", "56", 9, Metadata::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn delete_image_removes_object_and_vector() {
        let app = TestApp::spawn().await;
        let data = solid_png(8, 8, [3, 3, 200]);
        let stored = app.media.upload(&data, None, None, 1, 1).await.unwrap();
        assert!(app.media.process_embedding(&data, "7", 1, Metadata::new()).await.success);

        assert!(app.media.delete_image(&stored.storage_path, "7").await.unwrap());
        assert!(app.index.fetch(NAMESPACE, "7").await.unwrap().is_none());
        assert!(app.stored_files().is_empty());

        assert!(!app.media.delete_image(&stored.storage_path, "7").await.unwrap());
        assert!(!app.media.search().delete_embedding("7").await.unwrap());
    }
}

mod deferred {
    use super::*;

    struct Forward(mpsc::UnboundedSender<(EmbeddingJob, EmbeddingOutcome)>);

    #[async_trait]
    impl EmbeddingSink for Forward {
        async fn record(&self, job: &EmbeddingJob, outcome: &EmbeddingOutcome) {
            let _ = self.0.send((job.clone(), outcome.clone()));
        }
    }

    #[tokio::test]
    async fn upload_returns_before_embedding_completes() {
        let app = TestApp::spawn().await;
        let TestApp { dir: _dir, media, index } = app;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (media, worker) = media.with_embedding_worker(Arc::new(Forward(tx)));

        let data = solid_png(9, 9, [120, 60, 30]);
        let stored = media.upload(&data, Some("a.png"), None, 4, 2).await.unwrap();
        assert!(!media.access_url(&stored.storage_path).await.is_empty());
        assert!(media.schedule_embedding("img-1", 4, &stored.storage_path, Metadata::new()));
        assert!(media.schedule_embedding(
            "img-2",
            4,
            "tenants/4/images/2024/03/never-written.png",
            Metadata::new()
        ));

        let (job, outcome) = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.image_id, "img-1");
        assert!(outcome.success);
        assert_eq!(outcome.embedding_id.as_deref(), Some("img-1"));

        let (job, outcome) = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.image_id, "img-2");
        assert!(!outcome.success);

        assert!(index.fetch(NAMESPACE, "img-1").await.unwrap().is_some());
        assert!(index.fetch(NAMESPACE, "img-2").await.unwrap().is_none());

        drop(media);
        tokio::time::timeout(Duration::from_secs(10), worker)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn scheduling_without_worker_is_refused() {
        let app = TestApp::spawn().await;
        assert!(!app.media.schedule_embedding(
            "img-1",
            1,
            "tenants/1/images/2024/01/a.png",
            Metadata::new()
        ));
    }
}
