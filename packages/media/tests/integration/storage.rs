use crate::common::{PLACEHOLDER, TestApp, noise_png, pad_png, solid_png};

mod upload {
    use super::*;
    use common::ImageValidator;
    use image::{DynamicImage, ImageFormat, RgbaImage};

    #[tokio::test]
    async fn stores_png_with_decoded_properties() {
        let app = TestApp::spawn().await;
        let data = pad_png(noise_png(100, 80), 50_000);
        assert_eq!(data.len(), 50_000);

        let stored = app
            .media
            .upload(&data, Some("landscape.png"), Some("image/png"), 4, 11)
            .await
            .unwrap();

        assert_eq!(stored.width, 100);
        assert_eq!(stored.height, 80);
        assert_eq!(stored.size_bytes, 50_000);
        assert_eq!(stored.media_type, "image/png");
        assert_eq!(stored.original_filename.as_deref(), Some("landscape.png"));
        assert!(stored.storage_path.starts_with("tenants/4/images/"));
        assert!(stored.storage_path.ends_with(".png"));

        let url = app.media.access_url(&stored.storage_path).await;
        assert!(!url.is_empty());
        assert_ne!(url, PLACEHOLDER);
        assert!(url.ends_with(&stored.storage_path));
    }

    #[tokio::test]
    async fn declared_type_cannot_contradict_content() {
        let app = TestApp::spawn().await;
        let stored = app
            .media
            .upload(&solid_png(5, 5, [0, 0, 0]), Some("a.gif"), Some("image/gif"), 1, 1)
            .await
            .unwrap();
        assert!(stored.storage_path.ends_with(".png"));
        assert_eq!(stored.media_type, "image/png");
    }

    #[tokio::test]
    async fn stored_bytes_round_trip() {
        let app = TestApp::spawn().await;
        let validator = ImageValidator::new(10 * 1024 * 1024, ["png", "jpg", "gif"]);
        let samples = [
            (
                crate::common::encode(
                    DynamicImage::ImageRgba8(RgbaImage::new(17, 9)),
                    ImageFormat::Png,
                ),
                "image/png",
            ),
            (
                crate::common::encode(
                    DynamicImage::ImageRgb8(image::RgbImage::new(30, 20)),
                    ImageFormat::Jpeg,
                ),
                "image/jpeg",
            ),
            (
                crate::common::encode(
                    DynamicImage::ImageRgba8(RgbaImage::new(5, 3)),
                    ImageFormat::Gif,
                ),
                "image/gif",
            ),
        ];

        for (data, media_type) in samples {
            let expected = validator.validate(&data).unwrap();
            let stored = app.media.upload(&data, None, None, 1, 1).await.unwrap();
            assert_eq!(stored.media_type, media_type);

            let read = app.media.storage().read(&stored.storage_path).await.unwrap();
            assert_eq!(read, data);
            let actual = validator.validate(&read).unwrap();
            assert_eq!((actual.width, actual.height), (expected.width, expected.height));
            assert_eq!(stored.size_bytes, data.len() as u64);
        }
    }

    #[tokio::test]
    async fn oversized_upload_writes_nothing() {
        let app = TestApp::with_max_upload(1024).await;
        let data = noise_png(64, 64);
        assert!(data.len() > 1024);

        let err = app.media.upload(&data, None, None, 1, 1).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("Maximum size"));
        assert!(app.stored_files().is_empty());
    }

    #[tokio::test]
    async fn non_image_upload_cites_format() {
        let app = TestApp::spawn().await;
        for blob in [&b"plain text, not an image"[..], &[0u8; 256][..], b"%PDF-1.7\n"] {
            let err = app.media.upload(blob, Some("x.png"), None, 1, 1).await.unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
            assert!(err.to_string().contains("format"), "{err}");
        }
        assert!(app.stored_files().is_empty());
    }

    #[tokio::test]
    async fn disallowed_format_is_rejected() {
        let app = TestApp::spawn().await;
        let bmp = crate::common::encode(
            DynamicImage::ImageRgb8(image::RgbImage::new(4, 4)),
            ImageFormat::Bmp,
        );
        let err = app.media.upload(&bmp, None, None, 1, 1).await.unwrap_err();
        assert!(err.to_string().contains("Allowed formats"));
        assert!(app.stored_files().is_empty());
    }

    #[tokio::test]
    async fn uploads_never_collide() {
        let app = TestApp::spawn().await;
        let data = solid_png(4, 4, [1, 2, 3]);
        let mut paths = std::collections::HashSet::new();
        for _ in 0..20 {
            let stored = app.media.upload(&data, None, None, 2, 1).await.unwrap();
            assert!(paths.insert(stored.storage_path));
        }
        assert_eq!(app.stored_files().len(), 20);
    }
}

mod access {
    use super::*;

    #[tokio::test]
    async fn missing_object_yields_placeholder() {
        let app = TestApp::spawn().await;
        let url = app
            .media
            .access_url("tenants/1/images/2024/01/gone.png")
            .await;
        assert_eq!(url, PLACEHOLDER);
    }

    #[tokio::test]
    async fn malformed_path_yields_placeholder() {
        let app = TestApp::spawn().await;
        assert_eq!(app.media.access_url("../../etc/passwd").await, PLACEHOLDER);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn delete_is_idempotent() {
        let app = TestApp::spawn().await;
        let stored = app
            .media
            .upload(&solid_png(8, 8, [9, 9, 9]), None, None, 1, 1)
            .await
            .unwrap();

        assert!(app.media.delete(&stored.storage_path).await.unwrap());
        assert!(!app.media.delete(&stored.storage_path).await.unwrap());
        assert!(app.stored_files().is_empty());
        assert_eq!(app.media.access_url(&stored.storage_path).await, PLACEHOLDER);
    }

    #[tokio::test]
    async fn delete_rejects_paths_outside_tenant_tree() {
        let app = TestApp::spawn().await;
        let err = app.media.delete("/etc/passwd").await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
