use crate::common::{DIM, TestApp, scored, solid_png, unit};
use media::Metadata;

mod text {
    use super::*;

    #[tokio::test]
    async fn drops_matches_below_min_score() {
        let app = TestApp::spawn().await;
        app.put_vector("peak", 1, scored(0.82)).await;
        app.put_vector("invoice", 1, scored(0.3)).await;

        let hits = app
            .media
            .search_by_text("mountain landscape", 1, 10, Some(0.5))
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].image_id, "peak");
        assert!((hits[0].score - 0.82).abs() < 1e-4);
    }

    #[tokio::test]
    async fn results_are_ranked_and_limited() {
        let app = TestApp::spawn().await;
        for (id, score) in [("a", 0.95), ("b", 0.6), ("c", 0.9), ("d", 0.75)] {
            app.put_vector(id, 1, scored(score)).await;
        }

        let hits = app.media.search_by_text("ridge", 1, 3, Some(0.0)).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|m| m.image_id.as_str()).collect();
        assert_eq!(ids, ["a", "c", "d"]);
    }

    #[tokio::test]
    async fn default_threshold_is_applied() {
        let app = TestApp::spawn().await;
        app.put_vector("strong", 1, scored(0.51)).await;
        app.put_vector("weak", 1, scored(0.49)).await;

        let hits = app.media.search_by_text("river", 1, 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].image_id, "strong");
    }

    #[tokio::test]
    async fn out_of_range_parameters_are_client_errors() {
        let app = TestApp::spawn().await;
        for (limit, min_score) in [(0, None), (101, None), (10, Some(-0.1)), (10, Some(1.01))] {
            let err = app
                .media
                .search_by_text("sky", 1, limit, min_score)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
        }
    }
}

mod similar {
    use super::*;

    #[tokio::test]
    async fn excludes_reference_and_other_teams() {
        let app = TestApp::spawn().await;
        let colours = [
            ("ref", 1, [200, 30, 30]),
            ("red", 1, [190, 40, 35]),
            ("green", 1, [30, 200, 30]),
            ("blue", 1, [30, 30, 200]),
            ("their-red", 2, [200, 30, 30]),
            ("their-blue", 2, [30, 30, 200]),
        ];
        for (id, team, rgb) in colours {
            let outcome = app
                .media
                .process_embedding(&solid_png(16, 16, rgb), id, team, Metadata::new())
                .await;
            assert!(outcome.success, "{id}: {:?}", outcome.reason);
        }

        let hits = app.media.search_by_similar_id("ref", 1, 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|m| m.image_id != "ref"));
        assert!(hits.iter().all(|m| m.metadata["team_id"] == "1"));
        assert_eq!(hits[0].image_id, "red");
    }

    #[tokio::test]
    async fn returns_at_most_limit() {
        let app = TestApp::spawn().await;
        app.put_vector("ref", 1, unit(0)).await;
        for i in 0..5 {
            app.put_vector(&format!("n{i}"), 1, scored(0.9 - i as f32 * 0.1)).await;
        }

        let hits = app.media.search_by_similar_id("ref", 1, 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|m| m.image_id.as_str()).collect();
        assert_eq!(ids, ["n0", "n1"]);
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let app = TestApp::spawn().await;
        let err = app.media.search_by_similar_id("nope", 1, 10).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn other_teams_reference_is_not_found() {
        let app = TestApp::spawn().await;
        app.put_vector("secret", 2, unit(3)).await;
        app.put_vector("mine", 1, unit(3)).await;
        let err = app.media.search_by_similar_id("secret", 1, 10).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}

mod image_query {
    use super::*;

    #[tokio::test]
    async fn query_image_need_not_be_stored() {
        let app = TestApp::spawn().await;
        for (id, rgb) in [("warm", [220, 40, 20]), ("cool", [20, 40, 220])] {
            let outcome = app
                .media
                .process_embedding(&solid_png(12, 12, rgb), id, 5, Metadata::new())
                .await;
            assert!(outcome.success);
        }

        let hits = app
            .media
            .search_by_image(&solid_png(20, 20, [220, 40, 20]), 5, 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].image_id, "warm");
        assert!(app.stored_files().is_empty());
    }

    #[tokio::test]
    async fn invalid_query_image_is_rejected() {
        let app = TestApp::spawn().await;
        let err = app
            .media
            .search_by_image(b"GIF89a-but-truncated", 1, 10)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}

mod isolation {
    use super::*;
    use rand::Rng;
    use rand::seq::IndexedRandom;

    fn random_unit(rng: &mut impl Rng) -> Vec<f32> {
        let mut v: Vec<f32> = (0..DIM).map(|_| rng.random_range(-1.0..1.0)).collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        v.iter_mut().for_each(|x| *x /= norm);
        v
    }

    #[tokio::test]
    async fn queries_never_cross_teams() {
        let mut rng = rand::rng();
        for _trial in 0..5 {
            let app = TestApp::spawn().await;
            let teams = [1i64, 2, 3, 4];
            let mut ids = Vec::new();
            for i in 0..60 {
                let team = *teams.choose(&mut rng).unwrap();
                let id = format!("img-{i}");
                app.put_vector(&id, team, random_unit(&mut rng)).await;
                ids.push((id, team));
            }

            for &team in &teams {
                let hits = app.media.search_by_text("anything", team, 100, Some(0.0)).await.unwrap();
                assert!(hits.iter().all(|m| m.metadata["team_id"] == team.to_string()));
                let owned = ids.iter().filter(|(_, t)| *t == team).count();
                assert!(hits.len() <= owned);
            }

            for (id, team) in &ids {
                let hits = app.media.search_by_similar_id(id, *team, 100).await.unwrap();
                let same_team = ids.iter().filter(|(_, t)| t == team).count();
                assert_eq!(hits.len(), same_team - 1);
                assert!(hits.iter().all(|m| &m.image_id != id));
                assert!(
                    hits.iter()
                        .all(|m| m.metadata["team_id"] == team.to_string())
                );
            }
        }
    }
}

mod tags {
    use super::*;
    use media::{TagQuery, TaggedImage};

    #[derive(Debug)]
    struct ImageRow {
        id: i64,
        team_id: i64,
        tags: Vec<String>,
    }

    impl TaggedImage for ImageRow {
        fn team_id(&self) -> i64 {
            self.team_id
        }
        fn tags(&self) -> &[String] {
            &self.tags
        }
    }

    fn row(id: i64, team_id: i64, tags: &[&str]) -> ImageRow {
        ImageRow {
            id,
            team_id,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn tag_search_is_conjunctive_and_scoped() {
        let app = TestApp::spawn().await;
        let rows = vec![
            row(1, 1, &["alps", "winter"]),
            row(2, 1, &["alps"]),
            row(3, 2, &["alps", "winter"]),
            row(4, 1, &["winter", "alps", "ski"]),
        ];

        let found = app
            .media
            .search_by_tags(&rows, 1, &TagQuery::new(["alps", "winter"]))
            .unwrap();
        let ids: Vec<_> = found.iter().map(|r| r.id).collect();
        assert_eq!(ids, [1, 4]);

        let found = app
            .media
            .search_by_tags(&rows, 1, &TagQuery::new(["alps"]).skip(1).limit(1))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);
    }

    #[tokio::test]
    async fn tag_search_requires_tags() {
        let app = TestApp::spawn().await;
        let rows = vec![row(1, 1, &["x"])];
        let err = app
            .media
            .search_by_tags(&rows, 1, &TagQuery::new(Vec::<String>::new()))
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(
            app.media
                .search_by_tags(&rows, 1, &TagQuery::new(["x"]))
                .unwrap()
                .len(),
            1
        );
    }
}
