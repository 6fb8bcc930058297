use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use esg_taxonomy::api::{create_router, create_router_with, AppState, ErrorBody, RouterOptions, TaxonomyResponse};
use esg_taxonomy::db::AnswerStore;
use esg_taxonomy::models::*;
use esg_taxonomy::taxonomy::{identity, MemorySource, RowSource, TaxonomyCache};

const KEY: &str = "taxonomy";

fn sample_rows() -> Vec<TaxonomyRow> {
    vec![
        TaxonomyRow::new("1", "Environment", "Emissions", "Total GHG emissions"),
        TaxonomyRow::new("2", "Environment", "Emissions", "Scope 1"),
        TaxonomyRow::new("2", "Environment", "Emissions", "Scope 2"),
        TaxonomyRow::new("1", "Social", "Workforce", "Headcount"),
    ]
}

fn state_with(source: MemorySource) -> AppState {
    let answers = AnswerStore::open_memory().expect("Failed to create store");
    answers.migrate().expect("Failed to migrate");
    let source: Arc<dyn RowSource> = Arc::new(source);
    AppState::new(TaxonomyCache::new(source), answers, KEY)
}

fn setup() -> TestServer {
    let state = state_with(MemorySource::new().with_rows(KEY, sample_rows()));
    TestServer::new(create_router(state)).expect("Failed to create test server")
}

fn setup_with_rows(rows: Vec<TaxonomyRow>) -> TestServer {
    let state = state_with(MemorySource::new().with_rows(KEY, rows));
    TestServer::new(create_router(state)).expect("Failed to create test server")
}

fn scope_1() -> String {
    identity::node_id("Environment", "Emissions", "Scope 1").into_string()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let server = setup();

        let response = server.get("/api/health").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn sets_security_headers() {
        let server = setup();

        let response = server.get("/api/health").await;

        assert_eq!(response.header("x-content-type-options"), "nosniff");
        assert_eq!(response.header("x-frame-options"), "DENY");
    }

    #[tokio::test]
    async fn unknown_routes_return_json_404() {
        let server = setup();

        let response = server.get("/api/nope").await;

        response.assert_status_not_found();
        let body: ErrorBody = response.json();
        assert_eq!(body.status, "error");
        assert_eq!(body.message, "Route not found");
    }
}

mod taxonomy {
    use super::*;

    #[tokio::test]
    async fn returns_the_forest() {
        let server = setup();

        let response = server.get("/api/taxonomy").await;

        response.assert_status_ok();
        let body: TaxonomyResponse = response.json();
        assert_eq!(body.status, "success");
        assert_eq!(body.data.len(), 2);
        assert_eq!(body.data[0].question_label, "Total GHG emissions");
        assert_eq!(body.data[0].children.len(), 2);
        assert_eq!(body.data[0].children[0].id.as_str(), scope_1());
    }

    #[tokio::test]
    async fn serializes_nodes_in_camel_case() {
        let server = setup();

        let body: serde_json::Value = server.get("/api/taxonomy").await.json();

        let root = &body["data"][0];
        assert_eq!(root["questionLabel"], "Total GHG emissions");
        assert_eq!(root["level"], 1);
        assert!(root["topicId"].is_string());
        assert!(root["subtopicId"].is_string());
    }

    #[tokio::test]
    async fn filters_roots_by_topic() {
        let server = setup();
        let topic_id = identity::topic_id("Social");

        let response = server
            .get("/api/taxonomy")
            .add_query_param("topicId", &topic_id)
            .await;

        response.assert_status_ok();
        let body: TaxonomyResponse = response.json();
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0].question_label, "Headcount");
    }

    #[tokio::test]
    async fn filters_roots_by_subtopic() {
        let server = setup();
        let subtopic_id = identity::subtopic_id("Environment", "Emissions");

        let body: TaxonomyResponse = server
            .get("/api/taxonomy")
            .add_query_param("subtopicId", &subtopic_id)
            .await
            .json();

        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0].topic, "Environment");
    }

    #[tokio::test]
    async fn rejects_an_empty_taxonomy() {
        let server = setup_with_rows(Vec::new());

        let response = server.get("/api/taxonomy").await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorBody = response.json();
        assert_eq!(body.code.as_deref(), Some("empty_input"));
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn rejects_a_malformed_level() {
        let server = setup_with_rows(vec![TaxonomyRow::new("one", "E", "Em", "Q")]);

        let response = server.get("/api/taxonomy").await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorBody = response.json();
        assert_eq!(body.code.as_deref(), Some("malformed_row"));
    }

    #[tokio::test]
    async fn exposes_details_when_enabled() {
        let state = state_with(MemorySource::new().with_rows(KEY, Vec::new())).with_error_details(true);
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        let body: ErrorBody = server.get("/api/taxonomy").await.json();

        assert!(body.details.is_some());
    }

    #[tokio::test]
    async fn reports_an_unreadable_source_as_server_error() {
        let server = TestServer::new(create_router(state_with(MemorySource::new())))
            .expect("Failed to create test server");

        let response = server.get("/api/taxonomy").await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = response.json();
        assert_eq!(body.message, "Failed to read taxonomy source");
        assert_eq!(body.code.as_deref(), Some("source_read"));
    }

    #[tokio::test]
    async fn renders_the_tree_with_answer_marks() {
        let server = setup();
        server
            .post("/api/answers")
            .json(&SaveAnswerInput {
                node_id: Some(scope_1()),
                value: Some("120".to_string()),
            })
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.get("/api/taxonomy/tree").await;

        response.assert_status_ok();
        assert_eq!(
            response.text(),
            "○ Total GHG emissions\n├── ● Scope 1\n└── ○ Scope 2\n○ Headcount\n"
        );
    }
}

mod topics {
    use super::*;

    #[tokio::test]
    async fn lists_topics_with_subtopics() {
        let server = setup();

        let response = server.get("/api/topics").await;

        response.assert_status_ok();
        let topics: Vec<TopicSummary> = response.json();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "Environment");
        assert_eq!(topics[0].id, identity::topic_id("Environment"));
        assert_eq!(topics[0].subtopics[0].name, "Emissions");
        assert_eq!(topics[1].name, "Social");
    }
}

mod answers {
    use super::*;

    #[tokio::test]
    async fn saves_and_reads_back_an_answer() {
        let server = setup();

        let response = server
            .post("/api/answers")
            .json(&SaveAnswerInput {
                node_id: Some(scope_1()),
                value: Some("42 tCO2e".to_string()),
            })
            .await;

        response.assert_status(StatusCode::CREATED);
        let saved: SaveAnswerResponse = response.json();
        assert_eq!(saved.message, "Answer saved successfully");
        assert_eq!(saved.answer.value, "42 tCO2e");

        let response = server.get(&format!("/api/answers/{}", scope_1())).await;
        response.assert_status_ok();
        let record: AnswerRecord = response.json();
        assert_eq!(record.node_id, scope_1());
        assert_eq!(record.value, "42 tCO2e");
    }

    #[tokio::test]
    async fn accepts_an_empty_value() {
        let server = setup();

        server
            .post("/api/answers")
            .json(&SaveAnswerInput {
                node_id: Some("n".to_string()),
                value: Some(String::new()),
            })
            .await
            .assert_status(StatusCode::CREATED);

        let record: AnswerRecord = server.get("/api/answers/n").await.json();
        assert_eq!(record.value, "");
    }

    #[tokio::test]
    async fn requires_node_id_and_value() {
        let server = setup();

        for input in [
            SaveAnswerInput { node_id: None, value: Some("v".to_string()) },
            SaveAnswerInput { node_id: Some("n".to_string()), value: None },
            SaveAnswerInput { node_id: Some("  ".to_string()), value: Some("v".to_string()) },
        ] {
            let response = server.post("/api/answers").json(&input).await;

            response.assert_status_bad_request();
            let body: serde_json::Value = response.json();
            assert_eq!(body["error"], "nodeId and value are required");
        }
    }

    #[tokio::test]
    async fn returns_404_for_a_missing_answer() {
        let server = setup();

        let response = server.get("/api/answers/unknown").await;

        response.assert_status_not_found();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Answer not found");
    }

    #[tokio::test]
    async fn saves_and_fetches_in_bulk() {
        let server = setup();
        let answers: BTreeMap<String, String> =
            [("a", "x"), ("b", "y")].into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();

        let response = server
            .post("/api/answers/bulk")
            .json(&SaveAnswersInput { answers: Some(answers.clone()) })
            .await;

        response.assert_status(StatusCode::CREATED);
        let saved: SaveAnswersResponse = response.json();
        assert_eq!(saved.message, "Answers saved successfully");
        assert_eq!(saved.count, 2);

        let response = server
            .get("/api/answers")
            .add_query_param("nodeIds", "a, b,c")
            .await;
        response.assert_status_ok();
        let found: BTreeMap<String, String> = response.json();
        assert_eq!(found, answers);
    }

    #[tokio::test]
    async fn requires_node_ids_for_bulk_fetch() {
        let server = setup();

        for query in ["", "  "] {
            let response = server
                .get("/api/answers")
                .add_query_param("nodeIds", query)
                .await;
            response.assert_status_bad_request();
        }

        let response = server.get("/api/answers").await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "nodeIds query parameter is required");
    }

    #[tokio::test]
    async fn returns_an_empty_map_for_separators_only() {
        let server = setup();
        server
            .post("/api/answers")
            .json(&SaveAnswerInput {
                node_id: Some("a".to_string()),
                value: Some("x".to_string()),
            })
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .get("/api/answers")
            .add_query_param("nodeIds", " , ")
            .await;

        response.assert_status_ok();
        let found: BTreeMap<String, String> = response.json();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn requires_an_answers_object() {
        let server = setup();

        let response = server
            .post("/api/answers/bulk")
            .json(&SaveAnswersInput { answers: None })
            .await;

        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "answers object is required");
    }

    #[tokio::test]
    async fn rejects_blank_ids_in_bulk() {
        let server = setup();
        let answers: BTreeMap<String, String> = [(String::new(), "v".to_string())].into_iter().collect();

        let response = server
            .post("/api/answers/bulk")
            .json(&SaveAnswersInput { answers: Some(answers) })
            .await;

        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "nodeId must not be empty");
    }
}

mod rate_limit {
    use super::*;

    #[tokio::test]
    async fn rejects_requests_over_the_limit() {
        let state = state_with(MemorySource::new().with_rows(KEY, sample_rows()));
        let options = RouterOptions::default().with_rate_limit(2, Duration::from_secs(60));
        let server = TestServer::new(create_router_with(state, options))
            .expect("Failed to create test server");

        server.get("/api/health").await.assert_status_ok();
        server.get("/api/health").await.assert_status_ok();

        let response = server.get("/api/health").await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        let body: ErrorBody = response.json();
        assert_eq!(body.message, "Too many requests, please try again later.");
    }

    #[tokio::test]
    async fn ignores_spoofed_forwarded_headers_by_default() {
        let state = state_with(MemorySource::new().with_rows(KEY, sample_rows()));
        let options = RouterOptions::default().with_rate_limit(2, Duration::from_secs(60));
        let server = TestServer::new(create_router_with(state, options))
            .expect("Failed to create test server");

        for (i, status) in [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
            .into_iter()
            .enumerate()
        {
            let spoofed = format!("203.0.113.{}", i + 1);
            server
                .get("/api/health")
                .add_header(
                    HeaderName::from_static("x-forwarded-for"),
                    HeaderValue::from_str(&spoofed).expect("invalid header"),
                )
                .await
                .assert_status(status);
        }
    }

    #[tokio::test]
    async fn zero_limit_disables_rate_limiting() {
        let state = state_with(MemorySource::new().with_rows(KEY, sample_rows()));
        let options = RouterOptions::default().with_rate_limit(0, Duration::from_secs(60));
        let server = TestServer::new(create_router_with(state, options))
            .expect("Failed to create test server");

        for _ in 0..5 {
            server.get("/api/health").await.assert_status_ok();
        }
    }
}
