use super::*;
use crate::config::Config;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(control_plane_url: &str) -> Config {
    let mut config = Config::default();
    config.pinecone.control_plane_url = control_plane_url.to_string();
    config
}

fn test_client(server: &MockServer) -> PineconeClient {
    PineconeClient::with_api_key(&test_config(&server.uri()), "test-key")
        .expect("should build client")
}

fn index_description(host: &str) -> serde_json::Value {
    json!({
        "name": "medical-chatbot",
        "host": host,
        "dimension": 384,
        "metric": "cosine"
    })
}

async fn mount_describe(control: &MockServer, host: &str) {
    Mock::given(method("GET"))
        .and(path("/indexes/medical-chatbot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(index_description(host)))
        .mount(control)
        .await;
}

#[test]
fn host_to_url_handling() {
    assert_eq!(
        host_to_url("medical-chatbot-abc123.svc.pinecone.io"),
        "https://medical-chatbot-abc123.svc.pinecone.io"
    );
    assert_eq!(host_to_url("http://127.0.0.1:9000/"), "http://127.0.0.1:9000");
    assert_eq!(host_to_url("https://example.com"), "https://example.com");
}

#[tokio::test]
async fn ensure_index_reuses_existing_index() {
    let control = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes/medical-chatbot"))
        .and(header("Api-Key", "test-key"))
        .and(header("X-Pinecone-Api-Version", API_VERSION))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(index_description("http://127.0.0.1:1")),
        )
        .expect(1)
        .mount(&control)
        .await;

    let client = test_client(&control);
    client.ensure_index().await.expect("first ensure should succeed");
    // The host is cached, so this must not hit the control plane again.
    client.ensure_index().await.expect("second ensure should succeed");
}

#[tokio::test]
async fn ensure_index_creates_missing_index() {
    let control = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes/medical-chatbot"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&control)
        .await;

    Mock::given(method("POST"))
        .and(path("/indexes"))
        .and(body_json(json!({
            "name": "medical-chatbot",
            "dimension": 384,
            "metric": "cosine",
            "spec": { "serverless": { "cloud": "aws", "region": "us-east-1" } }
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(index_description("http://127.0.0.1:1")),
        )
        .expect(1)
        .mount(&control)
        .await;

    let client = test_client(&control);
    client.ensure_index().await.expect("ensure should create the index");
}

#[tokio::test]
async fn create_conflict_falls_back_to_describe() {
    let control = MockServer::start().await;

    // First describe misses, the create hits a race, the second describe wins.
    Mock::given(method("GET"))
        .and(path("/indexes/medical-chatbot"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&control)
        .await;

    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&control)
        .await;

    Mock::given(method("GET"))
        .and(path("/indexes/medical-chatbot"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(index_description("http://127.0.0.1:1")),
        )
        .expect(1)
        .mount(&control)
        .await;

    let client = test_client(&control);
    client.ensure_index().await.expect("conflict should resolve to the existing index");
}

#[tokio::test]
async fn mismatched_dimension_is_an_error() {
    let control = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes/medical-chatbot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "host": "http://127.0.0.1:1",
            "dimension": 768,
            "metric": "cosine"
        })))
        .mount(&control)
        .await;

    let client = test_client(&control);
    let err = client.ensure_index().await.expect_err("dimension mismatch should fail");
    assert!(err.to_string().contains("dimension"));
}

#[tokio::test]
async fn mismatched_metric_is_an_error() {
    let control = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes/medical-chatbot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "host": "http://127.0.0.1:1",
            "dimension": 384,
            "metric": "dotproduct"
        })))
        .mount(&control)
        .await;

    let client = test_client(&control);
    let err = client.ensure_index().await.expect_err("metric mismatch should fail");
    assert!(err.to_string().contains("cosine"));
}

#[tokio::test]
async fn upsert_splits_large_payloads_into_batches() {
    let control = MockServer::start().await;
    let data = MockServer::start().await;
    mount_describe(&control, &data.uri()).await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(header("Api-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 100 })))
        .expect(3)
        .mount(&data)
        .await;

    let entries: Vec<IndexEntry> = (0..250)
        .map(|i| IndexEntry {
            id: format!("chunk-{i}"),
            values: vec![0.0; 384],
            metadata: EntryMetadata {
                text: format!("chunk text {i}"),
                source: "data/drugs.pdf".to_string(),
            },
        })
        .collect();

    let client = test_client(&control);
    let upserted = client.upsert(&entries).await.expect("upsert should succeed");
    assert_eq!(upserted, 250);
}

#[tokio::test]
async fn upsert_with_no_entries_makes_no_requests() {
    let control = MockServer::start().await;
    let client = test_client(&control);

    let upserted = client.upsert(&[]).await.expect("empty upsert should succeed");
    assert_eq!(upserted, 0);
    assert!(control.received_requests().await.expect("requests recorded").is_empty());
}

#[tokio::test]
async fn query_maps_matches_and_drops_missing_metadata() {
    let control = MockServer::start().await;
    let data = MockServer::start().await;
    mount_describe(&control, &data.uri()).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_json(json!({
            "vector": [0.25, 0.5],
            "topK": 2,
            "includeMetadata": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {
                    "id": "m1",
                    "score": 0.9,
                    "metadata": { "text": "Aspirin reduces fever.", "source": "data/drugs.pdf" }
                },
                { "id": "orphan", "score": 0.7 },
                {
                    "id": "m2",
                    "score": 0.5,
                    "metadata": { "text": "Take with food.", "source": "data/drugs.pdf" }
                }
            ]
        })))
        .mount(&data)
        .await;

    let client = test_client(&control);
    let matches = client.query(&[0.25, 0.5], 2).await.expect("query should succeed");

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "m1");
    assert_eq!(matches[0].score, 0.9);
    assert_eq!(matches[0].text, "Aspirin reduces fever.");
    assert_eq!(matches[0].source, "data/drugs.pdf");
    assert_eq!(matches[1].id, "m2");
}

#[tokio::test]
async fn query_against_empty_index_returns_no_matches() {
    let control = MockServer::start().await;
    let data = MockServer::start().await;
    mount_describe(&control, &data.uri()).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&data)
        .await;

    let client = test_client(&control);
    let matches = client.query(&[0.0; 384], 3).await.expect("query should succeed");
    assert!(matches.is_empty());
}

#[tokio::test]
async fn query_error_status_propagates() {
    let control = MockServer::start().await;
    let data = MockServer::start().await;
    mount_describe(&control, &data.uri()).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(500).set_body_string("index exploded"))
        .mount(&data)
        .await;

    let client = test_client(&control);
    let err = client.query(&[0.0; 384], 3).await.expect_err("500 should fail");
    assert!(err.to_string().contains("500"));
    assert!(err.to_string().contains("index exploded"));
}

#[tokio::test]
async fn stats_parses_camel_case_fields() {
    let control = MockServer::start().await;
    let data = MockServer::start().await;
    mount_describe(&control, &data.uri()).await;

    Mock::given(method("POST"))
        .and(path("/describe_index_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalVectorCount": 5842,
            "dimension": 384,
            "namespaces": {}
        })))
        .mount(&data)
        .await;

    let client = test_client(&control);
    let stats = client.stats().await.expect("stats should succeed");
    assert_eq!(
        stats,
        IndexStats {
            total_vector_count: 5842,
            dimension: 384,
        }
    );
}
