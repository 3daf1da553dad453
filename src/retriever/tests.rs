use super::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/sentence-transformers/all-MiniLM-L6-v2/pipeline/feature-extraction";

struct Harness {
    _embed: MockServer,
    _control: MockServer,
    data: MockServer,
    retriever: Retriever,
}

async fn harness(top_k: usize) -> Harness {
    let embed = MockServer::start().await;
    let control = MockServer::start().await;
    let data = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.1, 0.2, 0.3, 0.4]])))
        .mount(&embed)
        .await;

    Mock::given(method("GET"))
        .and(path("/indexes/medical-chatbot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "host": data.uri(),
            "dimension": 4,
            "metric": "cosine"
        })))
        .mount(&control)
        .await;

    let mut config = Config::default();
    config.embedding.base_url = embed.uri();
    config.embedding.dimension = 4;
    config.pinecone.control_plane_url = control.uri();
    config.retrieval.top_k = top_k;

    let embeddings = EmbeddingClient::new(&config).expect("should build embedding client");
    let index = PineconeClient::with_api_key(&config, "test-key")
        .expect("should build index client");
    let retriever = Retriever::new(&config, embeddings, index);

    Harness {
        _embed: embed,
        _control: control,
        data,
        retriever,
    }
}

#[tokio::test]
async fn retrieve_maps_matches_in_score_order() {
    let harness = harness(2).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {
                    "id": "m1",
                    "score": 0.9,
                    "metadata": { "text": "Aspirin reduces fever.", "source": "data/drugs.pdf" }
                },
                {
                    "id": "m2",
                    "score": 0.4,
                    "metadata": { "text": "Take with food.", "source": "data/dosage.pdf" }
                }
            ]
        })))
        .mount(&harness.data)
        .await;

    let chunks = harness
        .retriever
        .retrieve("does aspirin help with fever?")
        .await
        .expect("retrieve should succeed");

    assert_eq!(
        chunks,
        vec![
            RetrievedChunk {
                content: "Aspirin reduces fever.".to_string(),
                source: "data/drugs.pdf".to_string(),
                score: 0.9,
            },
            RetrievedChunk {
                content: "Take with food.".to_string(),
                source: "data/dosage.pdf".to_string(),
                score: 0.4,
            },
        ]
    );
}

#[tokio::test]
async fn retrieve_from_empty_index_returns_no_chunks() {
    let harness = harness(3).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "matches": [] })))
        .mount(&harness.data)
        .await;

    let chunks = harness
        .retriever
        .retrieve("anything")
        .await
        .expect("retrieve should succeed");
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn retrieve_requests_the_configured_top_k() {
    let harness = harness(5).await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(wiremock::matchers::body_partial_json(json!({ "topK": 5 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "matches": [] })))
        .expect(1)
        .mount(&harness.data)
        .await;

    harness
        .retriever
        .retrieve("anything")
        .await
        .expect("retrieve should succeed");
}
