//! Vector store contract suite.
//!
//! One set of assertions for every `VectorStoreProvider`: upsert
//! idempotence, descending order with id tiebreak, the threshold floor,
//! AND filters, limit, and no-op deletes. The in-memory store runs it
//! always; the SQL backend runs the same suite when a live database is
//! available, which is what keeps the backends equivalent.

use holocron_domain::ports::VectorStoreProvider;
use holocron_domain::{Embedding, MetadataFilter, VectorRecord};
use holocron_providers::InMemoryVectorStore;
use holocron_providers::vector_store::{PgVectorConfig, PgVectorProvider};
use serde_json::json;

const DIMS: usize = 4;

fn record(id: &str, values: [f32; DIMS], canonicity: &str) -> VectorRecord {
    let mut metadata = serde_json::Map::new();
    metadata.insert("content".to_owned(), json!(format!("passage {id}")));
    metadata.insert("canonicity".to_owned(), json!(canonicity));
    metadata.insert("title".to_owned(), json!(id));
    VectorRecord {
        id: id.to_owned(),
        values: Embedding::new(values.to_vec()).normalized().vector,
        metadata,
    }
}

fn corpus() -> Vec<VectorRecord> {
    vec![
        record("bright_0", [1.0, 0.0, 0.0, 0.0], "canon"),
        record("close_0", [0.9, 0.436, 0.0, 0.0], "canon"),
        record("side_0", [0.5, 0.866, 0.0, 0.0], "legends"),
        record("far_0", [0.0, 0.0, 1.0, 0.0], "canon"),
    ]
}

async fn run_contract(store: &dyn VectorStoreProvider) {
    let records = corpus();
    store
        .upsert(&records, 2)
        .await
        .unwrap_or_else(|e| panic!("upsert: {e}"));
    // Idempotence: a second upsert of the same ids changes nothing.
    store
        .upsert(&records, 2)
        .await
        .unwrap_or_else(|e| panic!("re-upsert: {e}"));

    let query = [1.0, 0.0, 0.0, 0.0];

    // Ordering and the threshold floor.
    let results = store
        .search(&query, 10, 0.3, None)
        .await
        .unwrap_or_else(|e| panic!("search: {e}"));
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["bright_0", "close_0", "side_0"]);
    assert!(results.iter().all(|r| r.similarity >= 0.3));
    assert!(
        results
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity)
    );
    assert!(results[0].content.contains("bright_0"));

    // Limit is a hard cap.
    let top_two = store
        .search(&query, 2, 0.0, None)
        .await
        .unwrap_or_else(|e| panic!("limited search: {e}"));
    assert_eq!(top_two.len(), 2);
    assert_eq!(top_two[0].id, "bright_0");

    // AND filters.
    let filter = MetadataFilter::new().with_field("canonicity", "legends");
    let filtered = store
        .search(&query, 10, 0.0, Some(&filter))
        .await
        .unwrap_or_else(|e| panic!("filtered search: {e}"));
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, "side_0");

    // Deleting unknown ids is a no-op; deleting known ids removes them.
    store
        .delete(&["ghost_0".to_owned()])
        .await
        .unwrap_or_else(|e| panic!("noop delete: {e}"));
    store
        .delete(&["bright_0".to_owned()])
        .await
        .unwrap_or_else(|e| panic!("delete: {e}"));
    let after = store
        .search(&query, 10, 0.0, None)
        .await
        .unwrap_or_else(|e| panic!("post-delete search: {e}"));
    assert!(after.iter().all(|r| r.id != "bright_0"));
}

#[tokio::test]
async fn memory_store_satisfies_the_contract() {
    let store = InMemoryVectorStore::new(DIMS);
    run_contract(&store).await;
}

#[tokio::test]
#[ignore = "requires Postgres with the pgvector extension"]
async fn pgvector_store_satisfies_the_contract() {
    let url = std::env::var("HOLOCRON_TEST_DATABASE_URL")
        .unwrap_or_else(|_| panic!("HOLOCRON_TEST_DATABASE_URL not set"));
    let store = PgVectorProvider::connect(PgVectorConfig {
        database_url: url,
        table: "holocron_contract_suite".to_owned(),
        dimensions: DIMS,
    })
    .await
    .unwrap_or_else(|e| panic!("connect: {e}"));
    store
        .ensure_schema()
        .await
        .unwrap_or_else(|e| panic!("schema: {e}"));
    // Start from a clean slate so ordering assertions hold.
    store
        .delete(&corpus().iter().map(|r| r.id.clone()).collect::<Vec<_>>())
        .await
        .unwrap_or_else(|e| panic!("cleanup: {e}"));
    run_contract(&store).await;
}
