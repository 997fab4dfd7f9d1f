use std::{env, sync::Once};

use docdex::qdrant::{QdrantService, SearchIndex};
use docdex::{config, embedding};

static INIT: Once = Once::new();

fn default_env(key: &str, value: &str) {
    if env::var(key).is_ok_and(|current| !current.trim().is_empty()) {
        return;
    }
    // SAFETY: Single-threaded inside Once::call_once, before any config read.
    unsafe {
        env::set_var(key, value);
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        default_env("QDRANT_URL", "http://127.0.0.1:6333");
        default_env("QDRANT_COLLECTION_NAME", "docdex-live");
        default_env("EMBEDDING_PROVIDER", "ollama");
        default_env("EMBEDDING_MODEL", "nomic-embed-text");
        default_env("EMBEDDING_DIMENSION", "768");
        default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        config::init_config().expect("live test configuration is complete");
    });
}

#[tokio::test]
#[ignore = "needs a running Qdrant instance"]
async fn live_qdrant_collection_roundtrip() {
    init_config_once();
    let service = QdrantService::new().expect("qdrant client");
    service.ensure_ready().await.expect("collection ready");

    let count = service.document_count().await.expect("count");
    let removed = service.delete_all().await.expect("reset");
    assert_eq!(removed, count, "reset should report the prior record count");
    assert_eq!(service.document_count().await.expect("count"), 0);
}

#[tokio::test]
#[ignore = "needs a running Ollama with the configured embedding model"]
async fn live_ollama_embedding_roundtrip() {
    init_config_once();
    let client = embedding::get_embedding_client();
    let vector = client
        .embed("docdex live embedding")
        .await
        .expect("failed to request an embedding from the provider");
    assert_eq!(vector.len(), config::get_config().embedding_dimension);
}
