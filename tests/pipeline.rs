//! End-to-end ingestion and retrieval through the public API, using the
//! offline hash embedder and (where persistence matters) a temporary SQLite file.

use std::sync::Arc;
use std::time::Duration;

use docrag::chunk::chunk_text;
use docrag::chunk::ChunkParams;
use docrag::context::build_context;
use docrag::embedding::{EmbeddingProvider, HashProvider};
use docrag::error::RagError;
use docrag::index::VectorIndex;
use docrag::ingest::IngestPipeline;
use docrag::models::{ChunkMetadata, IndexedRecord};
use docrag::retrieve::RetrievalPipeline;
use docrag::store::SqliteRecordStore;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

fn provider(dims: usize) -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashProvider::new(dims).unwrap())
}

/// `len` characters made of distinct 10-char tokens (`t0000000x `, `t0000001x `, ...).
fn filler(len: usize) -> String {
    let mut s = String::new();
    let mut i = 0;
    while s.len() < len {
        s.push_str(&format!("t{:07}x ", i));
        i += 1;
    }
    s.truncate(len);
    s
}

fn pipelines(dims: usize, index: Arc<VectorIndex>) -> (IngestPipeline, RetrievalPipeline) {
    let p = provider(dims);
    (
        IngestPipeline::new(p.clone(), index.clone(), TIMEOUT),
        RetrievalPipeline::new(p, index, TIMEOUT),
    )
}

#[tokio::test]
async fn query_inside_last_window_ranks_third_chunk_first() {
    let doc = filler(2500);
    let index = Arc::new(VectorIndex::in_memory());
    let (ingest, retrieve) = pipelines(1024, index.clone());

    let count = ingest.ingest(&doc, "doc.pdf", 1200, 200).await.unwrap();
    assert_eq!(count, 3);
    assert_eq!(index.len().await, 3);

    let results = retrieve.retrieve(&doc[2100..2150], 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].metadata,
        ChunkMetadata {
            source_file: "doc.pdf".to_string(),
            chunk_index: 2,
        }
    );
    assert_eq!(results[0].text, doc[2000..2500].trim());
}

#[tokio::test]
async fn every_chunk_is_its_own_nearest_neighbour() {
    let index = Arc::new(VectorIndex::in_memory());
    let (ingest, retrieve) = pipelines(512, index);
    let params = ChunkParams::new(300, 50).unwrap();
    let doc = filler(1500);

    ingest
        .ingest_with_params(&doc, "tokens.txt", &params)
        .await
        .unwrap();
    ingest
        .ingest("Kubernetes schedules containers onto nodes.", "k8s.txt", 300, 50)
        .await
        .unwrap();

    for (i, chunk) in chunk_text(&doc, &params).iter().enumerate() {
        let top = retrieve.retrieve(chunk, 1).await.unwrap();
        assert_eq!(top[0].metadata.source_file, "tokens.txt");
        assert_eq!(top[0].metadata.chunk_index, i);
        assert!(top[0].score.abs() < 1e-5, "score was {}", top[0].score);
    }
}

#[tokio::test]
async fn upserting_same_ids_twice_keeps_count() {
    let index = VectorIndex::in_memory();
    let batch = |v: f32| {
        (0..3)
            .map(|i| IndexedRecord {
                id: format!("a.txt__chunk__{}", i),
                vector: vec![v, 1.0],
                text: format!("chunk {}", i),
                metadata: ChunkMetadata {
                    source_file: "a.txt".to_string(),
                    chunk_index: i,
                },
            })
            .collect::<Vec<_>>()
    };
    index.upsert(batch(0.0)).await.unwrap();
    index.upsert(batch(1.0)).await.unwrap();
    assert_eq!(index.len().await, 3);
}

#[tokio::test]
async fn empty_index_yields_empty_context() {
    let (_, retrieve) = pipelines(384, Arc::new(VectorIndex::in_memory()));
    let results = retrieve.retrieve("what is the refund policy?", 4).await.unwrap();
    assert!(results.is_empty());
    assert!(build_context(&results).is_empty());
}

#[tokio::test]
async fn provider_with_other_dims_is_rejected() {
    let index = Arc::new(VectorIndex::in_memory());
    let (ingest, _) = pipelines(64, index.clone());
    ingest
        .ingest("sixty four dimensional vectors", "a.txt", 1200, 200)
        .await
        .unwrap();

    let (wide_ingest, wide_retrieve) = pipelines(128, index.clone());
    let err = wide_ingest
        .ingest("one hundred twenty eight", "b.txt", 1200, 200)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagError::DimensionMismatch {
            expected: 64,
            actual: 128
        }
    ));
    assert!(matches!(
        wide_retrieve.retrieve("vectors", 1).await,
        Err(RagError::DimensionMismatch { .. })
    ));
    assert_eq!(index.len().await, 1);
}

#[tokio::test]
async fn index_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("data/docrag.sqlite");
    let doc = filler(2500);

    {
        let store = Arc::new(SqliteRecordStore::open(&db_path).await.unwrap());
        let index = Arc::new(VectorIndex::open(store.clone()).await.unwrap());
        let (ingest, _) = pipelines(1024, index.clone());
        ingest.ingest(&doc, "doc.pdf", 1200, 200).await.unwrap();
        assert_eq!(index.pending_flush().await, 0);
        store.close().await;
    }

    let store = Arc::new(SqliteRecordStore::open(&db_path).await.unwrap());
    let index = Arc::new(VectorIndex::open(store.clone()).await.unwrap());
    assert_eq!(index.len().await, 3);
    assert_eq!(index.dims().await, Some(1024));

    let (_, retrieve) = pipelines(1024, index);
    let results = retrieve.retrieve(&doc[2100..2150], 1).await.unwrap();
    assert_eq!(results[0].metadata.chunk_index, 2);
    store.close().await;
}

#[tokio::test]
async fn context_cites_sources_in_rank_order() {
    let index = Arc::new(VectorIndex::in_memory());
    let (ingest, retrieve) = pipelines(384, index);
    ingest
        .ingest("Invoices are due within thirty days.", "billing.txt", 1200, 200)
        .await
        .unwrap();
    ingest
        .ingest("The office closes at six.", "office.txt", 1200, 200)
        .await
        .unwrap();

    let results = retrieve.retrieve("when are invoices due", 2).await.unwrap();
    let ctx = build_context(&results);
    assert!(ctx
        .context
        .starts_with("[billing.txt | chunk:0] Invoices are due within thirty days."));
    assert_eq!(ctx.sources[0].file, "billing.txt");
    assert_eq!(ctx.sources.len(), 2);
}
