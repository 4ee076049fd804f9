//! Context assembly for the generation step.
//!
//! Turns ranked [`RetrievalResult`]s into a context block whose snippets
//! are tagged `[file | chunk:N]` so an answer can cite them, plus the
//! matching source list. Prompt wording and the generation call itself
//! belong to the caller.

use serde::Serialize;

use crate::models::RetrievalResult;

/// One cited source, in ranking order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub file: String,
    pub chunk_id: usize,
    /// Cosine distance to the query; lower is more relevant.
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedContext {
    pub context: String,
    pub sources: Vec<SourceRef>,
}

impl RetrievedContext {
    /// True when nothing was retrieved (typically: no documents indexed yet).
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Tag used to cite a chunk inside the context.
pub fn citation_tag(file: &str, chunk_index: usize) -> String {
    format!("[{} | chunk:{}]", file, chunk_index)
}

/// Join results into tagged snippets separated by blank lines.
///
/// ```rust
/// use docrag::context::build_context;
/// use docrag::models::{ChunkMetadata, RetrievalResult};
///
/// let results = vec![RetrievalResult {
///     text: "Rust has no garbage collector.".to_string(),
///     metadata: ChunkMetadata { source_file: "rust.txt".to_string(), chunk_index: 2 },
///     score: 0.12,
/// }];
/// let ctx = build_context(&results);
/// assert_eq!(ctx.context, "[rust.txt | chunk:2] Rust has no garbage collector.");
/// assert_eq!(ctx.sources[0].chunk_id, 2);
/// ```
pub fn build_context(results: &[RetrievalResult]) -> RetrievedContext {
    let context = results
        .iter()
        .map(|r| {
            format!(
                "{} {}",
                citation_tag(&r.metadata.source_file, r.metadata.chunk_index),
                r.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let sources = results
        .iter()
        .map(|r| SourceRef {
            file: r.metadata.source_file.clone(),
            chunk_id: r.metadata.chunk_index,
            score: r.score,
        })
        .collect();

    RetrievedContext { context, sources }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn result(file: &str, idx: usize, text: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            text: text.to_string(),
            metadata: ChunkMetadata {
                source_file: file.to_string(),
                chunk_index: idx,
            },
            score,
        }
    }

    #[test]
    fn test_empty_results() {
        let ctx = build_context(&[]);
        assert!(ctx.is_empty());
        assert_eq!(ctx.context, "");
    }

    #[test]
    fn test_snippets_joined_in_rank_order() {
        let ctx = build_context(&[
            result("a.pdf", 3, "first", 0.1),
            result("b.txt", 0, "second", 0.4),
        ]);
        assert_eq!(
            ctx.context,
            "[a.pdf | chunk:3] first\n\n[b.txt | chunk:0] second"
        );
        assert_eq!(ctx.sources.len(), 2);
        assert_eq!(ctx.sources[1].file, "b.txt");
        assert_eq!(ctx.sources[1].score, 0.4);
    }

    #[test]
    fn test_serializes_sources() {
        let ctx = build_context(&[result("a.pdf", 1, "x", 0.25)]);
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["sources"][0]["file"], "a.pdf");
        assert_eq!(json["sources"][0]["chunk_id"], 1);
    }
}
