//! Token-budgeted semantic chunking.
//!
//! Documents are split with `semchunk-rs` against a per-chunk token budget,
//! then post-processed in two steps: a sliding token overlap stitched in from
//! each chunk's predecessor (`TEXT_SPLITTER_CHUNK_OVERLAP`), and a minimum
//! character length that drops stray headings and separator lines
//! (`TEXT_SPLITTER_MIN_CHUNK_CHARS`). The budget itself comes from
//! `TEXT_SPLITTER_CHUNK_SIZE` when set, otherwise it is derived from the
//! embedding model's context window; `TEXT_SPLITTER_USE_SAFE_DEFAULTS=1`
//! biases the derived size downward for retrieval precision.
//!
//! Token counting prefers a `tiktoken-rs` encoding and degrades to whitespace
//! counting when the model has no known tokenizer, which is common for Ollama
//! model aliases. The offline provider always counts whitespace.

use crate::config::EmbeddingProvider;
use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

use super::types::ChunkingError;

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

const AUTO_CHUNK_FLOOR: usize = 256;
const AUTO_CHUNK_CEILING: usize = 1024;
const FALLBACK_CONTEXT_WINDOW: usize = 4096;

/// Token overlap carried between adjacent chunks when no override is set.
pub(crate) const DEFAULT_CHUNK_OVERLAP: usize = 32;
/// Minimum character length a chunk must keep after trimming when no override is set.
pub(crate) const DEFAULT_MIN_CHUNK_CHARS: usize = 20;

/// Pick the per-chunk token budget.
///
/// An explicit override wins and is only clamped away from zero. Without one,
/// the budget is a quarter of the model's context window (an eighth under safe
/// defaults), kept inside `[256, 1024]` so exotic windows cannot produce
/// degenerate chunks.
pub(crate) fn determine_chunk_size(
    override_size: Option<usize>,
    provider: EmbeddingProvider,
    model: &str,
    use_safe_defaults: bool,
) -> usize {
    match override_size {
        Some(explicit) => explicit.max(1),
        None => {
            let window = context_window(provider, model);
            let share = window / if use_safe_defaults { 8 } else { 4 };
            share.clamp(AUTO_CHUNK_FLOOR, AUTO_CHUNK_CEILING)
        }
    }
}

fn context_window(provider: EmbeddingProvider, model: &str) -> usize {
    if provider != EmbeddingProvider::Ollama {
        return FALLBACK_CONTEXT_WINDOW;
    }
    let model = model.to_lowercase();
    // Prefix matching keeps Ollama tag suffixes like ":latest" working.
    if model.starts_with("nomic-embed-text") || model.starts_with("mxbai-embed-large") {
        8192
    } else if model.contains("all-minilm") {
        512
    } else if model.contains("e5-large") {
        4096
    } else {
        tracing::trace!(%model, "No context window entry for model, assuming 4096 tokens");
        FALLBACK_CONTEXT_WINDOW
    }
}

/// Split `text` into chunks that each fit `chunk_size` tokens.
///
/// `overlap` tokens from the end of each chunk are prepended to its successor,
/// and the stitched result is re-trimmed so the budget still holds. Fragments
/// whose trimmed length falls below `min_chars` characters are discarded.
/// All-whitespace input yields an empty vector rather than an error.
pub(crate) fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    min_chars: usize,
    provider: EmbeddingProvider,
    model: &str,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let counter = token_counter_for(provider, model)?;
    let mut chunks = chunk_with_counter(text, chunk_size, overlap, counter);
    if min_chars > 1 {
        chunks.retain(|chunk| chunk.trim().chars().count() >= min_chars);
    }
    Ok(chunks)
}

fn token_counter_for(
    provider: EmbeddingProvider,
    model: &str,
) -> Result<TokenCounter, ChunkingError> {
    if provider == EmbeddingProvider::Offline {
        return Ok(whitespace_counter());
    }
    tiktoken_counter(model).or_else(|error| {
        tracing::warn!(
            model,
            error = %error,
            "No tokenizer available for model, counting whitespace tokens instead"
        );
        Ok(whitespace_counter())
    })
}

fn tiktoken_counter(model: &str) -> Result<TokenCounter, ChunkingError> {
    let name = match model.trim() {
        "" => "cl100k_base",
        trimmed => trimmed,
    };
    let bpe = lookup_encoding(name).map_err(|source| ChunkingError::Tokenizer {
        model: name.to_string(),
        source,
    })?;
    let bpe = Arc::new(bpe);
    Ok(Arc::new(move |segment: &str| {
        bpe.encode_ordinary(segment).len()
    }))
}

/// Resolve a model name to a BPE, accepting encoding names directly.
fn lookup_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    if let Ok(bpe) = get_bpe_from_model(model) {
        return Ok(bpe);
    }
    match model {
        "cl100k_base" => cl100k_base(),
        "o200k_base" => o200k_base(),
        "p50k_base" => p50k_base(),
        "p50k_edit" => p50k_edit(),
        "r50k_base" | "gpt2" => r50k_base(),
        other => {
            tracing::warn!(model = other, "Unknown encoding, counting with 'cl100k_base'");
            cl100k_base()
        }
    }
}

fn whitespace_counter() -> TokenCounter {
    Arc::new(|segment: &str| match segment.split_whitespace().count() {
        0 if !segment.is_empty() => 1,
        count => count,
    })
}

fn chunk_with_counter(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    counter: TokenCounter,
) -> Vec<String> {
    let splitter_counter = counter.clone();
    let splitter = Chunker::new(
        chunk_size,
        Box::new(move |segment: &str| splitter_counter.as_ref()(segment)),
    );
    weave_overlap(splitter.chunk(text), chunk_size, overlap, &counter)
}

/// Prepend each chunk with the tail of its predecessor.
///
/// The tail always comes from the original neighbor, never from an already
/// overlapped chunk, so carried text cannot compound across the document. The
/// first chunk passes through untouched.
fn weave_overlap(
    chunks: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    counter: &TokenCounter,
) -> Vec<String> {
    let overlap = overlap.min(chunk_size.saturating_sub(1));
    if overlap == 0 || chunks.is_empty() {
        return chunks;
    }

    let mut woven = Vec::with_capacity(chunks.len());
    woven.push(chunks[0].clone());
    for pair in chunks.windows(2) {
        woven.push(stitch_overlap(
            &pair[0], &pair[1], overlap, chunk_size, counter,
        ));
    }
    woven
}

fn stitch_overlap(
    previous: &str,
    current: &str,
    overlap: usize,
    chunk_size: usize,
    counter: &TokenCounter,
) -> String {
    let carried = fitting_suffix(previous, overlap, counter);

    let mut stitched = String::with_capacity(carried.len() + current.len() + 1);
    stitched.push_str(carried);
    if !carried.is_empty()
        && !carried.ends_with(char::is_whitespace)
        && !current.starts_with(char::is_whitespace)
    {
        stitched.push(' ');
    }
    stitched.push_str(current);

    fitting_suffix(&stitched, chunk_size, counter).to_string()
}

/// Longest suffix of `text` that fits the token budget.
///
/// Candidates start at successive char boundaries with leading whitespace
/// stripped; a zero budget or a single over-budget token resolves to the empty
/// string.
fn fitting_suffix<'a>(text: &'a str, budget: usize, counter: &TokenCounter) -> &'a str {
    if budget == 0 {
        return "";
    }
    let starts = std::iter::once(0).chain(text.char_indices().skip(1).map(|(offset, _)| offset));
    for offset in starts {
        let candidate = text[offset..].trim_start();
        if counter.as_ref()(candidate) <= budget {
            return candidate;
        }
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_the_token_budget() {
        let text = "one two three four five";
        let chunks = chunk_with_counter(text, 2, 0, whitespace_counter());
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunks = chunk_with_counter("", 4, 0, whitespace_counter());
        assert!(chunks.is_empty());
    }

    #[test]
    fn overlap_carries_tail_of_previous_chunk() {
        let text = "one two three four five";
        let counter = whitespace_counter();
        let chunks = chunk_with_counter(text, 3, 1, counter.clone());
        assert_eq!(chunks, vec!["one two three", "three four five"]);
        for chunk in &chunks {
            assert!(counter.as_ref()(chunk) <= 3);
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let error = chunk_text("hello", 0, 0, 0, EmbeddingProvider::Offline, "any").unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn short_fragments_are_dropped() {
        let text = "one two three four no";
        let chunks = chunk_text(text, 2, 0, 3, EmbeddingProvider::Offline, "any")
            .expect("chunking succeeded");
        assert_eq!(chunks, vec!["one two", "three four"]);
    }

    #[test]
    fn tiktoken_budget_bounds_every_chunk() {
        let text = "The quick brown fox jumps over the lazy dog.";
        let chunks = chunk_text(text, 5, 0, 0, EmbeddingProvider::Ollama, "cl100k_base")
            .expect("chunking succeeded");

        let counter = tiktoken_counter("cl100k_base").unwrap();
        for chunk in &chunks {
            assert!(counter.as_ref()(chunk) <= 5);
        }

        let chunk_words: Vec<&str> = chunks
            .iter()
            .flat_map(|chunk| chunk.split_whitespace())
            .collect();
        let original_words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(chunk_words, original_words);
    }

    #[test]
    fn override_wins_over_derived_size() {
        let chunk_size =
            determine_chunk_size(Some(42), EmbeddingProvider::Ollama, "nomic-embed-text", false);
        assert_eq!(chunk_size, 42);
    }

    #[test]
    fn known_ollama_models_set_the_window() {
        let large =
            determine_chunk_size(None, EmbeddingProvider::Ollama, "nomic-embed-text", false);
        assert_eq!(large, 1024);

        let tagged = determine_chunk_size(
            None,
            EmbeddingProvider::Ollama,
            "nomic-embed-text:latest",
            false,
        );
        assert_eq!(tagged, 1024);

        let small =
            determine_chunk_size(None, EmbeddingProvider::Ollama, "all-minilm-l6-v2", false);
        assert_eq!(small, 256);
    }

    #[test]
    fn safe_defaults_halve_the_derived_size() {
        let conservative =
            determine_chunk_size(None, EmbeddingProvider::Ollama, "custom-model", true);
        let standard = determine_chunk_size(None, EmbeddingProvider::Ollama, "custom-model", false);

        assert_eq!(standard, 1024);
        assert_eq!(conservative, 512);
    }

    #[test]
    fn offline_provider_counts_whitespace() {
        let text = "one two three four five";
        let chunks = chunk_text(text, 2, 0, 0, EmbeddingProvider::Offline, "ignored")
            .expect("chunking succeeded");
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }
}
