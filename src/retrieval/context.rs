//! Turning ranked chunks into prompt context.

use super::DocumentChunk;

/// Which of the ranked chunks make it into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkSelection {
    /// Every fetched chunk.
    #[default]
    All,
    /// All but the least similar chunk. Matches the behaviour of the first
    /// version of the app, where K chunks were fetched and K-1 used.
    DropLeastSimilar,
}

impl ChunkSelection {
    pub fn from_flag(drop_least_similar: bool) -> Self {
        if drop_least_similar {
            ChunkSelection::DropLeastSimilar
        } else {
            ChunkSelection::All
        }
    }

    /// Slice of `chunks` (ranked best first) to use.
    pub fn select<'a>(&self, chunks: &'a [DocumentChunk]) -> &'a [DocumentChunk] {
        match self {
            ChunkSelection::All => chunks,
            ChunkSelection::DropLeastSimilar => &chunks[..chunks.len().saturating_sub(1)],
        }
    }
}

/// Remove single quote characters.
pub fn strip_quotes(text: &str) -> String {
    text.replace('\'', "")
}

/// Concatenate the selected chunks into the context block.
pub fn build_context(chunks: &[DocumentChunk], selection: ChunkSelection) -> String {
    let joined: String = selection
        .select(chunks)
        .iter()
        .map(|c| c.chunk.as_str())
        .collect();
    strip_quotes(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked() -> Vec<DocumentChunk> {
        [("Alpha. ", 0.9), ("Beta's. ", 0.8), ("Gamma.", 0.7)]
            .into_iter()
            .map(|(text, score)| DocumentChunk {
                chunk: text.to_string(),
                relative_path: "manual.pdf".to_string(),
                similarity: score,
            })
            .collect()
    }

    #[test]
    fn test_all_chunks_concatenated() {
        let context = build_context(&ranked(), ChunkSelection::All);
        assert_eq!(context, "Alpha. Betas. Gamma.");
    }

    #[test]
    fn test_drop_least_similar_uses_k_minus_one() {
        let context = build_context(&ranked(), ChunkSelection::DropLeastSimilar);
        assert_eq!(context, "Alpha. Betas. ");
    }

    #[test]
    fn test_selection_on_empty_and_single() {
        let none: Vec<DocumentChunk> = Vec::new();
        assert!(ChunkSelection::DropLeastSimilar.select(&none).is_empty());

        let one = &ranked()[..1];
        assert!(ChunkSelection::DropLeastSimilar.select(one).is_empty());
        assert_eq!(ChunkSelection::All.select(one).len(), 1);
    }

    #[test]
    fn test_from_flag() {
        assert_eq!(ChunkSelection::from_flag(false), ChunkSelection::All);
        assert_eq!(ChunkSelection::from_flag(true), ChunkSelection::DropLeastSimilar);
    }
}
