use ragchat_types::Source;
use serde::{Deserialize, Serialize};

const PREVIEW_CHARS: usize = 500;

/// Display form of one retrieved source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position in retrieval order
    pub index: usize,
    /// e.g. `Source 1 (90.0%)`
    pub label: String,
    pub similarity: f64,
    pub preview: String,
    pub truncated: bool,
}

pub fn citations(sources: &[Source]) -> Vec<Citation> {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let truncated = source.content.chars().count() > PREVIEW_CHARS;
            let preview = if truncated {
                source.content.chars().take(PREVIEW_CHARS).collect()
            } else {
                source.content.clone()
            };

            Citation {
                index: i + 1,
                label: format!("Source {} ({:.1}%)", i + 1, source.similarity * 100.0),
                similarity: source.similarity,
                preview,
                truncated,
            }
        })
        .collect()
}
