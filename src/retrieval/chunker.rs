//! Greedy chunk packing over parsed slides (§4.1 "Chunking algorithm").

use crate::models::{Artifact, Slide};

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Soft ceiling on a chunk's character length before it is flushed.
    pub max_chars: usize,
    /// Trailing characters of a flushed chunk repeated at the head of the
    /// next one, so a concept split across the boundary still retrieves.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 2000,
            overlap_chars: 200,
        }
    }
}

struct PendingChunk {
    slide_number: u32,
    slide_title: Option<String>,
    text: String,
}

/// Packs an artifact's slides into chunks, preferring not to split a single
/// slide but falling back to mid-slide splits when a slide alone exceeds
/// `max_chars`. Each slide contributes its title followed by its body
/// (content, then bullets joined one-per-line) as one packable unit.
pub fn chunk_artifact(artifact: &Artifact, config: ChunkingConfig) -> Vec<(u32, Option<String>, String)> {
    let mut chunks: Vec<PendingChunk> = Vec::new();
    let mut current: Option<PendingChunk> = None;

    for slide in &artifact.slides {
        let unit = render_slide(slide);
        if unit.is_empty() {
            continue;
        }
        push_unit(&mut chunks, &mut current, slide, &unit, config);
    }
    if let Some(chunk) = current.take() {
        chunks.push(chunk);
    }

    chunks
        .into_iter()
        .map(|c| (c.slide_number, c.slide_title, c.text))
        .collect()
}

fn render_slide(slide: &Slide) -> String {
    let mut parts = Vec::new();
    if let Some(title) = &slide.title {
        if !title.trim().is_empty() {
            parts.push(title.clone());
        }
    }
    if !slide.content.trim().is_empty() {
        parts.push(slide.content.clone());
    }
    for bullet in &slide.bullets {
        if !bullet.trim().is_empty() {
            parts.push(format!("- {bullet}"));
        }
    }
    parts.join("\n")
}

fn push_unit(
    chunks: &mut Vec<PendingChunk>,
    current: &mut Option<PendingChunk>,
    slide: &Slide,
    unit: &str,
    config: ChunkingConfig,
) {
    if unit.chars().count() > config.max_chars {
        if let Some(chunk) = current.take() {
            chunks.push(chunk);
        }
        for piece in split_oversized(unit, config) {
            chunks.push(PendingChunk {
                slide_number: slide.number,
                slide_title: slide.title.clone(),
                text: piece,
            });
        }
        return;
    }

    match current {
        Some(pending) if pending.text.chars().count() + 1 + unit.chars().count() <= config.max_chars => {
            pending.text.push('\n');
            pending.text.push_str(unit);
        }
        Some(_) => {
            let flushed = current.take().unwrap();
            let overlap = tail_chars(&flushed.text, config.overlap_chars);
            chunks.push(flushed);
            let mut text = overlap;
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(unit);
            *current = Some(PendingChunk {
                slide_number: slide.number,
                slide_title: slide.title.clone(),
                text,
            });
        }
        None => {
            *current = Some(PendingChunk {
                slide_number: slide.number,
                slide_title: slide.title.clone(),
                text: unit.to_string(),
            });
        }
    }
}

/// Splits an oversized unit on whitespace-delimited tokens, packing as many
/// whole tokens as fit in `max_chars` rather than slicing raw char offsets
/// (which used to cut words in half). A token that alone exceeds
/// `max_chars` still falls back to a hard char split of just that token.
fn split_oversized(unit: &str, config: ChunkingConfig) -> Vec<String> {
    let tokens: Vec<&str> = unit.split_whitespace().collect();
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        if tokens[start].chars().count() > config.max_chars {
            pieces.extend(hard_split_token(tokens[start], config));
            start += 1;
            continue;
        }

        let end = pack_window_end(&tokens, start, config.max_chars);
        pieces.push(tokens[start..end].join(" "));
        if end == tokens.len() {
            break;
        }
        start = step_back_for_overlap(&tokens, start, end, config.overlap_chars);
    }
    pieces
}

/// Extends a token window starting at `start` as far as it can go while
/// staying within `max_chars` (tokens joined by a single space).
fn pack_window_end(tokens: &[&str], start: usize, max_chars: usize) -> usize {
    let mut len = 0;
    let mut end = start;
    while end < tokens.len() {
        let add = tokens[end].chars().count() + if end > start { 1 } else { 0 };
        if end > start && len + add > max_chars {
            break;
        }
        len += add;
        end += 1;
    }
    end
}

/// Walks back from `end` toward `start`, accumulating whole tokens until
/// `overlap_chars` worth of trailing text is covered, so the next window
/// starts mid-overlap rather than mid-word. Always leaves the window at
/// least one token shorter than before, so the caller keeps making progress.
fn step_back_for_overlap(tokens: &[&str], start: usize, end: usize, overlap_chars: usize) -> usize {
    let mut len = 0;
    let mut idx = end;
    while idx > start + 1 {
        let candidate = idx - 1;
        let add = tokens[candidate].chars().count() + 1;
        if len + add > overlap_chars {
            break;
        }
        len += add;
        idx = candidate;
    }
    idx
}

/// Raw char-offset split for a single token that alone exceeds `max_chars`
/// (e.g. a long identifier or URL with no internal whitespace).
fn hard_split_token(token: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.max_chars).min(chars.len());
        pieces.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(config.overlap_chars);
    }
    pieces
}

fn tail_chars(text: &str, n: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.len().saturating_sub(n);
    chars[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(number: u32, title: &str, content: &str) -> Slide {
        Slide {
            number,
            title: Some(title.to_string()),
            content: content.to_string(),
            bullets: Vec::new(),
        }
    }

    #[test]
    fn small_slides_pack_together() {
        let artifact = Artifact {
            source_uri: None,
            slides: vec![slide(1, "Intro", "short body"), slide(2, "Scope", "also short")],
        };
        let chunks = chunk_artifact(&artifact, ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn oversized_slide_splits_with_overlap() {
        let long_body = "x".repeat(5000);
        let artifact = Artifact {
            source_uri: None,
            slides: vec![slide(1, "Big", &long_body)],
        };
        let config = ChunkingConfig {
            max_chars: 2000,
            overlap_chars: 200,
        };
        let chunks = chunk_artifact(&artifact, config);
        assert!(chunks.len() > 1);
        for (_, _, text) in &chunks {
            assert!(text.chars().count() <= config.max_chars);
        }
    }

    #[test]
    fn oversized_slide_splits_on_word_boundaries() {
        let long_body = "word ".repeat(1000); // 5000 chars, plenty of whitespace
        let artifact = Artifact {
            source_uri: None,
            slides: vec![slide(1, "Big", &long_body)],
        };
        let config = ChunkingConfig {
            max_chars: 2000,
            overlap_chars: 200,
        };
        let chunks = chunk_artifact(&artifact, config);
        assert!(chunks.len() > 1);
        for (_, _, text) in &chunks {
            assert!(text.chars().count() <= config.max_chars);
            assert!(!text.starts_with("ord"), "split should not land inside a word");
            assert!(!text.ends_with("wor"), "split should not land inside a word");
        }
    }

    #[test]
    fn empty_artifact_yields_no_chunks() {
        let artifact = Artifact::default();
        assert!(chunk_artifact(&artifact, ChunkingConfig::default()).is_empty());
    }
}
