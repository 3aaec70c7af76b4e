use crate::error::RagError;
use crate::models::{Chunk, PageText};
use regex::Regex;
use std::sync::LazyLock;

static HORIZONTAL_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid horizontal whitespace regex"));
static BLANK_LINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

/// Which boundaries the splitter prefers when a window has to be cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Blank line, then line break, then space.
    Paragraph,
    /// Sentence terminator, then line break, then space.
    Sentence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub strategy: SplitStrategy,
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    BlankLine,
    LineBreak,
    SentenceEnd,
    Space,
}

impl SplitStrategy {
    fn boundaries(self) -> &'static [Boundary] {
        match self {
            Self::Paragraph => &[Boundary::BlankLine, Boundary::LineBreak, Boundary::Space],
            Self::Sentence => &[Boundary::SentenceEnd, Boundary::LineBreak, Boundary::Space],
        }
    }
}

impl Boundary {
    /// Whether a chunk may end right before `chars[at]`.
    fn ends_at(self, chars: &[char], at: usize) -> bool {
        let previous = |back: usize| at.checked_sub(back).map(|index| chars[index]);
        match self {
            Self::BlankLine => previous(1) == Some('\n') && previous(2) == Some('\n'),
            Self::LineBreak => previous(1) == Some('\n'),
            Self::SentenceEnd => {
                matches!(previous(2), Some('.' | '?' | '!'))
                    && previous(1).is_some_and(char::is_whitespace)
            }
            Self::Space => previous(1).is_some_and(char::is_whitespace),
        }
    }
}

/// Collapses horizontal whitespace, trims every line and folds runs of blank
/// lines into a single paragraph break.
pub fn normalize_page_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = HORIZONTAL_WHITESPACE.replace_all(&text, " ");
    let lines = collapsed.lines().map(str::trim).collect::<Vec<_>>().join("\n");

    BLANK_LINE_RUNS.replace_all(lines.trim(), "\n\n").into_owned()
}

/// Splits already normalized text into `(start, end)` character spans.
pub fn split_spans(text: &str, config: &ChunkingConfig) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let window_end = (start + config.chunk_size).min(chars.len());
        let end = if window_end == chars.len() {
            window_end
        } else {
            find_break(&chars, start, window_end, config)
        };

        if let Some((span_start, span_end)) = trim_span(&chars, start, end) {
            let covered = spans.last().is_some_and(|&(_, last_end)| span_end <= last_end);
            if !covered {
                spans.push((span_start, span_end));
            }
        }

        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(config.chunk_overlap).max(start + 1);
    }

    spans
}

fn find_break(chars: &[char], start: usize, window_end: usize, config: &ChunkingConfig) -> usize {
    // Never cut so early that the next window would fail to advance.
    let earliest = (start + config.chunk_size / 2).max(start + config.chunk_overlap + 1);

    for boundary in config.strategy.boundaries() {
        if let Some(at) = (earliest..=window_end)
            .rev()
            .find(|&at| boundary.ends_at(chars, at))
        {
            return at;
        }
    }

    window_end
}

fn trim_span(chars: &[char], start: usize, end: usize) -> Option<(usize, usize)> {
    let span = &chars[start..end];
    let leading = span.iter().take_while(|c| c.is_whitespace()).count();
    if leading == span.len() {
        return None;
    }
    let trailing = span.iter().rev().take_while(|c| c.is_whitespace()).count();
    Some((start + leading, end - trailing))
}

/// Turns page texts into chunks. Chunks never span pages and `chunk_index`
/// runs across the whole document.
pub fn split(
    document_id: &str,
    pages: &[PageText],
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, RagError> {
    config.validate()?;

    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for page in pages {
        let normalized = normalize_page_text(&page.text);
        let chars: Vec<char> = normalized.chars().collect();

        for (start, end) in split_spans(&normalized, config) {
            chunks.push(Chunk {
                document_id: document_id.to_string(),
                page: page.number,
                chunk_index: cursor,
                text: chars[start..end].iter().collect(),
                start,
                end,
            });
            cursor = cursor.saturating_add(1);
        }
    }

    Ok(chunks)
}
