//! Chunking policy for extracted document text.
//!
//! Decoded PDF text is classified into elements (section titles, paragraphs,
//! table-like rows) and assembled into bounded chunks: hard cap of
//! [`MAX_CHUNK_CHARS`], a new chunk once [`SOFT_BOUNDARY_CHARS`] is crossed,
//! fragments under [`COMBINE_UNDER_CHARS`] merged with their neighbor, and
//! splits taken preferentially at section-title boundaries.

use crate::chunk::ChunkKind;

/// Hard upper bound on chunk content length, in characters.
pub const MAX_CHUNK_CHARS: usize = 1000;

/// Once a chunk grows past this length it is closed at the next element.
pub const SOFT_BOUNDARY_CHARS: usize = 800;

/// Chunks shorter than this are merged into a compatible neighbor.
pub const COMBINE_UNDER_CHARS: usize = 500;

/// A structural element recognized in the decoded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Title(String),
    Paragraph(String),
    TableRow(String),
}

/// A chunk before ids and source metadata are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub kind: ChunkKind,
    pub section: Option<String>,
    pub content: String,
}

/// Split raw decoded text into structural elements.
///
/// The decoder gives us plain lines, so classification is heuristic: blank
/// lines close paragraphs, short unterminated mostly-capitalized lines are
/// titles, and lines with tab stops or wide space runs are table rows.
pub fn classify_elements(text: &str) -> Vec<Element> {
    fn flush_paragraph(paragraph: &mut String, elements: &mut Vec<Element>) {
        let trimmed = paragraph.trim();
        if !trimmed.is_empty() {
            elements.push(Element::Paragraph(trimmed.to_string()));
        }
        paragraph.clear();
    }

    let mut elements = Vec::new();
    let mut paragraph = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut elements);
        } else if looks_like_table_row(line) {
            flush_paragraph(&mut paragraph, &mut elements);
            elements.push(Element::TableRow(normalize_table_row(trimmed)));
        } else if looks_like_title(trimmed) {
            flush_paragraph(&mut paragraph, &mut elements);
            elements.push(Element::Title(trimmed.to_string()));
        } else {
            if !paragraph.is_empty() {
                paragraph.push(' ');
            }
            paragraph.push_str(trimmed);
        }
    }
    flush_paragraph(&mut paragraph, &mut elements);

    elements
}

/// Assemble elements into bounded chunk drafts.
pub fn build_chunks(elements: &[Element]) -> Vec<ChunkDraft> {
    let mut builder = ChunkBuilder::new();

    for element in elements {
        match element {
            Element::Title(text) => {
                builder.flush();
                builder.section = Some(text.clone());
                builder.append(ChunkKind::Text, text);
            }
            Element::Paragraph(text) => builder.append(ChunkKind::Text, text),
            Element::TableRow(text) => builder.append(ChunkKind::Table, text),
        }
    }
    builder.flush();

    merge_small_chunks(builder.chunks)
}

struct ChunkBuilder {
    chunks: Vec<ChunkDraft>,
    section: Option<String>,
    kind: ChunkKind,
    content: String,
}

impl ChunkBuilder {
    fn new() -> Self {
        Self {
            chunks: Vec::new(),
            section: None,
            kind: ChunkKind::Text,
            content: String::new(),
        }
    }

    fn append(&mut self, kind: ChunkKind, text: &str) {
        if self.kind != kind && !self.content.is_empty() {
            self.flush();
        }
        self.kind = kind;

        let text_len = text.chars().count();
        let current_len = self.content.chars().count();

        if current_len + text_len + 1 > MAX_CHUNK_CHARS {
            self.flush();
            self.kind = kind;
            if text_len > MAX_CHUNK_CHARS {
                for piece in split_oversized(text) {
                    self.chunks.push(ChunkDraft {
                        kind,
                        section: self.section.clone(),
                        content: piece,
                    });
                }
                return;
            }
        }

        if !self.content.is_empty() {
            self.content.push('\n');
        }
        self.content.push_str(text);

        if self.content.chars().count() >= SOFT_BOUNDARY_CHARS {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let trimmed = self.content.trim();
        if !trimmed.is_empty() {
            self.chunks.push(ChunkDraft {
                kind: self.kind,
                section: self.section.clone(),
                content: trimmed.to_string(),
            });
        }
        self.content.clear();
        self.kind = ChunkKind::Text;
    }
}

/// Merge undersized chunks forward into the next chunk when both share a kind
/// and section and the result stays within the hard cap.
fn merge_small_chunks(chunks: Vec<ChunkDraft>) -> Vec<ChunkDraft> {
    let mut merged: Vec<ChunkDraft> = Vec::with_capacity(chunks.len());
    let mut pending: Option<ChunkDraft> = None;

    for chunk in chunks {
        match pending.take() {
            None => pending = Some(chunk),
            Some(mut held) => {
                let held_len = held.content.chars().count();
                let combined = held_len + 1 + chunk.content.chars().count();
                if held_len < COMBINE_UNDER_CHARS
                    && held.kind == chunk.kind
                    && held.section == chunk.section
                    && combined <= MAX_CHUNK_CHARS
                {
                    held.content.push('\n');
                    held.content.push_str(&chunk.content);
                    pending = Some(held);
                } else {
                    merged.push(held);
                    pending = Some(chunk);
                }
            }
        }
    }
    if let Some(held) = pending {
        merged.push(held);
    }

    merged
}

fn split_oversized(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        if current.chars().count() + sentence_len + 1 > MAX_CHUNK_CHARS && !current.is_empty() {
            pieces.push(current.trim().to_string());
            current.clear();
        }
        if sentence_len > MAX_CHUNK_CHARS {
            if !current.is_empty() {
                pieces.push(current.trim().to_string());
                current.clear();
            }
            split_at_words(&sentence, &mut pieces);
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }
    if !current.trim().is_empty() {
        pieces.push(current.trim().to_string());
    }

    pieces
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let terminal = matches!(c, '.' | '!' | '?');
        if terminal && chars.peek().is_none_or(|next| next.is_whitespace()) {
            sentences.push(current.trim().to_string());
            current.clear();
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }

    sentences
}

fn split_at_words(text: &str, pieces: &mut Vec<String>) {
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.chars().count() + word.chars().count() + 1 > MAX_CHUNK_CHARS
            && !current.is_empty()
        {
            pieces.push(current.trim().to_string());
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current.trim().to_string());
    }
}

/// Collapse tab stops and wide space runs into a readable cell separator.
fn normalize_table_row(line: &str) -> String {
    line.split(['\t'])
        .flat_map(|part| part.split("   "))
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn looks_like_table_row(line: &str) -> bool {
    if line.contains('\t') {
        return line.split('\t').filter(|cell| !cell.trim().is_empty()).count() >= 2;
    }
    // Wide space runs between cells survive most PDF text decoders.
    line.trim().split("   ").filter(|cell| !cell.trim().is_empty()).count() >= 3
}

fn looks_like_title(line: &str) -> bool {
    let len = line.chars().count();
    if len == 0 || len > 80 {
        return false;
    }
    if !line.chars().any(|c| c.is_alphabetic()) {
        return false;
    }
    if line.ends_with(['.', '!', '?', ',', ';', ':']) {
        return false;
    }

    let alphabetic: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    let all_caps = alphabetic.iter().all(|c| c.is_uppercase());
    if all_caps {
        return true;
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() > 10 {
        return false;
    }
    let capitalized = words
        .iter()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_uppercase() || c.is_numeric()))
        .count();
    capitalized * 10 >= words.len() * 7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_detected() {
        assert!(looks_like_title("Introduction"));
        assert!(looks_like_title("2. Related Work"));
        assert!(looks_like_title("RESULTS AND DISCUSSION"));
        assert!(!looks_like_title("This is a full sentence that ends with a period."));
        assert!(!looks_like_title("and then we measured the outcome over a long baseline"));
    }

    #[test]
    fn tab_separated_lines_are_table_rows() {
        let elements = classify_elements("Name\tCount\nalpha\t3\n");
        assert_eq!(elements.len(), 2);
        assert!(matches!(elements[0], Element::TableRow(_)));
    }

    #[test]
    fn blank_lines_separate_paragraphs() {
        let elements = classify_elements("first line\nstill first\n\nsecond paragraph\n");
        assert_eq!(
            elements,
            vec![
                Element::Paragraph("first line still first".into()),
                Element::Paragraph("second paragraph".into()),
            ]
        );
    }

    #[test]
    fn chunks_never_exceed_hard_cap() {
        let long = "word ".repeat(600);
        let elements = vec![Element::Paragraph(long.trim().to_string())];
        let chunks = build_chunks(&elements);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= MAX_CHUNK_CHARS);
        }
    }

    #[test]
    fn soft_boundary_closes_growing_chunks() {
        let paragraph = "sentence text ".repeat(20).trim().to_string(); // ~280 chars
        let elements = vec![
            Element::Paragraph(paragraph.clone()),
            Element::Paragraph(paragraph.clone()),
            Element::Paragraph(paragraph.clone()),
            Element::Paragraph(paragraph),
        ];
        let chunks = build_chunks(&elements);
        assert!(chunks.len() >= 2, "four ~280 char paragraphs should not fit one chunk");
    }

    #[test]
    fn title_boundaries_start_new_chunks_and_set_section() {
        let filler = "body text that easily clears the merge threshold. ".repeat(11);
        let elements = vec![
            Element::Title("Introduction".into()),
            Element::Paragraph(filler.trim().to_string()),
            Element::Title("Methods".into()),
            Element::Paragraph(filler.trim().to_string()),
        ];
        let chunks = build_chunks(&elements);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section.as_deref(), Some("Introduction"));
        assert!(chunks[0].content.starts_with("Introduction"));
        assert_eq!(chunks[1].section.as_deref(), Some("Methods"));
    }

    #[test]
    fn small_fragments_merge_forward() {
        let drafts = vec![
            ChunkDraft {
                kind: ChunkKind::Text,
                section: None,
                content: "tiny fragment".into(),
            },
            ChunkDraft {
                kind: ChunkKind::Text,
                section: None,
                content: "another small piece of the same section".into(),
            },
        ];
        let merged = merge_small_chunks(drafts);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].content.contains("tiny fragment"));
        assert!(merged[0].content.contains("another small piece"));
    }

    #[test]
    fn merge_respects_kind_and_cap() {
        let big = "x".repeat(999);
        let drafts = vec![
            ChunkDraft {
                kind: ChunkKind::Text,
                section: None,
                content: "small".into(),
            },
            ChunkDraft {
                kind: ChunkKind::Text,
                section: None,
                content: big,
            },
        ];
        let merged = merge_small_chunks(drafts);
        assert_eq!(merged.len(), 2, "merge must not breach the hard cap");
    }

    #[test]
    fn table_rows_become_table_chunks() {
        let elements = vec![
            Element::Paragraph("some prose first".into()),
            Element::TableRow("name | count".into()),
            Element::TableRow("alpha | 3".into()),
        ];
        let chunks = build_chunks(&elements);
        let kinds: Vec<ChunkKind> = chunks.iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&ChunkKind::Table));
        let table = chunks.iter().find(|c| c.kind == ChunkKind::Table).unwrap();
        assert!(table.content.contains("alpha | 3"));
    }
}
