use rig::Embed;
use serde::{Deserialize, Serialize};

/// What kind of document content a chunk carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChunkKind {
    Text,
    Table,
    Image,
    Error,
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChunkKind::Text => "Text",
            ChunkKind::Table => "Table",
            ChunkKind::Image => "Image",
            ChunkKind::Error => "Error",
        };
        f.write_str(label)
    }
}

/// One unit of extracted document content. Immutable once produced by the
/// extractor; owned by exactly one session.
#[derive(Debug, Clone, Serialize, Deserialize, Embed, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub kind: ChunkKind,
    #[embed]
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub source_filename: String,
    /// Section-title context the chunk was extracted under, when known.
    pub section: Option<String>,
    /// Raw caption text for image chunks.
    pub caption: Option<String>,
}

impl Chunk {
    pub fn new(id: String, kind: ChunkKind, content: String, metadata: ChunkMetadata) -> Self {
        Self {
            id,
            kind,
            content,
            metadata,
        }
    }

    /// Chunk ids are zero-padded ordinals so that lexicographic order matches
    /// extraction order.
    pub fn ordinal_id(index: usize) -> String {
        format!("chunk-{index:04}")
    }
}
