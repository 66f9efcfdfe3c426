//! PDF content extraction.
//!
//! The structured pass decodes page text, applies the chunking policy, and
//! captions embedded images. If it fails the extractor degrades to a plain
//! text pass, and as a last resort emits a single error chunk — callers
//! always receive a non-empty chunk sequence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::Object;
use thiserror::Error;
use tracing::{debug, warn};

use crate::caption::Captioner;
use crate::chunk::{Chunk, ChunkKind, ChunkMetadata};
use crate::chunker;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to decode document text: {0}")]
    TextDecode(String),

    #[error("failed to read document structure: {0}")]
    Structure(String),

    #[error("extraction task failed: {0}")]
    Task(String),
}

pub struct PdfExtractor {
    captioner: Option<Arc<dyn Captioner>>,
}

impl PdfExtractor {
    pub fn new(captioner: Option<Arc<dyn Captioner>>) -> Self {
        Self { captioner }
    }

    /// Extract a document into typed chunks. Never fails and never returns an
    /// empty sequence: structured extraction degrades to plain text
    /// extraction, which degrades to a single error chunk.
    pub async fn extract(&self, pdf_path: &Path, source_filename: &str) -> Vec<Chunk> {
        match self.structured_pass(pdf_path, source_filename).await {
            Ok(chunks) if !chunks.is_empty() => return chunks,
            Ok(_) => {
                warn!(file = source_filename, "structured extraction found no content, trying plain text");
            }
            Err(e) => {
                warn!(file = source_filename, error = %e, "structured extraction failed, trying plain text");
            }
        }

        match self.plain_text_pass(pdf_path, source_filename).await {
            Ok(chunks) if !chunks.is_empty() => chunks,
            Ok(_) => error_chunks(source_filename, "document contained no extractable text"),
            Err(e) => {
                warn!(file = source_filename, error = %e, "plain text extraction failed");
                error_chunks(source_filename, &e.to_string())
            }
        }
    }

    /// Full pass: chunked text and tables plus captioned images. The image
    /// directory is scoped to this call and released on every exit path.
    async fn structured_pass(
        &self,
        pdf_path: &Path,
        source_filename: &str,
    ) -> Result<Vec<Chunk>, ExtractError> {
        let text_path = pdf_path.to_path_buf();
        let drafts = tokio::task::spawn_blocking(move || {
            let text = pdf_extract::extract_text(&text_path)
                .map_err(|e| ExtractError::TextDecode(e.to_string()))?;
            let elements = chunker::classify_elements(&text);
            Ok::<_, ExtractError>(chunker::build_chunks(&elements))
        })
        .await
        .map_err(|e| ExtractError::Task(e.to_string()))??;

        let mut chunks: Vec<(ChunkKind, String, ChunkMetadata)> = drafts
            .into_iter()
            .map(|draft| {
                let metadata = ChunkMetadata {
                    source_filename: source_filename.to_string(),
                    section: draft.section,
                    caption: None,
                };
                (draft.kind, draft.content, metadata)
            })
            .collect();

        chunks.extend(self.image_chunks(pdf_path, source_filename).await);

        Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(i, (kind, content, metadata))| {
                Chunk::new(Chunk::ordinal_id(i), kind, content, metadata)
            })
            .collect())
    }

    /// Export embedded images to a scoped temp directory and caption each.
    /// A failing image is skipped; it never fails the whole pass.
    async fn image_chunks(
        &self,
        pdf_path: &Path,
        source_filename: &str,
    ) -> Vec<(ChunkKind, String, ChunkMetadata)> {
        let Some(captioner) = &self.captioner else {
            return Vec::new();
        };

        let image_dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "could not create image directory, skipping images");
                return Vec::new();
            }
        };

        let export_path = pdf_path.to_path_buf();
        let export_dir = image_dir.path().to_path_buf();
        let image_paths = match tokio::task::spawn_blocking(move || {
            export_embedded_images(&export_path, &export_dir)
        })
        .await
        {
            Ok(Ok(paths)) => paths,
            Ok(Err(e)) => {
                warn!(error = %e, "image export failed, skipping images");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "image export task failed, skipping images");
                return Vec::new();
            }
        };

        let mut chunks = Vec::new();
        for image_path in image_paths {
            let bytes = match tokio::fs::read(&image_path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(image = %image_path.display(), error = %e, "skipping unreadable image");
                    continue;
                }
            };

            match captioner.caption(&bytes).await {
                Ok(caption) => {
                    debug!(image = %image_path.display(), caption, "captioned embedded image");
                    chunks.push((
                        ChunkKind::Image,
                        format!("Image description: {caption}"),
                        ChunkMetadata {
                            source_filename: source_filename.to_string(),
                            section: None,
                            caption: Some(caption),
                        },
                    ));
                }
                Err(e) => {
                    warn!(image = %image_path.display(), error = %e, "skipping image that failed captioning");
                }
            }
        }

        chunks
    }

    /// Degraded pass: paragraphs of decoded text only, no tables or images.
    async fn plain_text_pass(
        &self,
        pdf_path: &Path,
        source_filename: &str,
    ) -> Result<Vec<Chunk>, ExtractError> {
        let path = pdf_path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text(&path).map_err(|e| ExtractError::TextDecode(e.to_string()))
        })
        .await
        .map_err(|e| ExtractError::Task(e.to_string()))??;

        Ok(text
            .split("\n\n")
            .map(str::trim)
            .filter(|paragraph| !paragraph.is_empty())
            .enumerate()
            .map(|(i, paragraph)| {
                Chunk::new(
                    Chunk::ordinal_id(i),
                    ChunkKind::Text,
                    paragraph.to_string(),
                    ChunkMetadata {
                        source_filename: source_filename.to_string(),
                        section: None,
                        caption: None,
                    },
                )
            })
            .collect())
    }
}

fn error_chunks(source_filename: &str, reason: &str) -> Vec<Chunk> {
    vec![Chunk::new(
        Chunk::ordinal_id(0),
        ChunkKind::Error,
        format!("Failed to extract content from PDF: {reason}"),
        ChunkMetadata {
            source_filename: source_filename.to_string(),
            section: None,
            caption: None,
        },
    )]
}

/// Write every DCT-encoded (JPEG) image stream in the document to `out_dir`.
fn export_embedded_images(pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let doc = lopdf::Document::load(pdf_path)
        .map_err(|e| ExtractError::Structure(e.to_string()))?;

    let mut written = Vec::new();
    for (_, object) in doc.objects.iter() {
        let Object::Stream(stream) = object else {
            continue;
        };
        if !is_jpeg_image_stream(stream) {
            continue;
        }

        let image_path = out_dir.join(format!("image-{:04}.jpg", written.len()));
        std::fs::write(&image_path, &stream.content)
            .map_err(|e| ExtractError::Structure(e.to_string()))?;
        written.push(image_path);
    }

    Ok(written)
}

fn is_jpeg_image_stream(stream: &lopdf::Stream) -> bool {
    let is_image = matches!(
        stream.dict.get(b"Subtype"),
        Ok(Object::Name(name)) if name.as_slice() == b"Image"
    );
    if !is_image {
        return false;
    }

    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => name.as_slice() == b"DCTDecode",
        Ok(Object::Array(filters)) => filters
            .iter()
            .any(|f| matches!(f, Object::Name(name) if name.as_slice() == b"DCTDecode")),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::CaptionError;
    use async_trait::async_trait;
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Stream, dictionary};

    struct ScriptedCaptioner {
        caption: String,
    }

    #[async_trait]
    impl Captioner for ScriptedCaptioner {
        async fn caption(&self, _image_bytes: &[u8]) -> Result<String, CaptionError> {
            Ok(self.caption.clone())
        }
    }

    struct FailingCaptioner;

    #[async_trait]
    impl Captioner for FailingCaptioner {
        async fn caption(&self, _image_bytes: &[u8]) -> Result<String, CaptionError> {
            Err(CaptionError::Status(503))
        }
    }

    /// One-page PDF that renders the given text with a base-14 font.
    fn write_test_pdf(path: &Path, text: &str, with_image: bool) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        if with_image {
            doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Filter" => "DCTDecode",
                    "Width" => 1,
                    "Height" => 1,
                },
                vec![0xFF, 0xD8, 0xFF, 0xD9],
            ));
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).expect("save test pdf");
    }

    #[tokio::test]
    async fn garbage_bytes_degrade_to_a_single_error_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf at all").unwrap();

        let extractor = PdfExtractor::new(None);
        let chunks = extractor.extract(&path, "broken.pdf").await;

        assert_eq!(chunks.len(), 1, "caller must always receive chunks");
        assert_eq!(chunks[0].kind, ChunkKind::Error);
        assert!(chunks[0].content.contains("Failed to extract content from PDF"));
    }

    #[tokio::test]
    async fn one_page_pdf_yields_a_text_chunk_with_its_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.pdf");
        write_test_pdf(&path, "Hello World", false);

        let extractor = PdfExtractor::new(None);
        let chunks = extractor.extract(&path, "hello.pdf").await;

        assert!(!chunks.is_empty());
        assert!(
            chunks
                .iter()
                .any(|c| c.kind == ChunkKind::Text && c.content.contains("Hello World")),
            "expected a text chunk containing the page text, got {chunks:?}"
        );
    }

    #[tokio::test]
    async fn embedded_images_become_caption_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figure.pdf");
        write_test_pdf(&path, "A document with a figure", true);

        let captioner = Arc::new(ScriptedCaptioner {
            caption: "a bar chart of quarterly results".to_string(),
        });
        let extractor = PdfExtractor::new(Some(captioner));
        let chunks = extractor.extract(&path, "figure.pdf").await;

        let image = chunks
            .iter()
            .find(|c| c.kind == ChunkKind::Image)
            .expect("image chunk present");
        assert_eq!(
            image.content,
            "Image description: a bar chart of quarterly results"
        );
        assert_eq!(
            image.metadata.caption.as_deref(),
            Some("a bar chart of quarterly results")
        );
    }

    #[tokio::test]
    async fn failing_captions_skip_the_image_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figure.pdf");
        write_test_pdf(&path, "A document with a figure", true);

        let extractor = PdfExtractor::new(Some(Arc::new(FailingCaptioner)));
        let chunks = extractor.extract(&path, "figure.pdf").await;

        assert!(chunks.iter().all(|c| c.kind != ChunkKind::Image));
        assert!(
            chunks.iter().any(|c| c.kind == ChunkKind::Text),
            "text chunks survive a captioning outage"
        );
    }

    #[tokio::test]
    async fn chunk_ids_follow_extraction_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.pdf");
        write_test_pdf(&path, "Hello World", false);

        let extractor = PdfExtractor::new(None);
        let chunks = extractor.extract(&path, "hello.pdf").await;

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, Chunk::ordinal_id(i));
        }
    }
}
