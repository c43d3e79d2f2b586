//! Document I/O: JSON document files in, JSON document files out.
//!
//! A document file is the serialised [`Document`] tree produced by an
//! upstream extraction run. Page images are referenced by path, relative to
//! the document file, and are decoded on load so the correction pass can crop
//! block images without touching the file system again.
//!
//! Decoding images is CPU-bound, so it runs in `spawn_blocking` rather than
//! on the async worker threads.

use crate::error::RefineError;
use crate::schema::Document;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read, parse and load page images for the document at `path`.
pub async fn load_document(path: impl AsRef<Path>) -> Result<Document, RefineError> {
    let path = path.as_ref().to_path_buf();
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| RefineError::DocumentLoadFailed {
            path: path.clone(),
            source: e,
        })?;

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let doc = parse_document(&bytes, &path, base_dir).await?;
    info!(
        "Loaded document {} ({} pages)",
        path.display(),
        doc.pages.len()
    );
    Ok(doc)
}

/// Parse document JSON and load page images relative to `base_dir`.
///
/// `path` is only used in error messages.
pub async fn parse_document(
    bytes: &[u8],
    path: &Path,
    base_dir: PathBuf,
) -> Result<Document, RefineError> {
    let mut doc: Document =
        serde_json::from_slice(bytes).map_err(|e| RefineError::DocumentParseFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    if doc.filepath.is_none() {
        doc.filepath = Some(path.display().to_string());
    }

    let doc = tokio::task::spawn_blocking(move || {
        doc.load_images(&base_dir)?;
        Ok::<_, RefineError>(doc)
    })
    .await
    .map_err(|e| RefineError::Internal(format!("image loading task failed: {}", e)))??;

    debug!(
        "Parsed document: {} blocks",
        doc.pages.iter().map(|p| p.blocks.len()).sum::<usize>()
    );
    Ok(doc)
}

/// Write `doc` to `path` as pretty JSON.
///
/// Atomic: the JSON goes to a temp file in the target directory which is
/// then persisted over `path`, so readers never see a partial document.
pub async fn save_document(doc: &Document, path: impl AsRef<Path>) -> Result<(), RefineError> {
    let path = path.as_ref().to_path_buf();
    let json = serde_json::to_vec_pretty(doc)
        .map_err(|e| RefineError::Internal(format!("Failed to serialise document: {}", e)))?;

    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RefineError::OutputWriteFailed {
                    path: path.clone(),
                    source: e,
                })?;
            parent.to_path_buf()
        }
        None => PathBuf::from("."),
    };

    let len = json.len();
    let target = path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| RefineError::Internal(format!("write task failed: {}", e)))?
    .map_err(|e| RefineError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    })?;

    debug!("Wrote {} bytes to {}", len, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Block, BlockType, Page, PolygonBox};

    fn sample() -> Document {
        let mut page = Page::new(0, (100.0, 100.0));
        page.add_block(
            Block::new(0, BlockType::Equation, PolygonBox::from_bbox([0.0, 0.0, 10.0, 10.0]))
                .with_text("a + b"),
        );
        Document {
            filepath: None,
            pages: vec![page],
        }
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("doc.json");
        save_document(&sample(), &path).await.unwrap();
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);

        let doc = load_document(&path).await.unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].blocks[0].own_text(), "a + b");
        assert!(doc.filepath.is_some());
    }

    #[tokio::test]
    async fn missing_file_is_load_error() {
        let err = load_document("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, RefineError::DocumentLoadFailed { .. }));
    }

    #[tokio::test]
    async fn bad_json_is_parse_error() {
        let err = parse_document(b"{ not json", Path::new("x.json"), PathBuf::from("."))
            .await
            .unwrap_err();
        assert!(matches!(err, RefineError::DocumentParseFailed { .. }));
    }

    #[tokio::test]
    async fn missing_page_image_is_image_error() {
        let json = r#"{"pages": [{"page_id": 0, "size": [10, 10], "image_path": "nope.png"}]}"#;
        let dir = tempfile::tempdir().unwrap();
        let err = parse_document(json.as_bytes(), Path::new("x.json"), dir.path().to_path_buf())
            .await
            .unwrap_err();
        assert!(matches!(err, RefineError::ImageLoadFailed { .. }));
    }

    #[tokio::test]
    async fn page_images_are_decoded() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::from_pixel(4, 3, image::Rgba([0, 0, 0, 255]))
            .save(dir.path().join("p0.png"))
            .unwrap();
        let json = r#"{"pages": [{"page_id": 0, "size": [4, 3], "image_path": "p0.png"}]}"#;
        let doc = parse_document(json.as_bytes(), Path::new("x.json"), dir.path().to_path_buf())
            .await
            .unwrap();
        let img = doc.pages[0].image.as_ref().unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
    }
}
