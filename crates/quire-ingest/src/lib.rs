//! Quire Ingest
//!
//! Loads the documents a pipeline starts from. Text is extracted page by page;
//! each page is trimmed and pages are separated by a blank line.

mod error;

pub use error::IngestError;

use std::path::{Path, PathBuf};

use futures::future::join_all;
use tracing::{debug, info};

/// An ingested document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
  pub path: PathBuf,
  pub text: String,
}

/// Extract the text of a PDF file.
///
/// Blocking; call from `spawn_blocking` inside async code.
pub fn extract_text(path: impl AsRef<Path>) -> Result<String, IngestError> {
  let path = path.as_ref();
  let pdf_error = |source| IngestError::Pdf {
    path: path.to_path_buf(),
    source,
  };

  let document = lopdf::Document::load(path).map_err(pdf_error)?;

  let mut pages = Vec::new();
  for page_number in document.get_pages().keys() {
    let text = document.extract_text(&[*page_number]).map_err(pdf_error)?;
    pages.push(text.trim().to_string());
  }
  Ok(pages.join("\n\n"))
}

/// PDF files directly inside `dir`, sorted by path.
pub async fn list_documents(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, IngestError> {
  let dir = dir.as_ref();
  let io_error = |source| IngestError::Io {
    path: dir.to_path_buf(),
    source,
  };

  let mut entries = tokio::fs::read_dir(dir).await.map_err(io_error)?;
  let mut paths = Vec::new();
  while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
    let path = entry.path();
    let is_pdf = path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf && entry.file_type().await.map_err(io_error)?.is_file() {
      paths.push(path);
    }
  }
  paths.sort();
  Ok(paths)
}

/// Extract every PDF in `dir` concurrently.
///
/// Documents keep file name order. The first document that cannot be read
/// fails the whole load.
pub async fn load_documents(dir: impl AsRef<Path>) -> Result<Vec<Document>, IngestError> {
  let dir = dir.as_ref();
  let paths = list_documents(dir).await?;

  let handles: Vec<_> = paths
    .iter()
    .cloned()
    .map(|path| tokio::task::spawn_blocking(move || extract_text(&path)))
    .collect();

  let mut documents = Vec::with_capacity(paths.len());
  for (path, joined) in paths.into_iter().zip(join_all(handles).await) {
    let text = joined.map_err(|e| IngestError::Task {
      path: path.clone(),
      message: e.to_string(),
    })??;
    debug!(path = %path.display(), chars = text.len(), "document_extracted");
    documents.push(Document { path, text });
  }

  info!(dir = %dir.display(), documents = documents.len(), "documents_loaded");
  Ok(documents)
}

#[cfg(test)]
mod tests {
  use super::*;
  use lopdf::content::{Content, Operation};
  use lopdf::{Object, Stream, dictionary};

  fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
      "Type" => "Font",
      "Subtype" => "Type1",
      "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
      "Font" => dictionary! {
        "F1" => font_id,
      },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
      let content = Content {
        operations: vec![
          Operation::new("BT", vec![]),
          Operation::new("Tf", vec!["F1".into(), 24.into()]),
          Operation::new("Td", vec![100.into(), 600.into()]),
          Operation::new("Tj", vec![Object::string_literal(*text)]),
          Operation::new("ET", vec![]),
        ],
      };
      let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
      let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
      });
      kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
      pages_id,
      Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
      }),
    );
    let catalog_id = doc.add_object(dictionary! {
      "Type" => "Catalog",
      "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
  }

  #[test]
  fn test_extract_text_joins_pages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two.pdf");
    write_pdf(&path, &["First page", "Second page"]);

    let text = extract_text(&path).unwrap();
    let first = text.find("First page").unwrap();
    let second = text.find("Second page").unwrap();
    assert!(first < second);
    assert!(text[first..second].contains("\n\n"));
    assert_eq!(text, text.trim());
  }

  #[test]
  fn test_extract_text_rejects_non_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fake.pdf");
    std::fs::write(&path, "not a pdf").unwrap();

    assert!(matches!(extract_text(&path), Err(IngestError::Pdf { .. })));
  }

  #[tokio::test]
  async fn test_load_documents_sorted_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("b.pdf"), &["Beta"]);
    write_pdf(&dir.path().join("a.PDF"), &["Alpha"]);
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

    let documents = load_documents(dir.path()).await.unwrap();

    assert_eq!(documents.len(), 2);
    assert!(documents[0].path.ends_with("a.PDF"));
    assert!(documents[0].text.contains("Alpha"));
    assert!(documents[1].text.contains("Beta"));
  }

  #[tokio::test]
  async fn test_load_documents_fails_on_broken_file() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(&dir.path().join("good.pdf"), &["Fine"]);
    std::fs::write(dir.path().join("bad.pdf"), "garbage").unwrap();

    let result = load_documents(dir.path()).await;
    assert!(matches!(result, Err(IngestError::Pdf { path, .. }) if path.ends_with("bad.pdf")));
  }

  #[tokio::test]
  async fn test_load_documents_missing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_documents(dir.path().join("absent")).await;
    assert!(matches!(result, Err(IngestError::Io { .. })));
  }

  #[tokio::test]
  async fn test_load_documents_empty_dir() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_documents(dir.path()).await.unwrap().is_empty());
  }
}
