//! Uploaded photos and supporting documents.
//!
//! Files are held in the session as a JSON list per kind. The checks here are
//! pure; the malware scan happens in the handler once these have passed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::io::{Limits, Reader};
use image::{ImageError, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

use crate::answers;
use crate::config::{MAX_PHOTO_ALLOC_BYTES, MAX_PHOTO_DIMENSION, MAX_UPLOADS, THUMBNAIL_SIZE};
use crate::flow::Page;

/// Multipart field carrying the file
pub const FILE_FIELD: &str = "files";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
  Photo,
  Document,
}

impl UploadKind {
  pub fn key(self) -> &'static str {
    match self {
      UploadKind::Photo => answers::UPLOAD_PHOTOS,
      UploadKind::Document => answers::UPLOAD_DOCUMENTS,
    }
  }

  pub fn extensions(self) -> &'static [&'static str] {
    match self {
      UploadKind::Photo => &["jpg", "jpeg", "png"],
      UploadKind::Document => &["pdf", "doc", "docx"],
    }
  }

  pub fn upload_page(self) -> Page {
    match self {
      UploadKind::Photo => Page::UploadPhotos,
      UploadKind::Document => Page::UploadDocument,
    }
  }

  pub fn list_page(self) -> Page {
    match self {
      UploadKind::Photo => Page::YourPhotos,
      UploadKind::Document => Page::YourDocuments,
    }
  }

  pub fn noun(self) -> &'static str {
    match self {
      UploadKind::Photo => "photo",
      UploadKind::Document => "document",
    }
  }

  /// `accept` attribute for the file input
  pub fn accept(self) -> String {
    self
      .extensions()
      .iter()
      .map(|e| format!(".{}", e))
      .collect::<Vec<_>>()
      .join(",")
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
  #[error("no file chosen")]
  NoFile,
  #[error("file type not allowed")]
  WrongType,
  #[error("file too large")]
  TooLarge,
  #[error("file already uploaded")]
  Duplicate,
  #[error("file contains a virus")]
  Infected,
  #[error("file could not be read")]
  Unreadable,
  #[error("image dimensions too large")]
  TooManyPixels,
  #[error("malware scan failed")]
  ScanFailed,
}

impl UploadRejection {
  /// Message shown next to the file input
  pub fn message(&self, kind: UploadKind, max_file_size_mb: usize) -> String {
    match (self, kind) {
      (UploadRejection::NoFile, UploadKind::Photo) => "You must choose a photo to upload".into(),
      (UploadRejection::NoFile, UploadKind::Document) => "You must choose a file to upload".into(),
      (UploadRejection::WrongType, UploadKind::Photo) => "The file must be a JPG or PNG".into(),
      (UploadRejection::WrongType, UploadKind::Document) => {
        "The file must be a PDF or Microsoft Word document (.DOC or .DOCX)".into()
      }
      (UploadRejection::TooLarge, _) => {
        format!("The file must be smaller than {}MB", max_file_size_mb)
      }
      (UploadRejection::Duplicate, _) => "You've already uploaded that file. Choose a different one".into(),
      (UploadRejection::Infected, _) => "The selected file contains a virus".into(),
      (UploadRejection::Unreadable, _) => format!("The selected {} could not be read", kind.noun()),
      (UploadRejection::TooManyPixels, _) => format!(
        "The photo must be smaller than {} by {} pixels",
        MAX_PHOTO_DIMENSION, MAX_PHOTO_DIMENSION
      ),
      (UploadRejection::ScanFailed, _) => "The selected file could not be uploaded. Try again".into(),
    }
  }

  /// Short label for analytics
  pub fn label(&self) -> &'static str {
    match self {
      UploadRejection::NoFile => "no file",
      UploadRejection::WrongType => "wrong type",
      UploadRejection::TooLarge => "too large",
      UploadRejection::Duplicate => "duplicate",
      UploadRejection::Infected => "infected",
      UploadRejection::Unreadable => "unreadable",
      UploadRejection::TooManyPixels => "too many pixels",
      UploadRejection::ScanFailed => "scan failed",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
  pub name: String,
  pub size: usize,
  /// Base64 file content
  pub data: String,
  /// Base64 JPEG, photos only
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub thumbnail: Option<String>,
}

/// Everything uploaded so far of one kind, in upload order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uploads {
  pub files: Vec<UploadedFile>,
}

impl Uploads {
  pub fn is_full(&self) -> bool {
    self.files.len() >= MAX_UPLOADS
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  /// Same name and byte size as a stored file
  pub fn contains(&self, name: &str, size: usize) -> bool {
    self.files.iter().any(|f| f.name == name && f.size == size)
  }

  pub fn push(&mut self, file: UploadedFile) {
    self.files.push(file);
  }

  /// Remove by position; out-of-range indexes are ignored
  pub fn remove(&mut self, index: usize) -> Option<UploadedFile> {
    (index < self.files.len()).then(|| self.files.remove(index))
  }
}

/// Lower-cased extension after the last dot
pub fn extension(name: &str) -> Option<String> {
  let (_, ext) = name.rsplit_once('.')?;
  (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Run every check that doesn't need the malware scanner
pub fn check_file(
  kind: UploadKind,
  existing: &Uploads,
  name: &str,
  bytes: &[u8],
  max_bytes: usize,
) -> Result<(), UploadRejection> {
  if name.trim().is_empty() || bytes.is_empty() {
    return Err(UploadRejection::NoFile);
  }
  match extension(name) {
    Some(ext) if kind.extensions().contains(&ext.as_str()) => {}
    _ => return Err(UploadRejection::WrongType),
  }
  if bytes.len() > max_bytes {
    return Err(UploadRejection::TooLarge);
  }
  if existing.contains(name, bytes.len()) {
    return Err(UploadRejection::Duplicate);
  }
  Ok(())
}

pub fn encode(bytes: &[u8]) -> String {
  STANDARD.encode(bytes)
}

fn photo_limits() -> Limits {
  let mut limits = Limits::default();
  limits.max_image_width = Some(MAX_PHOTO_DIMENSION);
  limits.max_image_height = Some(MAX_PHOTO_DIMENSION);
  limits.max_alloc = Some(MAX_PHOTO_ALLOC_BYTES);
  limits
}

/// Scale a photo to fit the thumbnail box and re-encode it as base64 JPEG.
/// Decoding is CPU bound; async callers run this on the blocking pool.
pub fn make_thumbnail(bytes: &[u8]) -> Result<String, ImageError> {
  let mut reader = Reader::new(Cursor::new(bytes)).with_guessed_format()?;
  reader.limits(photo_limits());
  let image = reader.decode()?;
  let thumbnail = image::DynamicImage::ImageRgb8(image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE).to_rgb8());
  let mut out = Cursor::new(Vec::new());
  thumbnail.write_to(&mut out, ImageOutputFormat::Jpeg(80))?;
  Ok(encode(out.get_ref()))
}

/// Build the stored record for an accepted file
pub fn accept(kind: UploadKind, name: &str, bytes: &[u8]) -> Result<UploadedFile, UploadRejection> {
  let thumbnail = match kind {
    UploadKind::Photo => Some(make_thumbnail(bytes).map_err(|e| match e {
      ImageError::Limits(limit) => {
        tracing::info!("Refusing photo {}: {}", name, limit);
        UploadRejection::TooManyPixels
      }
      e => {
        tracing::warn!("Could not make thumbnail for {}: {}", name, e);
        UploadRejection::Unreadable
      }
    })?),
    UploadKind::Document => None,
  };
  Ok(UploadedFile {
    name: name.to_string(),
    size: bytes.len(),
    data: encode(bytes),
    thumbnail,
  })
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
  let image = image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]));
  let mut out = Cursor::new(Vec::new());
  image::DynamicImage::ImageRgb8(image)
    .write_to(&mut out, ImageOutputFormat::Png)
    .unwrap();
  out.into_inner()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stored(name: &str, size: usize) -> UploadedFile {
    UploadedFile {
      name: name.into(),
      size,
      data: String::new(),
      thumbnail: None,
    }
  }

  #[test]
  fn test_extension() {
    assert_eq!(extension("photo.JPG"), Some("jpg".into()));
    assert_eq!(extension("archive.tar.gz"), Some("gz".into()));
    assert_eq!(extension("noext"), None);
    assert_eq!(extension("trailing."), None);
  }

  #[test]
  fn test_check_order() {
    let existing = Uploads {
      files: vec![stored("a.jpg", 3)],
    };
    assert_eq!(check_file(UploadKind::Photo, &existing, "", b"", 10), Err(UploadRejection::NoFile));
    assert_eq!(
      check_file(UploadKind::Photo, &existing, "a.gif", b"abc", 10),
      Err(UploadRejection::WrongType)
    );
    // Wrong type wins over too large
    assert_eq!(
      check_file(UploadKind::Photo, &existing, "a.gif", &[0; 20], 10),
      Err(UploadRejection::WrongType)
    );
    assert_eq!(
      check_file(UploadKind::Photo, &existing, "b.png", &[0; 20], 10),
      Err(UploadRejection::TooLarge)
    );
    assert_eq!(
      check_file(UploadKind::Photo, &existing, "a.jpg", b"abc", 10),
      Err(UploadRejection::Duplicate)
    );
    assert_eq!(check_file(UploadKind::Photo, &existing, "a.jpg", b"abcd", 10), Ok(()));
  }

  #[test]
  fn test_document_extensions() {
    let none = Uploads::default();
    assert!(check_file(UploadKind::Document, &none, "cert.PDF", b"x", 10).is_ok());
    assert!(check_file(UploadKind::Document, &none, "cert.docx", b"x", 10).is_ok());
    assert_eq!(
      check_file(UploadKind::Document, &none, "cert.png", b"x", 10),
      Err(UploadRejection::WrongType)
    );
  }

  #[test]
  fn test_cap() {
    let mut uploads = Uploads::default();
    for i in 0..MAX_UPLOADS {
      assert!(!uploads.is_full());
      uploads.push(stored(&format!("{}.jpg", i), i));
    }
    assert!(uploads.is_full());
  }

  #[test]
  fn test_remove_out_of_range() {
    let mut uploads = Uploads {
      files: vec![stored("a.jpg", 1), stored("b.jpg", 2)],
    };
    assert_eq!(uploads.remove(5), None);
    assert_eq!(uploads.remove(0).unwrap().name, "a.jpg");
    assert_eq!(uploads.files[0].name, "b.jpg");
  }

  #[test]
  fn test_uploads_serialize_as_list() {
    let uploads = Uploads {
      files: vec![stored("a.pdf", 1)],
    };
    let json = serde_json::to_string(&uploads).unwrap();
    assert!(json.starts_with('['));
    assert!(!json.contains("thumbnail"));
  }

  #[test]
  fn test_thumbnail_fits_box() {
    let png = sample_png(1200, 600);
    let encoded = make_thumbnail(&png).unwrap();
    let jpeg = STANDARD.decode(encoded).unwrap();
    let thumb = image::load_from_memory(&jpeg).unwrap();
    assert_eq!(thumb.width(), 400);
    assert_eq!(thumb.height(), 200);
  }

  #[test]
  fn test_accept_photo_rejects_undecodable() {
    assert_eq!(
      accept(UploadKind::Photo, "fake.jpg", b"not an image"),
      Err(UploadRejection::Unreadable)
    );
    let doc = accept(UploadKind::Document, "a.pdf", b"%PDF").unwrap();
    assert_eq!(doc.size, 4);
    assert!(doc.thumbnail.is_none());
  }

  #[test]
  fn test_oversized_photo_is_refused_before_decoding() {
    let wide = sample_png(MAX_PHOTO_DIMENSION + 1, 1);
    assert_eq!(
      accept(UploadKind::Photo, "panorama.png", &wide),
      Err(UploadRejection::TooManyPixels)
    );
    let tall = sample_png(1, MAX_PHOTO_DIMENSION + 1);
    assert!(matches!(make_thumbnail(&tall), Err(ImageError::Limits(_))));
  }

  #[test]
  fn test_messages() {
    assert_eq!(
      UploadRejection::TooLarge.message(UploadKind::Photo, 10),
      "The file must be smaller than 10MB"
    );
    assert!(UploadRejection::Duplicate
      .message(UploadKind::Document, 10)
      .contains("already uploaded"));
  }
}
