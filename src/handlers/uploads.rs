//! Photo and document upload pages.

use askama::Template;
use axum::{
  extract::{multipart::MultipartError, Multipart, Path, State},
  http::StatusCode,
  response::Response,
};

use crate::analytics::EventType;
use crate::answers;
use crate::error::{redirect, render, render_with_status, AppResult};
use crate::flow::{self, Page};
use crate::session::Session;
use crate::state::AppState;
use crate::uploads::{self, UploadKind, UploadRejection, Uploads, FILE_FIELD};
use crate::validation::ErrorSummary;

#[derive(Template)]
#[template(path = "upload.html")]
pub struct UploadTemplate {
  pub title: &'static str,
  pub hint: String,
  pub action: &'static str,
  pub accept: String,
  pub uploaded: usize,
  /// Link to carry on without uploading (documents are optional)
  pub skip: Option<&'static str>,
  pub errors: ErrorSummary,
}

pub struct FileRow {
  pub index: usize,
  pub name: String,
  /// `data:` URI for the photo thumbnail
  pub thumbnail: Option<String>,
}

#[derive(Template)]
#[template(path = "upload_list.html")]
pub struct UploadListTemplate {
  pub title: &'static str,
  pub action: &'static str,
  pub files: Vec<FileRow>,
  pub remove_prefix: &'static str,
  /// Shown while more files may be added
  pub add_more: Option<&'static str>,
  pub add_label: &'static str,
  pub errors: ErrorSummary,
}

fn upload_view(kind: UploadKind, config: &crate::config::UploadConfig, uploaded: usize) -> UploadTemplate {
  let (title, hint) = match kind {
    UploadKind::Photo => (
      "Add a photo of your item",
      format!(
        "The photo must be a JPG or PNG file smaller than {}MB. Show the whole item and any ivory clearly.",
        config.max_file_size_mb
      ),
    ),
    UploadKind::Document => (
      "Add a document to support your application",
      format!(
        "The file must be a PDF or Microsoft Word document smaller than {}MB.",
        config.max_file_size_mb
      ),
    ),
  };
  UploadTemplate {
    title,
    hint,
    action: kind.upload_page().path(),
    accept: kind.accept(),
    uploaded,
    skip: match kind {
      UploadKind::Photo => None,
      UploadKind::Document => Some(kind.list_page().path()),
    },
    errors: ErrorSummary::new(),
  }
}

fn list_view(kind: UploadKind, uploads: &Uploads) -> UploadListTemplate {
  let files = uploads
    .files
    .iter()
    .enumerate()
    .map(|(index, file)| FileRow {
      index,
      name: file.name.clone(),
      thumbnail: file
        .thumbnail
        .as_ref()
        .map(|t| format!("data:image/jpeg;base64,{}", t)),
    })
    .collect();
  let (title, remove_prefix, add_label) = match kind {
    UploadKind::Photo => ("Your photos", "/remove-photo", "Add another photo"),
    UploadKind::Document => ("Your documents", "/remove-document", "Add another document"),
  };
  UploadListTemplate {
    title,
    action: kind.list_page().path(),
    files,
    remove_prefix,
    add_more: (!uploads.is_full()).then(|| kind.upload_page().path()),
    add_label,
    errors: ErrorSummary::new(),
  }
}

async fn load(session: &Session, kind: UploadKind) -> AppResult<Uploads> {
  Ok(session.get_json(kind.key()).await?.unwrap_or_default())
}

// ============================================================================
// Upload pages
// ============================================================================

async fn show_upload(kind: UploadKind, state: &AppState, session: &Session) -> AppResult {
  let stored = load(session, kind).await?;
  if stored.is_full() {
    return Ok(redirect(kind.list_page().path()));
  }
  render(&upload_view(kind, &state.config.upload, stored.len()))
}

/// Pull the file field out of the request
async fn read_file(multipart: &mut Multipart) -> Result<Option<(String, Vec<u8>)>, MultipartError> {
  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some(FILE_FIELD) {
      continue;
    }
    let name = field.file_name().unwrap_or_default().to_string();
    let bytes = field.bytes().await?;
    return Ok(Some((name, bytes.to_vec())));
  }
  Ok(None)
}

async fn receive_upload(
  kind: UploadKind,
  state: &AppState,
  session: &Session,
  multipart: &mut Multipart,
  stored: &Uploads,
) -> Result<uploads::UploadedFile, UploadRejection> {
  let (name, bytes) = match read_file(multipart).await {
    Ok(Some(file)) => file,
    Ok(None) => return Err(UploadRejection::NoFile),
    Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => return Err(UploadRejection::TooLarge),
    Err(e) => {
      tracing::warn!("Unreadable upload body: {}", e);
      return Err(UploadRejection::NoFile);
    }
  };

  uploads::check_file(kind, stored, &name, &bytes, state.config.upload.max_file_bytes())?;

  match state.scanner.is_infected(&name, &bytes).await {
    Ok(false) => {}
    Ok(true) => return Err(UploadRejection::Infected),
    Err(e) => {
      tracing::error!("Malware scan failed for {} in session {}: {}", name, session.id(), e);
      return Err(UploadRejection::ScanFailed);
    }
  }

  // Thumbnailing decodes the whole image; keep it off the async workers
  tokio::task::spawn_blocking(move || uploads::accept(kind, &name, &bytes))
    .await
    .unwrap_or_else(|e| {
      tracing::error!("Upload processing task failed: {}", e);
      Err(UploadRejection::Unreadable)
    })
}

async fn submit_upload(kind: UploadKind, state: &AppState, session: &Session, mut multipart: Multipart) -> AppResult {
  let mut stored = load(session, kind).await?;
  if stored.is_full() {
    return Ok(redirect(kind.list_page().path()));
  }

  match receive_upload(kind, state, session, &mut multipart, &stored).await {
    Ok(file) => {
      tracing::debug!("Accepted {} {} ({} bytes)", kind.noun(), file.name, file.size);
      stored.push(file);
      session.set_json(kind.key(), &stored).await?;
      Ok(redirect(kind.list_page().path()))
    }
    Err(rejection) => {
      state.analytics.track(
        session.id(),
        EventType::UploadRejected {
          kind: kind.noun().into(),
          reason: rejection.label().into(),
        },
      );
      let mut template = upload_view(kind, &state.config.upload, stored.len());
      template.errors = ErrorSummary::single(
        FILE_FIELD,
        &rejection.message(kind, state.config.upload.max_file_size_mb),
      );
      render_with_status(StatusCode::BAD_REQUEST, &template)
    }
  }
}

pub async fn upload_photos(State(state): State<AppState>, session: Session) -> AppResult {
  show_upload(UploadKind::Photo, &state, &session).await
}

pub async fn upload_photos_post(State(state): State<AppState>, session: Session, multipart: Multipart) -> AppResult {
  submit_upload(UploadKind::Photo, &state, &session, multipart).await
}

pub async fn upload_document(State(state): State<AppState>, session: Session) -> AppResult {
  show_upload(UploadKind::Document, &state, &session).await
}

pub async fn upload_document_post(State(state): State<AppState>, session: Session, multipart: Multipart) -> AppResult {
  submit_upload(UploadKind::Document, &state, &session, multipart).await
}

// ============================================================================
// List pages
// ============================================================================

pub async fn your_photos(session: Session) -> AppResult {
  let stored = load(&session, UploadKind::Photo).await?;
  if stored.is_empty() {
    return Ok(redirect(Page::UploadPhotos.path()));
  }
  render(&list_view(UploadKind::Photo, &stored))
}

pub async fn your_photos_post(session: Session) -> AppResult {
  let stored = load(&session, UploadKind::Photo).await?;
  if stored.is_empty() {
    let mut template = list_view(UploadKind::Photo, &stored);
    template.errors = ErrorSummary::single(FILE_FIELD, "You must add a photo of your item");
    return render_with_status(StatusCode::BAD_REQUEST, &template);
  }
  let item_type = answers::item_type(&session).await?;
  Ok(redirect(flow::after_photos(item_type).path()))
}

pub async fn your_documents(session: Session) -> AppResult {
  let stored = load(&session, UploadKind::Document).await?;
  render(&list_view(UploadKind::Document, &stored))
}

pub async fn your_documents_post() -> Response {
  redirect(Page::WhoOwnsTheItem.path())
}

async fn remove(kind: UploadKind, session: &Session, index: usize) -> AppResult {
  let mut stored = load(session, kind).await?;
  if let Some(file) = stored.remove(index) {
    tracing::debug!("Removed {} {}", kind.noun(), file.name);
    session.set_json(kind.key(), &stored).await?;
  }
  Ok(redirect(kind.list_page().path()))
}

pub async fn remove_photo(session: Session, Path(index): Path<usize>) -> AppResult {
  remove(UploadKind::Photo, &session, index).await
}

pub async fn remove_document(session: Session, Path(index): Path<usize>) -> AppResult {
  remove(UploadKind::Document, &session, index).await
}

#[cfg(test)]
mod tests {
  use crate::answers;
  use crate::testing::TestApp;
  use crate::uploads::{sample_png, Uploads};
  use axum::http::StatusCode;

  async fn stored(app: &TestApp, key: &str) -> Uploads {
    app
      .answer(key)
      .await
      .map(|raw| serde_json::from_str(&raw).unwrap())
      .unwrap_or_default()
  }

  #[tokio::test]
  async fn test_photo_upload_is_stored_with_thumbnail() {
    let app = TestApp::new();
    let response = app.upload("/upload-photos", "item.png", sample_png(800, 800)).await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(TestApp::location(&response), "/your-photos");

    let photos = stored(&app, answers::UPLOAD_PHOTOS).await;
    assert_eq!(photos.len(), 1);
    assert_eq!(photos.files[0].name, "item.png");
    assert!(photos.files[0].thumbnail.is_some());

    let body = app.get("/your-photos").await.text();
    assert!(body.contains("item.png"));
    assert!(body.contains("data:image/jpeg;base64,"));
  }

  #[tokio::test]
  async fn test_duplicate_is_rejected() {
    let app = TestApp::new();
    let png = sample_png(10, 10);
    app.upload("/upload-photos", "item.png", png.clone()).await;
    let response = app.upload("/upload-photos", "item.png", png).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("already uploaded"));
    assert_eq!(stored(&app, answers::UPLOAD_PHOTOS).await.len(), 1);
  }

  #[tokio::test]
  async fn test_wrong_extension_is_rejected() {
    let app = TestApp::new();
    let response = app.upload("/upload-photos", "item.gif", sample_png(10, 10)).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("The file must be a JPG or PNG"));
  }

  #[tokio::test]
  async fn test_missing_file_is_rejected() {
    let app = TestApp::new();
    let response = app.upload("/upload-photos", "", Vec::new()).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("You must choose a photo to upload"));
  }

  #[tokio::test]
  async fn test_too_large_is_rejected() {
    let app = TestApp::new();
    let big = vec![0u8; 1024 * 1024 + 1];
    let response = app.upload("/upload-document", "big.pdf", big).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("smaller than 1MB"));
  }

  #[tokio::test]
  async fn test_body_over_route_limit_is_rejected() {
    let app = TestApp::new();
    let huge = vec![0u8; 3 * 1024 * 1024];
    let response = app.upload("/upload-document", "huge.pdf", huge).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("smaller than 1MB"));
    assert_eq!(app.get("/upload-document").await.status_code(), StatusCode::OK);
  }

  #[tokio::test]
  async fn test_photo_with_huge_dimensions_is_rejected() {
    let app = TestApp::new();
    let response = app.upload("/upload-photos", "strip.png", sample_png(8_001, 1)).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("smaller than 8000 by 8000 pixels"));
    assert!(stored(&app, answers::UPLOAD_PHOTOS).await.is_empty());
  }

  #[tokio::test]
  async fn test_infected_file_is_rejected() {
    let app = TestApp::new();
    app.scanner.set_infected(true);
    let response = app.upload("/upload-document", "cert.pdf", b"%PDF-1.4".to_vec()).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("contains a virus"));
    assert!(stored(&app, answers::UPLOAD_DOCUMENTS).await.is_empty());
    assert_eq!(app.events().len(), 1);
  }

  #[tokio::test]
  async fn test_seventh_upload_redirects_to_list() {
    let app = TestApp::new();
    for i in 0..6 {
      let response = app
        .upload("/upload-document", &format!("doc{}.pdf", i), b"%PDF".to_vec())
        .await;
      assert_eq!(response.status_code(), StatusCode::FOUND);
    }
    let response = app.upload("/upload-document", "doc6.pdf", b"%PDF".to_vec()).await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(TestApp::location(&response), "/your-documents");
    assert_eq!(stored(&app, answers::UPLOAD_DOCUMENTS).await.len(), 6);

    let response = app.get("/upload-document").await;
    assert_eq!(TestApp::location(&response), "/your-documents");
  }

  #[tokio::test]
  async fn test_remove_photo() {
    let app = TestApp::new();
    app.upload("/upload-photos", "a.png", sample_png(5, 5)).await;
    app.upload("/upload-photos", "b.png", sample_png(6, 6)).await;

    let response = app.post("/remove-photo/0", &[]).await;
    assert_eq!(TestApp::location(&response), "/your-photos");
    let photos = stored(&app, answers::UPLOAD_PHOTOS).await;
    assert_eq!(photos.len(), 1);
    assert_eq!(photos.files[0].name, "b.png");

    // Out of range is ignored
    app.post("/remove-photo/9", &[]).await;
    assert_eq!(stored(&app, answers::UPLOAD_PHOTOS).await.len(), 1);
  }

  #[tokio::test]
  async fn test_empty_photo_list_goes_back_to_upload() {
    let app = TestApp::new();
    let response = app.get("/your-photos").await;
    assert_eq!(TestApp::location(&response), "/upload-photos");

    let response = app.post("/your-photos", &[]).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn test_your_photos_continues_by_item_type() {
    let app = TestApp::new();
    app.upload("/upload-photos", "a.png", sample_png(5, 5)).await;
    let cases = [
      ("musical", "/ivory-volume"),
      ("ten-percent", "/ivory-volume"),
      ("miniature", "/ivory-age"),
      ("high-value", "/ivory-age"),
      ("museum", "/who-owns-the-item"),
    ];
    for (item_type, expected) in cases {
      app.seed(&[("itemType", item_type)]).await;
      let response = app.post("/your-photos", &[]).await;
      assert_eq!(TestApp::location(&response), expected, "{}", item_type);
    }
  }

  #[tokio::test]
  async fn test_documents_are_optional() {
    let app = TestApp::new();
    assert_eq!(app.get("/your-documents").await.status_code(), StatusCode::OK);
    let response = app.post("/your-documents", &[]).await;
    assert_eq!(TestApp::location(&response), "/who-owns-the-item");
  }
}
