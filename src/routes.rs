//! Route table.

use axum::{
  extract::{DefaultBodyLimit, State},
  handler::Handler,
  http::StatusCode,
  middleware,
  routing::{get, post},
  Form, Router,
};
use std::collections::HashMap;
use std::time::Duration;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::error;
use crate::flow::QUESTIONS;
use crate::handlers::{self, address, check_answers, contact, item, payment, questions, uploads};
use crate::paths;
use crate::session::{ensure_session_cookie, Session};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
  let upload = &state.config.upload;
  let body_limit = DefaultBodyLimit::max(upload.body_limit());
  let upload_timeout = TimeoutLayer::with_status_code(
    StatusCode::REQUEST_TIMEOUT,
    Duration::from_millis(upload.timeout_ms),
  );

  let mut app = Router::new()
    .route("/", get(handlers::index))
    .route("/eligibility-checker/do-not-need-service", get(handlers::do_not_need_service))
    .route("/eligibility-checker/cannot-trade", get(handlers::cannot_trade))
    .route("/eligibility-checker/cannot-continue", get(handlers::cannot_continue))
    .route("/can-continue", get(handlers::can_continue))
    .route(
      "/legal-responsibility",
      get(handlers::legal_responsibility).post(handlers::legal_responsibility_post),
    )
    // Item
    .route("/describe-the-item", get(item::describe_the_item).post(item::describe_the_item_post))
    .route("/ivory-volume", get(item::ivory_volume).post(item::ivory_volume_post))
    .route("/ivory-age", get(item::ivory_age).post(item::ivory_age_post))
    .route("/why-rmi", get(item::why_rmi).post(item::why_rmi_post))
    .route("/where-is-item", get(item::where_is_item).post(item::where_is_item_post))
    // Uploads: body limit and timeout cover the multipart POSTs only
    .route(
      "/upload-photos",
      get(uploads::upload_photos).post(
        uploads::upload_photos_post
          .layer(body_limit)
          .layer(upload_timeout.clone()),
      ),
    )
    .route("/your-photos", get(uploads::your_photos).post(uploads::your_photos_post))
    .route("/remove-photo/{index}", post(uploads::remove_photo))
    .route(
      "/upload-document",
      get(uploads::upload_document).post(
        uploads::upload_document_post
          .layer(body_limit)
          .layer(upload_timeout),
      ),
    )
    .route("/your-documents", get(uploads::your_documents).post(uploads::your_documents_post))
    .route("/remove-document/{index}", post(uploads::remove_document))
    // Owner and applicant
    .route(
      "/user-details/{role}/contact-details",
      get(contact::contact_details).post(contact::contact_details_post),
    )
    .route(
      "/user-details/{role}/address-find",
      get(address::address_find).post(address::address_find_post),
    )
    .route(
      "/user-details/{role}/address-choose",
      get(address::address_choose).post(address::address_choose_post),
    )
    .route(
      "/user-details/{role}/address-confirm",
      get(address::address_confirm).post(address::address_confirm_post),
    )
    .route(
      "/user-details/{role}/address-enter",
      get(address::address_enter).post(address::address_enter_post),
    )
    .route(
      "/user-details/{role}/address-international",
      get(address::address_international).post(address::address_international_post),
    )
    // Submission
    .route(
      "/check-your-answers",
      get(check_answers::check_your_answers).post(check_answers::check_your_answers_post),
    )
    .route("/make-payment", get(payment::make_payment))
    .route("/service-complete", get(payment::service_complete));

  // Every single-answer radio page comes from the question table
  for question in QUESTIONS {
    app = app.route(
      question.page.path(),
      get(move |session: Session| questions::show(question, session)).post(
        move |State(state): State<AppState>, session: Session, Form(form): Form<HashMap<String, String>>| {
          questions::submit(question, state, session, form)
        },
      ),
    );
  }

  app
    .nest_service("/assets", ServeDir::new(paths::assets_dir()))
    .fallback(error::not_found)
    .layer(middleware::from_fn_with_state(state.clone(), ensure_session_cookie))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
