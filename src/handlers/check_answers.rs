//! Check your answers page.

use askama::Template;
use axum::{extract::State, response::Response};

use crate::answers::{self, role_key, ItemDescription, IvoryAge, IvoryVolume, ADDRESS};
use crate::error::{redirect, render, AppResult};
use crate::flow::{ItemType, Page, Role, Section};
use crate::session::Session;
use crate::state::AppState;
use crate::uploads::{UploadKind, Uploads};

pub struct SummaryRow {
  pub label: String,
  pub value: String,
  pub change: Option<&'static str>,
}

impl SummaryRow {
  fn new(label: impl Into<String>, value: impl Into<String>, change: Page) -> Self {
    Self {
      label: label.into(),
      value: value.into(),
      change: Some(change.path()),
    }
  }
}

pub struct SummaryGroup {
  pub heading: &'static str,
  pub rows: Vec<SummaryRow>,
}

#[derive(Template)]
#[template(path = "check_answers.html")]
pub struct CheckAnswersTemplate {
  pub groups: Vec<SummaryGroup>,
  pub cost: String,
  pub action: &'static str,
}

/// Pence as pounds, e.g. 2000 -> "£20.00"
pub fn format_pence(pence: u32) -> String {
  format!("£{}.{:02}", pence / 100, pence % 100)
}

fn count(n: usize, noun: &str) -> String {
  match n {
    1 => format!("1 {}", noun),
    n => format!("{} {}s", n, noun),
  }
}

async fn item_rows(session: &Session, item_type: ItemType) -> AppResult<Vec<SummaryRow>> {
  let mut rows = vec![SummaryRow::new("Type of exemption", item_type.label(), Page::WhatTypeOfItemIsIt)];

  if let Some(d) = session.get_json::<ItemDescription>(answers::DESCRIBE_ITEM).await? {
    rows.push(SummaryRow::new("What is the item?", d.what_is_item, Page::DescribeTheItem));
    rows.push(SummaryRow::new("Where is the ivory on it?", d.where_is_ivory, Page::DescribeTheItem));
    for (label, value) in [
      ("Distinguishing features", d.distinguishing_features),
      ("Where was it made?", d.where_made),
      ("When was it made?", d.when_made),
    ] {
      if let Some(value) = value {
        rows.push(SummaryRow::new(label, value, Page::DescribeTheItem));
      }
    }
  }

  let photos: Uploads = session.get_json(UploadKind::Photo.key()).await?.unwrap_or_default();
  rows.push(SummaryRow::new("Photos", count(photos.len(), "photo"), Page::YourPhotos));

  if let Some(volume) = session.get_json::<IvoryVolume>(answers::IVORY_VOLUME).await? {
    let value = volume.other_reason.unwrap_or(volume.reason);
    rows.push(SummaryRow::new("How do you know the ivory volume?", value, Page::IvoryVolume));
  }
  if let Some(age) = session.get_json::<IvoryAge>(answers::IVORY_AGE).await? {
    let mut reasons = age.reasons;
    reasons.extend(age.other_reason);
    rows.push(SummaryRow::new("How do you know its age?", reasons.join("; "), Page::IvoryAge));
  }

  if item_type.section() == Section::Two {
    if let Some(why) = session.get(answers::WHY_RMI).await? {
      rows.push(SummaryRow::new("Why is it of outstandingly high value?", why, Page::WhyRmi));
    }
    if let Some(place) = session.get(answers::WHERE_IS_ITEM).await?.filter(|p| !p.is_empty()) {
      rows.push(SummaryRow::new("Where is the item?", place, Page::WhereIsItem));
    }
    if let Some(direction) = session.get(answers::INTO_OUT_OF_GB).await? {
      rows.push(SummaryRow::new("Moving into or out of Great Britain?", direction, Page::IntoOutOfGb));
    }
    let documents: Uploads = session.get_json(UploadKind::Document.key()).await?.unwrap_or_default();
    rows.push(SummaryRow::new("Supporting documents", count(documents.len(), "document"), Page::YourDocuments));
  }

  Ok(rows)
}

async fn person_rows(session: &Session, role: Role) -> AppResult<Vec<SummaryRow>> {
  let mut rows = Vec::new();
  if let Some(details) = answers::contact_details(session, role).await? {
    let contact = Page::ContactDetails(role);
    rows.push(SummaryRow::new("Name", details.name, contact));
    if let Some(business) = details.business_name {
      rows.push(SummaryRow::new("Business name", business, contact));
    }
    if let Some(email) = details.email {
      rows.push(SummaryRow::new("Email address", email, contact));
    }
  }
  if let Some(address) = session.get(&role_key(role, ADDRESS)).await? {
    rows.push(SummaryRow::new("Address", address, Page::AddressFind(role)));
  }
  Ok(rows)
}

pub async fn check_your_answers(State(state): State<AppState>, session: Session) -> AppResult {
  let item_type = answers::item_type(&session).await?;
  let owned = answers::owned_by_applicant(&session).await?;

  let mut groups = vec![SummaryGroup {
    heading: "Item",
    rows: item_rows(&session, item_type).await?,
  }];

  let mut owner_rows = vec![SummaryRow::new(
    "Do you own the item?",
    if owned { "Yes" } else { "No" },
    Page::WhoOwnsTheItem,
  )];
  owner_rows.extend(person_rows(&session, Role::Owner).await?);
  groups.push(SummaryGroup {
    heading: if owned { "Your details" } else { "Owner’s details" },
    rows: owner_rows,
  });
  if !owned {
    groups.push(SummaryGroup {
      heading: "Your details",
      rows: person_rows(&session, Role::Applicant).await?,
    });
  }

  if let Some(intention) = session.get(answers::INTENTION).await? {
    groups.push(SummaryGroup {
      heading: "Sale or hire",
      rows: vec![SummaryRow::new("What will you do with the item?", intention, Page::IntentionForItem)],
    });
  }

  render(&CheckAnswersTemplate {
    groups,
    cost: format_pence(state.config.payment.amount_for(item_type.section())),
    action: Page::CheckYourAnswers.path(),
  })
}

pub async fn check_your_answers_post() -> Response {
  redirect(Page::MakePayment.path())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::TestApp;
  use axum::http::StatusCode;

  #[test]
  fn test_format_pence() {
    assert_eq!(format_pence(2000), "£20.00");
    assert_eq!(format_pence(25_005), "£250.05");
    assert_eq!(format_pence(99), "£0.99");
  }

  #[tokio::test]
  async fn test_needs_earlier_answers() {
    let app = TestApp::new();
    let response = app.get("/check-your-answers").await;
    assert_eq!(TestApp::location(&response), "/");
  }

  #[tokio::test]
  async fn test_summarises_answers_with_cost() {
    let app = TestApp::new();
    app
      .seed(&[
        ("itemType", "musical"),
        ("ownedByApplicant", "No"),
        ("describeItem", r#"{"whatIsItem":"Violin","whereIsIvory":"Bow tip"}"#),
        ("owner.contactDetails", r#"{"name":"Olive Owner"}"#),
        ("applicant.contactDetails", r#"{"name":"Andy Agent","email":"andy@example.com"}"#),
        ("applicant.address", "1 High Street, Bristol, BS1 5AH"),
        ("intentionForItem", "Hire it out"),
      ])
      .await;

    let response = app.get("/check-your-answers").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("Violin"));
    assert!(body.contains("Olive Owner"));
    assert!(body.contains("andy@example.com"));
    assert!(body.contains("Hire it out"));
    assert!(body.contains("£20.00"));
    assert!(body.contains("href=\"/describe-the-item\""));
    // Section 2 only
    assert!(!body.contains("Supporting documents"));
  }

  #[tokio::test]
  async fn test_high_value_items_cost_more() {
    let app = TestApp::new();
    app.seed(&[("itemType", "high-value"), ("ownedByApplicant", "Yes")]).await;
    let body = app.get("/check-your-answers").await.text();
    assert!(body.contains("£250.00"));
    assert!(body.contains("Supporting documents"));
  }

  #[tokio::test]
  async fn test_continue_goes_to_payment() {
    let app = TestApp::new();
    let response = app.post("/check-your-answers", &[]).await;
    assert_eq!(TestApp::location(&response), "/make-payment");
  }
}
