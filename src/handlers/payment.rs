//! Payment hand-off and the completion page.

use askama::Template;
use axum::extract::State;
use std::collections::BTreeMap;

use crate::analytics::EventType;
use crate::answers::{self, EMAILS_SENT, PAYMENT_COMPLETE, PAYMENT_ID, PAYMENT_REFERENCE};
use crate::error::{redirect, render, AppError, AppResult, LogOnError};
use crate::flow::{self, ItemType, Page, PaymentOutcome, Role, Section};
use crate::services::payment::generate_reference;
use crate::services::{Email, NewPayment};
use crate::session::Session;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "service_complete.html")]
pub struct ServiceCompleteTemplate {
  pub reference: String,
  pub certificate: bool,
  pub email: Option<String>,
}

fn description(section: Section) -> &'static str {
  match section {
    Section::Two => "Ivory exemption certificate application",
    Section::Ten => "Ivory item registration",
  }
}

pub async fn make_payment(State(state): State<AppState>, session: Session) -> AppResult {
  if session.get(PAYMENT_COMPLETE).await?.is_some() {
    return Ok(redirect(Page::ServiceComplete.path()));
  }

  let item_type = answers::item_type(&session).await?;
  let applicant = answers::applicant_contact_details(&session).await?;
  let amount = state.config.payment.amount_for(item_type.section());
  let reference = generate_reference();

  let created = state
    .payments
    .create_payment(&NewPayment {
      amount,
      reference: reference.clone(),
      description: description(item_type.section()).to_string(),
      return_url: state.config.payment_return_url(),
      email: applicant.and_then(|a| a.email),
    })
    .await?;

  session
    .set_many(&[
      (PAYMENT_ID, created.payment_id.clone()),
      (PAYMENT_REFERENCE, reference.clone()),
    ])
    .await?;
  state
    .analytics
    .track(session.id(), EventType::PaymentCreated { reference, amount });

  Ok(redirect(&created.next_url))
}

pub async fn service_complete(State(state): State<AppState>, session: Session) -> AppResult {
  let reference = session
    .get(PAYMENT_REFERENCE)
    .await?
    .ok_or(AppError::MissingAnswer(PAYMENT_REFERENCE))?;

  // Refreshing the page after a successful payment
  if session.get(PAYMENT_COMPLETE).await?.is_none() {
    let payment_id = session
      .get(PAYMENT_ID)
      .await?
      .ok_or(AppError::MissingAnswer(PAYMENT_ID))?;
    let payment = state.payments.lookup_payment(&payment_id).await?;
    tracing::info!(
      "Payment {} ({}) returned with status {}",
      payment_id,
      reference,
      payment.status
    );
    state.analytics.track(
      session.id(),
      EventType::PaymentOutcome {
        status: payment.status.clone(),
        code: payment.code.clone(),
      },
    );

    if let PaymentOutcome::Redirect(page) = flow::payment_outcome(&payment.status, payment.code.as_deref()) {
      return Ok(redirect(page.path()));
    }

    let item_type = answers::item_type(&session).await?;
    session.set(PAYMENT_COMPLETE, "true").await?;
    send_confirmation_emails(&state, &session, item_type, &reference).await?;
    state.analytics.track(
      session.id(),
      EventType::ApplicationSubmitted {
        item_type: item_type.code().to_string(),
        reference: reference.clone(),
      },
    );
  }

  let item_type = answers::item_type(&session).await?;
  let applicant = answers::applicant_contact_details(&session).await?;
  render(&ServiceCompleteTemplate {
    reference,
    certificate: item_type.section() == Section::Two,
    email: applicant.and_then(|a| a.email),
  })
}

/// Email the applicant, and the owner if someone else applied for them.
/// Runs once per session; delivery failures are only logged.
async fn send_confirmation_emails(
  state: &AppState,
  session: &Session,
  item_type: ItemType,
  reference: &str,
) -> AppResult<()> {
  if session.get(EMAILS_SENT).await?.is_some() {
    return Ok(());
  }
  session.set(EMAILS_SENT, "true").await?;

  let templates = &state.config.notify.templates;
  let section = item_type.section();
  let (applicant_template, owner_template) = match section {
    Section::Two => (&templates.applicant_section_2, &templates.owner_section_2),
    Section::Ten => (&templates.applicant_section_10, &templates.owner_section_10),
  };

  let owned = answers::owned_by_applicant(session).await?;
  let mut recipients = Vec::new();
  if let Some(applicant) = answers::applicant_contact_details(session).await? {
    recipients.push((applicant_template, applicant));
  }
  if !owned {
    if let Some(owner) = answers::contact_details(session, Role::Owner).await? {
      recipients.push((owner_template, owner));
    }
  }

  for (template_id, person) in recipients {
    let Some(address) = person.email else {
      continue;
    };
    if template_id.is_empty() {
      tracing::debug!("No email template configured for {:?}, skipping", section);
      continue;
    }
    let personalisation = BTreeMap::from([
      ("fullName".to_string(), person.name),
      ("exemptionType".to_string(), item_type.label().to_string()),
      ("submissionReference".to_string(), reference.to_string()),
    ]);
    state
      .notifier
      .send_email(&Email {
        template_id: template_id.clone(),
        email_address: address,
        personalisation,
        reference: reference.to_string(),
      })
      .await
      .log_warn("Confirmation email failed");
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use crate::analytics::EventType;
  use crate::testing::TestApp;
  use axum::http::StatusCode;

  const APPLICANT: &str = r#"{"name":"Andy Agent","email":"andy@example.com"}"#;
  const OWNER: &str = r#"{"name":"Olive Owner","email":"olive@example.com"}"#;

  async fn ready_to_pay(owned: &str) -> TestApp {
    let app = TestApp::new();
    app
      .seed(&[
        ("itemType", "musical"),
        ("ownedByApplicant", owned),
        ("owner.contactDetails", OWNER),
        ("applicant.contactDetails", APPLICANT),
      ])
      .await;
    app
  }

  #[tokio::test]
  async fn test_make_payment_creates_and_redirects() {
    let app = ready_to_pay("No").await;
    let response = app.get("/make-payment").await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(TestApp::location(&response), "https://pay.example/next/pay-1");

    let created = app.payments.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].amount, 2_000);
    assert_eq!(created[0].email.as_deref(), Some("andy@example.com"));
    assert!(created[0].return_url.ends_with("/service-complete"));

    assert_eq!(app.answer("paymentId").await.as_deref(), Some("pay-1"));
    assert_eq!(app.answer("paymentReference").await, Some(created[0].reference.clone()));
  }

  #[tokio::test]
  async fn test_paid_session_skips_payment() {
    let app = ready_to_pay("Yes").await;
    app.seed(&[("paymentComplete", "true")]).await;
    let response = app.get("/make-payment").await;
    assert_eq!(TestApp::location(&response), "/service-complete");
    assert!(app.payments.created().is_empty());
  }

  #[tokio::test]
  async fn test_unsuccessful_payments_redirect() {
    let cases = [
      ("failed", Some("P0030"), "/check-your-answers"),
      ("failed", Some("P0010"), "/make-payment"),
      ("error", None, "/check-your-answers"),
      ("started", None, "/check-your-answers"),
    ];
    for (status, code, expected) in cases {
      let app = ready_to_pay("Yes").await;
      app.get("/make-payment").await;
      app.payments.set_state(status, code);
      let response = app.get("/service-complete").await;
      assert_eq!(TestApp::location(&response), expected, "{} {:?}", status, code);
      assert_eq!(app.answer("paymentComplete").await, None);
    }
  }

  #[tokio::test]
  async fn test_success_sends_emails_once() {
    let app = ready_to_pay("No").await;
    app.get("/make-payment").await;
    app.payments.set_state("success", None);

    let response = app.get("/service-complete").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let reference = app.answer("paymentReference").await.unwrap();
    assert!(response.text().contains(&reference));

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].email_address, "andy@example.com");
    assert_eq!(sent[0].template_id, "applicant-section-10");
    assert_eq!(sent[1].email_address, "olive@example.com");
    assert_eq!(sent[1].personalisation["fullName"], "Olive Owner");
    assert_eq!(sent[1].personalisation["submissionReference"], reference);

    // A refresh neither looks the payment up again nor re-sends
    app.payments.set_state("failed", Some("P0010"));
    let response = app.get("/service-complete").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(app.notifier.sent().len(), 2);

    let submitted = app
      .events()
      .into_iter()
      .filter(|e| matches!(e.event_type, EventType::ApplicationSubmitted { .. }))
      .count();
    assert_eq!(submitted, 1);
  }

  #[tokio::test]
  async fn test_owner_who_applies_gets_one_email() {
    let app = ready_to_pay("Yes").await;
    app.get("/make-payment").await;
    app.payments.set_state("success", None);
    app.get("/service-complete").await;

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].email_address, "olive@example.com");
  }

  #[tokio::test]
  async fn test_notify_failure_is_not_shown() {
    let app = ready_to_pay("Yes").await;
    app.notifier.set_failing(true);
    app.get("/make-payment").await;
    app.payments.set_state("success", None);
    let response = app.get("/service-complete").await;
    assert_eq!(response.status_code(), StatusCode::OK);
  }

  #[tokio::test]
  async fn test_service_complete_without_payment() {
    let app = TestApp::new();
    let response = app.get("/service-complete").await;
    assert_eq!(TestApp::location(&response), "/");
  }
}
