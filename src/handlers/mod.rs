pub mod address;
pub mod check_answers;
pub mod contact;
pub mod item;
pub mod payment;
pub mod questions;
pub mod uploads;

use askama::Template;
use axum::{
  extract::{FromRequestParts, Path},
  http::request::Parts,
  response::Response,
};

use crate::answers;
use crate::error::{redirect, render, AppError, AppResult};
use crate::flow::{ItemType, Page, Role, Section};
use crate::session::Session;
use crate::validation::ErrorSummary;

/// The `{role}` segment of the user-details pages; any other value is a 404
#[derive(Debug, Clone, Copy)]
pub struct RolePath(pub Role);

impl<S: Send + Sync> FromRequestParts<S> for RolePath {
  type Rejection = AppError;

  async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
    let Path(role) = Path::<Role>::from_request_parts(parts, state).await?;
    Ok(RolePath(role))
  }
}

// ============================================================================
// Shared view models
// ============================================================================

/// One radio button or checkbox
pub struct OptionView {
  pub value: String,
  pub label: String,
  pub checked: bool,
  /// Selecting this option reveals the detail field
  pub reveals_detail: bool,
}

impl OptionView {
  pub fn new(value: impl Into<String>, label: impl Into<String>, checked: bool) -> Self {
    Self {
      value: value.into(),
      label: label.into(),
      checked,
      reveals_detail: false,
    }
  }
}

/// A text input or textarea
pub struct FieldView {
  pub name: &'static str,
  pub label: String,
  pub hint: Option<&'static str>,
  pub value: String,
  pub input_type: &'static str,
  pub multiline: bool,
}

impl FieldView {
  pub fn text(name: &'static str, label: impl Into<String>, value: Option<&str>) -> Self {
    Self {
      name,
      label: label.into(),
      hint: None,
      value: value.unwrap_or_default().to_string(),
      input_type: "text",
      multiline: false,
    }
  }

  pub fn textarea(name: &'static str, label: impl Into<String>, value: Option<&str>) -> Self {
    Self {
      multiline: true,
      ..Self::text(name, label, value)
    }
  }

  pub fn email(name: &'static str, label: impl Into<String>, value: Option<&str>) -> Self {
    Self {
      input_type: "email",
      ..Self::text(name, label, value)
    }
  }

  pub fn hint(mut self, hint: &'static str) -> Self {
    self.hint = Some(hint);
    self
  }
}

pub struct LinkView {
  pub href: &'static str,
  pub text: &'static str,
}

/// Radio or checkbox page
#[derive(Template)]
#[template(path = "question.html")]
pub struct ChoiceTemplate {
  pub title: String,
  pub hint: Option<&'static str>,
  pub action: &'static str,
  pub name: &'static str,
  pub multiple: bool,
  pub options: Vec<OptionView>,
  pub detail: Option<FieldView>,
  pub links: Vec<LinkView>,
  pub errors: ErrorSummary,
}

impl ChoiceTemplate {
  pub fn radios(title: impl Into<String>, action: &'static str, name: &'static str, options: Vec<OptionView>) -> Self {
    Self {
      title: title.into(),
      hint: None,
      action,
      name,
      multiple: false,
      options,
      detail: None,
      links: Vec::new(),
      errors: ErrorSummary::new(),
    }
  }
}

/// Page made of text fields
#[derive(Template)]
#[template(path = "form_page.html")]
pub struct FormTemplate {
  pub title: String,
  pub intro: Vec<String>,
  pub action: &'static str,
  pub fields: Vec<FieldView>,
  pub links: Vec<LinkView>,
  pub button: &'static str,
  pub errors: ErrorSummary,
}

impl FormTemplate {
  pub fn new(title: impl Into<String>, action: &'static str, fields: Vec<FieldView>) -> Self {
    Self {
      title: title.into(),
      intro: Vec::new(),
      action,
      fields,
      links: Vec::new(),
      button: "Continue",
      errors: ErrorSummary::new(),
    }
  }
}

/// Static copy, optionally with a continue link or button
#[derive(Template)]
#[template(path = "info.html")]
pub struct InfoTemplate {
  pub title: String,
  pub paragraphs: Vec<String>,
  pub next: Option<LinkView>,
  /// Post an empty form here instead of following a link
  pub form_action: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
  pub start: &'static str,
  pub choose_type: &'static str,
}

// ============================================================================
// Start and information pages
// ============================================================================

pub async fn index() -> AppResult {
  render(&IndexTemplate {
    start: Page::ContainElephantIvory.path(),
    choose_type: Page::WhatTypeOfItemIsIt.path(),
  })
}

fn info(title: &str, paragraphs: &[&str]) -> InfoTemplate {
  InfoTemplate {
    title: title.to_string(),
    paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
    next: None,
    form_action: None,
  }
}

pub async fn do_not_need_service() -> AppResult {
  render(&info(
    "You don’t need to tell us about this item",
    &[
      "You can sell or hire out items that do not contain elephant ivory without registering them.",
      "Qualifying museums can trade ivory with each other without registering or certifying items.",
    ],
  ))
}

pub async fn cannot_trade() -> AppResult {
  render(&info(
    "You are not allowed to sell or hire out your item",
    &[
      "Your item does not meet any of the exemptions to the ban on dealing in elephant ivory.",
      "It is illegal to sell or hire out this item, or to offer to do so.",
    ],
  ))
}

pub async fn cannot_continue() -> AppResult {
  render(&info(
    "You cannot continue",
    &[
      "You must know the answers to the questions to register or certify your item.",
      "You may need to get an expert to check your item.",
    ],
  ))
}

pub async fn can_continue(session: Session) -> AppResult {
  let item_type = answers::item_type(&session).await?;
  let (title, summary) = match item_type.section() {
    Section::Ten => (
      "You can continue",
      "You must register your item before you sell it or hire it out.".to_string(),
    ),
    Section::Two => (
      "You can apply for an exemption certificate",
      "An expert will assess your item before a certificate can be issued. The fee is not refunded if your application is rejected.".to_string(),
    ),
  };
  let mut paragraphs = vec![format!("Your item is exempt as: {}.", item_type.label()), summary];
  if item_type == ItemType::Museum {
    paragraphs.push("The museum you are trading with must be a qualifying museum.".to_string());
  }
  render(&InfoTemplate {
    title: title.to_string(),
    paragraphs,
    next: Some(LinkView {
      href: Page::LegalResponsibility.path(),
      text: "Continue",
    }),
    form_action: None,
  })
}

pub async fn legal_responsibility() -> AppResult {
  render(&InfoTemplate {
    title: "Both the owner and applicant are jointly responsible for providing accurate information".to_string(),
    paragraphs: vec![
      "Making a false declaration is an offence.".to_string(),
      "If you do not provide accurate information you could be fined or sent to prison.".to_string(),
    ],
    next: None,
    form_action: Some(Page::LegalResponsibility.path()),
  })
}

pub async fn legal_responsibility_post() -> Response {
  redirect(Page::DescribeTheItem.path())
}
