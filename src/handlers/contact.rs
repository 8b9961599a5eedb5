//! Owner and applicant contact details.

use axum::{http::StatusCode, Form};
use std::collections::HashMap;

use super::{FieldView, FormTemplate, RolePath};
use crate::answers::{self, role_key, ContactDetails, CONTACT_DETAILS};
use crate::error::{redirect, render, render_with_status, AppResult};
use crate::flow::{Page, Role};
use crate::session::Session;
use crate::validation::{self as v, ErrorSummary};

const NAME: &str = "name";
const BUSINESS_NAME: &str = "businessName";
const EMAIL: &str = "emailAddress";
const CONFIRM_EMAIL: &str = "confirmEmailAddress";

const MAX_LENGTH: usize = 4000;

/// Whose details a role's pages ask about, from the applicant's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Perspective {
  /// Applicant's own details (owner who applies, or agent)
  Own,
  /// Agent describing the owner
  OwnerOnBehalf,
}

pub(super) async fn perspective(session: &Session, role: Role) -> AppResult<Perspective> {
  Ok(match role {
    Role::Applicant => Perspective::Own,
    Role::Owner if answers::owned_by_applicant(session).await? => Perspective::Own,
    Role::Owner => Perspective::OwnerOnBehalf,
  })
}

fn view(role: Role, perspective: Perspective, details: &ContactDetails) -> FormTemplate {
  let email = details.email.as_deref();
  let (title, name_label, email_label) = match perspective {
    Perspective::Own => ("Your contact details", "Full name", "Email address"),
    Perspective::OwnerOnBehalf => ("Owner’s contact details", "Owner’s full name", "Owner’s email address (optional)"),
  };
  let mut template = FormTemplate::new(
    title,
    Page::ContactDetails(role).path(),
    vec![
      FieldView::text(NAME, name_label, Some(&details.name)),
      FieldView::text(BUSINESS_NAME, "Business name (optional)", details.business_name.as_deref()),
      FieldView::email(EMAIL, email_label, email).hint("We’ll use this to send confirmation of the application"),
      FieldView::email(CONFIRM_EMAIL, "Confirm email address", email),
    ],
  );
  if perspective == Perspective::OwnerOnBehalf {
    template.intro = vec!["We’ll contact the owner if we need more information about the item.".to_string()];
  }
  template
}

/// Check the form; the owner's email is optional when an agent applies
fn validate(perspective: Perspective, form: &HashMap<String, String>) -> ErrorSummary {
  let get = |name: &str| form.get(name).map(String::as_str);
  let mut errors = ErrorSummary::new();

  let name_required = match perspective {
    Perspective::Own => "Enter your full name",
    Perspective::OwnerOnBehalf => "Enter the owner’s full name",
  };
  v::check_required_text(&mut errors, NAME, get(NAME), MAX_LENGTH, name_required, "Must be 4,000 characters or fewer");
  v::check_optional_text(&mut errors, BUSINESS_NAME, get(BUSINESS_NAME), MAX_LENGTH, "Must be 4,000 characters or fewer");

  let email = get(EMAIL).map(str::trim).unwrap_or_default();
  let confirm = get(CONFIRM_EMAIL).map(str::trim).unwrap_or_default();
  let email_required = perspective == Perspective::Own;
  if email.is_empty() {
    if email_required {
      errors.push(EMAIL, "Enter your email address");
    }
  } else if !v::is_valid_email(email) {
    errors.push(EMAIL, "Enter an email address in the correct format, like name@example.com");
  } else if !email.eq_ignore_ascii_case(confirm) {
    errors.push(CONFIRM_EMAIL, "This confirmation does not match the email address");
  }
  errors
}

pub async fn contact_details(session: Session, RolePath(role): RolePath) -> AppResult {
  let perspective = perspective(&session, role).await?;
  let details = answers::contact_details(&session, role).await?.unwrap_or_default();
  render(&view(role, perspective, &details))
}

pub async fn contact_details_post(
  session: Session,
  RolePath(role): RolePath,
  Form(form): Form<HashMap<String, String>>,
) -> AppResult {
  let perspective = perspective(&session, role).await?;
  let errors = validate(perspective, &form);
  let details = ContactDetails {
    name: v::clean(form.get(NAME).map(String::as_str)).unwrap_or_default(),
    business_name: v::clean(form.get(BUSINESS_NAME).map(String::as_str)),
    email: v::clean(form.get(EMAIL).map(String::as_str)),
  };

  if !errors.is_empty() {
    let mut template = view(role, perspective, &details);
    template.errors = errors;
    return render_with_status(StatusCode::BAD_REQUEST, &template);
  }

  session.set_json(&role_key(role, CONTACT_DETAILS), &details).await?;
  Ok(redirect(Page::AddressFind(role).path()))
}
